use thiserror::Error;

use crate::pipeline::states::{PipelineEvent, PipelineState, TransitionOutcome};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineTransitionError {
    #[error("invalid pipeline transition from {state:?} using event {event:?}")]
    InvalidTransition { state: PipelineState, event: PipelineEvent },
    #[error("pipeline state {state:?} was already visited")]
    StateReentered { state: PipelineState },
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineFlow;

impl PipelineFlow {
    pub fn initial_state(&self) -> PipelineState {
        PipelineState::Extracting
    }

    pub fn apply(
        &self,
        current: PipelineState,
        event: PipelineEvent,
    ) -> Result<TransitionOutcome, PipelineTransitionError> {
        use PipelineEvent::{ItemsExtracted, OrderValidated, ResponseRendered, StageFailed};
        use PipelineState::{Done, Extracting, Failed, Rendering, Validating};

        let to = match (current, event) {
            (Extracting, ItemsExtracted) => Validating,
            (Validating, OrderValidated) => Rendering,
            (Rendering, ResponseRendered) => Done,
            (Extracting | Validating | Rendering, StageFailed) => Failed,
            _ => {
                return Err(PipelineTransitionError::InvalidTransition { state: current, event });
            }
        };

        Ok(TransitionOutcome { from: current, to, event })
    }
}

/// The state path of one request. States are never re-entered.
#[derive(Clone, Debug)]
pub struct PipelineRun {
    flow: PipelineFlow,
    visited: Vec<PipelineState>,
}

impl PipelineRun {
    pub fn start(flow: PipelineFlow) -> Self {
        Self { flow, visited: vec![flow.initial_state()] }
    }

    pub fn state(&self) -> PipelineState {
        self.visited.last().copied().unwrap_or_else(|| self.flow.initial_state())
    }

    pub fn visited(&self) -> &[PipelineState] {
        &self.visited
    }

    pub fn advance(
        &mut self,
        event: PipelineEvent,
    ) -> Result<TransitionOutcome, PipelineTransitionError> {
        let outcome = self.flow.apply(self.state(), event)?;
        if self.visited.contains(&outcome.to) {
            return Err(PipelineTransitionError::StateReentered { state: outcome.to });
        }
        self.visited.push(outcome.to);
        Ok(outcome)
    }
}
