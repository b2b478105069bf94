use std::fs;
use std::io::{self, Read};

use orderly_server::bootstrap::bootstrap_with_config;
use uuid::Uuid;

use crate::commands::{
    load_config, runtime, CommandFailure, CommandResult, EXIT_DATABASE, EXIT_INPUT, EXIT_PIPELINE,
};

/// Runs one email through the pipeline. `-` reads from stdin.
pub fn run(input: &str) -> CommandResult {
    match read_input(input).and_then(|email| process(&email)) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(failure) => CommandResult::from_failure("process", failure),
    }
}

fn read_input(input: &str) -> Result<String, CommandFailure> {
    let content = if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|error| ("input_read", format!("could not read stdin: {error}"), EXIT_INPUT))?;
        buffer
    } else {
        fs::read_to_string(input).map_err(|error| {
            ("input_read", format!("could not read `{input}`: {error}"), EXIT_INPUT)
        })?
    };

    if content.trim().is_empty() {
        return Err(("input_read", "email content is empty".to_string(), EXIT_INPUT));
    }
    Ok(content)
}

fn process(email: &str) -> Result<String, CommandFailure> {
    let config = load_config()?;
    let correlation_id = format!("cli-{}", Uuid::new_v4());

    runtime()?.block_on(async {
        let app = bootstrap_with_config(config)
            .await
            .map_err(|error| ("bootstrap", error.to_string(), EXIT_DATABASE))?;
        let outcome = app.pipeline.process_order(email, &correlation_id).await;
        app.context.shutdown();
        app.db_pool.close().await;

        let processed = outcome.map_err(|failure| {
            (failure.kind.as_str(), failure.detail, EXIT_PIPELINE)
        })?;
        serde_json::to_string_pretty(&processed)
            .map_err(|error| ("serialization", error.to_string(), EXIT_PIPELINE))
    })
}
