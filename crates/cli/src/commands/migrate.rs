use crate::commands::{load_config, open_database, runtime, CommandFailure, CommandResult};

pub fn run() -> CommandResult {
    let outcome = load_config().and_then(|config| {
        runtime()?.block_on(async {
            let pool = open_database(&config).await?;
            pool.close().await;
            Ok::<(), CommandFailure>(())
        })
    });

    match outcome {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => CommandResult::from_failure("migrate", failure),
    }
}
