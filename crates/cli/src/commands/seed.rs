use std::fs::File;
use std::path::Path;

use orderly_db::{parse_catalog_csv, SqlCatalogRepository};

use crate::commands::{
    load_config, open_database, runtime, CommandFailure, CommandResult, EXIT_DATABASE, EXIT_INPUT,
};

pub fn run(path: &Path) -> CommandResult {
    match import(path) {
        Ok(message) => CommandResult::success("seed", message),
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn import(path: &Path) -> Result<String, CommandFailure> {
    let config = load_config()?;
    let file = File::open(path).map_err(|error| {
        ("input_read", format!("could not open `{}`: {error}", path.display()), EXIT_INPUT)
    })?;
    let import = parse_catalog_csv(file)
        .map_err(|error| ("catalog_import", error.to_string(), EXIT_INPUT))?;

    let written = runtime()?.block_on(async {
        let pool = open_database(&config).await?;
        let repository = SqlCatalogRepository::new(pool.clone());
        let written = repository
            .upsert_many(&import.products)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_DATABASE))?;
        pool.close().await;
        Ok::<usize, CommandFailure>(written)
    })?;

    let mut lines = vec![format!(
        "imported {written} products from `{}`, skipped {} rows",
        path.display(),
        import.skipped.len()
    )];
    lines.extend(
        import.skipped.iter().map(|row| format!("  - line {}: {}", row.line, row.reason)),
    );
    Ok(lines.join("\n"))
}
