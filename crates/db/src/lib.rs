pub mod catalog_import;
pub mod connection;
pub mod migrations;
pub mod repositories;

pub use catalog_import::{parse_catalog_csv, CatalogImport, ImportError, SkippedRow};
pub use connection::{connect, connect_with_config, connect_with_settings, ping, DbPool};
pub use repositories::{RepositoryError, SqlCatalogRepository};
