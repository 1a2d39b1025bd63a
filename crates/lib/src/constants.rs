//! # Shared Constants
//!
//! Constants shared by the crates of the `memento` workspace.

/// The root directory for local databases.
pub const DB_DIR: &str = "db";

/// The default path of the lake database, which also holds the metadata catalog.
pub const DEFAULT_DB_FILE: &str = "db/memento.db";

/// The name of the catalog table inside the lake database.
pub const CATALOG_TABLE: &str = "table_catalog";

/// Number of candidates the catalog returns to `table_searcher` before discovery trims them.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;
