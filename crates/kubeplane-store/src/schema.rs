//! Database schema definitions and column families.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Credential records, keyed by `provider || '/' || account`.
    pub const CREDENTIALS: &str = "credentials";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::CREDENTIALS]
}
