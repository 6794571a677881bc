//! Core error types for cloudbook-core

use cloudbook_inventory::InventoryError;
use thiserror::Error;

/// Errors that can occur in core operations
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// Missing or invalid configuration; aborts the run before collection
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The catalog could not be built or filtered
    #[error("catalog error: {0}")]
    Catalog(#[from] InventoryError),

    /// Role assumption failed for an account
    #[error("could not assume role in account {account}: {reason}")]
    AccessError {
        /// Account whose role could not be assumed
        account: String,
        /// Provider's reason
        reason: String,
    },
}
