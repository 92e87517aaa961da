//! Error types for the FlexStore crate
//!
//! This module contains the error type returned by the FlexStore coordinator. Store
//! operations themselves return `StoreError`.

use config::ConfigError;
use store_core::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlexStoreError {
    #[error("Database connection error: {0}")]
    DatabaseConnection(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
