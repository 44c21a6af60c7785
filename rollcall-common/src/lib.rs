//! # Rollcall Common Library
//!
//! Shared code for the Rollcall attendance services:
//! - Common error type
//! - Bootstrap configuration loading (TOML + environment)
//! - Database initialization and schema creation

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
