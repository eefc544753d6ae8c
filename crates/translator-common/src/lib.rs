//! Translator Common - Shared types and utilities
//!
//! This crate provides the error definitions and configuration structures
//! used across all translator components.

pub mod config;
pub mod error;

pub use config::{CacheBackendKind, CacheConfig, TranslatorConfig};
pub use error::{Error, Result};
