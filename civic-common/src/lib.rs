//! # Civic Common Library
//!
//! Shared code for the civic reader services including:
//! - Error type with storage error classification
//! - Bootstrap configuration resolution
//! - Database bootstrap and schema migrations
//! - Engine event bus and SSE helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
pub use events::{EngineEvent, EventBus};
