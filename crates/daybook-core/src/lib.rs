//! # daybook-core
//!
//! Core types, traits, and abstractions for the daybook journaling engine.
//!
//! This crate provides the domain models (entries, catalog rows,
//! preferences), the store traits the annotation and insights services are
//! written against, calendar-day attribution, and an in-memory store.

pub mod config;
pub mod day_boundary;
pub mod defaults;
pub mod error;
pub mod memory;
pub mod models;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use config::EngineConfig;
pub use day_boundary::{parse_day_ends_at, parse_timezone, validate_day_ends_at, DayBoundary};
pub use error::{Error, ErrorClass, Result};
pub use memory::{MemoryStore, MutationStats};
pub use models::*;
pub use traits::*;
pub use uuid_utils::new_v7;
