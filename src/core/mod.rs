//! Core types shared across the report pipeline.

mod error;

pub use error::{Error, Result};
