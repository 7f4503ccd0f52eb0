//! Core orchestration: intent compilation, DAG ordering and scheduling.

pub mod compiler;
pub mod config;
pub mod context;
pub mod error;
pub mod parser;
pub mod plan;
pub mod scheduler;
pub mod types;

pub use error::{Result, WeftError};
