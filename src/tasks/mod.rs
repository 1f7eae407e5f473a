//! Background tasks module
//!
//! This module contains background tasks that run alongside the HTTP server.

pub mod engine_loop;

// Re-export main functions
pub use engine_loop::engine_task;
