//! Assessment progression: runs, stage projection, generation, readiness.

pub mod generation;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod readiness;
pub mod store;
