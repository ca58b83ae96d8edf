// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app;
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod error;
pub mod opponent;
pub mod race;
pub mod results;
pub mod runtime;
pub mod scoring;
pub mod sentences;
pub mod ui;

pub use error::{RaceError, Result};
