//! Command implementations for the Meridian CLI.

pub mod list_types;
pub mod submit;
pub mod types;
