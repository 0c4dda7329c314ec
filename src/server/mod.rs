//! Server module for Parentline
//!
//! # Module Structure
//!
//! - `config`: Configuration structures for all server components
//! - `loader`: Configuration loading from files and environment
//! - `validation`: Production configuration validation
//! - `init`: Store and chat engine wiring, router and run loop

pub mod config;
mod init;
mod loader;
mod validation;

pub use init::{run, seed_milestones};
pub use loader::{environment_name, load_config};
pub use validation::production_warnings;
