//! Middleware module for the Parentline HTTP server
//!
//! Provides:
//! - Authentication extractor (Bearer access token)

pub mod auth;
