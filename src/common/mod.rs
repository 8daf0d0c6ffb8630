//! Common utilities and types shared across flowcoord

pub mod audit;
pub mod auth;
pub mod auth_middleware;
pub mod config;
pub mod error;
pub mod revision;
pub mod tracing_middleware;
pub mod utils;

pub use config::Config;
pub use error::{Error, Result};
pub use revision::{Revision, RevisionDto, Versioned};
