//! Lattice: a professional-network REST backend.
//!
//! Users, a connection request lifecycle over a symmetric connection graph,
//! a post feed with comments and likes, recipient-scoped notifications,
//! cookie-based JWT sessions, and best-effort transactional email.

pub mod auth;
pub mod config;
pub mod connections;
pub mod db;
pub mod email;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{ApiError, Result};
