//! Core library for the Altiplano MCP tool server.
//!
//! Wraps the Nokia Altiplano Access Controller REST API: authentication
//! against the yang-data login endpoint, a file-backed bearer-token cache,
//! and payload builders for the intent-based networking (ibn) operations.

pub mod api;
pub mod auth;
pub mod config;
pub mod intents;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthError, AuthGate, Authenticator, CacheInfo, LoginResponse, TokenCache};
pub use config::Config;
