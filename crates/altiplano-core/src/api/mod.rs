//! REST API client module for the Altiplano Access Controller.
//!
//! This module provides the `ApiClient` for issuing intent operations
//! against the controller's restconf endpoints and IP-prefix operations
//! against the legacy sidecar service.
//!
//! Controller endpoints use bearer token authentication obtained through
//! the `rest/auth/login` endpoint (see the `auth` module).

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
