//! # reqnest
//!
//! A terminal API client: build HTTP requests, organize them in
//! collections, and check responses with simple assertions.
//!
//! ## Features
//! - HTTP methods: GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS
//! - Collections with nested folders
//! - Environments with `{{variable}}` substitution
//! - Auth support (Bearer, Basic, API key)
//! - Pre-request scripts and response test assertions
//! - Request history
//! - cURL import/export, OpenAPI import
//! - JSON, Base64, URL and timestamp converters
//!
//! ## Architecture
//! Actor-based with channels:
//! - UI Layer (Ratatui) - synchronous
//! - App Layer (State machine)
//! - Network Layer (Tokio runtime)

pub mod constants;
pub mod config;
pub mod models;
pub mod collections;
pub mod storage;
pub mod auth;
pub mod variables;
pub mod curl;
pub mod bulk_edit;
pub mod testing;
pub mod script;
pub mod import;
pub mod tools;
pub mod ui;
pub mod messages;
pub mod app;
pub mod network;

// Re-export commonly used types
pub use models::{AuthConfig, Collection, Environment, Header, HttpMethod, Request, Response};
pub use collections::CollectionTree;
pub use curl::{parse_curl, to_curl};
pub use messages::{NetworkCommand, NetworkResponse, RenderState, UiEvent};
pub use app::{AppActor, AppState};
pub use network::NetworkActor;
