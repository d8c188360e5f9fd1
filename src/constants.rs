//! Application constants
//!
//! Centralized location for magic strings and configuration defaults.

/// Default URL for new HTTP requests
pub const DEFAULT_HTTP_URL: &str = "https://httpbin.org/get";

/// Application name
pub const APP_NAME: &str = "ReqNest";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum number of history entries kept
pub const MAX_HISTORY: usize = 50;

/// Storage keys, one JSON document each
pub const KEY_COLLECTIONS: &str = "collections";
pub const KEY_ENVIRONMENTS: &str = "environments";
pub const KEY_HISTORY: &str = "history";
pub const KEY_PENDING_IMPORT: &str = "pending_import";

/// Scratch-state tool names (stored as `scratch_<tool>`)
pub const TOOL_EDITOR: &str = "editor";
pub const TOOL_CONVERTERS: &str = "tools";
