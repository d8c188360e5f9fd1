//! Network layer - HTTP request execution
//!
//! The Network actor receives send commands and reports each completion.

pub mod actor;
pub mod client;

pub use actor::NetworkActor;
