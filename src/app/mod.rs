//! App layer - the single owner of editor, collections and history state
//!
//! `AppActor` turns UI events into `AppState` commands, forwards sends to
//! the network layer and feeds completions back into history.

pub mod actor;
pub mod commands;
pub mod state;

pub use actor::AppActor;
pub use state::AppState;
