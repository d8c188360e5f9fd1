//! Render state - data structure sent from App layer to UI for rendering

use crate::collections::TreeRow;
use crate::messages::ui_events::{AuthField, InputMode, Panel, PopupKind, TestField};
use crate::models::{Request, Response};

/// Status-bar message
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub message: String,
    pub is_error: bool,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Notification {
            message: message.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notification {
            message: message.into(),
            is_error: true,
        }
    }
}

/// Everything the UI needs to draw the open popup
#[derive(Debug, Clone, Default)]
pub struct PopupView {
    pub kind: PopupKind,
    pub title: String,
    /// Input buffer, or the text of an output popup
    pub body: String,
    /// Picker entries
    pub items: Vec<String>,
    pub selected: usize,
    /// Result line shown under the input (tools)
    pub output: Option<String>,
    pub hint: &'static str,
}

/// Complete state needed by the UI to render
#[derive(Debug, Clone)]
pub struct RenderState {
    // Request editor
    pub request: Request,
    /// Name of the saved item the editor is bound to
    pub bound_item: Option<String>,

    // UI state
    pub active_panel: Panel,
    pub input_mode: InputMode,
    pub cursor_position: usize,
    pub selected_header: usize,
    pub selected_param: usize,
    pub selected_test: usize,
    pub auth_field: AuthField,
    pub test_field: TestField,

    // Collections sidebar
    pub tree_rows: Vec<TreeRow>,
    pub selected_row: usize,

    // Response
    pub response: Option<Response>,
    pub response_scroll: u16,
    pub pending_sends: usize,

    // Environment / history
    pub environment: Option<String>,
    pub history_len: usize,
    pub history_index: Option<usize>,

    pub popup: Option<PopupView>,
    pub notification: Option<Notification>,
}

impl RenderState {
    pub fn popup_kind(&self) -> PopupKind {
        self.popup.as_ref().map(|p| p.kind).unwrap_or_default()
    }
}

impl Default for RenderState {
    fn default() -> Self {
        RenderState {
            request: Request::default(),
            bound_item: None,
            active_panel: Panel::Url,
            input_mode: InputMode::Normal,
            cursor_position: 0,
            selected_header: 0,
            selected_param: 0,
            selected_test: 0,
            auth_field: AuthField::Token,
            test_field: TestField::Value,
            tree_rows: Vec::new(),
            selected_row: 0,
            response: None,
            response_scroll: 0,
            pending_sends: 0,
            environment: None,
            history_len: 0,
            history_index: None,
            popup: None,
            notification: None,
        }
    }
}
