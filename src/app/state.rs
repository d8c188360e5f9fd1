//! App state - pure data structure, I/O only through `Storage`

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::collections::{MoveTarget, TreeRow};
use crate::constants::{TOOL_CONVERTERS, TOOL_EDITOR};
use crate::messages::render::{Notification, PopupView};
use crate::messages::ui_events::{AuthField, BulkTarget, InputMode, Panel, PopupKind, TestField};
use crate::messages::RenderState;
use crate::models::{AuthConfig, Request, Response};
use crate::storage::Storage;
use crate::tools::ToolsScratch;

/// A place an item can be moved to
#[derive(Clone, Debug, PartialEq)]
pub struct MoveChoice {
    pub id: String,
    pub target: MoveTarget,
    pub label: String,
}

/// Open popup and its private state
#[derive(Clone, Debug, PartialEq)]
pub enum Popup {
    Help,
    Output { title: String, text: String },
    CurlImport { buffer: String },
    BulkEdit { target: BulkTarget, buffer: String },
    Script { buffer: String },
    Rename { item_id: String, buffer: String },
    OpenApiPath { buffer: String },
    /// Input and converter live in `AppState::tools`
    Tools { output: Option<String> },
    Move { item_id: String, choices: Vec<MoveChoice>, selected: usize },
}

impl Popup {
    pub fn kind(&self) -> PopupKind {
        match self {
            Popup::Help => PopupKind::Help,
            Popup::Output { .. } => PopupKind::Output,
            Popup::CurlImport { .. } | Popup::Rename { .. } | Popup::OpenApiPath { .. } => {
                PopupKind::SingleLine
            }
            Popup::BulkEdit { .. } | Popup::Script { .. } => PopupKind::MultiLine,
            Popup::Tools { .. } => PopupKind::Tools,
            Popup::Move { .. } => PopupKind::Picker,
        }
    }

    /// The editable text buffer, if this popup has one
    pub fn buffer_mut(&mut self) -> Option<&mut String> {
        match self {
            Popup::CurlImport { buffer }
            | Popup::BulkEdit { buffer, .. }
            | Popup::Script { buffer }
            | Popup::Rename { buffer, .. }
            | Popup::OpenApiPath { buffer } => Some(buffer),
            Popup::Help | Popup::Output { .. } | Popup::Tools { .. } | Popup::Move { .. } => None,
        }
    }
}

/// The request being edited, restored on the next start
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EditorScratch {
    pub request: Option<Request>,
    #[serde(default)]
    pub item_id: Option<String>,
}

/// Main application state
pub struct AppState {
    // Request editor
    pub request: Request,
    /// Saved item the editor was opened from
    pub bound_item: Option<String>,
    pub default_url: String,
    pub cursor_position: usize,

    // UI state
    pub active_panel: Panel,
    pub input_mode: InputMode,
    pub response_scroll: u16,
    pub selected_header: usize,
    pub selected_param: usize,
    pub selected_test: usize,
    pub auth_field: AuthField,
    pub test_field: TestField,
    pub selected_row: usize,

    // Response
    pub response: Option<Response>,
    /// Id whose response is on screen; older completions don't replace it
    pub shown_response_id: u64,
    pub next_request_id: u64,
    pub pending: HashSet<u64>,

    // History
    pub history_index: Option<usize>,

    // Storage (persisted data)
    pub storage: Storage,

    pub tools: ToolsScratch,
    pub popup: Option<Popup>,
    pub notification: Option<Notification>,
}

impl AppState {
    pub fn new(storage: Storage, default_url: impl Into<String>) -> Self {
        let default_url = default_url.into();
        let editor: EditorScratch = storage.read_scratch(TOOL_EDITOR).unwrap_or_default();
        let tools: ToolsScratch = storage.read_scratch(TOOL_CONVERTERS).unwrap_or_default();

        let request = editor
            .request
            .unwrap_or_else(|| Request {
                url: default_url.clone(),
                ..Request::default()
            });
        let bound_item = editor
            .item_id
            .filter(|id| storage.tree().find_item(id).is_some());

        let mut state = AppState {
            cursor_position: request.url.len(),
            request,
            bound_item,
            default_url,
            active_panel: Panel::Url,
            input_mode: InputMode::Normal,
            response_scroll: 0,
            selected_header: 0,
            selected_param: 0,
            selected_test: 0,
            auth_field: AuthField::Token,
            test_field: TestField::Value,
            selected_row: 0,
            response: None,
            shown_response_id: 0,
            next_request_id: 1,
            pending: HashSet::new(),
            history_index: None,
            storage,
            tools,
            popup: None,
            notification: None,
        };
        state.consume_pending_import();
        if let Some(e) = state.storage.take_load_error() {
            state.notify_error("Failed to load saved data", e);
        }
        state
    }

    /// Pick up a collection staged by an import while we were not running
    pub fn consume_pending_import(&mut self) {
        match self.storage.take_pending_import() {
            Ok(Some(name)) => self.notify(format!("Imported collection '{}'", name)),
            Ok(None) => {}
            Err(e) => self.notify_error("Failed to read pending import", e),
        }
    }

    /// Generate a unique request ID
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    pub fn notify(&mut self, message: impl Into<String>) {
        self.notification = Some(Notification::info(message));
    }

    pub fn notify_error(&mut self, context: &str, error: anyhow::Error) {
        tracing::warn!(error = %error, "{}", context);
        self.notification = Some(Notification::error(format!("{}: {:#}", context, error)));
    }

    /// Surface a storage failure; the in-memory state stays as it is
    pub fn report(&mut self, result: anyhow::Result<()>, context: &str) {
        if let Err(e) = result {
            self.notify_error(context, e);
        }
    }

    pub fn tree_rows(&self) -> Vec<TreeRow> {
        self.storage.tree().tree_rows()
    }

    pub fn selected_tree_row(&self) -> Option<TreeRow> {
        self.tree_rows().into_iter().nth(self.selected_row)
    }

    pub fn save_editor_scratch(&mut self) {
        let scratch = EditorScratch {
            request: Some(self.request.clone()),
            item_id: self.bound_item.clone(),
        };
        let result = self.storage.write_scratch(TOOL_EDITOR, &scratch);
        self.report(result, "Failed to save editor state");
    }

    pub fn save_tools_scratch(&mut self) {
        let tools = self.tools.clone();
        let result = self.storage.write_scratch(TOOL_CONVERTERS, &tools);
        self.report(result, "Failed to save tools state");
    }

    /// Get the current input field content
    pub fn current_input(&self) -> Option<&str> {
        match self.active_panel {
            Panel::Url => Some(&self.request.url),
            Panel::Body => Some(&self.request.body),
            Panel::Auth => match (&self.request.auth, self.auth_field) {
                (AuthConfig::Bearer { token }, _) => Some(token),
                (AuthConfig::Basic { username, .. }, AuthField::Username) => Some(username),
                (AuthConfig::Basic { password, .. }, AuthField::Password) => Some(password),
                (AuthConfig::ApiKey { key_name, .. }, AuthField::KeyName) => Some(key_name),
                (AuthConfig::ApiKey { key_value, .. }, AuthField::KeyValue) => Some(key_value),
                _ => None,
            },
            Panel::Tests => {
                let assertion = self.request.tests.get(self.selected_test)?;
                match self.test_field {
                    TestField::Value => Some(&assertion.value),
                    TestField::Field => Some(assertion.field.as_deref().unwrap_or("")),
                }
            }
            _ => None,
        }
    }

    /// Get mutable reference to current input field
    pub fn current_input_mut(&mut self) -> Option<&mut String> {
        match self.active_panel {
            Panel::Url => Some(&mut self.request.url),
            Panel::Body => Some(&mut self.request.body),
            Panel::Auth => match (&mut self.request.auth, self.auth_field) {
                (AuthConfig::Bearer { token }, _) => Some(token),
                (AuthConfig::Basic { username, .. }, AuthField::Username) => Some(username),
                (AuthConfig::Basic { password, .. }, AuthField::Password) => Some(password),
                (AuthConfig::ApiKey { key_name, .. }, AuthField::KeyName) => Some(key_name),
                (AuthConfig::ApiKey { key_value, .. }, AuthField::KeyValue) => Some(key_value),
                _ => None,
            },
            Panel::Tests => {
                let test_field = self.test_field;
                let assertion = self.request.tests.get_mut(self.selected_test)?;
                match test_field {
                    TestField::Value => Some(&mut assertion.value),
                    TestField::Field => Some(assertion.field.get_or_insert_with(String::new)),
                }
            }
            _ => None,
        }
    }

    fn popup_view(&self) -> Option<PopupView> {
        let popup = self.popup.as_ref()?;
        let mut view = PopupView {
            kind: popup.kind(),
            ..PopupView::default()
        };
        match popup {
            Popup::Help => {
                view.title = String::from("Help");
            }
            Popup::Output { title, text } => {
                view.title = title.clone();
                view.body = text.clone();
                view.hint = "any key to close";
            }
            Popup::CurlImport { buffer } => {
                view.title = String::from("Import cURL");
                view.body = buffer.clone();
                view.hint = "Enter: import | Esc: cancel";
            }
            Popup::BulkEdit { target, buffer } => {
                view.title = target.title().to_string();
                view.body = buffer.clone();
                view.hint = "one 'Key: value' per line | Ctrl+S: apply | Esc: cancel";
            }
            Popup::Script { buffer } => {
                view.title = String::from("Pre-request Script");
                view.body = buffer.clone();
                view.hint = "set/unset/header/param/log | Ctrl+S: apply | Esc: cancel";
            }
            Popup::Rename { buffer, .. } => {
                view.title = String::from("Rename");
                view.body = buffer.clone();
                view.hint = "Enter: rename | Esc: cancel";
            }
            Popup::OpenApiPath { buffer } => {
                view.title = String::from("Import OpenAPI file");
                view.body = buffer.clone();
                view.hint = "path to .json/.yaml | Enter: import | Esc: cancel";
            }
            Popup::Tools { output } => {
                view.title = format!("Tools: {}", self.tools.action.as_str());
                view.body = self.tools.input.clone();
                view.output = output.clone();
                view.hint = "Tab: next tool | Enter: run | Esc: close";
            }
            Popup::Move { choices, selected, .. } => {
                view.title = String::from("Move to");
                view.items = choices.iter().map(|c| c.label.clone()).collect();
                view.selected = *selected;
                view.hint = "Enter: move | Esc: cancel";
            }
        }
        Some(view)
    }

    /// Convert state to RenderState for UI
    pub fn to_render_state(&self) -> RenderState {
        let bound_item = self
            .bound_item
            .as_deref()
            .and_then(|id| self.storage.tree().find_item(id))
            .map(|(collection, item)| format!("{} / {}", collection.name, item.display_name()));

        RenderState {
            request: self.request.clone(),
            bound_item,
            active_panel: self.active_panel,
            input_mode: self.input_mode,
            cursor_position: self.cursor_position,
            selected_header: self.selected_header,
            selected_param: self.selected_param,
            selected_test: self.selected_test,
            auth_field: self.auth_field,
            test_field: self.test_field,
            tree_rows: self.tree_rows(),
            selected_row: self.selected_row,
            response: self.response.clone(),
            response_scroll: self.response_scroll,
            pending_sends: self.pending.len(),
            environment: self.storage.current_environment().map(|e| e.name.clone()),
            history_len: self.storage.history_len(),
            history_index: self.history_index,
            popup: self.popup_view(),
            notification: self.notification.clone(),
        }
    }
}
