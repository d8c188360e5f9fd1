//! Command handlers - business logic for processing UI events

use std::collections::HashMap;
use std::path::PathBuf;

use crate::app::state::{MoveChoice, Popup};
use crate::app::AppState;
use crate::bulk_edit;
use crate::collections::{ItemKind, MoveTarget};
use crate::curl;
use crate::import;
use crate::messages::ui_events::{AuthField, BulkTarget, InputMode, Panel, TestField};
use crate::messages::render::Notification;
use crate::messages::{NetworkCommand, NetworkResponse};
use crate::models::{
    ApiKeyLocation, AuthConfig, Environment, Header, Request, RequestHistory, TestAssertion,
};
use crate::script;
use crate::tools::beautify;
use crate::variables;

fn clamp(index: usize, len: usize) -> usize {
    index.min(len.saturating_sub(1))
}

fn step(index: usize, len: usize, forward: bool) -> usize {
    if len == 0 {
        0
    } else if forward {
        (index + 1) % len
    } else {
        index.checked_sub(1).unwrap_or(len - 1)
    }
}

/// Expand a leading `~` to the home directory
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest.trim_start_matches('/')),
        _ => PathBuf::from(path),
    }
}

/// Names still written as `{{name}}` after substitution
fn unresolved_variables(request: &Request, environment: Option<&Environment>) -> Vec<String> {
    let resolved = variables::resolve_request(request, environment);
    let mut names: Vec<String> = std::iter::once(resolved.url.as_str())
        .chain(std::iter::once(resolved.body.as_str()))
        .chain(
            resolved
                .headers
                .iter()
                .chain(resolved.params.iter())
                .filter(|h| h.enabled)
                .flat_map(|h| [h.key.as_str(), h.value.as_str()]),
        )
        .flat_map(variables::referenced)
        .collect();
    names.sort();
    names.dedup();
    names
}

impl AppState {
    // ========================
    // Navigation
    // ========================

    pub fn next_panel(&mut self) {
        self.active_panel = self.active_panel.next();
    }

    pub fn prev_panel(&mut self) {
        self.active_panel = self.active_panel.prev();
    }

    pub fn focus_collections(&mut self) {
        self.active_panel = Panel::Collections;
    }

    pub fn scroll_up(&mut self) {
        self.response_scroll = self.response_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.response_scroll = self.response_scroll.saturating_add(1);
    }

    // ========================
    // Input editing
    // ========================

    pub fn start_editing(&mut self) {
        if self.active_panel == Panel::Tests {
            self.test_field = TestField::Value;
        }
        if let Some(len) = self.current_input().map(str::len) {
            self.input_mode = InputMode::Editing;
            self.cursor_position = len;
        }
    }

    /// Edit the header name of a header assertion
    pub fn edit_assertion_field(&mut self) {
        if self.request.tests.get(self.selected_test).is_some() {
            self.test_field = TestField::Field;
            self.cursor_position = self.current_input().map(str::len).unwrap_or(0);
            self.input_mode = InputMode::Editing;
        }
    }

    pub fn stop_editing(&mut self) {
        self.input_mode = InputMode::Normal;
        self.test_field = TestField::Value;
        self.save_editor_scratch();
    }

    pub fn move_cursor_left(&mut self) {
        let Some(input) = self.current_input() else {
            return;
        };
        let cursor = self.cursor_position.min(input.len());
        self.cursor_position = input[..cursor]
            .char_indices()
            .last()
            .map(|(i, _)| i)
            .unwrap_or(0);
    }

    pub fn move_cursor_right(&mut self) {
        let Some(input) = self.current_input() else {
            return;
        };
        let cursor = self.cursor_position.min(input.len());
        self.cursor_position = input[cursor..]
            .char_indices()
            .nth(1)
            .map(|(i, _)| cursor + i)
            .unwrap_or(input.len());
    }

    pub fn enter_char(&mut self, c: char) {
        let cursor_pos = self.cursor_position;
        if let Some(input) = self.current_input_mut() {
            let pos = cursor_pos.min(input.len());
            input.insert(pos, c);
            self.cursor_position = pos + c.len_utf8();
        }
    }

    pub fn insert_text(&mut self, text: &str) {
        let cursor_pos = self.cursor_position;
        if let Some(input) = self.current_input_mut() {
            let pos = cursor_pos.min(input.len());
            input.insert_str(pos, text);
            self.cursor_position = pos + text.len();
        }
    }

    pub fn delete_char(&mut self) {
        let cursor_pos = self.cursor_position;
        if cursor_pos == 0 {
            return;
        }
        if let Some(input) = self.current_input_mut() {
            let cursor = cursor_pos.min(input.len());
            let prev_pos = input[..cursor]
                .char_indices()
                .last()
                .map(|(i, _)| i)
                .unwrap_or(0);
            if cursor > 0 {
                input.remove(prev_pos);
            }
            self.cursor_position = prev_pos;
        }
    }

    // ========================
    // Request editor
    // ========================

    pub fn cycle_method(&mut self) {
        self.request.method = self.request.method.next();
    }

    /// Start over with an unsaved request
    pub fn new_request(&mut self) {
        self.request = Request {
            url: self.default_url.clone(),
            ..Request::default()
        };
        self.bound_item = None;
        self.cursor_position = self.request.url.len();
        self.selected_header = 0;
        self.selected_param = 0;
        self.selected_test = 0;
        self.save_editor_scratch();
    }

    /// Write the editor back into the saved item it was opened from
    pub fn save_request(&mut self) {
        let Some(item_id) = self.bound_item.clone() else {
            self.notify("Not saved yet: select a collection or folder and press 'a'");
            return;
        };
        let request = self.request.clone();
        match self
            .storage
            .update_collections(|tree| tree.update_request(&item_id, &request))
        {
            Ok(true) => self.notify(format!("Saved '{}'", request.display_name())),
            Ok(false) => {
                self.bound_item = None;
                self.notify("The saved request no longer exists");
            }
            Err(e) => self.notify_error("Failed to save collections", e),
        }
    }

    fn load_into_editor(&mut self, request: Request, bound_item: Option<String>) {
        self.request = request;
        self.bound_item = bound_item;
        self.cursor_position = self.request.url.len();
        self.selected_header = 0;
        self.selected_param = 0;
        self.selected_test = 0;
        self.save_editor_scratch();
    }

    // ========================
    // Row lists (tree, headers, params, tests)
    // ========================

    pub fn next_row(&mut self) {
        self.move_row(true);
    }

    pub fn prev_row(&mut self) {
        self.move_row(false);
    }

    fn move_row(&mut self, forward: bool) {
        match self.active_panel {
            Panel::Collections => {
                let len = self.tree_rows().len();
                self.selected_row = step(self.selected_row, len, forward);
            }
            Panel::Headers => {
                self.selected_header =
                    step(self.selected_header, self.request.headers.len(), forward);
            }
            Panel::Params => {
                self.selected_param = step(self.selected_param, self.request.params.len(), forward);
            }
            Panel::Tests => {
                self.selected_test = step(self.selected_test, self.request.tests.len(), forward);
            }
            _ => {}
        }
    }

    pub fn toggle_row(&mut self) {
        match self.active_panel {
            Panel::Headers => {
                if let Some(header) = self.request.headers.get_mut(self.selected_header) {
                    header.enabled = !header.enabled;
                }
            }
            Panel::Params => {
                if let Some(param) = self.request.params.get_mut(self.selected_param) {
                    param.enabled = !param.enabled;
                }
            }
            Panel::Tests => {
                if let Some(test) = self.request.tests.get_mut(self.selected_test) {
                    test.enabled = !test.enabled;
                }
            }
            _ => {}
        }
    }

    pub fn add_row(&mut self) {
        match self.active_panel {
            Panel::Headers => {
                self.request.headers.push(Header::new("X-Custom", "value"));
                self.selected_header = self.request.headers.len() - 1;
            }
            Panel::Params => {
                self.request.params.push(Header::new("key", "value"));
                self.selected_param = self.request.params.len() - 1;
            }
            Panel::Tests => {
                self.request.tests.push(TestAssertion::default());
                self.selected_test = self.request.tests.len() - 1;
            }
            _ => {}
        }
    }

    pub fn delete_row(&mut self) {
        match self.active_panel {
            Panel::Headers if self.selected_header < self.request.headers.len() => {
                self.request.headers.remove(self.selected_header);
                self.selected_header = clamp(self.selected_header, self.request.headers.len());
            }
            Panel::Params if self.selected_param < self.request.params.len() => {
                self.request.params.remove(self.selected_param);
                self.selected_param = clamp(self.selected_param, self.request.params.len());
            }
            Panel::Tests if self.selected_test < self.request.tests.len() => {
                self.request.tests.remove(self.selected_test);
                self.selected_test = clamp(self.selected_test, self.request.tests.len());
            }
            _ => {}
        }
    }

    // ========================
    // Bulk edit
    // ========================

    pub fn open_bulk_edit(&mut self) {
        let (target, pairs) = match self.active_panel {
            Panel::Params => (BulkTarget::Params, &self.request.params),
            _ => (BulkTarget::Headers, &self.request.headers),
        };
        let buffer = bulk_edit::format_bulk(pairs);
        self.popup = Some(Popup::BulkEdit { target, buffer });
    }

    pub fn edit_variables(&mut self) {
        let buffer = self
            .storage
            .current_environment()
            .map(|env| bulk_edit::format_variables(&env.variables))
            .unwrap_or_default();
        self.popup = Some(Popup::BulkEdit {
            target: BulkTarget::Variables,
            buffer,
        });
    }

    fn apply_bulk_edit(&mut self, target: BulkTarget, buffer: &str) {
        match target {
            BulkTarget::Headers => {
                self.request.headers = bulk_edit::parse_bulk(buffer);
                self.selected_header = clamp(self.selected_header, self.request.headers.len());
            }
            BulkTarget::Params => {
                self.request.params = bulk_edit::parse_bulk(buffer);
                self.selected_param = clamp(self.selected_param, self.request.params.len());
            }
            BulkTarget::Variables => {
                let changes: HashMap<String, Option<String>> = bulk_edit::parse_variables(buffer)
                    .into_iter()
                    .map(|(k, v)| (k, Some(v)))
                    .collect();
                let count = changes.len();
                let result = self.storage.update_variables(&changes, true);
                self.report(result, "Failed to save environments");
                let name = self
                    .storage
                    .current_environment()
                    .map(|e| e.name.clone())
                    .unwrap_or_default();
                self.notify(format!("{} variables in '{}'", count, name));
                return;
            }
        }
        self.save_editor_scratch();
    }

    // ========================
    // Auth
    // ========================

    pub fn cycle_auth(&mut self) {
        self.request.auth = match &self.request.auth {
            AuthConfig::None => AuthConfig::Bearer {
                token: String::new(),
            },
            AuthConfig::Bearer { .. } => AuthConfig::Basic {
                username: String::new(),
                password: String::new(),
            },
            AuthConfig::Basic { .. } => AuthConfig::ApiKey {
                key_name: String::from("X-API-Key"),
                key_value: String::new(),
                key_location: ApiKeyLocation::Header,
            },
            AuthConfig::ApiKey { .. } => AuthConfig::None,
        };
        self.auth_field = match self.request.auth {
            AuthConfig::Basic { .. } => AuthField::Username,
            AuthConfig::ApiKey { .. } => AuthField::KeyName,
            _ => AuthField::Token,
        };
    }

    pub fn next_auth_field(&mut self) {
        self.auth_field = match (&self.request.auth, self.auth_field) {
            (AuthConfig::Basic { .. }, AuthField::Username) => AuthField::Password,
            (AuthConfig::Basic { .. }, _) => AuthField::Username,
            (AuthConfig::ApiKey { .. }, AuthField::KeyName) => AuthField::KeyValue,
            (AuthConfig::ApiKey { .. }, _) => AuthField::KeyName,
            _ => AuthField::Token,
        };
        self.cursor_position = self.current_input().map(str::len).unwrap_or(0);
    }

    pub fn toggle_api_key_location(&mut self) {
        if let AuthConfig::ApiKey { key_location, .. } = &mut self.request.auth {
            *key_location = match key_location {
                ApiKeyLocation::Header => ApiKeyLocation::Query,
                ApiKeyLocation::Query => ApiKeyLocation::Header,
            };
        }
    }

    // ========================
    // Tests
    // ========================

    pub fn cycle_assertion_type(&mut self) {
        if let Some(test) = self.request.tests.get_mut(self.selected_test) {
            test.kind = test.kind.next();
        }
    }

    pub fn cycle_assertion_operator(&mut self) {
        if let Some(test) = self.request.tests.get_mut(self.selected_test) {
            test.operator = test.operator.next();
        }
    }

    // ========================
    // Collections tree
    // ========================

    fn select_row_with_id(&mut self, id: &str) {
        if let Some(index) = self.tree_rows().iter().position(|r| r.id == id) {
            self.selected_row = index;
        }
    }

    fn clamp_selected_row(&mut self) {
        self.selected_row = clamp(self.selected_row, self.tree_rows().len());
    }

    pub fn open_item(&mut self) {
        let Some(row) = self.selected_tree_row() else {
            return;
        };
        if row.kind != ItemKind::Request {
            return;
        }
        let found = self
            .storage
            .tree()
            .find_item(&row.id)
            .map(|(_, request)| request.clone());
        if let Some(request) = found {
            self.load_into_editor(request, Some(row.id));
            self.active_panel = Panel::Url;
        }
    }

    pub fn new_collection(&mut self) {
        let name = format!("New Collection {}", self.storage.tree().collections().len() + 1);
        match self.storage.update_collections(|tree| tree.add_collection(name)) {
            Ok(id) => self.select_row_with_id(&id),
            Err(e) => self.notify_error("Failed to save collections", e),
        }
    }

    pub fn new_folder(&mut self) {
        let Some(row) = self.selected_tree_row() else {
            self.notify("Create a collection first ('n')");
            return;
        };
        match self
            .storage
            .update_collections(|tree| tree.add_folder(&row.collection_id))
        {
            Ok(Some(id)) => self.select_row_with_id(&id),
            Ok(None) => {}
            Err(e) => self.notify_error("Failed to save collections", e),
        }
    }

    /// Save a copy of the editor into the selected collection or folder
    pub fn add_to_collection(&mut self) {
        let Some(row) = self.selected_tree_row() else {
            self.notify("Create a collection first ('n')");
            return;
        };
        let folder_id = match row.kind {
            ItemKind::Collection => None,
            ItemKind::Folder => Some(row.id.clone()),
            // Next to the selected request
            ItemKind::Request => self.storage.tree().find_item(&row.id).and_then(|(c, r)| {
                r.parent_id.clone().filter(|p| c.has_folder(p))
            }),
        };

        let request = self.request.clone();
        match self.storage.update_collections(|tree| {
            tree.add_request(&row.collection_id, folder_id.as_deref(), &request)
        }) {
            Ok(Some(id)) => {
                self.bound_item = Some(id.clone());
                self.select_row_with_id(&id);
                self.save_editor_scratch();
                self.notify(format!("Saved '{}'", request.display_name()));
            }
            Ok(None) => {}
            Err(e) => self.notify_error("Failed to save collections", e),
        }
    }

    pub fn rename_item(&mut self) {
        if let Some(row) = self.selected_tree_row() {
            self.popup = Some(Popup::Rename {
                item_id: row.id,
                buffer: row.label,
            });
        }
    }

    fn apply_rename(&mut self, item_id: &str, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            self.notify("Name cannot be empty");
            return false;
        }
        let result = self
            .storage
            .update_collections(|tree| tree.rename_item(item_id, name));
        match result {
            Ok(_) => {
                if self.bound_item.as_deref() == Some(item_id) {
                    self.request.name = name.to_string();
                }
            }
            Err(e) => self.notify_error("Failed to save collections", e),
        }
        true
    }

    pub fn delete_item(&mut self) {
        let Some(row) = self.selected_tree_row() else {
            return;
        };
        let result = self.storage.update_collections(|tree| match row.kind {
            ItemKind::Collection => tree.delete_collection(&row.id),
            ItemKind::Folder | ItemKind::Request => tree.delete_item(&row.id),
        });
        match result {
            Ok(true) => self.notify(format!("Deleted '{}'", row.label)),
            Ok(false) => {}
            Err(e) => self.notify_error("Failed to save collections", e),
        }

        let bound_exists = self
            .bound_item
            .as_deref()
            .map(|id| self.storage.tree().find_item(id).is_some())
            .unwrap_or(false);
        if !bound_exists {
            self.bound_item = None;
        }
        self.clamp_selected_row();
    }

    pub fn duplicate_item(&mut self) {
        let Some(row) = self.selected_tree_row() else {
            return;
        };
        match self
            .storage
            .update_collections(|tree| tree.duplicate_item(&row.id, row.kind))
        {
            Ok(Some(id)) => self.select_row_with_id(&id),
            Ok(None) => {}
            Err(e) => self.notify_error("Failed to save collections", e),
        }
    }

    /// Open the target picker for the selected folder or request
    pub fn move_item(&mut self) {
        let Some(row) = self.selected_tree_row() else {
            return;
        };
        if row.kind == ItemKind::Collection {
            self.notify("Collections cannot be moved");
            return;
        }

        let choices: Vec<MoveChoice> = self
            .tree_rows()
            .into_iter()
            .filter(|r| r.kind != ItemKind::Request && r.id != row.id)
            .map(|r| MoveChoice {
                label: format!("{}{}", "  ".repeat(r.depth), r.label),
                target: match r.kind {
                    ItemKind::Collection => MoveTarget::Collection,
                    _ => MoveTarget::Folder,
                },
                id: r.id,
            })
            .collect();

        self.popup = Some(Popup::Move {
            item_id: row.id,
            choices,
            selected: 0,
        });
    }

    fn apply_move(&mut self, item_id: &str, choice: &MoveChoice) {
        match self
            .storage
            .update_collections(|tree| tree.move_item(item_id, &choice.id, choice.target))
        {
            Ok(true) => {
                self.select_row_with_id(item_id);
                self.notify(format!("Moved to {}", choice.label.trim()));
            }
            Ok(false) => self.notify("Cannot move an item there"),
            Err(e) => self.notify_error("Failed to save collections", e),
        }
    }

    // ========================
    // History
    // ========================

    fn load_history(&mut self, index: usize) {
        if let Some(entry) = self.storage.get_history(index).cloned() {
            self.load_into_editor(entry.request, None);
            self.response = Some(entry.response);
            self.response_scroll = 0;
            self.history_index = Some(index);
        }
    }

    /// Step back to an older history entry
    pub fn history_prev(&mut self) {
        let len = self.storage.history_len();
        if len == 0 {
            return;
        }
        let index = match self.history_index {
            None => 0,
            Some(i) => (i + 1).min(len - 1),
        };
        self.load_history(index);
    }

    pub fn history_next(&mut self) {
        match self.history_index {
            Some(0) => {
                self.history_index = None;
                self.new_request();
            }
            Some(i) => self.load_history(i - 1),
            None => {}
        }
    }

    pub fn clear_history(&mut self) {
        let result = self.storage.clear_history();
        self.report(result, "Failed to clear history");
        self.history_index = None;
        self.notify("History cleared");
    }

    // ========================
    // Environments
    // ========================

    pub fn cycle_environment(&mut self) {
        if self.storage.environments().is_empty() {
            self.notify("No environments yet: press 'V' to add variables");
            return;
        }
        match self.storage.cycle_environment() {
            Ok(Some(name)) => self.notify(format!("Environment: {}", name)),
            Ok(None) => self.notify("No active environment"),
            Err(e) => self.notify_error("Failed to save environments", e),
        }
    }

    // ========================
    // Response
    // ========================

    pub fn beautify_response(&mut self) {
        let Some(response) = self.response.as_mut() else {
            return;
        };
        match beautify::try_beautify(&response.data) {
            Some(pretty) => response.data = pretty,
            None => self.notify("Response body is not JSON"),
        }
    }

    // ========================
    // cURL import/export
    // ========================

    pub fn show_curl_import(&mut self) {
        self.popup = Some(Popup::CurlImport {
            buffer: String::new(),
        });
    }

    pub fn export_curl(&mut self) {
        self.popup = Some(Popup::Output {
            title: String::from("cURL"),
            text: curl::to_curl(&self.request),
        });
    }

    // ========================
    // Other popups
    // ========================

    pub fn edit_script(&mut self) {
        self.popup = Some(Popup::Script {
            buffer: self.request.pre_request_script.clone(),
        });
    }

    pub fn show_tools(&mut self) {
        self.popup = Some(Popup::Tools { output: None });
    }

    pub fn show_openapi_import(&mut self) {
        self.popup = Some(Popup::OpenApiPath {
            buffer: String::new(),
        });
    }

    pub fn toggle_help(&mut self) {
        self.popup = match self.popup {
            Some(Popup::Help) => None,
            _ => Some(Popup::Help),
        };
    }

    /// Read an OpenAPI file and hand it over through the pending-import key
    fn import_openapi(&mut self, path: &str) -> bool {
        let path = expand_home(path.trim());
        let collection = match import::load_openapi_file(&path) {
            Ok(collection) => collection,
            Err(e) => {
                self.notify_error("OpenAPI import failed", e);
                return false;
            }
        };
        if let Err(e) = self.storage.stage_import(&collection) {
            self.notify_error("Failed to stage import", e);
            return false;
        }
        self.consume_pending_import();
        self.select_row_with_id(&collection.id);
        true
    }

    // ========================
    // Popup input
    // ========================

    pub fn popup_char(&mut self, c: char) {
        match self.popup.as_mut() {
            Some(Popup::Tools { .. }) => self.tools.input.push(c),
            Some(popup) => {
                if let Some(buffer) = popup.buffer_mut() {
                    buffer.push(c);
                }
            }
            None => {}
        }
    }

    pub fn popup_newline(&mut self) {
        self.popup_char('\n');
    }

    pub fn popup_backspace(&mut self) {
        match self.popup.as_mut() {
            Some(Popup::Tools { .. }) => {
                self.tools.input.pop();
            }
            Some(popup) => {
                if let Some(buffer) = popup.buffer_mut() {
                    buffer.pop();
                }
            }
            None => {}
        }
    }

    pub fn popup_next(&mut self) {
        if let Some(Popup::Tools { output }) = self.popup.as_mut() {
            self.tools.action = self.tools.action.next();
            *output = None;
        }
    }

    pub fn popup_select(&mut self, forward: bool) {
        if let Some(Popup::Move { choices, selected, .. }) = self.popup.as_mut() {
            *selected = step(*selected, choices.len(), forward);
        }
    }

    /// Bracketed paste goes to the open popup, else to the field being edited
    pub fn paste(&mut self, text: &str) {
        let single_line = matches!(
            self.popup,
            Some(Popup::Rename { .. }) | Some(Popup::OpenApiPath { .. })
        );
        match self.popup.as_mut() {
            Some(Popup::Tools { .. }) => self.tools.input.push_str(text),
            Some(popup) => {
                if let Some(buffer) = popup.buffer_mut() {
                    if single_line {
                        buffer.push_str(&text.replace(['\r', '\n'], " "));
                    } else {
                        buffer.push_str(text);
                    }
                }
            }
            None if self.input_mode == InputMode::Editing => self.insert_text(text),
            None => {}
        }
    }

    pub fn popup_cancel(&mut self) {
        if matches!(self.popup, Some(Popup::Tools { .. })) {
            self.save_tools_scratch();
        }
        self.popup = None;
    }

    pub fn popup_submit(&mut self) {
        let Some(popup) = self.popup.take() else {
            return;
        };

        // `true` closes the popup; errors keep it open with the input intact
        let close = match &popup {
            Popup::Help | Popup::Output { .. } => true,
            Popup::CurlImport { buffer } => match curl::parse_curl(buffer) {
                Ok(request) => {
                    self.load_into_editor(request, None);
                    self.active_panel = Panel::Url;
                    self.notify("Imported cURL command");
                    true
                }
                Err(e) => {
                    self.notify_error("cURL import failed", e);
                    false
                }
            },
            Popup::BulkEdit { target, buffer } => {
                self.apply_bulk_edit(*target, buffer);
                true
            }
            Popup::Script { buffer } => {
                self.request.pre_request_script = buffer.clone();
                self.save_editor_scratch();
                true
            }
            Popup::Rename { item_id, buffer } => self.apply_rename(item_id, buffer),
            Popup::OpenApiPath { buffer } => self.import_openapi(buffer),
            Popup::Tools { .. } => {
                let output = match self.tools.action.apply(&self.tools.input) {
                    Ok(text) => text,
                    Err(e) => format!("Error: {:#}", e),
                };
                self.save_tools_scratch();
                self.popup = Some(Popup::Tools {
                    output: Some(output),
                });
                return;
            }
            Popup::Move {
                item_id,
                choices,
                selected,
            } => {
                if let Some(choice) = choices.get(*selected) {
                    self.apply_move(item_id, choice);
                }
                true
            }
        };

        if !close {
            self.popup = Some(popup);
        }
    }

    // ========================
    // Request sending
    // ========================

    /// Run the pre-request script and build the send command
    ///
    /// Every call yields a command; earlier sends still in flight are not
    /// affected.
    pub fn prepare_request(&mut self) -> Option<NetworkCommand> {
        if self.request.is_folder() {
            self.notify("Folders cannot be sent");
            return None;
        }

        let mut outgoing = self.request.clone();
        let mut script_failed = false;
        if !outgoing.pre_request_script.trim().is_empty() {
            match script::run_pre_request(
                &outgoing.pre_request_script,
                self.storage.current_environment(),
            ) {
                Ok(outcome) => {
                    if !outcome.variables.is_empty() {
                        let result = self.storage.update_variables(&outcome.variables, false);
                        self.report(result, "Failed to save environments");
                    }
                    outcome.apply_to(&mut outgoing);
                    if !outcome.logs.is_empty() {
                        self.notify(format!("script: {}", outcome.logs.join(" | ")));
                    }
                }
                Err(e) => {
                    script_failed = true;
                    self.notify_error("Pre-request script failed", e);
                }
            }
        }

        let environment = self.storage.current_environment().cloned();
        let missing = unresolved_variables(&outgoing, environment.as_ref());
        if !missing.is_empty() {
            let unresolved = format!("Unresolved variables: {}", missing.join(", "));
            match self.notification.as_mut() {
                // The script error stays visible
                Some(n) if script_failed && n.is_error => {
                    n.message = format!("{} ({})", n.message, unresolved);
                }
                _ => self.notify(unresolved),
            }
        }

        let id = self.next_id();
        self.pending.insert(id);
        tracing::debug!(id, in_flight = self.pending.len(), "Dispatching request");

        Some(NetworkCommand::ExecuteRequest {
            id,
            request: outgoing,
            environment,
        })
    }

    // ========================
    // Response handling
    // ========================

    pub fn handle_response(&mut self, done: NetworkResponse) {
        let NetworkResponse {
            id,
            request,
            response,
        } = done;
        self.pending.remove(&id);

        if response.is_error() {
            let reason = response.data.lines().next().unwrap_or_default().to_string();
            self.notification = Some(Notification::error(format!("Request failed: {}", reason)));
        } else if !response.test_results.is_empty() {
            self.notify(format!(
                "Tests: {}/{} passed",
                response.passed_count(),
                response.test_results.len()
            ));
        }

        let result = self
            .storage
            .add_to_history(RequestHistory::new(request, response.clone()));
        self.report(result, "Failed to save history");
        self.history_index = None;

        if id >= self.shown_response_id {
            self.shown_response_id = id;
            self.response = Some(response);
            self.response_scroll = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_HISTORY;
    use crate::models::{HttpMethod, Response};
    use crate::storage::Storage;

    fn state() -> AppState {
        AppState::new(Storage::in_memory(), "https://api.test")
    }

    fn type_into_popup(state: &mut AppState, text: &str) {
        for c in text.chars() {
            state.popup_char(c);
        }
    }

    #[test]
    fn test_curl_import_popup() {
        let mut state = state();
        state.show_curl_import();
        type_into_popup(&mut state, "curl -X PUT https://x.test/a -d 'v'");
        state.popup_submit();
        assert!(state.popup.is_none());
        assert_eq!(state.request.method, HttpMethod::PUT);
        assert_eq!(state.request.body, "v");

        state.show_curl_import();
        type_into_popup(&mut state, "curl -X POST");
        state.popup_submit();
        assert!(matches!(state.popup, Some(Popup::CurlImport { .. })));
        assert!(state.notification.as_ref().unwrap().is_error);
        assert_eq!(state.request.method, HttpMethod::PUT);
    }

    #[test]
    fn test_save_into_collection_and_reopen() {
        let mut state = state();
        state.new_collection();
        state.new_folder();
        // Folder row is selected after creation
        state.request.url = "https://api.test/users".into();
        state.add_to_collection();

        let bound = state.bound_item.clone().unwrap();
        let (_, saved) = state.storage.tree().find_item(&bound).unwrap();
        assert!(saved.parent_id.is_some());

        state.request.url = "https://api.test/changed".into();
        state.save_request();
        let (_, saved) = state.storage.tree().find_item(&bound).unwrap();
        assert_eq!(saved.url, "https://api.test/changed");

        state.new_request();
        state.select_row_with_id(&bound);
        state.open_item();
        assert_eq!(state.request.url, "https://api.test/changed");
        assert_eq!(state.bound_item.as_deref(), Some(bound.as_str()));
        assert!(state.storage.tree().violations().is_empty());
    }

    #[test]
    fn test_move_picker_moves_request_to_other_collection() {
        let mut state = state();
        state.new_collection();
        state.add_to_collection();
        let item = state.bound_item.clone().unwrap();
        state.new_collection();

        state.select_row_with_id(&item);
        state.move_item();
        let Some(Popup::Move { choices, .. }) = &state.popup else {
            panic!("expected move popup");
        };
        assert_eq!(choices.len(), 2);
        state.popup_select(true);
        state.popup_submit();

        let second = state.storage.tree().collections()[1].id.clone();
        let (collection, _) = state.storage.tree().find_item(&item).unwrap();
        assert_eq!(collection.id, second);
    }

    #[test]
    fn test_history_cap_after_many_completions() {
        let mut state = state();
        for _ in 0..(MAX_HISTORY + 1) {
            let Some(NetworkCommand::ExecuteRequest { id, request, .. }) = state.prepare_request()
            else {
                panic!("expected a send command");
            };
            state.handle_response(NetworkResponse {
                id,
                request,
                response: Response {
                    status: 200,
                    ..Response::default()
                },
            });
        }
        assert_eq!(state.storage.history_len(), MAX_HISTORY);
        assert!(state.pending.is_empty());
    }

    #[test]
    fn test_late_completion_does_not_replace_newer_response() {
        let mut state = state();
        let first = state.prepare_request();
        let second = state.prepare_request();
        assert_eq!(state.pending.len(), 2);
        let (
            Some(NetworkCommand::ExecuteRequest { id: a, request: ra, .. }),
            Some(NetworkCommand::ExecuteRequest { id: b, request: rb, .. }),
        ) = (first, second)
        else {
            panic!("expected send commands");
        };

        let reply = |status| Response {
            status,
            ..Response::default()
        };
        state.handle_response(NetworkResponse { id: b, request: rb, response: reply(201) });
        state.handle_response(NetworkResponse { id: a, request: ra, response: reply(500) });
        assert_eq!(state.response.as_ref().unwrap().status, 201);
        assert_eq!(state.storage.history_len(), 2);
    }

    #[test]
    fn test_script_failure_still_sends_unmodified() {
        let mut state = state();
        state.request.pre_request_script = "header X-A: 1\nbogus".into();
        let headers_before = state.request.headers.clone();
        let Some(NetworkCommand::ExecuteRequest { request, .. }) = state.prepare_request() else {
            panic!("expected a send command");
        };
        assert_eq!(request.headers, headers_before);
        assert!(state.notification.as_ref().unwrap().is_error);
    }

    #[test]
    fn test_script_error_outlives_unresolved_warning() {
        let mut state = state();
        state.request.url = "https://x/{{token}}".into();
        state.request.pre_request_script = "set token abc\nbogus".into();
        assert!(state.prepare_request().is_some());

        let notification = state.notification.as_ref().unwrap();
        assert!(notification.is_error);
        assert!(notification.message.starts_with("Pre-request script failed"));
        assert!(notification.message.contains("token"));
    }

    #[test]
    fn test_unreadable_store_is_reported_at_startup() {
        let mut backend = crate::storage::MemoryBackend::new();
        crate::storage::StorageBackend::write(&mut backend, "collections", "{oops").unwrap();
        let state = AppState::new(Storage::open(Box::new(backend)), "https://api.test");

        let notification = state.notification.as_ref().unwrap();
        assert!(notification.is_error);
        assert!(notification.message.starts_with("Failed to load saved data"));
    }

    #[test]
    fn test_script_sets_variables_in_active_environment() {
        let mut state = state();
        state.request.url = "https://{{host}}/x".into();
        state.request.pre_request_script = "set host api.test\nheader X-Run: yes".into();
        let Some(NetworkCommand::ExecuteRequest { request, environment, .. }) =
            state.prepare_request()
        else {
            panic!("expected a send command");
        };
        let env = environment.unwrap();
        assert_eq!(env.get("host").map(String::as_str), Some("api.test"));
        assert!(request.headers.contains(&Header::new("X-Run", "yes")));
        // The editor itself is untouched
        assert!(!state.request.headers.contains(&Header::new("X-Run", "yes")));
    }

    #[test]
    fn test_variables_bulk_edit() {
        let mut state = state();
        state.edit_variables();
        type_into_popup(&mut state, "host: api.test");
        state.popup_newline();
        type_into_popup(&mut state, "token: t");
        state.popup_submit();
        let env = state.storage.current_environment().unwrap();
        assert_eq!(env.variables.len(), 2);
    }

    #[test]
    fn test_pending_import_consumed_at_startup() {
        let mut storage = Storage::in_memory();
        let collection = crate::models::Collection::new("Staged");
        storage.stage_import(&collection).unwrap();

        let state = AppState::new(storage, "https://api.test");
        assert_eq!(state.storage.tree().collections().len(), 1);
        assert!(state.notification.unwrap().message.contains("Staged"));
    }

    #[test]
    fn test_tools_popup_runs_and_remembers_input() {
        let mut state = state();
        state.show_tools();
        state.popup_next();
        state.popup_next();
        type_into_popup(&mut state, "hi");
        state.popup_submit();
        let Some(Popup::Tools { output }) = &state.popup else {
            panic!("tools popup should stay open");
        };
        assert_eq!(output.as_deref(), Some("aGk="));
        state.popup_cancel();

        let scratch: crate::tools::ToolsScratch = state
            .storage
            .read_scratch(crate::constants::TOOL_CONVERTERS)
            .unwrap();
        assert_eq!(scratch.input, "hi");
    }

    #[test]
    fn test_editing_multibyte_text() {
        let mut state = state();
        state.active_panel = Panel::Body;
        state.start_editing();
        state.enter_char('é');
        state.enter_char('x');
        state.move_cursor_left();
        state.delete_char();
        assert_eq!(state.request.body, "x");
    }

    #[test]
    fn test_beautify_response_in_place() {
        let mut state = state();
        state.response = Some(Response {
            status: 200,
            data: r#"{"a":1}"#.into(),
            ..Response::default()
        });
        state.beautify_response();
        assert_eq!(state.response.unwrap().data, "{\n  \"a\": 1\n}");
    }
}
