//! App actor - message loop processing UI events and network responses

use tokio::sync::mpsc;

use crate::app::state::AppState;
use crate::messages::ui_events::InputMode;
use crate::messages::{NetworkCommand, NetworkResponse, RenderState, UiEvent};

/// App actor that processes UI events and network responses
pub struct AppActor {
    state: AppState,
    network_tx: mpsc::UnboundedSender<NetworkCommand>,
    render_tx: mpsc::UnboundedSender<RenderState>,
}

impl AppActor {
    pub fn new(
        state: AppState,
        network_tx: mpsc::UnboundedSender<NetworkCommand>,
        render_tx: mpsc::UnboundedSender<RenderState>,
    ) -> Self {
        AppActor {
            state,
            network_tx,
            render_tx,
        }
    }

    /// Run the actor message loop
    pub async fn run(
        mut self,
        mut ui_rx: mpsc::UnboundedReceiver<UiEvent>,
        mut net_rx: mpsc::UnboundedReceiver<NetworkResponse>,
    ) {
        // Send initial render state
        let _ = self.render_tx.send(self.state.to_render_state());

        loop {
            tokio::select! {
                Some(event) = ui_rx.recv() => {
                    if self.handle_ui_event(event) {
                        // Quit signal received
                        self.state.save_editor_scratch();
                        let _ = self.network_tx.send(NetworkCommand::Shutdown);
                        break;
                    }
                    let _ = self.render_tx.send(self.state.to_render_state());
                }
                Some(response) = net_rx.recv() => {
                    self.state.handle_response(response);
                    let _ = self.render_tx.send(self.state.to_render_state());
                }
                else => break,
            }
        }
    }

    /// Handle a UI event, returns true if quit was requested
    fn handle_ui_event(&mut self, event: UiEvent) -> bool {
        // Notifications last until the next key press
        if !matches!(event, UiEvent::Paste(_)) {
            self.state.notification = None;
        }

        match event {
            // Panel navigation
            UiEvent::NextPanel => self.state.next_panel(),
            UiEvent::PrevPanel => self.state.prev_panel(),
            UiEvent::FocusCollections => self.state.focus_collections(),
            UiEvent::ScrollUp => self.state.scroll_up(),
            UiEvent::ScrollDown => self.state.scroll_down(),

            // Input editing
            UiEvent::StartEditing => self.state.start_editing(),
            UiEvent::StopEditing => self.state.stop_editing(),
            UiEvent::CharInput(c) => self.state.enter_char(c),
            UiEvent::Newline => self.state.enter_char('\n'),
            UiEvent::Backspace => self.state.delete_char(),
            UiEvent::CursorLeft => self.state.move_cursor_left(),
            UiEvent::CursorRight => self.state.move_cursor_right(),

            // Request actions
            UiEvent::CycleMethod => self.state.cycle_method(),
            UiEvent::NewRequest => self.state.new_request(),
            UiEvent::SaveRequest => self.state.save_request(),
            UiEvent::SendRequest => {
                // Stop editing first if in URL panel
                if self.state.input_mode == InputMode::Editing {
                    self.state.stop_editing();
                }
                if let Some(cmd) = self.state.prepare_request() {
                    let _ = self.network_tx.send(cmd);
                }
            }

            // Row lists
            UiEvent::NextRow => self.state.next_row(),
            UiEvent::PrevRow => self.state.prev_row(),
            UiEvent::ToggleRow => self.state.toggle_row(),
            UiEvent::AddRow => self.state.add_row(),
            UiEvent::DeleteRow => self.state.delete_row(),
            UiEvent::OpenBulkEdit => self.state.open_bulk_edit(),

            // Auth
            UiEvent::CycleAuth => self.state.cycle_auth(),
            UiEvent::NextAuthField => self.state.next_auth_field(),
            UiEvent::ToggleApiKeyLocation => self.state.toggle_api_key_location(),

            // Tests
            UiEvent::CycleAssertionType => self.state.cycle_assertion_type(),
            UiEvent::CycleAssertionOperator => self.state.cycle_assertion_operator(),
            UiEvent::EditAssertionField => self.state.edit_assertion_field(),

            // Collections tree
            UiEvent::OpenItem => self.state.open_item(),
            UiEvent::NewCollection => self.state.new_collection(),
            UiEvent::NewFolder => self.state.new_folder(),
            UiEvent::AddToCollection => self.state.add_to_collection(),
            UiEvent::RenameItem => self.state.rename_item(),
            UiEvent::DeleteItem => self.state.delete_item(),
            UiEvent::DuplicateItem => self.state.duplicate_item(),
            UiEvent::MoveItem => self.state.move_item(),

            // History
            UiEvent::HistoryPrev => self.state.history_prev(),
            UiEvent::HistoryNext => self.state.history_next(),
            UiEvent::ClearHistory => self.state.clear_history(),

            // Environments
            UiEvent::CycleEnvironment => self.state.cycle_environment(),
            UiEvent::EditVariables => self.state.edit_variables(),

            UiEvent::BeautifyResponse => self.state.beautify_response(),

            // cURL
            UiEvent::ShowCurlImport => self.state.show_curl_import(),
            UiEvent::ExportCurl => self.state.export_curl(),

            // Popups
            UiEvent::EditScript => self.state.edit_script(),
            UiEvent::ShowTools => self.state.show_tools(),
            UiEvent::ShowOpenApiImport => self.state.show_openapi_import(),
            UiEvent::ToggleHelp => self.state.toggle_help(),
            UiEvent::PopupChar(c) => self.state.popup_char(c),
            UiEvent::PopupNewline => self.state.popup_newline(),
            UiEvent::PopupBackspace => self.state.popup_backspace(),
            UiEvent::PopupNext => self.state.popup_next(),
            UiEvent::PopupUp => self.state.popup_select(false),
            UiEvent::PopupDown => self.state.popup_select(true),
            UiEvent::PopupSubmit => self.state.popup_submit(),
            UiEvent::PopupCancel => self.state.popup_cancel(),
            UiEvent::Paste(text) => self.state.paste(&text),

            // System
            UiEvent::Quit => return true,
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    #[tokio::test]
    async fn test_send_then_quit() {
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let (_net_tx, net_rx) = mpsc::unbounded_channel();
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let (render_tx, mut render_rx) = mpsc::unbounded_channel();

        let state = AppState::new(Storage::in_memory(), "https://api.test");
        let handle = tokio::spawn(AppActor::new(state, cmd_tx, render_tx).run(ui_rx, net_rx));

        ui_tx.send(UiEvent::SendRequest).unwrap();
        ui_tx.send(UiEvent::SendRequest).unwrap();
        ui_tx.send(UiEvent::Quit).unwrap();
        handle.await.unwrap();

        let mut ids = Vec::new();
        while let Ok(cmd) = cmd_rx.try_recv() {
            if let NetworkCommand::ExecuteRequest { id, .. } = cmd {
                ids.push(id);
            }
        }
        assert_eq!(ids, vec![1, 2]);

        let mut last = None;
        while let Ok(render) = render_rx.try_recv() {
            last = Some(render);
        }
        assert_eq!(last.unwrap().pending_sends, 2);
    }
}
