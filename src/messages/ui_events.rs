//! UI events - messages from UI layer to App layer

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Events generated from user input in the UI layer
#[derive(Debug, Clone)]
pub enum UiEvent {
    // Panel navigation
    NextPanel,
    PrevPanel,
    FocusCollections,
    ScrollUp,
    ScrollDown,

    // Input editing
    StartEditing,
    StopEditing,
    CharInput(char),
    Newline,
    Backspace,
    CursorLeft,
    CursorRight,

    // Request actions
    SendRequest,
    CycleMethod,
    NewRequest,
    SaveRequest,

    // Headers / params lists
    NextRow,
    PrevRow,
    ToggleRow,
    AddRow,
    DeleteRow,
    OpenBulkEdit,

    // Auth
    CycleAuth,
    NextAuthField,
    ToggleApiKeyLocation,

    // Tests
    CycleAssertionType,
    CycleAssertionOperator,
    EditAssertionField,

    // Collections tree
    OpenItem,
    NewCollection,
    NewFolder,
    AddToCollection,
    RenameItem,
    DeleteItem,
    DuplicateItem,
    MoveItem,

    // History
    HistoryPrev,
    HistoryNext,
    ClearHistory,

    // Environments
    CycleEnvironment,
    EditVariables,

    // Response
    BeautifyResponse,

    // cURL
    ShowCurlImport,
    ExportCurl,

    // Other popups
    EditScript,
    ShowTools,
    ShowOpenApiImport,
    ToggleHelp,

    // Popup input
    PopupChar(char),
    PopupNewline,
    PopupBackspace,
    PopupNext,
    PopupUp,
    PopupDown,
    PopupSubmit,
    PopupCancel,
    Paste(String),

    // System
    Quit,
}

/// Active panel in the UI (needed for context-aware event mapping)
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Panel {
    Collections,
    Url,
    Params,
    Headers,
    Body,
    Auth,
    Tests,
    Response,
}

impl Panel {
    pub fn next(&self) -> Panel {
        match self {
            Panel::Collections => Panel::Url,
            Panel::Url => Panel::Params,
            Panel::Params => Panel::Headers,
            Panel::Headers => Panel::Body,
            Panel::Body => Panel::Auth,
            Panel::Auth => Panel::Tests,
            Panel::Tests => Panel::Response,
            Panel::Response => Panel::Collections,
        }
    }

    pub fn prev(&self) -> Panel {
        match self {
            Panel::Collections => Panel::Response,
            Panel::Url => Panel::Collections,
            Panel::Params => Panel::Url,
            Panel::Headers => Panel::Params,
            Panel::Body => Panel::Headers,
            Panel::Auth => Panel::Body,
            Panel::Tests => Panel::Auth,
            Panel::Response => Panel::Tests,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Panel::Collections => "Collections",
            Panel::Url => "URL",
            Panel::Params => "Params",
            Panel::Headers => "Headers",
            Panel::Body => "Body",
            Panel::Auth => "Auth",
            Panel::Tests => "Tests",
            Panel::Response => "Response",
        }
    }
}

/// Input mode
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Auth editing field
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AuthField {
    Token,
    Username,
    Password,
    KeyName,
    KeyValue,
}

/// Which part of the selected assertion is being edited
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TestField {
    Value,
    Field,
}

/// Which list a bulk edit popup writes back to
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BulkTarget {
    Headers,
    Params,
    Variables,
}

impl BulkTarget {
    pub fn title(&self) -> &'static str {
        match self {
            BulkTarget::Headers => "Bulk Edit Headers",
            BulkTarget::Params => "Bulk Edit Params",
            BulkTarget::Variables => "Environment Variables",
        }
    }
}

/// Open popup, as far as key mapping is concerned
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PopupKind {
    #[default]
    None,
    Help,
    /// Read-only text; any key closes
    Output,
    /// One line of input; Enter submits
    SingleLine,
    /// Free text; Enter is a newline, Ctrl+S submits
    MultiLine,
    /// A list; arrows select, Enter submits
    Picker,
    /// Tools: Tab cycles the converter, Enter runs it
    Tools,
}

/// Convert a key event to a UiEvent based on current UI context
pub fn key_to_ui_event(
    key: KeyEvent,
    active_panel: Panel,
    input_mode: InputMode,
    popup: PopupKind,
) -> Option<UiEvent> {
    use crossterm::event::KeyEventKind;

    if key.kind != KeyEventKind::Press {
        return None;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('c') {
        return Some(UiEvent::Quit);
    }

    // Handle popups first
    match popup {
        PopupKind::None => {}
        PopupKind::Help | PopupKind::Output => return Some(UiEvent::PopupCancel),
        PopupKind::SingleLine | PopupKind::MultiLine | PopupKind::Tools => {
            return match key.code {
                KeyCode::Esc => Some(UiEvent::PopupCancel),
                KeyCode::Char('s') if ctrl => Some(UiEvent::PopupSubmit),
                KeyCode::Enter if popup == PopupKind::MultiLine => Some(UiEvent::PopupNewline),
                KeyCode::Enter => Some(UiEvent::PopupSubmit),
                KeyCode::Tab if popup == PopupKind::Tools => Some(UiEvent::PopupNext),
                KeyCode::Tab => Some(UiEvent::PopupChar('\t')),
                KeyCode::Backspace => Some(UiEvent::PopupBackspace),
                KeyCode::Char(c) if !ctrl => Some(UiEvent::PopupChar(c)),
                _ => None,
            };
        }
        PopupKind::Picker => {
            return match key.code {
                KeyCode::Esc => Some(UiEvent::PopupCancel),
                KeyCode::Enter => Some(UiEvent::PopupSubmit),
                KeyCode::Up | KeyCode::Char('k') => Some(UiEvent::PopupUp),
                KeyCode::Down | KeyCode::Char('j') => Some(UiEvent::PopupDown),
                _ => None,
            };
        }
    }

    match input_mode {
        InputMode::Normal => normal_mode_keys(key, active_panel),
        InputMode::Editing => match key.code {
            KeyCode::Esc => Some(UiEvent::StopEditing),
            KeyCode::Left => Some(UiEvent::CursorLeft),
            KeyCode::Right => Some(UiEvent::CursorRight),
            KeyCode::Backspace => Some(UiEvent::Backspace),
            KeyCode::Char(c) => Some(UiEvent::CharInput(c)),
            KeyCode::Tab if active_panel == Panel::Auth => Some(UiEvent::NextAuthField),
            KeyCode::Enter => match active_panel {
                Panel::Url => Some(UiEvent::SendRequest),
                Panel::Body => Some(UiEvent::Newline),
                _ => Some(UiEvent::StopEditing),
            },
            _ => None,
        },
    }
}

/// Panel-specific keys win over the global ones
fn normal_mode_keys(key: KeyEvent, panel: Panel) -> Option<UiEvent> {
    let panel_event = match (panel, key.code) {
        (Panel::Collections, KeyCode::Up) => Some(UiEvent::PrevRow),
        (Panel::Collections, KeyCode::Down) => Some(UiEvent::NextRow),
        (Panel::Collections, KeyCode::Enter) => Some(UiEvent::OpenItem),
        (Panel::Collections, KeyCode::Char('n')) => Some(UiEvent::NewCollection),
        (Panel::Collections, KeyCode::Char('f')) => Some(UiEvent::NewFolder),
        (Panel::Collections, KeyCode::Char('a')) => Some(UiEvent::AddToCollection),
        (Panel::Collections, KeyCode::Char('r')) => Some(UiEvent::RenameItem),
        (Panel::Collections, KeyCode::Char('x')) => Some(UiEvent::DeleteItem),
        (Panel::Collections, KeyCode::Char('D')) => Some(UiEvent::DuplicateItem),
        (Panel::Collections, KeyCode::Char('M')) => Some(UiEvent::MoveItem),

        (Panel::Url | Panel::Body, KeyCode::Char('e') | KeyCode::Enter) => {
            Some(UiEvent::StartEditing)
        }

        (Panel::Headers | Panel::Params, KeyCode::Up) => Some(UiEvent::PrevRow),
        (Panel::Headers | Panel::Params, KeyCode::Down) => Some(UiEvent::NextRow),
        (Panel::Headers | Panel::Params, KeyCode::Enter) => Some(UiEvent::ToggleRow),
        (Panel::Headers | Panel::Params, KeyCode::Char('a')) => Some(UiEvent::AddRow),
        (Panel::Headers | Panel::Params, KeyCode::Char('d')) => Some(UiEvent::DeleteRow),
        (Panel::Headers | Panel::Params, KeyCode::Char('b')) => Some(UiEvent::OpenBulkEdit),

        (Panel::Auth, KeyCode::Char('e') | KeyCode::Enter) => Some(UiEvent::StartEditing),
        (Panel::Auth, KeyCode::Char('t')) => Some(UiEvent::CycleAuth),
        (Panel::Auth, KeyCode::Char('l')) => Some(UiEvent::ToggleApiKeyLocation),

        (Panel::Tests, KeyCode::Up) => Some(UiEvent::PrevRow),
        (Panel::Tests, KeyCode::Down) => Some(UiEvent::NextRow),
        (Panel::Tests, KeyCode::Enter) => Some(UiEvent::ToggleRow),
        (Panel::Tests, KeyCode::Char('a')) => Some(UiEvent::AddRow),
        (Panel::Tests, KeyCode::Char('d')) => Some(UiEvent::DeleteRow),
        (Panel::Tests, KeyCode::Char('t')) => Some(UiEvent::CycleAssertionType),
        (Panel::Tests, KeyCode::Char('o')) => Some(UiEvent::CycleAssertionOperator),
        (Panel::Tests, KeyCode::Char('e')) => Some(UiEvent::StartEditing),
        (Panel::Tests, KeyCode::Char('f')) => Some(UiEvent::EditAssertionField),

        (Panel::Response, KeyCode::Up) => Some(UiEvent::ScrollUp),
        (Panel::Response, KeyCode::Down) => Some(UiEvent::ScrollDown),
        _ => None,
    };
    if panel_event.is_some() {
        return panel_event;
    }

    match key.code {
        KeyCode::Char('q') => Some(UiEvent::Quit),
        KeyCode::Char('?') => Some(UiEvent::ToggleHelp),
        KeyCode::Tab => Some(UiEvent::NextPanel),
        KeyCode::BackTab => Some(UiEvent::PrevPanel),
        KeyCode::Char('w') => Some(UiEvent::FocusCollections),
        KeyCode::Char('s') => Some(UiEvent::SendRequest),
        KeyCode::Char('m') => Some(UiEvent::CycleMethod),
        KeyCode::Char('N') => Some(UiEvent::NewRequest),
        KeyCode::Char('S') => Some(UiEvent::SaveRequest),
        KeyCode::Char('i') => Some(UiEvent::ShowCurlImport),
        KeyCode::Char('c') => Some(UiEvent::ExportCurl),
        KeyCode::Char('[') => Some(UiEvent::HistoryPrev),
        KeyCode::Char(']') => Some(UiEvent::HistoryNext),
        KeyCode::Char('H') => Some(UiEvent::ClearHistory),
        KeyCode::Char('E') => Some(UiEvent::CycleEnvironment),
        KeyCode::Char('V') => Some(UiEvent::EditVariables),
        KeyCode::Char('B') => Some(UiEvent::BeautifyResponse),
        KeyCode::Char('P') => Some(UiEvent::EditScript),
        KeyCode::Char('T') => Some(UiEvent::ShowTools),
        KeyCode::Char('o') => Some(UiEvent::ShowOpenApiImport),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_panel_keys_shadow_globals() {
        let event = key_to_ui_event(press(KeyCode::Char('o')), Panel::Tests, InputMode::Normal, PopupKind::None);
        assert!(matches!(event, Some(UiEvent::CycleAssertionOperator)));
        let event = key_to_ui_event(press(KeyCode::Char('o')), Panel::Url, InputMode::Normal, PopupKind::None);
        assert!(matches!(event, Some(UiEvent::ShowOpenApiImport)));
    }

    #[test]
    fn test_multiline_popup_uses_ctrl_s() {
        let enter = key_to_ui_event(press(KeyCode::Enter), Panel::Url, InputMode::Normal, PopupKind::MultiLine);
        assert!(matches!(enter, Some(UiEvent::PopupNewline)));
        let save = key_to_ui_event(
            KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL),
            Panel::Url,
            InputMode::Normal,
            PopupKind::MultiLine,
        );
        assert!(matches!(save, Some(UiEvent::PopupSubmit)));
    }

    #[test]
    fn test_panel_cycle_is_closed() {
        let mut panel = Panel::Collections;
        for _ in 0..8 {
            panel = panel.next();
        }
        assert_eq!(panel, Panel::Collections);
        assert_eq!(Panel::Url.prev().next(), Panel::Url);
    }
}
