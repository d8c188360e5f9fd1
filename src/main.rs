//! reqnest - Actor-based terminal API client
//!
//! Architecture:
//! - UI Layer (Ratatui) - synchronous terminal rendering
//! - App Layer - central state machine processing events
//! - Network Layer (Tokio) - async HTTP execution

use std::fs;
use std::io;
use std::time::Duration;

use anyhow::Context;
use crossterm::{
    event::{self, DisableBracketedPaste, EnableBracketedPaste, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::*, widgets::*};
use tokio::sync::mpsc;

use reqnest::config::Config;
use reqnest::constants::{APP_NAME, APP_VERSION};
use reqnest::messages::render::PopupView;
use reqnest::messages::ui_events::{key_to_ui_event, AuthField, InputMode, Panel, PopupKind, TestField};
use reqnest::messages::{NetworkCommand, NetworkResponse, RenderState, UiEvent};
use reqnest::models::{ApiKeyLocation, AuthConfig};
use reqnest::storage::backend::FileBackend;
use reqnest::storage::Storage;
use reqnest::ui::{self, highlight_json, mask, method_color, panel_border, status_color};
use reqnest::{AppActor, AppState, NetworkActor};

/// Terminal cleanup guard
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableBracketedPaste, LeaveAlternateScreen);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (home, config) = Config::load()?;
    fs::create_dir_all(&home).with_context(|| format!("creating {}", home.display()))?;

    // Initialize logging to file
    let file_appender = tracing_appender::rolling::never(&home, &config.log_file);
    let (non_blocking, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_max_level(config.log_level())
        .init();
    tracing::info!(version = APP_VERSION, home = %home.display(), "Starting {}", APP_NAME);

    let storage = Storage::open(Box::new(FileBackend::new(config.data_dir(&home))));
    let state = AppState::new(storage, config.default_url.clone());

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let _guard = TerminalGuard;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create channels
    let (ui_tx, ui_rx) = mpsc::unbounded_channel::<UiEvent>();
    let (net_cmd_tx, net_cmd_rx) = mpsc::unbounded_channel::<NetworkCommand>();
    let (net_resp_tx, net_resp_rx) = mpsc::unbounded_channel::<NetworkResponse>();
    let (render_tx, mut render_rx) = mpsc::unbounded_channel::<RenderState>();

    // Spawn network actor
    let network_actor = NetworkActor::new(net_resp_tx, config.request_timeout());
    tokio::spawn(network_actor.run(net_cmd_rx));

    // Spawn app actor
    let app_actor = AppActor::new(state, net_cmd_tx, render_tx);
    let app_handle = tokio::spawn(app_actor.run(ui_rx, net_resp_rx));

    // Run UI loop (synchronous with async polling)
    run_ui_loop(&mut terminal, ui_tx, &mut render_rx).await?;

    // Let the app actor persist the editor before exiting
    let _ = app_handle.await;
    tracing::info!("Shutting down");
    Ok(())
}

/// Run the synchronous UI rendering loop
async fn run_ui_loop(
    terminal: &mut Terminal<impl Backend>,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
    render_rx: &mut mpsc::UnboundedReceiver<RenderState>,
) -> anyhow::Result<()> {
    let mut current_state = RenderState::default();

    loop {
        // Draw with current state
        terminal.draw(|f| draw_ui(f, &current_state))?;

        // Poll for events with timeout
        if event::poll(Duration::from_millis(50))? {
            let ui_event = match event::read()? {
                Event::Key(key) => key_to_ui_event(
                    key,
                    current_state.active_panel,
                    current_state.input_mode,
                    current_state.popup_kind(),
                ),
                Event::Paste(text) => Some(UiEvent::Paste(text)),
                _ => None,
            };

            if let Some(event) = ui_event {
                let quit = matches!(event, UiEvent::Quit);
                let _ = ui_tx.send(event);
                if quit {
                    break;
                }
            }
        }

        // Check for state updates (non-blocking)
        while let Ok(state) = render_rx.try_recv() {
            current_state = state;
        }
    }

    Ok(())
}

// ============================================================================
// UI Drawing Functions
// ============================================================================

fn draw_ui(f: &mut Frame, state: &RenderState) {
    let area = f.area();

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(28), Constraint::Percentage(72)])
        .split(main_chunks[0]);

    draw_collections(f, state, columns[0]);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // Method + URL
            Constraint::Length(10), // Request panels
            Constraint::Min(5),     // Response
        ])
        .split(columns[1]);

    draw_url_bar(f, state, chunks[0]);
    draw_middle_panels(f, state, chunks[1]);
    draw_response(f, state, chunks[2]);
    draw_status_bar(f, state, main_chunks[1]);

    if let Some(popup) = &state.popup {
        match popup.kind {
            PopupKind::Help => draw_help_popup(f, area),
            PopupKind::Picker => draw_picker_popup(f, popup, area),
            PopupKind::None => {}
            _ => draw_text_popup(f, popup, area),
        }
    }
}

fn is_editing(state: &RenderState, panel: Panel) -> bool {
    state.active_panel == panel && state.input_mode == InputMode::Editing
}

/// Place the terminal cursor after `prefix` + the first `cursor` bytes of `text`
fn set_inline_cursor(f: &mut Frame, area: Rect, row: u16, prefix: usize, text: &str, cursor: usize) {
    let cursor = cursor.min(text.len());
    let column = prefix + text.get(..cursor).map(|t| t.chars().count()).unwrap_or(0);
    let max_x = area.x + area.width.saturating_sub(2);
    let cursor_x = (area.x + column as u16 + 1).min(max_x);
    f.set_cursor_position(Position::new(cursor_x, area.y + 1 + row));
}

fn draw_collections(f: &mut Frame, state: &RenderState, area: Rect) {
    let is_focused = state.active_panel == Panel::Collections;

    let items: Vec<ListItem> = state.tree_rows.iter().map(|row| ListItem::new(ui::tree_row_line(row))).collect();
    let title = if items.is_empty() {
        " Collections (n:new) "
    } else {
        " Collections "
    };

    let highlight_style = if is_focused {
        Style::default().bg(Color::DarkGray).bold()
    } else {
        Style::default()
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(panel_border(is_focused, false))
                .title(title),
        )
        .highlight_style(highlight_style);

    let mut list_state = ListState::default();
    if !state.tree_rows.is_empty() {
        list_state.select(Some(state.selected_row));
    }
    f.render_stateful_widget(list, area, &mut list_state);
}

fn draw_url_bar(f: &mut Frame, state: &RenderState, area: Rect) {
    let is_focused = state.active_panel == Panel::Url;
    let method = state.request.method;

    let loading = if state.pending_sends > 0 {
        format!(" [{} in flight]", state.pending_sends)
    } else {
        String::new()
    };
    let history_indicator = state
        .history_index
        .map(|i| format!(" [history {}/{}]", i + 1, state.history_len))
        .unwrap_or_default();
    let bound = state
        .bound_item
        .as_deref()
        .map(|name| format!(" {} ", name))
        .unwrap_or_else(|| String::from(" unsaved "));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(panel_border(is_focused, state.input_mode == InputMode::Editing))
        .title(format!(" {}{}{} ", method.as_str(), loading, history_indicator))
        .title_style(Style::default().fg(method_color(method)).bold())
        .title_top(Line::from(bound).right_aligned());

    let input = Paragraph::new(state.request.url.as_str()).block(block);
    f.render_widget(input, area);

    if is_editing(state, Panel::Url) {
        set_inline_cursor(f, area, 0, 0, &state.request.url, state.cursor_position);
    }
}

fn draw_middle_panels(f: &mut Frame, state: &RenderState, area: Rect) {
    let tabs_area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(area);

    // Tab bar
    let tab_titles = vec!["Params", "Headers", "Body", "Auth", "Tests"];
    let selected_tab = match state.active_panel {
        Panel::Params => 0,
        Panel::Headers => 1,
        Panel::Body => 2,
        Panel::Auth => 3,
        Panel::Tests => 4,
        _ => 2,
    };

    let tabs = ui::render_tabs(&tab_titles, selected_tab);
    f.render_widget(tabs, tabs_area[0]);

    // Panel content
    let content_area = tabs_area[1];

    match state.active_panel {
        Panel::Params => {
            let list = ui::render_key_value_list(
                &state.request.params,
                " Params (a:add d:del b:bulk Enter:toggle) ",
                Some(state.selected_param),
                true,
            );
            f.render_widget(list, content_area);
        }
        Panel::Headers => {
            let list = ui::render_key_value_list(
                &state.request.headers,
                " Headers (a:add d:del b:bulk Enter:toggle) ",
                Some(state.selected_header),
                true,
            );
            f.render_widget(list, content_area);
        }
        Panel::Auth => draw_auth_panel(f, state, content_area),
        Panel::Tests => draw_tests_panel(f, state, content_area),
        _ => draw_body_panel(f, state, content_area),
    }
}

fn draw_body_panel(f: &mut Frame, state: &RenderState, area: Rect) {
    let is_focused = state.active_panel == Panel::Body;
    let method = state.request.method;

    let title = if method.has_body() {
        String::from(" Body ")
    } else {
        format!(" Body (not sent with {}) ", method.as_str())
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(panel_border(is_focused, state.input_mode == InputMode::Editing))
        .title(title);

    let body = Paragraph::new(state.request.body.as_str())
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(body, area);

    if is_editing(state, Panel::Body) {
        let body = state.request.body.as_str();
        let before = body.get(..state.cursor_position).unwrap_or(body);
        let row = before.matches('\n').count() as u16;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        set_inline_cursor(f, area, row, 0, &body[line_start..], before.len() - line_start);
    }
}

fn draw_auth_panel(f: &mut Frame, state: &RenderState, area: Rect) {
    let is_focused = state.active_panel == Panel::Auth;
    let editing = is_editing(state, Panel::Auth);

    let field = |label: &str, value: String, active: bool| {
        let style = if active && is_focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        Line::from(vec![
            Span::styled(format!("{:<10}", label), Style::default().fg(Color::DarkGray)),
            Span::styled(value, style),
        ])
    };
    let show = |value: &str| {
        if value.is_empty() {
            String::from("<empty>")
        } else {
            value.to_string()
        }
    };

    let (lines, editing_value): (Vec<Line>, Option<(u16, &str)>) = match &state.request.auth {
        AuthConfig::None => (
            vec![Line::from("No authentication. Press 't' to cycle auth type.")],
            None,
        ),
        AuthConfig::Bearer { token } => (
            vec![field("Token", show(token), true)],
            Some((0, token.as_str())),
        ),
        AuthConfig::Basic { username, password } => {
            let on_user = state.auth_field == AuthField::Username;
            (
                vec![
                    field("Username", show(username), on_user),
                    field("Password", mask(password), !on_user),
                ],
                Some(if on_user { (0, username.as_str()) } else { (1, password.as_str()) }),
            )
        }
        AuthConfig::ApiKey {
            key_name,
            key_value,
            key_location,
        } => {
            let on_name = state.auth_field == AuthField::KeyName;
            let location = match key_location {
                ApiKeyLocation::Header => "header",
                ApiKeyLocation::Query => "query",
            };
            (
                vec![
                    field("Key", show(key_name), on_name),
                    field("Value", show(key_value), !on_name),
                    field("Add to", format!("{} (l:toggle)", location), false),
                ],
                Some(if on_name { (0, key_name.as_str()) } else { (1, key_value.as_str()) }),
            )
        }
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(panel_border(is_focused, editing))
        .title(format!(" Auth: {} (t:cycle e:edit Tab:field) ", state.request.auth.label()));

    f.render_widget(Paragraph::new(lines).block(block), area);

    if editing {
        if let Some((row, value)) = editing_value {
            // Masked password shows one '*' per char, same width
            set_inline_cursor(f, area, row, 10, value, state.cursor_position);
        }
    }
}

fn draw_tests_panel(f: &mut Frame, state: &RenderState, area: Rect) {
    let editing = is_editing(state, Panel::Tests);

    let items: Vec<ListItem> = state
        .request
        .tests
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let style = if !t.enabled {
                Style::default().fg(Color::DarkGray)
            } else if i == state.selected_test {
                Style::default().fg(Color::Yellow).bold()
            } else {
                Style::default()
            };
            let prefix = if t.enabled { "[x]" } else { "[ ]" };
            let field = t
                .field
                .as_deref()
                .filter(|f| !f.is_empty())
                .map(|f| format!(" {}", f))
                .unwrap_or_default();
            ListItem::new(format!(
                "{} {}{} {} '{}'",
                prefix,
                t.kind.as_str(),
                field,
                t.operator.as_str(),
                t.value
            ))
            .style(style)
        })
        .collect();

    let title = if editing {
        match state.test_field {
            TestField::Value => " Tests: editing value (Esc:done) ",
            TestField::Field => " Tests: editing header name (Esc:done) ",
        }
    } else {
        " Tests (a:add d:del t:type o:op e:value f:field) "
    };

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(panel_border(true, editing))
            .title(title),
    );
    f.render_widget(list, area);
}

fn draw_response(f: &mut Frame, state: &RenderState, area: Rect) {
    let is_focused = state.active_panel == Panel::Response;

    let Some(response) = &state.response else {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(panel_border(is_focused, false))
            .title(" Response ");
        let hint = Paragraph::new("Press 's' to send the request.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(hint, area);
        return;
    };

    let status_text = if response.is_error() {
        Span::styled(" Error ", Style::default().fg(Color::Red).bold())
    } else {
        Span::styled(
            format!(" {} {} ", response.status, response.status_text),
            Style::default().fg(status_color(response.status)).bold(),
        )
    };

    let footer = format!(" {}ms | {} bytes ", response.time, response.size);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(panel_border(is_focused, false))
        .title(status_text)
        .title_bottom(Line::from(footer).right_aligned());

    let mut lines = ui::test_result_lines(&response.test_results);
    if !lines.is_empty() {
        lines.push(Line::from(""));
    }
    // Use syntax highlighting for JSON
    lines.extend(highlight_json(&response.data));

    let response_view = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((state.response_scroll, 0));
    f.render_widget(response_view, area);
}

fn draw_status_bar(f: &mut Frame, state: &RenderState, area: Rect) {
    if let Some(note) = &state.notification {
        let color = if note.is_error { Color::Red } else { Color::Green };
        let bar = Paragraph::new(format!(" {} ", note.message)).style(Style::default().fg(color));
        f.render_widget(bar, area);
        return;
    }

    let env = state
        .environment
        .as_deref()
        .map(|name| format!(" env:{} |", name))
        .unwrap_or_default();
    let status = if state.input_mode == InputMode::Editing {
        String::from(" ESC:stop editing | arrows:move | Enter:send (URL) ")
    } else {
        format!(
            "{} Tab:panel | e:edit | m:method | s:send | S:save | ?:help | q:quit ",
            env
        )
    };

    let bar = Paragraph::new(status).style(Style::default().fg(Color::DarkGray));
    f.render_widget(bar, area);
}

fn draw_help_popup(f: &mut Frame, area: Rect) {
    let popup_area = ui::centered_rect(70, 85, area);

    let help_text = r#"
 REQNEST - Keyboard Shortcuts

 NAVIGATION
   Tab / Shift+Tab    Switch panels
   w                  Focus collections
   [ / ]              Older / newer history entry
   H                  Clear history

 REQUEST
   m                  Cycle HTTP method
   s                  Send request (Enter while editing the URL)
   e / Enter          Edit current field
   N / S              New request / save into its collection item
   P                  Edit pre-request script
   i / c              Import / export cURL
   o                  Import OpenAPI file

 COLLECTIONS
   n / f              New collection / folder
   a                  Save editor into selection
   Enter              Open request
   r  x  D  M         Rename, delete, duplicate, move

 HEADERS / PARAMS / TESTS
   a / d              Add / delete row
   Enter              Toggle row
   b                  Bulk edit (headers, params)
   t / o / f          Assertion type / operator / header name

 ENVIRONMENTS & TOOLS
   E / V              Cycle environment / edit variables
   B                  Beautify JSON response
   T                  Converters (JSON, Base64, URL, timestamps)

 GENERAL
   ?                  Toggle this help
   q / Ctrl+C         Quit

 Press any key to close...
"#;

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Help ")
        .style(Style::default().bg(Color::Black));

    let help = Paragraph::new(help_text)
        .block(block)
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(help, popup_area);
}

fn draw_text_popup(f: &mut Frame, popup: &PopupView, area: Rect) {
    let height = match popup.kind {
        PopupKind::SingleLine => 25,
        _ => 60,
    };
    let popup_area = ui::centered_rect(80, height, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", popup.title))
        .title_bottom(Line::from(format!(" {} ", popup.hint)).right_aligned())
        .style(Style::default().bg(Color::Black));

    let mut lines: Vec<Line> = if popup.body.is_empty() && popup.kind != PopupKind::Output {
        vec![Line::styled("Type or paste here...", Style::default().fg(Color::DarkGray))]
    } else {
        popup.body.lines().map(|l| Line::from(l.to_string())).collect()
    };
    if let Some(output) = &popup.output {
        lines.push(Line::from(""));
        lines.push(Line::styled("Result:", Style::default().fg(Color::Cyan).bold()));
        lines.extend(output.lines().map(|l| Line::from(l.to_string())));
    }

    let content = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(content, popup_area);
}

fn draw_picker_popup(f: &mut Frame, popup: &PopupView, area: Rect) {
    let popup_area = ui::centered_rect(50, 50, area);

    let items: Vec<ListItem> = popup.items.iter().map(|i| ListItem::new(i.as_str())).collect();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", popup.title))
                .title_bottom(Line::from(format!(" {} ", popup.hint)).right_aligned())
                .style(Style::default().bg(Color::Black)),
        )
        .highlight_style(Style::default().fg(Color::Yellow).bold())
        .highlight_symbol("> ");

    let mut list_state = ListState::default();
    if !popup.items.is_empty() {
        list_state.select(Some(popup.selected));
    }

    f.render_widget(Clear, popup_area);
    f.render_stateful_widget(list, popup_area, &mut list_state);
}
