use ratatui::{prelude::*, widgets::*};

use crate::collections::{ItemKind, TreeRow};
use crate::models::{Header, HttpMethod, TestResult};

/// Border style of a panel given its focus and the input mode
pub fn panel_border(is_focused: bool, is_editing: bool) -> Style {
    if is_focused && is_editing {
        Style::default().fg(Color::Yellow)
    } else if is_focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

/// Renders a key-value list (headers, params)
pub fn render_key_value_list<'a>(
    items: &'a [Header],
    title: &'a str,
    selected: Option<usize>,
    is_focused: bool,
) -> List<'a> {
    let items: Vec<ListItem> = items
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let style = if !h.enabled {
                Style::default().fg(Color::DarkGray)
            } else if Some(i) == selected {
                Style::default().fg(Color::Yellow).bold()
            } else {
                Style::default()
            };

            let prefix = if h.enabled { "[x]" } else { "[ ]" };
            ListItem::new(format!("{} {}: {}", prefix, h.key, h.value)).style(style)
        })
        .collect();

    List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(panel_border(is_focused, false))
            .title(title),
    )
}

/// Renders tabs
pub fn render_tabs<'a>(titles: &[&'a str], selected: usize) -> Tabs<'a> {
    let titles: Vec<Line> = titles.iter().map(|t| Line::from(*t)).collect();

    Tabs::new(titles)
        .select(selected)
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(Style::default().fg(Color::Yellow).bold())
        .divider("|")
}

/// One sidebar line: indentation, icon, method badge and label
pub fn tree_row_line(row: &TreeRow) -> Line<'static> {
    let indent = "  ".repeat(row.depth);
    let mut spans = vec![Span::raw(indent)];
    match row.kind {
        ItemKind::Collection => {
            spans.push(Span::styled(
                format!("▾ {}", row.label),
                Style::default().fg(Color::White).bold(),
            ));
        }
        ItemKind::Folder => {
            spans.push(Span::styled(
                format!("▸ {}", row.label),
                Style::default().fg(Color::Blue),
            ));
        }
        ItemKind::Request => {
            let method = row.method.unwrap_or(HttpMethod::GET);
            spans.push(Span::styled(
                format!("{:6} ", method.as_str()),
                Style::default().fg(method_color(method)).bold(),
            ));
            spans.push(Span::raw(row.label.clone()));
        }
    }
    Line::from(spans)
}

/// Pass/fail lines for the response panel
pub fn test_result_lines(results: &[TestResult]) -> Vec<Line<'static>> {
    results
        .iter()
        .map(|r| {
            let (mark, color) = if r.passed {
                ("PASS", Color::Green)
            } else {
                ("FAIL", Color::Red)
            };
            Line::from(vec![
                Span::styled(format!("{} ", mark), Style::default().fg(color).bold()),
                Span::raw(r.message.clone()),
            ])
        })
        .collect()
}

/// Replace every character with `*`
pub fn mask(secret: &str) -> String {
    if secret.is_empty() {
        String::from("<empty>")
    } else {
        "*".repeat(secret.chars().count())
    }
}

/// Simple JSON syntax highlighting
pub fn highlight_json(text: &str) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    for line in text.lines() {
        let mut spans = Vec::new();
        let mut current = String::new();
        let mut in_string = false;
        let mut is_key = false;
        let mut escaped = false;

        for (pos, c) in line.char_indices() {
            if in_string {
                current.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    let color = if is_key { Color::Cyan } else { Color::Green };
                    spans.push(Span::styled(current.clone(), Style::default().fg(color)));
                    current.clear();
                    in_string = false;
                }
                continue;
            }

            match c {
                '"' => {
                    if !current.is_empty() {
                        spans.push(Span::raw(current.clone()));
                        current.clear();
                    }
                    in_string = true;
                    current.push(c);
                    // A key is a string followed by ':'
                    is_key = closing_quote(line, pos)
                        .map(|end| line[end + 1..].trim_start().starts_with(':'))
                        .unwrap_or(false);
                }
                ':' => {
                    flush_token(&mut spans, &mut current);
                    spans.push(Span::styled(":", Style::default().fg(Color::White)));
                }
                '{' | '}' | '[' | ']' => {
                    flush_token(&mut spans, &mut current);
                    spans.push(Span::styled(
                        c.to_string(),
                        Style::default().fg(Color::Yellow),
                    ));
                }
                ',' | ' ' => {
                    flush_token(&mut spans, &mut current);
                    spans.push(Span::raw(c.to_string()));
                }
                _ => current.push(c),
            }
        }

        if in_string {
            spans.push(Span::styled(current, Style::default().fg(Color::Green)));
        } else {
            flush_token(&mut spans, &mut current);
        }
        lines.push(Line::from(spans));
    }

    lines
}

/// Byte offset of the quote closing the string opened at `start`
fn closing_quote(line: &str, start: usize) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in line[start + 1..].char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(start + 1 + i),
            _ => {}
        }
    }
    None
}

/// Emit a bare token, coloring numbers and literals
fn flush_token(spans: &mut Vec<Span<'static>>, current: &mut String) {
    if current.is_empty() {
        return;
    }
    let token = std::mem::take(current);
    let style = if matches!(token.as_str(), "true" | "false" | "null") {
        Style::default().fg(Color::Magenta)
    } else if token.parse::<f64>().is_ok() {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    spans.push(Span::styled(token, style));
}

/// Status code color
pub fn status_color(code: u16) -> Color {
    match code {
        200..=299 => Color::Green,
        300..=399 => Color::Cyan,
        400..=499 => Color::Red,
        500..=599 => Color::Magenta,
        _ => Color::Yellow,
    }
}

/// Method color
pub fn method_color(method: HttpMethod) -> Color {
    match method {
        HttpMethod::GET => Color::Green,
        HttpMethod::POST => Color::Yellow,
        HttpMethod::PUT => Color::Blue,
        HttpMethod::PATCH => Color::Cyan,
        HttpMethod::DELETE => Color::Red,
        HttpMethod::HEAD | HttpMethod::OPTIONS => Color::Magenta,
        HttpMethod::FOLDER => Color::DarkGray,
    }
}

pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_highlight_keeps_text() {
        let text = "{\n  \"name\": \"a:b\",\n  \"n\": -1.5,\n  \"ok\": true\n}";
        let lines = highlight_json(text);
        let rendered: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(rendered.join("\n"), text);
    }

    #[test]
    fn test_highlight_key_and_value_colors() {
        let lines = highlight_json(r#""k": "v""#);
        let key = &lines[0].spans[0];
        assert_eq!(key.content, "\"k\"");
        assert_eq!(key.style.fg, Some(Color::Cyan));
        let value = lines[0].spans.last().unwrap();
        assert_eq!(value.content, "\"v\"");
        assert_eq!(value.style.fg, Some(Color::Green));
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask("abc"), "***");
        assert_eq!(mask(""), "<empty>");
    }
}
