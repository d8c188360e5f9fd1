//! `Key: value` text form for header, param and variable lists

use crate::models::Header;
use std::collections::HashMap;

/// One pair per non-blank line, split at the first `:`
pub fn parse_bulk(text: &str) -> Vec<Header> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once(':') {
            Some((key, value)) => Header::new(key.trim(), value.trim()),
            None => Header::new(line, ""),
        })
        .collect()
}

/// Inverse of [`parse_bulk`]; disabled pairs are kept
pub fn format_bulk(pairs: &[Header]) -> String {
    pairs
        .iter()
        .map(|h| format!("{}: {}", h.key, h.value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Environment variables in bulk form, sorted by name
pub fn format_variables(variables: &HashMap<String, String>) -> String {
    let mut names: Vec<&String> = variables.keys().collect();
    names.sort();
    names
        .into_iter()
        .map(|name| format!("{}: {}", name, variables[name]))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn parse_variables(text: &str) -> HashMap<String, String> {
    parse_bulk(text)
        .into_iter()
        .filter(|h| !h.key.is_empty())
        .map(|h| (h.key, h.value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_headers() {
        let headers = parse_bulk("Content-Type: application/json\nAuthorization: Bearer x");
        assert_eq!(
            headers,
            vec![
                Header::new("Content-Type", "application/json"),
                Header::new("Authorization", "Bearer x"),
            ]
        );
    }

    #[test]
    fn test_parse_blank_lines_and_missing_colon() {
        let headers = parse_bulk("\n  X-Time: 12:30 \n\nflag\n");
        assert_eq!(headers, vec![Header::new("X-Time", "12:30"), Header::new("flag", "")]);
    }

    #[test]
    fn test_format_is_inverse() {
        let text = "Accept: */*\nX-Id: 7";
        assert_eq!(format_bulk(&parse_bulk(text)), text);
    }

    #[test]
    fn test_variables_sorted() {
        let vars = parse_variables("token: abc\nhost: api.test\n: dropped");
        assert_eq!(vars.len(), 2);
        assert_eq!(format_variables(&vars), "host: api.test\ntoken: abc");
    }
}
