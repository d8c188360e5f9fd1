use crate::auth;
use crate::models::{AuthConfig, Header, HttpMethod, Request};
use anyhow::{anyhow, bail, Result};
use reqwest::Url;

/// Flags whose next token is their value
const VALUE_FLAGS: &[&str] = &[
    "-X", "--request", "-H", "--header", "-d", "--data", "--data-raw", "--data-binary",
    "--data-urlencode", "-u", "--user", "-A", "--user-agent", "-b", "--cookie", "-e",
    "--referer", "-o", "--output", "-F", "--form", "-m", "--max-time", "--connect-timeout",
    "--url", "-x", "--proxy", "--cert", "--key", "--cacert",
];

const DATA_FLAGS: &[&str] = &["-d", "--data", "--data-raw", "--data-binary", "--data-urlencode"];

/// Parse a cURL command into a Request
pub fn parse_curl(input: &str) -> Result<Request> {
    if input.trim().is_empty() {
        bail!("Empty cURL command");
    }

    let mut request = Request {
        name: String::from("Imported Request"),
        headers: Vec::new(),
        ..Request::default()
    };
    request.url.clear();

    let mut tokens = split_curl_command(input);

    // Skip 'curl' command if present
    if tokens.first().map(|s| s.as_str()) == Some("curl") {
        tokens.remove(0);
    }

    let mut url: Option<String> = None;
    let mut body: Option<String> = None;
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        let (token, value) = if let Some(method) = attached_method(token) {
            ("-X", Some(method))
        } else if VALUE_FLAGS.contains(&token) {
            i += 1;
            (token, tokens.get(i).map(|s| s.as_str()))
        } else {
            (token, None)
        };

        match (token, value) {
            ("-X" | "--request", Some(method)) => {
                request.method = HttpMethod::parse(method).unwrap_or_else(|| {
                    tracing::warn!(method, "Unsupported method in cURL command, using GET");
                    HttpMethod::GET
                });
            }
            ("-H" | "--header", Some(raw)) => {
                if let Some(header) = parse_header(raw) {
                    request.headers.push(header);
                }
            }
            ("-A" | "--user-agent", Some(agent)) => {
                request.headers.push(Header::new("User-Agent", agent));
            }
            ("-b" | "--cookie", Some(cookie)) => {
                request.headers.push(Header::new("Cookie", cookie));
            }
            ("-u" | "--user", Some(credentials)) => {
                let (username, password) = parse_basic_auth(credentials);
                request.auth = AuthConfig::Basic { username, password };
            }
            ("--url", Some(target)) => {
                url.get_or_insert_with(|| strip_quotes(target).to_string());
            }
            (flag, Some(data)) if DATA_FLAGS.contains(&flag) => {
                body.get_or_insert_with(|| strip_quotes(data).to_string());
            }
            (flag, _) if flag.starts_with('-') => {
                // Ignored flags (--compressed, -k, -L, ...) and their values
            }
            (bare, _) => {
                if url.is_none() && HttpMethod::parse(bare).is_none() {
                    url = Some(strip_quotes(bare).to_string());
                }
            }
        }
        i += 1;
    }

    let url = url.ok_or_else(|| anyhow!("No URL found in cURL command"))?;
    match url.split_once('?') {
        Some((base, query)) => {
            request.url = base.to_string();
            request.params = parse_query(query);
        }
        None => request.url = url,
    }

    if let Some(body) = body {
        fix_multipart_content_type(&mut request.headers, &body);
        request.body = body;
    }

    Ok(request)
}

/// The method of `-XPOST` or `--request=POST`
fn attached_method(token: &str) -> Option<&str> {
    if let Some(method) = token.strip_prefix("--request=") {
        return Some(method);
    }
    token.strip_prefix("-X").filter(|method| !method.is_empty())
}

fn strip_quotes(s: &str) -> &str {
    s.trim_matches(|c| c == '\'' || c == '"')
}

fn parse_header(s: &str) -> Option<Header> {
    let (key, value) = s.split_once(':')?;
    Some(Header::new(key.trim(), value.trim()))
}

fn parse_basic_auth(s: &str) -> (String, String) {
    match s.split_once(':') {
        Some((user, pass)) => (user.to_string(), pass.to_string()),
        None => (s.to_string(), String::new()),
    }
}

/// Decode `a=1&b=two` into pairs
fn parse_query(query: &str) -> Vec<Header> {
    match Url::parse(&format!("http://localhost/?{}", query)) {
        Ok(parsed) => parsed
            .query_pairs()
            .map(|(k, v)| Header::new(k.into_owned(), v.into_owned()))
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Browser dev tools often pair a JSON body with a multipart content type
fn fix_multipart_content_type(headers: &mut [Header], body: &str) {
    let trimmed = body.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return;
    }
    for header in headers.iter_mut() {
        if header.key.eq_ignore_ascii_case("content-type")
            && header.value.to_lowercase().starts_with("multipart/form-data")
        {
            header.value = String::from("application/json");
        }
    }
}

/// Tokenize a curl command, respecting quotes
///
/// Line continuations and newlines become spaces. Unterminated quotes are
/// tolerated: the rest of the input becomes the final token.
pub fn split_curl_command(input: &str) -> Vec<String> {
    let normalized = input
        .replace("\\\r\n", " ")
        .replace("\\\n", " ")
        .replace(['\r', '\n'], " ");

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escape_next = false;
    // Distinguishes `''` (an empty token) from no token at all
    let mut quoted = false;

    for c in normalized.chars() {
        if escape_next {
            current.push(c);
            escape_next = false;
            continue;
        }

        match c {
            '\\' if !in_single_quote => {
                escape_next = true;
            }
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                quoted = true;
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                quoted = true;
            }
            ' ' | '\t' if !in_single_quote && !in_double_quote => {
                if !current.is_empty() || quoted {
                    tokens.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            _ => {
                current.push(c);
            }
        }
    }

    if !current.is_empty() || quoted {
        tokens.push(current);
    }

    tokens
}

/// Full URL including enabled params and query-located auth
fn url_with_params(request: &Request, extra: &[Header]) -> String {
    let pairs: Vec<&Header> = request
        .params
        .iter()
        .filter(|p| p.enabled && !p.key.is_empty())
        .chain(extra.iter())
        .collect();
    if pairs.is_empty() {
        return request.url.clone();
    }

    let query = match Url::parse("http://localhost/") {
        Ok(mut scratch) => {
            scratch
                .query_pairs_mut()
                .extend_pairs(pairs.iter().map(|p| (p.key.as_str(), p.value.as_str())));
            scratch.query().unwrap_or_default().to_string()
        }
        Err(_) => return request.url.clone(),
    };

    let separator = if request.url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", request.url, separator, query)
}

/// Backslash-escape the characters a shell interprets inside `"..."`
fn escape_double_quoted(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn header_part(header: &Header) -> String {
    format!(
        "-H \"{}: {}\"",
        escape_double_quoted(&header.key),
        escape_double_quoted(&header.value)
    )
}

/// Format request as cURL command
pub fn to_curl(request: &Request) -> String {
    let injection = auth::inject(&request.auth);

    let mut parts = vec![format!(
        "curl -X {} \"{}\"",
        request.method.as_str(),
        escape_double_quoted(&url_with_params(request, &injection.query))
    )];

    // Headers, then auth
    for header in request.headers.iter().filter(|h| h.enabled) {
        parts.push(header_part(header));
    }
    for header in &injection.headers {
        parts.push(header_part(header));
    }

    // Body
    if request.method != HttpMethod::GET && !request.body.is_empty() {
        parts.push(format!("-d '{}'", request.body.replace('\'', "'\\''")));
    }

    parts.join(" \\\n  ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_simple_get() {
        let curl = "curl https://api.example.com/users";
        let req = parse_curl(curl).unwrap();
        assert_eq!(req.url, "https://api.example.com/users");
        assert_eq!(req.method, HttpMethod::GET);
        assert!(req.headers.is_empty());
    }

    #[test]
    fn test_parse_post_with_data() {
        let curl = r#"curl -X POST -H "Content-Type: application/json" -d '{"name":"test"}' https://api.example.com/users"#;
        let req = parse_curl(curl).unwrap();
        assert_eq!(req.method, HttpMethod::POST);
        assert_eq!(req.body, r#"{"name":"test"}"#);
        assert_eq!(req.headers, vec![Header::new("Content-Type", "application/json")]);
    }

    #[test]
    fn test_split_respects_quotes() {
        let tokens = split_curl_command(r#"curl -X POST "https://x" -H "A: b c" -d '{"k":1}'"#);
        assert_eq!(
            tokens,
            vec!["curl", "-X", "POST", "https://x", "-H", "A: b c", "-d", r#"{"k":1}"#]
        );
    }

    #[test]
    fn test_split_line_continuations_and_unterminated_quote() {
        let tokens = split_curl_command("curl \\\n  -H 'X: 1' \\\r\n  \"https://x/unterminated");
        assert_eq!(tokens, vec!["curl", "-H", "X: 1", "https://x/unterminated"]);
    }

    #[test]
    fn test_method_defaults_to_get_without_flag() {
        let req = parse_curl("curl --data 'a=1' https://x.test/form").unwrap();
        assert_eq!(req.method, HttpMethod::GET);
        assert_eq!(req.body, "a=1");
    }

    #[test]
    fn test_first_data_flag_wins() {
        let req = parse_curl("curl -X POST https://x.test --data-raw first -d second").unwrap();
        assert_eq!(req.body, "first");
    }

    #[test]
    fn test_query_string_moves_into_params() {
        let req = parse_curl("curl 'https://x.test/search?q=rust%20lang&page=2'").unwrap();
        assert_eq!(req.url, "https://x.test/search");
        assert_eq!(
            req.params,
            vec![Header::new("q", "rust lang"), Header::new("page", "2")]
        );
    }

    #[test]
    fn test_multipart_header_fixed_for_json_body() {
        let curl = r#"curl -X POST https://x.test -H 'content-type: multipart/form-data; boundary=xyz' --data-raw '{"a":1}'"#;
        let req = parse_curl(curl).unwrap();
        assert_eq!(req.headers[0].value, "application/json");
    }

    #[test]
    fn test_user_flag_sets_basic_auth() {
        let req = parse_curl("curl -u alice:wonder https://x.test").unwrap();
        assert_eq!(
            req.auth,
            AuthConfig::Basic {
                username: "alice".into(),
                password: "wonder".into()
            }
        );
    }

    #[test]
    fn test_errors_on_missing_url() {
        assert!(parse_curl("").is_err());
        assert!(parse_curl("curl -X POST -H 'A: b'").is_err());
    }

    #[test]
    fn test_attached_method_forms() {
        let req = parse_curl("curl -XPOST https://x.test -d 'a'").unwrap();
        assert_eq!(req.method, HttpMethod::POST);
        assert_eq!(req.url, "https://x.test");

        let req = parse_curl("curl --request=delete https://x.test/1").unwrap();
        assert_eq!(req.method, HttpMethod::DELETE);
    }

    #[test]
    fn test_unsupported_method_falls_back_to_get() {
        let req = parse_curl("curl -X PURGE https://cdn.test/asset").unwrap();
        assert_eq!(req.method, HttpMethod::GET);
        assert_eq!(req.url, "https://cdn.test/asset");
    }

    #[test]
    fn test_export_escapes_double_quoted_parts() {
        let request = Request {
            url: "https://x.test/$HOME".into(),
            headers: vec![Header::new("If-None-Match", r#""abc""#)],
            ..Request::default()
        };
        assert_eq!(
            to_curl(&request),
            "curl -X GET \"https://x.test/\\$HOME\" \\\n  -H \"If-None-Match: \\\"abc\\\"\""
        );
    }

    #[test]
    fn test_export_format() {
        let request = Request {
            method: HttpMethod::POST,
            url: "https://x.test/users".into(),
            headers: vec![
                Header::new("Content-Type", "application/json"),
                Header {
                    enabled: false,
                    ..Header::new("X-Off", "1")
                },
            ],
            body: r#"{"name":"it's"}"#.into(),
            auth: AuthConfig::Bearer { token: "abc".into() },
            ..Request::default()
        };
        assert_eq!(
            to_curl(&request),
            "curl -X POST \"https://x.test/users\" \\\n  -H \"Content-Type: application/json\" \\\n  -H \"Authorization: Bearer abc\" \\\n  -d '{\"name\":\"it'\\''s\"}'"
        );
    }

    #[test]
    fn test_get_export_omits_body() {
        let request = Request {
            body: "ignored".into(),
            headers: Vec::new(),
            ..Request::default()
        };
        assert_eq!(to_curl(&request), "curl -X GET \"https://httpbin.org/get\"");
    }

    #[test]
    fn test_roundtrip_preserves_request() {
        let original = Request {
            method: HttpMethod::POST,
            url: "https://api.example.com/v1/items".into(),
            headers: vec![
                Header::new("Accept", "application/json"),
                Header::new("X-Trace", "abc 123"),
                Header::new("If-None-Match", r#""abc""#),
                Header::new("X-Path", r"C:\tmp"),
                Header::new("X-Cmd", "`id` $USER"),
            ],
            params: vec![Header::new("page", "2")],
            body: r#"{"id":1,"tags":["a","b"],"note":"don't"}"#.into(),
            ..Request::default()
        };

        let parsed = parse_curl(&to_curl(&original)).unwrap();
        assert_eq!(parsed.method, original.method);
        assert_eq!(parsed.url, original.url);
        assert_eq!(parsed.params, original.params);
        assert_eq!(parsed.body, original.body);
        let header_set = |r: &Request| -> HashSet<(String, String)> {
            r.headers.iter().map(|h| (h.key.clone(), h.value.clone())).collect()
        };
        assert_eq!(header_set(&parsed), header_set(&original));
    }
}
