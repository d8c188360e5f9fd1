//! `{{variable}}` substitution against the active environment

use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::models::{AuthConfig, Environment, Header, Request};

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("static pattern"))
}

/// Replace `{{name}}` tokens; unknown names are left verbatim
pub fn substitute(text: &str, environment: Option<&Environment>) -> String {
    let Some(env) = environment else {
        return text.to_string();
    };
    token_pattern()
        .replace_all(text, |caps: &Captures| match env.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Names referenced by `{{...}}` tokens, in order of appearance
pub fn referenced(text: &str) -> Vec<String> {
    token_pattern()
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn substitute_pairs(pairs: &[Header], environment: Option<&Environment>) -> Vec<Header> {
    pairs
        .iter()
        .map(|h| Header {
            key: substitute(&h.key, environment),
            value: substitute(&h.value, environment),
            enabled: h.enabled,
        })
        .collect()
}

/// Apply substitution to every sendable field of a request
///
/// Scripts are copied untouched.
pub fn resolve_request(request: &Request, environment: Option<&Environment>) -> Request {
    let mut resolved = request.clone();
    resolved.url = substitute(&request.url, environment);
    resolved.headers = substitute_pairs(&request.headers, environment);
    resolved.params = substitute_pairs(&request.params, environment);
    resolved.body = substitute(&request.body, environment);
    resolved.auth = match &request.auth {
        AuthConfig::None => AuthConfig::None,
        AuthConfig::Bearer { token } => AuthConfig::Bearer {
            token: substitute(token, environment),
        },
        AuthConfig::Basic { username, password } => AuthConfig::Basic {
            username: substitute(username, environment),
            password: substitute(password, environment),
        },
        AuthConfig::ApiKey {
            key_name,
            key_value,
            key_location,
        } => AuthConfig::ApiKey {
            key_name: substitute(key_name, environment),
            key_value: substitute(key_value, environment),
            key_location: *key_location,
        },
    };
    resolved
}
