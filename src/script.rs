//! Pre-request scripts
//!
//! A script is a list of line commands run before variable substitution:
//!
//! ```text
//! # comment
//! // comment
//! set token abc123
//! unset stale
//! header X-Trace: {{token}}
//! param page=2
//! log sending with {{token}}
//! ```
//!
//! `set`/`unset` change the active environment. `header`/`param` only touch
//! the outgoing request. `log` lines are collected for display. Any
//! malformed line aborts the whole script with an error.

use anyhow::{anyhow, bail, Result};
use std::collections::HashMap;

use crate::models::{Environment, Header, Request};
use crate::variables;

#[derive(Clone, Debug, PartialEq)]
enum ScriptCommand {
    Set(String, String),
    Unset(String),
    Header(String, String),
    Param(String, String),
    Log(String),
}

/// Effects of a successful script run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScriptOutcome {
    /// `Some` sets a variable, `None` removes it
    pub variables: HashMap<String, Option<String>>,
    pub headers: Vec<Header>,
    pub params: Vec<Header>,
    pub logs: Vec<String>,
}

impl ScriptOutcome {
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
            && self.headers.is_empty()
            && self.params.is_empty()
            && self.logs.is_empty()
    }

    /// Add the script's headers and params to an outgoing request
    pub fn apply_to(&self, request: &mut Request) {
        request.headers.extend(self.headers.iter().cloned());
        request.params.extend(self.params.iter().cloned());
    }

    /// The environment as later script lines and the send will see it
    pub fn apply_to_environment(&self, environment: &mut Environment) {
        for (name, value) in &self.variables {
            match value {
                Some(v) => environment.set(name.clone(), v.clone()),
                None => {
                    environment.variables.remove(name);
                }
            }
        }
    }
}

fn parse_line(number: usize, line: &str) -> Result<Option<ScriptCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word {
        "set" => {
            let (name, value) = rest
                .split_once(char::is_whitespace)
                .map(|(n, v)| (n, v.trim()))
                .unwrap_or((rest, ""));
            if name.is_empty() {
                bail!("line {}: set needs a variable name", number);
            }
            ScriptCommand::Set(name.to_string(), value.to_string())
        }
        "unset" => {
            if rest.is_empty() || rest.contains(char::is_whitespace) {
                bail!("line {}: unset takes exactly one variable name", number);
            }
            ScriptCommand::Unset(rest.to_string())
        }
        "header" => {
            let (key, value) = rest
                .split_once(':')
                .ok_or_else(|| anyhow!("line {}: expected 'header Key: value'", number))?;
            if key.trim().is_empty() {
                bail!("line {}: header name is empty", number);
            }
            ScriptCommand::Header(key.trim().to_string(), value.trim().to_string())
        }
        "param" => {
            let (key, value) = rest
                .split_once('=')
                .ok_or_else(|| anyhow!("line {}: expected 'param key=value'", number))?;
            if key.trim().is_empty() {
                bail!("line {}: param name is empty", number);
            }
            ScriptCommand::Param(key.trim().to_string(), value.trim().to_string())
        }
        "log" => ScriptCommand::Log(rest.to_string()),
        other => bail!("line {}: unknown command '{}'", number, other),
    };
    Ok(Some(command))
}

/// Run a pre-request script
///
/// Nothing is applied here; the caller decides what to do with the outcome.
/// Values and log lines see variables set by earlier lines of the script.
pub fn run_pre_request(script: &str, environment: Option<&Environment>) -> Result<ScriptOutcome> {
    let commands = script
        .lines()
        .enumerate()
        .filter_map(|(i, line)| parse_line(i + 1, line).transpose())
        .collect::<Result<Vec<_>>>()?;

    let mut outcome = ScriptOutcome::default();
    if commands.is_empty() {
        return Ok(outcome);
    }

    let mut scope = environment
        .cloned()
        .unwrap_or_else(|| Environment::new("script"));

    for command in commands {
        match command {
            ScriptCommand::Set(name, value) => {
                let value = variables::substitute(&value, Some(&scope));
                scope.set(name.clone(), value.clone());
                outcome.variables.insert(name, Some(value));
            }
            ScriptCommand::Unset(name) => {
                scope.variables.remove(&name);
                outcome.variables.insert(name, None);
            }
            ScriptCommand::Header(key, value) => {
                outcome.headers.push(Header::new(key, value));
            }
            ScriptCommand::Param(key, value) => {
                outcome.params.push(Header::new(key, value));
            }
            ScriptCommand::Log(text) => {
                outcome.logs.push(variables::substitute(&text, Some(&scope)));
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_and_comments() {
        let mut env = Environment::new("dev");
        env.set("old", "1");
        let script = "# setup\n// another\nset token abc 123\nunset old\nheader X-Token: {{token}}\nparam page=2\nlog token is {{token}}\n";

        let outcome = run_pre_request(script, Some(&env)).unwrap();
        assert_eq!(outcome.variables["token"], Some("abc 123".to_string()));
        assert_eq!(outcome.variables["old"], None);
        assert_eq!(outcome.headers, vec![Header::new("X-Token", "{{token}}")]);
        assert_eq!(outcome.params, vec![Header::new("page", "2")]);
        assert_eq!(outcome.logs, vec!["token is abc 123".to_string()]);
    }

    #[test]
    fn test_malformed_line_aborts() {
        let err = run_pre_request("set a 1\nfetch https://x", None).unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(run_pre_request("header NoColon", None).is_err());
        assert!(run_pre_request("param novalue", None).is_err());
    }

    #[test]
    fn test_empty_script_is_empty_outcome() {
        let outcome = run_pre_request("\n  # nothing\n", None).unwrap();
        assert!(outcome.is_empty());
    }

    #[test]
    fn test_apply_outcome() {
        let outcome = run_pre_request("set host api.test\nheader A: b\nparam q=1", None).unwrap();
        let mut request = Request::default();
        let before = request.headers.len();
        outcome.apply_to(&mut request);
        assert_eq!(request.headers.len(), before + 1);
        assert_eq!(request.params, vec![Header::new("q", "1")]);

        let mut env = Environment::new("dev");
        outcome.apply_to_environment(&mut env);
        assert_eq!(env.get("host").map(String::as_str), Some("api.test"));
    }
}
