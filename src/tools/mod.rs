//! Stateless text converters behind the tools popup

pub mod beautify;
pub mod encoding;
pub mod timestamp;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A converter the tools popup can run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolAction {
    #[default]
    JsonBeautify,
    JsonMinify,
    Base64Encode,
    Base64Decode,
    UrlEncode,
    UrlDecode,
    Timestamp,
}

impl ToolAction {
    pub const ALL: [ToolAction; 7] = [
        ToolAction::JsonBeautify,
        ToolAction::JsonMinify,
        ToolAction::Base64Encode,
        ToolAction::Base64Decode,
        ToolAction::UrlEncode,
        ToolAction::UrlDecode,
        ToolAction::Timestamp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolAction::JsonBeautify => "JSON Beautify",
            ToolAction::JsonMinify => "JSON Minify",
            ToolAction::Base64Encode => "Base64 Encode",
            ToolAction::Base64Decode => "Base64 Decode",
            ToolAction::UrlEncode => "URL Encode",
            ToolAction::UrlDecode => "URL Decode",
            ToolAction::Timestamp => "Timestamp",
        }
    }

    pub fn next(&self) -> ToolAction {
        let index = Self::ALL.iter().position(|a| a == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    pub fn apply(&self, input: &str) -> Result<String> {
        match self {
            ToolAction::JsonBeautify => beautify::beautify_json(input),
            ToolAction::JsonMinify => beautify::minify_json(input),
            ToolAction::Base64Encode => Ok(encoding::base64_encode(input)),
            ToolAction::Base64Decode => encoding::base64_decode(input),
            ToolAction::UrlEncode => Ok(encoding::url_encode(input)),
            ToolAction::UrlDecode => encoding::url_decode(input),
            ToolAction::Timestamp => timestamp::convert(input),
        }
    }
}

/// What the tools popup remembers between sessions
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolsScratch {
    #[serde(default)]
    pub action: ToolAction,
    #[serde(default)]
    pub input: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_wraps() {
        assert_eq!(ToolAction::Timestamp.next(), ToolAction::JsonBeautify);
        assert_eq!(ToolAction::JsonBeautify.next(), ToolAction::JsonMinify);
    }

    #[test]
    fn test_apply_dispatch() {
        assert_eq!(ToolAction::Base64Encode.apply("hi").unwrap(), "aGk=");
        assert!(ToolAction::JsonMinify.apply("not json").is_err());
    }
}
