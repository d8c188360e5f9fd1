use anyhow::{Context, Result};
use serde_json::Value;

/// Pretty-print JSON with 2-space indentation
pub fn beautify_json(input: &str) -> Result<String> {
    let value: Value = serde_json::from_str(input).context("invalid JSON")?;
    Ok(serde_json::to_string_pretty(&value)?)
}

pub fn minify_json(input: &str) -> Result<String> {
    let value: Value = serde_json::from_str(input).context("invalid JSON")?;
    Ok(serde_json::to_string(&value)?)
}

/// Beautified text when `input` is JSON, `None` otherwise
pub fn try_beautify(input: &str) -> Option<String> {
    beautify_json(input).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beautify_and_minify() {
        let pretty = beautify_json(r#"{"a":[1,2]}"#).unwrap();
        assert_eq!(pretty, "{\n  \"a\": [\n    1,\n    2\n  ]\n}");
        assert_eq!(minify_json(&pretty).unwrap(), r#"{"a":[1,2]}"#);
        assert!(try_beautify("<html>").is_none());
    }
}
