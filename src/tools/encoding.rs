use anyhow::{Context, Result};
use base64::Engine;

pub fn base64_encode(input: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(input)
}

/// Decoded bytes must be UTF-8 text
pub fn base64_decode(input: &str) -> Result<String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(input.trim())
        .context("invalid base64")?;
    String::from_utf8(bytes).context("decoded data is not UTF-8 text")
}

/// Percent-encode everything but unreserved characters
pub fn url_encode(input: &str) -> String {
    urlencoding::encode(input).into_owned()
}

pub fn url_decode(input: &str) -> Result<String> {
    Ok(urlencoding::decode(input)
        .context("decoded data is not UTF-8 text")?
        .into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64() {
        assert_eq!(base64_encode("user:pass"), "dXNlcjpwYXNz");
        assert_eq!(base64_decode(" dXNlcjpwYXNz\n").unwrap(), "user:pass");
        assert!(base64_decode("***").is_err());
        assert!(base64_decode("/w==").is_err());
    }

    #[test]
    fn test_url_component() {
        assert_eq!(url_encode("a b&c=d/é"), "a%20b%26c%3Dd%2F%C3%A9");
        assert_eq!(url_decode("a%20b%26c").unwrap(), "a b&c");
        assert!(url_decode("%FF").is_err());
    }
}
