//! Response assertions
//!
//! A fixed operator set applied to the status code, a header, the raw body
//! or the response time. Each assertion is evaluated on its own: an error in
//! one becomes a failed result and never stops the rest.

use anyhow::{anyhow, Result};

use crate::models::{AssertionOperator, AssertionType, Response, TestAssertion, TestResult};

/// Evaluate every enabled assertion against a response
pub fn evaluate(response: &Response, assertions: &[TestAssertion]) -> Vec<TestResult> {
    assertions
        .iter()
        .filter(|a| a.enabled)
        .map(|assertion| {
            let (passed, message) = match check(response, assertion) {
                Ok(outcome) => outcome,
                Err(e) => (false, format!("Error: {}", e)),
            };
            TestResult {
                assertion: assertion.clone(),
                passed,
                message,
            }
        })
        .collect()
}

/// The value under test; a missing or unnamed header reads as `""`
fn actual_value(response: &Response, assertion: &TestAssertion) -> String {
    match assertion.kind {
        AssertionType::Status => response.status.to_string(),
        AssertionType::Header => {
            let wanted = assertion.field.as_deref().unwrap_or("").trim().to_lowercase();
            if wanted.is_empty() {
                return String::new();
            }
            response
                .headers
                .iter()
                .find(|(name, _)| name.to_lowercase() == wanted)
                .map(|(_, value)| value.clone())
                .unwrap_or_default()
        }
        AssertionType::Body => response.data.clone(),
        AssertionType::ResponseTime => response.time.to_string(),
    }
}

fn check(response: &Response, assertion: &TestAssertion) -> Result<(bool, String)> {
    let actual = actual_value(response, assertion);
    let expected = assertion.value.as_str();
    let subject = match (&assertion.kind, &assertion.field) {
        (AssertionType::Header, Some(field)) => format!("header '{}'", field.trim()),
        (kind, _) => kind.as_str().to_string(),
    };

    let passed = match assertion.operator {
        AssertionOperator::Equals => actual == expected,
        AssertionOperator::NotEquals => actual != expected,
        AssertionOperator::Contains => actual.contains(expected),
        AssertionOperator::GreaterThan => parse_float(&actual)? > parse_float(expected)?,
        AssertionOperator::LessThan => parse_float(&actual)? < parse_float(expected)?,
        AssertionOperator::Exists => !actual.is_empty(),
        AssertionOperator::Unknown => {
            return Ok((false, String::from("Unknown operator")));
        }
    };

    let shown = if actual.chars().count() > 60 {
        format!("{}...", actual.chars().take(60).collect::<String>())
    } else {
        actual
    };
    let message = match assertion.operator {
        AssertionOperator::Exists => format!("{} exists (got '{}')", subject, shown),
        _ => format!(
            "{} {} '{}' (got '{}')",
            subject,
            assertion.operator.as_str(),
            expected,
            shown
        ),
    };
    Ok((passed, message))
}

/// Leading-prefix float parse: `"450ms"` is 450, `"abc"` is an error
pub fn parse_float(text: &str) -> Result<f64> {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        let value = f64::INFINITY;
        return Ok(if s.starts_with('-') { -value } else { value });
    }

    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return Err(anyhow!("'{}' is not a number", text));
    }

    // Exponent only counts when digits follow it
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end]
        .parse::<f64>()
        .map_err(|e| anyhow!("'{}' is not a number: {}", text, e))
}
