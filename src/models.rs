use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Generate a fresh node/collection identifier
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// HTTP Method enum
///
/// `FOLDER` is not a real method: it marks a grouping node inside a
/// collection and is never sent.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
    HEAD,
    OPTIONS,
    FOLDER,
}

impl HttpMethod {
    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
            HttpMethod::FOLDER => "FOLDER",
        }
    }

    /// Parse a sendable method name (case-insensitive)
    pub fn parse(s: &str) -> Option<HttpMethod> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "PATCH" => Some(HttpMethod::PATCH),
            "DELETE" => Some(HttpMethod::DELETE),
            "HEAD" => Some(HttpMethod::HEAD),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            _ => None,
        }
    }

    /// Next method in the editor cycle (folders are not part of it)
    pub fn next(&self) -> HttpMethod {
        match self {
            HttpMethod::GET => HttpMethod::POST,
            HttpMethod::POST => HttpMethod::PUT,
            HttpMethod::PUT => HttpMethod::PATCH,
            HttpMethod::PATCH => HttpMethod::DELETE,
            HttpMethod::DELETE => HttpMethod::HEAD,
            HttpMethod::HEAD => HttpMethod::OPTIONS,
            HttpMethod::OPTIONS | HttpMethod::FOLDER => HttpMethod::GET,
        }
    }

    pub fn has_body(&self) -> bool {
        matches!(
            self,
            HttpMethod::POST | HttpMethod::PUT | HttpMethod::PATCH | HttpMethod::DELETE
        )
    }
}

/// Where an API key is injected
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ApiKeyLocation {
    #[default]
    Header,
    Query,
}

/// Authentication configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AuthConfig {
    #[default]
    None,
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        password: String,
    },
    ApiKey {
        key_name: String,
        key_value: String,
        #[serde(default)]
        key_location: ApiKeyLocation,
    },
}

impl AuthConfig {
    pub fn label(&self) -> &'static str {
        match self {
            AuthConfig::None => "None",
            AuthConfig::Bearer { .. } => "Bearer",
            AuthConfig::Basic { .. } => "Basic",
            AuthConfig::ApiKey { .. } => "API Key",
        }
    }
}

fn enabled_default() -> bool {
    true
}

/// HTTP header or query parameter
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub key: String,
    pub value: String,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Header {
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }
}

/// Response field an assertion reads
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssertionType {
    Status,
    Header,
    Body,
    ResponseTime,
}

impl AssertionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssertionType::Status => "status",
            AssertionType::Header => "header",
            AssertionType::Body => "body",
            AssertionType::ResponseTime => "response-time",
        }
    }

    pub fn next(&self) -> AssertionType {
        match self {
            AssertionType::Status => AssertionType::Header,
            AssertionType::Header => AssertionType::Body,
            AssertionType::Body => AssertionType::ResponseTime,
            AssertionType::ResponseTime => AssertionType::Status,
        }
    }
}

/// Comparison applied by an assertion
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssertionOperator {
    Equals,
    Contains,
    NotEquals,
    GreaterThan,
    LessThan,
    Exists,
    /// Any operator string this build does not know; always fails
    #[serde(other)]
    Unknown,
}

impl AssertionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssertionOperator::Equals => "equals",
            AssertionOperator::Contains => "contains",
            AssertionOperator::NotEquals => "not-equals",
            AssertionOperator::GreaterThan => "greater-than",
            AssertionOperator::LessThan => "less-than",
            AssertionOperator::Exists => "exists",
            AssertionOperator::Unknown => "unknown",
        }
    }

    pub fn next(&self) -> AssertionOperator {
        match self {
            AssertionOperator::Equals => AssertionOperator::Contains,
            AssertionOperator::Contains => AssertionOperator::NotEquals,
            AssertionOperator::NotEquals => AssertionOperator::GreaterThan,
            AssertionOperator::GreaterThan => AssertionOperator::LessThan,
            AssertionOperator::LessThan => AssertionOperator::Exists,
            AssertionOperator::Exists | AssertionOperator::Unknown => AssertionOperator::Equals,
        }
    }
}

/// A single pass/fail check against a response
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestAssertion {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AssertionType,
    #[serde(default)]
    pub field: Option<String>,
    pub operator: AssertionOperator,
    pub value: String,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

impl Default for TestAssertion {
    fn default() -> Self {
        TestAssertion {
            id: generate_id(),
            kind: AssertionType::Status,
            field: None,
            operator: AssertionOperator::Equals,
            value: String::from("200"),
            enabled: true,
        }
    }
}

/// A single HTTP request, or a folder node when `method` is `FOLDER`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub params: Vec<Header>,
    #[serde(default)]
    pub pre_request_script: String,
    #[serde(default)]
    pub post_request_script: String,
    #[serde(default)]
    pub tests: Vec<TestAssertion>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Request {
    /// An empty folder node
    pub fn folder(name: impl Into<String>) -> Self {
        Request {
            id: generate_id(),
            name: name.into(),
            method: HttpMethod::FOLDER,
            url: String::new(),
            headers: Vec::new(),
            body: String::new(),
            auth: AuthConfig::None,
            params: Vec::new(),
            pre_request_script: String::new(),
            post_request_script: String::new(),
            tests: Vec::new(),
            description: None,
            parent_id: None,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.method == HttpMethod::FOLDER
    }

    /// Name shown in lists; falls back to `METHOD url`
    pub fn display_name(&self) -> String {
        if !self.name.is_empty() {
            self.name.clone()
        } else if self.is_folder() {
            String::from("Unnamed Folder")
        } else {
            format!("{} {}", self.method.as_str(), self.url)
        }
    }
}

impl Default for Request {
    fn default() -> Self {
        use crate::constants::DEFAULT_HTTP_URL;
        Request {
            id: generate_id(),
            name: String::from("New Request"),
            method: HttpMethod::GET,
            url: String::from(DEFAULT_HTTP_URL),
            headers: vec![
                Header::new("Content-Type", "application/json"),
                Header::new("Accept", "application/json"),
            ],
            body: String::new(),
            auth: AuthConfig::None,
            params: Vec::new(),
            pre_request_script: String::new(),
            post_request_script: String::new(),
            tests: Vec::new(),
            description: None,
            parent_id: None,
        }
    }
}

/// A collection of requests and folder nodes, stored flat
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub requests: Vec<Request>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Collection {
            id: generate_id(),
            name: name.into(),
            requests: Vec::new(),
            created_at: now,
            updated_at: now,
            description: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn find(&self, id: &str) -> Option<&Request> {
        self.requests.iter().find(|r| r.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Request> {
        self.requests.iter_mut().find(|r| r.id == id)
    }

    pub fn has_folder(&self, id: &str) -> bool {
        self.find(id).map(|r| r.is_folder()).unwrap_or(false)
    }
}

/// Environment variables
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub variables: HashMap<String, String>,
    #[serde(default)]
    pub is_active: bool,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Environment {
            id: generate_id(),
            name: name.into(),
            variables: HashMap::new(),
            is_active: false,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }
}

/// Outcome of one assertion
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub assertion: TestAssertion,
    pub passed: bool,
    pub message: String,
}

/// Response from HTTP request
///
/// Every send produces one, including failed sends (`status == 0`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    /// Header names are lowercase
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub data: String,
    /// Elapsed milliseconds
    pub time: u64,
    /// Body size in bytes
    pub size: usize,
    #[serde(default)]
    pub test_results: Vec<TestResult>,
}

impl Response {
    /// Synthetic response for a send that never got an HTTP answer
    pub fn failed(message: impl Into<String>, time: u64) -> Self {
        let data = message.into();
        Response {
            status: 0,
            status_text: String::from("Error"),
            headers: BTreeMap::new(),
            size: data.len(),
            data,
            time,
            test_results: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == 0
    }

    pub fn passed_count(&self) -> usize {
        self.test_results.iter().filter(|r| r.passed).count()
    }
}

/// History entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestHistory {
    pub id: String,
    pub request: Request,
    pub response: Response,
    pub timestamp: DateTime<Utc>,
}

impl RequestHistory {
    pub fn new(request: Request, response: Response) -> Self {
        RequestHistory {
            id: generate_id(),
            request,
            response,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_config_tagged_by_type() {
        let auth = AuthConfig::Bearer {
            token: "abc".into(),
        };
        let json = serde_json::to_string(&auth).unwrap();
        assert_eq!(json, r#"{"type":"bearer","token":"abc"}"#);

        let api: AuthConfig = serde_json::from_str(
            r#"{"type":"api-key","key_name":"X-Key","key_value":"v"}"#,
        )
        .unwrap();
        assert_eq!(
            api,
            AuthConfig::ApiKey {
                key_name: "X-Key".into(),
                key_value: "v".into(),
                key_location: ApiKeyLocation::Header,
            }
        );
    }

    #[test]
    fn test_unknown_operator_deserializes() {
        let json = r#"{"id":"1","type":"status","operator":"matches","value":"2"}"#;
        let assertion: TestAssertion = serde_json::from_str(json).unwrap();
        assert_eq!(assertion.operator, AssertionOperator::Unknown);
        assert!(assertion.enabled);
    }

    #[test]
    fn test_folder_node() {
        let folder = Request::folder("Users");
        assert!(folder.is_folder());
        assert!(folder.headers.is_empty());
        assert!(folder.tests.is_empty());
        assert_eq!(folder.display_name(), "Users");
    }

    #[test]
    fn test_new_assertion_defaults() {
        let assertion = TestAssertion::default();
        assert_eq!(assertion.operator, AssertionOperator::Equals);
        assert!(assertion.enabled);
    }
}
