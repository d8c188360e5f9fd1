//! HTTP client wrapper - executes requests and builds responses

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::Url;

use crate::auth;
use crate::models::{Environment, HttpMethod, Request, Response};
use crate::testing;
use crate::variables;

fn to_reqwest_method(method: &HttpMethod) -> Option<reqwest::Method> {
    Some(match method {
        HttpMethod::GET => reqwest::Method::GET,
        HttpMethod::POST => reqwest::Method::POST,
        HttpMethod::PUT => reqwest::Method::PUT,
        HttpMethod::PATCH => reqwest::Method::PATCH,
        HttpMethod::DELETE => reqwest::Method::DELETE,
        HttpMethod::HEAD => reqwest::Method::HEAD,
        HttpMethod::OPTIONS => reqwest::Method::OPTIONS,
        HttpMethod::FOLDER => return None,
    })
}

/// Build a request from an already-substituted descriptor
fn build_request(
    client: &reqwest::Client,
    request: &Request,
) -> Result<reqwest::RequestBuilder, String> {
    let method =
        to_reqwest_method(&request.method).ok_or_else(|| String::from("Folders cannot be sent"))?;
    let injection = auth::inject(&request.auth);

    let mut url =
        Url::parse(request.url.trim()).map_err(|e| format!("Invalid URL '{}': {}", request.url, e))?;
    let query: Vec<_> = request
        .params
        .iter()
        .filter(|p| p.enabled && !p.key.is_empty())
        .chain(injection.query.iter())
        .collect();
    if !query.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|p| (p.key.as_str(), p.value.as_str())));
    }

    let mut req_builder = client.request(method, url);

    // Add headers
    for header in request.headers.iter().filter(|h| h.enabled && !h.key.is_empty()) {
        req_builder = req_builder.header(header.key.as_str(), header.value.as_str());
    }

    // Add auth
    for header in &injection.headers {
        req_builder = req_builder.header(header.key.as_str(), header.value.as_str());
    }

    // Add body
    if request.method.has_body() && !request.body.is_empty() {
        req_builder = req_builder.body(request.body.clone());
    }

    Ok(req_builder)
}

fn header_map(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        map.entry(name.as_str().to_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    map
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("Request timed out: {}", e)
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else if e.is_builder() {
        format!("Invalid request: {}", e)
    } else {
        format!("Request failed: {}", e)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Send a request and wait for the complete response
///
/// Never fails: transport problems become a status 0 response whose body
/// is the error text. Assertions of the request are evaluated either way.
pub async fn execute_request(
    client: &reqwest::Client,
    request: &Request,
    environment: Option<&Environment>,
) -> Response {
    if request.is_folder() {
        return Response::failed("Folders group requests and cannot be sent", 0);
    }

    let start = Instant::now();
    let resolved = variables::resolve_request(request, environment);

    let mut response = match build_request(client, &resolved) {
        Ok(req_builder) => match req_builder.send().await {
            Ok(resp) => read_response(resp, start).await,
            Err(e) => Response::failed(describe_error(&e), elapsed_ms(start)),
        },
        Err(message) => Response::failed(message, elapsed_ms(start)),
    };

    response.test_results = testing::evaluate(&response, &request.tests);
    response
}

async fn read_response(resp: reqwest::Response, start: Instant) -> Response {
    let status = resp.status();
    let headers = header_map(resp.headers());

    let mut stream = resp.bytes_stream();
    let mut bytes = Vec::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => bytes.extend_from_slice(&chunk),
            Err(e) => {
                return Response::failed(format!("Error reading body: {}", e), elapsed_ms(start));
            }
        }
    }

    let data = String::from_utf8_lossy(&bytes).into_owned();
    Response {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        headers,
        size: data.len(),
        data,
        time: elapsed_ms(start),
        test_results: Vec::new(),
    }
}

/// Create an HTTP client; `timeout` of `None` waits indefinitely
pub fn create_client(timeout: Option<Duration>) -> reqwest::Client {
    let mut builder = reqwest::Client::builder().user_agent(concat!(
        "reqnest/",
        env!("CARGO_PKG_VERSION")
    ));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "falling back to default HTTP client");
        reqwest::Client::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApiKeyLocation, AssertionOperator, AssertionType, AuthConfig, Header, TestAssertion};
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_execute_substitutes_and_injects() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users"))
            .and(query_param("page", "2"))
            .and(query_param("api_key", "k-123"))
            .and(header("x-tenant", "acme"))
            .and(body_string(r#"{"name":"acme"}"#))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("X-Request-Id", "abc")
                    .set_body_string("created"),
            )
            .mount(&mock)
            .await;

        let mut env = Environment::new("test");
        env.set("base", mock.uri());
        env.set("tenant", "acme");
        env.set("key", "k-123");

        let request = Request {
            method: HttpMethod::POST,
            url: "{{base}}/users".into(),
            headers: vec![Header::new("X-Tenant", "{{tenant}}")],
            params: vec![Header::new("page", "2")],
            body: r#"{"name":"{{tenant}}"}"#.into(),
            auth: AuthConfig::ApiKey {
                key_name: "api_key".into(),
                key_value: "{{key}}".into(),
                key_location: ApiKeyLocation::Query,
            },
            tests: vec![TestAssertion {
                value: "201".into(),
                ..TestAssertion::default()
            }],
            ..Request::default()
        };

        let client = create_client(None);
        let response = execute_request(&client, &request, Some(&env)).await;
        assert_eq!(response.status, 201);
        assert_eq!(response.status_text, "Created");
        assert_eq!(response.data, "created");
        assert_eq!(response.size, 7);
        assert_eq!(response.headers.get("x-request-id").map(String::as_str), Some("abc"));
        assert_eq!(response.test_results.len(), 1);
        assert!(response.test_results[0].passed);
    }

    #[tokio::test]
    async fn test_basic_auth_header() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("authorization", "Basic dXNlcjpwYXNz"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&mock)
            .await;

        let request = Request {
            url: format!("{}/me", mock.uri()),
            auth: AuthConfig::Basic {
                username: "user".into(),
                password: "pass".into(),
            },
            ..Request::default()
        };
        let response = execute_request(&create_client(None), &request, None).await;
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_connection_failure_is_status_zero() {
        let request = Request {
            url: "http://127.0.0.1:1/unreachable".into(),
            tests: vec![TestAssertion {
                kind: AssertionType::Status,
                operator: AssertionOperator::Equals,
                value: "200".into(),
                ..TestAssertion::default()
            }],
            ..Request::default()
        };
        let response = execute_request(&create_client(None), &request, None).await;
        assert_eq!(response.status, 0);
        assert!(!response.data.is_empty());
        assert!(!response.test_results[0].passed);
    }

    #[tokio::test]
    async fn test_folder_and_bad_url_are_not_sent() {
        let client = create_client(None);
        let folder = execute_request(&client, &Request::folder("Users"), None).await;
        assert_eq!(folder.status, 0);

        let bad = Request {
            url: "not a url".into(),
            ..Request::default()
        };
        let response = execute_request(&client, &bad, None).await;
        assert_eq!(response.status, 0);
        assert!(response.data.starts_with("Invalid URL"));
    }
}
