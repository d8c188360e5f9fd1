//! OpenAPI/Swagger document importer
//!
//! Builds one collection per document: a folder for each first path
//! segment and one request per operation inside it.

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use crate::models::{ApiKeyLocation, AuthConfig, Collection, Header, HttpMethod, Request};

const METHODS: &[&str] = &["get", "post", "put", "patch", "delete", "head", "options"];

/// Read and convert an OpenAPI file (JSON or YAML)
pub fn load_openapi_file(path: &Path) -> Result<Collection> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    openapi_to_collection(&content).with_context(|| format!("importing {}", path.display()))
}

/// Deserialize JSON when the document looks like JSON, YAML otherwise
fn parse_document(text: &str) -> Result<Value> {
    let doc: Value = if text.trim_start().starts_with('{') {
        serde_json::from_str(text).context("invalid JSON document")?
    } else {
        serde_yaml::from_str(text).context("invalid YAML document")?
    };

    if doc.get("openapi").is_none() && doc.get("swagger").is_none() {
        bail!("not an OpenAPI document (missing 'openapi' or 'swagger' field)");
    }
    Ok(doc)
}

/// Convert an OpenAPI 2.0 or 3.x document into a collection
pub fn openapi_to_collection(text: &str) -> Result<Collection> {
    let doc = parse_document(text)?;

    let info = doc.get("info");
    let title = info
        .and_then(|i| i.get("title"))
        .and_then(|v| v.as_str())
        .unwrap_or("Imported API");
    let mut collection = Collection::new(title);
    collection.description = info
        .and_then(|i| i.get("description"))
        .and_then(|v| v.as_str())
        .map(String::from);

    let base_url = base_url(&doc);
    let schemes = security_schemes(&doc);
    let global_auth = doc
        .get("security")
        .map(|s| auth_from_requirement(s, &schemes))
        .unwrap_or_default();

    let Some(paths) = doc.get("paths").and_then(|p| p.as_object()) else {
        return Ok(collection);
    };

    // Folder id per first path segment; `paths` iterates in sorted key order,
    // so folders appear sorted by segment
    let mut folders: HashMap<String, String> = HashMap::new();

    for (path, item) in paths {
        let Some(methods) = item.as_object() else {
            continue;
        };
        let shared_params = item
            .get("parameters")
            .and_then(|p| p.as_array())
            .cloned()
            .unwrap_or_default();

        for (method_key, operation) in methods {
            let method_name = method_key.to_lowercase();
            // Skip non-HTTP keys like "parameters" or "summary"
            if !METHODS.contains(&method_name.as_str()) {
                continue;
            }
            let Some(method) = HttpMethod::parse(&method_name) else {
                continue;
            };

            let segment = first_segment(path);
            let folder_id = match folders.get(&segment) {
                Some(id) => id.clone(),
                None => {
                    let folder = Request::folder(segment.clone());
                    let id = folder.id.clone();
                    collection.requests.push(folder);
                    folders.insert(segment, id.clone());
                    id
                }
            };

            let mut request =
                build_request(method, path, operation, &shared_params, &base_url);
            request.auth = match operation.get("security") {
                Some(security) => auth_from_requirement(security, &schemes),
                None => global_auth.clone(),
            };
            request.parent_id = Some(folder_id);
            collection.requests.push(request);
        }
    }

    tracing::info!(
        title,
        folders = folders.len(),
        items = collection.requests.len(),
        "converted OpenAPI document"
    );
    Ok(collection)
}

fn base_url(doc: &Value) -> String {
    // OpenAPI 3.x
    if let Some(url) = doc
        .get("servers")
        .and_then(|s| s.as_array())
        .and_then(|s| s.first())
        .and_then(|s| s.get("url"))
        .and_then(|u| u.as_str())
    {
        return url.trim_end_matches('/').to_string();
    }

    // Swagger 2.0
    let base_path = doc
        .get("basePath")
        .and_then(|b| b.as_str())
        .unwrap_or("")
        .trim_end_matches('/');
    match doc.get("host").and_then(|h| h.as_str()) {
        Some(host) => {
            let scheme = doc
                .get("schemes")
                .and_then(|s| s.as_array())
                .and_then(|s| s.first())
                .and_then(|s| s.as_str())
                .unwrap_or("https");
            format!("{}://{}{}", scheme, host, base_path)
        }
        None => base_path.to_string(),
    }
}

fn first_segment(path: &str) -> String {
    path.split('/')
        .find(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(|| String::from("root"))
}

fn path_param_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([^{}]+)\}").expect("static pattern"))
}

/// `/users/{id}` becomes `/users/{{id}}`
fn templated_path(path: &str) -> String {
    path_param_pattern()
        .replace_all(path, "{{$1}}")
        .into_owned()
}

fn build_request(
    method: HttpMethod,
    path: &str,
    operation: &Value,
    shared_params: &[Value],
    base_url: &str,
) -> Request {
    let text = |key: &str| {
        operation
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(String::from)
    };

    let name = text("summary")
        .or_else(|| text("operationId"))
        .unwrap_or_else(|| format!("{} {}", method.as_str(), path));

    let mut request = Request {
        name,
        method,
        url: format!("{}{}", base_url, templated_path(path)),
        headers: Vec::new(),
        description: text("description"),
        ..Request::default()
    };

    // Operation-level parameters win over path-level ones of the same name
    let mut params: Vec<&Value> = operation
        .get("parameters")
        .and_then(|p| p.as_array())
        .map(|p| p.iter().collect())
        .unwrap_or_default();
    for shared in shared_params {
        let name = shared.get("name");
        if !params.iter().any(|p| p.get("name") == name) {
            params.push(shared);
        }
    }

    let mut body = None;
    for param in params {
        let Some(name) = param.get("name").and_then(|n| n.as_str()) else {
            continue;
        };
        match param.get("in").and_then(|i| i.as_str()) {
            Some("query") => request.params.push(Header::new(name, example_value(param))),
            Some("header") => request.headers.push(Header::new(name, example_value(param))),
            // Swagger 2.0 body parameter
            Some("body") => body = param.get("schema").and_then(schema_example),
            _ => {}
        }
    }

    if let Some(request_body) = operation.get("requestBody") {
        body = request_body_example(request_body).or(body);
    }

    if let Some(example) = body {
        request
            .headers
            .push(Header::new("Content-Type", "application/json"));
        request.body = example;
    }

    request
}

/// Parameter default/example rendered as text, empty when absent
fn example_value(param: &Value) -> String {
    let schema = param.get("schema");
    let value = param
        .get("example")
        .or_else(|| schema.and_then(|s| s.get("example")))
        .or_else(|| schema.and_then(|s| s.get("default")))
        .or_else(|| param.get("default"));
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn pretty(value: &Value) -> Option<String> {
    serde_json::to_string_pretty(value).ok()
}

fn schema_example(schema: &Value) -> Option<String> {
    schema.get("example").and_then(pretty)
}

fn request_body_example(body: &Value) -> Option<String> {
    let content = body.get("content")?.as_object()?;
    let media = content
        .get("application/json")
        .or_else(|| content.iter().find(|(ct, _)| ct.contains("json")).map(|(_, m)| m))?;

    if let Some(example) = media.get("example") {
        return pretty(example);
    }
    if let Some(first) = media
        .get("examples")
        .and_then(|e| e.as_object())
        .and_then(|e| e.values().next())
        .and_then(|e| e.get("value"))
    {
        return pretty(first);
    }
    media.get("schema").and_then(schema_example)
}

/// Security schemes by name, mapped to an auth config with empty credentials
fn security_schemes(doc: &Value) -> HashMap<String, AuthConfig> {
    let definitions = doc
        .get("components")
        .and_then(|c| c.get("securitySchemes"))
        .or_else(|| doc.get("securityDefinitions"))
        .and_then(|s| s.as_object());

    let Some(definitions) = definitions else {
        return HashMap::new();
    };

    definitions
        .iter()
        .filter_map(|(name, scheme)| {
            let scheme_type = scheme.get("type").and_then(|t| t.as_str()).unwrap_or("");
            let auth = match scheme_type {
                "http" => match scheme.get("scheme").and_then(|s| s.as_str()) {
                    Some(s) if s.eq_ignore_ascii_case("bearer") => bearer(),
                    Some(s) if s.eq_ignore_ascii_case("basic") => basic(),
                    _ => return None,
                },
                "basic" => basic(),
                "apiKey" => {
                    let key_location = match scheme.get("in").and_then(|i| i.as_str()) {
                        Some("query") => ApiKeyLocation::Query,
                        Some("header") => ApiKeyLocation::Header,
                        _ => return None,
                    };
                    AuthConfig::ApiKey {
                        key_name: scheme
                            .get("name")
                            .and_then(|n| n.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        key_value: String::new(),
                        key_location,
                    }
                }
                // Access tokens are sent as bearer tokens
                "oauth2" | "openIdConnect" => bearer(),
                _ => return None,
            };
            Some((name.clone(), auth))
        })
        .collect()
}

fn bearer() -> AuthConfig {
    AuthConfig::Bearer {
        token: String::new(),
    }
}

fn basic() -> AuthConfig {
    AuthConfig::Basic {
        username: String::new(),
        password: String::new(),
    }
}

/// First scheme of the first requirement that we know how to express
fn auth_from_requirement(security: &Value, schemes: &HashMap<String, AuthConfig>) -> AuthConfig {
    security
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|req| req.as_object())
        .flat_map(|req| req.keys())
        .find_map(|name| schemes.get(name).cloned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PETSTORE_YAML: &str = r#"
openapi: 3.0.0
info:
  title: Pet Store
  version: 1.0.0
servers:
  - url: https://petstore.test/v1/
components:
  securitySchemes:
    token:
      type: http
      scheme: bearer
    key:
      type: apiKey
      in: query
      name: api_key
security:
  - token: []
paths:
  /:
    get:
      operationId: health
      security: []
  /pets:
    get:
      summary: List pets
      parameters:
        - name: limit
          in: query
          schema:
            type: integer
            default: 20
        - name: X-Request-Id
          in: header
      responses:
        '200':
          description: OK
    post:
      operationId: createPet
      requestBody:
        content:
          application/json:
            example:
              name: Rex
  /pets/{petId}:
    parameters:
      - name: petId
        in: path
        required: true
    delete:
      security:
        - key: []
"#;

    fn by_name<'a>(collection: &'a Collection, name: &str) -> &'a Request {
        collection
            .requests
            .iter()
            .find(|r| r.name == name)
            .unwrap()
    }

    #[test]
    fn test_openapi3_structure() {
        let collection = openapi_to_collection(PETSTORE_YAML).unwrap();
        assert_eq!(collection.name, "Pet Store");

        let folders: Vec<&str> = collection
            .requests
            .iter()
            .filter(|r| r.is_folder())
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(folders, vec!["root", "pets"]);
        assert_eq!(collection.requests.len(), 6);

        let pets_folder = by_name(&collection, "pets").id.clone();
        let list = by_name(&collection, "List pets");
        assert_eq!(list.url, "https://petstore.test/v1/pets");
        assert_eq!(list.parent_id.as_deref(), Some(pets_folder.as_str()));
        assert_eq!(list.params, vec![Header::new("limit", "20")]);
        assert_eq!(list.headers, vec![Header::new("X-Request-Id", "")]);
        assert_eq!(list.auth, bearer());
    }

    #[test]
    fn test_openapi3_bodies_names_and_security() {
        let collection = openapi_to_collection(PETSTORE_YAML).unwrap();

        let health = by_name(&collection, "health");
        assert_eq!(health.auth, AuthConfig::None);
        assert_eq!(health.url, "https://petstore.test/v1/");

        let create = by_name(&collection, "createPet");
        assert_eq!(create.method, HttpMethod::POST);
        let body: Value = serde_json::from_str(&create.body).unwrap();
        assert_eq!(body["name"], "Rex");
        assert!(create
            .headers
            .contains(&Header::new("Content-Type", "application/json")));

        let delete = by_name(&collection, "DELETE /pets/{petId}");
        assert_eq!(delete.url, "https://petstore.test/v1/pets/{{petId}}");
        assert_eq!(
            delete.auth,
            AuthConfig::ApiKey {
                key_name: "api_key".into(),
                key_value: String::new(),
                key_location: ApiKeyLocation::Query,
            }
        );
    }

    #[test]
    fn test_swagger2_json_from_file() {
        let json = r#"{
            "swagger": "2.0",
            "info": {"title": "Legacy", "version": "1"},
            "host": "legacy.test",
            "basePath": "/api",
            "schemes": ["http"],
            "securityDefinitions": {"basicAuth": {"type": "basic"}},
            "security": [{"basicAuth": []}],
            "paths": {
                "/orders": {
                    "post": {
                        "summary": "Create order",
                        "parameters": [
                            {"name": "body", "in": "body", "schema": {"example": {"qty": 2}}}
                        ]
                    }
                }
            }
        }"#;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(&path, json).unwrap();

        let collection = load_openapi_file(&path).unwrap();
        let order = by_name(&collection, "Create order");
        assert_eq!(order.url, "http://legacy.test/api/orders");
        assert_eq!(order.auth, basic());
        let body: Value = serde_json::from_str(&order.body).unwrap();
        assert_eq!(body["qty"], 2);
    }

    #[test]
    fn test_folders_follow_sorted_paths() {
        let json = r#"{
            "openapi": "3.0.0",
            "paths": {
                "/zebras": {"get": {"summary": "List zebras"}},
                "/apples/{id}": {"get": {"summary": "Get apple"}},
                "/zebras/{id}": {"get": {"summary": "Get zebra"}}
            }
        }"#;
        let collection = openapi_to_collection(json).unwrap();
        let folders: Vec<&str> = collection
            .requests
            .iter()
            .filter(|r| r.is_folder())
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(folders, vec!["apples", "zebras"]);
    }

    #[test]
    fn test_rejects_non_openapi() {
        assert!(openapi_to_collection("just: yaml").is_err());
        assert!(openapi_to_collection("{ not json").is_err());
        let dir = tempfile::tempdir().unwrap();
        assert!(load_openapi_file(&dir.path().join("missing.yaml")).is_err());
    }
}
