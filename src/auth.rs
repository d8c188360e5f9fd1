//! Turns an `AuthConfig` into the headers/query params it injects

use base64::Engine;

use crate::models::{ApiKeyLocation, AuthConfig, Header};

/// Headers and query params produced by an auth config
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthInjection {
    pub headers: Vec<Header>,
    pub query: Vec<Header>,
}

pub fn basic_credentials(username: &str, password: &str) -> String {
    let credentials = format!("{}:{}", username, password);
    base64::engine::general_purpose::STANDARD.encode(credentials)
}

pub fn inject(auth: &AuthConfig) -> AuthInjection {
    let mut injection = AuthInjection::default();
    match auth {
        AuthConfig::None => {}
        AuthConfig::Bearer { token } => {
            injection
                .headers
                .push(Header::new("Authorization", format!("Bearer {}", token)));
        }
        AuthConfig::Basic { username, password } => {
            injection.headers.push(Header::new(
                "Authorization",
                format!("Basic {}", basic_credentials(username, password)),
            ));
        }
        AuthConfig::ApiKey {
            key_name,
            key_value,
            key_location,
        } => {
            // An unnamed key would produce an invalid header
            if !key_name.is_empty() {
                let pair = Header::new(key_name.clone(), key_value.clone());
                match key_location {
                    ApiKeyLocation::Header => injection.headers.push(pair),
                    ApiKeyLocation::Query => injection.query.push(pair),
                }
            }
        }
    }
    injection
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_is_base64() {
        let injection = inject(&AuthConfig::Basic {
            username: "user".into(),
            password: "pass".into(),
        });
        assert_eq!(injection.headers[0].value, "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_api_key_location() {
        let mut auth = AuthConfig::ApiKey {
            key_name: "api_key".into(),
            key_value: "secret".into(),
            key_location: ApiKeyLocation::Query,
        };
        let injection = inject(&auth);
        assert!(injection.headers.is_empty());
        assert_eq!(injection.query, vec![Header::new("api_key", "secret")]);

        if let AuthConfig::ApiKey { key_location, .. } = &mut auth {
            *key_location = ApiKeyLocation::Header;
        }
        assert_eq!(inject(&auth).headers, vec![Header::new("api_key", "secret")]);
    }
}
