use crate::error::{HttpError, HttpResult};
use loadbench_core::ApiEnvironment;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

/// Status, body and timing of one request.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub elapsed: Duration,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json(&self) -> HttpResult<Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// REST client configured from an API environment: default headers,
/// per-request timeout and certificate checking as the environment says.
#[derive(Debug, Clone)]
pub struct ApiClient {
    env: ApiEnvironment,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(env: ApiEnvironment) -> HttpResult<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in env.headers() {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| HttpError::InvalidHeader {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            let header_value = HeaderValue::from_str(&value).map_err(|e| HttpError::InvalidHeader {
                name: name.clone(),
                message: e.to_string(),
            })?;
            headers.insert(header_name, header_value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(env.timeout())
            .danger_accept_invalid_certs(!env.verify_ssl)
            .build()?;

        Ok(Self { env, client })
    }

    pub fn env(&self) -> &ApiEnvironment {
        &self.env
    }

    pub fn url(&self, path: &str) -> String {
        self.env.url(path)
    }

    /// `{api_prefix}/{resource}`
    pub fn resource_path(&self, resource: &str) -> String {
        format!("{}/{resource}", self.env.api_prefix().trim_end_matches('/'))
    }

    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> HttpResult<ApiResponse> {
        let url = self.url(path);
        let mut builder = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let start = Instant::now();
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        let elapsed = start.elapsed();
        debug!("{method} {url} -> {status} in {:.3}s", elapsed.as_secs_f64());

        Ok(ApiResponse {
            status,
            elapsed,
            body,
        })
    }

    pub async fn get(&self, path: &str) -> HttpResult<ApiResponse> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> HttpResult<ApiResponse> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> HttpResult<ApiResponse> {
        self.request(Method::DELETE, path, None).await
    }

    /// GET a collection and return its items; a non-array body yields nothing.
    pub async fn list(&self, path: &str) -> HttpResult<(StatusCode, Vec<Value>)> {
        let response = self.get(path).await?;
        if !response.status.is_success() {
            return Ok((response.status, Vec::new()));
        }
        let items = match response.json()? {
            Value::Array(items) => items,
            _ => Vec::new(),
        };
        Ok((response.status, items))
    }
}

/// Read a field under its PascalCase or camelCase name.
pub fn field<'a>(value: &'a Value, pascal: &str) -> Option<&'a Value> {
    value.get(pascal).or_else(|| {
        let mut chars = pascal.chars();
        let camel: String = match chars.next() {
            Some(first) => first.to_lowercase().chain(chars).collect(),
            None => return None,
        };
        value.get(camel.as_str())
    })
}

/// `Id` or `id` as an integer.
pub fn entity_id(value: &Value) -> Option<i64> {
    field(value, "Id").and_then(Value::as_i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(extra: Value) -> ApiEnvironment {
        let mut base = json!({ "base_url": "http://localhost:5000/" });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn test_entity_id_casing() {
        assert_eq!(entity_id(&json!({"Id": 4})), Some(4));
        assert_eq!(entity_id(&json!({"id": 9, "title": "x"})), Some(9));
        assert_eq!(entity_id(&json!({"name": "x"})), None);
        assert_eq!(field(&json!({"authorId": 3}), "AuthorId"), Some(&json!(3)));
    }

    #[test]
    fn test_client_paths() {
        let client = ApiClient::new(env(json!({ "api_prefix": "/v2/" }))).unwrap();
        assert_eq!(client.resource_path("Books"), "/v2/Books");
        assert_eq!(client.url("/v2/Books"), "http://localhost:5000/v2/Books");
    }

    #[test]
    fn test_invalid_header_rejected() {
        let err = ApiClient::new(env(json!({ "headers": { "Bad Header": "x" } }))).unwrap_err();
        assert!(matches!(err, HttpError::InvalidHeader { .. }));
    }
}
