use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::error::ClientError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// How a client authenticates against its endpoint.
#[derive(Debug, Clone)]
pub enum Auth {
    None,
    /// Static header, e.g. `Authorization: Token <t>` or `X-Auth-Token: <t>`.
    Header { name: &'static str, value: String },
    Basic { username: String, password: String },
}

/// JSON over HTTP with status codes mapped onto [`ClientError`].
#[derive(Debug, Clone)]
pub struct JsonClient {
    http: reqwest::Client,
    base: String,
    auth: Auth,
}

impl JsonClient {
    pub fn new(base: &str, auth: Auth, verify_tls: bool, headers: &[(&'static str, &str)]) -> Result<Self, ClientError> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in headers {
            let value = HeaderValue::from_str(value).map_err(|e| ClientError::Invalid(format!("header {}: {}", name, e)))?;
            default_headers.insert(HeaderName::from_static(*name), value);
        }

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!verify_tls)
            .timeout(REQUEST_TIMEOUT)
            .default_headers(default_headers)
            .build()?;

        Ok(JsonClient { http, base: base.trim_end_matches('/').to_string(), auth })
    }

    /// `path` relative to the base URL; absolute URLs are used as they are.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.is_empty() {
            self.base.clone()
        } else {
            format!("{}/{}", self.base, path.trim_start_matches('/'))
        }
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.auth {
            Auth::None => builder,
            Auth::Header { name, value } => builder.header(*name, value),
            Auth::Basic { username, password } => builder.basic_auth(username, Some(password)),
        }
    }

    /// Sends the request and fails on any non-2xx status.
    pub async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Response, ClientError> {
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(body);
        }
        check(request.send().await?, path).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        decode(self.send(Method::GET, path, None).await?).await
    }

    /// GET with `query` appended and form-encoded.
    pub async fn get_query<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, ClientError> {
        decode(check(self.query_request(path, query).send().await?, path).await?).await
    }

    fn query_request(&self, path: &str, query: &[(&str, &str)]) -> RequestBuilder {
        self.request(Method::GET, path).query(query)
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ClientError> {
        decode(self.send(Method::POST, path, Some(body)).await?).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Result<(), ClientError> {
        self.send(Method::PATCH, path, Some(body)).await.map(|_| ())
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<(), ClientError> {
        self.send(Method::PUT, path, Some(body)).await.map(|_| ())
    }

    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send(Method::DELETE, path, None).await.map(|_| ())
    }
}

/// Maps error statuses: 404 to `NotFound`, 409 and 423 to `Conflict`, others to `Status`.
pub async fn check(response: Response, what: &str) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => ClientError::NotFound(what.to_string()),
        StatusCode::CONFLICT | StatusCode::LOCKED => ClientError::Conflict(body),
        _ => ClientError::Status { status: status.as_u16(), body },
    })
}

pub async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Fills `{switch}` / `{bmc}` style placeholders of an endpoint template.
pub fn expand(template: &str, key: &str, value: &str) -> String {
    template.replace(&format!("{{{}}}", key), value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_join_the_base() {
        let client = JsonClient::new("https://netbox.example/", Auth::None, true, &[]).unwrap();
        assert_eq!(client.url("/api/dcim/devices/"), "https://netbox.example/api/dcim/devices/");
        assert_eq!(client.url("https://other/x"), "https://other/x");
    }

    #[test]
    fn query_values_are_encoded() {
        let client = JsonClient::new("https://netbox.example", Auth::None, true, &[]).unwrap();
        let request = client.query_request("/api/dcim/devices/", &[("name", "r1 n01&limit=1"), ("limit", "200")]).build().unwrap();
        assert_eq!(request.url().as_str(), "https://netbox.example/api/dcim/devices/?name=r1+n01%26limit%3D1&limit=200");
    }

    #[test]
    fn templates_are_expanded() {
        assert_eq!(expand("https://{switch}:8765/nvue_v1", "switch", "leaf-01"), "https://leaf-01:8765/nvue_v1");
    }
}
