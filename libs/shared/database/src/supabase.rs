use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::error::DatabaseError;

/// `Prefer` header asking PostgREST to echo written rows back.
pub const RETURN_REPRESENTATION: &str = "return=representation";

/// `Prefer` header for upserts keyed on an `on_conflict` column list.
pub const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=representation";

#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, DatabaseError> {
        let mut headers = HeaderMap::new();

        let api_key = HeaderValue::from_str(&self.anon_key)
            .map_err(|e| DatabaseError::Configuration(format!("invalid anon key: {}", e)))?;
        headers.insert("apikey", api_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| DatabaseError::Configuration(format!("invalid auth token: {}", e)))?;
            headers.insert(AUTHORIZATION, bearer);
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T, DatabaseError>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T, DatabaseError>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(classify_error(status.as_u16(), &error_text));
        }

        let text = response.text().await?;
        // PostgREST answers `return=minimal` writes and void RPCs with an empty body.
        let data = if text.trim().is_empty() {
            serde_json::from_value(Value::Null)?
        } else {
            serde_json::from_str(&text)?
        };
        Ok(data)
    }

    /// Convenience for writes that should echo the affected rows.
    pub async fn write_returning(&self, method: Method, path: &str,
                                 auth_token: Option<&str>, body: Value,
                                 prefer: &'static str) -> Result<Vec<Value>, DatabaseError> {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static(prefer));

        self.request_with_headers(method, path, auth_token, Some(body), Some(headers)).await
    }
}

fn classify_error(status: u16, body: &str) -> DatabaseError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let field = |name: &str| {
        parsed.as_ref()
            .and_then(|v| v.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let message = field("message").unwrap_or_else(|| body.to_string());

    match status {
        409 => DatabaseError::Conflict {
            code: field("code").unwrap_or_else(|| "409".to_string()),
            message,
        },
        401 | 403 => DatabaseError::Auth(message),
        404 => DatabaseError::NotFound(message),
        _ => DatabaseError::Api { status, message },
    }
}
