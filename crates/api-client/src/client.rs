//! API client for the remote expense service.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;

use spendlog_core::gateway::{
    CreateExpenseAck, CreateExpenseRequest, GatewayError, GatewayResult, RemoteExpense,
    RemoteGateway, RemoteUserProfile,
};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Error envelope the expense service sends with non-2xx responses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiErrorBody {
    fn into_message(self) -> Option<String> {
        match (self.code, self.message) {
            (Some(code), Some(message)) => Some(format!("{}: {}", code, message)),
            (None, Some(message)) => Some(message),
            (Some(code), None) => Some(code),
            (None, None) => None,
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::transport(format!("Request timed out: {}", err))
    } else if err.is_connect() {
        GatewayError::transport(format!("Connection failed: {}", err))
    } else {
        GatewayError::transport(err.to_string())
    }
}

/// Client for the expense service REST API.
#[derive(Debug, Clone)]
pub struct ExpenseApiClient {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl ExpenseApiClient {
    /// Create a new client against `base_url` (e.g. "https://api.spendlog.app").
    pub fn new(base_url: &str) -> Self {
        Self::with_bearer_token(base_url, None)
    }

    /// Create a client that sends `Authorization: Bearer <token>` when a token
    /// is given.
    pub fn with_bearer_token(base_url: &str, bearer_token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token,
        }
    }

    fn headers(&self) -> GatewayResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.bearer_token {
            let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| GatewayError::transport("Invalid access token format"))?;
            headers.insert(AUTHORIZATION, auth_value);
        }

        Ok(headers)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    /// Parse a JSON response body.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> GatewayResult<T> {
        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;
        Self::log_response(status, &body);

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(ApiErrorBody::into_message)
                .unwrap_or_else(|| format!("Request failed: {}", body));
            return Err(GatewayError::api(status.as_u16(), message));
        }

        serde_json::from_str(&body)
            .map_err(|e| GatewayError::decode(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl RemoteGateway for ExpenseApiClient {
    /// POST /api/expenses
    async fn create_expense(
        &self,
        request: &CreateExpenseRequest,
    ) -> GatewayResult<CreateExpenseAck> {
        let url = format!("{}/api/expenses", self.base_url);
        debug!("Uploading expense '{}' to {}", request.title, url);

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await
            .map_err(map_transport_error)?;

        Self::parse_response(response).await
    }

    /// GET /api/expenses?account={account}&since={date}
    async fn list_expenses(
        &self,
        account: &str,
        since: NaiveDate,
    ) -> GatewayResult<Vec<RemoteExpense>> {
        let url = format!("{}/api/expenses", self.base_url);
        let since_param = since.format("%Y-%m-%d").to_string();

        let response = self
            .client
            .get(&url)
            .headers(self.headers()?)
            .query(&[("account", account), ("since", since_param.as_str())])
            .send()
            .await
            .map_err(map_transport_error)?;

        Self::parse_response(response).await
    }

    /// GET /api/users/profile?account={account}
    async fn get_user_profile(&self, account: &str) -> GatewayResult<RemoteUserProfile> {
        let url = format!("{}/api/users/profile", self.base_url);

        let response = self
            .client
            .get(&url)
            .headers(self.headers()?)
            .query(&[("account", account)])
            .send()
            .await
            .map_err(map_transport_error)?;

        Self::parse_response(response).await
    }
}
