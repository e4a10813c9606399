use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Method, Response, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{Error, Result};
use crate::navigation::{Navigator, Route};
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, CLIENT_UNAUTHORIZED,
};
use crate::token::TokenStore;
use crate::types::{LoginRequest, LoginResponse};

/// Base URL used when none is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:3001/api/";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-request options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Send the request without an `Authorization` header.
    pub skip_auth: bool,
}

impl RequestOptions {
    /// Options for an unauthenticated request.
    pub fn skip_auth() -> Self {
        Self { skip_auth: true }
    }
}

/// HTTP client for the agent backend.
///
/// Attaches the stored bearer token, speaks JSON, and turns non-success
/// responses into [`Error`]s.  A 401 clears the stored token and moves the
/// front end to [`Route::Login`] before the error is returned.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    base_url: Url,
    tokens: Arc<dyn TokenStore>,
    navigator: Navigator,
    connect_timeout: Duration,
}

impl HttpClient {
    /// Create a new client for `base_url`.
    pub fn new(base_url: &str, tokens: Arc<dyn TokenStore>, navigator: Navigator) -> Result<Self> {
        Self::with_options(base_url, tokens, navigator, None)
    }

    /// Create a new client with a custom connect timeout.
    ///
    /// Only connection establishment is bounded; a streaming body may stay open
    /// as long as the server keeps it open.
    pub fn with_options(
        base_url: &str,
        tokens: Arc<dyn TokenStore>,
        navigator: Navigator,
        connect_timeout: Option<Duration>,
    ) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;
        let connect_timeout = connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            tokens,
            navigator,
            connect_timeout,
        })
    }

    /// Returns the base URL every relative endpoint is joined to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the token store.
    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    /// Returns the navigator this client redirects on 401.
    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Resolves an endpoint.
    ///
    /// Absolute `http`/`https` endpoints are used verbatim; anything else is
    /// joined to the base URL.
    pub fn endpoint(&self, endpoint: &str) -> Result<Url> {
        if endpoint.starts_with("http") {
            return Ok(Url::parse(endpoint)?);
        }
        Ok(self.base_url.join(endpoint.trim_start_matches('/'))?)
    }

    /// Create and return default headers for JSON requests.
    pub(crate) fn default_headers(&self, options: RequestOptions) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        if !options.skip_auth {
            if let Some(token) = self.tokens.get() {
                self.insert_bearer(&mut headers, &token);
            }
        }
        headers
    }

    pub(crate) fn insert_bearer(&self, headers: &mut HeaderMap, token: &str) {
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(value) => {
                headers.insert(header::AUTHORIZATION, value);
            }
            Err(_) => tracing::warn!("stored token is not a valid header value; sending without it"),
        }
    }

    pub(crate) fn request_builder(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.client.request(method, url)
    }

    /// Send a prepared request, mapping transport failures.
    pub(crate) async fn execute(&self, builder: reqwest::RequestBuilder) -> Result<Response> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let result = builder.send().await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        result.map_err(|e| {
            CLIENT_REQUEST_ERRORS.click();
            Error::from_reqwest(e, Some(self.connect_timeout.as_secs_f64()))
        })
    }

    /// Pass a successful response through; turn anything else into an error.
    pub(crate) async fn check_response(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        CLIENT_REQUEST_ERRORS.click();
        if status.as_u16() == 401 {
            CLIENT_UNAUTHORIZED.click();
            tracing::info!(url = %response.url(), "server rejected the token; logging out");
            if let Err(err) = self.tokens.clear() {
                tracing::warn!(error = %err, "could not clear the stored token");
            }
            self.navigator.navigate(Route::Login);
            return Err(Error::unauthorized("Unauthorized"));
        }
        let body = response.text().await.unwrap_or_default();
        let message = error_message_from_body(status.as_u16(), &body);
        tracing::debug!(status = status.as_u16(), %message, "request failed");
        Err(Error::http(status.as_u16(), message))
    }

    /// Send a JSON request to `url` and parse the JSON response.
    pub(crate) async fn send_json<T, B>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        tracing::debug!(%method, %url, "sending request");
        let mut builder = self
            .request_builder(method, url)
            .headers(self.default_headers(options));
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = self.execute(builder).await?;
        let response = self.check_response(response).await?;
        let text = response.text().await.map_err(|e| {
            Error::http_client(format!("Failed to read response: {}", e), Some(Box::new(e)))
        })?;
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })
    }

    /// GET `endpoint`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let url = self.endpoint(endpoint)?;
        self.send_json::<T, ()>(Method::GET, url, None, options).await
    }

    /// POST `body` to `endpoint`.
    pub async fn post<T, B>(&self, endpoint: &str, body: Option<&B>, options: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(endpoint)?;
        self.send_json(Method::POST, url, body, options).await
    }

    /// PUT `body` to `endpoint`.
    pub async fn put<T, B>(&self, endpoint: &str, body: Option<&B>, options: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(endpoint)?;
        self.send_json(Method::PUT, url, body, options).await
    }

    /// DELETE `endpoint`.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let url = self.endpoint(endpoint)?;
        self.send_json::<T, ()>(Method::DELETE, url, None, options).await
    }

    /// Log in with `email` and store the returned token.
    pub async fn login(&self, email: &str) -> Result<LoginResponse> {
        let email = email.trim();
        if email.is_empty() {
            return Err(Error::validation("email is required", Some("email".to_string())));
        }
        let request = LoginRequest {
            email: email.to_string(),
        };
        let response: LoginResponse = self
            .post("auth/login", Some(&request), RequestOptions::skip_auth())
            .await?;
        self.tokens.set(&response.token)?;
        tracing::info!("logged in");
        if self.navigator.current() == Route::Login {
            self.navigator.navigate(Route::NewChat);
        }
        Ok(response)
    }

    /// Forget the stored token and move to the login view.
    pub fn logout(&self) -> Result<()> {
        self.tokens.clear()?;
        self.navigator.navigate(Route::Login);
        Ok(())
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_str())
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

fn normalize_base_url(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Picks the message for a failed response.
///
/// A JSON body with a string `error` (or, failing that, `message`) supplies
/// it; anything else yields `HTTP <status>`.
pub(crate) fn error_message_from_body(status: u16, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["error", "message"].iter().find_map(|key| {
                value
                    .get(key)
                    .and_then(serde_json::Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
            })
        })
        .unwrap_or_else(|| format!("HTTP {status}"))
}
