//! Single-call HTTP execution and response classification.

use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, trace};

use questlog_core::error::{
    AuthError, Error, InvalidInputError, ProtocolError, RequestError, TransportError,
};
use questlog_core::{AccessToken, ApiUrl, Result};

use crate::config::ClientConfig;

/// A request body.
#[derive(Debug, Clone)]
pub enum Body {
    /// Structured data, sent as `application/json`.
    Json(Value),
    /// An opaque payload (e.g. an upload). No content type is forced; set one
    /// through [`RequestOptions::header`] if the server needs it.
    Binary(Vec<u8>),
}

/// Method, body and extra headers of one call.
///
/// Options are kept intact so a call can be replayed unchanged after a
/// credential refresh.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Body>,
    pub headers: HeaderMap,
}

impl RequestOptions {
    /// Options for the given method with no body.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    pub fn patch() -> Self {
        Self::new(Method::PATCH)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    /// Attach a structured body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|e| InvalidInputError::Other {
            message: format!("body is not serializable: {}", e),
        })?;
        self.body = Some(Body::Json(value));
        Ok(self)
    }

    /// Attach an opaque binary body.
    pub fn binary(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.body = Some(Body::Binary(bytes.into()));
        self
    }

    /// Add a header, validating name and value.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| InvalidInputError::Header {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| InvalidInputError::Header {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }
}

/// How a single call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 2xx. `body` is `None` for 204 and empty bodies.
    Success {
        status: StatusCode,
        body: Option<Value>,
    },
    /// 401: the access credential was rejected.
    CredentialExpired,
    /// Any other non-2xx status.
    Failure { status: StatusCode, message: String },
}

impl Outcome {
    /// Convert into the value handed to callers.
    ///
    /// `CredentialExpired` is terminal here; only the client's request path
    /// turns it into a refresh.
    pub fn into_body(self) -> Result<Option<Value>> {
        match self {
            Outcome::Success { body, .. } => Ok(body),
            Outcome::CredentialExpired => Err(AuthError::RetryExhausted.into()),
            Outcome::Failure { status, message } => {
                Err(RequestError::new(status.as_u16(), message).into())
            }
        }
    }

    /// HTTP status of the response.
    pub fn status(&self) -> StatusCode {
        match self {
            Outcome::Success { status, .. } | Outcome::Failure { status, .. } => *status,
            Outcome::CredentialExpired => StatusCode::UNAUTHORIZED,
        }
    }

    /// True for a response that rejected the body's shape rather than its content.
    pub(crate) fn is_shape_rejection(&self) -> bool {
        matches!(
            self,
            Outcome::Failure { status, .. }
                if *status == StatusCode::BAD_REQUEST || *status == StatusCode::UNPROCESSABLE_ENTITY
        )
    }
}

/// Issues one outbound call and classifies the response.
///
/// The executor holds no session state: the caller passes the access
/// credential to attach, if any.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: reqwest::Client,
    base: ApiUrl,
}

impl RequestExecutor {
    /// Create an executor for the configured API.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(map_transport)?;

        Ok(Self {
            client,
            base: config.base_url.clone(),
        })
    }

    /// Returns the API base URL.
    pub fn base(&self) -> &ApiUrl {
        &self.base
    }

    /// Send one call. A bearer credential is attached iff `access` is given.
    #[instrument(skip(self, options, access), fields(method = %options.method, authed = access.is_some()))]
    pub async fn execute(
        &self,
        path: &str,
        options: &RequestOptions,
        access: Option<&AccessToken>,
    ) -> Result<Outcome> {
        let url = self.base.endpoint(path);
        debug!(%url, "Sending request");

        let mut request = self
            .client
            .request(options.method.clone(), &url)
            .header(ACCEPT, "application/json");

        if let Some(token) = access {
            request = request.bearer_auth(token.as_str());
        }

        request = match &options.body {
            Some(Body::Json(value)) => request.json(value),
            Some(Body::Binary(bytes)) => request.body(bytes.clone()),
            None => request,
        };

        let response = request
            .headers(options.headers.clone())
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        trace!(%status, "Response received");

        if status == StatusCode::UNAUTHORIZED {
            debug!("Credential rejected");
            return Ok(Outcome::CredentialExpired);
        }

        let text = response.text().await.map_err(map_transport)?;

        if status.is_success() {
            let body = if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
                None
            } else {
                Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
            };
            Ok(Outcome::Success { status, body })
        } else {
            let message = error_message(status, &text);
            debug!(%status, %message, "Request failed");
            Ok(Outcome::Failure { status, message })
        }
    }

    /// POST each body in turn until one is not rejected for its shape.
    ///
    /// Used for endpoints whose field names vary between deployments. The
    /// outcome of the last attempt is returned when every body is rejected.
    #[instrument(skip(self, bodies), fields(candidates = bodies.len()))]
    pub(crate) async fn post_first_accepted(&self, path: &str, bodies: &[Value]) -> Result<Outcome> {
        let mut last = None;

        for (attempt, body) in bodies.iter().enumerate() {
            let options = RequestOptions {
                method: Method::POST,
                body: Some(Body::Json(body.clone())),
                headers: HeaderMap::new(),
            };

            let outcome = self.execute(path, &options, None).await?;
            if !outcome.is_shape_rejection() {
                return Ok(outcome);
            }

            debug!(attempt, "Body shape rejected, trying next");
            last = Some(outcome);
        }

        last.ok_or_else(|| {
            ProtocolError::new(None, format!("no request body shapes configured for {}", path))
                .into()
        })
    }
}

/// Best-effort message for a failed response: the JSON `message` field,
/// then `error`, then the status reason.
pub(crate) fn error_message(status: StatusCode, text: &str) -> String {
    let from_body = serde_json::from_str::<Value>(text).ok().and_then(|v| {
        ["message", "error"].iter().find_map(|key| {
            v.get(*key)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        })
    });

    from_body
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

/// Map a reqwest failure (no usable response) onto the transport error kinds.
pub(crate) fn map_transport(err: reqwest::Error) -> Error {
    let transport = if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connection {
            message: err.to_string(),
        }
    } else {
        TransportError::Http {
            message: err.to_string(),
        }
    };
    Error::Transport(transport)
}
