//! Outbound requests and credential attachment.

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::session::Session;

/// Per-call options for [`CampusClient::request`](crate::CampusClient::request).
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Option<serde_json::Value>,
    pub(crate) headers: HeaderMap,
    pub(crate) renewal: bool,
    pub(crate) notify: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            query: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
            renewal: true,
            notify: true,
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Append query parameters. `None` fields are skipped.
    pub fn query<Q: Serialize + ?Sized>(mut self, query: &Q) -> Result<Self> {
        let value = serde_json::to_value(query)?;
        let serde_json::Value::Object(fields) = value else {
            return Err(Error::Config("query must serialize to an object".to_string()));
        };
        for (key, value) in fields {
            let value = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            self.query.push((key, value));
        }
        Ok(self)
    }

    /// Add a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Never attempt token renewal for this call.
    ///
    /// Used for login and registration, where a 401 means bad credentials
    /// rather than an expired session.
    pub fn without_renewal(mut self) -> Self {
        self.renewal = false;
        self
    }

    /// Do not report a failure of this call to the event sink.
    pub fn silent(mut self) -> Self {
        self.notify = false;
        self
    }
}

/// One logical call, including its single permitted replay.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    retried: bool,
    notify: bool,
}

impl OutboundRequest {
    pub fn new(method: Method, path: impl Into<String>, options: RequestOptions) -> Self {
        Self {
            method,
            path: path.into(),
            headers: options.headers,
            query: options.query,
            body: options.body,
            // A call that must not renew starts out as if it had already retried.
            retried: !options.renewal,
            notify: options.notify,
        }
    }

    /// Whether the renewal path has already been taken for this call.
    pub fn retried(&self) -> bool {
        self.retried
    }

    /// Whether a failure should reach the event sink.
    pub fn notifies(&self) -> bool {
        self.notify
    }

    /// Flip `retried` to true. Returns `false` if it was already set.
    pub fn mark_retried(&mut self) -> bool {
        !std::mem::replace(&mut self.retried, true)
    }

    /// Set `Authorization: Bearer <token>`.
    pub fn set_bearer(&mut self, token: &str) {
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.headers.insert(AUTHORIZATION, value);
            }
            Err(_) => {
                tracing::warn!("Access token contains invalid header characters; sending unauthenticated");
                self.headers.remove(AUTHORIZATION);
            }
        }
    }

    /// Token currently carried in the authorization header, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
    }
}

/// Attach the session's access token to `request`.
///
/// With no access token the request goes out unauthenticated; the server
/// decides whether the endpoint needs one.
pub fn authorize(request: &mut OutboundRequest, session: &Session) {
    match session.access_token.as_deref() {
        Some(token) => request.set_bearer(token),
        None => {
            request.headers.remove(AUTHORIZATION);
        }
    }
}
