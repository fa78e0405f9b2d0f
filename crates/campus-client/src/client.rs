//! Main client implementation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use url::Url;

use crate::api::{AuthApi, ResourceApi};
use crate::error::{Error, ErrorResponse, Result};
use crate::events::{ClientEvent, EventSink, NullSink};
use crate::recovery::{self, Effect, Event, RecoveryState};
use crate::renewal::{HttpRenewer, RenewalCoordinator, TokenRenewer};
use crate::request::{OutboundRequest, RequestOptions, authorize};
use crate::session::{SessionStore, SharedSessionStore};
use crate::types::{
    Absence, Classroom, Course, Exam, ExamResult, Parent, Payment, Resource, SchoolEvent, Student,
    Teacher,
};

/// Default timeout for requests, renewal included.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Campus API client.
///
/// Every call goes through [`request`](Self::request), which attaches the
/// current access token and transparently renews it once if the backend
/// rejects it.
///
/// # Example
///
/// ```no_run
/// use campus_client::CampusClient;
///
/// # async fn example() -> campus_client::Result<()> {
/// let client = CampusClient::builder()
///     .base_url("http://localhost:3000")
///     .build()?;
///
/// client.auth().login("admin@school.test", "secret").await?;
/// let students = client.students().list().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CampusClient {
    /// Inner shared state.
    inner: Arc<ClientInner>,
}

/// Inner client state (shared across clones).
pub(crate) struct ClientInner {
    /// HTTP client.
    pub(crate) http: reqwest::Client,
    /// Base URL for API requests.
    pub(crate) base_url: Url,
    /// Request timeout.
    pub(crate) timeout: Duration,
    /// Current credentials.
    pub(crate) session: SharedSessionStore,
    /// Single-flight token renewal.
    pub(crate) renewal: RenewalCoordinator,
    /// Presentation-layer notifications.
    pub(crate) events: Arc<dyn EventSink>,
}

impl CampusClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client with default settings pointing to localhost.
    pub fn localhost() -> Result<Self> {
        Self::builder().base_url("http://127.0.0.1:3000").build()
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Get the session store.
    pub fn session(&self) -> &SharedSessionStore {
        &self.inner.session
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the authentication API.
    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.clone())
    }

    /// Access any resource collection.
    pub fn resource<T: Resource>(&self) -> ResourceApi<T> {
        ResourceApi::new(self.clone())
    }

    pub fn students(&self) -> ResourceApi<Student> {
        self.resource()
    }

    pub fn teachers(&self) -> ResourceApi<Teacher> {
        self.resource()
    }

    pub fn parents(&self) -> ResourceApi<Parent> {
        self.resource()
    }

    pub fn classrooms(&self) -> ResourceApi<Classroom> {
        self.resource()
    }

    pub fn courses(&self) -> ResourceApi<Course> {
        self.resource()
    }

    pub fn absences(&self) -> ResourceApi<Absence> {
        self.resource()
    }

    /// Access the school calendar.
    pub fn events(&self) -> ResourceApi<SchoolEvent> {
        self.resource()
    }

    pub fn exams(&self) -> ResourceApi<Exam> {
        self.resource()
    }

    pub fn results(&self) -> ResourceApi<ExamResult> {
        self.resource()
    }

    pub fn payments(&self) -> ResourceApi<Payment> {
        self.resource()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Call contract
    // ─────────────────────────────────────────────────────────────────────────

    /// Build a URL for an API path.
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        self.inner.base_url.join(path).map_err(Error::from)
    }

    /// Send a request, renewing the access token once on a 401.
    ///
    /// Returns the successful response. Any failed response is converted into
    /// an [`Error`]; non-auth failures are also reported to the event sink.
    /// If renewal fails the session is cleared, [`ClientEvent::SessionExpired`]
    /// is emitted and the renewal error is returned.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<reqwest::Response> {
        let url = self.url(path)?;
        let mut request = OutboundRequest::new(method, path, options);
        authorize(&mut request, &self.inner.session.snapshot());

        let mut outcome = self.dispatch(&url, &request).await;
        let mut state = RecoveryState::Normal;
        let mut event = Event::completed(status_of(&outcome), request.retried());

        loop {
            let transition = recovery::step(state, event);
            state = transition.state;

            let mut next = None;
            for effect in transition.effects {
                match effect {
                    Effect::MarkRetried => {
                        request.mark_retried();
                    }
                    Effect::Renew => {
                        let rejected = request.bearer_token().map(str::to_string);
                        next = Some(match self.inner.renewal.renew(rejected.as_deref()).await {
                            Ok(access_token) => Event::Renewed { access_token },
                            Err(failure) => Event::RenewalFailed(failure),
                        });
                    }
                    Effect::Replay { access_token } => {
                        request.set_bearer(&access_token);
                        tracing::debug!(method = %request.method, path = %request.path, "Replaying request");
                        outcome = self.dispatch(&url, &request).await;
                        next = Some(Event::completed(status_of(&outcome), request.retried()));
                    }
                    Effect::ClearSession => {
                        if let Err(e) = self.inner.session.clear() {
                            tracing::warn!("Failed to clear persisted session: {}", e);
                        }
                    }
                    Effect::SessionExpired => self.inner.events.emit(ClientEvent::SessionExpired),
                    Effect::Deliver { notify } => {
                        return self.deliver(outcome, notify && request.notifies()).await;
                    }
                    Effect::Fail(failure) => return Err(failure.into_error()),
                }
            }

            event = next.ok_or_else(|| {
                Error::InvalidState(format!("recovery produced no next step in {:?}", state))
            })?;
        }
    }

    /// Put one request on the wire. Non-success statuses are not errors here.
    async fn dispatch(&self, url: &Url, request: &OutboundRequest) -> Result<reqwest::Response> {
        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), url.clone())
            .headers(request.headers.clone())
            .timeout(self.inner.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(method = %request.method, path = %request.path, retried = request.retried(), "Sending request");
        let response = builder.send().await?;
        tracing::debug!(status = response.status().as_u16(), path = %request.path, "Response received");
        Ok(response)
    }

    /// Hand the final outcome to the caller.
    async fn deliver(
        &self,
        outcome: Result<reqwest::Response>,
        notify: bool,
    ) -> Result<reqwest::Response> {
        let error = match outcome {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => self.extract_error(response).await,
            Err(e) => e,
        };

        if notify {
            self.inner.events.emit(ClientEvent::RequestFailed {
                status: error.status(),
                message: error.user_message(),
            });
        }
        Err(error)
    }

    /// Extract an error from a failed response.
    async fn extract_error(&self, response: reqwest::Response) -> Error {
        let status = response.status().as_u16();
        let body = response.bytes().await.unwrap_or_default();
        ErrorResponse::parse(&body).into_error(status)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Typed helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Make a GET request.
    pub async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.request(Method::GET, path, RequestOptions::new()).await?;
        Ok(response.json().await?)
    }

    /// Make a GET request with query parameters.
    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let options = RequestOptions::new().query(query)?;
        let response = self.request(Method::GET, path, options).await?;
        Ok(response.json().await?)
    }

    /// Make a POST request.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let options = RequestOptions::new().json(body)?;
        let response = self.request(Method::POST, path, options).await?;
        Ok(response.json().await?)
    }

    /// Make a PUT request.
    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let options = RequestOptions::new().json(body)?;
        let response = self.request(Method::PUT, path, options).await?;
        Ok(response.json().await?)
    }

    /// Make a PATCH request.
    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let options = RequestOptions::new().json(body)?;
        let response = self.request(Method::PATCH, path, options).await?;
        Ok(response.json().await?)
    }

    /// Make a DELETE request.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.request(Method::DELETE, path, RequestOptions::new())
            .await?;
        Ok(())
    }
}

fn status_of(outcome: &Result<reqwest::Response>) -> Option<u16> {
    outcome.as_ref().ok().map(|r| r.status().as_u16())
}

/// Builder for creating a CampusClient.
pub struct ClientBuilder {
    base_url: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
    session: Option<SharedSessionStore>,
    events: Option<Arc<dyn EventSink>>,
    renewer: Option<Arc<dyn TokenRenewer>>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            session: None,
            events: None,
            renewer: None,
        }
    }

    /// Set the base URL for the API.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Use an existing session store (default: empty, in memory).
    pub fn session(mut self, session: SharedSessionStore) -> Self {
        self.session = Some(session);
        self
    }

    /// Deliver client events to `sink` (default: dropped).
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Replace the refresh-endpoint renewer.
    pub fn renewer(mut self, renewer: Arc<dyn TokenRenewer>) -> Self {
        self.renewer = Some(renewer);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<CampusClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;

        // Parse and normalize base URL
        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("campus-client/{}", env!("CARGO_PKG_VERSION")));

        // No default Authorization header: credentials are attached per
        // request, so the same pool can carry the un-intercepted renewal call.
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()?;

        let session = self
            .session
            .unwrap_or_else(|| Arc::new(SessionStore::in_memory()));

        let renewer: Arc<dyn TokenRenewer> = match self.renewer {
            Some(renewer) => renewer,
            None => Arc::new(HttpRenewer::new(http.clone(), &base_url, self.timeout)?),
        };

        Ok(CampusClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                timeout: self.timeout,
                renewal: RenewalCoordinator::new(renewer, session.clone()),
                session,
                events: self.events.unwrap_or_else(|| Arc::new(NullSink)),
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
