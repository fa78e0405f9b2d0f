//! Access-token renewal.
//!
//! [`HttpRenewer`] exchanges a refresh token for a new access token on a
//! plain transport that is never intercepted, so a failing renewal cannot
//! recurse into recovery. [`RenewalCoordinator`] makes renewal single-flight:
//! every call that is rejected while a renewal is running waits on that
//! renewal instead of starting another.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ErrorResponse, Result};
use crate::recovery::RenewalFailure;
use crate::session::SharedSessionStore;

/// Refresh endpoint, relative to the API base URL.
pub const REFRESH_PATH: &str = "auth/refresh";

/// Outcome shared by every waiter of one renewal.
pub type RenewalOutcome = std::result::Result<String, RenewalFailure>;

type RenewalFlight = Shared<BoxFuture<'static, RenewalOutcome>>;

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRenewer: Send + Sync + std::fmt::Debug {
    /// Return the new access token, or why none could be obtained.
    async fn renew(&self, refresh_token: &str) -> RenewalOutcome;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

/// Renewer calling `POST /auth/refresh`.
#[derive(Debug, Clone)]
pub struct HttpRenewer {
    http: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl HttpRenewer {
    /// Create a renewer for the API at `base_url`.
    ///
    /// `http` must not carry default credentials: the refresh token in the
    /// body is the only proof of identity.
    pub fn new(http: reqwest::Client, base_url: &Url, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http,
            url: base_url.join(REFRESH_PATH)?,
            timeout,
        })
    }
}

#[async_trait]
impl TokenRenewer for HttpRenewer {
    async fn renew(&self, refresh_token: &str) -> RenewalOutcome {
        let response = self
            .http
            .post(self.url.clone())
            .json(&RefreshRequest { refresh_token })
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RenewalFailure::Transport(format!("Token refresh request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(RenewalFailure::Rejected {
                status: status.as_u16(),
                message: ErrorResponse::parse(&body).summary(),
            });
        }

        let body: RefreshResponse = response.json().await.map_err(|e| RenewalFailure::Rejected {
            status: status.as_u16(),
            message: format!("Failed to parse refresh response: {}", e),
        })?;

        if body.access_token.is_empty() {
            return Err(RenewalFailure::Rejected {
                status: status.as_u16(),
                message: "refresh response carried an empty access token".to_string(),
            });
        }

        Ok(body.access_token)
    }
}

/// Single-flight renewal shared by every request of one client.
pub struct RenewalCoordinator {
    renewer: Arc<dyn TokenRenewer>,
    session: SharedSessionStore,
    in_flight: Mutex<Option<(u64, RenewalFlight)>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for RenewalCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenewalCoordinator")
            .field("renewer", &self.renewer)
            .field("in_flight", &self.in_flight.lock().is_some())
            .finish()
    }
}

impl RenewalCoordinator {
    pub fn new(renewer: Arc<dyn TokenRenewer>, session: SharedSessionStore) -> Self {
        Self {
            renewer,
            session,
            in_flight: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    #[cfg(test)]
    fn is_renewing(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Obtain an access token for a call that was rejected while carrying
    /// `rejected_token`.
    ///
    /// Joins the running renewal if there is one. If the stored token has
    /// already moved past `rejected_token`, the session was renewed while the
    /// call was in flight and the stored token is returned without a network
    /// call.
    pub async fn renew(&self, rejected_token: Option<&str>) -> RenewalOutcome {
        let (id, flight) = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some((id, flight)) => {
                    tracing::debug!("Joining in-flight token renewal");
                    (*id, flight.clone())
                }
                None => {
                    if let Some(current) = self.session.access_token()
                        && rejected_token != Some(current.as_str())
                    {
                        tracing::debug!("Session already renewed; reusing stored access token");
                        return Ok(current);
                    }

                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let flight = Self::fly(self.renewer.clone(), self.session.clone())
                        .boxed()
                        .shared();
                    *slot = Some((id, flight.clone()));
                    (id, flight)
                }
            }
        };

        let outcome = flight.await;

        let mut slot = self.in_flight.lock();
        if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
            *slot = None;
        }
        outcome
    }

    /// The renewal itself. The new token is stored before any waiter resumes.
    async fn fly(renewer: Arc<dyn TokenRenewer>, session: SharedSessionStore) -> RenewalOutcome {
        let Some(refresh_token) = session.refresh_token() else {
            tracing::warn!("Access token rejected and no refresh token is stored");
            return Err(RenewalFailure::MissingRefreshToken);
        };

        tracing::info!("Access token rejected, renewing session");
        match renewer.renew(&refresh_token).await {
            Ok(access_token) => match session.renew_access_token(&refresh_token, &access_token) {
                Ok(true) => {
                    tracing::info!("Session renewed");
                    Ok(access_token)
                }
                Ok(false) => {
                    // Signed out or signed in again while the refresh was out.
                    tracing::info!("Session changed during renewal; discarding renewed token");
                    session
                        .access_token()
                        .ok_or(RenewalFailure::MissingRefreshToken)
                }
                Err(e) => {
                    tracing::warn!("Renewed access token could not be persisted: {}", e);
                    Ok(access_token)
                }
            },
            Err(failure) => {
                tracing::warn!("Session renewal failed: {:?}", failure);
                Err(failure)
            }
        }
    }
}
