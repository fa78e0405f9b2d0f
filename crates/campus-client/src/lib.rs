//! Authenticated HTTP client for the Campus school-management API.
//!
//! Every call made through [`CampusClient`] carries the current access token.
//! When the backend answers 401 the client renews the token once through
//! `POST /auth/refresh` and replays the call; concurrent rejections share a
//! single renewal. If renewal fails the session is cleared and a
//! [`ClientEvent::SessionExpired`] is emitted so the UI can send the user
//! back to the login screen.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use campus_client::{CampusClient, ClientEvent, FileStorage, ListQuery, SessionStore};
//!
//! # async fn example() -> campus_client::Result<()> {
//! let session = Arc::new(SessionStore::new(Arc::new(FileStorage::new("session.json"))));
//! session.init()?;
//!
//! let (events, mut rx) = tokio::sync::mpsc::unbounded_channel::<ClientEvent>();
//! let client = CampusClient::builder()
//!     .base_url("http://localhost:3000")
//!     .session(session)
//!     .event_sink(Arc::new(events))
//!     .build()?;
//!
//! let page = client.students().list_with_query(&ListQuery::page(1, 20)).await?;
//! for student in page.data {
//!     println!("{} {}", student.first_name, student.last_name);
//! }
//!
//! if let Ok(ClientEvent::SessionExpired) = rx.try_recv() {
//!     println!("Please sign in again");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Components
//!
//! - [`session`]: the Session Store and its storage backends
//! - [`request`]: outbound requests and the credential augmenter
//! - [`recovery`]: the pure recovery state machine
//! - [`renewal`]: refresh-endpoint renewer and single-flight coordinator
//! - [`events`]: notifications for the presentation layer
//! - [`api`]: authentication and resource collections

pub mod api;
pub mod client;
pub mod error;
pub mod events;
pub mod recovery;
pub mod renewal;
pub mod request;
pub mod session;
pub mod types;

pub use api::{AuthApi, ResourceApi};
pub use client::{CampusClient, ClientBuilder};
pub use error::{Error, Result};
pub use events::{CallbackSink, ClientEvent, EventSink, NullSink};
pub use recovery::{RecoveryState, RenewalFailure};
pub use renewal::{HttpRenewer, RenewalCoordinator, TokenRenewer};
pub use request::{OutboundRequest, RequestOptions};
pub use session::{
    FileStorage, MemoryStorage, Session, SessionStorage, SessionStore, SharedSessionStore,
    UserSummary,
};
pub use types::*;
