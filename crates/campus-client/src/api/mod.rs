//! API endpoint implementations.

mod auth;
mod resources;

pub use auth::AuthApi;
pub use resources::ResourceApi;
