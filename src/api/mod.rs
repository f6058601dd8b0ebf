//! HTTP surface of the tutor.
//!
//! Routes are nested under `/api/`, protected by bearer-token auth
//! middleware; the chat page itself is served at `/`. The router is
//! composable so tests can drive it without binding a socket.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_server, ApiServer};
pub use types::ApiContext;
