//! HTTP surface: bearer gate, status headers, routes and server

pub mod auth;
pub mod router;
pub mod server;

pub use auth::{AuthGate, GateDecision, GateRejection, X_API_KEY_PROTECTED, X_AUTH_METHOD};
pub use router::{AppState, create_router, with_gateway_layers};
pub use server::WrapperServer;
