//! Authentication for TheScene realtime server
//!
//! Token issuance lives in the main API service; this module only
//! validates the JWTs presented at the websocket handshake and on the
//! HTTP message routes.

mod service;

pub use service::{AuthService, Claims};
