//! HTTP middleware.
//!
//! # Architecture
//!
//! ```text
//! Request → Request ID → Trace → CORS → Auth gate → Body limit → Handler
//!                                           ↓
//!                                  401 / 403 / 500, empty body
//! ```
//!
//! Request ids and tracing come from `tower-http`; the auth gate is ours.

pub mod auth;

pub use auth::{InternalJwtAuth, InternalJwtAuthService};
