//! Output module
//!
//! Publishes avatar frames to external renderers:
//! - JSON state endpoint + SSE frame stream over HTTP
//! - Avatar swap and tracking control endpoints

pub mod server;
pub mod sse;

pub use server::WebServer;
