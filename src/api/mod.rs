// =============================================================================
// API Module
// =============================================================================
//
// Outbound seam for collaborating services and UIs: REST snapshot endpoints
// plus a push-based WebSocket feed keyed on the state version.

pub mod rest;
pub mod ws;

pub use rest::router;
