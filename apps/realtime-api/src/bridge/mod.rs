//! Notification bridge: the backend-facing listener that turns bridge calls
//! into hub broadcasts.

pub mod interceptor;
pub mod server;

pub use server::router;
