//! Browser-facing WebSocket gateway: upgrade handler, admin notify/stats
//! routes and the per-connection read/write pumps.

pub mod pumps;
pub mod server;
