pub mod app_context;
pub mod config;
pub mod heartbeat;
pub mod logging;
pub mod router;
pub mod server;
