pub mod alert_cache;
pub mod api;
pub mod app;
pub mod config;
pub mod connector;
pub mod ingest;
pub mod logging;
pub mod middleware;
pub mod state;
