pub(crate) mod auth;
pub(crate) mod config;
pub(crate) mod errors;
pub(crate) mod metrics;
pub(crate) mod state;
pub(crate) mod telemetry;
pub(crate) mod time;
