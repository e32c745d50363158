//! LiveDesk API Library
//!
//! HTTP relay between website chat widgets and agent dashboards: message
//! persistence, realtime channel fan-out and private channel authorization.

pub mod auth;
pub mod channels;
pub mod config;
pub mod error;
pub mod relay;
pub mod routes;
pub mod state;
pub mod websocket;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use relay::RelayService;
pub use state::AppState;
