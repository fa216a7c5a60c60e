//! Dealer Player - realtime client for the four-seat trick-taking game.
//!
//! - `infrastructure::websocket` - `ConnectionManager`: socket lifecycle,
//!   authentication, reconnection with backoff
//! - `application::reconciler` - `GameStateReconciler`: folds server events
//!   into the local game state
//! - `application::session_service` - `GameSession`: drives the reconciler and
//!   publishes `GameView`s
//! - `infrastructure::http_client` - lobby, start and move endpoints

pub mod application;
pub mod config;
pub mod infrastructure;
pub mod ports;

pub use application::{GameSession, GameStateReconciler, GameView};
pub use config::ClientConfig;
pub use infrastructure::http_client::HttpGameApi;
pub use infrastructure::websocket::{ConnectionManager, SessionEvent, TungsteniteConnector};
pub use ports::outbound::{ApiError, ConnectionError};
