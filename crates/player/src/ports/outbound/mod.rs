//! Outbound ports - Interfaces for external services
//!
//! These ports define the contracts that infrastructure adapters must implement,
//! allowing application services to talk to the game server without
//! depending on concrete socket or HTTP clients.

pub mod game_api_port;
pub mod message_port;
pub mod socket_port;

pub use game_api_port::{ApiError, GameApiPort};
pub use message_port::GameMessagePort;
pub use socket_port::{ConnectionError, SocketChannels, SocketConnector, SocketEvent};

#[cfg(test)]
pub use game_api_port::MockGameApiPort;
#[cfg(test)]
pub use message_port::MockGameMessagePort;
