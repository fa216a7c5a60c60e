//! Game Message Port - outbound socket messages
//!
//! The session driver sends acknowledgments and bids through this port so
//! it can be tested without a live connection.

use async_trait::async_trait;
use dealer_shared::ClientMessage;

use super::ConnectionError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameMessagePort: Send + Sync {
    /// Fails with `ConnectionError::NotConnected` when the socket is not open.
    async fn send_message(&self, message: ClientMessage) -> Result<(), ConnectionError>;
}
