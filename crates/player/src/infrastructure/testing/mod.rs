//! Test doubles shared by unit tests across the crate.

mod fake_socket;
mod fixtures;

pub use fake_socket::{FakeConnector, FakeSocket};
pub use fixtures::*;
