//! Application layer: the state reconciler and the session that drives it.

pub mod reconciler;
pub mod session_service;

pub use reconciler::{GameOver, GameStateReconciler, Reaction, ReconcileOutcome, Reconciled};
pub use session_service::{GameSession, GameView};
