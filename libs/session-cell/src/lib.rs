//! # Session Cell
//!
//! Browser side of the dashboard's identity layer: where the session token is
//! kept, how the current user is derived from it, and the gate that merges the
//! token claims with the server's filtered IdP profile into one view.
//!
//! ```text
//! TokenStore --claims--> SessionGate --/user/info--> auth-cell
//!                             |
//!                        SessionView (watch channel) --> presentation layer
//! ```
//!
//! The gate only emits [`GateSignal::RedirectToLogin`]; navigation belongs to
//! the caller.

pub mod client;
pub mod gate;
pub mod models;
pub mod store;

pub use client::{HttpSessionApi, SessionApi};
pub use gate::{GateOptions, SessionGate};
pub use models::{GateSignal, InfoSource, SessionError, SessionPhase, SessionView};
pub use store::{MemoryStorage, TokenStorage, TokenStore};
