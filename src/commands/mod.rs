//! Control surface exposed to UI/CLI callers.
//!
//! A request/response protocol keyed by action name: every request is a
//! typed [`Command`] carrying its own payload, dispatched through a single
//! [`CommandHandler::handle`] call, and every response carries a success
//! flag plus either a typed payload or a short human-readable error, never
//! a partially populated structure.

pub mod handler;
pub mod types;

pub use handler::CommandHandler;
pub use types::{Command, CommandResponse, ResponsePayload};
