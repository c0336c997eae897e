//! Ties the streaming, context and assessment layers together into one
//! conversation engine with a single in-memory message log per session.

pub mod engine;
pub mod session;

pub use engine::ChatEngine;
pub use session::SessionManager;
