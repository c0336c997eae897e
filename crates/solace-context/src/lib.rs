//! Context enrichment for outgoing chat messages.
//!
//! Before dispatch, every user message is augmented with semantic-search
//! results keyed on the raw text plus the current session and assessment
//! snapshot. The search collaborator is best-effort: when it fails, an
//! empty context is substituted and the failure never reaches the caller.

pub mod enrich;
pub mod search;

pub use enrich::ContextEnricher;
pub use search::{HttpSearchClient, SearchBackend, StaticSearch};
