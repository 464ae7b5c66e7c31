//! chartrelay engine - text rendering for releases
//!
//! Renders release notes and the per-chart redirect page with MiniJinja.
//! Templates are embedded and can be replaced from configuration.

pub mod context;
pub mod engine;
pub mod error;
pub mod filters;

pub use context::{ChartSummary, DependencyLink, NotesContext, RedirectContext};
pub use engine::{EngineBuilder, NotesEngine};
pub use error::{EngineError, Result};
