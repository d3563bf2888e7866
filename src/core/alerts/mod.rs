// Alert system: user-defined rules that match incoming chat lines.
//
// Architecture:
// - pattern.rs / userpattern.rs: wildcard and hostmask pattern compilation
// - filter.rs: ordered allow/deny nick filters with a bounded verdict memo
// - format.rs: wrap sequences for re-rendering matched lines
// - model.rs: the Alert entity
// - registry.rs: ordered, name-unique alert collection
// - settings.rs / record.rs: named settings and the persisted record format
// - engine.rs: first-match-wins dispatch and alert management

pub mod engine;
pub mod error;
pub mod filter;
pub mod format;
pub mod model;
pub mod pattern;
pub mod record;
pub mod registry;
pub mod settings;
pub mod userpattern;

pub use engine::{AlertEngine, Batch, Outcome, Selection};
pub use model::Alert;
pub use registry::{AlertId, AlertRegistry};
