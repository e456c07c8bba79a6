// Query orchestrator
//
// Decides which subsystem answers a free-form query: the local scoring
// engine, the analysis gateway, the knowledge store, or a hybrid of them.

mod analysis;
mod decision;

pub use analysis::{analyze_query, Complexity, Intent, QueryAnalysis};
pub use decision::{Orchestrator, Route, RoutingOutcome, RoutingStats};
