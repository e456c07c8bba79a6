// Priority engine
//
// Deterministic scoring core. Every request that cannot (or should not)
// reach the AI provider is answered by this module, so it stays pure:
// no I/O, no clocks, no shared state.

mod explain;
mod optimizer;
mod scoring;

pub use explain::{generate_explanation, AllocationData, ExplanationResult, Language};
pub use optimizer::{split_budget, BudgetShare, OptimizerScore, RegionScore, ScoreComponents};
pub use scoring::{calculate, weighted_score, FactorBreakdown, Metrics, PriorityLevel, PriorityResult};
