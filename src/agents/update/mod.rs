// Update module - retrofits local master copies from catalog snapshots
//
// Architecture:
// - UpdatePlanner: Pairs local template references with catalog snapshots
// - PatchReport: Tracks what a run changed and what it skipped
// - Handlers: Master patching, page reconciliation, recalculation flag
// - UpdateInteraction: Manages user interaction for interactive updates
pub mod context;
pub mod handlers;
pub mod interaction;
pub mod planner;

pub use context::{PatchOutcome, PatchReport, SkipReason};
pub use planner::{PatchPlan, PlanOptions, UpdatePlanner};
