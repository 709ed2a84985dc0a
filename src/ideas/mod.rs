//! Ideas: the data model, lifecycle transitions, merge, and triggers.

pub mod lifecycle;
pub mod merge;
pub mod model;
pub mod service;
pub mod triggers;

pub use merge::{MergePlan, merge_ideas, plan_merge};
pub use model::{
    ActivityLog, Decision, DecisionOutcome, DecisionType, Idea, IdeaStatus, LineageEntry,
    LineageKind, Metric, Priority, Trend, Trigger, Vote,
};
pub use service::IdeaService;
