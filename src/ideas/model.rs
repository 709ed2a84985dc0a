//! Idea data model: ideas, votes, triggers, lineage, decisions, metrics.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdeaStatus {
    Active,
    InProgress,
    Completed,
    Archived,
    Killed,
    Frozen,
}

impl IdeaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Archived => "archived",
            Self::Killed => "killed",
            Self::Frozen => "frozen",
        }
    }
}

impl fmt::Display for IdeaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for IdeaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "archived" => Ok(Self::Archived),
            "killed" => Ok(Self::Killed),
            "frozen" => Ok(Self::Frozen),
            other => Err(format!("unknown idea status: '{other}'")),
        }
    }
}

/// Idea priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown priority: '{other}'")),
        }
    }
}

/// Condition that signals a frozen idea may be ready to reconsider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    #[default]
    None,
    /// Fires once the date has passed.
    Time { date: DateTime<Utc> },
    /// Metric condition such as `"MAU > 5000"`; matched against metric names.
    Metric { condition: String },
    /// Fires when the keyword shows up in an external signal.
    External { keyword: String },
}

/// One vote cast on an idea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub user: String,
    pub tag: String,
    pub timestamp: DateTime<Utc>,
}

/// Direction of a lineage edge, relative to the idea that holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineageKind {
    /// This idea was merged into `idea_id`.
    Parent,
    /// `idea_id` was merged into this idea.
    Child,
}

/// A merge-provenance edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEntry {
    #[serde(rename = "type")]
    pub kind: LineageKind,
    pub idea_id: Uuid,
    pub idea_title: String,
    pub timestamp: DateTime<Utc>,
}

/// A single idea in the icebox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    pub id: Uuid,
    /// Owning workspace (tenant).
    pub workspace_id: String,
    pub title: String,
    pub description: String,
    pub status: IdeaStatus,
    pub priority: Priority,
    pub category: String,
    pub votes: u32,
    /// Append-only.
    #[serde(default)]
    pub vote_records: Vec<Vote>,
    #[serde(default)]
    pub trigger: Trigger,
    pub is_dormant: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dormancy_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_reason: Option<String>,
    /// Append-only.
    #[serde(default)]
    pub lineage: Vec<LineageEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Idea {
    /// Create a new active idea.
    pub fn new(workspace_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workspace_id: workspace_id.into(),
            title: title.into(),
            description: String::new(),
            status: IdeaStatus::Active,
            priority: Priority::Medium,
            category: "general".to_string(),
            votes: 0,
            vote_records: Vec::new(),
            trigger: Trigger::None,
            is_dormant: false,
            dormancy_reason: None,
            archive_reason: None,
            lineage: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_votes(mut self, votes: u32) -> Self {
        self.votes = votes;
        self
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = created_at;
        self
    }

    /// Builder: mark frozen with a dormancy reason.
    pub fn frozen(mut self, reason: impl Into<String>) -> Self {
        self.status = IdeaStatus::Frozen;
        self.is_dormant = true;
        self.dormancy_reason = Some(reason.into());
        self
    }

    /// The metric condition string, if the trigger is metric-based.
    pub fn trigger_metric(&self) -> Option<&str> {
        match &self.trigger {
            Trigger::Metric { condition } if !condition.trim().is_empty() => Some(condition),
            _ => None,
        }
    }

    /// Whole days since creation; never negative.
    pub fn age_days(&self, now: DateTime<Utc>) -> u32 {
        (now - self.created_at).num_days().max(0) as u32
    }

    /// Parent lineage entries (where this idea was merged into).
    pub fn parents(&self) -> impl Iterator<Item = &LineageEntry> {
        self.lineage
            .iter()
            .filter(|e| e.kind == LineageKind::Parent)
    }
}

/// What kind of transition a decision records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    Freeze,
    Wake,
    Kill,
    Merge,
}

impl DecisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Freeze => "freeze",
            Self::Wake => "wake",
            Self::Kill => "kill",
            Self::Merge => "merge",
        }
    }
}

impl FromStr for DecisionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "freeze" => Ok(Self::Freeze),
            "wake" => Ok(Self::Wake),
            "kill" => Ok(Self::Kill),
            "merge" => Ok(Self::Merge),
            other => Err(format!("unknown decision type: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    Approved,
    Rejected,
    Deferred,
    Modified,
}

impl DecisionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Deferred => "deferred",
            Self::Modified => "modified",
        }
    }
}

impl FromStr for DecisionOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "deferred" => Ok(Self::Deferred),
            "modified" => Ok(Self::Modified),
            other => Err(format!("unknown decision outcome: '{other}'")),
        }
    }
}

/// Immutable audit record of an idea state transition.
///
/// Fields are private so a decision cannot be edited after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    id: Uuid,
    workspace_id: String,
    idea_id: Uuid,
    decision_type: DecisionType,
    title: String,
    content: String,
    outcome: DecisionOutcome,
    decided_by: String,
    decided_at: DateTime<Utc>,
}

impl Decision {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workspace_id: impl Into<String>,
        idea_id: Uuid,
        decision_type: DecisionType,
        title: impl Into<String>,
        content: impl Into<String>,
        outcome: DecisionOutcome,
        decided_by: impl Into<String>,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace_id: workspace_id.into(),
            idea_id,
            decision_type,
            title: title.into(),
            content: content.into(),
            outcome,
            decided_by: decided_by.into(),
            decided_at,
        }
    }

    /// Rebuild a decision read back from storage.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        id: Uuid,
        workspace_id: String,
        idea_id: Uuid,
        decision_type: DecisionType,
        title: String,
        content: String,
        outcome: DecisionOutcome,
        decided_by: String,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            workspace_id,
            idea_id,
            decision_type,
            title,
            content,
            outcome,
            decided_by,
            decided_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }
    pub fn idea_id(&self) -> Uuid {
        self.idea_id
    }
    pub fn decision_type(&self) -> DecisionType {
        self.decision_type
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn content(&self) -> &str {
        &self.content
    }
    pub fn outcome(&self) -> DecisionOutcome {
        self.outcome
    }
    pub fn decided_by(&self) -> &str {
        &self.decided_by
    }
    pub fn decided_at(&self) -> DateTime<Utc> {
        self.decided_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    #[default]
    Flat,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Flat => "flat",
        }
    }
}

impl FromStr for Trend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "flat" => Ok(Self::Flat),
            other => Err(format!("unknown trend: '{other}'")),
        }
    }
}

/// A business metric snapshot. Read-only input to scoring and triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub workspace_id: String,
    pub name: String,
    pub current_value: f64,
    pub target_value: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub trend: Trend,
}

impl Metric {
    pub fn new(
        workspace_id: impl Into<String>,
        name: impl Into<String>,
        current_value: f64,
        target_value: f64,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            name: name.into(),
            current_value,
            target_value,
            unit: String::new(),
            trend: Trend::Flat,
        }
    }

    /// At least 80% of the way to target.
    pub fn near_target(&self) -> bool {
        self.current_value >= 0.8 * self.target_value
    }

    /// Case-insensitive substring match in either direction.
    pub fn matches(&self, condition: &str) -> bool {
        let name = self.name.trim().to_lowercase();
        let condition = condition.trim().to_lowercase();
        if name.is_empty() || condition.is_empty() {
            return false;
        }
        condition.contains(&name) || name.contains(&condition)
    }
}

/// Append-only activity feed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: Uuid,
    pub workspace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idea_id: Option<Uuid>,
    pub action: String,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

impl ActivityLog {
    pub fn new(
        workspace_id: impl Into<String>,
        idea_id: Option<Uuid>,
        action: impl Into<String>,
        details: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace_id: workspace_id.into(),
            idea_id,
            action: action.into(),
            details: details.into(),
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn new_idea_defaults() {
        let idea = Idea::new("ws1", "Dark mode");
        assert_eq!(idea.status, IdeaStatus::Active);
        assert_eq!(idea.priority, Priority::Medium);
        assert_eq!(idea.votes, 0);
        assert!(idea.lineage.is_empty());
        assert!(!idea.is_dormant);
        assert_eq!(idea.trigger, Trigger::None);
    }

    #[test]
    fn trigger_metric_only_for_metric_triggers() {
        let idea = Idea::new("ws1", "x").with_trigger(Trigger::Metric {
            condition: "MAU".into(),
        });
        assert_eq!(idea.trigger_metric(), Some("MAU"));

        let idea = Idea::new("ws1", "x").with_trigger(Trigger::External {
            keyword: "MAU".into(),
        });
        assert_eq!(idea.trigger_metric(), None);

        let idea = Idea::new("ws1", "x").with_trigger(Trigger::Metric {
            condition: "  ".into(),
        });
        assert_eq!(idea.trigger_metric(), None);
    }

    #[test]
    fn age_days_clamps_future_dates() {
        let now = Utc::now();
        let idea = Idea::new("ws1", "x").with_created_at(now + Duration::days(3));
        assert_eq!(idea.age_days(now), 0);
        let idea = Idea::new("ws1", "x").with_created_at(now - Duration::days(40));
        assert_eq!(idea.age_days(now), 40);
    }

    #[test]
    fn metric_fuzzy_match_both_directions() {
        let metric = Metric::new("ws1", "MAU", 4200.0, 5000.0);
        assert!(metric.matches("mau"));
        assert!(metric.matches("MAU > 5000"));
        let metric = Metric::new("ws1", "Weekly Active Users", 1.0, 2.0);
        assert!(metric.matches("active users"));
        assert!(!metric.matches("revenue"));
        assert!(!metric.matches(""));
    }

    #[test]
    fn near_target_threshold() {
        assert!(Metric::new("ws1", "MAU", 4000.0, 5000.0).near_target());
        assert!(!Metric::new("ws1", "MAU", 3999.0, 5000.0).near_target());
    }

    #[test]
    fn status_roundtrip_strings() {
        for status in [
            IdeaStatus::Active,
            IdeaStatus::InProgress,
            IdeaStatus::Completed,
            IdeaStatus::Archived,
            IdeaStatus::Killed,
            IdeaStatus::Frozen,
        ] {
            assert_eq!(status.as_str().parse::<IdeaStatus>().unwrap(), status);
        }
        assert!("sleeping".parse::<IdeaStatus>().is_err());
    }

    #[test]
    fn trigger_serializes_tagged() {
        let json = serde_json::to_value(Trigger::External {
            keyword: "competitor".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "external");
        assert_eq!(json["keyword"], "competitor");
    }

    #[test]
    fn lineage_entry_uses_type_key() {
        let entry = LineageEntry {
            kind: LineageKind::Parent,
            idea_id: Uuid::nil(),
            idea_title: "t".into(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "parent");
    }
}
