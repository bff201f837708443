//! Mirrored entities from the remote tracker.
//!
//! Every record carries the backend's opaque stable `id` plus creation and
//! update timestamps. Records held inside filesystem nodes are by-value
//! snapshots; relations between records are expressed as ids and rehydrated
//! through the repository on demand, never as stored pointers.

use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    pub id: String,
    /// Short uppercase handle, e.g. `ENG`.
    pub key: String,
    pub name: String,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateType {
    Backlog,
    Unstarted,
    Started,
    Completed,
    Canceled,
}

impl StateType {
    pub fn as_str(self) -> &'static str {
        match self {
            StateType::Backlog => "backlog",
            StateType::Unstarted => "unstarted",
            StateType::Started => "started",
            StateType::Completed => "completed",
            StateType::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "backlog" => Some(StateType::Backlog),
            "unstarted" => Some(StateType::Unstarted),
            "started" => Some(StateType::Started),
            "completed" => Some(StateType::Completed),
            "canceled" => Some(StateType::Canceled),
            _ => None,
        }
    }

    /// Ordering used when listing workflow states.
    pub fn rank(self) -> u8 {
        match self {
            StateType::Backlog => 0,
            StateType::Unstarted => 1,
            StateType::Started => 2,
            StateType::Completed => 3,
            StateType::Canceled => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: String,
    pub team_id: String,
    pub name: String,
    pub state_type: StateType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub id: String,
    pub team_id: String,
    pub name: String,
    pub color: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub display_name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub id: String,
    /// `<team-key>-<number>`, e.g. `ENG-42`.
    pub identifier: String,
    pub title: String,
    pub description: String,
    /// 0 none, 1 urgent, 2 high, 3 medium, 4 low.
    pub priority: u8,
    pub due_date: Option<NaiveDate>,
    pub estimate: Option<i64>,
    pub team_id: String,
    pub state_id: String,
    pub assignee_id: Option<String>,
    pub creator_id: Option<String>,
    pub project_id: Option<String>,
    pub milestone_id: Option<String>,
    pub cycle_id: Option<String>,
    pub parent_id: Option<String>,
    pub label_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Priority attribute tokens as surfaced in issue headers.
pub fn priority_token(priority: u8) -> &'static str {
    match priority {
        1 => "urgent",
        2 => "high",
        3 => "medium",
        4 => "low",
        _ => "none",
    }
}

/// Inverse of [`priority_token`]; the empty string decodes to "none".
pub fn parse_priority(token: &str) -> Option<u8> {
    match token {
        "" | "none" => Some(0),
        "urgent" => Some(1),
        "high" => Some(2),
        "medium" => Some(3),
        "low" => Some(4),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: String,
    pub team_id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub state: String,
    pub start_date: Option<NaiveDate>,
    pub target_date: Option<NaiveDate>,
    pub lead_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    pub id: String,
    pub team_id: String,
    pub number: i64,
    pub name: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Total issue counts, one sample per day of the cycle.
    pub issue_count_history: Vec<i64>,
    /// Completed issue counts, same sampling as `issue_count_history`.
    pub completed_count_history: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cycle {
    /// A cycle is active while `now` falls inside `[starts_at, ends_at)`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now >= self.starts_at && now < self.ends_at
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: String,
    pub issue_id: String,
    pub body: String,
    pub author_id: Option<String>,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where a document hangs off the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocScope {
    Team(String),
    Issue(String),
    Project(String),
}

impl DocScope {
    /// Stable key used for inode derivation and view freshness.
    pub fn key(&self) -> String {
        match self {
            DocScope::Team(id) => format!("team:{id}"),
            DocScope::Issue(id) => format!("issue:{id}"),
            DocScope::Project(id) => format!("project:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub scope: DocScope,
    pub title: String,
    pub slug: Option<String>,
    pub content: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Milestone {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub description: String,
    pub target_date: Option<NaiveDate>,
    pub sort_order: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Progress signal on a project or initiative update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    OnTrack,
    AtRisk,
    OffTrack,
}

impl Health {
    pub fn as_str(self) -> &'static str {
        match self {
            Health::OnTrack => "onTrack",
            Health::AtRisk => "atRisk",
            Health::OffTrack => "offTrack",
        }
    }

    /// Accepts the canonical camelCase tokens plus the snake/kebab/lower
    /// spellings users actually type.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "ontrack" => Some(Health::OnTrack),
            "atrisk" => Some(Health::AtRisk),
            "offtrack" => Some(Health::OffTrack),
            _ => None,
        }
    }
}

/// Owner of an update stream: a project or an initiative.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UpdateParent {
    Project(String),
    Initiative(String),
}

impl UpdateParent {
    pub fn key(&self) -> String {
        match self {
            UpdateParent::Project(id) => format!("project:{id}"),
            UpdateParent::Initiative(id) => format!("initiative:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub id: String,
    pub parent: UpdateParent,
    pub body: String,
    pub health: Health,
    pub author_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Initiative {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub status: String,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// External link attached to an issue.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub id: String,
    pub issue_id: String,
    pub title: String,
    pub url: String,
    pub subtitle: Option<String>,
    pub source_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Binary file embedded in an issue, served from the backend's CDN.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedFile {
    pub id: String,
    pub issue_id: String,
    pub filename: String,
    pub url: String,
    pub size: u64,
    pub cache_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationType {
    Blocks,
    Duplicate,
    Related,
    Similar,
}

impl RelationType {
    pub fn as_str(self) -> &'static str {
        match self {
            RelationType::Blocks => "blocks",
            RelationType::Duplicate => "duplicate",
            RelationType::Related => "related",
            RelationType::Similar => "similar",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "blocks" => Some(RelationType::Blocks),
            "duplicate" => Some(RelationType::Duplicate),
            "related" => Some(RelationType::Related),
            "similar" => Some(RelationType::Similar),
            _ => None,
        }
    }
}

/// Directed relation between two issues.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub id: String,
    pub issue_id: String,
    pub related_issue_id: String,
    pub relation_type: RelationType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_tokens_round_trip() {
        for p in 0..=4u8 {
            assert_eq!(parse_priority(priority_token(p)), Some(p));
        }
        assert_eq!(parse_priority(""), Some(0));
        assert_eq!(parse_priority("critical"), None);
    }

    #[test]
    fn health_accepts_loose_spellings() {
        assert_eq!(Health::parse("onTrack"), Some(Health::OnTrack));
        assert_eq!(Health::parse("at-risk"), Some(Health::AtRisk));
        assert_eq!(Health::parse("off_track"), Some(Health::OffTrack));
        assert_eq!(Health::parse("fine"), None);
    }

    #[test]
    fn cycle_active_window_is_half_open() {
        let starts = "2026-01-05T00:00:00Z".parse().unwrap();
        let ends = "2026-01-19T00:00:00Z".parse().unwrap();
        let cycle = Cycle {
            id: "c1".into(),
            team_id: "t1".into(),
            number: 12,
            name: None,
            starts_at: starts,
            ends_at: ends,
            issue_count_history: vec![],
            completed_count_history: vec![],
            created_at: starts,
            updated_at: starts,
        };
        assert!(cycle.is_active(starts));
        assert!(!cycle.is_active(ends));
    }
}
