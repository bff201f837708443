//! The issue document: `issue.md` content, its parser, and the
//! field-wise diff the write pipeline runs on flush.
//!
//! Header fields carry human tokens (state names, label names, user
//! handles); translation to backend ids happens later in the resolver so
//! that a failed resolution never reaches the backend. Keys this system
//! does not surface are kept in `extra` and diffed out of mutations.

use chrono::NaiveDate;

use super::MarshalError;
use super::frontmatter::{self, Header, TextDoc, Value};
use crate::model::{self, Issue};

/// Keys surfaced in `issue.md`, in emit order.
const KEYS: [&str; 12] = [
    "identifier",
    "title",
    "status",
    "assignee",
    "priority",
    "labels",
    "due_date",
    "estimate",
    "parent",
    "project",
    "milestone",
    "cycle",
];

/// An issue as it appears on disk, with related records flattened into
/// their display names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueDoc {
    pub identifier: String,
    pub title: String,
    pub status: String,
    pub assignee: Option<String>,
    pub priority: u8,
    pub labels: Vec<String>,
    pub due_date: Option<NaiveDate>,
    pub estimate: Option<i64>,
    pub parent: Option<String>,
    pub project: Option<String>,
    pub milestone: Option<String>,
    pub cycle: Option<String>,
    pub body: String,
    /// Header keys this system does not surface, preserved round-trip.
    pub extra: Vec<(String, Value)>,
}

/// Names of an issue's related records, resolved for display.
#[derive(Debug, Clone, Default)]
pub struct RelatedNames {
    pub status: String,
    pub assignee: Option<String>,
    pub labels: Vec<String>,
    pub parent: Option<String>,
    pub project: Option<String>,
    pub milestone: Option<String>,
    pub cycle: Option<String>,
}

/// Snapshot an issue record into its document form.
pub fn doc_from_issue(issue: &Issue, names: &RelatedNames) -> IssueDoc {
    IssueDoc {
        identifier: issue.identifier.clone(),
        title: issue.title.clone(),
        status: names.status.clone(),
        assignee: names.assignee.clone(),
        priority: issue.priority,
        labels: names.labels.clone(),
        due_date: issue.due_date,
        estimate: issue.estimate,
        parent: names.parent.clone(),
        project: names.project.clone(),
        milestone: names.milestone.clone(),
        cycle: names.cycle.clone(),
        body: issue.description.clone(),
        extra: Vec::new(),
    }
}

pub fn format(doc: &IssueDoc) -> String {
    let mut header = Header::default();
    header.push("identifier", Value::scalar(&doc.identifier));
    header.push("title", Value::scalar(&doc.title));
    header.push("status", Value::scalar(&doc.status));
    if let Some(assignee) = &doc.assignee {
        header.push("assignee", Value::scalar(assignee));
    }
    header.push("priority", Value::scalar(model::priority_token(doc.priority)));
    header.push("labels", Value::List(doc.labels.clone()));
    if let Some(due) = &doc.due_date {
        header.push("due_date", Value::scalar(due.to_string()));
    }
    if let Some(estimate) = &doc.estimate {
        header.push("estimate", Value::scalar(estimate.to_string()));
    }
    if let Some(parent) = &doc.parent {
        header.push("parent", Value::scalar(parent));
    }
    if let Some(project) = &doc.project {
        header.push("project", Value::scalar(project));
    }
    if let Some(milestone) = &doc.milestone {
        header.push("milestone", Value::scalar(milestone));
    }
    if let Some(cycle) = &doc.cycle {
        header.push("cycle", Value::scalar(cycle));
    }
    for (key, value) in &doc.extra {
        header.push(key.clone(), value.clone());
    }
    frontmatter::format(&TextDoc { header, body: doc.body.clone() })
}

pub fn parse(text: &str) -> Result<IssueDoc, MarshalError> {
    let parsed = frontmatter::parse(text)?;
    let header = &parsed.header;

    let priority_token = header.scalar("priority");
    let priority = model::parse_priority(priority_token)
        .ok_or_else(|| MarshalError::value("priority", format!("unknown token `{priority_token}`")))?;

    let due_date = match header.scalar_opt("due_date") {
        Some(raw) => Some(
            raw.parse::<NaiveDate>()
                .map_err(|e| MarshalError::value("due_date", e.to_string()))?,
        ),
        None => None,
    };

    let estimate = match header.scalar_opt("estimate") {
        Some(raw) => Some(
            raw.parse::<i64>().map_err(|e| MarshalError::value("estimate", e.to_string()))?,
        ),
        None => None,
    };

    let owned = |s: &str| s.to_string();
    let extra = header
        .entries
        .iter()
        .filter(|(k, _)| !KEYS.contains(&k.as_str()))
        .cloned()
        .collect();

    Ok(IssueDoc {
        identifier: owned(header.scalar("identifier")),
        title: owned(header.scalar("title")),
        status: owned(header.scalar("status")),
        assignee: header.scalar_opt("assignee").map(owned),
        priority,
        labels: header.list("labels"),
        due_date,
        estimate,
        parent: header.scalar_opt("parent").map(owned),
        project: header.scalar_opt("project").map(owned),
        milestone: header.scalar_opt("milestone").map(owned),
        cycle: header.scalar_opt("cycle").map(owned),
        body: parsed.body,
        extra,
    })
}

/// Field-wise difference between the opened snapshot and the flushed
/// text. `None` means unchanged; for clearable fields the inner `None`
/// means "clear on the backend".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueDelta {
    pub title: Option<String>,
    pub body: Option<String>,
    pub status: Option<String>,
    pub assignee: Option<Option<String>>,
    pub priority: Option<u8>,
    pub labels: Option<Vec<String>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub estimate: Option<Option<i64>>,
    pub parent: Option<Option<String>>,
    pub project: Option<Option<String>>,
    pub milestone: Option<Option<String>>,
    pub cycle: Option<Option<String>>,
}

impl IssueDelta {
    pub fn is_empty(&self) -> bool {
        *self == IssueDelta::default()
    }

    /// Names of the changed fields, mirroring the mutation payload keys.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.title.is_some() {
            names.push("title");
        }
        if self.body.is_some() {
            names.push("description");
        }
        if self.status.is_some() {
            names.push("status");
        }
        if self.assignee.is_some() {
            names.push("assignee");
        }
        if self.priority.is_some() {
            names.push("priority");
        }
        if self.labels.is_some() {
            names.push("labels");
        }
        if self.due_date.is_some() {
            names.push("due_date");
        }
        if self.estimate.is_some() {
            names.push("estimate");
        }
        if self.parent.is_some() {
            names.push("parent");
        }
        if self.project.is_some() {
            names.push("project");
        }
        if self.milestone.is_some() {
            names.push("milestone");
        }
        if self.cycle.is_some() {
            names.push("cycle");
        }
        names
    }
}

/// Compare two documents field by field. The identifier is read-only and
/// never diffed; `extra` keys are not surfaced and are diffed out.
pub fn diff(old: &IssueDoc, new: &IssueDoc) -> IssueDelta {
    let mut delta = IssueDelta::default();
    if new.title != old.title {
        delta.title = Some(new.title.clone());
    }
    if new.body != old.body {
        delta.body = Some(new.body.clone());
    }
    if new.status != old.status {
        delta.status = Some(new.status.clone());
    }
    if new.assignee != old.assignee {
        delta.assignee = Some(new.assignee.clone());
    }
    if new.priority != old.priority {
        delta.priority = Some(new.priority);
    }
    if new.labels != old.labels {
        delta.labels = Some(new.labels.clone());
    }
    if new.due_date != old.due_date {
        delta.due_date = Some(new.due_date);
    }
    if new.estimate != old.estimate {
        delta.estimate = Some(new.estimate);
    }
    if new.parent != old.parent {
        delta.parent = Some(new.parent.clone());
    }
    if new.project != old.project {
        delta.project = Some(new.project.clone());
    }
    if new.milestone != old.milestone {
        delta.milestone = Some(new.milestone.clone());
    }
    if new.cycle != old.cycle {
        delta.cycle = Some(new.cycle.clone());
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> IssueDoc {
        IssueDoc {
            identifier: "ENG-42".into(),
            title: "Fix login: handle retries".into(),
            status: "In Progress".into(),
            assignee: Some("jane".into()),
            priority: 2,
            labels: vec!["Bug".into(), "Backend".into()],
            due_date: Some("2026-03-01".parse().unwrap()),
            estimate: Some(3),
            parent: Some("ENG-7".into()),
            project: Some("Storage".into()),
            milestone: Some("Beta".into()),
            cycle: Some("Sprint 12".into()),
            body: "Login fails after the second retry.\n".into(),
            extra: Vec::new(),
        }
    }

    #[test]
    fn round_trip_is_identity() {
        let doc = sample();
        assert_eq!(parse(&format(&doc)).unwrap(), doc);
    }

    #[test]
    fn round_trip_minimal_issue() {
        let doc = IssueDoc {
            identifier: "A-1".into(),
            title: "t".into(),
            status: "Todo".into(),
            priority: 0,
            body: String::new(),
            ..Default::default()
        };
        assert_eq!(parse(&format(&doc)).unwrap(), doc);
    }

    #[test]
    fn unknown_keys_are_preserved() {
        let mut doc = sample();
        doc.extra.push(("branch".to_string(), Value::scalar("fix/login")));
        let reparsed = parse(&format(&doc)).unwrap();
        assert_eq!(reparsed.extra, doc.extra);
        // And they never show up in a diff.
        let mut edited = reparsed.clone();
        edited.extra.clear();
        assert!(diff(&reparsed, &edited).is_empty());
    }

    #[test]
    fn diff_emits_only_perturbed_fields() {
        let old = sample();
        let mut new = old.clone();
        new.status = "Done".into();
        new.estimate = None;
        let delta = diff(&old, &new);
        assert_eq!(delta.field_names(), vec!["status", "estimate"]);
        assert_eq!(delta.status.as_deref(), Some("Done"));
        assert_eq!(delta.estimate, Some(None));
    }

    #[test]
    fn diff_of_identical_docs_is_empty() {
        let doc = sample();
        assert!(diff(&doc, &doc.clone()).is_empty());
    }

    #[test]
    fn empty_labels_spellings_agree() {
        let explicit = parse(&format(&IssueDoc {
            identifier: "A-1".into(),
            title: "t".into(),
            status: "Todo".into(),
            ..Default::default()
        }))
        .unwrap();
        let bare = parse("---\nidentifier: A-1\ntitle: t\nstatus: Todo\npriority: none\nlabels:\n---\n").unwrap();
        assert_eq!(explicit.labels, bare.labels);
        assert!(bare.labels.is_empty());
    }

    #[test]
    fn bad_priority_token_is_rejected() {
        let text = "---\nidentifier: A-1\ntitle: t\nstatus: Todo\npriority: sky-high\n---\n";
        assert!(parse(text).is_err());
    }

    #[test]
    fn bad_due_date_is_rejected() {
        let text = "---\npriority: none\ndue_date: tomorrow\n---\n";
        assert!(parse(text).is_err());
    }

    #[test]
    fn priority_line_missing_reads_as_none() {
        let doc = parse("---\nidentifier: A-1\ntitle: t\nstatus: Todo\n---\nbody").unwrap();
        assert_eq!(doc.priority, 0);
    }
}
