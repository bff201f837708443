//! Document forms of the non-issue records.
//!
//! Writable records (documents, labels) get a parse function next to
//! their formatter; read-only records only format. Key/value files that
//! are not markdown records (`.link`, `.rel`) render as bare header
//! lines without the `---` fences.

use chrono::{DateTime, SecondsFormat, Utc};

use super::MarshalError;
use super::frontmatter::{self, Header, TextDoc, Value};
use crate::model::{
    Attachment, Comment, Cycle, Document, Initiative, Label, Milestone, Project, Relation, Update,
    User,
};

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// --- Documents (writable) --------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentDoc {
    pub title: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub body: String,
}

pub fn document_text(doc: &Document) -> String {
    let mut header = Header::default();
    header.push("title", Value::scalar(&doc.title));
    if let Some(icon) = &doc.icon {
        header.push("icon", Value::scalar(icon));
    }
    if let Some(color) = &doc.color {
        header.push("color", Value::scalar(color));
    }
    frontmatter::format(&TextDoc { header, body: doc.content.clone() })
}

pub fn parse_document(text: &str) -> Result<DocumentDoc, MarshalError> {
    let parsed = frontmatter::parse(text)?;
    Ok(DocumentDoc {
        title: parsed.header.scalar("title").to_string(),
        icon: parsed.header.scalar_opt("icon").map(String::from),
        color: parsed.header.scalar_opt("color").map(String::from),
        body: parsed.body,
    })
}

// --- Labels (writable) -----------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelDoc {
    pub name: String,
    pub color: String,
    pub description: String,
}

pub fn label_text(label: &Label) -> String {
    let mut header = Header::default();
    header.push("name", Value::scalar(&label.name));
    header.push("color", Value::scalar(&label.color));
    header.push("description", Value::scalar(&label.description));
    frontmatter::format(&TextDoc { header, body: String::new() })
}

pub fn parse_label(text: &str) -> Result<LabelDoc, MarshalError> {
    let parsed = frontmatter::parse(text)?;
    Ok(LabelDoc {
        name: parsed.header.scalar("name").to_string(),
        color: parsed.header.scalar("color").to_string(),
        description: parsed.header.scalar("description").to_string(),
    })
}

// --- Read-only records -----------------------------------------------------

pub fn comment_text(comment: &Comment, author: Option<&User>) -> String {
    let mut header = Header::default();
    if let Some(author) = author {
        let name =
            if author.display_name.is_empty() { &author.name } else { &author.display_name };
        header.push("author", Value::scalar(name));
    }
    header.push("created", Value::scalar(ts(&comment.created_at)));
    if let Some(edited) = &comment.edited_at {
        header.push("edited", Value::scalar(ts(edited)));
    }
    frontmatter::format(&TextDoc { header, body: comment.body.clone() })
}

pub fn team_text(team: &crate::model::Team) -> String {
    let mut header = Header::default();
    header.push("key", Value::scalar(&team.key));
    header.push("name", Value::scalar(&team.name));
    if let Some(icon) = &team.icon {
        header.push("icon", Value::scalar(icon));
    }
    header.push("created", Value::scalar(ts(&team.created_at)));
    frontmatter::format(&TextDoc { header, body: String::new() })
}

pub fn project_text(project: &Project, lead: Option<&User>) -> String {
    let mut header = Header::default();
    header.push("name", Value::scalar(&project.name));
    header.push("state", Value::scalar(&project.state));
    if let Some(start) = &project.start_date {
        header.push("start_date", Value::scalar(start.to_string()));
    }
    if let Some(target) = &project.target_date {
        header.push("target_date", Value::scalar(target.to_string()));
    }
    if let Some(lead) = lead {
        let name = if lead.display_name.is_empty() { &lead.name } else { &lead.display_name };
        header.push("lead", Value::scalar(name));
    }
    frontmatter::format(&TextDoc { header, body: project.description.clone() })
}

pub fn cycle_text(cycle: &Cycle) -> String {
    let mut header = Header::default();
    header.push("number", Value::scalar(cycle.number.to_string()));
    if let Some(name) = &cycle.name {
        header.push("name", Value::scalar(name));
    }
    header.push("starts", Value::scalar(ts(&cycle.starts_at)));
    header.push("ends", Value::scalar(ts(&cycle.ends_at)));
    let total = cycle.issue_count_history.last().copied().unwrap_or(0);
    let completed = cycle.completed_count_history.last().copied().unwrap_or(0);
    let body = format!("{completed} of {total} issues completed\n");
    frontmatter::format(&TextDoc { header, body })
}

pub fn milestone_text(milestone: &Milestone) -> String {
    let mut header = Header::default();
    header.push("name", Value::scalar(&milestone.name));
    if let Some(target) = &milestone.target_date {
        header.push("target_date", Value::scalar(target.to_string()));
    }
    frontmatter::format(&TextDoc { header, body: milestone.description.clone() })
}

pub fn initiative_text(initiative: &Initiative, owner: Option<&User>) -> String {
    let mut header = Header::default();
    header.push("name", Value::scalar(&initiative.name));
    header.push("status", Value::scalar(&initiative.status));
    if let Some(target) = &initiative.target_date {
        header.push("target_date", Value::scalar(target.to_string()));
    }
    if let Some(owner) = owner {
        let name = if owner.display_name.is_empty() { &owner.name } else { &owner.display_name };
        header.push("owner", Value::scalar(name));
    }
    frontmatter::format(&TextDoc { header, body: String::new() })
}

pub fn update_text(update: &Update, author: Option<&User>) -> String {
    let mut header = Header::default();
    if let Some(author) = author {
        let name =
            if author.display_name.is_empty() { &author.name } else { &author.display_name };
        header.push("author", Value::scalar(name));
    }
    header.push("health", Value::scalar(update.health.as_str()));
    header.push("created", Value::scalar(ts(&update.created_at)));
    frontmatter::format(&TextDoc { header, body: update.body.clone() })
}

pub fn user_text(user: &User) -> String {
    let mut header = Header::default();
    header.push("name", Value::scalar(&user.name));
    header.push("email", Value::scalar(&user.email));
    header.push("display_name", Value::scalar(&user.display_name));
    header.push("active", Value::scalar(if user.active { "true" } else { "false" }));
    frontmatter::format(&TextDoc { header, body: String::new() })
}

/// `.link` file body: a bare key/value block, no fences.
pub fn attachment_link_text(attachment: &Attachment) -> String {
    let mut out = String::new();
    out.push_str(&format!("title: {}\n", attachment.title));
    out.push_str(&format!("url: {}\n", attachment.url));
    if let Some(subtitle) = &attachment.subtitle {
        out.push_str(&format!("subtitle: {subtitle}\n"));
    }
    if let Some(source) = &attachment.source_type {
        out.push_str(&format!("source: {source}\n"));
    }
    out.push_str(&format!("created: {}\n", ts(&attachment.created_at)));
    out
}

/// `.rel` file body: a bare key/value block, no fences.
pub fn relation_text(relation: &Relation, source: &str, target: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("type: {}\n", relation.relation_type.as_str()));
    out.push_str(&format!("source: {source}\n"));
    out.push_str(&format!("target: {target}\n"));
    out.push_str(&format!("created: {}\n", ts(&relation.created_at)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocScope;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 9, 30, 0).unwrap()
    }

    #[test]
    fn document_round_trip() {
        let doc = Document {
            id: "doc-1".into(),
            scope: DocScope::Project("project-1".into()),
            title: "Design: phase two".into(),
            slug: None,
            content: "# Heading\n\nSome prose.\n".into(),
            icon: Some("book".into()),
            color: None,
            created_at: now(),
            updated_at: now(),
        };
        let parsed = parse_document(&document_text(&doc)).unwrap();
        assert_eq!(parsed.title, doc.title);
        assert_eq!(parsed.icon.as_deref(), Some("book"));
        assert_eq!(parsed.body, doc.content);
    }

    #[test]
    fn label_round_trip() {
        let label = Label {
            id: "label-1".into(),
            team_id: "team-1".into(),
            name: "Bug".into(),
            color: "#d73a4a".into(),
            description: "Something is broken".into(),
            created_at: now(),
            updated_at: now(),
        };
        let parsed = parse_label(&label_text(&label)).unwrap();
        assert_eq!(parsed.name, "Bug");
        assert_eq!(parsed.color, "#d73a4a");
        assert_eq!(parsed.description, "Something is broken");
    }

    #[test]
    fn cycle_text_reports_progress_from_history_tails() {
        let cycle = Cycle {
            id: "cycle-1".into(),
            team_id: "team-1".into(),
            number: 12,
            name: Some("Sprint 12".into()),
            starts_at: now(),
            ends_at: now(),
            issue_count_history: vec![10, 12],
            completed_count_history: vec![1, 5],
            created_at: now(),
            updated_at: now(),
        };
        assert!(cycle_text(&cycle).contains("5 of 12 issues completed"));
    }

    #[test]
    fn link_block_is_plain_key_values() {
        let attachment = Attachment {
            id: "attachment-1".into(),
            issue_id: "issue-1".into(),
            title: "CI run".into(),
            url: "https://ci.example.com/run/9".into(),
            subtitle: Some("passed".into()),
            source_type: None,
            created_at: now(),
            updated_at: now(),
        };
        let text = attachment_link_text(&attachment);
        assert!(text.starts_with("title: CI run\n"));
        assert!(text.contains("url: https://ci.example.com/run/9\n"));
        assert!(!text.contains("---"));
    }
}
