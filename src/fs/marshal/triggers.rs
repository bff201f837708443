//! Grammars accepted by the write-only trigger files.
//!
//! Each parser turns the single buffered write into the arguments of one
//! creation mutation. Grammar violations surface as
//! [`FsError::Invalid`](crate::error::FsError) upstream; the parsers here
//! report structured [`MarshalError`]s.

use chrono::NaiveDate;

use super::MarshalError;
use super::frontmatter;
use crate::model::{Health, RelationType};

/// `docs/new.md` and `create(<name>.md)`: optional `title:` header, body
/// is the document content. A missing title falls back to the sanitised
/// create-target filename supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub title: String,
    pub content: String,
}

pub fn parse_new_document(
    text: &str,
    fallback_title: Option<&str>,
) -> Result<NewDocument, MarshalError> {
    let parsed = frontmatter::parse(text)?;
    let title = match parsed.header.scalar_opt("title") {
        Some(title) => title.to_string(),
        None => match fallback_title {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(MarshalError::value("title", "missing")),
        },
    };
    Ok(NewDocument { title, content: parsed.body })
}

/// `comments/new.md`: the whole write is the comment body.
pub fn parse_new_comment(text: &str) -> Result<String, MarshalError> {
    let body = text.trim_end_matches('\n');
    if body.trim().is_empty() {
        return Err(MarshalError::value("body", "empty comment"));
    }
    Ok(body.to_string())
}

/// `labels/new.md` and `create(<name>.md)`: optional `name:`, `color:`,
/// `description:` header lines; the name falls back to the create-target
/// filename.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLabel {
    pub name: String,
    pub color: Option<String>,
    pub description: Option<String>,
}

pub fn parse_new_label(text: &str, fallback_name: Option<&str>) -> Result<NewLabel, MarshalError> {
    let parsed = frontmatter::parse(text)?;
    let name = match parsed.header.scalar_opt("name") {
        Some(name) => name.to_string(),
        None => match fallback_name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(MarshalError::value("name", "missing")),
        },
    };
    let description = match parsed.header.scalar_opt("description") {
        Some(d) => Some(d.to_string()),
        None if !parsed.body.trim().is_empty() => Some(parsed.body.trim().to_string()),
        None => None,
    };
    Ok(NewLabel {
        name,
        color: parsed.header.scalar_opt("color").map(String::from),
        description,
    })
}

/// `milestones/_create`: `name:` (or `title:`) plus optional
/// `target_date:`; the body is the milestone description.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMilestone {
    pub name: String,
    pub description: String,
    pub target_date: Option<NaiveDate>,
}

pub fn parse_new_milestone(
    text: &str,
    fallback_name: Option<&str>,
) -> Result<NewMilestone, MarshalError> {
    let parsed = frontmatter::parse(text)?;
    let name = parsed
        .header
        .scalar_opt("name")
        .or_else(|| parsed.header.scalar_opt("title"))
        .map(String::from);
    let name = match name {
        Some(name) => name,
        None => match fallback_name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(MarshalError::value("name", "missing")),
        },
    };
    let target_date = match parsed.header.scalar_opt("target_date") {
        Some(raw) => Some(
            raw.parse::<NaiveDate>()
                .map_err(|e| MarshalError::value("target_date", e.to_string()))?,
        ),
        None => None,
    };
    Ok(NewMilestone { name, description: parsed.body, target_date })
}

/// `updates/new.md`: optional `health:` header, body is the update text.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUpdate {
    pub body: String,
    pub health: Health,
}

pub fn parse_new_update(text: &str) -> Result<NewUpdate, MarshalError> {
    let parsed = frontmatter::parse(text)?;
    let health = match parsed.header.scalar_opt("health") {
        Some(raw) => Health::parse(raw)
            .ok_or_else(|| MarshalError::value("health", format!("unknown token `{raw}`")))?,
        None => Health::OnTrack,
    };
    if parsed.body.trim().is_empty() {
        return Err(MarshalError::value("body", "empty update"));
    }
    Ok(NewUpdate { body: parsed.body.trim_end_matches('\n').to_string(), health })
}

/// `attachments/_create`: one line; first whitespace-separated token is
/// the URL, the optional remainder is the title.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttachment {
    pub url: String,
    pub title: Option<String>,
}

pub fn parse_attachment_line(text: &str) -> Result<NewAttachment, MarshalError> {
    let line = text.trim();
    if line.is_empty() {
        return Err(MarshalError::value("url", "missing"));
    }
    let (url, rest) = match line.split_once(char::is_whitespace) {
        Some((url, rest)) => (url, rest.trim()),
        None => (line, ""),
    };
    url::Url::parse(url).map_err(|e| MarshalError::value("url", e.to_string()))?;
    Ok(NewAttachment {
        url: url.to_string(),
        title: if rest.is_empty() { None } else { Some(rest.to_string()) },
    })
}

/// `relations/_create`: `<type> <identifier>` or `<identifier>` with the
/// type defaulting to `related`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRelation {
    pub relation_type: RelationType,
    pub target_identifier: String,
}

pub fn parse_relation_line(text: &str) -> Result<NewRelation, MarshalError> {
    let line = text.trim();
    if line.is_empty() {
        return Err(MarshalError::value("target", "missing"));
    }
    let mut parts = line.split_whitespace();
    let first = parts.next().unwrap_or_default();
    let second = parts.next();
    if parts.next().is_some() {
        return Err(MarshalError::value("target", "too many tokens"));
    }
    match second {
        Some(identifier) => {
            let relation_type = RelationType::parse(first)
                .ok_or_else(|| MarshalError::value("type", format!("unknown type `{first}`")))?;
            Ok(NewRelation { relation_type, target_identifier: identifier.to_string() })
        }
        None => Ok(NewRelation {
            relation_type: RelationType::Related,
            target_identifier: first.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_document_title_falls_back_to_filename() {
        let parsed = parse_new_document("Body only.\n", Some("release notes")).unwrap();
        assert_eq!(parsed.title, "release notes");
        assert_eq!(parsed.content, "Body only.\n");

        let parsed =
            parse_new_document("---\ntitle: Explicit\n---\n\nBody.\n", Some("ignored")).unwrap();
        assert_eq!(parsed.title, "Explicit");
    }

    #[test]
    fn new_document_requires_some_title() {
        assert!(parse_new_document("no header\n", None).is_err());
    }

    #[test]
    fn empty_comment_is_rejected() {
        assert!(parse_new_comment("  \n").is_err());
        assert_eq!(parse_new_comment("LGTM\n").unwrap(), "LGTM");
    }

    #[test]
    fn update_health_tokens() {
        let parsed = parse_new_update("---\nhealth: atRisk\n---\n\nSlipping.\n").unwrap();
        assert_eq!(parsed.health, Health::AtRisk);
        assert_eq!(parsed.body, "Slipping.");

        let parsed = parse_new_update("All good.\n").unwrap();
        assert_eq!(parsed.health, Health::OnTrack);

        assert!(parse_new_update("---\nhealth: sideways\n---\n\nx\n").is_err());
    }

    #[test]
    fn attachment_line_splits_url_and_title() {
        let parsed =
            parse_attachment_line("https://ci.example.com/run/9 Nightly build\n").unwrap();
        assert_eq!(parsed.url, "https://ci.example.com/run/9");
        assert_eq!(parsed.title.as_deref(), Some("Nightly build"));

        let parsed = parse_attachment_line("https://ci.example.com/run/9\n").unwrap();
        assert_eq!(parsed.title, None);

        assert!(parse_attachment_line("not a url\n").is_err());
        assert!(parse_attachment_line("\n").is_err());
    }

    #[test]
    fn relation_line_grammar() {
        let parsed = parse_relation_line("blocks ENG-7\n").unwrap();
        assert_eq!(parsed.relation_type, RelationType::Blocks);
        assert_eq!(parsed.target_identifier, "ENG-7");

        let parsed = parse_relation_line("ENG-9\n").unwrap();
        assert_eq!(parsed.relation_type, RelationType::Related);

        assert!(parse_relation_line("entangles ENG-7").is_err());
        assert!(parse_relation_line("blocks ENG-7 extra").is_err());
    }

    #[test]
    fn milestone_requires_name() {
        let parsed =
            parse_new_milestone("---\nname: Beta\ntarget_date: 2026-06-01\n---\n\nScope.\n", None)
                .unwrap();
        assert_eq!(parsed.name, "Beta");
        assert_eq!(parsed.target_date, Some("2026-06-01".parse().unwrap()));
        assert_eq!(parsed.description, "Scope.\n");

        assert!(parse_new_milestone("body\n", None).is_err());
        assert_eq!(parse_new_milestone("body\n", Some("Beta")).unwrap().name, "Beta");
    }

    #[test]
    fn label_name_fallback_and_description_body() {
        let parsed = parse_new_label("---\ncolor: #00ff00\n---\n\nGreen things.\n", Some("Infra"))
            .unwrap();
        assert_eq!(parsed.name, "Infra");
        assert_eq!(parsed.color.as_deref(), Some("#00ff00"));
        assert_eq!(parsed.description.as_deref(), Some("Green things."));
    }
}
