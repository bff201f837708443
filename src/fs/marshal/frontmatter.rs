//! The header mini-language: a deterministic, hand-written parser for the
//! `---`-delimited block above a record body.
//!
//! This is intentionally not a general YAML implementation. The language
//! is: `key: scalar` lines, `key:` followed by `  - item` sequence lines
//! or `  sub: value` map lines, double-quoted scalars with `\"` and `\\`
//! escapes, and `[]` for an explicit empty sequence. Text without a
//! leading `---` line is all body. Unrecognised keys round-trip through
//! the callers untouched.

use super::MarshalError;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(String),
    List(Vec<String>),
    Map(Vec<(String, String)>),
}

impl Value {
    pub fn scalar(s: impl Into<String>) -> Self {
        Value::Scalar(s.into())
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    pub entries: Vec<(String, Value)>,
}

impl Header {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Scalar value of `key`; empty string when absent.
    pub fn scalar(&self, key: &str) -> &str {
        self.get(key).and_then(Value::as_scalar).unwrap_or("")
    }

    pub fn scalar_opt(&self, key: &str) -> Option<&str> {
        match self.get(key).and_then(Value::as_scalar) {
            Some("") | None => None,
            Some(s) => Some(s),
        }
    }

    /// Sequence value of `key`. A bare `key:` with nothing indented and
    /// an explicit `[]` both read as the empty sequence.
    pub fn list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::List(items)) => items.clone(),
            Some(Value::Scalar(s)) if s.is_empty() => Vec::new(),
            _ => Vec::new(),
        }
    }

    pub fn push(&mut self, key: impl Into<String>, value: Value) {
        self.entries.push((key.into(), value));
    }
}

/// A parsed text document: header plus body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextDoc {
    pub header: Header,
    pub body: String,
}

const DELIM: &str = "---";

pub fn parse(text: &str) -> Result<TextDoc, MarshalError> {
    let mut lines = text.split_inclusive('\n');
    let first = lines.clone().next().map(|l| l.trim_end_matches('\n'));
    if first != Some(DELIM) {
        return Ok(TextDoc { header: Header::default(), body: text.to_string() });
    }
    lines.next();

    let mut header = Header::default();
    let mut closed = false;
    let mut consumed = DELIM.len() + 1;
    let mut pending: Option<(String, Value)> = None;

    for line in lines.by_ref() {
        consumed += line.len();
        let line = line.trim_end_matches('\n');
        if line == DELIM {
            closed = true;
            break;
        }

        if let Some(rest) = line.strip_prefix("  ") {
            // Continuation of the pending key: sequence item or map entry.
            let (key, value) = pending
                .take()
                .ok_or_else(|| MarshalError::Header(format!("unexpected indent: `{line}`")))?;
            let value = if let Some(item) = rest.strip_prefix("- ") {
                match value {
                    Value::Scalar(s) if s.is_empty() => Value::List(vec![unquote(item.trim())]),
                    Value::List(mut items) => {
                        items.push(unquote(item.trim()));
                        Value::List(items)
                    }
                    _ => {
                        return Err(MarshalError::Header(format!(
                            "sequence item under non-sequence `{key}`"
                        )));
                    }
                }
            } else if let Some((sub, sub_value)) = rest.split_once(':') {
                let entry = (sub.trim().to_string(), unquote(sub_value.trim()));
                match value {
                    Value::Scalar(s) if s.is_empty() => Value::Map(vec![entry]),
                    Value::Map(mut entries) => {
                        entries.push(entry);
                        Value::Map(entries)
                    }
                    _ => {
                        return Err(MarshalError::Header(format!(
                            "map entry under non-map `{key}`"
                        )));
                    }
                }
            } else {
                return Err(MarshalError::Header(format!("malformed nested line: `{line}`")));
            };
            pending = Some((key, value));
            continue;
        }

        if let Some((key, value)) = pending.take() {
            header.push(key, value);
        }

        if line.trim().is_empty() {
            continue;
        }
        let (key, raw) = line
            .split_once(':')
            .ok_or_else(|| MarshalError::Header(format!("missing `:` in `{line}`")))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(MarshalError::Header(format!("empty key in `{line}`")));
        }
        let raw = raw.trim();
        let value = if raw == "[]" {
            Value::List(Vec::new())
        } else {
            Value::Scalar(unquote(raw))
        };
        pending = Some((key.to_string(), value));
    }

    if let Some((key, value)) = pending.take() {
        header.push(key, value);
    }
    if !closed {
        return Err(MarshalError::Header("unterminated header block".to_string()));
    }

    let mut body = &text[consumed..];
    // format() separates header and body with one blank line; strip it.
    body = body.strip_prefix('\n').unwrap_or(body);
    Ok(TextDoc { header, body: body.to_string() })
}

pub fn format(doc: &TextDoc) -> String {
    let mut out = String::new();
    out.push_str(DELIM);
    out.push('\n');
    for (key, value) in &doc.header.entries {
        match value {
            Value::Scalar(s) => {
                if s.is_empty() {
                    out.push_str(&format!("{key}:\n"));
                } else {
                    out.push_str(&format!("{key}: {}\n", quote(s)));
                }
            }
            Value::List(items) => {
                if items.is_empty() {
                    out.push_str(&format!("{key}: []\n"));
                } else {
                    out.push_str(&format!("{key}:\n"));
                    for item in items {
                        out.push_str(&format!("  - {}\n", quote(item)));
                    }
                }
            }
            Value::Map(entries) => {
                out.push_str(&format!("{key}:\n"));
                for (sub, sub_value) in entries {
                    out.push_str(&format!("  {sub}: {}\n", quote(sub_value)));
                }
            }
        }
    }
    out.push_str(DELIM);
    out.push('\n');
    if !doc.body.is_empty() {
        out.push('\n');
        out.push_str(&doc.body);
    }
    out
}

/// Quote a scalar when the plain form would not re-parse to the same
/// value.
fn quote(s: &str) -> String {
    let needs_quoting = s.is_empty()
        || s != s.trim()
        || s.contains(':')
        || s.contains('#')
        || s.contains('"')
        || s.starts_with('-')
        || s.starts_with('[')
        || s == "[]";
    if needs_quoting {
        let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    } else {
        s.to_string()
    }
}

fn unquote(s: &str) -> String {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        let inner = &s[1..s.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut escaped = false;
        for c in inner.chars() {
            if escaped {
                out.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else {
                out.push(c);
            }
        }
        out
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn text_without_delimiter_is_all_body() {
        let doc = parse("just a note\nwith lines\n").unwrap();
        assert!(doc.header.entries.is_empty());
        assert_eq!(doc.body, "just a note\nwith lines\n");
    }

    #[test]
    fn scalar_list_and_map_parse() {
        let text = "---\n\
                    title: Fix login\n\
                    labels:\n\
                    \x20 - Bug\n\
                    \x20 - Backend\n\
                    meta:\n\
                    \x20 icon: bolt\n\
                    empty:\n\
                    none: []\n\
                    ---\n\
                    \n\
                    The body.\n";
        let doc = parse(text).unwrap();
        assert_eq!(doc.header.scalar("title"), "Fix login");
        assert_eq!(doc.header.list("labels"), vec!["Bug", "Backend"]);
        assert_eq!(
            doc.header.get("meta"),
            Some(&Value::Map(vec![("icon".to_string(), "bolt".to_string())]))
        );
        assert_eq!(doc.header.scalar("empty"), "");
        assert_eq!(doc.header.list("none"), Vec::<String>::new());
        assert_eq!(doc.body, "The body.\n");
    }

    #[test]
    fn quoted_scalars_round_trip() {
        let mut header = Header::default();
        header.push("title", Value::scalar("watch: the \"quotes\""));
        header.push("note", Value::scalar(" padded "));
        let doc = TextDoc { header, body: String::new() };
        let parsed = parse(&format(&doc)).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn format_parse_is_identity() {
        let mut header = Header::default();
        header.push("title", Value::scalar("A plain title"));
        header.push("labels", Value::List(vec!["Bug".into()]));
        header.push("tags", Value::List(vec![]));
        header.push("meta", Value::Map(vec![("color".into(), "#ff0000".into())]));
        let doc = TextDoc { header, body: "Body text\n\nwith a gap.\n".into() };
        assert_eq!(parse(&format(&doc)).unwrap(), doc);
    }

    #[test]
    fn unterminated_header_is_an_error() {
        assert!(parse("---\ntitle: x\nno close\n").is_err());
    }

    #[test]
    fn stray_indent_is_an_error() {
        assert!(parse("---\n  - floating\n---\n").is_err());
    }

    #[test]
    fn body_without_blank_separator_survives() {
        let text = "---\ntitle: t\n---\nimmediate body";
        assert_eq!(parse(text).unwrap().body, "immediate body");
    }
}
