//! Text ⇄ record marshalling.
//!
//! Writable records are surfaced as markdown with a structured header
//! block: a `---`-delimited key/value section above a free-form body.
//! [`frontmatter`] implements the header mini-language, [`issue`] the
//! issue document with its field-wise diff, [`records`] the remaining
//! record documents, and [`triggers`] the grammars accepted by the
//! write-only creation files.

pub mod frontmatter;
pub mod issue;
pub mod records;
pub mod triggers;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("malformed header: {0}")]
    Header(String),
    #[error("bad value for `{key}`: {reason}")]
    Value { key: &'static str, reason: String },
}

impl MarshalError {
    pub fn value(key: &'static str, reason: impl Into<String>) -> Self {
        MarshalError::Value { key, reason: reason.into() }
    }
}
