//! Mount root: the fixed top-level namespace.

use super::ChildEntry;
use crate::error::FsResult;
use crate::fs::Engine;
use crate::fs::node::Node;

pub(super) fn readdir(eng: &Engine) -> FsResult<Vec<ChildEntry>> {
    let mut entries = vec![
        ChildEntry::new("README.md", Node::Readme),
        ChildEntry::new("teams", Node::TeamsDir),
        ChildEntry::new("users", Node::UsersDir),
        ChildEntry::new("my", Node::MyDir),
    ];
    if eng.initiatives {
        entries.push(ChildEntry::new("initiatives", Node::InitiativesDir));
    }
    Ok(entries)
}
