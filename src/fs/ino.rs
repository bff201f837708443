//! Stable inode derivation.
//!
//! `ino(tag, id)` is the FNV-1a-64 hash of `tag ":" id`. The tag
//! namespaces the node kind so the same backend id used by two different
//! node kinds (an issue's directory and its `issue.md`) never shares an
//! inode. The hash is pure, so the same virtual object keeps its inode
//! across lookups, process restarts, and remounts.

use fuser::INodeNo;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Node-kind namespace for inode derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Readme,
    TeamsDir,
    Team,
    TeamInfo,
    TeamStates,
    TeamLabelsInfo,
    FilterRoot,
    FilterKind,
    FilterValue,
    CyclesDir,
    Cycle,
    CycleInfo,
    CycleCurrent,
    ProjectsDir,
    Project,
    ProjectInfo,
    MilestonesDir,
    Milestone,
    MilestonesCreate,
    UpdatesDir,
    Update,
    UpdatesCreate,
    IssuesDir,
    Issue,
    IssueFile,
    CommentsDir,
    Comment,
    CommentsCreate,
    DocsDir,
    Doc,
    DocsCreate,
    ChildrenDir,
    AttachmentsDir,
    Attachment,
    File,
    AttachmentsCreate,
    RelationsDir,
    Relation,
    RelationsCreate,
    LabelsDir,
    Label,
    LabelsCreate,
    UsersDir,
    User,
    UserInfo,
    MyDir,
    MyIssues,
    InitiativesDir,
    Initiative,
    InitiativeInfo,
    InitiativeProjects,
    SearchRoot,
    SearchResults,
    Link,
}

impl Tag {
    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Readme => "readme",
            Tag::TeamsDir => "teams-dir",
            Tag::Team => "team",
            Tag::TeamInfo => "team-info",
            Tag::TeamStates => "team-states",
            Tag::TeamLabelsInfo => "team-labels-info",
            Tag::FilterRoot => "by",
            Tag::FilterKind => "by-kind",
            Tag::FilterValue => "by-value",
            Tag::CyclesDir => "cycles-dir",
            Tag::Cycle => "cycle",
            Tag::CycleInfo => "cycle-info",
            Tag::CycleCurrent => "cycle-current",
            Tag::ProjectsDir => "projects-dir",
            Tag::Project => "project",
            Tag::ProjectInfo => "project-info",
            Tag::MilestonesDir => "milestones-dir",
            Tag::Milestone => "milestone",
            Tag::MilestonesCreate => "milestones-create",
            Tag::UpdatesDir => "updates-dir",
            Tag::Update => "update",
            Tag::UpdatesCreate => "updates-create",
            Tag::IssuesDir => "issues-dir",
            Tag::Issue => "issue",
            Tag::IssueFile => "issue-file",
            Tag::CommentsDir => "comments-dir",
            Tag::Comment => "comment",
            Tag::CommentsCreate => "comments-create",
            Tag::DocsDir => "docs",
            Tag::Doc => "doc",
            Tag::DocsCreate => "docs-create",
            Tag::ChildrenDir => "children-dir",
            Tag::AttachmentsDir => "attachments",
            Tag::Attachment => "attachment",
            Tag::File => "file",
            Tag::AttachmentsCreate => "attachments-create",
            Tag::RelationsDir => "relations-dir",
            Tag::Relation => "relation",
            Tag::RelationsCreate => "relations-create",
            Tag::LabelsDir => "labels-dir",
            Tag::Label => "label",
            Tag::LabelsCreate => "labels-create",
            Tag::UsersDir => "users-dir",
            Tag::User => "user",
            Tag::UserInfo => "user-info",
            Tag::MyDir => "my-dir",
            Tag::MyIssues => "my-issues",
            Tag::InitiativesDir => "initiatives-dir",
            Tag::Initiative => "initiative",
            Tag::InitiativeInfo => "initiative-info",
            Tag::InitiativeProjects => "initiative-projects",
            Tag::SearchRoot => "search",
            Tag::SearchResults => "search-results",
            Tag::Link => "link",
        }
    }

    /// Every tag in use; tests verify pairwise inode disjointness over it.
    pub const ALL: [Tag; 54] = [
        Tag::Readme,
        Tag::TeamsDir,
        Tag::Team,
        Tag::TeamInfo,
        Tag::TeamStates,
        Tag::TeamLabelsInfo,
        Tag::FilterRoot,
        Tag::FilterKind,
        Tag::FilterValue,
        Tag::CyclesDir,
        Tag::Cycle,
        Tag::CycleInfo,
        Tag::CycleCurrent,
        Tag::ProjectsDir,
        Tag::Project,
        Tag::ProjectInfo,
        Tag::MilestonesDir,
        Tag::Milestone,
        Tag::MilestonesCreate,
        Tag::UpdatesDir,
        Tag::Update,
        Tag::UpdatesCreate,
        Tag::IssuesDir,
        Tag::Issue,
        Tag::IssueFile,
        Tag::CommentsDir,
        Tag::Comment,
        Tag::CommentsCreate,
        Tag::DocsDir,
        Tag::Doc,
        Tag::DocsCreate,
        Tag::ChildrenDir,
        Tag::AttachmentsDir,
        Tag::Attachment,
        Tag::File,
        Tag::AttachmentsCreate,
        Tag::RelationsDir,
        Tag::Relation,
        Tag::RelationsCreate,
        Tag::LabelsDir,
        Tag::Label,
        Tag::LabelsCreate,
        Tag::UsersDir,
        Tag::User,
        Tag::UserInfo,
        Tag::MyDir,
        Tag::MyIssues,
        Tag::InitiativesDir,
        Tag::Initiative,
        Tag::InitiativeInfo,
        Tag::InitiativeProjects,
        Tag::SearchRoot,
        Tag::SearchResults,
        Tag::Link,
    ];
}

fn fnv1a(bytes: impl Iterator<Item = u8>) -> u64 {
    let mut hash = FNV_OFFSET;
    for b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Stable inode for a `(kind, backend-id)` pair.
pub fn ino(tag: Tag, id: &str) -> INodeNo {
    let bytes = tag.as_str().bytes().chain([b':']).chain(id.bytes());
    let mut hash = fnv1a(bytes);
    // 0 is invalid to the kernel and 1 is the mount root.
    if hash <= 1 {
        hash = hash.wrapping_add(2);
    }
    INodeNo(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn same_tag_and_id_is_deterministic() {
        for tag in Tag::ALL {
            assert_eq!(ino(tag, "abc-123"), ino(tag, "abc-123"));
        }
    }

    #[test]
    fn distinct_pairs_get_distinct_inodes() {
        let ids = ["", "a", "b", "issue-1", "issue-2", "ENG", "ENG-42", "uuid-0001"];
        let mut seen = HashSet::new();
        for tag in Tag::ALL {
            for id in ids {
                assert!(
                    seen.insert(ino(tag, id)),
                    "collision at ({}, {id:?})",
                    tag.as_str()
                );
            }
        }
    }

    #[test]
    fn never_yields_kernel_reserved_inodes() {
        for tag in Tag::ALL {
            for id in ["", "x", "reserved"] {
                assert!(ino(tag, id).0 > 1);
            }
        }
    }

    #[test]
    fn matches_reference_fnv1a() {
        // FNV-1a of "a" per the published offset/prime parameters.
        assert_eq!(fnv1a("a".bytes()), 0xaf63dc4c8601ec8c);
    }
}
