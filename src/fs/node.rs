//! The enumerated node set of the virtual tree.
//!
//! A [`Node`] is a by-value descriptor: backend ids plus whatever small
//! parameters the kind needs (a team key for link targets, a search
//! scope, a trigger's fallback name). Nodes are built fresh on every
//! lookup/readdir; no parent→child graph is ever stored. The kernel
//! coalesces repeated materialisations through the stable inode.

use std::time::Duration;

use fuser::{FileType, INodeNo};

use super::ino::{Tag, ino};
use crate::model::{DocScope, UpdateParent};
use crate::repo::MyFilter;

/// Kernel cache windows per entry class.
pub const TTL_TRIGGER: Duration = Duration::from_secs(1);
pub const TTL_RECORD: Duration = Duration::from_secs(5);
pub const TTL_STABLE: Duration = Duration::from_secs(30);
pub const TTL_DIR_ATTR: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Status,
    Label,
    Assignee,
}

impl FilterKind {
    pub fn dir_name(self) -> &'static str {
        match self {
            FilterKind::Status => "status",
            FilterKind::Label => "label",
            FilterKind::Assignee => "assignee",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "status" => Some(FilterKind::Status),
            "label" => Some(FilterKind::Label),
            "assignee" => Some(FilterKind::Assignee),
            _ => None,
        }
    }
}

/// The issue source a scoped search is constrained to.
#[derive(Debug, Clone, PartialEq)]
pub enum IssueScope {
    Team { team_id: String, key: String },
    Filter { team_id: String, key: String, kind: FilterKind, value: String },
    My { filter: MyFilter },
}

impl IssueScope {
    /// Stable key for inode derivation and freshness bookkeeping.
    pub fn scope_key(&self) -> String {
        match self {
            IssueScope::Team { team_id, .. } => format!("team:{team_id}"),
            IssueScope::Filter { team_id, kind, value, .. } => {
                format!("filter:{team_id}:{}:{value}", kind.dir_name())
            }
            IssueScope::My { filter } => format!("my:{}", filter.dir_name()),
        }
    }

    /// Path components between a search-results directory under this
    /// scope and the mount root; symlink targets climb this many `..`
    /// segments before descending into `teams/`.
    pub fn results_depth(&self) -> usize {
        match self {
            // teams/<K>/search/<q>
            IssueScope::Team { .. } => 4,
            // teams/<K>/by/<kind>/<value>/search/<q>
            IssueScope::Filter { .. } => 7,
            // my/<filter>/search/<q>
            IssueScope::My { .. } => 4,
        }
    }
}

/// Write-only creation files and the mutation each dispatches.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerKind {
    Comment { issue_id: String },
    Document { scope: DocScope, name: Option<String> },
    Label { team_id: String, name: Option<String> },
    Update { parent: UpdateParent },
    Milestone { project_id: String, name: Option<String> },
    Attachment { issue_id: String },
    Relation { issue_id: String },
}

impl TriggerKind {
    pub fn ino(&self) -> INodeNo {
        match self {
            TriggerKind::Comment { issue_id } => ino(Tag::CommentsCreate, issue_id),
            TriggerKind::Document { scope, name } => {
                ino(Tag::DocsCreate, &compose(&scope.key(), name))
            }
            TriggerKind::Label { team_id, name } => {
                ino(Tag::LabelsCreate, &compose(team_id, name))
            }
            TriggerKind::Update { parent } => ino(Tag::UpdatesCreate, &parent.key()),
            TriggerKind::Milestone { project_id, name } => {
                ino(Tag::MilestonesCreate, &compose(project_id, name))
            }
            TriggerKind::Attachment { issue_id } => ino(Tag::AttachmentsCreate, issue_id),
            TriggerKind::Relation { issue_id } => ino(Tag::RelationsCreate, issue_id),
        }
    }

    /// The name the trigger is listed under in its directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            TriggerKind::Comment { .. }
            | TriggerKind::Document { .. }
            | TriggerKind::Label { .. }
            | TriggerKind::Update { .. } => "new.md",
            TriggerKind::Milestone { .. }
            | TriggerKind::Attachment { .. }
            | TriggerKind::Relation { .. } => "_create",
        }
    }
}

fn compose(parent: &str, name: &Option<String>) -> String {
    match name {
        Some(name) => format!("{parent}#{name}"),
        None => parent.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Root,
    Readme,
    TeamsDir,
    TeamDir { team_id: String, key: String },
    TeamInfo { team_id: String },
    StatesFile { team_id: String },
    LabelsInfo { team_id: String },
    FilterRoot { team_id: String, key: String },
    FilterKindDir { team_id: String, key: String, kind: FilterKind },
    FilterValueDir { team_id: String, key: String, kind: FilterKind, value: String },
    CyclesDir { team_id: String, key: String },
    CycleDir { cycle_id: String, team_id: String, key: String },
    CycleInfo { cycle_id: String },
    ProjectsDir { team_id: String, key: String },
    ProjectDir { project_id: String, team_id: String, key: String },
    ProjectInfo { project_id: String },
    MilestonesDir { project_id: String },
    MilestoneFile { milestone_id: String },
    UpdatesDir { parent: UpdateParent },
    UpdateFile { update_id: String },
    IssuesDir { team_id: String, key: String },
    IssueDir { issue_id: String },
    IssueFile { issue_id: String },
    CommentsDir { issue_id: String },
    CommentFile { comment_id: String },
    DocsDir { scope: DocScope },
    DocFile { doc_id: String },
    ChildrenDir { issue_id: String },
    AttachmentsDir { issue_id: String },
    LinkFile { attachment_id: String },
    BinFile { file_id: String },
    RelationsDir { issue_id: String },
    RelationFile { relation_id: String },
    LabelsDir { team_id: String },
    LabelFile { label_id: String },
    UsersDir,
    UserDir { user_id: String, handle: String },
    UserInfo { user_id: String },
    MyDir,
    MyIssuesDir { filter: MyFilter },
    InitiativesDir,
    InitiativeDir { initiative_id: String, slug: String },
    InitiativeInfo { initiative_id: String },
    InitiativeProjectsDir { initiative_id: String },
    SearchRootDir { scope: IssueScope },
    SearchResultsDir { scope: IssueScope, query: String },
    Symlink { target: String },
    Trigger(TriggerKind),
}

impl Node {
    pub fn ino(&self) -> INodeNo {
        match self {
            Node::Root => INodeNo::ROOT,
            Node::Readme => ino(Tag::Readme, ""),
            Node::TeamsDir => ino(Tag::TeamsDir, ""),
            Node::TeamDir { team_id, .. } => ino(Tag::Team, team_id),
            Node::TeamInfo { team_id } => ino(Tag::TeamInfo, team_id),
            Node::StatesFile { team_id } => ino(Tag::TeamStates, team_id),
            Node::LabelsInfo { team_id } => ino(Tag::TeamLabelsInfo, team_id),
            Node::FilterRoot { team_id, .. } => ino(Tag::FilterRoot, team_id),
            Node::FilterKindDir { team_id, kind, .. } => {
                ino(Tag::FilterKind, &format!("{team_id}:{}", kind.dir_name()))
            }
            Node::FilterValueDir { team_id, kind, value, .. } => {
                ino(Tag::FilterValue, &format!("{team_id}:{}:{value}", kind.dir_name()))
            }
            Node::CyclesDir { team_id, .. } => ino(Tag::CyclesDir, team_id),
            Node::CycleDir { cycle_id, .. } => ino(Tag::Cycle, cycle_id),
            Node::CycleInfo { cycle_id } => ino(Tag::CycleInfo, cycle_id),
            Node::ProjectsDir { team_id, .. } => ino(Tag::ProjectsDir, team_id),
            Node::ProjectDir { project_id, .. } => ino(Tag::Project, project_id),
            Node::ProjectInfo { project_id } => ino(Tag::ProjectInfo, project_id),
            Node::MilestonesDir { project_id } => ino(Tag::MilestonesDir, project_id),
            Node::MilestoneFile { milestone_id } => ino(Tag::Milestone, milestone_id),
            Node::UpdatesDir { parent } => ino(Tag::UpdatesDir, &parent.key()),
            Node::UpdateFile { update_id } => ino(Tag::Update, update_id),
            Node::IssuesDir { team_id, .. } => ino(Tag::IssuesDir, team_id),
            Node::IssueDir { issue_id } => ino(Tag::Issue, issue_id),
            Node::IssueFile { issue_id } => ino(Tag::IssueFile, issue_id),
            Node::CommentsDir { issue_id } => ino(Tag::CommentsDir, issue_id),
            Node::CommentFile { comment_id } => ino(Tag::Comment, comment_id),
            Node::DocsDir { scope } => ino(Tag::DocsDir, &scope.key()),
            Node::DocFile { doc_id } => ino(Tag::Doc, doc_id),
            Node::ChildrenDir { issue_id } => ino(Tag::ChildrenDir, issue_id),
            Node::AttachmentsDir { issue_id } => ino(Tag::AttachmentsDir, issue_id),
            Node::LinkFile { attachment_id } => ino(Tag::Attachment, attachment_id),
            Node::BinFile { file_id } => ino(Tag::File, file_id),
            Node::RelationsDir { issue_id } => ino(Tag::RelationsDir, issue_id),
            Node::RelationFile { relation_id } => ino(Tag::Relation, relation_id),
            Node::LabelsDir { team_id } => ino(Tag::LabelsDir, team_id),
            Node::LabelFile { label_id } => ino(Tag::Label, label_id),
            Node::UsersDir => ino(Tag::UsersDir, ""),
            Node::UserDir { user_id, .. } => ino(Tag::User, user_id),
            Node::UserInfo { user_id } => ino(Tag::UserInfo, user_id),
            Node::MyDir => ino(Tag::MyDir, ""),
            Node::MyIssuesDir { filter } => ino(Tag::MyIssues, filter.dir_name()),
            Node::InitiativesDir => ino(Tag::InitiativesDir, ""),
            Node::InitiativeDir { initiative_id, .. } => ino(Tag::Initiative, initiative_id),
            Node::InitiativeInfo { initiative_id } => ino(Tag::InitiativeInfo, initiative_id),
            Node::InitiativeProjectsDir { initiative_id } => {
                ino(Tag::InitiativeProjects, initiative_id)
            }
            Node::SearchRootDir { scope } => ino(Tag::SearchRoot, &scope.scope_key()),
            Node::SearchResultsDir { scope, query } => {
                ino(Tag::SearchResults, &format!("{}:{query}", scope.scope_key()))
            }
            Node::Symlink { target } => ino(Tag::Link, target),
            Node::Trigger(kind) => kind.ino(),
        }
    }

    pub fn file_type(&self) -> FileType {
        match self {
            Node::Symlink { .. } => FileType::Symlink,
            node if node.is_dir() => FileType::Directory,
            _ => FileType::RegularFile,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(
            self,
            Node::Root
                | Node::TeamsDir
                | Node::TeamDir { .. }
                | Node::FilterRoot { .. }
                | Node::FilterKindDir { .. }
                | Node::FilterValueDir { .. }
                | Node::CyclesDir { .. }
                | Node::CycleDir { .. }
                | Node::ProjectsDir { .. }
                | Node::ProjectDir { .. }
                | Node::MilestonesDir { .. }
                | Node::UpdatesDir { .. }
                | Node::IssuesDir { .. }
                | Node::IssueDir { .. }
                | Node::CommentsDir { .. }
                | Node::DocsDir { .. }
                | Node::ChildrenDir { .. }
                | Node::AttachmentsDir { .. }
                | Node::RelationsDir { .. }
                | Node::LabelsDir { .. }
                | Node::UsersDir
                | Node::UserDir { .. }
                | Node::MyDir
                | Node::MyIssuesDir { .. }
                | Node::InitiativesDir
                | Node::InitiativeDir { .. }
                | Node::InitiativeProjectsDir { .. }
                | Node::SearchRootDir { .. }
                | Node::SearchResultsDir { .. }
        )
    }

    /// Open-for-write records: buffered content, flush pipeline.
    pub fn is_writable_record(&self) -> bool {
        matches!(self, Node::IssueFile { .. } | Node::DocFile { .. } | Node::LabelFile { .. })
    }

    pub fn is_trigger(&self) -> bool {
        matches!(self, Node::Trigger(_))
    }

    pub fn perm(&self) -> u16 {
        match self {
            Node::Symlink { .. } => 0o777,
            Node::Trigger(_) => 0o200,
            node if node.is_dir() => 0o755,
            node if node.is_writable_record() => 0o644,
            _ => 0o444,
        }
    }

    /// Kernel entry-cache window.
    pub fn entry_ttl(&self) -> Duration {
        match self {
            Node::Trigger(_) => TTL_TRIGGER,
            node if node.is_writable_record() => TTL_RECORD,
            _ => TTL_STABLE,
        }
    }

    /// Kernel attribute-cache window.
    pub fn attr_ttl(&self) -> Duration {
        match self {
            Node::Trigger(_) => TTL_TRIGGER,
            node if node.is_writable_record() => TTL_RECORD,
            node if node.is_dir() => TTL_DIR_ATTR,
            _ => TTL_STABLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inode_is_stable_per_descriptor() {
        let a = Node::IssueDir { issue_id: "issue-1".into() };
        let b = Node::IssueDir { issue_id: "issue-1".into() };
        assert_eq!(a.ino(), b.ino());
        let file = Node::IssueFile { issue_id: "issue-1".into() };
        assert_ne!(a.ino(), file.ino());
    }

    #[test]
    fn symlinks_with_same_target_share_an_inode() {
        let a = Node::Symlink { target: "../../teams/ENG/issues/ENG-1".into() };
        let b = Node::Symlink { target: "../../teams/ENG/issues/ENG-1".into() };
        assert_eq!(a.ino(), b.ino());
    }

    #[test]
    fn permission_surface() {
        assert_eq!(Node::Root.perm(), 0o755);
        assert_eq!(Node::Readme.perm(), 0o444);
        assert_eq!(Node::IssueFile { issue_id: "i".into() }.perm(), 0o644);
        assert_eq!(
            Node::Trigger(TriggerKind::Comment { issue_id: "i".into() }).perm(),
            0o200
        );
        assert_eq!(Node::Symlink { target: "x".into() }.perm(), 0o777);
    }

    #[test]
    fn ttl_classes() {
        assert_eq!(
            Node::Trigger(TriggerKind::Attachment { issue_id: "i".into() }).entry_ttl(),
            TTL_TRIGGER
        );
        assert_eq!(Node::IssueFile { issue_id: "i".into() }.entry_ttl(), TTL_RECORD);
        assert_eq!(Node::Readme.entry_ttl(), TTL_STABLE);
        assert_eq!(Node::TeamsDir.attr_ttl(), TTL_DIR_ATTR);
    }

    #[test]
    fn search_scope_depths() {
        let team = IssueScope::Team { team_id: "t".into(), key: "ENG".into() };
        assert_eq!(team.results_depth(), 4);
        let filter = IssueScope::Filter {
            team_id: "t".into(),
            key: "ENG".into(),
            kind: FilterKind::Status,
            value: "Todo".into(),
        };
        assert_eq!(filter.results_depth(), 7);
        let my = IssueScope::My { filter: MyFilter::Assigned };
        assert_eq!(my.results_depth(), 4);
    }
}
