//! End-to-end scenarios through the engine: create, edit, search,
//! comment, and the failure paths that must preserve user edits.

mod common;

use common::{ctx, harness, seed, warm};
use trailfs::api::OpCtx;
use trailfs::fs::handles::{OpenFile, Snapshot};
use trailfs::fs::marshal::issue as issue_doc;
use trailfs::fs::node::{FilterKind, Node, TriggerKind};
use trailfs::fs::{content, pipeline, tree};

/// Open an issue file the way the FUSE `open` path does: formatted
/// snapshot seeded into the buffer.
fn open_issue(h: &common::Harness, issue_id: &str) -> OpenFile {
    let issue = h.eng.repo.issue_by_id(ctx(), issue_id).unwrap().expect("issue cached");
    let doc = content::issue_snapshot(&h.eng, ctx(), &issue).unwrap();
    let buffer = issue_doc::format(&doc).into_bytes();
    OpenFile::with_content(
        Node::IssueFile { issue_id: issue_id.to_string() },
        buffer,
        Some(Snapshot::Issue(doc)),
    )
}

fn rewrite(file: &mut OpenFile, text: String) {
    file.buffer = text.into_bytes();
    file.dirty = true;
}

fn status_members(h: &common::Harness, team_id: &str, value: &str) -> Vec<String> {
    let dir = Node::FilterValueDir {
        team_id: team_id.to_string(),
        key: "ENG".into(),
        kind: FilterKind::Status,
        value: value.to_string(),
    };
    tree::readdir(&h.eng, ctx(), &dir)
        .unwrap()
        .into_iter()
        .filter(|e| e.name != "search")
        .map(|e| e.name)
        .collect()
}

#[test]
fn create_issue_via_mkdir() {
    let h = harness();
    let f = seed(&h);

    let issue =
        pipeline::create_issue(&h.eng, OpCtx::mutation(), &f.team.id, "ENG", "Refactor storage")
            .unwrap();
    let pattern = regex::Regex::new(r"^ENG-[0-9]+$").unwrap();
    assert!(pattern.is_match(&issue.identifier), "identifier {}", issue.identifier);

    let issues_dir = Node::IssuesDir { team_id: f.team.id.clone(), key: "ENG".into() };
    let dir = tree::lookup(&h.eng, ctx(), &issues_dir, &issue.identifier).unwrap();
    let file = tree::lookup(&h.eng, ctx(), &dir, "issue.md").unwrap();
    let text = String::from_utf8(content::read_node(&h.eng, ctx(), &file).unwrap()).unwrap();
    assert!(text.contains("title: Refactor storage"), "issue.md:\n{text}");
    assert!(text.contains(&format!("identifier: {}", issue.identifier)));
}

#[test]
fn status_change_moves_the_issue_between_filter_views() {
    let h = harness();
    let f = seed(&h);
    let issue = h.backend.add_issue(&f.team, &f.todo.id, "Login error");
    warm(&h, &f.team.id);

    assert_eq!(status_members(&h, &f.team.id, "Todo"), vec![issue.identifier.clone()]);

    let mut file = open_issue(&h, &issue.id);
    let text = String::from_utf8(file.buffer.clone()).unwrap();
    assert!(text.contains("status: Todo"));
    rewrite(&mut file, text.replace("status: Todo", "status: \"In Progress\""));
    pipeline::flush(&h.eng, &mut file).unwrap();
    assert!(!file.dirty);

    let (_, patch) = h.backend.last_issue_patch().expect("update sent");
    assert_eq!(patch.keys(), vec!["status"]);
    assert_eq!(patch.get("status").unwrap(), &serde_json::json!(f.in_progress.id));

    // A subsequent read reflects the write without a backend round-trip.
    let reread = content::read_node(
        &h.eng,
        ctx(),
        &Node::IssueFile { issue_id: issue.id.clone() },
    )
    .unwrap();
    assert!(String::from_utf8(reread).unwrap().contains("status: In Progress"));

    assert_eq!(status_members(&h, &f.team.id, "In Progress"), vec![issue.identifier.clone()]);
    assert!(status_members(&h, &f.team.id, "Todo").is_empty());
}

#[test]
fn adding_a_label_sends_exactly_one_key() {
    let h = harness();
    let f = seed(&h);
    let issue = h.backend.add_issue(&f.team, &f.todo.id, "Needs triage");
    warm(&h, &f.team.id);

    let mut file = open_issue(&h, &issue.id);
    let text = String::from_utf8(file.buffer.clone()).unwrap();
    rewrite(&mut file, text.replace("labels: []", "labels:\n  - Bug"));
    pipeline::flush(&h.eng, &mut file).unwrap();

    let (_, patch) = h.backend.last_issue_patch().unwrap();
    assert_eq!(patch.keys(), vec!["labels"]);

    let label_dir = Node::FilterValueDir {
        team_id: f.team.id.clone(),
        key: "ENG".into(),
        kind: FilterKind::Label,
        value: "Bug".into(),
    };
    let members: Vec<String> = tree::readdir(&h.eng, ctx(), &label_dir)
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert!(members.contains(&issue.identifier));
}

#[test]
fn clearing_labels_becomes_removed_labels() {
    let h = harness();
    let f = seed(&h);
    let mut issue = h.backend.add_issue(&f.team, &f.todo.id, "Labelled");
    let labels = h.eng.repo.labels(ctx(), &f.team.id).unwrap();
    issue.label_ids = labels.iter().map(|l| l.id.clone()).collect();
    h.backend.put_issue(issue.clone());
    warm(&h, &f.team.id);

    let mut file = open_issue(&h, &issue.id);
    let text = String::from_utf8(file.buffer.clone()).unwrap();
    assert!(text.contains("- Bug"));
    let without = {
        // Replace the two-item sequence with the explicit empty form.
        let start = text.find("labels:").unwrap();
        let tail = &text[start..];
        let end = start + tail.find("due_date").unwrap_or(tail.find("---").unwrap());
        format!("{}labels: []\n{}", &text[..start], &text[end..])
    };
    rewrite(&mut file, without);
    pipeline::flush(&h.eng, &mut file).unwrap();

    let (_, patch) = h.backend.last_issue_patch().unwrap();
    assert_eq!(patch.keys(), vec!["removed_labels"]);
    let removed: Vec<String> = patch
        .get("removed_labels")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    let mut expected: Vec<String> = labels.iter().map(|l| l.id.clone()).collect();
    expected.sort();
    let mut removed_sorted = removed.clone();
    removed_sorted.sort();
    assert_eq!(removed_sorted, expected);
}

#[test]
fn unknown_status_fails_before_any_mutation_and_keeps_the_buffer() {
    let h = harness();
    let f = seed(&h);
    let issue = h.backend.add_issue(&f.team, &f.todo.id, "Typo incoming");
    warm(&h, &f.team.id);

    let mut file = open_issue(&h, &issue.id);
    let text = String::from_utf8(file.buffer.clone()).unwrap();
    rewrite(&mut file, text.replace("status: Todo", "status: Doen"));

    let err = pipeline::flush(&h.eng, &mut file).unwrap_err();
    assert!(matches!(err, trailfs::error::FsError::Invalid(_)), "{err:?}");
    assert!(file.dirty, "dirty buffer must survive a resolver failure");
    assert!(h.backend.last_issue_patch().is_none(), "nothing may reach the backend");
}

#[test]
fn backend_failure_surfaces_io_and_preserves_the_buffer() {
    let h = harness();
    let f = seed(&h);
    let issue = h.backend.add_issue(&f.team, &f.todo.id, "Unlucky");
    warm(&h, &f.team.id);

    let mut file = open_issue(&h, &issue.id);
    let text = String::from_utf8(file.buffer.clone()).unwrap();
    rewrite(&mut file, text.replace("status: Todo", "status: Done"));

    h.backend.set_offline(true);
    let err = pipeline::flush(&h.eng, &mut file).unwrap_err();
    assert!(matches!(err, trailfs::error::FsError::Io(_)), "{err:?}");
    assert!(file.dirty);

    // Back online, the very same buffer flushes cleanly.
    h.backend.set_offline(false);
    pipeline::flush(&h.eng, &mut file).unwrap();
    assert!(!file.dirty);
}

#[test]
fn scoped_search_constrains_to_the_enclosing_view() {
    let h = harness();
    let f = seed(&h);
    h.backend.add_issue(&f.team, &f.todo.id, "Login error");
    h.backend.add_issue(&f.team, &f.todo.id, "Logout button");
    h.backend.add_issue(&f.team, &f.todo.id, "DB tuning");
    warm(&h, &f.team.id);

    let todo = Node::FilterValueDir {
        team_id: f.team.id.clone(),
        key: "ENG".into(),
        kind: FilterKind::Status,
        value: "Todo".into(),
    };
    let search = tree::lookup(&h.eng, ctx(), &todo, "search").unwrap();
    assert!(tree::readdir(&h.eng, ctx(), &search).unwrap().is_empty());

    let narrow = tree::lookup(&h.eng, ctx(), &search, "log+error").unwrap();
    let hits: Vec<String> =
        tree::readdir(&h.eng, ctx(), &narrow).unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(hits, vec!["ENG-1"]);

    let broad = tree::lookup(&h.eng, ctx(), &search, "log").unwrap();
    let hits: Vec<String> =
        tree::readdir(&h.eng, ctx(), &broad).unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(hits, vec!["ENG-1", "ENG-2"]);

    // Seven `..` segments climb from by/<kind>/<value>/search/<query>.
    let entry = tree::readdir(&h.eng, ctx(), &broad).unwrap().remove(0);
    let Node::Symlink { target } = entry.node else { panic!("expected symlink") };
    assert_eq!(target.matches("../").count(), 7);
    assert!(target.ends_with("teams/ENG/issues/ENG-1"));
}

#[test]
fn comment_trigger_creates_one_new_listing_entry() {
    let h = harness();
    let f = seed(&h);
    let issue = h.backend.add_issue(&f.team, &f.todo.id, "Discussed");
    warm(&h, &f.team.id);

    let comments = Node::CommentsDir { issue_id: issue.id.clone() };
    let before = tree::readdir(&h.eng, ctx(), &comments).unwrap().len();

    let mut file =
        OpenFile::new(Node::Trigger(TriggerKind::Comment { issue_id: issue.id.clone() }));
    file.write_at(0, b"LGTM\n");
    pipeline::flush(&h.eng, &mut file).unwrap();
    assert!(file.created);

    assert_eq!(h.backend.comment_count(&issue.id), 1);
    let after = tree::readdir(&h.eng, ctx(), &comments).unwrap();
    assert_eq!(after.len(), before + 1);
    let name_pattern = regex::Regex::new(r"^1-\d{4}-\d{2}-\d{2}T\d{2}-\d{2}\.md$").unwrap();
    assert!(name_pattern.is_match(&after[0].name), "comment name {}", after[0].name);

    // A second flush of the same handle is a no-op.
    file.dirty = true;
    pipeline::flush(&h.eng, &mut file).unwrap();
    assert_eq!(h.backend.comment_count(&issue.id), 1);
}

#[test]
fn relation_trigger_validates_type_and_target() {
    let h = harness();
    let f = seed(&h);
    let issue = h.backend.add_issue(&f.team, &f.todo.id, "Source");
    let target = h.backend.add_issue(&f.team, &f.todo.id, "Target");
    warm(&h, &f.team.id);

    let trigger = Node::Trigger(TriggerKind::Relation { issue_id: issue.id.clone() });

    let mut bad_type = OpenFile::new(trigger.clone());
    bad_type.write_at(0, b"entangles ENG-2\n");
    assert!(matches!(
        pipeline::flush(&h.eng, &mut bad_type).unwrap_err(),
        trailfs::error::FsError::Invalid(_)
    ));

    let mut missing = OpenFile::new(trigger.clone());
    missing.write_at(0, b"blocks ENG-404\n");
    assert!(matches!(
        pipeline::flush(&h.eng, &mut missing).unwrap_err(),
        trailfs::error::FsError::NotFound
    ));

    let mut good = OpenFile::new(trigger);
    good.write_at(0, format!("blocks {}\n", target.identifier).as_bytes());
    pipeline::flush(&h.eng, &mut good).unwrap();

    let relations = Node::RelationsDir { issue_id: issue.id.clone() };
    let entries = tree::readdir(&h.eng, ctx(), &relations).unwrap();
    assert_eq!(entries[0].name, format!("blocks-{}.rel", target.identifier));
}

#[test]
fn trigger_reads_are_denied() {
    let h = harness();
    let f = seed(&h);
    let issue = h.backend.add_issue(&f.team, &f.todo.id, "Quiet");
    warm(&h, &f.team.id);

    let trigger = Node::Trigger(TriggerKind::Comment { issue_id: issue.id });
    let err = content::read_node(&h.eng, ctx(), &trigger).unwrap_err();
    assert!(matches!(err, trailfs::error::FsError::Denied));
}
