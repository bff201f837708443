//! Tree shape and traversal: listings, lookups, and symlink targets.

mod common;

use common::{ctx, harness, seed, warm};
use trailfs::fs::node::{FilterKind, Node};
use trailfs::fs::tree;

fn names(entries: &[tree::ChildEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}

#[test]
fn root_listing_has_the_fixed_namespace() {
    let h = harness();
    seed(&h);
    let entries = tree::readdir(&h.eng, ctx(), &Node::Root).unwrap();
    assert_eq!(names(&entries), vec!["README.md", "teams", "users", "my", "initiatives"]);
}

#[test]
fn team_dir_lists_every_surface() {
    let h = harness();
    let f = seed(&h);
    let teams = tree::readdir(&h.eng, ctx(), &Node::TeamsDir).unwrap();
    assert_eq!(names(&teams), vec!["ENG"]);

    let team = tree::lookup(&h.eng, ctx(), &Node::TeamsDir, "ENG").unwrap();
    assert_eq!(team, Node::TeamDir { team_id: f.team.id.clone(), key: "ENG".into() });

    let children = tree::readdir(&h.eng, ctx(), &team).unwrap();
    assert_eq!(
        names(&children),
        vec![
            "team.md", "states.md", "labels.md", "by", "cycles", "projects", "issues", "docs",
            "labels", "search"
        ]
    );
}

#[test]
fn issue_lookup_rejects_non_identifiers_without_io() {
    let h = harness();
    let f = seed(&h);
    let issues = Node::IssuesDir { team_id: f.team.id.clone(), key: "ENG".into() };
    assert!(tree::lookup(&h.eng, ctx(), &issues, "not-an-id").is_err());
    assert!(tree::lookup(&h.eng, ctx(), &issues, "eng-1").is_err());
}

#[test]
fn issue_dir_has_the_static_child_set() {
    let h = harness();
    let f = seed(&h);
    let issue = h.backend.add_issue(&f.team, &f.todo.id, "Login error");
    warm(&h, &f.team.id);

    let issues = Node::IssuesDir { team_id: f.team.id.clone(), key: "ENG".into() };
    let dir = tree::lookup(&h.eng, ctx(), &issues, &issue.identifier).unwrap();
    let children = tree::readdir(&h.eng, ctx(), &dir).unwrap();
    assert_eq!(
        names(&children),
        vec!["issue.md", "comments", "docs", "children", "attachments", "relations"]
    );
}

#[test]
fn filter_symlinks_resolve_back_to_the_issue_dir() {
    let h = harness();
    let f = seed(&h);
    let issue = h.backend.add_issue(&f.team, &f.todo.id, "Login error");
    warm(&h, &f.team.id);

    let value_dir = Node::FilterValueDir {
        team_id: f.team.id.clone(),
        key: "ENG".into(),
        kind: FilterKind::Status,
        value: "Todo".into(),
    };
    let entries = tree::readdir(&h.eng, ctx(), &value_dir).unwrap();
    let link = entries.iter().find(|e| e.name == issue.identifier).expect("symlink listed");
    let Node::Symlink { target } = &link.node else { panic!("expected symlink") };

    // Resolving the target from the symlink's own directory must land on
    // the canonical issue directory.
    let resolved = resolve("teams/ENG/by/status/Todo", target);
    assert_eq!(resolved, format!("teams/ENG/issues/{}", issue.identifier));
}

#[test]
fn cycle_current_appears_only_with_an_active_cycle() {
    let h = harness();
    let f = seed(&h);
    let now = chrono::Utc::now();
    h.backend.add_cycle(
        &f.team.id,
        11,
        Some("Sprint 11"),
        now - chrono::Duration::days(21),
        now - chrono::Duration::days(7),
    );
    let active = h.backend.add_cycle(
        &f.team.id,
        12,
        Some("Sprint 12"),
        now - chrono::Duration::days(7),
        now + chrono::Duration::days(7),
    );

    let cycles = Node::CyclesDir { team_id: f.team.id.clone(), key: "ENG".into() };
    let entries = tree::readdir(&h.eng, ctx(), &cycles).unwrap();
    assert_eq!(names(&entries), vec!["Sprint-11", "Sprint-12", "current"]);

    let current = entries.iter().find(|e| e.name == "current").unwrap();
    assert_eq!(current.node, Node::Symlink { target: "Sprint-12".into() });

    let cycle_dir = tree::lookup(&h.eng, ctx(), &cycles, "Sprint-12").unwrap();
    assert_eq!(
        cycle_dir,
        Node::CycleDir { cycle_id: active.id, team_id: f.team.id.clone(), key: "ENG".into() }
    );
}

#[test]
fn user_dirs_list_profile_and_assigned_issues() {
    let h = harness();
    let f = seed(&h);
    let mut issue = h.backend.add_issue(&f.team, &f.todo.id, "Assigned one");
    issue.assignee_id = Some(f.jane.id.clone());
    h.backend.put_issue(issue.clone());

    let users = tree::readdir(&h.eng, ctx(), &Node::UsersDir).unwrap();
    assert!(names(&users).contains(&"jane"));

    let jane = tree::lookup(&h.eng, ctx(), &Node::UsersDir, "jane").unwrap();
    let entries = tree::readdir(&h.eng, ctx(), &jane).unwrap();
    assert_eq!(entries[0].name, ".user.md");
    let link = entries.iter().find(|e| e.name == issue.identifier).expect("issue link");
    let Node::Symlink { target } = &link.node else { panic!("expected symlink") };
    assert_eq!(resolve("users/jane", target), format!("teams/ENG/issues/{}", issue.identifier));
}

#[test]
fn initiative_projects_are_symlinks_into_team_trees() {
    let h = harness();
    let f = seed(&h);
    let project = h.backend.add_project(&f.team.id, "Storage", "storage");
    let initiative = h.backend.add_initiative("Platform Rework", "platform-rework");
    h.backend.link_initiative_project(&initiative.id, &project.id);

    let dirs = tree::readdir(&h.eng, ctx(), &Node::InitiativesDir).unwrap();
    assert_eq!(names(&dirs), vec!["platform-rework"]);

    let projects_dir = Node::InitiativeProjectsDir { initiative_id: initiative.id.clone() };
    let entries = tree::readdir(&h.eng, ctx(), &projects_dir).unwrap();
    assert_eq!(entries.len(), 1);
    let Node::Symlink { target } = &entries[0].node else { panic!("expected symlink") };
    assert_eq!(
        resolve("initiatives/platform-rework/projects", target),
        "teams/ENG/projects/storage"
    );
}

/// POSIX-style resolution of `target` relative to directory `dir`, with
/// both expressed relative to the mount root.
fn resolve(dir: &str, target: &str) -> String {
    let mut parts: Vec<&str> = dir.split('/').filter(|p| !p.is_empty()).collect();
    for piece in target.split('/') {
        match piece {
            ".." => {
                parts.pop();
            }
            "" | "." => {}
            other => parts.push(other),
        }
    }
    parts.join("/")
}
