//! Resolver matching policy: exact always beats case-insensitive, and
//! case-insensitive wins before a token is declared unknown.

mod common;

use common::{ctx, harness, seed};
use trailfs::error::FsError;
use trailfs::fs::resolve::Resolver;

#[test]
fn exact_state_match_beats_case_insensitive() {
    let h = harness();
    let f = seed(&h);
    // Two states whose names differ only in case.
    let upper = h.backend.add_state(&f.team.id, "REVIEW", trailfs::model::StateType::Started);
    let lower = h.backend.add_state(&f.team.id, "review", trailfs::model::StateType::Started);

    let resolver = Resolver::new(&h.eng, ctx());
    assert_eq!(resolver.state_id(&f.team.id, "review").unwrap(), lower.id);
    assert_eq!(resolver.state_id(&f.team.id, "REVIEW").unwrap(), upper.id);
    // No exact hit: the case-insensitive match still wins over unknown.
    let ci = resolver.state_id(&f.team.id, "Review").unwrap();
    assert!(ci == upper.id || ci == lower.id);
}

#[test]
fn case_insensitive_wins_before_unknown() {
    let h = harness();
    let f = seed(&h);
    let resolver = Resolver::new(&h.eng, ctx());

    assert_eq!(resolver.state_id(&f.team.id, "todo").unwrap(), f.todo.id);
    let err = resolver.state_id(&f.team.id, "Shipped").unwrap_err();
    match err {
        FsError::Invalid(message) => assert_eq!(message, "unknown status: Shipped"),
        other => panic!("expected invalid argument, got {other:?}"),
    }
}

#[test]
fn user_resolution_prefers_email_then_names() {
    let h = harness();
    let f = seed(&h);
    let resolver = Resolver::new(&h.eng, ctx());

    assert_eq!(resolver.user_id("jane@example.com").unwrap(), f.jane.id);
    assert_eq!(resolver.user_id("JANE@EXAMPLE.COM").unwrap(), f.jane.id);
    assert_eq!(resolver.user_id("Jane Doe").unwrap(), f.jane.id);
    assert_eq!(resolver.user_id("jane").unwrap(), f.jane.id);
    assert!(resolver.user_id("nobody").is_err());
}

#[test]
fn label_resolution_reports_every_unresolved_name() {
    let h = harness();
    let f = seed(&h);
    let resolver = Resolver::new(&h.eng, ctx());

    let err = resolver
        .label_ids(&f.team.id, &["Bug".into(), "Ghost".into(), "Phantom".into()])
        .unwrap_err();
    match err {
        FsError::Invalid(message) => {
            assert!(message.contains("Ghost"));
            assert!(message.contains("Phantom"));
            assert!(!message.contains("Bug"));
        }
        other => panic!("expected invalid argument, got {other:?}"),
    }

    let ids = resolver.label_ids(&f.team.id, &["bug".into(), "BACKEND".into()]).unwrap();
    assert_eq!(ids.len(), 2);
}

#[test]
fn cycles_match_by_name_not_number() {
    let h = harness();
    let f = seed(&h);
    let now = chrono::Utc::now();
    let cycle = h.backend.add_cycle(&f.team.id, 12, Some("Sprint 12"), now, now);

    let resolver = Resolver::new(&h.eng, ctx());
    assert_eq!(resolver.cycle_id(&f.team.id, "Sprint 12").unwrap(), cycle.id);
    assert_eq!(resolver.cycle_id(&f.team.id, "sprint 12").unwrap(), cycle.id);
    assert!(resolver.cycle_id(&f.team.id, "12").is_err());
}
