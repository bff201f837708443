//! Shared harness: a full engine over the in-memory fake backend and a
//! scratch SQLite cache.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use trailfs::api::fake::FakeBackend;
use trailfs::api::{Backend, OpCtx};
use trailfs::blobcache::BlobCache;
use trailfs::db::Cache;
use trailfs::fs::Engine;
use trailfs::fs::invalidate::Invalidator;
use trailfs::model::{State, StateType, Team, User};
use trailfs::repo::Repository;

pub struct Harness {
    // Keeps the block_on bridge alive for the engine's lifetime.
    pub rt: tokio::runtime::Runtime,
    pub backend: Arc<FakeBackend>,
    pub eng: Arc<Engine>,
    _scratch: TempDir,
}

pub fn harness() -> Harness {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("runtime");
    let scratch = tempfile::tempdir().expect("tempdir");
    let cache = Arc::new(Cache::open_in_memory().expect("cache"));
    let backend = Arc::new(FakeBackend::new());
    let repo = Arc::new(Repository::new(
        cache,
        backend.clone() as Arc<dyn Backend>,
        rt.handle().clone(),
        Duration::from_secs(300),
    ));
    let eng = Arc::new(Engine {
        repo,
        blobs: BlobCache::new(scratch.path().join("blobs"), 16),
        invalidator: Invalidator::new(),
        uid: 1000,
        gid: 1000,
        initiatives: true,
    });
    Harness { rt, backend, eng, _scratch: scratch }
}

pub struct Fixture {
    pub team: Team,
    pub todo: State,
    pub in_progress: State,
    pub done: State,
    pub viewer: User,
    pub jane: User,
}

/// One team with the usual workflow, two users, two labels.
pub fn seed(h: &Harness) -> Fixture {
    let team = h.backend.add_team("ENG", "Engineering");
    let todo = h.backend.add_state(&team.id, "Todo", StateType::Unstarted);
    let in_progress = h.backend.add_state(&team.id, "In Progress", StateType::Started);
    let done = h.backend.add_state(&team.id, "Done", StateType::Completed);
    h.backend.add_label(&team.id, "Bug", "#d73a4a");
    h.backend.add_label(&team.id, "Backend", "#0366d6");
    let viewer = h.backend.add_user("Me Myself", "me@example.com", "me");
    let jane = h.backend.add_user("Jane Doe", "jane@example.com", "jane");
    h.backend.set_viewer(&viewer.id);
    Fixture { team, todo, in_progress, done, viewer, jane }
}

pub fn ctx() -> OpCtx {
    OpCtx::read()
}

/// Pull the team's issue view once so records exist in the local cache.
pub fn warm(h: &Harness, team_id: &str) {
    h.eng.repo.issues(ctx(), team_id).expect("warm issues");
}
