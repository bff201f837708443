//! Background refresher: keeps the hot views warm between user reads.
//!
//! A single tokio task wakes on an interval and refetches teams, users,
//! initiatives, and every team's issue view. Failures are logged and
//! retried on the next tick; the task stops when its cancellation token
//! fires at unmount.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::OpCtx;
use crate::repo::Repository;

pub struct Refresher {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Refresher {
    pub fn spawn(rt: &tokio::runtime::Handle, repo: Arc<Repository>, period: Duration) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = rt.spawn(async move {
            run(repo, task_token, period).await;
        });
        Self { token, handle }
    }

    /// Signal the task to stop; it exits at the next select point.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn abort(self) {
        self.token.cancel();
        self.handle.abort();
    }
}

async fn run(repo: Arc<Repository>, token: CancellationToken, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The immediate first tick warms the cache right after mount.
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("refresher stopped");
                return;
            }
            _ = ticker.tick() => {
                refresh_once(&repo).await;
            }
        }
    }
}

async fn refresh_once(repo: &Repository) {
    let ctx = OpCtx::read();
    if let Err(e) = repo.refresh_teams(ctx).await {
        warn!("refresh teams failed: {e}");
        return;
    }
    if let Err(e) = repo.refresh_users(ctx).await {
        warn!("refresh users failed: {e}");
    }
    if let Err(e) = repo.refresh_initiatives(ctx).await {
        warn!("refresh initiatives failed: {e}");
    }

    let teams = match repo.cache().teams() {
        Ok(teams) => teams,
        Err(e) => {
            warn!("refresh cannot list teams: {e}");
            return;
        }
    };
    for team in teams {
        let ctx = OpCtx::read();
        if let Err(e) = repo.refresh_team_issues(ctx, &team.id).await {
            warn!(team = %team.key, "refresh issues failed: {e}");
        } else {
            debug!(team = %team.key, "issues refreshed");
        }
    }
}
