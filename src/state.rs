//! Application state shared by the web handlers and CLI commands.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Config;
use crate::data::faculty::{Faculty, FacultyTables};
use crate::data::service::DataService;
use crate::view::RankingViewState;

/// How often idle ranking views are swept.
const VIEW_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct TrackedView {
    view: Arc<RankingViewState>,
    touched: Instant,
}

#[derive(Clone)]
pub struct AppState {
    pub data: Arc<dyn DataService>,
    pub config: Arc<Config>,
    /// Ranking view state per user id.
    views: Arc<DashMap<String, TrackedView>>,
}

impl AppState {
    pub fn new(data: Arc<dyn DataService>, config: Config) -> Self {
        Self {
            data,
            config: Arc::new(config),
            views: Arc::new(DashMap::new()),
        }
    }

    pub fn tables(&self, faculty: Faculty) -> FacultyTables {
        FacultyTables::resolve(faculty, self.config.schema_layout)
    }

    /// The caller's ranking view state, created on first use.
    pub fn view_for(&self, user_id: &str) -> Arc<RankingViewState> {
        let mut entry = self
            .views
            .entry(user_id.to_owned())
            .or_insert_with(|| TrackedView {
                view: Arc::new(RankingViewState::new()),
                touched: Instant::now(),
            });
        entry.touched = Instant::now();
        entry.view.clone()
    }

    /// Existing view state, without creating one.
    pub fn existing_view(&self, user_id: &str) -> Option<Arc<RankingViewState>> {
        self.views.get(user_id).map(|entry| entry.view.clone())
    }

    pub fn tracked_views(&self) -> usize {
        self.views.len()
    }

    /// Drop views untouched for `idle` that no request holds or is loading.
    /// Returns how many were removed.
    pub fn prune_views(&self, idle: Duration) -> usize {
        let before = self.views.len();
        self.views.retain(|_, tracked| {
            Arc::strong_count(&tracked.view) > 1
                || tracked.view.is_loading()
                || tracked.touched.elapsed() < idle
        });
        before.saturating_sub(self.views.len())
    }

    /// Periodically prune idle views until `token` is cancelled.
    pub async fn sweep_views(self, idle: Duration, token: CancellationToken) {
        let mut interval = tokio::time::interval(VIEW_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = interval.tick() => {
                    let removed = self.prune_views(idle);
                    if removed > 0 {
                        debug!(removed, remaining = self.views.len(), "pruned idle ranking views");
                    }
                }
            }
        }
    }
}
