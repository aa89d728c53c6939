//! Per-user ranking view state.
//!
//! Each refresh takes a [`LoadTicket`] carrying a generation number. Only the
//! ticket of the most recent refresh may commit its result, so a slow response
//! to an old request can never overwrite a newer one. Dropping the latest
//! ticket (success, failure or cancellation) always returns the state to
//! [`LoadState::Idle`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use ts_rs::TS;

use crate::data::ranking::RankingView;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
}

#[derive(Debug, Default)]
struct Inner {
    load: LoadState,
    view: RankingView,
    committed: u64,
}

/// Copy of the view state for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ViewSnapshot {
    pub load_state: LoadState,
    /// Generation of the committed view; 0 before the first commit.
    #[ts(type = "number")]
    pub generation: u64,
    pub view: RankingView,
}

#[derive(Debug, Default)]
pub struct RankingViewState {
    latest: AtomicU64,
    inner: Mutex<Inner>,
}

impl RankingViewState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every critical section leaves `Inner` consistent, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a refresh: issue a new generation and enter `Loading`.
    pub fn begin(&self) -> LoadTicket<'_> {
        let mut inner = self.lock();
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        inner.load = LoadState::Loading;
        LoadTicket {
            state: self,
            generation,
        }
    }

    pub fn latest_generation(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn load_state(&self) -> LoadState {
        self.lock().load
    }

    pub fn is_loading(&self) -> bool {
        self.load_state() == LoadState::Loading
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let inner = self.lock();
        ViewSnapshot {
            load_state: inner.load,
            generation: inner.committed,
            view: inner.view.clone(),
        }
    }

    /// Run `load` under a fresh ticket and commit its result if no newer
    /// refresh started meanwhile. Returns the view the caller produced and
    /// whether it was committed.
    pub async fn refresh<F>(&self, load: F) -> (RankingView, bool)
    where
        F: Future<Output = RankingView>,
    {
        let ticket = self.begin();
        let view = load.await;
        let committed = ticket.commit(view.clone());
        (view, committed)
    }
}

/// Right to commit one refresh result. See the module docs.
#[must_use = "dropping a ticket discards its refresh"]
pub struct LoadTicket<'a> {
    state: &'a RankingViewState,
    generation: u64,
}

impl LoadTicket<'_> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.state.latest_generation() == self.generation
    }

    /// Store `view` if this is still the latest refresh. Stale results are discarded.
    pub fn commit(self, view: RankingView) -> bool {
        let mut inner = self.state.lock();
        if !self.is_current() {
            tracing::debug!(
                generation = self.generation,
                latest = self.state.latest_generation(),
                "Discarding stale ranking result"
            );
            return false;
        }
        inner.view = view;
        inner.committed = self.generation;
        // load state is reset when `self` drops
        true
    }
}

impl Drop for LoadTicket<'_> {
    fn drop(&mut self) {
        let mut inner = self.state.lock();
        if self.is_current() {
            inner.load = LoadState::Idle;
        }
    }
}
