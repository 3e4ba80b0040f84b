//! Live views over a store subscription.
//!
//! A [`LiveView`] owns one subscription and recomputes its projection on
//! every snapshot. The list screen uses a view of [`Section`]s, the map
//! screen an independent view of [`Marker`]s.

use std::fmt;

use tracing::{debug, error};

use crate::error::Result;
use crate::markers::{project_markers, Marker};
use crate::sections::{filter_sections, group_into_sections, Section};
use crate::store::{RemoteStore, Snapshot, Subscription, SubscriptionHandle};

/// What a view currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState<T> {
    /// No snapshot has arrived yet.
    Loading,
    /// Data from the latest snapshot (empty after a subscription error).
    Ready(T),
}

impl<T> ViewState<T> {
    /// The data, if ready.
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Loading => None,
            Self::Ready(data) => Some(data),
        }
    }

    /// Whether the view is still waiting for its first snapshot.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// A projection kept up to date from a live subscription.
pub struct LiveView<T> {
    subscription: Subscription,
    project: fn(&Snapshot) -> T,
    state: ViewState<T>,
}

/// The list screen's view.
pub type SectionView = LiveView<Vec<Section>>;

/// The map screen's view.
pub type MarkerView = LiveView<Vec<Marker>>;

impl<T: fmt::Debug> fmt::Debug for LiveView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveView")
            .field("subscription", &self.subscription)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<T: Default> LiveView<T> {
    /// Subscribe to `path` and project every snapshot with `project`.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be opened.
    pub async fn open(
        store: &dyn RemoteStore,
        path: &str,
        project: fn(&Snapshot) -> T,
    ) -> Result<Self> {
        let subscription = store.subscribe(path).await?;
        debug!(path, backend = store.name(), "Opened live view");
        Ok(Self::from_subscription(subscription, project))
    }

    /// Wrap an existing subscription.
    #[must_use]
    pub fn from_subscription(subscription: Subscription, project: fn(&Snapshot) -> T) -> Self {
        Self {
            subscription,
            project,
            state: ViewState::Loading,
        }
    }

    /// Wait for the next snapshot and update the state.
    ///
    /// A subscription error is logged and leaves the view ready with empty
    /// data. Returns `None` once the subscription has ended or been
    /// cancelled; the last state is kept.
    pub async fn next_update(&mut self) -> Option<&ViewState<T>> {
        let event = self.subscription.next().await?;
        self.state = match event {
            Ok(snapshot) => ViewState::Ready((self.project)(&snapshot)),
            Err(e) => {
                error!(path = %self.subscription.path(), error = %e, "Subscription failed");
                ViewState::Ready(T::default())
            }
        };
        Some(&self.state)
    }
}

impl<T> LiveView<T> {
    /// Current state.
    pub fn state(&self) -> &ViewState<T> {
        &self.state
    }

    /// A handle that can close this view from another task.
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.subscription.handle()
    }

    /// Stop receiving updates.
    pub fn close(self) {
        self.subscription.unsubscribe();
    }
}

impl SectionView {
    /// Open the list screen's view of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be opened.
    pub async fn sections(store: &dyn RemoteStore, path: &str) -> Result<Self> {
        Self::open(store, path, group_into_sections).await
    }

    /// Current sections filtered by `query`; empty while loading.
    #[must_use]
    pub fn filtered(&self, query: &str) -> Vec<Section> {
        self.state
            .data()
            .map(|sections| filter_sections(sections, query))
            .unwrap_or_default()
    }
}

impl MarkerView {
    /// Open the map screen's view of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be opened.
    pub async fn markers(store: &dyn RemoteStore, path: &str) -> Result<Self> {
        Self::open(store, path, project_markers).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::{fields, RecordingStore};
    use crate::store::{SqliteStore, StoreError};

    #[tokio::test]
    async fn test_section_view_updates_on_writes() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .append("points", &fields("Gedung Sate", Some("Jelajah Wisata"), None))
            .await
            .unwrap();

        let mut view = SectionView::sections(&store, "points").await.unwrap();
        assert!(view.state().is_loading());

        let state = view.next_update().await.unwrap();
        assert_eq!(state.data().unwrap().len(), 1);

        store
            .append("points", &fields("Warung", Some("Kuliner & Nugas"), None))
            .await
            .unwrap();
        let sections = view.next_update().await.unwrap().data().unwrap();
        let titles: Vec<_> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Jelajah Wisata", "Kuliner & Nugas"]);

        assert_eq!(view.filtered("warung").len(), 1);
    }

    #[tokio::test]
    async fn test_filtered_is_empty_while_loading() {
        let store = SqliteStore::open_in_memory().unwrap();
        let view = SectionView::sections(&store, "points").await.unwrap();
        assert!(view.filtered("").is_empty());
    }

    #[tokio::test]
    async fn test_marker_view_is_independent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .append("points", &fields("A", None, Some("-6.9,107.6")))
            .await
            .unwrap();

        let mut list = SectionView::sections(&store, "points").await.unwrap();
        let mut map = MarkerView::markers(&store, "points").await.unwrap();
        list.next_update().await.unwrap();
        map.next_update().await.unwrap();

        list.close();
        store
            .append("points", &fields("B", None, Some("bad")))
            .await
            .unwrap();

        let markers = map.next_update().await.unwrap().data().unwrap();
        assert_eq!(markers.len(), 1);
        assert_eq!(store.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_error_makes_view_ready_and_empty() {
        crate::logging::init_test_logging();
        let (sender, subscription) = Subscription::channel("points");
        let mut view = LiveView::from_subscription(subscription, group_into_sections);

        sender.send(Err(StoreError::stream("connection lost")));
        let state = view.next_update().await.unwrap();
        assert_eq!(state, &ViewState::Ready(Vec::new()));
    }

    #[tokio::test]
    async fn test_no_updates_after_close_handle() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut view = SectionView::sections(&store, "points").await.unwrap();
        view.next_update().await.unwrap();

        view.handle().cancel();
        store
            .append("points", &fields("Late", None, None))
            .await
            .unwrap();
        assert!(view.next_update().await.is_none());
        assert_eq!(view.state().data().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_open_fails_when_store_fails() {
        let store = RecordingStore::new();
        store.fail_subscribe(true);
        let result = SectionView::sections(&store, "points").await;
        assert!(result.unwrap_err().is_store_error());
        assert_eq!(store.subscribe_calls(), 1);
    }
}
