//! Query Cache Coordinator
//!
//! Caches query results by [`QueryKey`] and runs mutations. A successful
//! mutation marks the entries named by its invalidation policy stale and
//! refetches, in the background, those that have a mounted observer.
//!
//! Entries are type-erased so one coordinator holds every query kind. Each
//! entry publishes its state through a `watch` channel; observers are
//! receivers of that channel.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{RwLock, watch};

use super::invalidation::Mutation;
use super::key::{QueryFilter, QueryKey};
use super::pagination::{Identified, InfiniteData, NextPage, Page};
use crate::config::CacheConfig;
use crate::error::{AppError, ErrorKind};

type CachedValue = Arc<dyn Any + Send + Sync>;

/// Produces a new value for an entry from its previous value
type Fetcher = Arc<
    dyn Fn(Option<CachedValue>) -> BoxFuture<'static, Result<CachedValue, AppError>> + Send + Sync,
>;

/// Last failure of a query, kept on the entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AppError> for QueryError {
    fn from(error: &AppError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// What an observer sees
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    /// Fetching with no data yet
    pub is_loading: bool,
    pub is_fetching: bool,
    pub is_error: bool,
    pub is_stale: bool,
    pub error: Option<QueryError>,
}

#[derive(Clone, Default)]
struct Snapshot {
    data: Option<CachedValue>,
    /// Fetches started and not yet stored
    in_flight: usize,
    is_stale: bool,
    error: Option<QueryError>,
}

impl Snapshot {
    fn view<T: Clone + 'static>(&self) -> QueryState<T> {
        let data = self
            .data
            .as_ref()
            .and_then(|value| (**value).downcast_ref::<T>().cloned());
        QueryState {
            is_loading: self.in_flight > 0 && data.is_none(),
            data,
            is_fetching: self.in_flight > 0,
            is_error: self.error.is_some(),
            is_stale: self.is_stale,
            error: self.error.clone(),
        }
    }
}

/// Cached query result
struct Entry {
    state: watch::Sender<Snapshot>,
    /// When data was last stored
    updated_at: Option<Instant>,
    /// Bumped on every invalidation
    generation: u64,
    /// Last fetcher registered for this key
    fetcher: Option<Fetcher>,
}

impl Entry {
    fn new() -> Self {
        let (state, _) = watch::channel(Snapshot::default());
        Self {
            state,
            updated_at: None,
            generation: 0,
            fetcher: None,
        }
    }

    fn is_fresh(&self, stale_time: Duration) -> bool {
        let state = self.state.borrow();
        if state.data.is_none() || state.is_stale {
            return false;
        }
        stale_time.is_zero()
            || self
                .updated_at
                .is_some_and(|at| at.elapsed() < stale_time)
    }

    fn is_observed(&self) -> bool {
        self.state.receiver_count() > 0
    }
}

struct Inner {
    entries: RwLock<HashMap<QueryKey, Entry>>,
    stale_time: Duration,
}

/// Query cache shared by every binding
///
/// Cheap to clone; clones share one cache.
#[derive(Clone)]
pub struct QueryCoordinator {
    inner: Arc<Inner>,
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub stale_entries: usize,
    /// Entries with at least one mounted observer
    pub observed_entries: usize,
}

impl QueryCoordinator {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                stale_time: Duration::from_secs(config.stale_time_seconds),
            }),
        }
    }

    /// Cached value if fresh, otherwise fetch and store it
    ///
    /// A failed fetch is recorded on the entry; previous data is kept.
    pub async fn run_query<T, F, Fut>(&self, key: QueryKey, fetch: F) -> Result<T, AppError>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let fetcher = erase(fetch);
        self.register(&key, fetcher.clone()).await;

        if let Some(value) = self.fresh_value(&key).await {
            crate::metrics::CACHE_HITS_TOTAL
                .with_label_values(&[key.kind.as_str()])
                .inc();
            tracing::debug!(query = %key, "Query cache hit");
            return downcast(&key, &value);
        }

        crate::metrics::CACHE_MISSES_TOTAL
            .with_label_values(&[key.kind.as_str()])
            .inc();
        tracing::debug!(query = %key, "Query cache miss");
        let value = self.execute(&key, fetcher).await?;
        downcast(&key, &value)
    }

    /// Run a mutation and apply its invalidation policy on success
    ///
    /// `subject` picks the ID of the changed entity from the result. Nothing
    /// is invalidated when the mutation fails.
    pub async fn run_mutation<T, S, Fut>(
        &self,
        mutation: Mutation,
        subject: S,
        operation: Fut,
    ) -> Result<T, AppError>
    where
        S: FnOnce(&T) -> Option<String>,
        Fut: Future<Output = Result<T, AppError>>,
    {
        use crate::metrics::{INVALIDATIONS_TOTAL, MUTATIONS_TOTAL};

        let result = operation.await;
        match &result {
            Ok(value) => {
                let subject = subject(value);
                let filters = mutation.filters(subject.as_deref());
                let invalidated = self.invalidate(&filters).await;

                MUTATIONS_TOTAL
                    .with_label_values(&[mutation.as_str(), "ok"])
                    .inc();
                INVALIDATIONS_TOTAL
                    .with_label_values(&[mutation.as_str()])
                    .inc_by(invalidated.len() as u64);
                tracing::info!(
                    mutation = mutation.as_str(),
                    subject = subject.as_deref().unwrap_or("-"),
                    invalidated = invalidated.len(),
                    "Mutation succeeded"
                );
            }
            Err(error) => {
                MUTATIONS_TOTAL
                    .with_label_values(&[mutation.as_str(), "error"])
                    .inc();
                error.record(mutation.as_str());
                tracing::warn!(mutation = mutation.as_str(), %error, "Mutation failed");
            }
        }
        result
    }

    /// Mark matching entries stale
    ///
    /// Entries with a mounted observer are refetched in the background.
    /// Returns the keys that were marked.
    pub async fn invalidate(&self, filters: &[QueryFilter]) -> Vec<QueryKey> {
        let mut marked = Vec::new();
        let mut refetch = Vec::new();
        {
            let mut entries = self.inner.entries.write().await;
            for (key, entry) in entries.iter_mut() {
                if !filters.iter().any(|filter| filter.matches(key)) {
                    continue;
                }
                entry.generation += 1;
                let observed_fetcher = entry.fetcher.clone().filter(|_| entry.is_observed());
                entry.state.send_modify(|state| {
                    state.is_stale = true;
                    if observed_fetcher.is_some() {
                        state.in_flight += 1;
                    }
                });
                marked.push(key.clone());

                if let Some(fetcher) = observed_fetcher {
                    refetch.push((key.clone(), fetcher));
                }
            }
        }

        for (key, fetcher) in refetch {
            let coordinator = self.clone();
            tokio::spawn(async move {
                if let Err(error) = coordinator.execute_claimed(&key, fetcher).await {
                    tracing::warn!(query = %key, %error, "Background refetch failed");
                }
            });
        }

        marked.sort();
        marked
    }

    /// Mount an observer on a query
    ///
    /// Starts a background fetch when the entry is empty or stale.
    pub async fn observe<T, F, Fut>(&self, key: QueryKey, fetch: F) -> QueryObserver<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        self.observe_with(key, erase(fetch)).await
    }

    /// First page of an infinite query, or the cached pages if fresh
    ///
    /// A stale entry refetches as many pages as were loaded, in order,
    /// stopping early at the end of the feed.
    pub async fn run_infinite_query<T, F, Fut>(
        &self,
        key: QueryKey,
        fetch_page: F,
    ) -> Result<InfiniteData<T>, AppError>
    where
        T: Identified + Clone + Send + Sync + 'static,
        F: Fn(Option<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Page<T>, AppError>> + Send + 'static,
    {
        self.infinite(key, Arc::new(fetch_page)).await
    }

    /// Append the page after the last loaded one
    ///
    /// Returns the data unchanged once the feed has ended.
    pub async fn fetch_next_page<T, F, Fut>(
        &self,
        key: QueryKey,
        fetch_page: F,
    ) -> Result<InfiniteData<T>, AppError>
    where
        T: Identified + Clone + Send + Sync + 'static,
        F: Fn(Option<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Page<T>, AppError>> + Send + 'static,
    {
        let fetch_page = Arc::new(fetch_page);
        let data = self.infinite(key.clone(), fetch_page.clone()).await?;
        if data.next_page() == NextPage::End {
            tracing::debug!(query = %key, pages = data.pages.len(), "No further pages");
            return Ok(data);
        }

        let append: Fetcher = Arc::new(move |previous: Option<CachedValue>| {
            let fetch_page = fetch_page.clone();
            async move {
                let mut data = previous
                    .and_then(|value| (*value).downcast_ref::<InfiniteData<T>>().cloned())
                    .unwrap_or_default();
                if let NextPage::After(cursor) = data.next_page() {
                    let page = fetch_page(Some(cursor.clone())).await?;
                    data.push(Some(cursor), page);
                }
                Ok(Arc::new(data) as CachedValue)
            }
            .boxed()
        });

        let value = self.execute(&key, append).await?;
        downcast(&key, &value)
    }

    /// Mount an observer on an infinite query
    pub async fn observe_infinite<T, F, Fut>(
        &self,
        key: QueryKey,
        fetch_page: F,
    ) -> QueryObserver<InfiniteData<T>>
    where
        T: Identified + Clone + Send + Sync + 'static,
        F: Fn(Option<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Page<T>, AppError>> + Send + 'static,
    {
        self.observe_with(key, erase_pages(Arc::new(fetch_page)))
            .await
    }

    /// Cached data regardless of staleness
    pub async fn get_query_data<T: Clone + 'static>(&self, key: &QueryKey) -> Option<T> {
        let entries = self.inner.entries.read().await;
        let entry = entries.get(key)?;
        let state = entry.state.borrow();
        state
            .data
            .as_ref()
            .and_then(|value| (**value).downcast_ref::<T>().cloned())
    }

    /// Whether a cached entry is marked stale; false when not cached
    pub async fn is_stale(&self, key: &QueryKey) -> bool {
        let entries = self.inner.entries.read().await;
        entries
            .get(key)
            .is_some_and(|entry| entry.state.borrow().is_stale)
    }

    /// Refetch a query with its registered fetcher
    pub async fn refetch<T: Clone + 'static>(&self, key: &QueryKey) -> Result<T, AppError> {
        let fetcher = {
            let entries = self.inner.entries.read().await;
            entries.get(key).and_then(|entry| entry.fetcher.clone())
        };
        let fetcher =
            fetcher.ok_or_else(|| AppError::missing(format!("no fetcher registered for {}", key)))?;
        let value = self.execute(key, fetcher).await?;
        downcast(key, &value)
    }

    /// Drop all cached data
    ///
    /// Observed entries stay mounted with empty state.
    pub async fn clear(&self) {
        let mut entries = self.inner.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_observed());
        for entry in entries.values_mut() {
            entry.updated_at = None;
            entry.generation += 1;
            let in_flight = entry.state.borrow().in_flight;
            entry.state.send_replace(Snapshot {
                in_flight,
                ..Snapshot::default()
            });
        }
        crate::metrics::CACHE_ENTRIES.sub((before - entries.len()) as i64);
        tracing::debug!(removed = before - entries.len(), "Cleared query cache");
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.inner.entries.read().await;
        CacheStats {
            total_entries: entries.len(),
            stale_entries: entries
                .values()
                .filter(|entry| entry.state.borrow().is_stale)
                .count(),
            observed_entries: entries.values().filter(|entry| entry.is_observed()).count(),
        }
    }

    async fn infinite<T, F, Fut>(
        &self,
        key: QueryKey,
        fetch_page: Arc<F>,
    ) -> Result<InfiniteData<T>, AppError>
    where
        T: Identified + Clone + Send + Sync + 'static,
        F: Fn(Option<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Page<T>, AppError>> + Send + 'static,
    {
        let fetcher = erase_pages(fetch_page);
        self.register(&key, fetcher.clone()).await;

        if let Some(value) = self.fresh_value(&key).await {
            crate::metrics::CACHE_HITS_TOTAL
                .with_label_values(&[key.kind.as_str()])
                .inc();
            return downcast(&key, &value);
        }

        crate::metrics::CACHE_MISSES_TOTAL
            .with_label_values(&[key.kind.as_str()])
            .inc();
        let value = self.execute(&key, fetcher).await?;
        downcast(&key, &value)
    }

    async fn observe_with<T>(&self, key: QueryKey, fetcher: Fetcher) -> QueryObserver<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let (receiver, needs_fetch) = {
            let mut entries = self.inner.entries.write().await;
            let entry = slot(&mut entries, &key);
            entry.fetcher = Some(fetcher.clone());

            let needs_fetch =
                !entry.is_fresh(self.inner.stale_time) && entry.state.borrow().in_flight == 0;
            if needs_fetch {
                entry.state.send_modify(|state| state.in_flight += 1);
            }
            (entry.state.subscribe(), needs_fetch)
        };

        if needs_fetch {
            let coordinator = self.clone();
            let key = key.clone();
            tokio::spawn(async move {
                if let Err(error) = coordinator.execute_claimed(&key, fetcher).await {
                    tracing::warn!(query = %key, %error, "Observer fetch failed");
                }
            });
        }

        tracing::debug!(query = %key, "Observer mounted");
        QueryObserver {
            key,
            coordinator: self.clone(),
            receiver,
            _marker: PhantomData,
        }
    }

    async fn register(&self, key: &QueryKey, fetcher: Fetcher) {
        let mut entries = self.inner.entries.write().await;
        slot(&mut entries, key).fetcher = Some(fetcher);
    }

    async fn fresh_value(&self, key: &QueryKey) -> Option<CachedValue> {
        let entries = self.inner.entries.read().await;
        let entry = entries.get(key)?;
        if !entry.is_fresh(self.inner.stale_time) {
            return None;
        }
        entry.state.borrow().data.clone()
    }

    /// Fetch into an entry
    ///
    /// The lock is released while `fetcher` runs. If the entry was
    /// invalidated meanwhile, the stored result stays stale.
    async fn execute(&self, key: &QueryKey, fetcher: Fetcher) -> Result<CachedValue, AppError> {
        {
            let mut entries = self.inner.entries.write().await;
            slot(&mut entries, key)
                .state
                .send_modify(|state| state.in_flight += 1);
        }
        self.execute_claimed(key, fetcher).await
    }

    /// Fetch into an entry whose in-flight count already includes this fetch
    async fn execute_claimed(
        &self,
        key: &QueryKey,
        fetcher: Fetcher,
    ) -> Result<CachedValue, AppError> {
        use crate::metrics::QUERY_FETCHES_TOTAL;

        let (previous, generation) = {
            let mut entries = self.inner.entries.write().await;
            let entry = slot(&mut entries, key);
            let previous = entry.state.borrow().data.clone();
            (previous, entry.generation)
        };

        let result = fetcher(previous).await;

        let mut entries = self.inner.entries.write().await;
        let entry = slot(&mut entries, key);
        match &result {
            Ok(value) => {
                let invalidated = entry.generation != generation;
                entry.updated_at = Some(Instant::now());
                entry.state.send_modify(|state| {
                    state.data = Some(value.clone());
                    state.in_flight = state.in_flight.saturating_sub(1);
                    state.is_stale = invalidated;
                    state.error = None;
                });
                QUERY_FETCHES_TOTAL
                    .with_label_values(&[key.kind.as_str(), "ok"])
                    .inc();
                tracing::debug!(query = %key, invalidated, "Query fetched");
            }
            Err(error) => {
                entry.state.send_modify(|state| {
                    state.in_flight = state.in_flight.saturating_sub(1);
                    state.error = Some(QueryError::from(error));
                });
                QUERY_FETCHES_TOTAL
                    .with_label_values(&[key.kind.as_str(), "error"])
                    .inc();
                error.record(key.kind.as_str());
                tracing::warn!(query = %key, %error, "Query fetch failed");
            }
        }
        result
    }
}

/// A mounted consumer of one query
///
/// Dropping the observer unmounts it.
pub struct QueryObserver<T> {
    key: QueryKey,
    coordinator: QueryCoordinator,
    receiver: watch::Receiver<Snapshot>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Clone + Send + Sync + 'static> QueryObserver<T> {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Current state
    pub fn state(&self) -> QueryState<T> {
        self.receiver.borrow().view()
    }

    /// Wait for the next state change
    pub async fn changed(&mut self) -> Result<QueryState<T>, AppError> {
        self.receiver
            .changed()
            .await
            .map_err(|_| AppError::Internal(anyhow::anyhow!("query cache dropped")))?;
        Ok(self.receiver.borrow_and_update().view())
    }

    /// Wait until the query holds data that is not being refetched
    pub async fn settled(&mut self) -> Result<QueryState<T>, AppError> {
        loop {
            let state = self.receiver.borrow_and_update().view::<T>();
            if !state.is_fetching && (state.data.is_some() || state.is_error) {
                return Ok(state);
            }
            self.receiver
                .changed()
                .await
                .map_err(|_| AppError::Internal(anyhow::anyhow!("query cache dropped")))?;
        }
    }

    /// Refetch now, regardless of freshness
    pub async fn refetch(&self) -> Result<T, AppError> {
        self.coordinator.refetch(&self.key).await
    }
}

fn slot<'a>(entries: &'a mut HashMap<QueryKey, Entry>, key: &QueryKey) -> &'a mut Entry {
    entries.entry(key.clone()).or_insert_with(|| {
        crate::metrics::CACHE_ENTRIES.inc();
        Entry::new()
    })
}

fn downcast<T: Clone + 'static>(key: &QueryKey, value: &CachedValue) -> Result<T, AppError> {
    (**value).downcast_ref::<T>().cloned().ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "cached value for {} has an unexpected type",
            key
        ))
    })
}

fn erase<T, F, Fut>(fetch: F) -> Fetcher
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, AppError>> + Send + 'static,
{
    Arc::new(move |_previous: Option<CachedValue>| {
        let pending = fetch();
        async move { pending.await.map(|value| Arc::new(value) as CachedValue) }.boxed()
    })
}

/// Fetcher that reloads as many pages as the previous value held
fn erase_pages<T, F, Fut>(fetch_page: Arc<F>) -> Fetcher
where
    T: Identified + Clone + Send + Sync + 'static,
    F: Fn(Option<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Page<T>, AppError>> + Send + 'static,
{
    Arc::new(move |previous: Option<CachedValue>| {
        let fetch_page = fetch_page.clone();
        let loaded = previous
            .as_ref()
            .and_then(|value| (**value).downcast_ref::<InfiniteData<T>>())
            .map(|data| data.pages.len())
            .unwrap_or(0)
            .max(1);
        async move {
            let data = load_pages(fetch_page.as_ref(), loaded).await?;
            Ok(Arc::new(data) as CachedValue)
        }
        .boxed()
    })
}

async fn load_pages<T, F, Fut>(fetch_page: &F, count: usize) -> Result<InfiniteData<T>, AppError>
where
    T: Identified,
    F: Fn(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, AppError>>,
{
    let mut data = InfiniteData::default();
    let mut cursor = None;
    for _ in 0..count {
        let page = fetch_page(cursor.clone()).await?;
        data.push(cursor, page);
        cursor = match data.next_page() {
            NextPage::After(next) => Some(next),
            NextPage::End => break,
        };
    }
    Ok(data)
}
