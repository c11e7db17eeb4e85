//! Cache-first synchronization service shared by every catalog record kind.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{
    CatalogRemoteTrait, CatalogStoreTrait, SessionProvider, SyncError, SyncErrorKind, SyncResult,
};
use crate::catalog::{CatalogRecord, RemoteEnvelope, RemoteRequest};
use crate::errors::Result;

#[async_trait]
pub trait CatalogSyncServiceTrait<R: CatalogRecord>: Send + Sync {
    /// Result stream for the service's scope.
    ///
    /// With `force_refresh` the stream is bounded: `Loading`, then the outcome of
    /// one fetch-and-reconcile. Without it the stream follows the cache for as
    /// long as it is polled: cached data is emitted first, an empty cache
    /// triggers `Loading` and a fetch, and a non-empty first snapshot is
    /// revalidated once in the background.
    fn observe(&self, force_refresh: bool) -> BoxStream<'static, SyncResult<R>>;

    /// One-shot fetch-and-reconcile, for manual pull-to-refresh.
    async fn refresh_now(&self) -> SyncResult<R>;
}

/// Cache-first repository for one record kind (and, for products, one category).
pub struct CatalogSyncService<R: CatalogRecord> {
    inner: Arc<SyncInner<R>>,
}

impl<R: CatalogRecord> Clone for CatalogSyncService<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SyncInner<R: CatalogRecord> {
    filter: Option<String>,
    remote: Arc<dyn CatalogRemoteTrait<R>>,
    store: Arc<dyn CatalogStoreTrait<R>>,
    session: Arc<dyn SessionProvider>,
    // Held across fetch + replace so one scope never has two reconciles in flight.
    reconcile_lock: Mutex<()>,
}

impl<R: CatalogRecord> CatalogSyncService<R> {
    pub fn new(
        remote: Arc<dyn CatalogRemoteTrait<R>>,
        store: Arc<dyn CatalogStoreTrait<R>>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self::scoped(remote, store, session, None)
    }

    /// Service restricted to one cache scope, e.g. the products of one category.
    pub fn scoped(
        remote: Arc<dyn CatalogRemoteTrait<R>>,
        store: Arc<dyn CatalogStoreTrait<R>>,
        session: Arc<dyn SessionProvider>,
        filter: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                filter,
                remote,
                store,
                session,
                reconcile_lock: Mutex::new(()),
            }),
        }
    }

    pub fn filter(&self) -> Option<&str> {
        self.inner.filter.as_deref()
    }

    /// Records currently cached for this scope.
    pub fn cached(&self) -> Result<Vec<R>> {
        self.inner.store.load_all(self.inner.filter.as_deref())
    }
}

#[async_trait]
impl<R: CatalogRecord> CatalogSyncServiceTrait<R> for CatalogSyncService<R> {
    fn observe(&self, force_refresh: bool) -> BoxStream<'static, SyncResult<R>> {
        let inner = Arc::clone(&self.inner);

        if force_refresh {
            return stream::once(async { SyncResult::Loading })
                .chain(stream::once(async move {
                    inner.fetch_and_reconcile(None).await
                }))
                .boxed();
        }

        let cache = inner.store.observe_all(inner.filter.clone());
        let subscription = Subscription {
            inner,
            cache,
            step: Step::ReadCache,
            revalidated: false,
            last_success: None,
        };

        stream::unfold(subscription, |mut subscription| async move {
            let emission = subscription.next_emission().await?;
            Some((emission, subscription))
        })
        .boxed()
    }

    async fn refresh_now(&self) -> SyncResult<R> {
        self.inner.fetch_and_reconcile(None).await
    }
}

impl<R: CatalogRecord> SyncInner<R> {
    fn request(&self, token: String) -> RemoteRequest {
        let request = RemoteRequest::new(token, R::KIND);
        match &self.filter {
            Some(filter) => request.with_filter(filter.clone()),
            None => request,
        }
    }

    /// Fetches, replaces the cache on success, and classifies everything else.
    ///
    /// `cached` is the snapshot the stale-data decision is made against. A live
    /// subscription passes the snapshot it last observed; `None` reads one while
    /// holding the reconcile lock.
    async fn fetch_and_reconcile(&self, cached: Option<Vec<R>>) -> SyncResult<R> {
        let _guard = self.reconcile_lock.lock().await;

        let cached = match cached {
            Some(records) => records,
            None => self
                .store
                .load_all(self.filter.as_deref())
                .unwrap_or_else(|err| {
                    warn!("[CatalogSync] {} cache read failed: {}", R::KIND, err);
                    Vec::new()
                }),
        };

        let Some(token) = self.session.current_token() else {
            debug!("[CatalogSync] {} fetch skipped: no session", R::KIND);
            return SyncResult::Error(SyncError::no_session());
        };

        let envelope = self.remote.fetch(self.request(token)).await;
        self.reconcile(envelope, cached).await
    }

    /// Places every record in this service's scope and collapses records sharing
    /// a natural key: the first position is kept, the last value wins. The cache
    /// then holds exactly what the service reports.
    fn normalize(&self, records: Vec<R>) -> Vec<R> {
        let received = records.len();
        let mut normalized: Vec<R> = Vec::with_capacity(received);
        let mut positions: HashMap<String, usize> = HashMap::new();

        for mut record in records {
            if let Some(filter) = &self.filter {
                record.assign_scope(filter);
            }
            match positions.get(record.natural_key()) {
                Some(&index) => normalized[index] = record,
                None => {
                    positions.insert(record.natural_key().to_string(), normalized.len());
                    normalized.push(record);
                }
            }
        }

        if normalized.len() < received {
            debug!(
                "[CatalogSync] {} collapsed {} duplicate records",
                R::KIND,
                received - normalized.len()
            );
        }
        normalized
    }

    async fn reconcile(&self, envelope: RemoteEnvelope<R>, cached: Vec<R>) -> SyncResult<R> {
        if envelope.is_success() {
            if envelope.data.is_empty() {
                return SyncResult::Error(SyncError::empty_result());
            }
            let data = self.normalize(envelope.data);
            return match self.store.replace_all(self.filter.clone(), data.clone()).await {
                Ok(count) => {
                    info!("[CatalogSync] {} cache replaced with {} records", R::KIND, count);
                    SyncResult::Success(data)
                }
                Err(err) => {
                    warn!("[CatalogSync] {} cache replace failed: {}", R::KIND, err);
                    SyncResult::Error(SyncError::cache_failure(err))
                }
            };
        }

        if envelope.is_debug() {
            return SyncResult::Error(SyncError::debug_mode(&envelope.message));
        }

        let kind = SyncErrorKind::for_failed_status(&envelope.status);
        if kind == SyncErrorKind::NetworkUnreachable && !cached.is_empty() {
            warn!(
                "[CatalogSync] {} sync failed ({}), showing {} cached records",
                R::KIND,
                envelope.status,
                cached.len()
            );
            return SyncResult::Success(cached);
        }

        SyncResult::Error(SyncError::new(
            kind,
            format!("{}: {}", envelope.status, envelope.message),
        ))
    }
}

enum Step<R> {
    ReadCache,
    /// Fetch next, deciding stale fallback against this snapshot.
    Fetch(Vec<R>),
}

/// State of one live (non-forced) subscription.
struct Subscription<R: CatalogRecord> {
    inner: Arc<SyncInner<R>>,
    cache: BoxStream<'static, Result<Vec<R>>>,
    step: Step<R>,
    revalidated: bool,
    last_success: Option<Vec<R>>,
}

impl<R: CatalogRecord> Subscription<R> {
    async fn next_emission(&mut self) -> Option<SyncResult<R>> {
        loop {
            match std::mem::replace(&mut self.step, Step::ReadCache) {
                Step::Fetch(cached) => {
                    let outcome = self.inner.fetch_and_reconcile(Some(cached)).await;
                    if let Some(emission) = self.admit(outcome) {
                        return Some(emission);
                    }
                }
                Step::ReadCache => match self.cache.next().await? {
                    Ok(records) if records.is_empty() => {
                        self.revalidated = true;
                        self.step = Step::Fetch(Vec::new());
                        return self.admit(SyncResult::Loading);
                    }
                    Ok(records) => {
                        if !self.revalidated {
                            self.revalidated = true;
                            self.step = Step::Fetch(records.clone());
                        }
                        if let Some(emission) = self.admit(SyncResult::Success(records)) {
                            return Some(emission);
                        }
                    }
                    Err(err) => {
                        warn!("[CatalogSync] {} cache observation failed: {}", R::KIND, err);
                        return self.admit(SyncResult::Error(SyncError::cache_failure(err)));
                    }
                },
            }
        }
    }

    /// Drops a `Success` identical to the last one emitted.
    fn admit(&mut self, result: SyncResult<R>) -> Option<SyncResult<R>> {
        match &result {
            SyncResult::Success(records) => {
                if self.last_success.as_ref() == Some(records) {
                    return None;
                }
                self.last_success = Some(records.clone());
            }
            _ => self.last_success = None,
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{envelope_status, Category, Product, RecordKind};
    use crate::sync::{InMemoryCatalogStore, StaticSessionProvider};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct ScriptedRemote<R> {
        responses: StdMutex<VecDeque<RemoteEnvelope<R>>>,
        requests: StdMutex<Vec<RemoteRequest>>,
    }

    impl<R: CatalogRecord> ScriptedRemote<R> {
        fn new(responses: Vec<RemoteEnvelope<R>>) -> Arc<Self> {
            Arc::new(Self {
                responses: StdMutex::new(responses.into()),
                requests: StdMutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<RemoteRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl<R: CatalogRecord> CatalogRemoteTrait<R> for ScriptedRemote<R> {
        async fn fetch(&self, request: RemoteRequest) -> RemoteEnvelope<R> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| RemoteEnvelope::synthesized("script_exhausted", "no response"))
        }
    }

    fn success<R>(data: Vec<R>) -> RemoteEnvelope<R> {
        RemoteEnvelope {
            status: envelope_status::SUCCESS.to_string(),
            message: "ok".to_string(),
            data,
            info: Default::default(),
        }
    }

    fn category(id: &str, name: &str) -> Category {
        Category {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn session() -> Arc<dyn SessionProvider> {
        Arc::new(StaticSessionProvider::new(Some("token-1".to_string())))
    }

    fn service(
        remote: Arc<ScriptedRemote<Category>>,
        store: Arc<InMemoryCatalogStore<Category>>,
    ) -> CatalogSyncService<Category> {
        CatalogSyncService::new(remote, store, session())
    }

    async fn assert_idle<S>(stream: &mut S)
    where
        S: futures::Stream + Unpin,
        S::Item: std::fmt::Debug,
    {
        let next = tokio::time::timeout(Duration::from_millis(100), stream.next()).await;
        assert!(next.is_err(), "unexpected emission: {:?}", next);
    }

    #[tokio::test]
    async fn forced_refresh_emits_loading_then_fresh_data_and_replaces_cache() {
        let store = Arc::new(InMemoryCatalogStore::with_records(vec![category("old", "Old")]));
        let remote = ScriptedRemote::new(vec![success(vec![category("c1", "Gear")])]);
        let service = service(remote.clone(), store.clone());

        let emissions = service.observe(true).collect::<Vec<_>>().await;

        assert_eq!(
            emissions,
            vec![
                SyncResult::Loading,
                SyncResult::Success(vec![category("c1", "Gear")])
            ]
        );
        assert_eq!(store.load_all(None).unwrap(), vec![category("c1", "Gear")]);
        let requests = remote.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].kind, RecordKind::Category);
        assert_eq!(requests[0].session_token, "token-1");
    }

    #[tokio::test]
    async fn populated_cache_is_emitted_before_anything_else() {
        let store = Arc::new(InMemoryCatalogStore::with_records(vec![category("c1", "Gear")]));
        let remote = ScriptedRemote::new(vec![success(vec![
            category("c1", "Gear"),
            category("c2", "Food"),
        ])]);
        let mut updates = service(remote.clone(), store.clone()).observe(false);

        assert_eq!(
            updates.next().await,
            Some(SyncResult::Success(vec![category("c1", "Gear")]))
        );
        assert_eq!(
            updates.next().await,
            Some(SyncResult::Success(vec![
                category("c1", "Gear"),
                category("c2", "Food")
            ]))
        );
        assert_idle(&mut updates).await;
        assert_eq!(remote.requests().len(), 1, "revalidates exactly once");
    }

    #[tokio::test]
    async fn empty_cache_loads_then_emits_fetched_data_once() {
        let store = Arc::new(InMemoryCatalogStore::<Category>::new());
        let remote = ScriptedRemote::new(vec![success(vec![category("c1", "Gear")])]);
        let mut updates = service(remote.clone(), store.clone()).observe(false);

        assert_eq!(updates.next().await, Some(SyncResult::Loading));
        assert_eq!(
            updates.next().await,
            Some(SyncResult::Success(vec![category("c1", "Gear")]))
        );
        // The cache write re-emits the same records; it must not show up twice.
        assert_idle(&mut updates).await;
        assert_eq!(remote.requests().len(), 1);
    }

    #[tokio::test]
    async fn network_failure_with_cache_is_suppressed() {
        let cached = vec![category("c1", "Gear")];
        let store = Arc::new(InMemoryCatalogStore::with_records(cached.clone()));
        let remote = ScriptedRemote::new(vec![RemoteEnvelope::synthesized(
            envelope_status::NETWORK_ERROR,
            "connection reset",
        )]);
        let mut updates = service(remote.clone(), store.clone()).observe(false);

        assert_eq!(updates.next().await, Some(SyncResult::Success(cached.clone())));
        assert_idle(&mut updates).await;
        assert_eq!(remote.requests().len(), 1);
        assert_eq!(store.load_all(None).unwrap(), cached);
    }

    #[tokio::test]
    async fn network_failure_without_cache_surfaces() {
        let store = Arc::new(InMemoryCatalogStore::<Category>::new());
        let remote = ScriptedRemote::new(vec![RemoteEnvelope::synthesized(
            envelope_status::REDIRECT_ERROR,
            "timed out",
        )]);
        let mut updates = service(remote, store).observe(false);

        assert_eq!(updates.next().await, Some(SyncResult::Loading));
        let error = updates.next().await.unwrap();
        assert_eq!(error.error_kind(), Some(SyncErrorKind::NetworkUnreachable));
        assert_idle(&mut updates).await;
    }

    #[tokio::test]
    async fn empty_success_is_an_error_and_keeps_cache() {
        let cached = vec![category("c1", "Gear")];
        let store = Arc::new(InMemoryCatalogStore::with_records(cached.clone()));
        let remote = ScriptedRemote::new(vec![success(Vec::new())]);
        let service = service(remote, store.clone());

        let result = service.refresh_now().await;

        assert_eq!(result, SyncResult::Error(SyncError::empty_result()));
        assert_eq!(store.load_all(None).unwrap(), cached);
    }

    #[tokio::test]
    async fn debug_response_is_never_data() {
        let store = Arc::new(InMemoryCatalogStore::<Category>::new());
        let mut envelope = success(vec![category("c1", "Gear")]);
        envelope.status = envelope_status::DEBUG.to_string();
        envelope.message = "trace".to_string();
        let remote = ScriptedRemote::new(vec![envelope]);

        let result = service(remote, store.clone()).refresh_now().await;

        assert_eq!(result, SyncResult::Error(SyncError::debug_mode("trace")));
        assert!(store.load_all(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn server_failure_status_carries_status_and_message() {
        let store = Arc::new(InMemoryCatalogStore::<Category>::new());
        let remote = ScriptedRemote::new(vec![RemoteEnvelope::synthesized(
            "error",
            "session expired",
        )]);

        let result = service(remote, store).refresh_now().await;

        let err = result.error().unwrap();
        assert_eq!(err.kind, SyncErrorKind::ServerRejected);
        assert_eq!(err.message, "error: session expired");
    }

    #[tokio::test]
    async fn forced_refresh_falls_back_to_cache_on_network_failure() {
        let cached = vec![category("c1", "Gear")];
        let store = Arc::new(InMemoryCatalogStore::with_records(cached.clone()));
        let remote = ScriptedRemote::new(vec![RemoteEnvelope::synthesized(
            envelope_status::ALTERNATIVE_ERROR,
            "dns failure",
        )]);

        let emissions = service(remote, store).observe(true).collect::<Vec<_>>().await;

        assert_eq!(emissions, vec![SyncResult::Loading, SyncResult::Success(cached)]);
    }

    #[tokio::test]
    async fn missing_session_skips_the_network() {
        let store = Arc::new(InMemoryCatalogStore::<Category>::new());
        let remote = ScriptedRemote::new(vec![success(vec![category("c1", "Gear")])]);
        let service = CatalogSyncService::new(
            remote.clone(),
            store,
            Arc::new(StaticSessionProvider::new(None)),
        );

        let result = service.refresh_now().await;

        assert_eq!(result.error_kind(), Some(SyncErrorKind::NoSession));
        assert!(remote.requests().is_empty());
    }

    #[tokio::test]
    async fn product_service_requests_and_replaces_its_category_only() {
        let product = |id: &str, category_id: &str| Product {
            id: id.to_string(),
            product_category_id: category_id.to_string(),
            ..Default::default()
        };
        let store = Arc::new(InMemoryCatalogStore::with_records(vec![
            product("p1", "c1"),
            product("p2", "c2"),
        ]));
        let remote = ScriptedRemote::new(vec![success(vec![product("p3", "c1")])]);
        let service = CatalogSyncService::scoped(
            remote.clone(),
            store.clone(),
            session(),
            Some("c1".to_string()),
        );

        let result = service.refresh_now().await;

        assert_eq!(result, SyncResult::Success(vec![product("p3", "c1")]));
        assert_eq!(remote.requests()[0].product_category_id(), Some("c1"));
        assert_eq!(store.load_all(Some("c2")).unwrap(), vec![product("p2", "c2")]);
        assert_eq!(service.cached().unwrap(), vec![product("p3", "c1")]);
    }

    #[tokio::test]
    async fn live_subscription_follows_writes_from_forced_refresh() {
        let store = Arc::new(InMemoryCatalogStore::with_records(vec![category("c1", "Gear")]));
        let remote = ScriptedRemote::new(vec![
            RemoteEnvelope::synthesized(envelope_status::NETWORK_ERROR, "offline"),
            success(vec![category("c9", "Tools")]),
        ]);
        let service = service(remote, store);
        let mut updates = service.observe(false);

        assert_eq!(
            updates.next().await,
            Some(SyncResult::Success(vec![category("c1", "Gear")]))
        );
        // Background revalidation fails quietly.
        assert_idle(&mut updates).await;

        let refreshed = service.refresh_now().await;
        assert_eq!(refreshed, SyncResult::Success(vec![category("c9", "Tools")]));
        assert_eq!(
            updates.next().await,
            Some(SyncResult::Success(vec![category("c9", "Tools")]))
        );
    }

    #[tokio::test]
    async fn scoped_products_without_a_category_land_in_the_scope() {
        let unscoped = Product {
            id: "p1".to_string(),
            name: "Lamp".to_string(),
            ..Default::default()
        };
        let scoped = Product {
            product_category_id: "c1".to_string(),
            ..unscoped.clone()
        };
        let store = Arc::new(InMemoryCatalogStore::<Product>::new());
        let remote = ScriptedRemote::new(vec![success(vec![unscoped])]);
        let service = CatalogSyncService::scoped(
            remote.clone(),
            store.clone(),
            session(),
            Some("c1".to_string()),
        );
        let mut updates = service.observe(false);

        assert_eq!(updates.next().await, Some(SyncResult::Loading));
        assert_eq!(
            updates.next().await,
            Some(SyncResult::Success(vec![scoped.clone()]))
        );
        assert_idle(&mut updates).await;
        assert_eq!(remote.requests().len(), 1);
        assert_eq!(store.load_all(Some("c1")).unwrap(), vec![scoped]);
    }

    #[tokio::test]
    async fn duplicate_keys_collapse_to_the_last_value() {
        let store = Arc::new(InMemoryCatalogStore::<Category>::new());
        let remote = ScriptedRemote::new(vec![success(vec![
            category("c1", "Gear"),
            category("c2", "Food"),
            category("c1", "Gear v2"),
        ])]);

        let result = service(remote, store.clone()).refresh_now().await;

        let expected = vec![category("c1", "Gear v2"), category("c2", "Food")];
        assert_eq!(result, SyncResult::Success(expected.clone()));
        assert_eq!(store.load_all(None).unwrap(), expected);
    }

    /// Remote whose fetches block until released, recording the cache each one saw.
    struct GatedRemote {
        store: Arc<InMemoryCatalogStore<Category>>,
        responses: StdMutex<VecDeque<Vec<Category>>>,
        started: AtomicUsize,
        seen_at_start: StdMutex<Vec<Vec<Category>>>,
        gate: Notify,
    }

    impl GatedRemote {
        fn new(store: Arc<InMemoryCatalogStore<Category>>, responses: Vec<Vec<Category>>) -> Arc<Self> {
            Arc::new(Self {
                store,
                responses: StdMutex::new(responses.into()),
                started: AtomicUsize::new(0),
                seen_at_start: StdMutex::new(Vec::new()),
                gate: Notify::new(),
            })
        }

        fn started(&self) -> usize {
            self.started.load(Ordering::SeqCst)
        }

        async fn wait_for_starts(&self, count: usize) {
            tokio::time::timeout(Duration::from_secs(2), async {
                while self.started() < count {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .expect("fetch did not start");
        }
    }

    #[async_trait]
    impl CatalogRemoteTrait<Category> for GatedRemote {
        async fn fetch(&self, _request: RemoteRequest) -> RemoteEnvelope<Category> {
            let snapshot = self.store.load_all(None).unwrap();
            self.seen_at_start.lock().unwrap().push(snapshot);
            self.started.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            let data = self.responses.lock().unwrap().pop_front().unwrap_or_default();
            success(data)
        }
    }

    #[tokio::test]
    async fn reconciles_of_one_scope_run_one_at_a_time() {
        let store = Arc::new(InMemoryCatalogStore::<Category>::new());
        let remote = GatedRemote::new(
            store.clone(),
            vec![vec![category("c1", "Gear")], vec![category("c2", "Food")]],
        );
        let service = CatalogSyncService::new(remote.clone(), store.clone(), session());

        let first = tokio::spawn({
            let service = service.clone();
            async move { service.refresh_now().await }
        });
        remote.wait_for_starts(1).await;
        let second = tokio::spawn({
            let service = service.clone();
            async move { service.refresh_now().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(remote.started(), 1, "second fetch started while the first was in flight");

        remote.gate.notify_one();
        assert_eq!(
            first.await.unwrap(),
            SyncResult::Success(vec![category("c1", "Gear")])
        );

        remote.wait_for_starts(2).await;
        remote.gate.notify_one();
        assert_eq!(
            second.await.unwrap(),
            SyncResult::Success(vec![category("c2", "Food")])
        );

        let seen = remote.seen_at_start.lock().unwrap().clone();
        assert_eq!(seen, vec![Vec::new(), vec![category("c1", "Gear")]]);
        assert_eq!(store.load_all(None).unwrap(), vec![category("c2", "Food")]);
    }
}
