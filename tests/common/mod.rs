#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::ConnectInfo;
use axum_test::TestServer;
use link_resolver::config::Config;
use link_resolver::domain::click_event::ClickEvent;
use link_resolver::domain::entities::{Link, LinkPatch, NewLink};
use link_resolver::domain::repositories::{CounterStore, LinkRepository};
use link_resolver::error::AppError;
use link_resolver::infrastructure::cache::{CacheService, LocalCache, TieredCache};
use link_resolver::infrastructure::persistence::MemoryLinkRepository;
use link_resolver::infrastructure::rate_limit::MemoryCounterStore;
use link_resolver::routes::app_router;
use link_resolver::state::{AppState, Backends};
use link_resolver::utils::clock::ManualClock;
use link_resolver::utils::snowflake::EPOCH_MILLIS;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tower::Layer;

/// One minute past the identifier epoch; identifiers minted here fit in
/// seven base62 digits. Identifiers minted against the wall clock today
/// need ten.
pub const START_MILLIS: u64 = EPOCH_MILLIS + 60_000;

pub const BASE_URL: &str = "http://sho.rt";

#[derive(Clone)]
pub struct MockConnectInfoLayer;

impl<S> Layer<S> for MockConnectInfoLayer {
    type Service = MockConnectInfoService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MockConnectInfoService { inner }
    }
}

#[derive(Clone)]
pub struct MockConnectInfoService<S> {
    inner: S,
}

impl<S, B> tower::Service<axum::http::Request<B>> for MockConnectInfoService<S>
where
    S: tower::Service<axum::http::Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: axum::http::Request<B>) -> Self::Future {
        let addr: SocketAddr = "127.0.0.1:12345".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        self.inner.call(req)
    }
}

/// In-memory store that counts short code lookups.
pub struct CountingRepository {
    inner: MemoryLinkRepository,
    lookups: AtomicUsize,
}

impl CountingRepository {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            inner: MemoryLinkRepository::new(clock),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LinkRepository for CountingRepository {
    async fn find_by_short_code(&self, code: &str) -> Result<Option<Link>, AppError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_short_code(code).await
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<Link>, AppError> {
        self.inner.find_by_id(id).await
    }

    async fn create(&self, new_link: NewLink) -> Result<Link, AppError> {
        self.inner.create(new_link).await
    }

    async fn update(&self, id: u64, patch: LinkPatch) -> Result<Link, AppError> {
        self.inner.update(id, patch).await
    }

    async fn soft_delete(&self, id: u64) -> Result<bool, AppError> {
        self.inner.soft_delete(id).await
    }

    async fn increment_click_count(&self, id: u64) -> Result<(), AppError> {
        self.inner.increment_click_count(id).await
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub repository: Arc<CountingRepository>,
    pub clock: Arc<ManualClock>,
    pub clicks: mpsc::Receiver<ClickEvent>,
}

pub fn test_config() -> Config {
    Config {
        base_url: BASE_URL.to_string(),
        ..Config::default()
    }
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(test_config(), None)
}

/// Builds the real router over in-memory backends and a held clock.
///
/// `counter_store` replaces the in-process counter store when given.
pub fn spawn_app_with(config: Config, counter_store: Option<Arc<dyn CounterStore>>) -> TestApp {
    let clock = Arc::new(ManualClock::new(START_MILLIS));
    let repository = Arc::new(CountingRepository::new(clock.clone()));

    let local: Arc<dyn CacheService> = Arc::new(LocalCache::new(
        config.cache_max_size,
        config.cache_ttl(),
        config.cache_eviction,
        clock.clone(),
    ));
    let cache = Arc::new(TieredCache::new(vec![local], clock.clone()));

    let counter_store: Arc<dyn CounterStore> = match counter_store {
        Some(store) => store,
        None => Arc::new(MemoryCounterStore::new(
            config.rate_limit_max_keys,
            clock.clone(),
        )),
    };

    let (click_tx, clicks) = mpsc::channel(config.click_queue_capacity);

    let state = AppState::new(
        &config,
        Backends {
            repository: repository.clone(),
            cache,
            counter_store,
            clock: clock.clone(),
            click_tx,
        },
    )
    .unwrap();

    let app = app_router(state.clone(), config.rate_limit_redirects).layer(MockConnectInfoLayer);
    let server = TestServer::new(app).unwrap();

    TestApp {
        server,
        state,
        repository,
        clock,
        clicks,
    }
}
