use std::sync::Arc;

use tokio::sync::mpsc;

use crate::application::services::{LinkService, RateLimiter, RedirectService};
use crate::config::Config;
use crate::domain::click_event::ClickEvent;
use crate::domain::repositories::{CounterStore, LinkRepository};
use crate::error::AppError;
use crate::infrastructure::cache::TieredCache;
use crate::utils::base62::Base62Codec;
use crate::utils::clock::SharedClock;
use crate::utils::snowflake::IdGenerator;

/// Backends the state is assembled from.
pub struct Backends {
    pub repository: Arc<dyn LinkRepository>,
    pub cache: Arc<TieredCache>,
    pub counter_store: Arc<dyn CounterStore>,
    pub clock: SharedClock,
    pub click_tx: mpsc::Sender<ClickEvent>,
}

#[derive(Clone)]
pub struct AppState {
    pub link_service: Arc<LinkService<dyn LinkRepository>>,
    pub redirect_service: Arc<RedirectService<dyn LinkRepository>>,
    pub rate_limiter: Arc<RateLimiter>,
    pub cache: Arc<TieredCache>,
    pub repository: Arc<dyn LinkRepository>,
    pub base_url: String,
    pub behind_proxy: bool,
}

impl AppState {
    /// Wires services over `backends` using the identifier, cache and limit
    /// settings from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Configuration`] for an invalid region, worker or
    /// code length.
    pub fn new(config: &Config, backends: Backends) -> Result<Self, AppError> {
        let Backends {
            repository,
            cache,
            counter_store,
            clock,
            click_tx,
        } = backends;

        let generator = Arc::new(IdGenerator::new(
            config.region_id,
            config.worker_id,
            config.clock_regression_policy,
            clock.clone(),
        )?);
        let codec = Base62Codec::new(config.short_code_length)?;

        let link_service = Arc::new(LinkService::new(
            repository.clone(),
            generator,
            codec,
            cache.clone(),
            clock.clone(),
        ));
        let redirect_service = Arc::new(RedirectService::new(
            repository.clone(),
            cache.clone(),
            clock.clone(),
            config.persistence_timeout(),
            click_tx,
        ));
        let rate_limiter = Arc::new(RateLimiter::new(
            counter_store,
            config.rate_limit_tiers,
            clock,
        ));

        Ok(Self {
            link_service,
            redirect_service,
            rate_limiter,
            cache,
            repository,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            behind_proxy: config.behind_proxy,
        })
    }

    pub fn short_url(&self, code: &str) -> String {
        format!("{}/{}", self.base_url, code)
    }
}
