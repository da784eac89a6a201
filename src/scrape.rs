//! Scrape Coordinator
//!
//! Fans a scrape out to every configured target and aggregates the outcomes.
//!
//! # Concurrency
//!
//! - Each poll runs as its own spawned task
//! - A global semaphore caps how many polls talk to BMCs at once
//! - Polls are single-flight per target: a scrape that arrives while a poll of
//!   the same target is running joins it instead of starting another one
//!   (or, with [`OverlapMode::Cached`], serves a fresh enough previous outcome)
//!
//! Every waiter is bounded by its own deadline. A waiter that gives up reports
//! `Timeout` for the target while the shared poll keeps running for the others.
//!
//! # Reload
//!
//! [`ScrapeCoordinator::reload`] swaps the whole target set. Sessions of
//! removed targets are logged out. Polls already running for them finish
//! normally but their outcome is not kept.

use crate::collector::{TargetCollector, TargetOutcome, TargetStatus};
use crate::config::{OverlapMode, ScrapeConfig};
use crate::error::{ExporterError, ScrapeError};
use crate::metrics::vocabulary::{
    SCRAPE_DURATION_SECONDS, SCRAPE_RESOURCES_SKIPPED, SCRAPE_STATUS, UP,
};
use crate::metrics::{Labels, MetricSample};
use crate::redfish::{ClientSettings, RedfishClient, SessionStore};
use crate::target::Target;
use futures_util::future::{join_all, BoxFuture, FutureExt, Shared};
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Coordinator tunables
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    /// Global scrape deadline
    pub timeout: Duration,
    pub max_concurrency: usize,
    pub client: ClientSettings,
    pub max_depth: usize,
    pub fetch_parallelism: usize,
    pub overlap: OverlapMode,
    pub cached_max_age: Duration,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self::from(&ScrapeConfig::default())
    }
}

impl From<&ScrapeConfig> for ScrapeSettings {
    fn from(config: &ScrapeConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_seconds),
            max_concurrency: config.max_concurrency,
            client: ClientSettings {
                request_timeout: Duration::from_secs(config.request_timeout_seconds),
                session_ttl: Duration::from_secs(config.session_ttl_seconds),
            },
            max_depth: config.max_depth,
            fetch_parallelism: config.fetch_parallelism,
            overlap: config.overlap,
            cached_max_age: Duration::from_secs(config.cached_max_age_seconds),
        }
    }
}

/// Outcomes of one scrape
#[derive(Debug)]
pub struct ScrapeResult {
    outcomes: Vec<Arc<TargetOutcome>>,
    /// Operator labels per target address
    labels: HashMap<String, Labels>,
    elapsed: Duration,
}

impl ScrapeResult {
    pub fn outcomes(&self) -> &[Arc<TargetOutcome>] {
        &self.outcomes
    }

    pub fn outcome(&self, address: &str) -> Option<&TargetOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.target == address)
            .map(Arc::as_ref)
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Device samples of every target plus the per-target poll metrics, all
    /// carrying the target's operator labels.
    pub fn samples(&self) -> Vec<MetricSample> {
        let none = Labels::new();
        let mut samples = Vec::new();
        for outcome in &self.outcomes {
            let extra = self.labels.get(&outcome.target).unwrap_or(&none);
            let target = [("target", outcome.target.as_str())];
            let up = if outcome.status.is_up() { 1.0 } else { 0.0 };

            let own = outcome.samples.iter().cloned().chain([
                MetricSample::new(&UP, up, target),
                MetricSample::new(&SCRAPE_STATUS, outcome.status.code(), target),
                MetricSample::new(
                    &SCRAPE_DURATION_SECONDS,
                    outcome.elapsed.as_secs_f64(),
                    target,
                ),
                MetricSample::new(
                    &SCRAPE_RESOURCES_SKIPPED,
                    outcome.skipped.len() as f64,
                    target,
                ),
            ]);
            samples.extend(own.map(|sample| sample.with_labels(extra)));
        }
        samples
    }
}

type SharedPoll = Shared<BoxFuture<'static, Arc<TargetOutcome>>>;

struct InflightPoll {
    id: u64,
    collector: Arc<TargetCollector>,
    poll: SharedPoll,
}

/// Immutable snapshot of the configured targets, in configuration order
#[derive(Default)]
struct TargetSet {
    order: Vec<String>,
    collectors: HashMap<String, Arc<TargetCollector>>,
}

impl TargetSet {
    fn iter(&self) -> impl Iterator<Item = &Arc<TargetCollector>> {
        self.order.iter().filter_map(|a| self.collectors.get(a))
    }

    fn labels(&self) -> HashMap<String, Labels> {
        self.iter()
            .filter(|collector| !collector.client().target().labels.is_empty())
            .map(|collector| {
                let target = collector.client().target();
                (target.address.clone(), target.labels.clone())
            })
            .collect()
    }
}

struct Inner {
    settings: ScrapeSettings,
    store: Arc<SessionStore>,
    targets: RwLock<Arc<TargetSet>>,
    inflight: Mutex<HashMap<String, InflightPoll>>,
    recent: Mutex<HashMap<String, (Instant, Arc<TargetOutcome>)>>,
    permits: Arc<Semaphore>,
    next_poll: AtomicU64,
}

/// Entry point of every scrape
#[derive(Clone)]
pub struct ScrapeCoordinator {
    inner: Arc<Inner>,
}

impl ScrapeCoordinator {
    pub fn new(
        targets: Vec<Target>,
        store: Arc<SessionStore>,
        settings: ScrapeSettings,
    ) -> Result<Self, ExporterError> {
        let set = build_set(targets, &store, &settings)?;
        let permits = Arc::new(Semaphore::new(settings.max_concurrency.max(1)));

        Ok(Self {
            inner: Arc::new(Inner {
                settings,
                store,
                targets: RwLock::new(Arc::new(set)),
                inflight: Mutex::new(HashMap::new()),
                recent: Mutex::new(HashMap::new()),
                permits,
                next_poll: AtomicU64::new(0),
            }),
        })
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.inner.store
    }

    pub fn settings(&self) -> &ScrapeSettings {
        &self.inner.settings
    }

    pub fn target_count(&self) -> usize {
        self.inner.current().order.len()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.inner.current().order.clone()
    }

    /// Polls every configured target once.
    pub async fn scrape(&self) -> Result<ScrapeResult, ScrapeError> {
        let set = self.inner.current();
        if set.order.is_empty() {
            return Err(ScrapeError::NoTargets);
        }

        let started = Instant::now();
        let deadline = started + self.inner.settings.timeout;

        let polls = set
            .iter()
            .map(|collector| self.inner.poll(collector.clone(), started, deadline));
        let outcomes = join_all(polls).await;

        let elapsed = started.elapsed();
        debug!(
            targets = outcomes.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Scrape complete"
        );
        Ok(ScrapeResult {
            outcomes,
            labels: set.labels(),
            elapsed,
        })
    }

    /// Polls one configured target.
    pub async fn scrape_target(&self, address: &str) -> Result<ScrapeResult, ScrapeError> {
        let set = self.inner.current();
        if set.order.is_empty() {
            return Err(ScrapeError::NoTargets);
        }
        let collector = set
            .collectors
            .get(address)
            .cloned()
            .ok_or_else(|| ScrapeError::UnknownTarget(address.to_string()))?;

        let started = Instant::now();
        let deadline = started + self.inner.settings.timeout;
        let outcome = self.inner.poll(collector, started, deadline).await;

        Ok(ScrapeResult {
            outcomes: vec![outcome],
            labels: set.labels(),
            elapsed: started.elapsed(),
        })
    }

    /// Replaces the target set.
    pub async fn reload(&self, targets: Vec<Target>) -> Result<(), ExporterError> {
        let next = build_set(targets, &self.inner.store, &self.inner.settings)?;

        let previous = {
            let mut current = self.inner.targets.write().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *current, Arc::new(next))
        };
        let current = self.inner.current();

        let mut stale = Vec::new();
        for old in previous.iter() {
            match current.collectors.get(old.address()) {
                None => stale.push(old.clone()),
                Some(new) if !same_identity(old.client().target(), new.client().target()) => {
                    stale.push(old.clone())
                }
                Some(_) => {}
            }
        }

        {
            let mut inflight = self.inner.inflight.lock().unwrap_or_else(|e| e.into_inner());
            for collector in &stale {
                if inflight
                    .get(collector.address())
                    .is_some_and(|p| Arc::ptr_eq(&p.collector, collector))
                {
                    inflight.remove(collector.address());
                }
            }
        }
        {
            let mut recent = self.inner.recent.lock().unwrap_or_else(|e| e.into_inner());
            for collector in &stale {
                recent.remove(collector.address());
            }
        }

        for collector in &stale {
            collector.client().logout().await;
        }

        info!(
            targets = current.order.len(),
            dropped = stale.len(),
            "Target set reloaded"
        );
        Ok(())
    }

    /// Logs out every cached session.
    pub async fn shutdown(&self) {
        let set = self.inner.current();
        join_all(set.iter().map(|collector| collector.client().logout())).await;
        info!("Logged out of all Redfish sessions");
    }
}

impl Inner {
    fn current(&self) -> Arc<TargetSet> {
        self.targets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Whether `collector` still matches the configured target of its address.
    fn is_current(&self, collector: &Arc<TargetCollector>) -> bool {
        self.current()
            .collectors
            .get(collector.address())
            .is_some_and(|configured| same_collector(configured, collector))
    }

    fn target_deadline(&self, collector: &TargetCollector, global: Instant) -> Instant {
        match collector.client().target().timeout {
            Some(timeout) => global.min(Instant::now() + timeout),
            None => global,
        }
    }

    async fn poll(
        self: &Arc<Self>,
        collector: Arc<TargetCollector>,
        started: Instant,
        deadline: Instant,
    ) -> Arc<TargetOutcome> {
        let deadline = self.target_deadline(&collector, deadline);
        let address = collector.address().to_string();

        let poll = {
            let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
            let running = inflight
                .get(&address)
                .filter(|running| same_collector(&running.collector, &collector));
            match running {
                Some(running) => {
                    if let Some(outcome) = self.fresh_outcome(&address) {
                        debug!(bmc = %address, "Poll in flight, serving recent outcome");
                        return outcome;
                    }
                    debug!(bmc = %address, "Joining in-flight poll");
                    running.poll.clone()
                }
                None => {
                    let id = self.next_poll.fetch_add(1, Ordering::SeqCst);
                    let poll = self.spawn_poll(id, collector.clone(), deadline);
                    inflight.insert(
                        address.clone(),
                        InflightPoll {
                            id,
                            collector,
                            poll: poll.clone(),
                        },
                    );
                    poll
                }
            }
        };

        match tokio::time::timeout_at(deadline, poll).await {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!(bmc = %address, "Gave up waiting for poll");
                Arc::new(TargetOutcome::timed_out(address, started.elapsed()))
            }
        }
    }

    fn fresh_outcome(&self, address: &str) -> Option<Arc<TargetOutcome>> {
        if self.settings.overlap != OverlapMode::Cached {
            return None;
        }
        let recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        recent
            .get(address)
            .filter(|(at, _)| at.elapsed() <= self.settings.cached_max_age)
            .map(|(_, outcome)| outcome.clone())
    }

    fn spawn_poll(
        self: &Arc<Self>,
        id: u64,
        collector: Arc<TargetCollector>,
        deadline: Instant,
    ) -> SharedPoll {
        let inner = Arc::clone(self);
        let address = collector.address().to_string();
        let owner = collector.clone();

        let task = tokio::spawn({
            let inner = Arc::clone(&inner);
            let address = address.clone();
            async move {
                let started = Instant::now();
                let outcome = match tokio::time::timeout_at(
                    deadline,
                    inner.permits.clone().acquire_owned(),
                )
                .await
                {
                    Ok(Ok(_permit)) => Arc::new(collector.collect(deadline).await),
                    _ => Arc::new(TargetOutcome::timed_out(&address, started.elapsed())),
                };
                inner.complete(&collector, id, &outcome);
                outcome
            }
        });

        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(bmc = %address, error = %err, "Poll task failed");
                    let outcome = Arc::new(TargetOutcome::failed(
                        address.as_str(),
                        TargetStatus::Unreachable,
                        Duration::ZERO,
                        err.to_string(),
                    ));
                    inner.complete(&owner, id, &outcome);
                    outcome
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Clears the in-flight entry of poll `id` and remembers its outcome
    /// unless the target was removed or its identity changed meanwhile.
    fn complete(&self, collector: &Arc<TargetCollector>, id: u64, outcome: &Arc<TargetOutcome>) {
        let address = collector.address();
        {
            let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
            if inflight.get(address).is_some_and(|p| p.id == id) {
                inflight.remove(address);
            }
        }

        if !self.is_current(collector) {
            debug!(bmc = %address, "Discarding outcome of removed or reconfigured target");
            return;
        }
        let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        recent.insert(address.to_string(), (Instant::now(), outcome.clone()));
    }
}

fn build_set(
    targets: Vec<Target>,
    store: &Arc<SessionStore>,
    settings: &ScrapeSettings,
) -> Result<TargetSet, ExporterError> {
    let mut set = TargetSet::default();
    for target in targets {
        if set.collectors.contains_key(&target.address) {
            return Err(ExporterError::Config(format!(
                "duplicate target address: {}",
                target.address
            )));
        }
        let address = target.address.clone();
        let client = RedfishClient::new(Arc::new(target), store.clone(), &settings.client)?;
        let collector = TargetCollector::new(client, settings.max_depth, settings.fetch_parallelism);
        set.order.push(address.clone());
        set.collectors.insert(address, Arc::new(collector));
    }
    Ok(set)
}

fn same_collector(a: &Arc<TargetCollector>, b: &Arc<TargetCollector>) -> bool {
    Arc::ptr_eq(a, b) || same_identity(a.client().target(), b.client().target())
}

/// Whether a cached session of `old` is still valid for `new`.
fn same_identity(old: &Target, new: &Target) -> bool {
    old.base_url() == new.base_url()
        && old.credential.username == new.credential.username
        && old.credential.auth == new.credential.auth
        && old.credential.password.expose_secret() == new.credential.password.expose_secret()
}
