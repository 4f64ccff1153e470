//! One evaluation cycle: fetch, classify, deduplicate, deliver, record.

use crate::classifier::AlertClassifier;
use crate::config::{AlertSettings, SymbolFilter};
use crate::dedup::AlertDeduplicationStore;
use crate::format::{format_alert_message, format_degraded_message};
use crate::sink::{DeliveryError, NotificationSink};
use crate::state::AlertStateStore;
use chrono::{DateTime, TimeDelta, Utc};
use compact_str::CompactString;
use futures_util::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use volume_core::{AlertKey, AlertLevel, VolumeObservation};
use volume_feeds::{FetchError, ObservationSource};

/// Per-cycle runtime settings.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    /// Where alerts are delivered (chat id or `@channel`).
    pub routing_target: String,
    pub fetch_concurrency: usize,
    pub fetch_timeout: Duration,
    pub delivery_timeout: Duration,
    pub require_rising_volume: bool,
    pub retention: Option<TimeDelta>,
    pub filter: SymbolFilter,
    /// Classify and check cooldowns but never send or record.
    pub dry_run: bool,
}

impl CycleSettings {
    pub fn new(routing_target: impl Into<String>, settings: &AlertSettings) -> Self {
        Self {
            routing_target: routing_target.into(),
            fetch_concurrency: settings.fetch_concurrency,
            fetch_timeout: settings.fetch_timeout,
            delivery_timeout: settings.delivery_timeout,
            require_rising_volume: settings.require_rising_volume,
            retention: settings.retention,
            filter: settings.filter.clone(),
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// What happened to one symbol in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeKind {
    /// Observation below every tier, bearish, or without a usable baseline.
    NoAlert,
    /// Delivered. `persisted` is false when the state save failed afterwards.
    Sent { level: AlertLevel, persisted: bool },
    /// Same (symbol, level) still cooling down.
    Suppressed { level: AlertLevel },
    /// Would have been sent.
    DryRun { level: AlertLevel },
    FetchFailed(FetchError),
    DeliveryFailed { level: AlertLevel, error: DeliveryError },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    pub symbol: CompactString,
    pub kind: OutcomeKind,
}

impl SendOutcome {
    fn new(symbol: CompactString, kind: OutcomeKind) -> Self {
        Self { symbol, kind }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self.kind,
            OutcomeKind::FetchFailed(_)
                | OutcomeKind::DeliveryFailed { .. }
                | OutcomeKind::Sent {
                    persisted: false,
                    ..
                }
        )
    }
}

/// Result of [`AlertOrchestrator::run_cycle`], ordered by symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub outcomes: Vec<SendOutcome>,
    /// Fetch failures, delivery failures and unpersisted sends.
    pub failures: usize,
}

impl CycleReport {
    pub fn sent(&self) -> usize {
        self.count(|k| matches!(k, OutcomeKind::Sent { .. }))
    }

    pub fn suppressed(&self) -> usize {
        self.count(|k| matches!(k, OutcomeKind::Suppressed { .. }))
    }

    pub fn dry_run(&self) -> usize {
        self.count(|k| matches!(k, OutcomeKind::DryRun { .. }))
    }

    pub fn outcome(&self, symbol: &str) -> Option<&OutcomeKind> {
        self.outcomes
            .iter()
            .find(|o| o.symbol == symbol)
            .map(|o| &o.kind)
    }

    fn count(&self, pred: impl Fn(&OutcomeKind) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.kind)).count()
    }

    fn push(&mut self, outcome: SendOutcome) {
        if outcome.is_failure() {
            self.failures += 1;
        }
        self.outcomes.push(outcome);
    }
}

/// Drives evaluation cycles and owns the alert state.
///
/// Observations are fetched concurrently. Classification, the cooldown
/// check, delivery and every state mutation happen one symbol at a time.
pub struct AlertOrchestrator {
    source: Arc<dyn ObservationSource>,
    sink: Arc<dyn NotificationSink>,
    escalation: Option<(Arc<dyn NotificationSink>, String)>,
    classifier: AlertClassifier,
    dedup: AlertDeduplicationStore,
    state: AlertStateStore,
    settings: CycleSettings,
}

impl AlertOrchestrator {
    /// Create an orchestrator and load persisted state.
    ///
    /// Unreadable or corrupt state is logged and replaced by an empty store,
    /// which may re-send alerts that were still cooling down.
    pub fn new(
        source: Arc<dyn ObservationSource>,
        sink: Arc<dyn NotificationSink>,
        classifier: AlertClassifier,
        dedup: AlertDeduplicationStore,
        settings: CycleSettings,
    ) -> Self {
        let state = match dedup.load() {
            Ok(state) => {
                info!(records = state.len(), "Loaded alert state");
                state
            }
            Err(e) => {
                error!(
                    error = %e,
                    corrupt = e.is_corrupt(),
                    "Failed to load alert state, starting empty; duplicate alerts are possible"
                );
                AlertStateStore::new()
            }
        };

        Self {
            source,
            sink,
            escalation: None,
            classifier,
            dedup,
            state,
            settings,
        }
    }

    /// Send a degraded-mode summary to `target` through `sink` whenever a
    /// cycle has delivery failures.
    pub fn with_escalation(
        mut self,
        sink: Arc<dyn NotificationSink>,
        target: impl Into<String>,
    ) -> Self {
        self.escalation = Some((sink, target.into()));
        self
    }

    pub fn state(&self) -> &AlertStateStore {
        &self.state
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    /// Evaluate every symbol once at `now`.
    ///
    /// Per-symbol errors become outcomes and never abort the cycle. The next
    /// cycle is the retry mechanism.
    pub async fn run_cycle<I, S>(&mut self, symbols: I, now: DateTime<Utc>) -> CycleReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbols: BTreeSet<CompactString> = symbols
            .into_iter()
            .map(|s| CompactString::from(s.as_ref().trim()))
            .filter(|s| !s.is_empty())
            .filter(|s| {
                let allowed = self.settings.filter.allows(s);
                if !allowed {
                    debug!(symbol = %s, "Skipping filtered symbol");
                }
                allowed
            })
            .collect();

        self.prune(now);

        let fetched = self.fetch_all(symbols).await;

        let mut report = CycleReport::default();
        let mut undelivered: Vec<(String, String)> = Vec::new();

        for (symbol, result) in fetched {
            let observation = match result {
                Ok(observation) => observation,
                Err(e) => {
                    warn!(
                        symbol = %symbol,
                        error = %e,
                        transient = e.is_transient(),
                        "Fetch failed"
                    );
                    report.push(SendOutcome::new(symbol, OutcomeKind::FetchFailed(e)));
                    continue;
                }
            };

            let kind = self.evaluate(&symbol, &observation, now).await;
            if let OutcomeKind::DeliveryFailed { error, .. } = &kind {
                undelivered.push((symbol.to_string(), error.to_string()));
            }
            report.push(SendOutcome::new(symbol, kind));
        }

        if !undelivered.is_empty() {
            self.escalate(&undelivered, now).await;
        }

        info!(
            symbols = report.outcomes.len(),
            sent = report.sent(),
            suppressed = report.suppressed(),
            dry_run = report.dry_run(),
            failures = report.failures,
            "Cycle complete"
        );

        report
    }

    async fn fetch_all(
        &self,
        symbols: BTreeSet<CompactString>,
    ) -> Vec<(CompactString, Result<VolumeObservation, FetchError>)> {
        let timeout = self.settings.fetch_timeout;
        let concurrency = self.settings.fetch_concurrency.max(1);

        let mut fetched: Vec<_> = stream::iter(symbols)
            .map(|symbol| {
                let source = Arc::clone(&self.source);
                async move {
                    let result =
                        match tokio::time::timeout(timeout, source.get_observation(&symbol)).await {
                            Ok(result) => result,
                            Err(_) => Err(FetchError::Timeout(format!(
                                "{} after {}ms",
                                symbol,
                                timeout.as_millis()
                            ))),
                        };
                    (symbol, result)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        fetched.sort_by(|a, b| a.0.cmp(&b.0));
        fetched
    }

    async fn evaluate(
        &mut self,
        symbol: &CompactString,
        observation: &VolumeObservation,
        now: DateTime<Utc>,
    ) -> OutcomeKind {
        let Some(level) = self
            .classifier
            .classify_observation(observation, self.settings.require_rising_volume)
        else {
            debug!(symbol = %symbol, ratio = ?observation.ratio(), "No alert");
            return OutcomeKind::NoAlert;
        };

        let key = AlertKey::for_level(symbol, &level);
        if self.dedup.is_suppressed(&self.state, &key, now) {
            debug!(key = %key, "Skipping alert: cooldown active");
            return OutcomeKind::Suppressed { level };
        }

        if self.settings.dry_run {
            info!(key = %key, ratio = ?observation.ratio(), "Dry run: alert not sent");
            return OutcomeKind::DryRun { level };
        }

        let message = format_alert_message(observation, &level, now);
        let delivery = tokio::time::timeout(
            self.settings.delivery_timeout,
            self.sink.send(&message, &self.settings.routing_target),
        )
        .await
        .unwrap_or(Err(DeliveryError::Timeout));

        if let Err(error) = delivery {
            warn!(
                key = %key,
                error = %error,
                transient = error.is_transient(),
                "Alert delivery failed, will retry next cycle"
            );
            return OutcomeKind::DeliveryFailed { level, error };
        }

        self.dedup.record_sent(&mut self.state, key.clone(), now);
        let persisted = match self.dedup.save(&self.state) {
            Ok(()) => true,
            Err(e) => {
                error!(key = %key, error = %e, "Alert sent but state save failed");
                false
            }
        };
        info!(key = %key, ratio = ?observation.ratio(), persisted, "Alert sent");

        OutcomeKind::Sent { level, persisted }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let Some(retention) = self.settings.retention else {
            return;
        };
        let removed = self.state.prune(now, retention);
        if removed == 0 {
            return;
        }
        info!(removed, remaining = self.state.len(), "Pruned expired alert records");
        if !self.settings.dry_run {
            if let Err(e) = self.dedup.save(&self.state) {
                error!(error = %e, "Failed to save pruned alert state");
            }
        }
    }

    /// Best effort; a failure here is only logged.
    async fn escalate(&self, undelivered: &[(String, String)], now: DateTime<Utc>) {
        let Some((sink, target)) = &self.escalation else {
            return;
        };
        let message = format_degraded_message(undelivered, now);
        let result =
            tokio::time::timeout(self.settings.delivery_timeout, sink.send(&message, target))
                .await
                .unwrap_or(Err(DeliveryError::Timeout));
        match result {
            Ok(()) => info!(failed = undelivered.len(), "Sent degraded-mode notification"),
            Err(e) => warn!(error = %e, "Failed to send degraded-mode notification"),
        }
    }
}
