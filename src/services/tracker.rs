// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The serialized detection pipeline.
//!
//! One [`Tracker`] owns the detector, the visit history and the achievement
//! ledger. It runs as a single task fed by a FIFO command channel, so fixes,
//! lifecycle events, user edits and sync results never race each other.
//! [`TrackerHandle`] is the cheap, cloneable front door to that task.
//!
//! For each confirmed region entry the order is fixed:
//! 1. decide the notification against the history as it was before
//! 2. start the fact lookup (runs while the next steps happen)
//! 3. persist the visit
//! 4. evaluate and persist achievements
//! 5. compose and deliver the notification

use crate::config::Config;
use crate::db::local::LocalStore;
use crate::db::remote::RemoteStore;
use crate::models::{
    default_catalog, merge_histories, merge_ledgers, Achievement, AchievementLedger, Fix,
    NotificationContent, NotificationContext, NotificationDecision, NotificationPreference,
    RegionVisit, VisitHistory,
};
use crate::services::achievements::AchievementEvaluator;
use crate::services::delivery::NotificationSink;
use crate::services::detector::{DetectionOutcome, RegionEntry, RegionTransitionDetector};
use crate::services::facts::FactProvider;
use crate::services::location_filter::LocationFilter;
use crate::services::notifications::NotificationDecider;
use crate::services::positioning::{PositionSource, PositioningError};
use crate::services::region_index::RegionIndex;
use crate::services::sync::SyncService;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Commands queued ahead of the tracker before senders wait.
const COMMAND_BUFFER: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Tracker task has stopped")]
    WorkerStopped,

    #[error("Unknown region: {0}")]
    UnknownRegion(String),
}

/// What happened for one confirmed region entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryOutcome {
    pub entry: RegionEntry,
    pub decision: NotificationDecision,
    pub new_achievements: Vec<String>,
    /// The notification handed to the sink, if any.
    pub notification: Option<NotificationContent>,
}

/// Point-in-time copy of the tracker's state.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSnapshot {
    pub current_region: Option<String>,
    pub visits: VisitHistory,
    pub achievements: AchievementLedger,
    pub preference: NotificationPreference,
    pub last_notified_region: Option<String>,
}

enum Command {
    Fix(Fix),
    Foregrounded(DateTime<Utc>),
    Backgrounded(DateTime<Utc>),
    AddManualVisit {
        region: String,
        at: DateTime<Utc>,
        reply: oneshot::Sender<Result<Vec<String>, TrackerError>>,
    },
    RemoveVisit {
        region: String,
        reply: oneshot::Sender<bool>,
    },
    SetPreference(NotificationPreference),
    ApplyRemote {
        visits: VisitHistory,
        achievements: AchievementLedger,
        reply: oneshot::Sender<()>,
    },
    Snapshot(oneshot::Sender<TrackerSnapshot>),
}

/// Owner of all mutable detection state.
pub struct Tracker<F, S> {
    index: Arc<RegionIndex>,
    detector: RegionTransitionDetector,
    evaluator: AchievementEvaluator,
    decider: NotificationDecider,
    catalog: Vec<Achievement>,
    store: LocalStore,
    facts: Arc<F>,
    sink: Arc<S>,
    fact_timeout: std::time::Duration,
    history: VisitHistory,
    ledger: AchievementLedger,
    context: NotificationContext,
}

impl<F, S> Tracker<F, S>
where
    F: FactProvider + 'static,
    S: NotificationSink + 'static,
{
    /// Build a tracker, loading persisted state from `store`.
    pub fn new(
        index: Arc<RegionIndex>,
        config: &Config,
        store: LocalStore,
        facts: Arc<F>,
        sink: Arc<S>,
    ) -> Self {
        let detector = RegionTransitionDetector::new(
            index.clone(),
            LocationFilter::new(config.filter.clone()),
            config.detector.clone(),
        );
        let context = NotificationContext {
            last_notified_region: store.load_last_notified(),
            is_foreground: false,
            foregrounded_at: None,
            preference: store
                .load_preference()
                .unwrap_or(config.notifications.preference),
        };
        let history = store.load_visits();
        let ledger = store.load_achievements();

        tracing::info!(
            visits = history.len(),
            earned = ledger.values().filter(|r| r.is_earned).count(),
            preference = ?context.preference,
            "Tracker state loaded"
        );

        Self {
            index,
            detector,
            evaluator: AchievementEvaluator::from_config(&config.notifications),
            decider: NotificationDecider::new(&config.notifications),
            catalog: default_catalog(),
            store,
            facts,
            sink,
            fact_timeout: config.notifications.fact_timeout,
            history,
            ledger,
            context,
        }
    }

    /// Replace the built-in achievement catalog.
    pub fn with_catalog(mut self, catalog: Vec<Achievement>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Run the tracker on its own task.
    pub fn spawn(self) -> (TrackerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let cancel = CancellationToken::new();
        let handle = TrackerHandle {
            tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(self.run(rx, cancel));
        (handle, task)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>, cancel: CancellationToken) {
        tracing::info!("Tracker started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // Stop accepting commands but finish the ones queued.
                    rx.close();
                    while let Some(command) = rx.recv().await {
                        self.handle_command(command).await;
                    }
                    break;
                }
                command = rx.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
        }
        tracing::info!("Tracker stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Fix(fix) => {
                self.handle_fix(&fix).await;
            }
            Command::Foregrounded(at) => self.foregrounded(at),
            Command::Backgrounded(at) => self.backgrounded(at),
            Command::AddManualVisit { region, at, reply } => {
                let _ = reply.send(self.add_manual_visit(&region, at));
            }
            Command::RemoveVisit { region, reply } => {
                let _ = reply.send(self.remove_visit(&region));
            }
            Command::SetPreference(preference) => self.set_preference(preference),
            Command::ApplyRemote {
                visits,
                achievements,
                reply,
            } => {
                self.apply_remote(&visits, &achievements, Utc::now());
                let _ = reply.send(());
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    /// Feed one fix through the pipeline.
    ///
    /// Returns what happened if the fix confirmed a region entry.
    pub async fn handle_fix(&mut self, fix: &Fix) -> Option<EntryOutcome> {
        let DetectionOutcome::Entered(entry) = self.detector.observe(fix) else {
            return None;
        };
        let now = entry.entered_at;
        let region = entry.region.clone();

        let previously_confirmed = self
            .history
            .get(&region)
            .is_some_and(|visit| visit.ever_confirmed);
        let decision = self
            .decider
            .decide(&region, &self.context, previously_confirmed, now);

        let fact_task = (decision == NotificationDecision::Welcome).then(|| self.prefetch_fact(&region));

        self.history
            .entry(region.clone())
            .and_modify(|visit| visit.record_detection(now))
            .or_insert_with(|| RegionVisit::detected(region.as_str(), now));
        self.persist_visits();

        let new_achievements = self.evaluate_achievements(now);

        let fact = match fact_task {
            Some(task) => task.await.unwrap_or_else(|e| {
                tracing::warn!(region = %region, error = %e, "Fact lookup task failed");
                None
            }),
            None => None,
        };

        let titles = self.titles(&new_achievements);
        let notification = self.decider.compose(decision, &region, fact, &titles);
        if let Some(content) = &notification {
            self.fire(content.clone(), now).await;
        }

        Some(EntryOutcome {
            entry,
            decision,
            new_achievements,
            notification,
        })
    }

    fn prefetch_fact(&self, region: &str) -> JoinHandle<Option<String>> {
        let facts = Arc::clone(&self.facts);
        let region = region.to_string();
        let timeout = self.fact_timeout;

        tokio::spawn(async move {
            match tokio::time::timeout(timeout, facts.fetch_fact(&region)).await {
                Ok(fact) => fact,
                Err(_) => {
                    tracing::warn!(
                        region = %region,
                        timeout_ms = timeout.as_millis() as u64,
                        "Fact lookup timed out, using generic welcome"
                    );
                    None
                }
            }
        })
    }

    async fn fire(&mut self, content: NotificationContent, now: DateTime<Utc>) {
        let region = content.region.clone();
        match self.sink.deliver(content).await {
            Ok(()) => tracing::info!(region = %region, "Notification delivered"),
            Err(e) => tracing::warn!(region = %region, error = %e, "Notification delivery failed"),
        }

        self.decider.record_fired(now);
        self.context.last_notified_region = Some(region);
        if let Err(e) = self
            .store
            .save_last_notified(self.context.last_notified_region.as_deref())
        {
            tracing::error!(error = %e, "Failed to persist last notified region");
        }
    }

    fn titles(&self, ids: &[String]) -> Vec<String> {
        ids.iter()
            .map(|id| {
                self.catalog
                    .iter()
                    .find(|a| &a.id == id)
                    .map_or_else(|| id.clone(), |a| a.title.clone())
            })
            .collect()
    }

    fn evaluate_achievements(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let earned = self
            .evaluator
            .evaluate(&self.catalog, &mut self.ledger, &self.history, now);
        if !earned.is_empty() {
            self.persist_achievements();
        }
        earned
    }

    fn persist_visits(&self) {
        if let Err(e) = self.store.save_visits(&self.history) {
            tracing::error!(error = %e, "Failed to persist visit history");
        }
    }

    fn persist_achievements(&self) {
        if let Err(e) = self.store.save_achievements(&self.ledger) {
            tracing::error!(error = %e, "Failed to persist achievements");
        }
    }

    /// The app came to the foreground: re-evaluate the location from scratch.
    pub fn foregrounded(&mut self, at: DateTime<Utc>) {
        self.context.is_foreground = true;
        self.context.foregrounded_at = Some(at);
        self.detector.reset_current_region();
        tracing::debug!(at = %at, "App foregrounded");
    }

    pub fn backgrounded(&mut self, at: DateTime<Utc>) {
        self.context.is_foreground = false;
        tracing::debug!(at = %at, "App backgrounded");
    }

    /// Mark a region visited by hand. Returns newly earned achievements
    /// (manual visits only count when configured to).
    pub fn add_manual_visit(
        &mut self,
        region: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<String>, TrackerError> {
        if !self.index.is_empty() && !self.index.regions().iter().any(|r| r.name == region) {
            return Err(TrackerError::UnknownRegion(region.to_string()));
        }

        self.history
            .entry(region.to_string())
            .and_modify(|visit| visit.mark_manual())
            .or_insert_with(|| RegionVisit::manual(region));
        self.persist_visits();
        tracing::info!(region, "Manual visit added");

        Ok(self.evaluate_achievements(at))
    }

    /// Hide a region from the visited list; its history is kept.
    pub fn remove_visit(&mut self, region: &str) -> bool {
        let Some(visit) = self.history.get_mut(region) else {
            return false;
        };
        visit.deactivate();
        self.persist_visits();
        tracing::info!(region, "Visit removed");
        true
    }

    pub fn set_preference(&mut self, preference: NotificationPreference) {
        self.context.preference = preference;
        if let Err(e) = self.store.save_preference(preference) {
            tracing::error!(error = %e, "Failed to persist notification preference");
        }
    }

    /// Merge state from the remote store into ours.
    ///
    /// Merging is commutative, so a sync result may land between any two
    /// local mutations without losing either.
    pub fn apply_remote(
        &mut self,
        visits: &VisitHistory,
        achievements: &AchievementLedger,
        now: DateTime<Utc>,
    ) {
        self.history = merge_histories(&self.history, visits);
        self.ledger = merge_ledgers(&self.ledger, achievements);
        self.persist_visits();
        self.persist_achievements();

        // Regions confirmed on another device may complete rules here.
        let earned = self.evaluate_achievements(now);
        tracing::info!(
            visits = self.history.len(),
            newly_earned = earned.len(),
            "Remote state applied"
        );
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            current_region: self.detector.current_region().map(str::to_string),
            visits: self.history.clone(),
            achievements: self.ledger.clone(),
            preference: self.context.preference,
            last_notified_region: self.context.last_notified_region.clone(),
        }
    }
}

/// Handle for sending work to a running [`Tracker`].
#[derive(Clone)]
pub struct TrackerHandle {
    tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
}

impl TrackerHandle {
    async fn send(&self, command: Command) -> Result<(), TrackerError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| TrackerError::WorkerStopped)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, TrackerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(command(reply_tx)).await?;
        reply_rx.await.map_err(|_| TrackerError::WorkerStopped)
    }

    /// Queue a fix; fixes are processed strictly in submission order.
    pub async fn submit_fix(&self, fix: Fix) -> Result<(), TrackerError> {
        self.send(Command::Fix(fix)).await
    }

    pub async fn foregrounded(&self, at: DateTime<Utc>) -> Result<(), TrackerError> {
        self.send(Command::Foregrounded(at)).await
    }

    pub async fn backgrounded(&self, at: DateTime<Utc>) -> Result<(), TrackerError> {
        self.send(Command::Backgrounded(at)).await
    }

    pub async fn add_manual_visit(
        &self,
        region: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<String>, TrackerError> {
        let region = region.to_string();
        self.request(|reply| Command::AddManualVisit { region, at, reply })
            .await?
    }

    pub async fn remove_visit(&self, region: &str) -> Result<bool, TrackerError> {
        let region = region.to_string();
        self.request(|reply| Command::RemoveVisit { region, reply })
            .await
    }

    pub async fn set_preference(
        &self,
        preference: NotificationPreference,
    ) -> Result<(), TrackerError> {
        self.send(Command::SetPreference(preference)).await
    }

    pub async fn apply_remote(
        &self,
        visits: VisitHistory,
        achievements: AchievementLedger,
    ) -> Result<(), TrackerError> {
        self.request(|reply| Command::ApplyRemote {
            visits,
            achievements,
            reply,
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<TrackerSnapshot, TrackerError> {
        self.request(Command::Snapshot).await
    }

    /// Ask the tracker to stop once the commands already queued are done.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Start `source` and forward its fixes to the tracker.
///
/// Refuses to start unless the source is authorized for tracking.
pub fn start_tracking<P: PositionSource>(
    source: &mut P,
    handle: TrackerHandle,
) -> Result<JoinHandle<()>, PositioningError> {
    let status = source.authorization();
    if !status.allows_tracking() {
        tracing::warn!(status = ?status, "Location tracking not authorized");
        return Err(PositioningError::NotAuthorized(status));
    }

    let mut fixes = source.start()?;
    tracing::info!(status = ?status, "Location tracking started");

    Ok(tokio::spawn(async move {
        while let Some(fix) = fixes.recv().await {
            if handle.submit_fix(fix).await.is_err() {
                tracing::warn!("Tracker stopped, dropping remaining fixes");
                break;
            }
        }
    }))
}

/// Run one sync round: snapshot local state, reconcile it with the remote
/// store and merge the result back into the tracker.
pub async fn synchronize<R: RemoteStore>(
    handle: &TrackerHandle,
    sync: &SyncService<R>,
) -> crate::error::Result<()> {
    let snapshot = handle.snapshot().await?;
    let (visits, achievements) = sync
        .sync_all(&snapshot.visits, &snapshot.achievements)
        .await?;
    handle.apply_remote(visits, achievements).await?;
    Ok(())
}
