//! Command orchestrator - the transcript-to-action state machine.
//!
//! One orchestrator task owns all conversational state (transcript window,
//! action ledger, UI mirror). Extraction and dispatch run as spawned cycle
//! tasks that report back over an internal channel; every cycle is tagged
//! with a generation, and a result is applied only if its generation still
//! equals the current one. A transcript update arriving mid-cycle bumps the
//! generation, which supersedes the in-flight cycle without aborting its
//! transport; the stale results are discarded on arrival and a fresh cycle
//! starts once the stale one settles.

use crate::backoff::Backoff;
use crate::types::{EngineError, Event, ExecutionResult, Notification, ToolExecutor};
use chrono::Utc;
use sayso_extraction::{ExtractionError, IntentExtractor, ProposedAction};
use sayso_memory::{
    ActionLedger, ActionRecord, ConversationState, DedupKey, SessionSnapshot, SessionStore,
    TranscriptWindow, UiContextMirror, UiWindow,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub session_id: String,
    /// Transcript window cap, in characters.
    pub transcript_cap: usize,
    /// Action ledger cap, in records.
    pub ledger_cap: usize,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            session_id: "voice_main".to_string(),
            transcript_cap: 2000,
            ledger_cap: 10,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Extracting,
    Dispatching,
}

/// Progress reports from spawned cycle tasks, tagged with the cycle's
/// generation so stale ones can be recognized and discarded.
enum CycleEvent {
    Extracted {
        generation: u64,
        outcome: Result<Vec<ProposedAction>, ExtractionError>,
    },
    Executed {
        generation: u64,
        action: ProposedAction,
        result: ExecutionResult,
    },
    Settled {
        generation: u64,
    },
}

/// Cloneable front door for pushing events into a running orchestrator.
#[derive(Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::Sender<Event>,
}

impl OrchestratorHandle {
    pub async fn push_transcript(&self, full: impl Into<String>) -> Result<(), EngineError> {
        self.tx
            .send(Event::Transcript(full.into()))
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    pub async fn push_ui_snapshot(&self, windows: Vec<UiWindow>) -> Result<(), EngineError> {
        self.tx
            .send(Event::UiSnapshot(windows))
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.tx
            .send(Event::Shutdown)
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    window: TranscriptWindow,
    ledger: ActionLedger,
    extractor: Arc<dyn IntentExtractor>,
    executor: Arc<dyn ToolExecutor>,
    store: Option<SessionStore>,

    events_rx: mpsc::Receiver<Event>,
    cycle_tx: mpsc::Sender<CycleEvent>,
    cycle_rx: mpsc::Receiver<CycleEvent>,
    notifications_tx: mpsc::Sender<Notification>,
    ui_tx: watch::Sender<UiContextMirror>,

    /// Latest transcript generation. Mirrored into `shared_gen` so cycle
    /// tasks can stop early between dispatches.
    generation: u64,
    shared_gen: Arc<AtomicU64>,
    inflight: Option<u64>,
    phase: Phase,
    backoff: Backoff,
    next_action_id: u64,
    shutting_down: bool,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        extractor: Arc<dyn IntentExtractor>,
        executor: Arc<dyn ToolExecutor>,
    ) -> (Self, OrchestratorHandle, mpsc::Receiver<Notification>) {
        let (events_tx, events_rx) = mpsc::channel(64);
        let (cycle_tx, cycle_rx) = mpsc::channel(64);
        let (notifications_tx, notifications_rx) = mpsc::channel(64);
        let (ui_tx, _) = watch::channel(UiContextMirror::default());

        let orchestrator = Self {
            window: TranscriptWindow::new(config.transcript_cap),
            ledger: ActionLedger::new(config.ledger_cap),
            backoff: Backoff::new(config.backoff_base, config.backoff_max),
            config,
            extractor,
            executor,
            store: None,
            events_rx,
            cycle_tx,
            cycle_rx,
            notifications_tx,
            ui_tx,
            generation: 0,
            shared_gen: Arc::new(AtomicU64::new(0)),
            inflight: None,
            phase: Phase::Idle,
            next_action_id: 1,
            shutting_down: false,
        };

        let handle = OrchestratorHandle { tx: events_tx };
        (orchestrator, handle, notifications_rx)
    }

    /// Persist the session at teardown through this store.
    pub fn with_session_store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Resume from a previously persisted session snapshot.
    pub fn with_restored_session(mut self, snapshot: SessionSnapshot) -> Self {
        self.window.apply_full(&snapshot.transcript);
        self.next_action_id = snapshot
            .actions
            .iter()
            .filter_map(|r| r.action_id.strip_prefix("act-"))
            .filter_map(|n| n.parse::<u64>().ok())
            .max()
            .map(|m| m + 1)
            .unwrap_or(1);
        self.ledger = ActionLedger::restore(self.config.ledger_cap, snapshot.actions);
        self
    }

    /// Run until shutdown. Terminal state only on session teardown: the
    /// in-flight cycle is drained first, so a side effect that already
    /// happened is committed before the session is persisted.
    pub async fn run(mut self) {
        info!(session_id = %self.config.session_id, "orchestrator started");
        loop {
            tokio::select! {
                maybe_event = self.events_rx.recv() => {
                    match maybe_event {
                        Some(Event::Transcript(full)) => self.on_transcript(full),
                        Some(Event::UiSnapshot(windows)) => self.on_ui_snapshot(windows),
                        Some(Event::Shutdown) | None => {
                            self.shutting_down = true;
                            break;
                        }
                    }
                }
                Some(cycle_event) = self.cycle_rx.recv() => {
                    self.on_cycle_event(cycle_event).await;
                }
            }
        }
        self.drain_inflight().await;
        self.teardown().await;
        info!(session_id = %self.config.session_id, "orchestrator stopped");
    }

    /// Consume cycle events until the in-flight cycle settles. Cycle tasks
    /// always report back (extraction is time-bounded, dispatch sends
    /// Settled), so this terminates.
    async fn drain_inflight(&mut self) {
        while self.inflight.is_some() {
            match self.cycle_rx.recv().await {
                Some(event) => self.on_cycle_event(event).await,
                None => break,
            }
        }
    }

    fn on_transcript(&mut self, full: String) {
        let update = self.window.apply_full(&full);
        trace!(?update, window_chars = self.window.len(), "transcript event applied");
        self.log_uncorroborable_records();

        self.generation += 1;
        self.shared_gen.store(self.generation, Ordering::SeqCst);

        if self.window.is_empty() {
            return;
        }

        if self.inflight.is_none() {
            self.start_cycle();
        } else {
            debug!(
                generation = self.generation,
                "in-flight cycle superseded; fresh cycle will start once it settles"
            );
        }
    }

    fn on_ui_snapshot(&mut self, windows: Vec<UiWindow>) {
        self.ui_tx.send_modify(|ui| ui.replace(windows));
    }

    /// Front-truncation can make a ledger record's source text unverifiable
    /// against the window. That is tolerated, never fatal.
    fn log_uncorroborable_records(&self) {
        let lost = self
            .ledger
            .records()
            .filter(|r| !self.window.contains(&r.source_text))
            .count();
        if lost > 0 {
            debug!(
                count = lost,
                "ledger records no longer corroborable against transcript window"
            );
        }
    }

    fn start_cycle(&mut self) {
        let generation = self.generation;
        let snapshot = ConversationState {
            transcript: self.window.as_str().to_string(),
            recent_actions: self.ledger.to_vec(),
            ui: self.ui_tx.borrow().clone(),
        };
        let delay = self.backoff.delay();

        self.inflight = Some(generation);
        self.set_phase(Phase::Extracting);
        debug!(generation, ?delay, "extraction cycle started");

        let extractor = Arc::clone(&self.extractor);
        let shared_gen = Arc::clone(&self.shared_gen);
        let tx = self.cycle_tx.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
                if shared_gen.load(Ordering::SeqCst) != generation {
                    debug!(generation, "superseded during backoff delay; skipping extraction");
                    let _ = tx
                        .send(CycleEvent::Extracted {
                            generation,
                            outcome: Ok(Vec::new()),
                        })
                        .await;
                    return;
                }
            }
            let outcome = extractor.extract(&snapshot).await;
            let _ = tx.send(CycleEvent::Extracted { generation, outcome }).await;
        });
    }

    async fn on_cycle_event(&mut self, event: CycleEvent) {
        match event {
            CycleEvent::Extracted { generation, outcome } => {
                self.on_extracted(generation, outcome).await;
            }
            CycleEvent::Executed {
                generation,
                action,
                result,
            } => {
                self.on_executed(generation, action, result).await;
            }
            CycleEvent::Settled { generation } => {
                self.finish_cycle(generation);
            }
        }
    }

    async fn on_extracted(
        &mut self,
        generation: u64,
        outcome: Result<Vec<ProposedAction>, ExtractionError>,
    ) {
        // Failures count against the backoff even when superseded; a run of
        // timeouts should slow the retry cadence either way.
        if outcome.is_err() {
            self.backoff.record_failure();
        }

        if generation != self.generation {
            debug!(
                generation,
                current = self.generation,
                "discarding superseded extraction result"
            );
            self.finish_cycle(generation);
            return;
        }

        // Already-running dispatches are drained to completion, but no new
        // side effect starts once teardown has begun.
        if self.shutting_down {
            debug!(generation, "shutting down; extracted proposals not dispatched");
            self.finish_cycle(generation);
            return;
        }

        match outcome {
            Ok(proposals) => {
                self.backoff.record_success();
                debug!(generation, proposed = proposals.len(), "extraction succeeded");
                let accepted = self.verify(proposals).await;
                if accepted.is_empty() {
                    self.finish_cycle(generation);
                    return;
                }

                self.set_phase(Phase::Dispatching);
                info!(generation, count = accepted.len(), "dispatching verified actions");

                let executor = Arc::clone(&self.executor);
                let shared_gen = Arc::clone(&self.shared_gen);
                let ui_rx = self.ui_tx.subscribe();
                let tx = self.cycle_tx.clone();
                tokio::spawn(async move {
                    for action in accepted {
                        // Strictly sequential: await each result before the
                        // next dispatch. Stop early once superseded; the
                        // in-flight call cannot be aborted, but its result
                        // is discarded on arrival.
                        if shared_gen.load(Ordering::SeqCst) != generation {
                            debug!(generation, "dispatch superseded; remaining actions abandoned");
                            break;
                        }
                        let ui = ui_rx.borrow().clone();
                        let result = executor.execute(&action, &ui).await;
                        if tx
                            .send(CycleEvent::Executed {
                                generation,
                                action,
                                result,
                            })
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    let _ = tx.send(CycleEvent::Settled { generation }).await;
                });
            }
            Err(error) => {
                warn!(
                    generation,
                    %error,
                    consecutive_failures = self.backoff.consecutive_failures(),
                    "extraction cycle failed"
                );
                self.notify(Notification::AssistantUnavailable {
                    message: error.to_string(),
                })
                .await;
                self.finish_cycle(generation);
            }
        }
    }

    /// Idempotence backstop, independent of the extraction service's own
    /// diffing: a proposal survives only if its source text is literally in
    /// the current window and its dedup key is unused (including keys
    /// accepted earlier in the same cycle).
    async fn verify(&mut self, proposals: Vec<ProposedAction>) -> Vec<ProposedAction> {
        let mut pending: HashSet<DedupKey> = HashSet::new();
        let mut accepted = Vec::new();

        for proposal in proposals {
            let key = DedupKey::new(&proposal.tool, &proposal.parameters, &proposal.source_text);
            let reason = if !self.window.contains(&proposal.source_text) {
                Some("source text not found in transcript window")
            } else if self.ledger.contains(&key) || pending.contains(&key) {
                Some("action already executed for this phrase")
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    debug!(tool = %proposal.tool, reason, "proposal rejected");
                    self.notify(Notification::ActionRejected {
                        tool: proposal.tool.clone(),
                        reason: reason.to_string(),
                    })
                    .await;
                }
                None => {
                    pending.insert(key);
                    accepted.push(proposal);
                }
            }
        }

        accepted
    }

    async fn on_executed(
        &mut self,
        generation: u64,
        action: ProposedAction,
        result: ExecutionResult,
    ) {
        if generation != self.generation {
            debug!(
                generation,
                tool = %action.tool,
                "discarding superseded execution result"
            );
            return;
        }

        if result.success {
            let key = DedupKey::new(&action.tool, &action.parameters, &action.source_text);
            if self.ledger.contains(&key) {
                warn!(tool = %action.tool, "dedup key reappeared at commit time; record dropped");
                return;
            }

            let record = ActionRecord {
                action_id: format!("act-{}", self.next_action_id),
                tool: action.tool,
                parameters: action.parameters,
                source_text: action.source_text,
                created_at: Utc::now(),
            };
            self.next_action_id += 1;
            self.ledger.record(record.clone());
            self.notify(Notification::ActionExecuted { record }).await;
        } else {
            let error = result
                .error
                .unwrap_or_else(|| "unknown execution failure".to_string());
            warn!(tool = %action.tool, %error, "action execution failed; not recorded");
            self.notify(Notification::ActionFailed {
                tool: action.tool,
                error,
            })
            .await;
        }
    }

    fn finish_cycle(&mut self, generation: u64) {
        self.inflight = None;
        self.set_phase(Phase::Idle);
        if !self.shutting_down && self.generation != generation && !self.window.is_empty() {
            debug!(
                stale = generation,
                current = self.generation,
                "starting fresh cycle for newer transcript"
            );
            self.start_cycle();
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            trace!(from = ?self.phase, to = ?phase, "phase transition");
            self.phase = phase;
        }
    }

    async fn notify(&self, notification: Notification) {
        if self.notifications_tx.send(notification).await.is_err() {
            debug!("notification receiver dropped");
        }
    }

    async fn teardown(&mut self) {
        if let Some(store) = &self.store {
            let snapshot = SessionSnapshot {
                session_id: self.config.session_id.clone(),
                transcript: self.window.as_str().to_string(),
                actions: self.ledger.to_vec(),
            };
            if let Err(error) = store.save(&snapshot).await {
                warn!(%error, "failed to persist session at teardown");
            }
        }
    }
}
