// ============================================================================
// STELLAR-SAVINGS - Contract Event Watcher
// ============================================================================
// Polls `getEvents` for the savings contract on a fixed cadence and
// publishes the newest events through a watch channel.
//
//   first poll    startLedger = stored ledger, clamped to the lookback window
//   later polls   paging token of the previous page
//
// The persisted ledger advances to the newest event ledger, or to the RPC's
// latest ledger when a page comes back empty. Poll failures are logged and
// the next tick tries again.
// ============================================================================

use crate::error::WalletError;
use crate::gateway::{ContractEvent, ContractGateway, EventStart};
use crate::Result;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

// ============================================================================
// CURSOR STORES
// ============================================================================

/// Persistence for the last ledger seen, keyed by contract id
pub trait CursorStore: Send + Sync {
    fn load(&self, contract_id: &str) -> Result<Option<u32>>;
    fn save(&self, contract_id: &str, ledger: u32) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    cursors: Mutex<HashMap<String, u32>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CursorStore for MemoryCursorStore {
    fn load(&self, contract_id: &str) -> Result<Option<u32>> {
        let cursors = self
            .cursors
            .lock()
            .map_err(|_| WalletError::Storage("cursor lock poisoned".into()))?;
        Ok(cursors.get(contract_id).copied())
    }

    fn save(&self, contract_id: &str, ledger: u32) -> Result<()> {
        let mut cursors = self
            .cursors
            .lock()
            .map_err(|_| WalletError::Storage("cursor lock poisoned".into()))?;
        cursors.insert(contract_id.to_string(), ledger);
        Ok(())
    }
}

/// Cursors in a small JSON object on disk: `{"C...": 123456}`
#[derive(Debug)]
pub struct JsonFileCursorStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<HashMap<String, u32>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(HashMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl CursorStore for JsonFileCursorStore {
    fn load(&self, contract_id: &str) -> Result<Option<u32>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| WalletError::Storage("cursor file lock poisoned".into()))?;
        Ok(self.read_all()?.get(contract_id).copied())
    }

    fn save(&self, contract_id: &str, ledger: u32) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| WalletError::Storage("cursor file lock poisoned".into()))?;

        let mut cursors = self.read_all()?;
        cursors.insert(contract_id.to_string(), ledger);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&cursors)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

// ============================================================================
// WATCHER
// ============================================================================

/// Events kept in the displayed list
pub const EVENT_LIST_LIMIT: usize = 15;

/// Combine the displayed list with a fresh page: unique ids, newest first.
pub fn merge_events(
    current: Vec<ContractEvent>,
    incoming: Vec<ContractEvent>,
    limit: usize,
) -> Vec<ContractEvent> {
    let mut merged: Vec<ContractEvent> = incoming.into_iter().chain(current).collect();
    merged.sort_by(|a, b| b.ledger.cmp(&a.ledger).then_with(|| b.id.cmp(&a.id)));

    let mut seen = HashSet::new();
    merged.retain(|e| seen.insert(e.id.clone()));
    merged.truncate(limit);
    merged
}

pub struct EventWatcher {
    gateway: Arc<dyn ContractGateway>,
    store: Arc<dyn CursorStore>,
    contract_id: String,
    lookback: u32,
    limit: u32,
    interval: Duration,
    cursor: Option<u32>,
    paging: Option<String>,
    events: Vec<ContractEvent>,
}

impl EventWatcher {
    pub fn new(
        gateway: Arc<dyn ContractGateway>,
        store: Arc<dyn CursorStore>,
        contract_id: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            store,
            contract_id: contract_id.into(),
            lookback: 5000,
            limit: 15,
            interval: Duration::from_secs(5),
            cursor: None,
            paging: None,
            events: Vec::new(),
        }
    }

    pub fn lookback(mut self, ledgers: u32) -> Self {
        self.lookback = ledgers;
        self
    }

    /// Page size of each `getEvents` request
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    /// Ledger the watcher has read up to, once known
    pub fn cursor(&self) -> Option<u32> {
        self.cursor
    }

    /// Where polling starts.
    ///
    /// A stored cursor is clamped into `[latest - lookback, latest]`; without
    /// one polling starts at the bottom of that window. If the latest ledger
    /// is unknown the stored cursor (or ledger 1) is used as is.
    pub async fn start_ledger(&self) -> u32 {
        let stored = match self.store.load(&self.contract_id) {
            Ok(cursor) => cursor,
            Err(e) => {
                warn!("Could not read event cursor for {}: {}", self.contract_id, e);
                None
            }
        };

        match self.gateway.get_latest_ledger().await {
            Ok(latest) => {
                let floor = latest.saturating_sub(self.lookback).max(1);
                match stored {
                    Some(cursor) => cursor.clamp(floor, latest.max(floor)),
                    None => floor,
                }
            }
            Err(e) => {
                warn!("Latest ledger unavailable, starting from cursor: {}", e);
                stored.unwrap_or(1).max(1)
            }
        }
    }

    /// Fetch one page and return the updated list
    pub async fn poll_once(&mut self) -> Result<Vec<ContractEvent>> {
        let start = match (&self.paging, self.cursor) {
            (Some(token), _) => EventStart::After(token.clone()),
            (None, Some(ledger)) => EventStart::Ledger(ledger),
            (None, None) => {
                let ledger = self.start_ledger().await;
                info!("Watching {} from ledger {}", self.contract_id, ledger);
                self.cursor = Some(ledger);
                EventStart::Ledger(ledger)
            }
        };

        let page = self
            .gateway
            .get_events(&self.contract_id, &start, self.limit)
            .await?;
        debug!("{} events from {:?}", page.events.len(), start);

        let reached = page
            .events
            .iter()
            .map(|e| e.ledger)
            .max()
            .unwrap_or(page.latest_ledger);
        if self.cursor.map_or(true, |cursor| reached > cursor) {
            self.cursor = Some(reached);
            if let Err(e) = self.store.save(&self.contract_id, reached) {
                warn!("Could not persist event cursor: {}", e);
            }
        }

        // keep the old token when the RPC returns none for an empty page
        if let Some(token) = page
            .cursor
            .clone()
            .or_else(|| page.events.last().map(|e| e.id.clone()))
        {
            self.paging = Some(token);
        }

        let current = std::mem::take(&mut self.events);
        self.events = merge_events(current, page.events, EVENT_LIST_LIMIT);
        Ok(self.events.clone())
    }

    /// Run the poll loop on the tokio runtime
    pub fn spawn(mut self) -> WatcherHandle {
        let (shutdown, mut rx) = watch::channel(false);
        let (events_tx, events_rx) = watch::channel(Vec::new());
        let period = self.interval.max(Duration::from_millis(1));

        let worker = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.poll_once().await {
                            Ok(events) => {
                                events_tx.send_replace(events);
                            }
                            Err(err) => warn!(
                                contract = %self.contract_id,
                                error = %err,
                                "event poll failed"
                            ),
                        }
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Event watcher for {} stopped", self.contract_id);
        });

        WatcherHandle {
            shutdown,
            events: events_rx,
            worker: Some(worker),
        }
    }
}

/// Owner of a running watcher; dropping it stops the task
pub struct WatcherHandle {
    shutdown: watch::Sender<bool>,
    events: watch::Receiver<Vec<ContractEvent>>,
    worker: Option<JoinHandle<()>>,
}

impl WatcherHandle {
    /// Latest published list
    pub fn events(&self) -> Vec<ContractEvent> {
        self.events.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<ContractEvent>> {
        self.events.clone()
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Signal the loop and wait for it to exit
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                debug!(?err, "event watcher exited with error");
            }
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}
