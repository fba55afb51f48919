//! Data sources feeding the aggregation core.
//!
//! A source returns one [`DataSnapshot`] per request. The snapshot is treated
//! as atomic: no partial results, no streaming.

use crate::error::{ErrorCategory, Result, RollupError};
use crate::ingestion::{
    validate_accounts, validate_journal_entries, validate_movements, RawAccountRecord,
    RawJournalRecord, RawMovementRecord, RejectedRecord,
};
use crate::schema::{CompanyContext, JournalEntry, LedgerAccount, Movement, ReportingWindow};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSnapshot {
    pub company_id: String,
    pub movements: Vec<Movement>,
    pub journal_entries: Vec<JournalEntry>,
    pub accounts: Vec<LedgerAccount>,
    pub rejected: Vec<RejectedRecord>,
    pub fetched_at: DateTime<Utc>,
}

impl DataSnapshot {
    pub fn new(company_id: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            movements: Vec::new(),
            journal_entries: Vec::new(),
            accounts: Vec::new(),
            rejected: Vec::new(),
            fetched_at: Utc::now(),
        }
    }

    pub fn with_movements(mut self, movements: Vec<Movement>) -> Self {
        self.movements = movements;
        self
    }

    pub fn with_journal_entries(mut self, entries: Vec<JournalEntry>) -> Self {
        self.journal_entries = entries;
        self
    }

    pub fn with_accounts(mut self, accounts: Vec<LedgerAccount>) -> Self {
        self.accounts = accounts;
        self
    }

    /// Validates raw rows into a snapshot, keeping every rejection.
    pub fn from_raw(
        company_id: impl Into<String>,
        movements: &[RawMovementRecord],
        journal_entries: &[RawJournalRecord],
        accounts: &[RawAccountRecord],
    ) -> Self {
        let movements = validate_movements(movements);
        let entries = validate_journal_entries(journal_entries);
        let accounts = validate_accounts(accounts);

        let mut rejected = Vec::new();
        for (what, list) in [
            ("movement", movements.rejected),
            ("journal entry", entries.rejected),
            ("account", accounts.rejected),
        ] {
            rejected.extend(list.into_iter().map(|r| RejectedRecord {
                index: r.index,
                reason: format!("{}: {}", what, r.reason),
            }));
        }

        Self {
            company_id: company_id.into(),
            movements: movements.accepted,
            journal_entries: entries.accepted,
            accounts: accounts.accepted,
            rejected,
            fetched_at: Utc::now(),
        }
    }

    /// Keeps movements dated inside `window` and journal entries dated up to
    /// its last day. Earlier journal entries stay: balances are cumulative.
    pub fn restricted_to(mut self, window: &ReportingWindow) -> Self {
        let end = window.end_date();
        self.movements.retain(|m| window.contains(m.date));
        self.journal_entries.retain(|e| e.date <= end);
        self
    }
}

pub trait MovementSource {
    fn fetch(&self, context: &CompanyContext, window: &ReportingWindow) -> Result<DataSnapshot>;
}

/// Snapshots held in memory, keyed by company id.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    snapshots: HashMap<String, DataSnapshot>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, snapshot: DataSnapshot) {
        self.snapshots.insert(snapshot.company_id.clone(), snapshot);
    }
}

impl MovementSource for InMemorySource {
    fn fetch(&self, context: &CompanyContext, window: &ReportingWindow) -> Result<DataSnapshot> {
        let snapshot = self
            .snapshots
            .get(&context.company_id)
            .cloned()
            .unwrap_or_else(|| DataSnapshot::new(context.company_id.clone()));
        Ok(snapshot.restricted_to(window))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SnapshotDocument {
    #[serde(default, alias = "empresa_id")]
    company_id: Option<String>,
    #[serde(default, alias = "movimentos", alias = "fluxo_caixa")]
    movements: Vec<RawMovementRecord>,
    #[serde(default, alias = "lancamentos")]
    journal_entries: Vec<RawJournalRecord>,
    #[serde(default, alias = "plano_contas")]
    accounts: Vec<RawAccountRecord>,
}

/// Reads a JSON export of one company's rows.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl MovementSource for JsonFileSource {
    fn fetch(&self, context: &CompanyContext, window: &ReportingWindow) -> Result<DataSnapshot> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| {
            RollupError::Fetch(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let document: SnapshotDocument = serde_json::from_str(&text)?;

        if let Some(owner) = &document.company_id {
            if owner != &context.company_id {
                return Err(RollupError::Fetch(format!(
                    "{} holds data for company '{}', not '{}'",
                    self.path.display(),
                    owner,
                    context.company_id
                )));
            }
        }

        let snapshot = DataSnapshot::from_raw(
            context.company_id.clone(),
            &document.movements,
            &document.journal_entries,
            &document.accounts,
        );
        if !snapshot.rejected.is_empty() {
            warn!(
                "{} rows in {} failed validation",
                snapshot.rejected.len(),
                self.path.display()
            );
        }

        Ok(snapshot.restricted_to(window))
    }
}

/// Ticket identifying one fetch request; newer tickets supersede older ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotUpdate {
    Applied,
    /// A newer request was issued; the response was discarded.
    Stale,
}

/// Holds the last good snapshot, accepting only the newest request's response.
#[derive(Debug, Default)]
pub struct SnapshotSlot {
    issued: u64,
    current: Option<Arc<DataSnapshot>>,
    last_error: Option<ErrorCategory>,
}

impl SnapshotSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_request(&mut self) -> RequestTicket {
        self.issued += 1;
        RequestTicket(self.issued)
    }

    /// Applies a completed fetch. On failure the previous snapshot stays in
    /// place and the error is returned to the caller.
    pub fn complete(
        &mut self,
        ticket: RequestTicket,
        result: Result<DataSnapshot>,
    ) -> Result<SlotUpdate> {
        if ticket.0 != self.issued {
            debug!(
                "Dropping response for request {} (latest is {})",
                ticket.0, self.issued
            );
            return Ok(SlotUpdate::Stale);
        }

        match result {
            Ok(snapshot) => {
                self.current = Some(Arc::new(snapshot));
                self.last_error = None;
                Ok(SlotUpdate::Applied)
            }
            Err(e) => {
                warn!("Fetch for request {} failed: {}", ticket.0, e);
                self.last_error = Some(e.category());
                Err(e)
            }
        }
    }

    pub fn current(&self) -> Option<Arc<DataSnapshot>> {
        self.current.clone()
    }

    pub fn last_error(&self) -> Option<ErrorCategory> {
        self.last_error
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackoffStrategy {
    Constant,
    Linear,
    Exponential,
}

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff: BackoffStrategy,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff: BackoffStrategy::Exponential,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = match self.backoff {
            BackoffStrategy::Constant => self.initial_delay,
            BackoffStrategy::Linear => self.initial_delay * attempt,
            BackoffStrategy::Exponential => {
                self.initial_delay * 2_u32.saturating_pow(attempt.saturating_sub(1))
            }
        };
        let delay = base.min(self.max_delay);

        if self.jitter && !delay.is_zero() {
            delay + Duration::from_millis(rand::random::<u64>() % 100)
        } else {
            delay
        }
    }

    /// Only transport-level failures are worth another attempt.
    pub fn should_retry(&self, error: &RollupError, attempt: u32) -> bool {
        attempt < self.max_attempts && error.category() == ErrorCategory::Fetch
    }
}

/// Fetches from a blocking source, retrying fetch failures per `policy`.
pub fn fetch_with_retry<S: MovementSource + ?Sized>(
    source: &S,
    context: &CompanyContext,
    window: &ReportingWindow,
    policy: &RetryPolicy,
) -> Result<DataSnapshot> {
    let mut attempt = 1;
    loop {
        match source.fetch(context, window) {
            Ok(snapshot) => {
                info!(
                    "Fetched {} movements and {} journal entries for company {} ({})",
                    snapshot.movements.len(),
                    snapshot.journal_entries.len(),
                    context.company_id,
                    window
                );
                return Ok(snapshot);
            }
            Err(e) if policy.should_retry(&e, attempt) => {
                let delay = policy.delay_for_attempt(attempt);
                warn!("Fetch attempt {} failed ({}); retrying in {:?}", attempt, e, delay);
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
