//! # Financial Rollup
//!
//! A library for re-deriving the financial aggregates of a small-business
//! management panel from an already-fetched snapshot of dated movements and
//! journal entries.
//!
//! ## Core Concepts
//!
//! - **Movement**: A dated inflow or outflow tied to an account
//! - **Monthly grid**: One zero-filled bucket per (account, month) in the window; the
//!   average divides by the window length, empty months included
//! - **Cash-flow ledger**: Movements folded in `(date, id)` order over an opening balance
//! - **Ledger balances**: Journal entries applied with double-entry semantics, so the
//!   raw balances always sum to zero
//!
//! Everything is a pure function of its inputs. The company being reported on
//! travels as an explicit [`CompanyContext`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_rollup::*;
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//!
//! let config = RollupConfig::new("emp-1", "2024-01:2024-03");
//! let snapshot = DataSnapshot::new("emp-1").with_movements(vec![
//!     Movement::new(1, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(), "Vendas", dec!(1000), MovementKind::Inflow),
//!     Movement::new(2, NaiveDate::from_ymd_opt(2024, 2, 5).unwrap(), "Luz", dec!(148.45), MovementKind::Outflow),
//! ]);
//!
//! let report = process_snapshot(&config, &snapshot).unwrap();
//! println!("{}", format_currency(report.cash_flow.closing_balance));
//! ```

pub mod aggregator;
pub mod balancer;
pub mod cash_flow;
pub mod chart_of_accounts;
pub mod config;
pub mod dre;
pub mod error;
pub mod export;
pub mod format;
pub mod ingestion;
pub mod schema;
pub mod source;
pub mod utils;

#[cfg(feature = "remote")]
pub mod remote;

pub use aggregator::{sum_buckets, AggregationStats, MonthlyAggregator};
pub use balancer::{
    balance_journal, BalanceSheet, LedgerAccountBalance, LedgerBalancer, LedgerBalances,
    SkippedEntry, UnknownAccountPolicy,
};
pub use cash_flow::{
    CashFlowBuilder, CashFlowLedgerEntry, CashFlowStatement, DailyBalance, MonthlyCashFlow,
};
pub use chart_of_accounts::ChartOfAccounts;
pub use config::RollupConfig;
pub use dre::{DreReport, DreSection};
pub use error::{ErrorCategory, Result, RollupError};
pub use format::{format_currency, format_date, format_percentage, month_label};
pub use ingestion::*;
pub use schema::*;
pub use source::{
    fetch_with_retry, BackoffStrategy, DataSnapshot, InMemorySource, JsonFileSource,
    MovementSource, RequestTicket, RetryPolicy, SlotUpdate, SnapshotSlot,
};

use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every aggregate derived from one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialReport {
    pub context: CompanyContext,
    pub window: ReportingWindow,
    pub accounts: BTreeMap<String, AccountAggregate>,
    /// Per-account averages rounded to `average_decimal_places`.
    pub rounded_averages: BTreeMap<String, Decimal>,
    pub aggregation_stats: AggregationStats,
    pub cash_flow: CashFlowStatement,
    pub monthly_cash_flow: Vec<MonthlyCashFlow>,
    pub ledger: LedgerBalances,
    pub balance_sheet: Option<BalanceSheet>,
    pub dre: DreReport,
    pub rejected_records: usize,
}

pub struct RollupProcessor;

impl RollupProcessor {
    pub fn process(config: &RollupConfig, snapshot: &DataSnapshot) -> Result<FinancialReport> {
        config.validate()?;
        let window = config.window()?;
        let context = config.context();

        info!(
            "Rolling up {} for company {}",
            window, context.company_id
        );
        debug!(
            "Snapshot contains {} movements, {} journal entries and {} accounts",
            snapshot.movements.len(),
            snapshot.journal_entries.len(),
            snapshot.accounts.len()
        );

        if snapshot.company_id != context.company_id {
            return Err(RollupError::DataIntegrity {
                record: "snapshot".to_string(),
                details: format!(
                    "snapshot belongs to company '{}', expected '{}'",
                    snapshot.company_id, context.company_id
                ),
            });
        }

        let company_name = context
            .company_name
            .clone()
            .unwrap_or_else(|| context.company_id.clone());
        let chart = ChartOfAccounts::from_accounts(company_name, &snapshot.accounts);

        let aggregator = MonthlyAggregator::new(window);
        let (accounts, aggregation_stats) = aggregator.aggregate_with_stats(&snapshot.movements);
        let rounded_averages = accounts
            .iter()
            .map(|(name, aggregate)| {
                (
                    name.clone(),
                    aggregate.rounded_average(config.average_decimal_places),
                )
            })
            .collect();

        let in_window: Vec<Movement> = snapshot
            .movements
            .iter()
            .filter(|m| window.contains(m.date))
            .cloned()
            .collect();
        let cash_flow = CashFlowBuilder::new(config.opening_balance).build(&in_window);
        let monthly_cash_flow = cash_flow.monthly_summary(&window);

        // balances are as of the window's last day
        let window_end = window.end_date();
        let journal: Vec<JournalEntry> = snapshot
            .journal_entries
            .iter()
            .filter(|e| e.date <= window_end)
            .cloned()
            .collect();
        let balancer = LedgerBalancer::new(&chart).with_policy(config.unknown_account_policy);
        let ledger = balancer.balance(&journal)?;
        ledger.verify_conservation(config.balance_tolerance)?;

        let balance_sheet = if chart.total_accounts() == 0 {
            None
        } else {
            Some(balancer.balance_sheet(&ledger, config.balance_tolerance)?)
        };

        let dre = DreReport::build(window, &accounts, &chart);

        if !snapshot.rejected.is_empty() {
            warn!(
                "{} source records were rejected during validation",
                snapshot.rejected.len()
            );
        }

        Ok(FinancialReport {
            context,
            window,
            accounts,
            rounded_averages,
            aggregation_stats,
            cash_flow,
            monthly_cash_flow,
            ledger,
            balance_sheet,
            dre,
            rejected_records: snapshot.rejected.len(),
        })
    }

    /// Fetches through `source` and processes the resulting snapshot.
    pub fn fetch_and_process<S: MovementSource + ?Sized>(
        config: &RollupConfig,
        source: &S,
        retry: &RetryPolicy,
    ) -> Result<FinancialReport> {
        config.validate()?;
        let snapshot = fetch_with_retry(source, &config.context(), &config.window()?, retry)?;
        Self::process(config, &snapshot)
    }
}

pub fn process_snapshot(config: &RollupConfig, snapshot: &DataSnapshot) -> Result<FinancialReport> {
    RollupProcessor::process(config, snapshot)
}
