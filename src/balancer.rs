use crate::chart_of_accounts::ChartOfAccounts;
use crate::error::{Result, RollupError};
use crate::schema::{AccountId, AccountNature, JournalEntry};
use log::{debug, warn};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What to do with a journal entry that names an account missing from the chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnknownAccountPolicy {
    /// Leave both accounts untouched and record the entry in `skipped`.
    #[default]
    Skip,
    /// Abort with [`RollupError::UnknownAccount`].
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerAccountBalance {
    pub account_id: AccountId,
    /// Debit-positive balance.
    pub balance: Decimal,
    /// Balance as displayed: credit-normal accounts are sign-flipped so that
    /// increases read positive.
    pub reported_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub entry_id: u64,
    pub unknown_accounts: Vec<AccountId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerBalances {
    pub balances: BTreeMap<AccountId, LedgerAccountBalance>,
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub assets: Decimal,
    pub liabilities: Decimal,
    pub equity: Decimal,
    pub revenue: Decimal,
    pub expenses: Decimal,
    /// `revenue - expenses`, the period result not yet closed into equity.
    pub result: Decimal,
}

impl BalanceSheet {
    pub fn difference(&self) -> Decimal {
        self.assets - (self.liabilities + self.equity + self.result)
    }
}

pub struct LedgerBalancer<'a> {
    chart: &'a ChartOfAccounts,
    policy: UnknownAccountPolicy,
}

impl<'a> LedgerBalancer<'a> {
    pub fn new(chart: &'a ChartOfAccounts) -> Self {
        Self {
            chart,
            policy: UnknownAccountPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: UnknownAccountPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn balance(&self, entries: &[JournalEntry]) -> Result<LedgerBalances> {
        let mut raw: BTreeMap<AccountId, Decimal> = self
            .chart
            .iter()
            .map(|a| (a.id.clone(), Decimal::ZERO))
            .collect();
        let mut skipped = Vec::new();

        for entry in entries {
            let unknown: Vec<AccountId> = [&entry.debit_account, &entry.credit_account]
                .into_iter()
                .filter(|id| !raw.contains_key(*id))
                .cloned()
                .collect();

            if let Some(first) = unknown.first() {
                match self.policy {
                    UnknownAccountPolicy::Reject => {
                        return Err(RollupError::UnknownAccount {
                            entry_id: entry.id,
                            account_id: first.to_string(),
                        });
                    }
                    UnknownAccountPolicy::Skip => {
                        warn!(
                            "Skipping journal entry {}: unknown account(s) {:?}",
                            entry.id, unknown
                        );
                        skipped.push(SkippedEntry {
                            entry_id: entry.id,
                            unknown_accounts: unknown,
                        });
                        continue;
                    }
                }
            }

            if let Some(debit) = raw.get_mut(&entry.debit_account) {
                *debit += entry.amount;
            }
            if let Some(credit) = raw.get_mut(&entry.credit_account) {
                *credit -= entry.amount;
            }
        }

        debug!(
            "Applied {} journal entries to {} accounts ({} skipped)",
            entries.len() - skipped.len(),
            raw.len(),
            skipped.len()
        );

        let balances = raw
            .into_iter()
            .map(|(account_id, balance)| {
                let reported_balance = match self.chart.nature_of(&account_id) {
                    Some(nature) => reported(nature, balance),
                    None => balance,
                };
                (
                    account_id.clone(),
                    LedgerAccountBalance {
                        account_id,
                        balance,
                        reported_balance,
                    },
                )
            })
            .collect();

        Ok(LedgerBalances { balances, skipped })
    }

    /// Rolls balances up by nature; fails if the accounting equation does not
    /// hold within `tolerance`.
    pub fn balance_sheet(&self, balances: &LedgerBalances, tolerance: Decimal) -> Result<BalanceSheet> {
        let mut sheet = BalanceSheet {
            assets: Decimal::ZERO,
            liabilities: Decimal::ZERO,
            equity: Decimal::ZERO,
            revenue: Decimal::ZERO,
            expenses: Decimal::ZERO,
            result: Decimal::ZERO,
        };

        for balance in balances.balances.values() {
            let Some(nature) = self.chart.nature_of(&balance.account_id) else {
                continue;
            };
            let value = balance.reported_balance;
            match nature {
                AccountNature::Asset => sheet.assets += value,
                AccountNature::Liability => sheet.liabilities += value,
                AccountNature::Equity => sheet.equity += value,
                AccountNature::Revenue => sheet.revenue += value,
                AccountNature::Expense => sheet.expenses += value,
            }
        }
        sheet.result = sheet.revenue - sheet.expenses;

        if sheet.difference().abs() > tolerance {
            return Err(RollupError::BalanceSheetMismatch {
                assets: sheet.assets,
                liabilities: sheet.liabilities,
                equity: sheet.equity,
                result: sheet.result,
            });
        }

        Ok(sheet)
    }
}

fn reported(nature: AccountNature, balance: Decimal) -> Decimal {
    if nature.is_debit_normal() {
        balance
    } else {
        -balance
    }
}

impl LedgerBalances {
    pub fn get(&self, id: &AccountId) -> Option<&LedgerAccountBalance> {
        self.balances.get(id)
    }

    pub fn raw_sum(&self) -> Decimal {
        self.balances.values().map(|b| b.balance).sum()
    }

    /// Every applied entry moves the same amount in and out, so raw balances
    /// must sum to zero.
    pub fn verify_conservation(&self, tolerance: Decimal) -> Result<()> {
        let sum = self.raw_sum();
        if sum.abs() > tolerance {
            return Err(RollupError::ConservationViolation { sum, tolerance });
        }
        Ok(())
    }
}

pub fn balance_journal(
    chart: &ChartOfAccounts,
    entries: &[JournalEntry],
    policy: UnknownAccountPolicy,
) -> Result<LedgerBalances> {
    LedgerBalancer::new(chart).with_policy(policy).balance(entries)
}
