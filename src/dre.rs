//! Income-statement (DRE) style report built on top of the monthly aggregates.

use crate::aggregator::sum_buckets;
use crate::chart_of_accounts::ChartOfAccounts;
use crate::schema::{AccountAggregate, AccountNature, MonthlyBucket, ReportingWindow};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DreSection {
    pub nature: AccountNature,
    pub title: String,
    pub rows: Vec<AccountAggregate>,
    pub subtotals: Vec<MonthlyBucket>,
    pub total: Decimal,
    pub average: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DreReport {
    pub window: ReportingWindow,
    pub revenue: DreSection,
    pub expenses: DreSection,
    /// Revenue minus expenses, month by month.
    pub net_result: Vec<MonthlyBucket>,
    pub net_total: Decimal,
    pub net_average: Decimal,
}

impl DreReport {
    /// Splits aggregates into revenue and expense sections.
    ///
    /// The chart decides the section when it knows the account (matched by
    /// name); otherwise a non-negative total is treated as revenue. Balance
    /// sheet accounts are left out. Expense rows keep the sign they carry in
    /// the aggregates (outflows are negative), and the net result is the plain
    /// sum of both sections.
    pub fn build(
        window: ReportingWindow,
        aggregates: &BTreeMap<String, AccountAggregate>,
        chart: &ChartOfAccounts,
    ) -> Self {
        let mut revenue_rows = Vec::new();
        let mut expense_rows = Vec::new();

        for aggregate in aggregates.values() {
            let nature = chart
                .find_by_name(&aggregate.account)
                .map(|a| a.nature)
                .unwrap_or(if aggregate.total.is_sign_negative() {
                    AccountNature::Expense
                } else {
                    AccountNature::Revenue
                });

            match nature {
                AccountNature::Revenue => revenue_rows.push(aggregate.clone()),
                AccountNature::Expense => expense_rows.push(aggregate.clone()),
                _ => {}
            }
        }

        let revenue = section(&window, AccountNature::Revenue, revenue_rows);
        let expenses = section(&window, AccountNature::Expense, expense_rows);

        let net_result: Vec<MonthlyBucket> = revenue
            .subtotals
            .iter()
            .zip(expenses.subtotals.iter())
            .map(|(r, e)| MonthlyBucket {
                value: r.value + e.value,
                ..r.clone()
            })
            .collect();
        let net_total = revenue.total + expenses.total;
        let net_average = net_total / Decimal::from(window.len());

        Self {
            window,
            revenue,
            expenses,
            net_result,
            net_total,
            net_average,
        }
    }

    /// Net result as a share of revenue, `None` when there is no revenue.
    pub fn net_margin(&self) -> Option<Decimal> {
        if self.revenue.total.is_zero() {
            None
        } else {
            Some(self.net_total / self.revenue.total)
        }
    }
}

fn section(
    window: &ReportingWindow,
    nature: AccountNature,
    mut rows: Vec<AccountAggregate>,
) -> DreSection {
    rows.sort_by(|a, b| a.account.cmp(&b.account));
    let subtotals = sum_buckets(window, rows.iter());
    let total: Decimal = rows.iter().map(|r| r.total).sum();
    DreSection {
        nature,
        title: nature.label().to_string(),
        average: total / Decimal::from(window.len()),
        rows,
        subtotals,
        total,
    }
}
