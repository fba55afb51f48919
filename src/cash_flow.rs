//! Running-balance cash-flow ledger.
//!
//! Movements are folded strictly in `(date, id)` order over an opening
//! balance. Each step depends on the previous balance, so the fold is
//! sequential by nature.

use crate::schema::{MonthKey, Movement, ReportingWindow};
use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowLedgerEntry {
    pub movement: Movement,
    pub running_balance: Decimal,
}

impl CashFlowLedgerEntry {
    pub fn date(&self) -> NaiveDate {
        self.movement.date
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowStatement {
    pub opening_balance: Decimal,
    pub entries: Vec<CashFlowLedgerEntry>,
    pub total_inflow: Decimal,
    pub total_outflow: Decimal,
    /// `opening_balance + total_inflow - total_outflow`
    pub closing_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBalance {
    pub date: NaiveDate,
    pub inflow: Decimal,
    pub outflow: Decimal,
    pub net_change: Decimal,
    pub closing_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCashFlow {
    pub month: MonthKey,
    pub inflow: Decimal,
    pub outflow: Decimal,
    pub net_change: Decimal,
    pub closing_balance: Decimal,
}

pub struct CashFlowBuilder {
    opening_balance: Decimal,
}

impl CashFlowBuilder {
    pub fn new(opening_balance: Decimal) -> Self {
        Self { opening_balance }
    }

    pub fn build(&self, movements: &[Movement]) -> CashFlowStatement {
        let mut ordered: Vec<&Movement> = movements.iter().collect();
        // stable: equal (date, id) pairs keep input order
        ordered.sort_by_key(|m| (m.date, m.id));

        let mut balance = self.opening_balance;
        let mut total_inflow = Decimal::ZERO;
        let mut total_outflow = Decimal::ZERO;
        let mut entries = Vec::with_capacity(ordered.len());

        for movement in ordered {
            let (inflow, outflow) = split_amount(movement.amount);
            total_inflow += inflow;
            total_outflow += outflow;
            balance += movement.amount;
            entries.push(CashFlowLedgerEntry {
                movement: movement.clone(),
                running_balance: balance,
            });
        }

        debug!(
            "Built cash-flow ledger with {} entries: opening {}, closing {}",
            entries.len(),
            self.opening_balance,
            balance
        );

        CashFlowStatement {
            opening_balance: self.opening_balance,
            entries,
            total_inflow,
            total_outflow,
            closing_balance: balance,
        }
    }
}

/// Splits a signed amount into its (inflow, outflow) magnitudes.
fn split_amount(amount: Decimal) -> (Decimal, Decimal) {
    if amount.is_sign_negative() {
        (Decimal::ZERO, -amount)
    } else {
        (amount, Decimal::ZERO)
    }
}

impl CashFlowStatement {
    pub fn net_change(&self) -> Decimal {
        self.total_inflow - self.total_outflow
    }

    /// Balance after the last movement on or before `date`.
    pub fn balance_on(&self, date: NaiveDate) -> Decimal {
        self.entries
            .iter()
            .take_while(|e| e.date() <= date)
            .last()
            .map(|e| e.running_balance)
            .unwrap_or(self.opening_balance)
    }

    /// One row per day that has movements.
    pub fn daily_balances(&self) -> Vec<DailyBalance> {
        let mut days: BTreeMap<NaiveDate, DailyBalance> = BTreeMap::new();

        for entry in &self.entries {
            let day = days.entry(entry.date()).or_insert_with(|| DailyBalance {
                date: entry.date(),
                inflow: Decimal::ZERO,
                outflow: Decimal::ZERO,
                net_change: Decimal::ZERO,
                closing_balance: Decimal::ZERO,
            });
            let (inflow, outflow) = split_amount(entry.movement.amount);
            day.inflow += inflow;
            day.outflow += outflow;
            day.net_change += entry.movement.amount;
            day.closing_balance = entry.running_balance;
        }

        days.into_values().collect()
    }

    /// Per-month totals over the window. Months without movements carry the
    /// previous closing balance forward.
    pub fn monthly_summary(&self, window: &ReportingWindow) -> Vec<MonthlyCashFlow> {
        let mut months: BTreeMap<MonthKey, MonthlyCashFlow> = window
            .months()
            .into_iter()
            .map(|month| {
                (
                    month,
                    MonthlyCashFlow {
                        month,
                        inflow: Decimal::ZERO,
                        outflow: Decimal::ZERO,
                        net_change: Decimal::ZERO,
                        closing_balance: Decimal::ZERO,
                    },
                )
            })
            .collect();

        let mut balance = self.balance_on(
            window
                .start_date()
                .pred_opt()
                .unwrap_or(NaiveDate::MIN),
        );

        for summary in months.values_mut() {
            for entry in self
                .entries
                .iter()
                .filter(|e| MonthKey::from_date(e.date()) == summary.month)
            {
                let (inflow, outflow) = split_amount(entry.movement.amount);
                summary.inflow += inflow;
                summary.outflow += outflow;
                summary.net_change += entry.movement.amount;
            }
            balance += summary.net_change;
            summary.closing_balance = balance;
        }

        months.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MovementKind;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_closing_balance_scenario() {
        let movements = vec![
            Movement::new(1, date(2024, 1, 2), "Vendas", dec!(600.00), MovementKind::Inflow),
            Movement::new(2, date(2024, 1, 5), "Aluguel", dec!(400.00), MovementKind::Outflow),
            Movement::new(3, date(2024, 1, 9), "Vendas", dec!(400.00), MovementKind::Inflow),
        ];

        let statement = CashFlowBuilder::new(dec!(50.00)).build(&movements);
        assert_eq!(statement.total_inflow, dec!(1000.00));
        assert_eq!(statement.total_outflow, dec!(400.00));
        assert_eq!(statement.closing_balance, dec!(650.00));
        assert_eq!(statement.net_change(), dec!(600.00));

        let running: Vec<Decimal> = statement.entries.iter().map(|e| e.running_balance).collect();
        assert_eq!(running, vec![dec!(650.00), dec!(250.00), dec!(650.00)]);
    }

    #[test]
    fn test_totals_follow_amount_sign_when_kind_disagrees() {
        let mut refund = Movement::signed(1, date(2024, 1, 3), "Vendas", dec!(100));
        refund.kind = MovementKind::Outflow;
        let mut fee = Movement::signed(2, date(2024, 1, 4), "Taxas", dec!(-30));
        fee.kind = MovementKind::Inflow;

        let statement = CashFlowBuilder::new(Decimal::ZERO).build(&[refund, fee]);
        assert_eq!(statement.total_inflow, dec!(100));
        assert_eq!(statement.total_outflow, dec!(30));
        assert_eq!(statement.entries[1].running_balance, dec!(70));
        assert_eq!(statement.closing_balance, dec!(70));
        assert_eq!(
            statement.closing_balance,
            statement.opening_balance + statement.net_change()
        );
    }

    #[test]
    fn test_same_day_ties_break_by_id() {
        let day = date(2024, 3, 1);
        let movements = vec![
            Movement::signed(9, day, "B", dec!(-30)),
            Movement::signed(2, day, "A", dec!(100)),
            Movement::signed(5, date(2024, 2, 28), "C", dec!(10)),
        ];

        let statement = CashFlowBuilder::new(Decimal::ZERO).build(&movements);
        let ids: Vec<u64> = statement.entries.iter().map(|e| e.movement.id).collect();
        assert_eq!(ids, vec![5, 2, 9]);
        assert_eq!(statement.entries[1].running_balance, dec!(110));
        assert_eq!(statement.entries[2].running_balance, dec!(80));
    }

    #[test]
    fn test_empty_ledger_keeps_opening_balance() {
        let statement = CashFlowBuilder::new(dec!(123.45)).build(&[]);
        assert!(statement.entries.is_empty());
        assert_eq!(statement.closing_balance, dec!(123.45));
        assert_eq!(statement.balance_on(date(2030, 1, 1)), dec!(123.45));
    }

    #[test]
    fn test_daily_balances() {
        let movements = vec![
            Movement::signed(1, date(2024, 1, 2), "Vendas", dec!(100)),
            Movement::signed(2, date(2024, 1, 2), "Taxas", dec!(-5)),
            Movement::signed(3, date(2024, 1, 3), "Luz", dec!(-20)),
        ];

        let days = CashFlowBuilder::new(dec!(10)).build(&movements).daily_balances();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].inflow, dec!(100));
        assert_eq!(days[0].outflow, dec!(5));
        assert_eq!(days[0].net_change, dec!(95));
        assert_eq!(days[0].closing_balance, dec!(105));
        assert_eq!(days[1].closing_balance, dec!(85));
    }

    #[test]
    fn test_monthly_summary_carries_balance_through_idle_months() {
        let window = ReportingWindow::parse("2024-01:2024-04").unwrap();
        let movements = vec![
            Movement::signed(1, date(2023, 12, 20), "Vendas", dec!(40)),
            Movement::signed(2, date(2024, 1, 10), "Vendas", dec!(100)),
            Movement::signed(3, date(2024, 3, 15), "Luz", dec!(-30)),
        ];

        let statement = CashFlowBuilder::new(dec!(10)).build(&movements);
        let months = statement.monthly_summary(&window);

        assert_eq!(months.len(), 4);
        assert_eq!(months[0].inflow, dec!(100));
        assert_eq!(months[0].closing_balance, dec!(150));
        assert_eq!(months[1].net_change, Decimal::ZERO);
        assert_eq!(months[1].closing_balance, dec!(150));
        assert_eq!(months[2].outflow, dec!(30));
        assert_eq!(months[2].closing_balance, dec!(120));
        assert_eq!(months[3].closing_balance, dec!(120));
    }
}
