use crate::chart_of_accounts::ChartOfAccounts;
use crate::schema::{AccountAggregate, MonthKey, MonthlyBucket, Movement, ReportingWindow};
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counters for movements that did not land in any bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationStats {
    pub folded: usize,
    pub outside_window: usize,
    pub unbucketed: usize,
}

pub struct MonthlyAggregator {
    window: ReportingWindow,
    months: Vec<MonthKey>,
}

impl MonthlyAggregator {
    pub fn new(window: ReportingWindow) -> Self {
        Self {
            months: window.months(),
            window,
        }
    }

    /// Groups movements by account, one zero-filled bucket per month of the window.
    pub fn aggregate(&self, movements: &[Movement]) -> BTreeMap<String, AccountAggregate> {
        self.aggregate_with_stats(movements).0
    }

    pub fn aggregate_with_stats(
        &self,
        movements: &[Movement],
    ) -> (BTreeMap<String, AccountAggregate>, AggregationStats) {
        let keys = movements.iter().map(|m| m.account.clone());
        self.fold(keys, movements, |m| Some(m.account.as_str()))
    }

    /// Like [`aggregate`](Self::aggregate), but every account in the chart is
    /// seeded too, so accounts without movements still show as zero rows.
    pub fn aggregate_with_chart(
        &self,
        movements: &[Movement],
        chart: &ChartOfAccounts,
    ) -> BTreeMap<String, AccountAggregate> {
        let keys = chart
            .iter()
            .map(|a| a.name.clone())
            .chain(movements.iter().map(|m| m.account.clone()));
        self.fold(keys, movements, |m| Some(m.account.as_str())).0
    }

    /// Groups by movement category; uncategorised movements go under "Sem categoria".
    pub fn aggregate_by_category(&self, movements: &[Movement]) -> BTreeMap<String, AccountAggregate> {
        let keys = movements.iter().map(|m| category_of(m).to_string());
        self.fold(keys, movements, |m| Some(category_of(m))).0
    }

    fn fold<'m, K, F>(
        &self,
        seed_keys: K,
        movements: &'m [Movement],
        key_of: F,
    ) -> (BTreeMap<String, AccountAggregate>, AggregationStats)
    where
        K: IntoIterator<Item = String>,
        F: Fn(&'m Movement) -> Option<&'m str>,
    {
        let mut grid: BTreeMap<String, BTreeMap<MonthKey, Decimal>> = BTreeMap::new();
        for key in seed_keys {
            grid.entry(key).or_insert_with(|| {
                self.months
                    .iter()
                    .map(|month| (*month, Decimal::ZERO))
                    .collect()
            });
        }

        let mut stats = AggregationStats::default();

        for movement in movements {
            if !self.window.contains(movement.date) {
                stats.outside_window += 1;
                continue;
            }

            let slot = match key_of(movement) {
                Some(key) => grid
                    .get_mut(key)
                    .and_then(|months| months.get_mut(&movement.month())),
                None => None,
            };

            match slot {
                Some(value) => {
                    *value += movement.amount;
                    stats.folded += 1;
                }
                None => stats.unbucketed += 1,
            }
        }

        if stats.outside_window > 0 || stats.unbucketed > 0 {
            debug!(
                "Skipped {} movements outside {} and {} without a bucket",
                stats.outside_window, self.window, stats.unbucketed
            );
        }

        let period_count = Decimal::from(self.window.len());
        let result = grid
            .into_iter()
            .map(|(key, months)| {
                let buckets: Vec<MonthlyBucket> = months
                    .into_iter()
                    .map(|(month, value)| MonthlyBucket {
                        value,
                        ..MonthlyBucket::zero(month)
                    })
                    .collect();
                let total: Decimal = buckets.iter().map(|b| b.value).sum();
                let average = total / period_count;
                (
                    key.clone(),
                    AccountAggregate {
                        account: key,
                        buckets,
                        total,
                        average,
                    },
                )
            })
            .collect();

        (result, stats)
    }
}

pub const UNCATEGORIZED_LABEL: &str = "Sem categoria";

fn category_of(movement: &Movement) -> &str {
    movement
        .category
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .unwrap_or(UNCATEGORIZED_LABEL)
}

/// Per-month totals across several aggregates, zero-filled over the window.
pub fn sum_buckets<'a, I>(window: &ReportingWindow, aggregates: I) -> Vec<MonthlyBucket>
where
    I: IntoIterator<Item = &'a AccountAggregate>,
{
    let mut totals: BTreeMap<MonthKey, Decimal> = window
        .months()
        .into_iter()
        .map(|m| (m, Decimal::ZERO))
        .collect();

    for aggregate in aggregates {
        for bucket in &aggregate.buckets {
            if let Some(total) = totals.get_mut(&bucket.key()) {
                *total += bucket.value;
            }
        }
    }

    totals
        .into_iter()
        .map(|(month, value)| MonthlyBucket {
            value,
            ..MonthlyBucket::zero(month)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AccountNature, LedgerAccount};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn luz_movements() -> Vec<Movement> {
        let values = [
            (2023, 3, dec!(-148.45)),
            (2023, 4, dec!(-82.83)),
            (2023, 6, dec!(-210.75)),
            (2023, 8, dec!(-193.90)),
            (2023, 9, dec!(-84.64)),
            (2023, 10, dec!(-84.14)),
            (2023, 11, dec!(-93.47)),
            (2023, 12, dec!(-84.76)),
            (2024, 1, dec!(-198.53)),
            (2024, 2, dec!(-279.98)),
        ];
        values
            .iter()
            .enumerate()
            .map(|(i, (y, m, v))| Movement::signed(i as u64 + 1, date(*y, *m, 10), "Luz", *v))
            .collect()
    }

    #[test]
    fn test_average_includes_zero_months() {
        let window = ReportingWindow::parse("2023-03:2024-02").unwrap();
        let result = MonthlyAggregator::new(window).aggregate(&luz_movements());

        let luz = result.get("Luz").unwrap();
        assert_eq!(luz.buckets.len(), 12);
        assert_eq!(luz.nonzero_months(), 10);
        assert_eq!(luz.total, dec!(-1461.45));
        assert_eq!(luz.average, dec!(-121.7875));
        assert_eq!(luz.rounded_average(2), dec!(-121.79));
        assert_eq!(luz.value_for(MonthKey::new(2023, 5)), Some(Decimal::ZERO));
        assert_eq!(luz.value_for(MonthKey::new(2023, 7)), Some(Decimal::ZERO));
    }

    #[test]
    fn test_same_month_movements_accumulate() {
        let window = ReportingWindow::parse("2023-01:2023-02").unwrap();
        let movements = vec![
            Movement::signed(1, date(2023, 1, 3), "Aluguel", dec!(-1000)),
            Movement::signed(2, date(2023, 1, 28), "Aluguel", dec!(-250.50)),
            Movement::signed(3, date(2023, 2, 3), "Aluguel", dec!(-1000)),
        ];

        let result = MonthlyAggregator::new(window).aggregate(&movements);
        let rent = result.get("Aluguel").unwrap();
        assert_eq!(rent.value_for(MonthKey::new(2023, 1)), Some(dec!(-1250.50)));
        assert_eq!(rent.total, dec!(-2250.50));
        assert_eq!(rent.average, dec!(-1125.25));
    }

    #[test]
    fn test_movements_outside_window_are_skipped() {
        let window = ReportingWindow::parse("2023-03:2023-04").unwrap();
        let movements = vec![
            Movement::signed(1, date(2023, 2, 28), "Luz", dec!(-10)),
            Movement::signed(2, date(2023, 3, 1), "Luz", dec!(-20)),
            Movement::signed(3, date(2023, 5, 1), "Luz", dec!(-30)),
        ];

        let (result, stats) = MonthlyAggregator::new(window).aggregate_with_stats(&movements);
        assert_eq!(result.get("Luz").unwrap().total, dec!(-20));
        assert_eq!(stats.folded, 1);
        assert_eq!(stats.outside_window, 2);
        assert_eq!(stats.unbucketed, 0);
    }

    #[test]
    fn test_aggregate_with_chart_seeds_idle_accounts() {
        let window = ReportingWindow::parse("2023-03:2023-05").unwrap();
        let chart = ChartOfAccounts::from_accounts(
            "Test",
            &[
                LedgerAccount::new("e1", "Luz", AccountNature::Expense),
                LedgerAccount::new("e2", "Internet", AccountNature::Expense),
            ],
        );

        let result = MonthlyAggregator::new(window)
            .aggregate_with_chart(&luz_movements(), &chart);

        let internet = result.get("Internet").unwrap();
        assert_eq!(internet.buckets.len(), 3);
        assert_eq!(internet.total, Decimal::ZERO);
        assert_eq!(internet.average, Decimal::ZERO);
        assert_eq!(result.get("Luz").unwrap().total, dec!(-231.28));
    }

    #[test]
    fn test_aggregate_by_category() {
        let window = ReportingWindow::parse("2023-03").unwrap();
        let movements = vec![
            Movement::signed(1, date(2023, 3, 1), "Luz", dec!(-100)).with_category("Utilidades"),
            Movement::signed(2, date(2023, 3, 2), "Água", dec!(-50)).with_category("Utilidades"),
            Movement::signed(3, date(2023, 3, 3), "Taxa", dec!(-5)),
        ];

        let result = MonthlyAggregator::new(window).aggregate_by_category(&movements);
        assert_eq!(result.get("Utilidades").unwrap().total, dec!(-150));
        assert_eq!(result.get(UNCATEGORIZED_LABEL).unwrap().total, dec!(-5));
    }

    #[test]
    fn test_sum_buckets() {
        let window = ReportingWindow::parse("2023-03:2023-04").unwrap();
        let movements = vec![
            Movement::signed(1, date(2023, 3, 1), "Luz", dec!(-100)),
            Movement::signed(2, date(2023, 3, 2), "Água", dec!(-50)),
            Movement::signed(3, date(2023, 4, 3), "Água", dec!(-40)),
        ];
        let result = MonthlyAggregator::new(window).aggregate(&movements);

        let totals = sum_buckets(&window, result.values());
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].value, dec!(-150));
        assert_eq!(totals[1].value, dec!(-40));
        assert_eq!(totals[0].label, "mar/2023");
    }

    #[test]
    fn test_reaggregation_is_idempotent() {
        let window = ReportingWindow::parse("2023-03:2024-02").unwrap();
        let aggregator = MonthlyAggregator::new(window);
        let movements = luz_movements();

        assert_eq!(aggregator.aggregate(&movements), aggregator.aggregate(&movements));
    }
}
