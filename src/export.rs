//! CSV exports for spreadsheet tools.
//!
//! Amounts are written with `.` as decimal separator and two decimals so the
//! files import cleanly regardless of the spreadsheet's locale settings.

use crate::balancer::LedgerBalances;
use crate::cash_flow::CashFlowStatement;
use crate::chart_of_accounts::ChartOfAccounts;
use crate::error::Result;
use crate::format::month_label;
use crate::schema::{round_money, AccountAggregate, MovementKind, ReportingWindow};
use csv::WriterBuilder;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::io::Write;

fn amount(value: Decimal) -> String {
    format!("{:.2}", round_money(value, 2))
}

/// One row per account, one column per month, then total and average.
pub fn write_monthly_grid_csv<W: Write>(
    writer: W,
    aggregates: &BTreeMap<String, AccountAggregate>,
    window: &ReportingWindow,
) -> Result<()> {
    let mut wrt = WriterBuilder::new().from_writer(writer);
    let months = window.months();

    let mut header = vec!["Conta".to_string()];
    header.extend(months.iter().map(|m| month_label(*m)));
    header.push("Total".to_string());
    header.push("Média".to_string());
    wrt.write_record(&header)?;

    for aggregate in aggregates.values() {
        let mut row = vec![aggregate.account.clone()];
        row.extend(
            months
                .iter()
                .map(|m| amount(aggregate.value_for(*m).unwrap_or(Decimal::ZERO))),
        );
        row.push(amount(aggregate.total));
        row.push(amount(aggregate.average));
        wrt.write_record(&row)?;
    }

    wrt.flush()?;
    Ok(())
}

pub fn write_cash_flow_csv<W: Write>(writer: W, statement: &CashFlowStatement) -> Result<()> {
    let mut wrt = WriterBuilder::new().from_writer(writer);
    wrt.write_record(["Data", "Descrição", "Conta", "Tipo", "Valor", "Saldo"])?;

    for entry in &statement.entries {
        let m = &entry.movement;
        wrt.write_record([
            m.date.format("%Y-%m-%d").to_string(),
            m.description.clone(),
            m.account.clone(),
            MovementKind::from_sign(m.amount).label().to_string(),
            amount(m.amount),
            amount(entry.running_balance),
        ])?;
    }

    wrt.flush()?;
    Ok(())
}

pub fn write_balances_csv<W: Write>(
    writer: W,
    balances: &LedgerBalances,
    chart: &ChartOfAccounts,
) -> Result<()> {
    let mut wrt = WriterBuilder::new().from_writer(writer);
    wrt.write_record(["Código", "Conta", "Grupo", "Saldo"])?;

    for account in chart.iter() {
        let Some(balance) = balances.get(&account.id) else {
            continue;
        };
        wrt.write_record([
            account.code.clone().unwrap_or_default(),
            account.name.clone(),
            account.nature.label().to_string(),
            amount(balance.reported_balance),
        ])?;
    }

    wrt.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::MonthlyAggregator;
    use crate::balancer::LedgerBalancer;
    use crate::cash_flow::CashFlowBuilder;
    use crate::schema::{AccountNature, JournalEntry, LedgerAccount, Movement};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_monthly_grid_csv() {
        let window = ReportingWindow::parse("2024-01:2024-03").unwrap();
        let movements = vec![
            Movement::signed(1, date(2024, 1, 5), "Luz", dec!(-100)),
            Movement::signed(2, date(2024, 3, 5), "Luz", dec!(-50.5)),
        ];
        let aggregates = MonthlyAggregator::new(window).aggregate(&movements);

        let mut out = Vec::new();
        write_monthly_grid_csv(&mut out, &aggregates, &window).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Conta,jan/2024,fev/2024,mar/2024,Total,Média");
        assert_eq!(lines[1], "Luz,-100.00,0.00,-50.50,-150.50,-50.17");
    }

    #[test]
    fn test_cash_flow_csv() {
        let movements = vec![Movement::signed(1, date(2024, 1, 5), "Vendas", dec!(250))
            .with_description("Venda balcão")];
        let statement = CashFlowBuilder::new(dec!(50)).build(&movements);

        let mut out = Vec::new();
        write_cash_flow_csv(&mut out, &statement).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("Data,Descrição,Conta,Tipo,Valor,Saldo\n"));
        assert!(text.contains("2024-01-05,Venda balcão,Vendas,Entrada,250.00,300.00"));
    }

    #[test]
    fn test_balances_csv() {
        let chart = ChartOfAccounts::from_accounts(
            "Test",
            &[
                LedgerAccount::new("caixa", "Caixa", AccountNature::Asset).with_code("1.1"),
                LedgerAccount::new("capital", "Capital", AccountNature::Equity).with_code("3.1"),
            ],
        );
        let entries = vec![JournalEntry::new(1, date(2024, 1, 1), "caixa", "capital", dec!(10))];
        let balances = LedgerBalancer::new(&chart).balance(&entries).unwrap();

        let mut out = Vec::new();
        write_balances_csv(&mut out, &balances, &chart).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("1.1,Caixa,Ativo,10.00"));
        assert!(text.contains("3.1,Capital,Patrimônio Líquido,10.00"));
    }
}
