use chrono::NaiveDate;
use financial_rollup::export::{write_cash_flow_csv, write_monthly_grid_csv};
use financial_rollup::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::io::Write;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn utility_bills() -> Vec<Movement> {
    [
        (2023, 3, dec!(148.45)),
        (2023, 4, dec!(82.83)),
        (2023, 6, dec!(210.75)),
        (2023, 8, dec!(193.90)),
        (2023, 9, dec!(84.64)),
        (2023, 10, dec!(84.14)),
        (2023, 11, dec!(93.47)),
        (2023, 12, dec!(84.76)),
        (2024, 1, dec!(198.53)),
        (2024, 2, dec!(279.98)),
    ]
    .iter()
    .enumerate()
    .map(|(i, (y, m, v))| {
        Movement::new(i as u64 + 1, date(*y, *m, 15), "Luz", *v, MovementKind::Outflow)
            .with_description("Conta de energia")
    })
    .collect()
}

#[test]
fn test_twelve_month_average_counts_idle_months() {
    let config = RollupConfig::new("emp-1", "2023-03:2024-02");
    let snapshot = DataSnapshot::new("emp-1").with_movements(utility_bills());

    let report = process_snapshot(&config, &snapshot).unwrap();
    let luz = report.accounts.get("Luz").unwrap();

    assert_eq!(report.window.len(), 12);
    assert_eq!(luz.buckets.len(), 12);
    assert_eq!(luz.nonzero_months(), 10);
    assert_eq!(luz.total, dec!(-1461.45));
    assert_eq!(luz.average, dec!(-121.7875));
    assert_eq!(luz.rounded_average(2), dec!(-121.79));
    assert_eq!(format_currency(luz.average), "-R$ 121,79");

    let labels: Vec<&str> = luz.buckets.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels[0], "mar/2023");
    assert_eq!(labels[11], "fev/2024");
}

#[test]
fn test_closing_balance_from_opening_and_flows() {
    let mut config = RollupConfig::new("emp-1", "2024-01");
    config.opening_balance = dec!(50);

    // ids deliberately out of date order
    let snapshot = DataSnapshot::new("emp-1").with_movements(vec![
        Movement::new(7, date(2024, 1, 20), "Fornecedores", dec!(400), MovementKind::Outflow),
        Movement::new(3, date(2024, 1, 5), "Vendas", dec!(1000), MovementKind::Inflow),
    ]);

    let report = process_snapshot(&config, &snapshot).unwrap();
    let statement = &report.cash_flow;

    assert_eq!(statement.entries[0].movement.id, 3);
    assert_eq!(statement.entries[0].running_balance, dec!(1050));
    assert_eq!(statement.entries[1].running_balance, dec!(650));
    assert_eq!(statement.closing_balance, dec!(650));
    assert_eq!(format_currency(statement.closing_balance), "R$ 650,00");
    assert_eq!(statement.balance_on(date(2024, 1, 10)), dec!(1050));
}

#[test]
fn test_same_day_movements_fold_by_id() {
    let statement = CashFlowBuilder::new(Decimal::ZERO).build(&[
        Movement::signed(2, date(2024, 3, 1), "Caixa", dec!(-30)),
        Movement::signed(1, date(2024, 3, 1), "Caixa", dec!(100)),
    ]);

    assert_eq!(statement.entries[0].running_balance, dec!(100));
    assert_eq!(statement.entries[1].running_balance, dec!(70));
}

#[test]
fn test_loaded_movements_keep_closing_equal_to_last_running_balance() {
    let movements: Vec<Movement> = serde_json::from_str(
        r#"[
            {"id": 1, "date": "2024-01-02", "account": "Fornecedores", "amount": "100", "kind": "outflow"},
            {"id": 2, "date": "2024-01-03", "account": "Vendas", "amount": "-40", "kind": "inflow"}
        ]"#,
    )
    .unwrap();

    let statement = CashFlowBuilder::new(Decimal::ZERO).build(&movements);
    let last = statement.entries.last().unwrap().running_balance;

    assert_eq!(last, dec!(-60));
    assert_eq!(statement.closing_balance, last);
    assert_eq!(statement.total_inflow, dec!(40));
    assert_eq!(statement.total_outflow, dec!(100));
}

#[test]
fn test_json_file_source_end_to_end() {
    let document = r#"{
        "empresa_id": "emp-9",
        "movimentos": [
            {"id": 1, "data": "2024-01-03", "conta": "Vendas", "valor": "1200.00", "tipo": "entrada"},
            {"id": 2, "data": "2024-01-10T09:30:00", "conta": "Aluguel", "valor": "800.00", "tipo": "saida"},
            {"id": 3, "data": "2024-02-03", "conta": "Vendas"},
            {"id": 4, "conta": "Vendas", "valor": "10.00"}
        ],
        "lancamentos": [
            {"id": 1, "data": "2024-01-03", "conta_debito_id": "caixa", "conta_credito_id": "receita", "valor": "1200.00"},
            {"id": 2, "data": "2024-01-10", "conta_debito_id": "aluguel", "conta_credito_id": "caixa", "valor": "800.00"}
        ],
        "plano_contas": [
            {"id": "caixa", "codigo": "1.1", "nome": "Caixa", "natureza": "ativo"},
            {"id": "receita", "codigo": "4.1", "nome": "Vendas", "natureza": "receita"},
            {"id": "aluguel", "codigo": "5.1", "nome": "Aluguel", "natureza": "despesa"}
        ]
    }"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(document.as_bytes()).unwrap();

    let config = RollupConfig::new("emp-9", "2024-01:2024-02");
    let source = JsonFileSource::new(file.path());
    let report =
        RollupProcessor::fetch_and_process(&config, &source, &RetryPolicy::no_retry()).unwrap();

    assert_eq!(report.rejected_records, 2);
    assert_eq!(report.accounts.get("Vendas").unwrap().total, dec!(1200));
    assert_eq!(report.accounts.get("Aluguel").unwrap().total, dec!(-800));
    assert_eq!(report.cash_flow.closing_balance, dec!(400));

    let sheet = report.balance_sheet.unwrap();
    assert_eq!(sheet.assets, dec!(400));
    assert_eq!(sheet.result, dec!(400));
    assert_eq!(sheet.difference(), Decimal::ZERO);

    assert_eq!(report.dre.revenue.total, dec!(1200));
    assert_eq!(report.dre.net_total, dec!(400));
}

#[test]
fn test_json_file_for_another_company_is_fetch_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(br#"{"empresa_id": "emp-1", "movimentos": []}"#)
        .unwrap();

    let config = RollupConfig::new("emp-2", "2024-01");
    let err = RollupProcessor::fetch_and_process(
        &config,
        &JsonFileSource::new(file.path()),
        &RetryPolicy::no_retry(),
    )
    .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Fetch);
    assert_ne!(err.user_message(), RollupError::Config(String::new()).user_message());
}

#[test]
fn test_unknown_accounts_skipped_by_default() {
    let config = RollupConfig::new("emp-1", "2024-01");
    let snapshot = DataSnapshot::new("emp-1")
        .with_accounts(vec![
            LedgerAccount::new("caixa", "Caixa", AccountNature::Asset),
            LedgerAccount::new("capital", "Capital Social", AccountNature::Equity),
        ])
        .with_journal_entries(vec![
            JournalEntry::new(1, date(2024, 1, 1), "caixa", "capital", dec!(100)),
            JournalEntry::new(2, date(2024, 1, 2), "caixa", "ghost", dec!(25)),
        ]);

    let report = process_snapshot(&config, &snapshot).unwrap();

    assert_eq!(report.ledger.skipped.len(), 1);
    assert_eq!(report.ledger.skipped[0].entry_id, 2);
    let caixa = report.ledger.get(&AccountId::new("caixa")).unwrap();
    assert_eq!(caixa.balance, dec!(100));
    assert_eq!(report.ledger.raw_sum(), Decimal::ZERO);
}

#[test]
fn test_csv_exports_from_report() {
    let config = RollupConfig::new("emp-1", "2023-03:2023-05");
    let snapshot = DataSnapshot::new("emp-1").with_movements(utility_bills());
    let report = process_snapshot(&config, &snapshot).unwrap();

    let mut grid = Vec::new();
    write_monthly_grid_csv(&mut grid, &report.accounts, &report.window).unwrap();
    let grid = String::from_utf8(grid).unwrap();
    let lines: Vec<&str> = grid.lines().collect();
    assert_eq!(lines[0], "Conta,mar/2023,abr/2023,mai/2023,Total,Média");
    assert_eq!(lines[1], "Luz,-148.45,-82.83,0.00,-231.28,-77.09");

    let mut flow = Vec::new();
    write_cash_flow_csv(&mut flow, &report.cash_flow).unwrap();
    let flow = String::from_utf8(flow).unwrap();
    assert_eq!(flow.lines().count(), 3);
    assert!(flow.contains("2023-04-15,Conta de energia,Luz,Saída,-82.83,-231.28"));
}

#[test]
fn test_stale_response_is_discarded() {
    let mut slot = SnapshotSlot::new();
    let first = slot.begin_request();
    let second = slot.begin_request();

    let newest = DataSnapshot::new("emp-2");
    assert_eq!(slot.complete(second, Ok(newest)).unwrap(), SlotUpdate::Applied);
    assert_eq!(
        slot.complete(first, Ok(DataSnapshot::new("emp-1"))).unwrap(),
        SlotUpdate::Stale
    );
    assert_eq!(slot.current().unwrap().company_id, "emp-2");
}

fn arb_movements() -> impl Strategy<Value = Vec<Movement>> {
    prop::collection::vec(
        (1u32..=12, 1u32..=28, -500_000i64..500_000, 0usize..3),
        0..40,
    )
    .prop_map(|rows| {
        let accounts = ["Vendas", "Luz", "Aluguel"];
        rows.into_iter()
            .enumerate()
            .map(|(i, (month, day, cents, account))| {
                Movement::signed(
                    i as u64,
                    date(2024, month, day),
                    accounts[account],
                    Decimal::new(cents, 2),
                )
            })
            .collect()
    })
}

fn arb_journal() -> impl Strategy<Value = Vec<JournalEntry>> {
    prop::collection::vec((0usize..4, 0usize..4, 1i64..1_000_000), 0..40).prop_map(|rows| {
        let ids = ["caixa", "fornecedores", "capital", "vendas"];
        rows.into_iter()
            .enumerate()
            .map(|(i, (debit, credit, cents))| {
                JournalEntry::new(
                    i as u64,
                    date(2024, 1, 1),
                    ids[debit],
                    ids[credit],
                    Decimal::new(cents, 2),
                )
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_buckets_conserve_movement_sum(movements in arb_movements()) {
        let window = ReportingWindow::parse("2024-03:2024-08").unwrap();
        let aggregates = MonthlyAggregator::new(window).aggregate(&movements);

        let expected: Decimal = movements
            .iter()
            .filter(|m| window.contains(m.date))
            .map(|m| m.amount)
            .sum();
        let folded: Decimal = aggregates.values().map(|a| a.total).sum();
        prop_assert_eq!(folded, expected);

        for aggregate in aggregates.values() {
            prop_assert_eq!(aggregate.buckets.len(), window.len());
            let bucket_sum: Decimal = aggregate.buckets.iter().map(|b| b.value).sum();
            prop_assert_eq!(bucket_sum, aggregate.total);
        }
    }

    #[test]
    fn prop_running_balance_is_left_fold(
        opening in -1_000_000i64..1_000_000,
        movements in arb_movements(),
    ) {
        let opening = Decimal::new(opening, 2);
        let statement = CashFlowBuilder::new(opening).build(&movements);

        let mut balance = opening;
        for entry in &statement.entries {
            balance += entry.movement.amount;
            prop_assert_eq!(entry.running_balance, balance);
        }
        prop_assert_eq!(statement.closing_balance, balance);
        prop_assert_eq!(
            statement.closing_balance,
            opening + statement.total_inflow - statement.total_outflow
        );
    }

    #[test]
    fn prop_double_entry_conserves_balances(entries in arb_journal()) {
        let chart = ChartOfAccounts::from_accounts(
            "Prop",
            &[
                LedgerAccount::new("caixa", "Caixa", AccountNature::Asset),
                LedgerAccount::new("fornecedores", "Fornecedores", AccountNature::Liability),
                LedgerAccount::new("capital", "Capital", AccountNature::Equity),
                LedgerAccount::new("vendas", "Vendas", AccountNature::Revenue),
            ],
        );
        let balancer = LedgerBalancer::new(&chart);
        let balances = balancer.balance(&entries).unwrap();

        prop_assert_eq!(balances.raw_sum(), Decimal::ZERO);
        prop_assert!(balances.skipped.is_empty());
        let sheet = balancer.balance_sheet(&balances, dec!(0.01)).unwrap();
        prop_assert_eq!(sheet.difference(), Decimal::ZERO);
    }

    #[test]
    fn prop_rollup_is_idempotent(movements in arb_movements()) {
        let config = RollupConfig::new("emp-1", "2024-01:2024-12");
        let snapshot = DataSnapshot::new("emp-1").with_movements(movements);

        let first = process_snapshot(&config, &snapshot).unwrap();
        let second = process_snapshot(&config, &snapshot).unwrap();
        prop_assert_eq!(first, second);
    }
}
