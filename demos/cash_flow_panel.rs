use chrono::NaiveDate;
use financial_rollup::export::write_cash_flow_csv;
use financial_rollup::*;
use rust_decimal::Decimal;
use std::error::Error;
use std::fs::File;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn main() -> std::result::Result<(), Box<dyn Error>> {
    println!("💰 Fluxo de Caixa\n");

    let config = RollupConfig::from_json_str(
        r#"{
            "company_id": "padaria-01",
            "company_name": "Padaria Exemplo",
            "period": "2024-01:2024-03",
            "opening_balance": "50.00"
        }"#,
    )?;

    let movements = vec![
        Movement::new(3, date(2024, 1, 5), "Vendas", Decimal::new(1_000_00, 2), MovementKind::Inflow)
            .with_description("Vendas balcão"),
        Movement::new(4, date(2024, 1, 20), "Fornecedores", Decimal::new(400_00, 2), MovementKind::Outflow)
            .with_description("Farinha e fermento")
            .with_counterpart("Moinho Central"),
        // same day as the previous entry; the id decides the order
        Movement::new(2, date(2024, 1, 20), "Luz", Decimal::new(148_45, 2), MovementKind::Outflow)
            .with_description("Conta de energia"),
        Movement::new(9, date(2024, 3, 2), "Vendas", Decimal::new(820_00, 2), MovementKind::Inflow)
            .with_description("Encomendas"),
    ];

    let mut slot = SnapshotSlot::new();
    let ticket = slot.begin_request();
    let mut source = InMemorySource::new();
    source.insert(DataSnapshot::new("padaria-01").with_movements(movements));
    let fetched = fetch_with_retry(&source, &config.context(), &config.window()?, &RetryPolicy::default());
    slot.complete(ticket, fetched)?;

    let Some(snapshot) = slot.current() else {
        return Err("no snapshot available".into());
    };
    let report = process_snapshot(&config, &snapshot)?;
    let statement = &report.cash_flow;

    println!("Saldo inicial: {}\n", format_currency(statement.opening_balance));
    println!("{:<12} {:<22} {:<8} {:>14} {:>14}", "Data", "Descrição", "Tipo", "Valor", "Saldo");
    for entry in &statement.entries {
        println!(
            "{:<12} {:<22} {:<8} {:>14} {:>14}",
            format_date(entry.date()),
            entry.movement.description,
            entry.movement.kind.label(),
            format_currency(entry.movement.amount),
            format_currency(entry.running_balance)
        );
    }

    println!("\nEntradas: {}", format_currency(statement.total_inflow));
    println!("Saídas:   {}", format_currency(statement.total_outflow));
    println!("Saldo final: {}\n", format_currency(statement.closing_balance));

    println!("Resumo mensal:");
    for month in &report.monthly_cash_flow {
        println!(
            "  {:<9} entradas {:>12}  saídas {:>12}  saldo {:>12}",
            month_label(month.month),
            format_currency(month.inflow),
            format_currency(month.outflow),
            format_currency(month.closing_balance)
        );
    }

    let path = std::env::temp_dir().join("fluxo_caixa.csv");
    write_cash_flow_csv(File::create(&path)?, statement)?;
    println!("\n💾 Extrato exportado para {}", path.display());

    Ok(())
}
