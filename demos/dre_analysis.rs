use chrono::NaiveDate;
use financial_rollup::*;
use rust_decimal::Decimal;
use std::error::Error;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn main() -> std::result::Result<(), Box<dyn Error>> {
    println!("📊 DRE - Demonstração do Resultado\n");

    let accounts = vec![
        LedgerAccount::new("vendas", "Vendas", AccountNature::Revenue).with_code("4.1"),
        LedgerAccount::new("servicos", "Serviços", AccountNature::Revenue).with_code("4.2"),
        LedgerAccount::new("luz", "Luz", AccountNature::Expense).with_code("5.1"),
        LedgerAccount::new("aluguel", "Aluguel", AccountNature::Expense).with_code("5.2"),
    ];

    let bills = [
        (2023, 3, "148.45"),
        (2023, 4, "82.83"),
        (2023, 6, "210.75"),
        (2023, 8, "193.90"),
        (2023, 9, "84.64"),
        (2023, 10, "84.14"),
        (2023, 11, "93.47"),
        (2023, 12, "84.76"),
        (2024, 1, "198.53"),
        (2024, 2, "279.98"),
    ];

    let mut movements = Vec::new();
    let mut next_id = 1;
    for (year, month, value) in bills {
        movements.push(Movement::new(
            next_id,
            date(year, month, 15),
            "Luz",
            value.parse::<Decimal>()?,
            MovementKind::Outflow,
        ));
        next_id += 1;
    }
    for month in 1..=12 {
        let (year, month) = if month <= 10 { (2023, month + 2) } else { (2024, month - 10) };
        movements.push(Movement::new(
            next_id,
            date(year, month, 5),
            "Aluguel",
            Decimal::new(1_200_00, 2),
            MovementKind::Outflow,
        ));
        movements.push(Movement::new(
            next_id + 1,
            date(year, month, 20),
            "Vendas",
            Decimal::new(4_500_00 + i64::from(month) * 10_000, 2),
            MovementKind::Inflow,
        ));
        next_id += 2;
    }
    movements.push(Movement::new(
        next_id,
        date(2023, 11, 8),
        "Serviços",
        Decimal::new(2_350_00, 2),
        MovementKind::Inflow,
    ));

    let config = RollupConfig::new("demo", "2023-03:2024-02");
    let snapshot = DataSnapshot::new("demo")
        .with_accounts(accounts)
        .with_movements(movements);
    let report = process_snapshot(&config, &snapshot)?;

    for section in [&report.dre.revenue, &report.dre.expenses] {
        println!("{}", section.title);
        for row in &section.rows {
            println!(
                "  {:<12} total {:>14}  média {:>12}",
                row.account,
                format_currency(row.total),
                format_currency(row.average)
            );
        }
        println!(
            "  {:<12} total {:>14}  média {:>12}\n",
            "Subtotal",
            format_currency(section.total),
            format_currency(section.average)
        );
    }

    println!("Resultado por mês:");
    for bucket in &report.dre.net_result {
        println!("  {:<9} {:>14}", bucket.label, format_currency(bucket.value));
    }

    println!(
        "\nResultado líquido: {} (média mensal {})",
        format_currency(report.dre.net_total),
        format_currency(report.dre.net_average)
    );
    if let Some(margin) = report.dre.net_margin() {
        println!("Margem líquida: {}", format_percentage(margin));
    }

    let luz = &report.accounts["Luz"];
    println!(
        "\nLuz: {} meses com lançamento, média sobre {} meses = {}",
        luz.nonzero_months(),
        report.window.len(),
        format_currency(luz.average)
    );

    Ok(())
}
