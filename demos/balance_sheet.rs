use anyhow::Context;
use chrono::NaiveDate;
use financial_rollup::export::write_balances_csv;
use financial_rollup::*;
use rust_decimal::Decimal;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn brl(units: i64) -> Decimal {
    Decimal::new(units * 100, 2)
}

fn main() -> anyhow::Result<()> {
    println!("🏦 Balancete e Balanço Patrimonial\n");

    let accounts = vec![
        LedgerAccount::new("caixa", "Caixa", AccountNature::Asset).with_code("1.1.01"),
        LedgerAccount::new("banco", "Banco Conta Movimento", AccountNature::Asset).with_code("1.1.02"),
        LedgerAccount::new("estoque", "Estoque", AccountNature::Asset).with_code("1.1.03"),
        LedgerAccount::new("fornecedores", "Fornecedores", AccountNature::Liability).with_code("2.1.01"),
        LedgerAccount::new("capital", "Capital Social", AccountNature::Equity).with_code("3.1.01"),
        LedgerAccount::new("vendas", "Receita de Vendas", AccountNature::Revenue).with_code("4.1.01"),
        LedgerAccount::new("cmv", "Custo das Mercadorias", AccountNature::Expense).with_code("5.1.01"),
        LedgerAccount::new("luz", "Energia Elétrica", AccountNature::Expense).with_code("5.2.01"),
    ];
    let chart = ChartOfAccounts::from_accounts("Loja Exemplo", &accounts);

    let entries = vec![
        JournalEntry::new(1, date(2024, 1, 2), "banco", "capital", brl(20_000))
            .with_history("Integralização de capital"),
        JournalEntry::new(2, date(2024, 1, 5), "estoque", "fornecedores", brl(8_000))
            .with_history("Compra de mercadorias a prazo"),
        JournalEntry::new(3, date(2024, 1, 15), "caixa", "vendas", brl(6_500)),
        JournalEntry::new(4, date(2024, 1, 15), "cmv", "estoque", brl(3_900)),
        JournalEntry::new(5, date(2024, 1, 25), "fornecedores", "banco", brl(4_000)),
        JournalEntry::new(6, date(2024, 1, 28), "luz", "caixa", Decimal::new(148_45, 2)),
        // the chart has no "adiantamentos" account, so this entry is skipped
        JournalEntry::new(7, date(2024, 1, 30), "adiantamentos", "caixa", brl(300)),
    ];

    let balancer = LedgerBalancer::new(&chart);
    let balances = balancer.balance(&entries)?;
    balances.verify_conservation(Decimal::new(1, 2))?;

    println!("{:<10} {:<26} {:<20} {:>16}", "Código", "Conta", "Grupo", "Saldo");
    for account in chart.iter() {
        if let Some(balance) = balances.get(&account.id) {
            println!(
                "{:<10} {:<26} {:<20} {:>16}",
                account.code.as_deref().unwrap_or("-"),
                account.name,
                account.nature.label(),
                format_currency(balance.reported_balance)
            );
        }
    }

    for skipped in &balances.skipped {
        println!(
            "⚠️  Lançamento {} ignorado: conta(s) desconhecida(s) {:?}",
            skipped.entry_id, skipped.unknown_accounts
        );
    }

    let sheet = balancer
        .balance_sheet(&balances, Decimal::new(1, 2))
        .context("balance sheet does not close")?;

    println!("\nAtivo:              {}", format_currency(sheet.assets));
    println!("Passivo:            {}", format_currency(sheet.liabilities));
    println!("Patrimônio Líquido: {}", format_currency(sheet.equity));
    println!("Resultado:          {}", format_currency(sheet.result));
    println!("Diferença:          {}", format_currency(sheet.difference()));

    let strict = LedgerBalancer::new(&chart).with_policy(UnknownAccountPolicy::Reject);
    if let Err(e) = strict.balance(&entries) {
        println!("\nModo estrito: {} ({})", e.user_message(), e);
    }

    let path = std::env::temp_dir().join("balancete.csv");
    write_balances_csv(std::fs::File::create(&path)?, &balances, &chart)?;
    println!("\n💾 Balancete exportado para {}", path.display());

    println!("\n{}", chart.to_markdown());

    Ok(())
}
