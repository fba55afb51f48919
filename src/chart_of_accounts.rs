use crate::schema::{AccountId, AccountNature, LedgerAccount};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartOfAccounts {
    pub company_name: String,
    pub assets: Vec<LedgerAccount>,
    pub liabilities: Vec<LedgerAccount>,
    pub equity: Vec<LedgerAccount>,
    pub revenue: Vec<LedgerAccount>,
    pub expenses: Vec<LedgerAccount>,
}

impl ChartOfAccounts {
    pub fn from_accounts(company_name: impl Into<String>, accounts: &[LedgerAccount]) -> Self {
        let mut chart = Self {
            company_name: company_name.into(),
            ..Default::default()
        };

        for account in accounts {
            chart.section_mut(account.nature).push(account.clone());
        }

        for nature in ALL_NATURES {
            chart
                .section_mut(nature)
                .sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
        }

        chart
    }

    pub fn section(&self, nature: AccountNature) -> &[LedgerAccount] {
        match nature {
            AccountNature::Asset => &self.assets,
            AccountNature::Liability => &self.liabilities,
            AccountNature::Equity => &self.equity,
            AccountNature::Revenue => &self.revenue,
            AccountNature::Expense => &self.expenses,
        }
    }

    fn section_mut(&mut self, nature: AccountNature) -> &mut Vec<LedgerAccount> {
        match nature {
            AccountNature::Asset => &mut self.assets,
            AccountNature::Liability => &mut self.liabilities,
            AccountNature::Equity => &mut self.equity,
            AccountNature::Revenue => &mut self.revenue,
            AccountNature::Expense => &mut self.expenses,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &LedgerAccount> {
        self.assets
            .iter()
            .chain(self.liabilities.iter())
            .chain(self.equity.iter())
            .chain(self.revenue.iter())
            .chain(self.expenses.iter())
    }

    pub fn get(&self, id: &AccountId) -> Option<&LedgerAccount> {
        self.iter().find(|a| &a.id == id)
    }

    pub fn contains(&self, id: &AccountId) -> bool {
        self.get(id).is_some()
    }

    /// Case-insensitive lookup by display name; movements reference accounts by name.
    pub fn find_by_name(&self, name: &str) -> Option<&LedgerAccount> {
        let needle = name.trim().to_lowercase();
        self.iter().find(|a| a.name.trim().to_lowercase() == needle)
    }

    pub fn nature_of(&self, id: &AccountId) -> Option<AccountNature> {
        self.get(id).map(|a| a.nature)
    }

    pub fn total_accounts(&self) -> usize {
        self.assets.len()
            + self.liabilities.len()
            + self.equity.len()
            + self.revenue.len()
            + self.expenses.len()
    }

    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("Grupo,Código,Conta,Id\n");

        for nature in ALL_NATURES {
            for account in self.section(nature) {
                output.push_str(&format!(
                    "{},{},{},{}\n",
                    nature.label(),
                    account.code.as_deref().unwrap_or(""),
                    account.name,
                    account.id
                ));
            }
        }

        output
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# Plano de Contas - {}\n\n", self.company_name));

        output.push_str("## Balanço Patrimonial\n\n");
        for nature in [
            AccountNature::Asset,
            AccountNature::Liability,
            AccountNature::Equity,
        ] {
            push_markdown_section(&mut output, nature.label(), self.section(nature));
        }

        output.push_str("## Resultado\n\n");
        for nature in [AccountNature::Revenue, AccountNature::Expense] {
            push_markdown_section(&mut output, nature.label(), self.section(nature));
        }

        output
    }
}

const ALL_NATURES: [AccountNature; 5] = [
    AccountNature::Asset,
    AccountNature::Liability,
    AccountNature::Equity,
    AccountNature::Revenue,
    AccountNature::Expense,
];

fn sort_key(account: &LedgerAccount) -> (String, String) {
    (
        account.code.clone().unwrap_or_default(),
        account.name.clone(),
    )
}

fn push_markdown_section(output: &mut String, title: &str, accounts: &[LedgerAccount]) {
    output.push_str(&format!("### {}\n\n", title));
    for account in accounts {
        match &account.code {
            Some(code) => output.push_str(&format!("- {} {}\n", code, account.name)),
            None => output.push_str(&format!("- {}\n", account.name)),
        }
    }
    output.push('\n');
}
