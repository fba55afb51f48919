use crate::error::{Result, RollupError};
use crate::format::month_label;
use crate::utils::{
    first_day_of_month, last_day_of_month, month_keys_in_period, next_month, parse_period_string,
};
use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn next(self) -> Self {
        let (year, month) = next_month(self.year, self.month);
        Self { year, month }
    }

    pub fn first_day(self) -> Option<NaiveDate> {
        first_day_of_month(self.year, self.month)
    }

    pub fn last_day(self) -> NaiveDate {
        last_day_of_month(self.year, self.month)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Contiguous, inclusive range of calendar months a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WindowBounds")]
pub struct ReportingWindow {
    start: MonthKey,
    end: MonthKey,
}

#[derive(Deserialize)]
struct WindowBounds {
    start: MonthKey,
    end: MonthKey,
}

impl TryFrom<WindowBounds> for ReportingWindow {
    type Error = RollupError;

    fn try_from(bounds: WindowBounds) -> Result<Self> {
        Self::new(bounds.start, bounds.end)
    }
}

impl ReportingWindow {
    pub fn new(start: MonthKey, end: MonthKey) -> Result<Self> {
        if !(1..=12).contains(&start.month) || !(1..=12).contains(&end.month) {
            return Err(RollupError::InvalidWindow(format!(
                "month out of range in {}..{}",
                start, end
            )));
        }
        if end < start {
            return Err(RollupError::InvalidWindow(format!(
                "end {} is before start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// Builds a window from a "YYYY-MM" or "YYYY-MM:YYYY-MM" period string.
    pub fn parse(period: &str) -> Result<Self> {
        let (start, end) = parse_period_string(period)?;
        Self::from_dates(start, end)
    }

    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        Self::new(MonthKey::from_date(start), MonthKey::from_date(end))
    }

    pub fn start(&self) -> MonthKey {
        self.start
    }

    pub fn end(&self) -> MonthKey {
        self.end
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.first_day().unwrap_or(NaiveDate::MIN)
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.last_day()
    }

    /// Number of months in the window; always at least one.
    pub fn len(&self) -> usize {
        ((self.end.year - self.start.year) * 12 + self.end.month as i32 - self.start.month as i32
            + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        let key = MonthKey::from_date(date);
        key >= self.start && key <= self.end
    }

    pub fn months(&self) -> Vec<MonthKey> {
        month_keys_in_period(self.start_date(), self.end_date())
    }
}

impl fmt::Display for ReportingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// Explicit per-request company scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyContext {
    pub company_id: String,
    pub company_name: Option<String>,
}

impl CompanyContext {
    pub fn new(company_id: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            company_name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.company_name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    #[serde(alias = "entrada", alias = "receita", alias = "credit")]
    #[schemars(description = "Money coming in (entrada)")]
    Inflow,

    #[serde(alias = "saida", alias = "saída", alias = "despesa", alias = "debit")]
    #[schemars(description = "Money going out (saída)")]
    Outflow,
}

impl MovementKind {
    pub fn from_sign(amount: Decimal) -> Self {
        if amount.is_sign_negative() && !amount.is_zero() {
            MovementKind::Outflow
        } else {
            MovementKind::Inflow
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MovementKind::Inflow => "Entrada",
            MovementKind::Outflow => "Saída",
        }
    }
}

/// A dated cash movement tied to an account.
///
/// `amount` is always signed: positive for inflows, negative for outflows.
/// Deserialized movements are normalised the same way as [`Movement::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredMovement")]
pub struct Movement {
    /// Insertion id assigned by the data source; breaks same-day ties.
    pub id: u64,
    pub date: NaiveDate,
    pub description: String,
    pub account: String,
    pub counterpart: Option<String>,
    pub amount: Decimal,
    pub kind: MovementKind,
    pub category: Option<String>,
    pub origin: Option<String>,
}

#[derive(Deserialize)]
struct StoredMovement {
    id: u64,
    date: NaiveDate,
    #[serde(default)]
    description: String,
    account: String,
    counterpart: Option<String>,
    amount: Decimal,
    kind: MovementKind,
    category: Option<String>,
    origin: Option<String>,
}

impl From<StoredMovement> for Movement {
    fn from(stored: StoredMovement) -> Self {
        let mut movement = Movement::new(
            stored.id,
            stored.date,
            stored.account,
            stored.amount,
            stored.kind,
        );
        movement.description = stored.description;
        movement.counterpart = stored.counterpart;
        movement.category = stored.category;
        movement.origin = stored.origin;
        movement
    }
}

impl Movement {
    /// Creates a movement whose sign follows `kind`, whatever the sign of `amount`.
    pub fn new(
        id: u64,
        date: NaiveDate,
        account: impl Into<String>,
        amount: Decimal,
        kind: MovementKind,
    ) -> Self {
        let magnitude = amount.abs();
        let amount = match kind {
            MovementKind::Inflow => magnitude,
            MovementKind::Outflow => -magnitude,
        };
        Self {
            id,
            date,
            description: String::new(),
            account: account.into(),
            counterpart: None,
            amount,
            kind,
            category: None,
            origin: None,
        }
    }

    /// Creates a movement whose kind is inferred from the sign of `amount`.
    pub fn signed(id: u64, date: NaiveDate, account: impl Into<String>, amount: Decimal) -> Self {
        Self::new(id, date, account, amount, MovementKind::from_sign(amount))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_counterpart(mut self, counterpart: impl Into<String>) -> Self {
        self.counterpart = Some(counterpart.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn month(&self) -> MonthKey {
        MonthKey::from_date(self.date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccountNature {
    #[serde(alias = "ativo")]
    #[schemars(description = "Resources owned by the company (debit balance)")]
    Asset,

    #[serde(alias = "passivo")]
    #[schemars(description = "Obligations owed to third parties (credit balance)")]
    Liability,

    #[serde(alias = "patrimonio_liquido", alias = "patrimônio líquido")]
    #[schemars(description = "Owner's residual interest (credit balance)")]
    Equity,

    #[serde(alias = "receita")]
    #[schemars(description = "Income from sales and services (credit balance)")]
    Revenue,

    #[serde(alias = "despesa", alias = "custo")]
    #[schemars(description = "Costs and operating expenses (debit balance)")]
    Expense,
}

impl AccountNature {
    /// Whether an increase in value is recorded on the debit side.
    pub fn is_debit_normal(&self) -> bool {
        matches!(self, AccountNature::Asset | AccountNature::Expense)
    }

    pub fn is_balance_sheet(&self) -> bool {
        matches!(
            self,
            AccountNature::Asset | AccountNature::Liability | AccountNature::Equity
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            AccountNature::Asset => "Ativo",
            AccountNature::Liability => "Passivo",
            AccountNature::Equity => "Patrimônio Líquido",
            AccountNature::Revenue => "Receitas",
            AccountNature::Expense => "Despesas",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerAccount {
    pub id: AccountId,
    pub code: Option<String>,
    pub name: String,
    pub nature: AccountNature,
}

impl LedgerAccount {
    pub fn new(id: impl Into<String>, name: impl Into<String>, nature: AccountNature) -> Self {
        Self {
            id: AccountId::new(id),
            code: None,
            name: name.into(),
            nature,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// A double-entry record moving `amount` from the credit account to the debit account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: u64,
    pub date: NaiveDate,
    pub debit_account: AccountId,
    pub credit_account: AccountId,
    pub amount: Decimal,
    pub history: Option<String>,
}

impl JournalEntry {
    pub fn new(
        id: u64,
        date: NaiveDate,
        debit_account: impl Into<String>,
        credit_account: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            id,
            date,
            debit_account: AccountId::new(debit_account),
            credit_account: AccountId::new(credit_account),
            amount,
            history: None,
        }
    }

    pub fn with_history(mut self, history: impl Into<String>) -> Self {
        self.history = Some(history.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBucket {
    pub year: i32,
    pub month: u32,
    pub label: String,
    pub value: Decimal,
}

impl MonthlyBucket {
    pub fn zero(key: MonthKey) -> Self {
        Self {
            year: key.year,
            month: key.month,
            label: month_label(key),
            value: Decimal::ZERO,
        }
    }

    pub fn key(&self) -> MonthKey {
        MonthKey::new(self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountAggregate {
    pub account: String,
    pub buckets: Vec<MonthlyBucket>,
    pub total: Decimal,
    /// `total` divided by the number of months in the window, zero months included.
    pub average: Decimal,
}

impl AccountAggregate {
    pub fn value_for(&self, key: MonthKey) -> Option<Decimal> {
        self.buckets
            .iter()
            .find(|b| b.key() == key)
            .map(|b| b.value)
    }

    pub fn rounded_average(&self, decimal_places: u32) -> Decimal {
        round_money(self.average, decimal_places)
    }

    pub fn nonzero_months(&self) -> usize {
        self.buckets.iter().filter(|b| !b.value.is_zero()).count()
    }
}

pub fn round_money(value: Decimal, decimal_places: u32) -> Decimal {
    value.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointAwayFromZero)
}
