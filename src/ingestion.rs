//! Validation of raw records at the fetch boundary.
//!
//! The hosted data service hands back loosely-typed rows. Everything that
//! enters the aggregation core goes through here first; rows that cannot be
//! trusted are rejected with a reason instead of being silently undercounted.

use crate::error::RollupError;
use crate::schema::{AccountNature, JournalEntry, LedgerAccount, Movement, MovementKind};
use crate::utils::parse_flexible_date;
use log::warn;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RawMovementRecord {
    #[serde(default)]
    #[schemars(description = "Insertion id assigned by the data service")]
    pub id: Option<u64>,

    #[serde(default, alias = "data", alias = "data_movimento")]
    #[schemars(description = "Movement date, YYYY-MM-DD (timestamps and DD/MM/YYYY are accepted)")]
    pub date: Option<String>,

    #[serde(default, alias = "descricao")]
    pub description: Option<String>,

    #[serde(default, alias = "conta", alias = "conta_nome")]
    #[schemars(description = "Name of the account the movement belongs to")]
    pub account: Option<String>,

    #[serde(default, alias = "favorecido", alias = "cliente_fornecedor")]
    pub counterpart: Option<String>,

    #[serde(default, alias = "valor")]
    #[schemars(description = "Amount; signed, or unsigned when 'kind' is given")]
    pub amount: Option<Decimal>,

    #[serde(default, alias = "tipo")]
    pub kind: Option<MovementKind>,

    #[serde(default, alias = "categoria", alias = "classificacao")]
    pub category: Option<String>,

    #[serde(default, alias = "origem")]
    pub origin: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RawJournalRecord {
    #[serde(default)]
    pub id: Option<u64>,

    #[serde(default, alias = "data")]
    pub date: Option<String>,

    #[serde(default, alias = "conta_debito_id", alias = "conta_debito")]
    pub debit_account: Option<String>,

    #[serde(default, alias = "conta_credito_id", alias = "conta_credito")]
    pub credit_account: Option<String>,

    #[serde(default, alias = "valor")]
    pub amount: Option<Decimal>,

    #[serde(default, alias = "historico")]
    pub history: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RawAccountRecord {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default, alias = "codigo")]
    pub code: Option<String>,

    #[serde(default, alias = "nome")]
    pub name: Option<String>,

    #[serde(default, alias = "natureza", alias = "tipo")]
    pub nature: Option<AccountNature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionReport<T> {
    pub accepted: Vec<T>,
    pub rejected: Vec<RejectedRecord>,
}

impl<T> IngestionReport<T> {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    /// Converts the first rejection, if any, into an error.
    pub fn into_strict(self) -> crate::error::Result<Vec<T>> {
        match self.rejected.into_iter().next() {
            Some(rejected) => Err(RollupError::DataIntegrity {
                record: format!("#{}", rejected.index),
                details: rejected.reason,
            }),
            None => Ok(self.accepted),
        }
    }
}

pub fn validate_movements(records: &[RawMovementRecord]) -> IngestionReport<Movement> {
    collect(records, "movement", |index, raw| {
        let date = raw
            .date
            .as_deref()
            .ok_or_else(|| "missing date".to_string())
            .and_then(|text| {
                parse_flexible_date(text).ok_or_else(|| format!("malformed date '{}'", text))
            })?;
        let account = non_blank(raw.account.as_deref()).ok_or("missing account")?;
        let amount = raw.amount.ok_or("missing amount")?;
        let kind = raw.kind.unwrap_or_else(|| MovementKind::from_sign(amount));
        let id = raw.id.unwrap_or(index as u64);

        let mut movement = Movement::new(id, date, account, amount, kind);
        movement.description = raw.description.clone().unwrap_or_default();
        movement.counterpart = non_blank(raw.counterpart.as_deref()).map(str::to_string);
        movement.category = non_blank(raw.category.as_deref()).map(str::to_string);
        movement.origin = non_blank(raw.origin.as_deref()).map(str::to_string);
        Ok(movement)
    })
}

pub fn validate_journal_entries(records: &[RawJournalRecord]) -> IngestionReport<JournalEntry> {
    collect(records, "journal entry", |index, raw| {
        let date = raw
            .date
            .as_deref()
            .and_then(parse_flexible_date)
            .ok_or("missing or malformed date")?;
        let debit = non_blank(raw.debit_account.as_deref()).ok_or("missing debit account")?;
        let credit = non_blank(raw.credit_account.as_deref()).ok_or("missing credit account")?;
        let amount = raw.amount.ok_or("missing amount")?;
        if amount <= Decimal::ZERO {
            return Err(format!("amount must be positive, got {}", amount));
        }

        let mut entry = JournalEntry::new(raw.id.unwrap_or(index as u64), date, debit, credit, amount);
        entry.history = non_blank(raw.history.as_deref()).map(str::to_string);
        Ok(entry)
    })
}

pub fn validate_accounts(records: &[RawAccountRecord]) -> IngestionReport<LedgerAccount> {
    collect(records, "account", |_, raw| {
        let id = non_blank(raw.id.as_deref()).ok_or("missing id")?;
        let name = non_blank(raw.name.as_deref()).ok_or("missing name")?;
        let nature = raw.nature.ok_or("missing nature")?;

        let mut account = LedgerAccount::new(id, name, nature);
        account.code = non_blank(raw.code.as_deref()).map(str::to_string);
        Ok(account)
    })
}

fn collect<R, T, F>(records: &[R], what: &str, convert: F) -> IngestionReport<T>
where
    F: Fn(usize, &R) -> std::result::Result<T, String>,
{
    let mut accepted = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();

    for (index, record) in records.iter().enumerate() {
        match convert(index, record) {
            Ok(value) => accepted.push(value),
            Err(reason) => {
                warn!("Rejected {} #{}: {}", what, index, reason);
                rejected.push(RejectedRecord { index, reason });
            }
        }
    }

    IngestionReport { accepted, rejected }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn movement_record_schema() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&schemars::schema_for!(Vec<RawMovementRecord>))
}
