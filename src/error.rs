use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RollupError {
    #[error("Failed to fetch data from source: {0}")]
    Fetch(String),

    #[error("Invalid record {record}: {details}")]
    DataIntegrity { record: String, details: String },

    #[error("Journal entry {entry_id} references unknown account '{account_id}'")]
    UnknownAccount { entry_id: u64, account_id: String },

    #[error("Invalid reporting window: {0}")]
    InvalidWindow(String),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Double-entry conservation violated: balances sum to {sum} (tolerance {tolerance})")]
    ConservationViolation { sum: Decimal, tolerance: Decimal },

    #[error("Balance sheet mismatch: Assets ({assets}) != Liabilities ({liabilities}) + Equity ({equity}) + Result ({result})")]
    BalanceSheetMismatch {
        assets: Decimal,
        liabilities: Decimal,
        equity: Decimal,
        result: Decimal,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "remote")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Coarse grouping of errors for user-facing messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Fetch,
    DataIntegrity,
    Configuration,
}

impl RollupError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RollupError::Fetch(_) | RollupError::IoError(_) => ErrorCategory::Fetch,
            #[cfg(feature = "remote")]
            RollupError::HttpError(_) => ErrorCategory::Fetch,
            RollupError::DataIntegrity { .. }
            | RollupError::UnknownAccount { .. }
            | RollupError::DateError(_)
            | RollupError::ConservationViolation { .. }
            | RollupError::BalanceSheetMismatch { .. }
            | RollupError::SerializationError(_)
            | RollupError::CsvError(_) => ErrorCategory::DataIntegrity,
            RollupError::InvalidWindow(_) | RollupError::Config(_) => {
                ErrorCategory::Configuration
            }
        }
    }

    /// Short pt-BR message suitable for a notification toast.
    pub fn user_message(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Fetch => {
                "Não foi possível carregar os dados. Verifique sua conexão e tente novamente."
            }
            ErrorCategory::DataIntegrity => {
                "Alguns lançamentos estão inconsistentes e foram desconsiderados. Revise os registros."
            }
            ErrorCategory::Configuration => {
                "O período ou os filtros selecionados são inválidos."
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, RollupError>;
