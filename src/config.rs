use crate::balancer::UnknownAccountPolicy;
use crate::error::{Result, RollupError};
use crate::schema::{CompanyContext, ReportingWindow};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RollupConfig {
    #[schemars(description = "Identifier of the company whose data is rolled up")]
    pub company_id: String,

    #[serde(default)]
    #[schemars(description = "Display name of the company")]
    pub company_name: Option<String>,

    #[schemars(
        description = "Reporting period as 'YYYY-MM' for a single month or 'YYYY-MM:YYYY-MM' for an inclusive range"
    )]
    pub period: String,

    #[serde(default)]
    #[schemars(description = "Cash balance before the first movement of the period")]
    pub opening_balance: Decimal,

    #[serde(default)]
    #[schemars(description = "How journal entries naming unknown accounts are handled")]
    pub unknown_account_policy: UnknownAccountPolicy,

    #[serde(default = "default_tolerance")]
    #[schemars(description = "Largest acceptable imbalance when verifying double-entry totals")]
    pub balance_tolerance: Decimal,

    #[serde(default = "default_decimal_places")]
    #[schemars(description = "Decimal places used when presenting averages")]
    pub average_decimal_places: u32,
}

fn default_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

fn default_decimal_places() -> u32 {
    2
}

impl RollupConfig {
    pub fn new(company_id: impl Into<String>, period: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            company_name: None,
            period: period.into(),
            opening_balance: Decimal::ZERO,
            unknown_account_policy: UnknownAccountPolicy::default(),
            balance_tolerance: default_tolerance(),
            average_decimal_places: default_decimal_places(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            RollupError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.company_id.trim().is_empty() {
            return Err(RollupError::Config("company_id must not be empty".to_string()));
        }

        self.window()?;

        if self.balance_tolerance.is_sign_negative() {
            return Err(RollupError::Config(format!(
                "balance_tolerance must be non-negative, got {}",
                self.balance_tolerance
            )));
        }

        if self.average_decimal_places > 10 {
            return Err(RollupError::Config(format!(
                "average_decimal_places must be between 0 and 10, got {}",
                self.average_decimal_places
            )));
        }

        Ok(())
    }

    pub fn window(&self) -> Result<ReportingWindow> {
        ReportingWindow::parse(&self.period).map_err(|e| match e {
            RollupError::DateError(details) => RollupError::InvalidWindow(details),
            other => other,
        })
    }

    pub fn context(&self) -> CompanyContext {
        let context = CompanyContext::new(self.company_id.clone());
        match &self.company_name {
            Some(name) => context.with_name(name.clone()),
            None => context,
        }
    }

    pub fn schema_as_json() -> serde_json::Result<String> {
        serde_json::to_string_pretty(&schemars::schema_for!(RollupConfig))
    }
}
