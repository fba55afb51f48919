//! Async client for a PostgREST-style hosted data service.

use crate::error::{Result, RollupError};
use crate::ingestion::{RawAccountRecord, RawJournalRecord, RawMovementRecord};
use crate::schema::{CompanyContext, ReportingWindow};
use crate::source::{DataSnapshot, RetryPolicy};
use log::{info, warn};
use reqwest::{Client, Request, Url};
use serde::de::DeserializeOwned;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RestTables {
    pub movements: String,
    pub journal_entries: String,
    pub accounts: String,
    pub company_column: String,
    pub date_column: String,
}

impl Default for RestTables {
    fn default() -> Self {
        Self {
            movements: "fluxo_caixa".to_string(),
            journal_entries: "lancamentos_contabeis".to_string(),
            accounts: "plano_contas".to_string(),
            company_column: "empresa_id".to_string(),
            date_column: "data".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct RestSourceClient {
    client: Client,
    base_url: String,
    api_key: String,
    tables: RestTables,
    retry: RetryPolicy,
}

impl RestSourceClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            tables: RestTables::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_tables(mut self, tables: RestTables) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fetches movements, journal entries and accounts concurrently and
    /// validates them into one snapshot.
    ///
    /// Journal entries are fetched from the beginning of history up to the
    /// window's last day, so balances include opening history.
    pub async fn fetch(
        &self,
        context: &CompanyContext,
        window: &ReportingWindow,
    ) -> Result<DataSnapshot> {
        let movements_query = self.movements_query(context, window);
        let entries_query = self.journal_query(context, window);
        let accounts_query = self.accounts_query(context);

        let (movements, entries, accounts) = futures::future::try_join3(
            self.get_rows::<RawMovementRecord>(&self.tables.movements, &movements_query),
            self.get_rows::<RawJournalRecord>(&self.tables.journal_entries, &entries_query),
            self.get_rows::<RawAccountRecord>(&self.tables.accounts, &accounts_query),
        )
        .await?;

        info!(
            "Fetched {} movement rows, {} journal rows and {} accounts for company {}",
            movements.len(),
            entries.len(),
            accounts.len(),
            context.company_id
        );

        Ok(
            DataSnapshot::from_raw(context.company_id.clone(), &movements, &entries, &accounts)
                .restricted_to(window),
        )
    }

    fn company_filter(&self, context: &CompanyContext) -> Vec<(String, String)> {
        vec![(
            self.tables.company_column.clone(),
            format!("eq.{}", context.company_id),
        )]
    }

    fn movements_query(
        &self,
        context: &CompanyContext,
        window: &ReportingWindow,
    ) -> Vec<(String, String)> {
        let date = &self.tables.date_column;
        let mut query = self.company_filter(context);
        query.push((date.clone(), format!("gte.{}", window.start_date().format("%Y-%m-%d"))));
        query.push((date.clone(), format!("lte.{}", window.end_date().format("%Y-%m-%d"))));
        query.push(("order".to_string(), format!("{}.asc,id.asc", date)));
        query
    }

    fn journal_query(
        &self,
        context: &CompanyContext,
        window: &ReportingWindow,
    ) -> Vec<(String, String)> {
        let date = &self.tables.date_column;
        let mut query = self.company_filter(context);
        query.push((date.clone(), format!("lte.{}", window.end_date().format("%Y-%m-%d"))));
        query.push(("order".to_string(), format!("{}.asc,id.asc", date)));
        query
    }

    fn accounts_query(&self, context: &CompanyContext) -> Vec<(String, String)> {
        let mut query = self.company_filter(context);
        query.push(("order".to_string(), "id.asc".to_string()));
        query
    }

    fn endpoint(&self, table: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            RollupError::Config(format!("invalid data service URL '{}': {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                RollupError::Config(format!("data service URL '{}' has no path", self.base_url))
            })?
            .pop_if_empty()
            .extend(["rest", "v1", table]);
        Ok(url)
    }

    fn request(&self, table: &str, query: &[(String, String)]) -> Result<Request> {
        Ok(self
            .client
            .get(self.endpoint(table)?)
            .query(query)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .build()?)
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(String, String)],
    ) -> Result<Vec<T>> {
        let mut attempt = 1;
        loop {
            match self.get_once(table, query).await {
                Ok(rows) => return Ok(rows),
                Err(e) if self.retry.should_retry(&e, attempt) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!("GET {} failed ({}); retrying in {:?}", table, e, delay);
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(String, String)],
    ) -> Result<Vec<T>> {
        let request = self.request(table, query)?;
        let res = self
            .client
            .execute(request)
            .await
            .map_err(|e| RollupError::Fetch(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let error_text = res.text().await.unwrap_or_default();
            return Err(RollupError::Fetch(format!(
                "Data service error (status {}): {}",
                status, error_text
            )));
        }

        let body = res.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
