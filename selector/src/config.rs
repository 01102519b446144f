use std::{fmt, str::FromStr, time::Duration};

use strum::Display;

use crate::error::{AuditError, Result};

pub const DEFAULT_METRICS_QUERY: &str = "SELECT uniques(metricName) FROM Metric WHERE instrumentation.name = 'remote-write' AND instrumentation.provider = 'prometheus'";
pub const DEFAULT_PAGE_SIZE: usize = 1000;
pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_ACCOUNT_ID: u64 = i32::MAX as u64;

pub const US_ENDPOINT: &str = "https://api.newrelic.com/graphql";
pub const EU_ENDPOINT: &str = "https://api.eu.newrelic.com/graphql";

/// Positive numeric account identifier. GraphQL sends it as `Int!`, so it
/// must fit a signed 32-bit integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountId(u64);

impl AccountId {
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(AuditError::validation("account id", "must not be empty"));
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AuditError::validation(
                "account id",
                format!("{s:?} is not a number"),
            ));
        }
        match s.parse::<u64>() {
            Ok(0) => Err(AuditError::validation("account id", "must be positive")),
            Ok(id) if id > MAX_ACCOUNT_ID => Err(AuditError::validation(
                "account id",
                format!("{s:?} exceeds {MAX_ACCOUNT_ID}"),
            )),
            Ok(id) => Ok(Self(id)),
            Err(e) => Err(AuditError::validation("account id", format!("{s:?}: {e}"))),
        }
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which dashboards returned by the entity search take part in the audit.
///
/// Entity search is not scoped to one account: a key with access to several
/// accounts sees all of their dashboards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum DashboardScope {
    /// Only dashboards owned by the audited account.
    #[default]
    Account,
    /// Every dashboard the key can see.
    All,
}

impl FromStr for DashboardScope {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "account" => Ok(Self::Account),
            "all" => Ok(Self::All),
            _ => Err(AuditError::validation(
                "dashboard scope",
                format!("expected `account` or `all`, got {s:?}"),
            )),
        }
    }
}

/// Settings of one audit run, built once at startup.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub account_id: AccountId,
    /// NRQL selecting the distinct metric names to audit. Must be a
    /// `uniques(metricName)` query with a `WHERE` clause and without a
    /// `LIMIT` clause: later pages append `AND metricName > '<last>'` and
    /// `LIMIT <page size>`.
    pub metrics_query: String,
    pub page_size: usize,
    pub dashboard_scope: DashboardScope,
    /// Maximum number of dashboard detail queries in flight.
    pub concurrency: usize,
}

impl AuditConfig {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            metrics_query: DEFAULT_METRICS_QUERY.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            dashboard_scope: DashboardScope::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.metrics_query.trim().is_empty() {
            return Err(AuditError::validation("metrics query", "must not be empty"));
        }
        if self.page_size == 0 {
            return Err(AuditError::validation("page size", "must be positive"));
        }
        if self.concurrency == 0 {
            return Err(AuditError::validation("concurrency", "must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Region {
    #[default]
    Us,
    Eu,
}

impl Region {
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Us => US_ENDPOINT,
            Self::Eu => EU_ENDPOINT,
        }
    }
}

impl FromStr for Region {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "us" => Ok(Self::Us),
            "eu" => Ok(Self::Eu),
            _ => Err(AuditError::validation(
                "region",
                format!("expected `us` or `eu`, got {s:?}"),
            )),
        }
    }
}

/// Connection settings of [`NerdGraphClient`](crate::NerdGraphClient).
#[derive(Clone)]
pub struct ExecutorConfig {
    pub api_key: String,
    pub endpoint: String,
    pub request_timeout: Duration,
}

impl ExecutorConfig {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(AuditError::validation("API key", "must not be empty"));
        }
        Ok(Self {
            api_key,
            endpoint: Region::default().endpoint().to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }
}

// Keeps the key out of `{:?}` output.
impl fmt::Debug for ExecutorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorConfig")
            .field("endpoint", &self.endpoint)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}
