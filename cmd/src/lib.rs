use std::{str::FromStr, time::Duration};

use clap::Parser;
use color_eyre::eyre::{eyre, Result, WrapErr};
use selector::{AccountId, AuditConfig, DashboardScope, ExecutorConfig, Region};

pub const API_KEY_VAR: &str = "NEW_RELIC_API_KEY";
pub const ACCOUNT_ID_VAR: &str = "NEW_RELIC_ACCOUNT_ID";
pub const METRICS_QUERY_VAR: &str = "NRQL_PROMETHEUS_METRICS";
pub const REGION_VAR: &str = "NEW_RELIC_REGION";
pub const ENDPOINT_VAR: &str = "NEW_RELIC_GRAPHQL_URL";
pub const PAGE_SIZE_VAR: &str = "NRMS_PAGE_SIZE";
pub const SCOPE_VAR: &str = "NRMS_DASHBOARD_SCOPE";
pub const CONCURRENCY_VAR: &str = "NRMS_CONCURRENCY";
pub const REQUEST_TIMEOUT_VAR: &str = "NRMS_REQUEST_TIMEOUT_SECS";
pub const RUN_TIMEOUT_VAR: &str = "NRMS_RUN_TIMEOUT_SECS";

const ENV_HELP: &str = "\
Environment Variables:
  NEW_RELIC_API_KEY          Your New Relic API key (required)
  NEW_RELIC_ACCOUNT_ID       Your New Relic account ID (required)
  NRQL_PROMETHEUS_METRICS    NRQL selecting the metric names to audit
  NEW_RELIC_REGION           `us` (default) or `eu`
  NEW_RELIC_GRAPHQL_URL      GraphQL endpoint, overrides the region
  NRMS_PAGE_SIZE             Metric names fetched per query [default: 1000]
  NRMS_DASHBOARD_SCOPE       `account` (default) or `all` dashboards
  NRMS_CONCURRENCY           Dashboard detail queries in flight [default: 8]
  NRMS_REQUEST_TIMEOUT_SECS  Timeout of a single query [default: 30]
  NRMS_RUN_TIMEOUT_SECS      Deadline for the whole run [default: none]
  RUST_LOG                   Log filter [default: info]

Writes <account>_used_<timestamp>.txt and <account>_unused_<timestamp>.txt
to the working directory.";

/// Lists the Prometheus metrics an account ingests through remote write,
/// split by whether a dashboard or alert condition references them.
#[derive(Debug, Parser)]
#[command(name = "nrms", after_help = ENV_HELP)]
pub struct Cli {}

/// Everything the binary reads from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub audit: AuditConfig,
    pub executor: ExecutorConfig,
    pub run_timeout: Option<Duration>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from `var`, which returns the value of an environment
    /// variable. Empty values count as unset.
    pub fn from_lookup<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| var(key).filter(|value| !value.is_empty());

        let api_key =
            var(API_KEY_VAR).ok_or_else(|| eyre!("{API_KEY_VAR} environment variable is not set"))?;
        let account_id = var(ACCOUNT_ID_VAR)
            .ok_or_else(|| eyre!("{ACCOUNT_ID_VAR} environment variable is not set"))?;
        let account_id = AccountId::parse(&account_id).wrap_err(ACCOUNT_ID_VAR)?;

        let mut audit = AuditConfig::new(account_id);
        if let Some(query) = var(METRICS_QUERY_VAR) {
            audit.metrics_query = query;
        }
        if let Some(page_size) = parse_var(&var, PAGE_SIZE_VAR)? {
            audit.page_size = page_size;
        }
        if let Some(scope) = var(SCOPE_VAR) {
            audit.dashboard_scope = DashboardScope::from_str(&scope).wrap_err(SCOPE_VAR)?;
        }
        if let Some(concurrency) = parse_var(&var, CONCURRENCY_VAR)? {
            audit.concurrency = concurrency;
        }
        audit.validate()?;

        let mut executor = ExecutorConfig::new(api_key)?;
        if let Some(region) = var(REGION_VAR) {
            executor.endpoint = Region::from_str(&region)
                .wrap_err(REGION_VAR)?
                .endpoint()
                .to_string();
        }
        if let Some(endpoint) = var(ENDPOINT_VAR) {
            executor.endpoint = endpoint;
        }
        if let Some(secs) = parse_var(&var, REQUEST_TIMEOUT_VAR)? {
            executor.request_timeout = positive_secs(REQUEST_TIMEOUT_VAR, secs)?;
        }

        let run_timeout = parse_var(&var, RUN_TIMEOUT_VAR)?
            .map(|secs| positive_secs(RUN_TIMEOUT_VAR, secs))
            .transpose()?;

        Ok(Self {
            audit,
            executor,
            run_timeout,
        })
    }
}

fn parse_var<T, F>(var: F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|value| {
            value
                .parse::<T>()
                .wrap_err_with(|| format!("invalid {key}: {value:?}"))
        })
        .transpose()
}

fn positive_secs(key: &str, secs: u64) -> Result<Duration> {
    if secs == 0 {
        return Err(eyre!("invalid {key}: must be positive"));
    }
    Ok(Duration::from_secs(secs))
}

/// Keeps the first and last four characters of keys longer than eight
/// characters; shorter keys are hidden entirely.
pub fn mask_api_key(api_key: &str) -> String {
    let chars = api_key.chars().collect::<Vec<_>>();
    if chars.len() > 8 {
        let head = chars[..4].iter().collect::<String>();
        let tail = chars[chars.len() - 4..].iter().collect::<String>();
        format!("{head}{}{tail}", "*".repeat(chars.len() - 8))
    } else {
        "*".repeat(chars.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use expect_test::expect;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        (API_KEY_VAR, "NRAK-0123456789"),
        (ACCOUNT_ID_VAR, "1234"),
    ];

    #[test]
    fn test_defaults() {
        let settings = settings(&REQUIRED).unwrap();
        assert_eq!(settings.audit.account_id.get(), 1234);
        assert_eq!(settings.audit.metrics_query, selector::config::DEFAULT_METRICS_QUERY);
        assert_eq!(settings.audit.page_size, 1000);
        assert_eq!(settings.audit.dashboard_scope, DashboardScope::Account);
        assert_eq!(settings.audit.concurrency, 8);
        assert_eq!(settings.executor.endpoint, "https://api.newrelic.com/graphql");
        assert_eq!(settings.executor.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.run_timeout, None);
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            (METRICS_QUERY_VAR, "SELECT uniques(metricName) FROM Metric"),
            (REGION_VAR, "eu"),
            (PAGE_SIZE_VAR, "500"),
            (SCOPE_VAR, "all"),
            (CONCURRENCY_VAR, "16"),
            (REQUEST_TIMEOUT_VAR, "5"),
            (RUN_TIMEOUT_VAR, "600"),
        ]);
        let settings = settings(&vars).unwrap();
        assert_eq!(settings.audit.metrics_query, "SELECT uniques(metricName) FROM Metric");
        assert_eq!(settings.audit.page_size, 500);
        assert_eq!(settings.audit.dashboard_scope, DashboardScope::All);
        assert_eq!(settings.audit.concurrency, 16);
        assert_eq!(settings.executor.endpoint, "https://api.eu.newrelic.com/graphql");
        assert_eq!(settings.executor.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.run_timeout, Some(Duration::from_secs(600)));

        vars.push((ENDPOINT_VAR, "https://staging-api.newrelic.com/graphql"));
        let settings = self::settings(&vars).unwrap();
        assert_eq!(settings.executor.endpoint, "https://staging-api.newrelic.com/graphql");
    }

    #[test]
    fn test_missing_required() {
        let err = settings(&[(ACCOUNT_ID_VAR, "1234")]).unwrap_err();
        assert_eq!(err.to_string(), "NEW_RELIC_API_KEY environment variable is not set");

        let err = settings(&[(API_KEY_VAR, "key"), (ACCOUNT_ID_VAR, "")]).unwrap_err();
        assert_eq!(err.to_string(), "NEW_RELIC_ACCOUNT_ID environment variable is not set");
    }

    #[test]
    fn test_invalid_values() {
        let err = settings(&[(API_KEY_VAR, "key"), (ACCOUNT_ID_VAR, "abc")]).unwrap_err();
        assert_eq!(err.to_string(), "NEW_RELIC_ACCOUNT_ID");
        assert!(err.root_cause().to_string().contains("is not a number"));

        for (key, value) in [
            (PAGE_SIZE_VAR, "0"),
            (PAGE_SIZE_VAR, "many"),
            (SCOPE_VAR, "owner"),
            (CONCURRENCY_VAR, "-1"),
            (REGION_VAR, "mars"),
            (REQUEST_TIMEOUT_VAR, "0"),
            (RUN_TIMEOUT_VAR, "soon"),
        ] {
            let mut vars = REQUIRED.to_vec();
            vars.push((key, value));
            assert!(settings(&vars).is_err(), "{key}={value}");
        }
    }

    #[test]
    fn test_mask_api_key() {
        expect![[r#"
            [
                "NRAK****DEFG",
                "1234*6789",
                "********",
                "***",
                "",
            ]
        "#]]
        .assert_debug_eq(&[
            mask_api_key("NRAK-ABCDEFG"),
            mask_api_key("123456789"),
            mask_api_key("12345678"),
            mask_api_key("abc"),
            mask_api_key(""),
        ]);
    }

    #[test]
    fn test_cli() {
        Cli::command().debug_assert();

        let err = Cli::try_parse_from(["nrms", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        let help = err.to_string();
        assert!(help.contains(API_KEY_VAR));
        assert!(help.contains(ACCOUNT_ID_VAR));

        assert!(Cli::try_parse_from(["nrms"]).is_ok());
        assert!(Cli::try_parse_from(["nrms", "extra"]).is_err());
    }
}
