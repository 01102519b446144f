use crate::{
    alerts::AlertConditions,
    classify::{classify, UsageMap},
    config::AuditConfig,
    dashboards::{extract_queries, DashboardSearch},
    error::Result,
    executor::QueryExecutor,
    metrics::MetricNames,
    pager::fetch_all,
    sink::{write_lines, OutputFiles},
};

/// Everything one audit run discovered.
#[derive(Debug, Clone)]
pub struct AuditReport {
    /// Metric names in discovery order.
    pub metrics: Vec<String>,
    /// Dashboard widget queries followed by alert condition queries.
    pub queries: Vec<String>,
    pub usage: UsageMap,
}

impl AuditReport {
    pub fn write(&self, files: &OutputFiles) -> Result<()> {
        write_lines(&files.used, self.usage.used())?;
        write_lines(&files.unused, self.usage.unused())?;
        Ok(())
    }
}

/// Runs the audit: metric names, dashboard queries, alert queries, then
/// classification. Phases run one after another; any failure other than a
/// single dashboard's detail query aborts the run.
pub async fn run<E>(executor: &E, config: &AuditConfig) -> Result<AuditReport>
where
    E: QueryExecutor + ?Sized,
{
    config.validate()?;
    tracing::info!(account_id = %config.account_id, nrql = %config.metrics_query, "starting audit");

    let metrics = fetch_all(executor, &MetricNames::new(config)).await?;
    tracing::info!("fetched {} prometheus metrics", metrics.len());

    let search = DashboardSearch::new(config.account_id, config.dashboard_scope);
    let dashboards = fetch_all(executor, &search).await?;
    tracing::info!(scope = %config.dashboard_scope, "fetched {} dashboards", dashboards.len());
    let mut queries = extract_queries(executor, &dashboards, config.concurrency).await;
    tracing::info!("fetched {} dashboard queries", queries.len());

    let alert_queries = fetch_all(executor, &AlertConditions::new(config.account_id)).await?;
    tracing::info!("fetched {} alert queries", alert_queries.len());
    queries.extend(alert_queries);

    let usage = classify(&metrics, &queries);
    tracing::info!(
        used = usage.used_count(),
        unused = usage.len() - usage.used_count(),
        "classified metrics"
    );

    Ok(AuditReport {
        metrics,
        queries,
        usage,
    })
}
