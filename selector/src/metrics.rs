use serde::Deserialize;
use serde_json::json;

use crate::{
    config::{AccountId, AuditConfig},
    error::Phase,
    nrql,
    pager::{Page, PageStrategy, Request},
};

const QUERY: &str = "query($accountId: Int!, $nrql: Nrql!) {
  actor {
    nrql(accounts: [$accountId], query: $nrql) {
      results
    }
  }
}";

/// Distinct metric names, paged by re-issuing the NRQL query with a
/// `metricName > last seen` filter.
///
/// Relies on `uniques()` returning names in ascending order, so the last
/// name of a full page is a valid lower bound for the next one.
#[derive(Debug, Clone)]
pub struct MetricNames {
    account_id: AccountId,
    base_query: String,
    limit: usize,
}

impl MetricNames {
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            account_id: config.account_id,
            base_query: config.metrics_query.clone(),
            limit: config.page_size,
        }
    }

    pub fn nrql(&self, last_seen: Option<&str>) -> String {
        nrql::paged_query(&self.base_query, last_seen, self.limit)
    }
}

#[derive(Debug, Deserialize)]
pub struct Response {
    actor: Actor,
}

#[derive(Debug, Deserialize)]
struct Actor {
    nrql: NrqlResult,
}

#[derive(Debug, Deserialize)]
struct NrqlResult {
    #[serde(default)]
    results: Vec<UniquesRow>,
}

#[derive(Debug, Deserialize)]
struct UniquesRow {
    #[serde(rename = "uniques.metricName", default)]
    names: Vec<String>,
}

impl PageStrategy for MetricNames {
    type Item = String;
    type Response = Response;

    fn phase(&self) -> Phase {
        Phase::Metrics
    }

    fn build_request(&self, cursor: Option<&str>) -> Request {
        let nrql = self.nrql(cursor);
        tracing::debug!(%nrql, "metric names page");
        Request {
            query: QUERY,
            variables: json!({
                "accountId": self.account_id.get(),
                "nrql": nrql,
            }),
        }
    }

    fn extract_page(&self, response: Response) -> Page<String> {
        let items = response
            .actor
            .nrql
            .results
            .into_iter()
            .flat_map(|row| row.names)
            .collect();
        Page {
            items,
            cursor: None,
        }
    }

    fn next_cursor(&self, page: &Page<String>) -> Option<String> {
        if page.items.len() < self.limit {
            return None;
        }
        page.items.last().cloned()
    }
}
