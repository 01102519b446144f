use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::json;

use crate::{
    config::{AccountId, DashboardScope},
    error::{AuditError, Phase, Result},
    executor::QueryExecutor,
    pager::{server_cursor, Page, PageStrategy, Request},
};

const SEARCH_QUERY: &str = "query($cursor: String) {
  actor {
    entitySearch(query: \"type = 'DASHBOARD'\") {
      results(cursor: $cursor) {
        entities {
          ... on DashboardEntityOutline {
            name
            guid
            account {
              id
            }
          }
        }
        nextCursor
      }
    }
  }
}";

const DETAIL_QUERY: &str = "query($guid: EntityGuid!) {
  actor {
    entity(guid: $guid) {
      ... on DashboardEntity {
        pages {
          widgets {
            rawConfiguration
          }
        }
      }
    }
  }
}";

/// Rough wall time of one detail query, used for the progress estimate.
const SECONDS_PER_DASHBOARD: f64 = 0.55;

/// A dashboard found by entity search.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DashboardEntity {
    pub name: String,
    pub guid: String,
    #[serde(rename = "account", default, deserialize_with = "account_id")]
    pub account_id: Option<u64>,
}

fn account_id<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct AccountRef {
        id: u64,
    }
    Ok(Option::<AccountRef>::deserialize(deserializer)?.map(|account| account.id))
}

/// Dashboards visible to the key, walked with the server's `nextCursor`.
#[derive(Debug, Clone)]
pub struct DashboardSearch {
    account_id: AccountId,
    scope: DashboardScope,
}

impl DashboardSearch {
    pub fn new(account_id: AccountId, scope: DashboardScope) -> Self {
        Self { account_id, scope }
    }

    fn in_scope(&self, entity: &DashboardEntity) -> bool {
        match self.scope {
            DashboardScope::All => true,
            DashboardScope::Account => entity.account_id == Some(self.account_id.get()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    actor: SearchActor,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchActor {
    entity_search: EntitySearch,
}

#[derive(Debug, Deserialize)]
struct EntitySearch {
    results: SearchResults,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResults {
    #[serde(default)]
    entities: Vec<DashboardEntity>,
    next_cursor: Option<String>,
}

impl PageStrategy for DashboardSearch {
    type Item = DashboardEntity;
    type Response = SearchResponse;

    fn phase(&self) -> Phase {
        Phase::Dashboards
    }

    fn build_request(&self, cursor: Option<&str>) -> Request {
        Request {
            query: SEARCH_QUERY,
            variables: json!({ "cursor": cursor }),
        }
    }

    fn extract_page(&self, response: SearchResponse) -> Page<DashboardEntity> {
        let results = response.actor.entity_search.results;
        let items = results
            .entities
            .into_iter()
            .filter(|entity| {
                let keep = self.in_scope(entity);
                if keep {
                    tracing::debug!(name = %entity.name, guid = %entity.guid, "dashboard");
                }
                keep
            })
            .collect();
        Page {
            items,
            cursor: results.next_cursor,
        }
    }

    fn next_cursor(&self, page: &Page<DashboardEntity>) -> Option<String> {
        server_cursor(page)
    }
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    actor: DetailActor,
}

#[derive(Debug, Deserialize)]
struct DetailActor {
    entity: Option<DashboardDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct DashboardDetail {
    #[serde(default)]
    pages: Vec<DashboardPage>,
}

#[derive(Debug, Deserialize)]
struct DashboardPage {
    #[serde(default)]
    widgets: Vec<Widget>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Widget {
    #[serde(default)]
    raw_configuration: Option<RawConfiguration>,
}

/// Widget configuration is free-form JSON; only NRQL-backed widgets carry
/// `nrqlQueries`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfiguration {
    #[serde(default)]
    nrql_queries: Vec<WidgetQuery>,
}

#[derive(Debug, Deserialize)]
struct WidgetQuery {
    #[serde(default)]
    query: Option<String>,
}

/// Fetches the NRQL queries of one dashboard's widgets across all its pages.
pub async fn dashboard_queries<E>(executor: &E, guid: &str) -> Result<Vec<String>>
where
    E: QueryExecutor + ?Sized,
{
    let phase = Phase::DashboardDetails;
    let data = executor
        .execute(DETAIL_QUERY, json!({ "guid": guid }))
        .await
        .map_err(|e| AuditError::transport(phase, e))?;
    let response =
        serde_json::from_value::<DetailResponse>(data).map_err(|e| AuditError::decode(phase, e))?;

    let Some(dashboard) = response.actor.entity else {
        tracing::warn!(%guid, "dashboard not found");
        return Ok(Vec::new());
    };
    let queries = dashboard
        .pages
        .into_iter()
        .flat_map(|page| page.widgets)
        .filter_map(|widget| widget.raw_configuration)
        .flat_map(|config| config.nrql_queries)
        .map(|q| q.query.unwrap_or_default())
        .collect::<Vec<_>>();
    tracing::debug!(%guid, queries = queries.len(), "dashboard queries");
    Ok(queries)
}

/// Collects the widget queries of every dashboard in `entities`.
///
/// Up to `concurrency` detail queries run at once. A dashboard whose query
/// fails is logged and skipped; the rest of the batch carries on. The result
/// keeps the order of `entities`.
pub async fn extract_queries<E>(
    executor: &E,
    entities: &[DashboardEntity],
    concurrency: usize,
) -> Vec<String>
where
    E: QueryExecutor + ?Sized,
{
    let concurrency = concurrency.max(1);
    tracing::info!(
        dashboards = entities.len(),
        concurrency,
        "fetching dashboard details, this will take approximately {:.1} minutes",
        estimated_minutes(entities.len(), concurrency)
    );

    let mut results = stream::iter(entities.iter().enumerate())
        .map(|(idx, entity)| async move {
            let result = dashboard_queries(executor, &entity.guid).await;
            (idx, entity, result)
        })
        .buffer_unordered(concurrency)
        .collect::<Vec<_>>()
        .await;
    results.sort_by_key(|(idx, _, _)| *idx);

    let mut queries = Vec::new();
    let mut failed = 0usize;
    for (_, entity, result) in results {
        match result {
            Ok(found) => queries.extend(found),
            Err(error) => {
                failed += 1;
                tracing::error!(
                    name = %entity.name,
                    guid = %entity.guid,
                    %error,
                    "skipping dashboard"
                );
            }
        }
    }
    tracing::info!(queries = queries.len(), failed, "dashboard details complete");
    queries
}

fn estimated_minutes(dashboards: usize, concurrency: usize) -> f64 {
    dashboards as f64 * SECONDS_PER_DASHBOARD / concurrency as f64 / 60.0
}
