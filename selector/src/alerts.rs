use serde::Deserialize;
use serde_json::json;

use crate::{
    config::AccountId,
    error::Phase,
    pager::{server_cursor, Page, PageStrategy, Request},
};

const QUERY: &str = "query($accountId: Int!, $cursor: String) {
  actor {
    account(id: $accountId) {
      alerts {
        nrqlConditionsSearch(cursor: $cursor) {
          nextCursor
          nrqlConditions {
            nrql {
              query
            }
          }
        }
      }
    }
  }
}";

/// NRQL of every alert condition of the account.
#[derive(Debug, Clone)]
pub struct AlertConditions {
    account_id: AccountId,
}

impl AlertConditions {
    pub fn new(account_id: AccountId) -> Self {
        Self { account_id }
    }
}

#[derive(Debug, Deserialize)]
pub struct Response {
    actor: Actor,
}

#[derive(Debug, Deserialize)]
struct Actor {
    account: Account,
}

#[derive(Debug, Deserialize)]
struct Account {
    alerts: Alerts,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Alerts {
    nrql_conditions_search: ConditionsSearch,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConditionsSearch {
    next_cursor: Option<String>,
    #[serde(default)]
    nrql_conditions: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    nrql: Option<ConditionNrql>,
}

#[derive(Debug, Deserialize)]
struct ConditionNrql {
    #[serde(default)]
    query: Option<String>,
}

impl PageStrategy for AlertConditions {
    type Item = String;
    type Response = Response;

    fn phase(&self) -> Phase {
        Phase::Alerts
    }

    fn build_request(&self, cursor: Option<&str>) -> Request {
        Request {
            query: QUERY,
            variables: json!({
                "accountId": self.account_id.get(),
                "cursor": cursor,
            }),
        }
    }

    fn extract_page(&self, response: Response) -> Page<String> {
        let search = response.actor.account.alerts.nrql_conditions_search;
        Page {
            items: search
                .nrql_conditions
                .into_iter()
                .filter_map(|condition| condition.nrql)
                .map(|nrql| nrql.query.unwrap_or_default())
                .collect(),
            cursor: search.next_cursor,
        }
    }

    fn next_cursor(&self, page: &Page<String>) -> Option<String> {
        server_cursor(page)
    }
}
