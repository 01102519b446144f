use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    error::{AuditError, Phase, Result},
    executor::QueryExecutor,
};

/// One round trip to the query endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub query: &'static str,
    pub variables: Value,
}

/// Items of one page and the continuation token the server sent with them,
/// if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub cursor: Option<String>,
}

/// How one paginated collection is requested and unpacked.
///
/// [`fetch_all`] drives any implementation: it sends
/// [`build_request`](Self::build_request) with the current cursor, decodes
/// the reply into [`Response`](Self::Response), unpacks it with
/// [`extract_page`](Self::extract_page), and continues for as long as
/// [`next_cursor`](Self::next_cursor) returns a token.
pub trait PageStrategy {
    type Item;
    type Response: DeserializeOwned;

    fn phase(&self) -> Phase;

    /// `cursor` is `None` for the first page.
    fn build_request(&self, cursor: Option<&str>) -> Request;

    fn extract_page(&self, response: Self::Response) -> Page<Self::Item>;

    /// Token for the page after `page`, or `None` when `page` is the last.
    fn next_cursor(&self, page: &Page<Self::Item>) -> Option<String>;
}

/// Server-issued cursors: the collection ends when no cursor is returned.
pub(crate) fn server_cursor<T>(page: &Page<T>) -> Option<String> {
    page.cursor.clone()
}

/// Fetches every page of `strategy` in order and returns all items.
///
/// One attempt per page: the first failure aborts the fetch and the items
/// gathered so far are dropped.
pub async fn fetch_all<E, S>(executor: &E, strategy: &S) -> Result<Vec<S::Item>>
where
    E: QueryExecutor + ?Sized,
    S: PageStrategy,
{
    let phase = strategy.phase();
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut page_no = 0usize;

    loop {
        let request = strategy.build_request(cursor.as_deref());
        let data = executor
            .execute(request.query, request.variables)
            .await
            .map_err(|e| {
                tracing::error!(%phase, page = page_no, error = %e, "query failed");
                AuditError::transport(phase, e)
            })?;
        let response =
            serde_json::from_value::<S::Response>(data).map_err(|e| AuditError::decode(phase, e))?;

        let page = strategy.extract_page(response);
        let next = strategy.next_cursor(&page);
        tracing::debug!(
            %phase,
            page = page_no,
            items = page.items.len(),
            next_cursor = ?next,
            "fetched page"
        );
        items.extend(page.items);
        page_no += 1;

        match next {
            None => break,
            Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                return Err(AuditError::StalledPagination {
                    phase,
                    cursor: next,
                });
            }
            Some(next) => cursor = Some(next),
        }
    }

    tracing::info!(%phase, pages = page_no, items = items.len(), "fetch complete");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::TransportError, testing::MockExecutor};
    use serde::Deserialize;
    use serde_json::json;

    /// Numbers paginated either by server cursor or by page length.
    struct Numbers {
        limit: Option<usize>,
    }

    #[derive(Deserialize)]
    struct NumbersResponse {
        items: Vec<u32>,
        next: Option<String>,
    }

    impl PageStrategy for Numbers {
        type Item = u32;
        type Response = NumbersResponse;

        fn phase(&self) -> Phase {
            Phase::Alerts
        }

        fn build_request(&self, cursor: Option<&str>) -> Request {
            Request {
                query: "query($cursor: String) { numbers(cursor: $cursor) }",
                variables: json!({ "cursor": cursor }),
            }
        }

        fn extract_page(&self, response: NumbersResponse) -> Page<u32> {
            Page {
                items: response.items,
                cursor: response.next,
            }
        }

        fn next_cursor(&self, page: &Page<u32>) -> Option<String> {
            match self.limit {
                None => server_cursor(page),
                Some(limit) if page.items.len() < limit => None,
                Some(_) => page.items.last().map(u32::to_string),
            }
        }
    }

    fn page(items: &[u32], next: Option<&str>) -> std::result::Result<Value, TransportError> {
        Ok(json!({ "items": items, "next": next }))
    }

    #[tokio::test]
    async fn test_concatenates_pages_in_order() {
        let executor = MockExecutor::scripted(vec![
            page(&[1, 2], Some("a")),
            page(&[3], Some("b")),
            page(&[4, 5], None),
        ]);
        let items = fetch_all(&executor, &Numbers { limit: None }).await.unwrap();
        assert_eq!(items, vec![1, 2, 3, 4, 5]);

        let cursors = executor
            .calls()
            .into_iter()
            .map(|call| call.variables["cursor"].clone())
            .collect::<Vec<_>>();
        assert_eq!(cursors, vec![json!(null), json!("a"), json!("b")]);
    }

    #[tokio::test]
    async fn test_empty_first_page() {
        let executor = MockExecutor::scripted(vec![page(&[], None)]);
        let items = fetch_all(&executor, &Numbers { limit: None }).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(executor.call_count(), 1);
    }

    #[tokio::test]
    async fn test_null_cursor_stops() {
        // Anything past the terminal page would be an error if requested.
        let executor = MockExecutor::scripted(vec![
            page(&[1], None),
            Err(TransportError::new("must not be requested")),
        ]);
        let items = fetch_all(&executor, &Numbers { limit: None }).await.unwrap();
        assert_eq!(items, vec![1]);
        assert_eq!(executor.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_page_with_cursor_is_followed() {
        let executor = MockExecutor::scripted(vec![
            page(&[], Some("a")),
            page(&[], Some("b")),
            page(&[7], None),
        ]);
        let items = fetch_all(&executor, &Numbers { limit: None }).await.unwrap();
        assert_eq!(items, vec![7]);
        assert_eq!(executor.call_count(), 3);
    }

    #[tokio::test]
    async fn test_short_page_stops_offset_style() {
        // The server claims more data; page length is authoritative.
        let executor = MockExecutor::scripted(vec![
            page(&[1, 2, 3], None),
            page(&[4, 5], Some("more")),
            page(&[6], None),
        ]);
        let items = fetch_all(&executor, &Numbers { limit: Some(3) })
            .await
            .unwrap();
        assert_eq!(items, vec![1, 2, 3, 4, 5]);
        assert_eq!(executor.call_count(), 2);
        assert_eq!(executor.calls()[1].variables["cursor"], json!("3"));
    }

    #[tokio::test]
    async fn test_full_then_empty_page_offset_style() {
        let executor = MockExecutor::scripted(vec![page(&[1, 2], None), page(&[], None)]);
        let items = fetch_all(&executor, &Numbers { limit: Some(2) })
            .await
            .unwrap();
        assert_eq!(items, vec![1, 2]);
        assert_eq!(executor.call_count(), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_discards_everything() {
        let executor = MockExecutor::scripted(vec![
            page(&[1, 2], Some("a")),
            page(&[3], Some("b")),
            Err(TransportError::new("connection reset")),
            page(&[4], None),
        ]);
        let err = fetch_all(&executor, &Numbers { limit: None })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuditError::Transport {
                phase: Phase::Alerts,
                ..
            }
        ));
        assert_eq!(err.to_string(), "alerts: query failed: connection reset");
        assert_eq!(executor.call_count(), 3);
    }

    #[tokio::test]
    async fn test_decode_failure() {
        let executor = MockExecutor::scripted(vec![Ok(json!({ "items": "nope" }))]);
        let err = fetch_all(&executor, &Numbers { limit: None })
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Decode { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_repeated_cursor_is_an_error() {
        let executor = MockExecutor::scripted(vec![
            page(&[1], Some("a")),
            page(&[2], Some("a")),
            page(&[3], None),
        ]);
        let err = fetch_all(&executor, &Numbers { limit: None })
            .await
            .unwrap_err();
        assert!(
            matches!(&err, AuditError::StalledPagination { cursor, .. } if cursor == "a"),
            "{err}"
        );
        assert_eq!(executor.call_count(), 2);
    }
}
