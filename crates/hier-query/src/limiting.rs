use std::sync::Arc;

use futures::stream;
use futures::StreamExt;
use futures::TryStreamExt;

use crate::EcsqlQueryDef;
use crate::QueryError;
use crate::QueryExecutor;
use crate::QueryReaderOptions;
use crate::RowLimit;
use crate::RowStream;

/// A query executor that enforces a maximum row count per query.
pub trait LimitingQueryExecutor: Send + Sync {
    /// Create a reader for the query. `None` uses the executor's default limit.
    ///
    /// When the query produces more rows than the limit, the stream fails with
    /// [`QueryError::RowsLimitExceeded`] before yielding any row.
    fn create_query_reader(&self, query: &EcsqlQueryDef, limit: Option<RowLimit>) -> RowStream;
}

impl<T: LimitingQueryExecutor + ?Sized> LimitingQueryExecutor for Arc<T> {
    fn create_query_reader(&self, query: &EcsqlQueryDef, limit: Option<RowLimit>) -> RowStream {
        (**self).create_query_reader(query, limit)
    }
}

pub struct LimitingExecutor<E> {
    inner: E,
    default_limit: RowLimit,
}

impl<E: QueryExecutor> LimitingExecutor<E> {
    pub fn new(inner: E, default_limit: RowLimit) -> Self {
        Self {
            inner,
            default_limit,
        }
    }

    #[must_use]
    pub fn default_limit(&self) -> RowLimit {
        self.default_limit
    }
}

impl<E: QueryExecutor> LimitingQueryExecutor for LimitingExecutor<E> {
    fn create_query_reader(&self, query: &EcsqlQueryDef, limit: Option<RowLimit>) -> RowStream {
        let RowLimit::Rows(limit) = limit.unwrap_or(self.default_limit) else {
            return self
                .inner
                .create_query_reader(query, QueryReaderOptions::default());
        };

        // one extra row is enough to tell that the limit is exceeded
        let mut reader = self.inner.create_query_reader(
            query,
            QueryReaderOptions {
                limit: Some(limit.saturating_add(1)),
            },
        );

        stream::once(async move {
            let mut rows = Vec::new();
            while let Some(row) = reader.try_next().await? {
                rows.push(row);
                if rows.len() as u64 > limit {
                    tracing::debug!(limit, "Query rows limit exceeded");
                    return Err(QueryError::RowsLimitExceeded { limit });
                }
            }
            tracing::trace!(limit, rows = rows.len(), "Read query rows within limit");
            Ok(stream::iter(rows.into_iter().map(Ok)))
        })
        .try_flatten()
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::InMemoryQueryExecutor;
    use crate::Row;

    fn rows(count: usize) -> Vec<Row> {
        (0..count)
            .map(|i| {
                json!({ "ECInstanceId": format!("0x{i:x}") })
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_exactly_at_limit_succeeds() {
        let executor = InMemoryQueryExecutor::new().with_rows("SELECT x", rows(3));
        let limiting = LimitingExecutor::new(executor, RowLimit::Rows(3));
        let result: Vec<Row> = limiting
            .create_query_reader(&EcsqlQueryDef::new("SELECT x"), None)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(result.len(), 3);
    }

    #[tokio::test]
    async fn test_over_limit_fails_without_rows() {
        let executor = InMemoryQueryExecutor::new().with_rows("SELECT x", rows(4));
        let limiting = LimitingExecutor::new(executor, RowLimit::Rows(3));
        let mut reader = limiting.create_query_reader(&EcsqlQueryDef::new("SELECT x"), None);
        assert_eq!(
            reader.next().await,
            Some(Err(QueryError::RowsLimitExceeded { limit: 3 }))
        );
    }

    #[tokio::test]
    async fn test_explicit_limit_overrides_default() {
        let executor = InMemoryQueryExecutor::new().with_rows("SELECT x", rows(4));
        let limiting = LimitingExecutor::new(executor, RowLimit::Rows(3));
        let result: Vec<Row> = limiting
            .create_query_reader(&EcsqlQueryDef::new("SELECT x"), Some(RowLimit::Unbounded))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(result.len(), 4);
    }

    #[tokio::test]
    async fn test_requests_one_row_over_limit() {
        let executor = Arc::new(InMemoryQueryExecutor::new().with_rows("SELECT x", rows(10)));
        let limiting = LimitingExecutor::new(executor.clone(), RowLimit::Rows(5));
        let _ = limiting
            .create_query_reader(&EcsqlQueryDef::new("SELECT x"), None)
            .try_collect::<Vec<_>>()
            .await;
        assert_eq!(executor.executed_limits(), vec![Some(6)]);
    }

    #[tokio::test]
    async fn test_execution_errors_pass_through() {
        let executor = InMemoryQueryExecutor::new()
            .with_error("SELECT x", QueryError::Execution("disk on fire".to_string()));
        let limiting = LimitingExecutor::new(executor, RowLimit::Rows(5));
        let result = limiting
            .create_query_reader(&EcsqlQueryDef::new("SELECT x"), None)
            .try_collect::<Vec<_>>()
            .await;
        assert_eq!(
            result,
            Err(QueryError::Execution("disk on fire".to_string()))
        );
    }
}
