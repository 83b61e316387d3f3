use std::sync::Arc;

use futures::stream::BoxStream;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::EcsqlQueryDef;

/// A single result row, keyed by column name.
pub type Row = Map<String, Value>;

pub type RowStream = BoxStream<'static, Result<Row, QueryError>>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Query returned more than the allowed {limit} rows")]
    RowsLimitExceeded { limit: u64 },

    #[error("Query execution failed: {0}")]
    Execution(String),
}

impl QueryError {
    #[must_use]
    pub fn is_rows_limit_exceeded(&self) -> bool {
        matches!(self, Self::RowsLimitExceeded { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryReaderOptions {
    /// Upper bound on rows the reader needs to produce.
    pub limit: Option<u64>,
}

/// A backing store able to execute ECSQL queries.
///
/// Readers are lazy: nothing is expected to execute until the returned stream
/// is polled, and dropping the stream abandons the query.
pub trait QueryExecutor: Send + Sync {
    fn create_query_reader(&self, query: &EcsqlQueryDef, options: QueryReaderOptions) -> RowStream;
}

impl<T: QueryExecutor + ?Sized> QueryExecutor for Arc<T> {
    fn create_query_reader(&self, query: &EcsqlQueryDef, options: QueryReaderOptions) -> RowStream {
        (**self).create_query_reader(query, options)
    }
}
