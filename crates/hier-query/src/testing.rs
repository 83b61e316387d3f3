//! In-memory query executor for tests.

use std::sync::Mutex;

use futures::stream;
use futures::StreamExt;

use crate::EcsqlBinding;
use crate::EcsqlQueryDef;
use crate::QueryError;
use crate::QueryExecutor;
use crate::QueryReaderOptions;
use crate::Row;
use crate::RowStream;

enum Response {
    Rows(Vec<Row>),
    Error(QueryError),
}

struct Registration {
    ecsql: String,
    bindings: Option<Vec<EcsqlBinding>>,
    response: Response,
}

/// Answers queries registered by their ECSQL text, optionally narrowed down by
/// bindings. Unregistered queries return no rows.
#[derive(Default)]
pub struct InMemoryQueryExecutor {
    registrations: Vec<Registration>,
    executed: Mutex<Vec<(EcsqlQueryDef, QueryReaderOptions)>>,
}

impl InMemoryQueryExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_rows(mut self, ecsql: impl Into<String>, rows: Vec<Row>) -> Self {
        self.registrations.push(Registration {
            ecsql: ecsql.into(),
            bindings: None,
            response: Response::Rows(rows),
        });
        self
    }

    #[must_use]
    pub fn with_bound_rows(
        mut self,
        ecsql: impl Into<String>,
        bindings: Vec<EcsqlBinding>,
        rows: Vec<Row>,
    ) -> Self {
        self.registrations.push(Registration {
            ecsql: ecsql.into(),
            bindings: Some(bindings),
            response: Response::Rows(rows),
        });
        self
    }

    #[must_use]
    pub fn with_error(mut self, ecsql: impl Into<String>, error: QueryError) -> Self {
        self.registrations.push(Registration {
            ecsql: ecsql.into(),
            bindings: None,
            response: Response::Error(error),
        });
        self
    }

    /// Number of readers created for the given ECSQL text.
    ///
    /// # Panics
    ///
    /// Panics if the execution log mutex is poisoned.
    #[must_use]
    pub fn execution_count(&self, ecsql: &str) -> usize {
        self.executed
            .lock()
            .expect("execution log mutex poisoned")
            .iter()
            .filter(|(query, _)| query.ecsql == ecsql)
            .count()
    }

    /// # Panics
    ///
    /// Panics if the execution log mutex is poisoned.
    #[must_use]
    pub fn executed_limits(&self) -> Vec<Option<u64>> {
        self.executed
            .lock()
            .expect("execution log mutex poisoned")
            .iter()
            .map(|(_, options)| options.limit)
            .collect()
    }
}

impl QueryExecutor for InMemoryQueryExecutor {
    fn create_query_reader(&self, query: &EcsqlQueryDef, options: QueryReaderOptions) -> RowStream {
        self.executed
            .lock()
            .expect("execution log mutex poisoned")
            .push((query.clone(), options));

        let matching = |registration: &&Registration| registration.ecsql == query.ecsql;
        let registration = self
            .registrations
            .iter()
            .filter(matching)
            .find(|registration| registration.bindings.as_ref() == Some(&query.bindings))
            .or_else(|| {
                self.registrations
                    .iter()
                    .filter(matching)
                    .find(|registration| registration.bindings.is_none())
            });

        match registration.map(|registration| &registration.response) {
            Some(Response::Error(error)) => stream::iter([Err(error.clone())]).boxed(),
            Some(Response::Rows(rows)) => {
                let limit = options
                    .limit
                    .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));
                let rows: Vec<_> = rows.iter().take(limit).cloned().map(Ok).collect();
                stream::iter(rows).boxed()
            }
            None => stream::empty().boxed(),
        }
    }
}
