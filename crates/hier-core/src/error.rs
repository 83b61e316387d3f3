use hier_model::HierarchyNodeKey;
use hier_query::MetadataError;
use hier_query::QueryError;
use thiserror::Error;

/// A query row that can't be turned into a node.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NodeParseError {
    #[error("Missing required column `{0}`")]
    MissingColumn(&'static str),

    #[error("Invalid value in column `{column}`: {reason}")]
    InvalidColumn {
        column: &'static str,
        reason: String,
    },

    #[error("Invalid grouping parameters: {0}")]
    InvalidGrouping(String),

    #[error("Invalid extended data: {0}")]
    InvalidExtendedData(String),
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum HierarchyError {
    /// The hierarchy level under `parent` has more nodes than allowed. `None`
    /// parent means the root level.
    #[error("Hierarchy level size limit ({limit}) exceeded")]
    RowsLimitExceeded {
        limit: u64,
        parent: Option<Box<HierarchyNodeKey>>,
    },

    #[error(transparent)]
    Query(QueryError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    NodeParse(#[from] NodeParseError),

    #[error("Hierarchy definition failed: {0}")]
    Definition(String),
}

impl HierarchyError {
    #[must_use]
    pub fn is_rows_limit_exceeded(&self) -> bool {
        matches!(self, Self::RowsLimitExceeded { .. })
    }

    /// Attribute a query failure to the level being read under `parent`.
    pub(crate) fn from_query(error: QueryError, parent: Option<&HierarchyNodeKey>) -> Self {
        match error {
            QueryError::RowsLimitExceeded { limit } => Self::RowsLimitExceeded {
                limit,
                parent: parent.cloned().map(Box::new),
            },
            other @ QueryError::Execution(_) => Self::Query(other),
        }
    }
}
