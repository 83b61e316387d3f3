use hier_model::Point2d;
use hier_model::Point3d;
use serde::Serialize;

/// A value bound to a `?` placeholder of an ECSQL query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum EcsqlBinding {
    Boolean(bool),
    Double(f64),
    Id(String),
    IdSet(Vec<String>),
    Int(i32),
    Long(i64),
    Point2d(Point2d),
    Point3d(Point3d),
    String(String),
    Null,
}

/// An ECSQL query with its common table expressions and bindings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EcsqlQueryDef {
    pub ctes: Vec<String>,
    pub ecsql: String,
    pub bindings: Vec<EcsqlBinding>,
}

impl EcsqlQueryDef {
    pub fn new(ecsql: impl Into<String>) -> Self {
        Self {
            ctes: Vec::new(),
            ecsql: ecsql.into(),
            bindings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_ctes(mut self, ctes: Vec<String>) -> Self {
        self.ctes = ctes;
        self
    }

    #[must_use]
    pub fn with_bindings(mut self, bindings: Vec<EcsqlBinding>) -> Self {
        self.bindings = bindings;
        self
    }

    /// Full query text, with CTEs prepended as a `WITH RECURSIVE` clause.
    #[must_use]
    pub fn to_ecsql(&self) -> String {
        if self.ctes.is_empty() {
            return self.ecsql.clone();
        }
        format!("WITH RECURSIVE {} {}", self.ctes.join(", "), self.ecsql)
    }
}

/// Maximum number of rows a query may return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum RowLimit {
    #[default]
    Unbounded,
    Rows(u64),
}
