use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use hier_model::normalize_full_class_name;
use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;
use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Invalid full class name \"{0}\", expected `Schema.Class` or `Schema:Class`")]
    InvalidClassName(String),

    #[error("Schema \"{0}\" not found")]
    UnknownSchema(String),

    #[error("Class \"{class}\" not found in schema \"{schema}\"")]
    UnknownClass { schema: String, class: String },

    #[error("Metadata lookup failed: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ClassKind {
    Entity,
    Relationship,
    Mixin,
    Struct,
    CustomAttribute,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EcClass {
    pub schema_name: String,
    pub name: String,
    pub label: Option<String>,
    pub kind: ClassKind,
    /// Full names of direct base classes and applied mixins.
    pub base_classes: Vec<String>,
}

impl EcClass {
    pub fn new(name: impl Into<String>, kind: ClassKind) -> Self {
        Self {
            schema_name: String::new(),
            name: name.into(),
            label: None,
            kind,
            base_classes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_base_class(mut self, full_class_name: impl Into<String>) -> Self {
        self.base_classes.push(full_class_name.into());
        self
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.name)
    }

    /// The class label, falling back to its name.
    #[must_use]
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EcSchema {
    pub name: String,
    classes: FxHashMap<String, Arc<EcClass>>,
}

impl EcSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classes: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn with_class(mut self, mut class: EcClass) -> Self {
        class.schema_name.clone_from(&self.name);
        self.classes
            .insert(class.name.to_ascii_lowercase(), Arc::new(class));
        self
    }

    /// Case-insensitive class lookup.
    #[must_use]
    pub fn get_class(&self, class_name: &str) -> Option<Arc<EcClass>> {
        self.classes.get(&class_name.to_ascii_lowercase()).cloned()
    }

    pub fn classes(&self) -> impl Iterator<Item = &Arc<EcClass>> {
        self.classes.values()
    }
}

/// Split `Schema.Class` or `Schema:Class` into its schema and class names.
pub fn parse_full_class_name(full_class_name: &str) -> Result<(&str, &str), MetadataError> {
    full_class_name
        .split_once(['.', ':'])
        .filter(|(schema, class)| {
            !schema.is_empty() && !class.is_empty() && !class.contains(['.', ':'])
        })
        .ok_or_else(|| MetadataError::InvalidClassName(full_class_name.to_string()))
}

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Look up a schema by name, case-insensitively.
    async fn get_schema(&self, schema_name: &str) -> Result<Option<Arc<EcSchema>>, MetadataError>;
}

/// Answers "is class A a subclass of class B" questions.
#[async_trait]
pub trait ClassHierarchyInspector: Send + Sync {
    /// Reflexive: a class derives from itself.
    async fn class_derives_from(
        &self,
        derived_full_class_name: &str,
        base_full_class_name: &str,
    ) -> Result<bool, MetadataError>;
}

pub async fn get_class(
    metadata: &dyn MetadataProvider,
    full_class_name: &str,
) -> Result<Arc<EcClass>, MetadataError> {
    let (schema_name, class_name) = parse_full_class_name(full_class_name)?;
    let schema = metadata
        .get_schema(schema_name)
        .await?
        .ok_or_else(|| MetadataError::UnknownSchema(schema_name.to_string()))?;
    schema
        .get_class(class_name)
        .ok_or_else(|| MetadataError::UnknownClass {
            schema: schema_name.to_string(),
            class: class_name.to_string(),
        })
}

/// Walk base classes breadth-first looking for `base_full_class_name`.
pub async fn class_derives_from(
    metadata: &dyn MetadataProvider,
    derived_full_class_name: &str,
    base_full_class_name: &str,
) -> Result<bool, MetadataError> {
    let target = normalize_full_class_name(base_full_class_name);
    let start = normalize_full_class_name(derived_full_class_name);
    if start == target {
        return Ok(true);
    }

    let mut visited = FxHashSet::default();
    let mut queue = VecDeque::from([derived_full_class_name.to_string()]);
    visited.insert(start);

    while let Some(current) = queue.pop_front() {
        let class = get_class(metadata, &current).await?;
        for base in &class.base_classes {
            let normalized = normalize_full_class_name(base);
            if normalized == target {
                return Ok(true);
            }
            if visited.insert(normalized) {
                queue.push_back(base.clone());
            }
        }
    }
    Ok(false)
}

/// Metadata held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadataProvider {
    schemas: FxHashMap<String, Arc<EcSchema>>,
}

impl InMemoryMetadataProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_schema(mut self, schema: EcSchema) -> Self {
        self.schemas
            .insert(schema.name.to_ascii_lowercase(), Arc::new(schema));
        self
    }
}

#[async_trait]
impl MetadataProvider for InMemoryMetadataProvider {
    async fn get_schema(&self, schema_name: &str) -> Result<Option<Arc<EcSchema>>, MetadataError> {
        Ok(self.schemas.get(&schema_name.to_ascii_lowercase()).cloned())
    }
}

#[async_trait]
impl ClassHierarchyInspector for InMemoryMetadataProvider {
    async fn class_derives_from(
        &self,
        derived_full_class_name: &str,
        base_full_class_name: &str,
    ) -> Result<bool, MetadataError> {
        class_derives_from(self, derived_full_class_name, base_full_class_name).await
    }
}
