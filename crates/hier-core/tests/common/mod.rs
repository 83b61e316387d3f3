#![allow(dead_code)]

use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use hier_core::collect_hierarchy;
use hier_core::HierarchyDefinition;
use hier_core::HierarchyError;
use hier_core::HierarchyLevelDefinition;
use hier_core::HierarchyProvider;
use hier_core::NodeColumn;
use hier_core::ProviderSettings;
use hier_core::QueryHierarchyProvider;
use hier_model::HierarchyNode;
use hier_model::HierarchyNodeKey;
use hier_model::NodeChildren;
use hier_query::testing::InMemoryQueryExecutor;
use hier_query::ClassKind;
use hier_query::EcClass;
use hier_query::EcSchema;
use hier_query::EcsqlQueryDef;
use hier_query::InMemoryMetadataProvider;
use hier_query::LimitingExecutor;
use hier_query::Row;
use hier_query::RowLimit;
use serde_json::json;
use serde_json::Value;

/// Definitions keyed by the parent's id: the generic id, or the id of the
/// first instance for instance nodes.
#[derive(Default)]
pub struct LevelsDefinition {
    levels: Vec<(Option<String>, Vec<HierarchyLevelDefinition>)>,
}

impl LevelsDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(mut self, definitions: Vec<HierarchyLevelDefinition>) -> Self {
        self.levels.push((None, definitions));
        self
    }

    pub fn children(mut self, parent_id: &str, definitions: Vec<HierarchyLevelDefinition>) -> Self {
        self.levels.push((Some(parent_id.to_string()), definitions));
        self
    }
}

fn node_id(node: &HierarchyNode) -> Option<String> {
    match &node.key {
        HierarchyNodeKey::Generic { id, .. } => Some(id.clone()),
        HierarchyNodeKey::Instances { instance_keys } => {
            instance_keys.first().map(|key| key.id.clone())
        }
        _ => None,
    }
}

#[async_trait]
impl HierarchyDefinition for LevelsDefinition {
    async fn define_hierarchy_level(
        &self,
        parent_node: Option<&HierarchyNode>,
    ) -> Result<Vec<HierarchyLevelDefinition>, HierarchyError> {
        let parent_id = parent_node.and_then(node_id);
        Ok(self
            .levels
            .iter()
            .filter(|(id, _)| *id == parent_id)
            .flat_map(|(_, definitions)| definitions.iter().cloned())
            .collect())
    }
}

pub fn metadata() -> InMemoryMetadataProvider {
    InMemoryMetadataProvider::new().with_schema(
        EcSchema::new("BisCore")
            .with_class(EcClass::new("Element", ClassKind::Entity))
            .with_class(EcClass::new("Subject", ClassKind::Entity).with_base_class("BisCore.Element"))
            .with_class(EcClass::new("Model", ClassKind::Entity))
            .with_class(
                EcClass::new("PhysicalElement", ClassKind::Entity)
                    .with_label("Physical Element")
                    .with_base_class("BisCore.Element"),
            ),
    )
}

pub fn row(class_name: &str, id: &str, label: &str) -> Row {
    json!({
        "FullClassName": class_name,
        "ECInstanceId": id,
        "DisplayLabel": label,
    })
    .as_object()
    .cloned()
    .unwrap()
}

pub fn with_column(mut row: Row, column: NodeColumn, value: Value) -> Row {
    row.insert(column.as_str().to_string(), value);
    row
}

/// A row that is known to have no children.
pub fn leaf(class_name: &str, id: &str, label: &str) -> Row {
    with_column(row(class_name, id, label), NodeColumn::HasChildren, json!(false))
}

pub fn query(ecsql: &str) -> HierarchyLevelDefinition {
    HierarchyLevelDefinition::instance_nodes_query("BisCore.Element", EcsqlQueryDef::new(ecsql))
}

pub fn provider_with(
    definition: impl HierarchyDefinition + 'static,
    executor: Arc<InMemoryQueryExecutor>,
    settings: ProviderSettings,
) -> QueryHierarchyProvider {
    QueryHierarchyProvider::new(
        Arc::new(definition),
        Arc::new(metadata()),
        Arc::new(LimitingExecutor::new(executor, RowLimit::Unbounded)),
        settings,
    )
}

pub fn provider(
    definition: impl HierarchyDefinition + 'static,
    executor: InMemoryQueryExecutor,
) -> QueryHierarchyProvider {
    provider_with(definition, Arc::new(executor), ProviderSettings::default())
}

fn render(nodes: &[HierarchyNode], depth: usize, out: &mut String) {
    for node in nodes {
        let _ = writeln!(
            out,
            "{}{} [{}]",
            "  ".repeat(depth),
            node.label,
            node.key.type_name()
        );
        if let NodeChildren::Nodes(children) = &node.children {
            render(children, depth + 1, out);
        }
    }
}

/// Indented labels of the first `depth` levels.
pub async fn render_tree(provider: &dyn HierarchyProvider, depth: usize) -> String {
    let nodes = collect_hierarchy(provider, None, depth).await.unwrap();
    let mut out = String::new();
    render(&nodes, 0, &mut out);
    out.trim_end().to_string()
}
