use async_trait::async_trait;
use hier_model::HierarchyNode;
use hier_model::NodeLabel;
use hier_query::EcsqlQueryDef;
use serde_json::Map;
use serde_json::Value;

use crate::GroupingParams;
use crate::HierarchyError;
use crate::ProcessingParams;
use crate::SourceNode;
use crate::SourceNodeKey;

/// A literal node that doesn't come from a query.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericNodeDefinition {
    pub node: SourceNode,
}

impl GenericNodeDefinition {
    pub fn new(id: impl Into<String>, label: impl Into<NodeLabel>) -> Self {
        Self {
            node: SourceNode::new(SourceNodeKey::generic(id), label),
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        if let SourceNodeKey::Generic { source: slot, .. } = &mut self.node.key {
            *slot = Some(source.into());
        }
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: bool) -> Self {
        self.node.children = Some(children);
        self
    }

    #[must_use]
    pub fn with_auto_expand(mut self, auto_expand: bool) -> Self {
        self.node.auto_expand = auto_expand;
        self
    }

    #[must_use]
    pub fn with_extended_data(mut self, extended_data: Map<String, Value>) -> Self {
        self.node.extended_data = Some(extended_data);
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: ProcessingParams) -> Self {
        self.node.params = params;
        self
    }

    #[must_use]
    pub fn hide_in_hierarchy(mut self) -> Self {
        self.node.params.hide_in_hierarchy = true;
        self
    }

    #[must_use]
    pub fn hide_if_no_children(mut self) -> Self {
        self.node.params.hide_if_no_children = true;
        self
    }

    #[must_use]
    pub fn with_grouping(mut self, grouping: GroupingParams) -> Self {
        self.node.params.grouping = Some(grouping);
        self
    }
}

/// A query producing instance nodes of `full_class_name` (or its subclasses).
/// The query has to project the columns [`NodeColumn`](crate::NodeColumn)
/// names.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceNodesQueryDefinition {
    pub full_class_name: String,
    pub query: EcsqlQueryDef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HierarchyLevelDefinition {
    GenericNode(GenericNodeDefinition),
    InstanceNodesQuery(InstanceNodesQueryDefinition),
}

impl HierarchyLevelDefinition {
    pub fn instance_nodes_query(full_class_name: impl Into<String>, query: EcsqlQueryDef) -> Self {
        Self::InstanceNodesQuery(InstanceNodesQueryDefinition {
            full_class_name: full_class_name.into(),
            query,
        })
    }
}

impl From<GenericNodeDefinition> for HierarchyLevelDefinition {
    fn from(definition: GenericNodeDefinition) -> Self {
        Self::GenericNode(definition)
    }
}

impl From<InstanceNodesQueryDefinition> for HierarchyLevelDefinition {
    fn from(definition: InstanceNodesQueryDefinition) -> Self {
        Self::InstanceNodesQuery(definition)
    }
}

/// Describes what a hierarchy looks like, one level at a time.
#[async_trait]
pub trait HierarchyDefinition: Send + Sync {
    /// Definitions of the children of `parent_node`, or of the root level
    /// when `None`. The parent is never a grouping node.
    async fn define_hierarchy_level(
        &self,
        parent_node: Option<&HierarchyNode>,
    ) -> Result<Vec<HierarchyLevelDefinition>, HierarchyError>;

    /// Called for every parsed node before hiding and merging. Returning
    /// `None` drops the node.
    fn pre_process_node(&self, node: SourceNode) -> Option<SourceNode> {
        Some(node)
    }

    /// Called for every finished node right before it's handed out.
    fn post_process_node(&self, node: HierarchyNode) -> Option<HierarchyNode> {
        Some(node)
    }
}
