use hier_model::HierarchyNode;
use hier_model::HierarchyNodeKey;
use hier_model::InstanceKey;
use hier_model::NodeChildren;
use hier_model::NodeLabel;
use serde_json::Map;
use serde_json::Value;

use crate::ProcessingParams;

/// Key of a node coming out of a level definition. Grouping keys are only
/// ever created by the grouping stage.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceNodeKey {
    Instances(Vec<InstanceKey>),
    Generic { id: String, source: Option<String> },
}

impl SourceNodeKey {
    pub fn generic(id: impl Into<String>) -> Self {
        Self::Generic {
            id: id.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn instance_keys(&self) -> &[InstanceKey] {
        match self {
            Self::Instances(keys) => keys,
            Self::Generic { .. } => &[],
        }
    }

    /// Class of the first instance. Merged nodes may carry more classes, the
    /// first one is what grouping looks at.
    #[must_use]
    pub fn primary_class_name(&self) -> Option<&str> {
        self.instance_keys().first().map(|key| key.class_name.as_str())
    }

    #[must_use]
    pub fn to_hierarchy_key(&self) -> HierarchyNodeKey {
        match self {
            Self::Instances(keys) => HierarchyNodeKey::instances(keys.clone()),
            Self::Generic { id, source } => HierarchyNodeKey::Generic {
                id: id.clone(),
                source: source.clone(),
            },
        }
    }
}

/// A parsed, unformatted node.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceNode {
    pub key: SourceNodeKey,
    pub label: NodeLabel,
    /// `None` when unknown and to be determined lazily.
    pub children: Option<bool>,
    pub auto_expand: bool,
    pub supports_filtering: bool,
    pub extended_data: Option<Map<String, Value>>,
    pub params: ProcessingParams,
}

impl SourceNode {
    pub fn new(key: SourceNodeKey, label: impl Into<NodeLabel>) -> Self {
        Self {
            key,
            label: label.into(),
            children: None,
            auto_expand: false,
            supports_filtering: false,
            extended_data: None,
            params: ProcessingParams::default(),
        }
    }

    /// The node as seen by level definitions when its own children are
    /// requested.
    #[must_use]
    pub fn to_parent_node(&self, parent_keys: Vec<HierarchyNodeKey>) -> HierarchyNode {
        HierarchyNode {
            key: self.key.to_hierarchy_key(),
            label: self.label.default_text(),
            parent_keys,
            children: NodeChildren::from(self.children),
            auto_expand: self.auto_expand,
            supports_filtering: self.supports_filtering,
            extended_data: self.extended_data.clone(),
            grouping: None,
            search: None,
        }
    }
}
