use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::HierarchyNodeIdentifiersPath;
use crate::HierarchyNodeKey;
use crate::InstanceKey;

/// Children state of a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NodeChildren {
    /// Not determined yet, has to be queried.
    #[default]
    Unknown,
    Flag(bool),
    /// Fully loaded children.
    Nodes(Vec<HierarchyNode>),
}

impl NodeChildren {
    #[must_use]
    pub fn has_children(&self) -> Option<bool> {
        match self {
            Self::Unknown => None,
            Self::Flag(flag) => Some(*flag),
            Self::Nodes(nodes) => Some(!nodes.is_empty()),
        }
    }
}

impl From<Option<bool>> for NodeChildren {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Self::Unknown, Self::Flag)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupingNodeInfo {
    /// Instance keys of every instance node under the grouping node, at any depth.
    pub grouped_instance_keys: Vec<InstanceKey>,
    /// The closest ancestor that is not a grouping node, `None` at the root level.
    pub non_grouping_ancestor: Option<Box<HierarchyNode>>,
}

/// Hierarchy search state attached to nodes while a search is active.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSearchInfo {
    /// Remaining identifier paths for this node's children.
    pub child_paths: Vec<HierarchyNodeIdentifiersPath>,
    pub is_search_target: bool,
    pub has_search_target_ancestor: bool,
}

impl NodeSearchInfo {
    #[must_use]
    pub fn has_matching_descendants(&self) -> bool {
        !self.child_paths.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyNode {
    pub key: HierarchyNodeKey,
    pub label: String,
    /// Keys of all ancestors, root first.
    pub parent_keys: Vec<HierarchyNodeKey>,
    pub children: NodeChildren,
    pub auto_expand: bool,
    pub supports_filtering: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_data: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grouping: Option<GroupingNodeInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<NodeSearchInfo>,
}

impl HierarchyNode {
    pub fn new(key: HierarchyNodeKey, label: impl Into<String>) -> Self {
        Self {
            key,
            label: label.into(),
            parent_keys: Vec::new(),
            children: NodeChildren::Unknown,
            auto_expand: false,
            supports_filtering: false,
            extended_data: None,
            grouping: None,
            search: None,
        }
    }

    pub fn generic(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(HierarchyNodeKey::generic(id), label)
    }

    #[must_use]
    pub fn with_children(mut self, children: impl Into<NodeChildren>) -> Self {
        self.children = children.into();
        self
    }

    #[must_use]
    pub fn with_parent_keys(mut self, parent_keys: Vec<HierarchyNodeKey>) -> Self {
        self.parent_keys = parent_keys;
        self
    }

    #[must_use]
    pub fn is_grouping_node(&self) -> bool {
        self.key.is_grouping()
    }

    /// Parent keys for this node's children.
    #[must_use]
    pub fn child_parent_keys(&self) -> Vec<HierarchyNodeKey> {
        let mut keys = self.parent_keys.clone();
        keys.push(self.key.clone());
        keys
    }

    /// Instance keys this node stands for: its own for instance nodes, the
    /// grouped ones for grouping nodes.
    #[must_use]
    pub fn instance_keys(&self) -> &[InstanceKey] {
        match &self.grouping {
            Some(grouping) => &grouping.grouped_instance_keys,
            None => self.key.instance_keys(),
        }
    }
}

impl From<bool> for NodeChildren {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_states() {
        assert_eq!(NodeChildren::Unknown.has_children(), None);
        assert_eq!(NodeChildren::Flag(false).has_children(), Some(false));
        assert_eq!(NodeChildren::Nodes(Vec::new()).has_children(), Some(false));
        assert_eq!(
            NodeChildren::Nodes(vec![HierarchyNode::generic("a", "A")]).has_children(),
            Some(true)
        );
        assert_eq!(NodeChildren::from(Some(true)), NodeChildren::Flag(true));
    }

    #[test]
    fn test_child_parent_keys() {
        let node = HierarchyNode::generic("b", "B")
            .with_parent_keys(vec![HierarchyNodeKey::generic("a")])
            .with_children(true);
        assert_eq!(
            node.child_parent_keys(),
            vec![HierarchyNodeKey::generic("a"), HierarchyNodeKey::generic("b")]
        );
        assert!(!node.is_grouping_node());
        assert!(node.instance_keys().is_empty());
    }
}
