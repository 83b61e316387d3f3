//! In-memory representation of one hierarchy level while it moves through
//! the grouping, formatting and search stages.

use hier_model::HierarchyNodeKey;
use hier_model::InstanceKey;
use hier_model::NodeSearchInfo;

use crate::sort::sort_by_label;
use crate::GroupHandling;
use crate::SourceNode;

/// Which grouping pass produced a grouping node. Children of a grouping node
/// are only regrouped by later passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum GroupingStage {
    BaseClass,
    Class,
    Label,
    /// Index into `propertyGroups`.
    Property(usize),
}

#[derive(Debug, Clone)]
pub(crate) struct SourceLevelNode {
    pub node: SourceNode,
    /// Default rendering until the formatting stage replaces it.
    pub label: String,
    pub search: Option<NodeSearchInfo>,
}

impl SourceLevelNode {
    pub fn new(node: SourceNode) -> Self {
        let label = node.label.default_text();
        Self {
            node,
            label,
            search: None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GroupingLevelNode {
    pub key: HierarchyNodeKey,
    pub label: String,
    pub children: Vec<LevelNode>,
    pub stage: GroupingStage,
    pub handling: GroupHandling,
    pub auto_expand: bool,
    pub search: Option<NodeSearchInfo>,
}

impl GroupingLevelNode {
    pub fn new(
        key: HierarchyNodeKey,
        label: impl Into<String>,
        stage: GroupingStage,
        handling: GroupHandling,
    ) -> Self {
        Self {
            key,
            label: label.into(),
            children: Vec::new(),
            stage,
            handling,
            auto_expand: false,
            search: None,
        }
    }

    /// Flattened keys of every instance node under this group.
    pub fn grouped_instance_keys(&self) -> Vec<InstanceKey> {
        let mut keys = Vec::new();
        for child in &self.children {
            child.collect_instance_keys(&mut keys);
        }
        keys
    }
}

#[derive(Debug, Clone)]
pub(crate) enum LevelNode {
    Source(SourceLevelNode),
    Grouping(GroupingLevelNode),
}

impl LevelNode {
    pub fn label(&self) -> &str {
        match self {
            Self::Source(node) => &node.label,
            Self::Grouping(node) => &node.label,
        }
    }

    pub fn as_source(&self) -> Option<&SourceLevelNode> {
        match self {
            Self::Source(node) => Some(node),
            Self::Grouping(_) => None,
        }
    }

    pub fn collect_instance_keys(&self, keys: &mut Vec<InstanceKey>) {
        match self {
            Self::Source(node) => keys.extend(node.node.key.instance_keys().iter().cloned()),
            Self::Grouping(group) => {
                for child in &group.children {
                    child.collect_instance_keys(keys);
                }
            }
        }
    }
}

/// Stable label sort of a level and every nested grouping level.
pub(crate) fn sort_level(nodes: &mut [LevelNode]) {
    for node in nodes.iter_mut() {
        if let LevelNode::Grouping(group) = node {
            sort_level(&mut group.children);
        }
    }
    sort_by_label(nodes, LevelNode::label);
}
