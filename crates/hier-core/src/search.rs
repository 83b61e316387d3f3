use hier_model::HierarchyNode;
use hier_model::HierarchyNodeIdentifiersPath;
use hier_model::NodeSearchInfo;

use crate::level::LevelNode;

/// Root-to-target identifier paths that must stay visible. Everything not on
/// one of the paths is pruned, targets keep their whole subtree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HierarchySearch {
    pub paths: Vec<HierarchyNodeIdentifiersPath>,
}

impl HierarchySearch {
    #[must_use]
    pub fn new(paths: Vec<HierarchyNodeIdentifiersPath>) -> Self {
        Self { paths }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SearchScope {
    Inactive,
    /// The parent is a search target or below one.
    TargetDescendants,
    Paths(Vec<HierarchyNodeIdentifiersPath>),
}

impl SearchScope {
    /// Scope of the children of `parent`. Parents handed out before the search
    /// was set carry no search info and their children aren't filtered.
    pub fn for_parent(search: Option<&HierarchySearch>, parent: Option<&HierarchyNode>) -> Self {
        let Some(search) = search else {
            return Self::Inactive;
        };
        let Some(parent) = parent else {
            return Self::Paths(search.paths.clone());
        };
        match &parent.search {
            None => Self::Inactive,
            Some(info) if info.is_search_target || info.has_search_target_ancestor => {
                Self::TargetDescendants
            }
            Some(info) => Self::Paths(info.child_paths.clone()),
        }
    }

    pub fn apply(&self, nodes: Vec<LevelNode>) -> Vec<LevelNode> {
        match self {
            Self::Inactive => nodes,
            Self::TargetDescendants => mark_target_descendants(nodes),
            Self::Paths(paths) => filter_by_paths(paths, nodes),
        }
    }
}

fn mark_target_descendants(nodes: Vec<LevelNode>) -> Vec<LevelNode> {
    nodes
        .into_iter()
        .map(|node| match node {
            LevelNode::Source(mut source) => {
                source.search = Some(NodeSearchInfo {
                    has_search_target_ancestor: true,
                    ..NodeSearchInfo::default()
                });
                LevelNode::Source(source)
            }
            LevelNode::Grouping(mut group) => {
                group.children = mark_target_descendants(std::mem::take(&mut group.children));
                LevelNode::Grouping(group)
            }
        })
        .collect()
}

fn filter_by_paths(paths: &[HierarchyNodeIdentifiersPath], nodes: Vec<LevelNode>) -> Vec<LevelNode> {
    nodes
        .into_iter()
        .filter_map(|node| match node {
            LevelNode::Source(mut source) => {
                let key = source.node.key.to_hierarchy_key();
                let matching: Vec<&HierarchyNodeIdentifiersPath> = paths
                    .iter()
                    .filter(|path| path.first().is_some_and(|id| id.matches_key(&key)))
                    .collect();
                if matching.is_empty() {
                    return None;
                }

                let is_search_target = matching.iter().any(|path| path.len() == 1);
                let child_paths: Vec<HierarchyNodeIdentifiersPath> = matching
                    .iter()
                    .filter(|path| path.len() > 1)
                    .map(|path| path[1..].to_vec())
                    .collect();
                if !child_paths.is_empty() {
                    source.node.auto_expand = true;
                }
                source.search = Some(NodeSearchInfo {
                    child_paths,
                    is_search_target,
                    has_search_target_ancestor: false,
                });
                Some(LevelNode::Source(source))
            }
            LevelNode::Grouping(mut group) => {
                group.children = filter_by_paths(paths, std::mem::take(&mut group.children));
                if group.children.is_empty() {
                    return None;
                }
                group.auto_expand = true;
                Some(LevelNode::Grouping(group))
            }
        })
        .collect()
}
