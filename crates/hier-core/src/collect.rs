use futures::future::BoxFuture;
use futures::FutureExt;
use futures::TryStreamExt;
use hier_model::HierarchyNode;
use hier_model::NodeChildren;

use crate::GetNodesProps;
use crate::HierarchyError;
use crate::HierarchyProvider;

/// Load `depth` levels below `parent` (the root level for `None`), nesting
/// each node's children into [`NodeChildren::Nodes`].
///
/// Nodes flagged as childless are not expanded. A `depth` of one returns the
/// level itself with its flags untouched.
pub fn collect_hierarchy(
    provider: &dyn HierarchyProvider,
    parent: Option<HierarchyNode>,
    depth: usize,
) -> BoxFuture<'_, Result<Vec<HierarchyNode>, HierarchyError>> {
    async move {
        if depth == 0 {
            return Ok(Vec::new());
        }

        let props = GetNodesProps {
            parent_node: parent,
            hierarchy_level_size_limit: None,
        };
        let mut nodes: Vec<HierarchyNode> = provider.get_nodes(props).try_collect().await?;
        if depth > 1 {
            for node in &mut nodes {
                if node.children.has_children() == Some(false) {
                    continue;
                }
                let children = collect_hierarchy(provider, Some(node.clone()), depth - 1).await?;
                node.children = NodeChildren::Nodes(children);
            }
        }
        Ok(nodes)
    }
    .boxed()
}
