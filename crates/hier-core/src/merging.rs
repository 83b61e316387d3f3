//! Presenting several providers as one.

use std::sync::Arc;

use futures::future;
use futures::stream;
use futures::StreamExt;
use futures::TryStreamExt;
use hier_model::HierarchyNode;
use hier_model::NodeChildren;
use hier_query::RowLimit;
use itertools::Itertools;
use tracing::Instrument;

use crate::compare_labels;
use crate::GetNodesProps;
use crate::HierarchyError;
use crate::HierarchyProvider;
use crate::HierarchySearch;
use crate::InstanceKeyStream;
use crate::NodeStream;
use crate::ValueFormatter;

/// Combines the levels of its providers into one, sorted by label.
///
/// A level fails if any provider fails for it. Nodes that one provider
/// reports as childless get their children from the others, so their flag is
/// re-checked against every provider.
#[derive(Clone)]
pub struct MergedHierarchyProvider {
    providers: Vec<Arc<dyn HierarchyProvider>>,
}

#[must_use]
pub fn merge_providers(providers: Vec<Arc<dyn HierarchyProvider>>) -> MergedHierarchyProvider {
    MergedHierarchyProvider { providers }
}

impl MergedHierarchyProvider {
    #[must_use]
    pub fn providers(&self) -> &[Arc<dyn HierarchyProvider>] {
        &self.providers
    }
}

async fn resolve_children(
    providers: &[Arc<dyn HierarchyProvider>],
    mut node: HierarchyNode,
    limit: Option<RowLimit>,
) -> HierarchyNode {
    if node.children.has_children() != Some(false) {
        return node;
    }

    // checked against every provider at once; the first one with children settles it
    let parent = node.clone();
    let checks: Vec<_> = providers
        .iter()
        .map(|provider| {
            let props = GetNodesProps {
                parent_node: Some(parent.clone()),
                hierarchy_level_size_limit: limit,
            };
            let label = parent.label.clone();
            async move {
                match provider.get_nodes(props).try_next().await {
                    Ok(child) => child.is_some(),
                    Err(err) if err.is_rows_limit_exceeded() => true,
                    Err(err) => {
                        tracing::warn!(node = %label, error = %err, "Failed to determine node children");
                        true
                    }
                }
            }
        })
        .collect();
    let mut checks = stream::iter(checks).buffer_unordered(providers.len().max(1));

    while let Some(has_children) = checks.next().await {
        if has_children {
            node.children = NodeChildren::Flag(true);
            break;
        }
    }
    node
}

impl HierarchyProvider for MergedHierarchyProvider {
    fn get_nodes(&self, props: GetNodesProps) -> NodeStream {
        let providers = self.providers.clone();
        let span = tracing::debug_span!("merged_get_nodes", providers = providers.len());

        let load = async move {
            let levels = future::try_join_all(
                providers
                    .iter()
                    .map(|provider| provider.get_nodes(props.clone()).try_collect::<Vec<_>>()),
            )
            .await?;

            let limit = props.hierarchy_level_size_limit;
            let nodes: Vec<HierarchyNode> = stream::iter(levels.into_iter().flatten())
                .map(|node| resolve_children(&providers, node, limit))
                .buffered(providers.len().max(1))
                .collect()
                .await;
            tracing::debug!(nodes = nodes.len(), "Merged hierarchy level");

            let nodes = nodes
                .into_iter()
                .sorted_by(|lhs, rhs| compare_labels(&lhs.label, &rhs.label))
                .map(Ok::<_, HierarchyError>);
            Ok::<_, HierarchyError>(stream::iter(nodes))
        }
        .instrument(span);

        stream::once(load).try_flatten().boxed()
    }

    fn get_node_instance_keys(&self, props: GetNodesProps) -> InstanceKeyStream {
        stream::iter(self.providers.clone())
            .flat_map(move |provider| provider.get_node_instance_keys(props.clone()))
            .boxed()
    }

    fn set_formatter(&self, formatter: Option<Arc<dyn ValueFormatter>>) {
        for provider in &self.providers {
            provider.set_formatter(formatter.clone());
        }
    }

    fn set_hierarchy_search(&self, search: Option<HierarchySearch>) {
        for provider in &self.providers {
            provider.set_hierarchy_search(search.clone());
        }
    }
}
