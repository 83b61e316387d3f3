use std::sync::Arc;

use futures::stream::BoxStream;
use hier_model::HierarchyNode;
use hier_model::InstanceKey;
use hier_query::RowLimit;

use crate::HierarchyError;
use crate::HierarchySearch;
use crate::ValueFormatter;

pub type NodeStream = BoxStream<'static, Result<HierarchyNode, HierarchyError>>;
pub type InstanceKeyStream = BoxStream<'static, Result<InstanceKey, HierarchyError>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetNodesProps {
    /// `None` requests the root level.
    pub parent_node: Option<HierarchyNode>,
    /// Overrides the provider's configured level size limit for this call.
    pub hierarchy_level_size_limit: Option<RowLimit>,
}

impl GetNodesProps {
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn children_of(parent_node: HierarchyNode) -> Self {
        Self {
            parent_node: Some(parent_node),
            hierarchy_level_size_limit: None,
        }
    }

    #[must_use]
    pub fn with_size_limit(mut self, limit: RowLimit) -> Self {
        self.hierarchy_level_size_limit = Some(limit);
        self
    }
}

/// Produces hierarchy levels on demand.
///
/// Streams are lazy and not cached: every call runs the pipeline again, and
/// dropping a stream abandons whatever work it still had pending. Setters
/// only affect streams requested after they're called.
pub trait HierarchyProvider: Send + Sync {
    fn get_nodes(&self, props: GetNodesProps) -> NodeStream;

    /// Keys of the instances in the level, without building nodes. Hidden
    /// nodes contribute the keys of their children instead of their own.
    fn get_node_instance_keys(&self, props: GetNodesProps) -> InstanceKeyStream;

    /// `None` restores the default formatter.
    fn set_formatter(&self, formatter: Option<Arc<dyn ValueFormatter>>);

    fn set_hierarchy_search(&self, search: Option<HierarchySearch>);
}

impl<T: HierarchyProvider + ?Sized> HierarchyProvider for Arc<T> {
    fn get_nodes(&self, props: GetNodesProps) -> NodeStream {
        (**self).get_nodes(props)
    }

    fn get_node_instance_keys(&self, props: GetNodesProps) -> InstanceKeyStream {
        (**self).get_node_instance_keys(props)
    }

    fn set_formatter(&self, formatter: Option<Arc<dyn ValueFormatter>>) {
        (**self).set_formatter(formatter);
    }

    fn set_hierarchy_search(&self, search: Option<HierarchySearch>) {
        (**self).set_hierarchy_search(search);
    }
}
