//! The query-backed [`HierarchyProvider`].
//!
//! Per requested level: definitions, row reading (with the level size
//! limit), hide-in-hierarchy, merge-by-label, grouping, formatting, search.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use futures::future;
use futures::future::BoxFuture;
use futures::stream;
use futures::stream::BoxStream;
use futures::FutureExt;
use futures::StreamExt;
use futures::TryStreamExt;
use hier_conf::GroupingLabels;
use hier_conf::Settings;
use hier_conf::SizeLimit;
use hier_model::GroupingNodeInfo;
use hier_model::HierarchyNode;
use hier_model::HierarchyNodeKey;
use hier_model::NodeChildren;
use hier_model::NodeLabel;
use hier_model::NodeSearchInfo;
use hier_query::CachedMetadataProvider;
use hier_query::LimitingQueryExecutor;
use hier_query::MetadataProvider;
use hier_query::RowLimit;
use tracing::Instrument;

use crate::cache::InFlight;
use crate::cache::SharedFuture;
use crate::format_label;
use crate::grouping::assign_auto_expand;
use crate::grouping::group_level;
use crate::grouping::GroupingContext;
use crate::hide::replace_hidden_nodes;
use crate::level::sort_level;
use crate::level::LevelNode;
use crate::level::SourceLevelNode;
use crate::merge::merge_by_label;
use crate::parse_node_row;
use crate::search::SearchScope;
use crate::sort::sort_by_label;
use crate::DefaultValueFormatter;
use crate::GetNodesProps;
use crate::HierarchyDefinition;
use crate::HierarchyError;
use crate::HierarchyLevelDefinition;
use crate::HierarchyProvider;
use crate::HierarchySearch;
use crate::InstanceKeyStream;
use crate::NodeStream;
use crate::SourceNode;
use crate::ValueFormatter;

type SourceNodeStream = BoxStream<'static, Result<SourceNode, HierarchyError>>;
type SourceLevel = Result<Arc<Vec<SourceNode>>, HierarchyError>;

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub hierarchy_level_size_limit: RowLimit,
    /// Children checks overlapped while a level is streamed.
    pub query_concurrency: usize,
    pub yield_every: usize,
    pub labels: GroupingLabels,
}

impl From<&Settings> for ProviderSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            hierarchy_level_size_limit: match settings.hierarchy_level_size_limit {
                SizeLimit::Unbounded => RowLimit::Unbounded,
                SizeLimit::Rows(rows) => RowLimit::Rows(rows),
            },
            query_concurrency: settings.query_concurrency.max(1),
            yield_every: settings.yield_every.max(1),
            labels: settings.labels.clone(),
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

struct ProviderState {
    formatter: Arc<dyn ValueFormatter>,
    search: Option<Arc<HierarchySearch>>,
}

/// Provider state captured when a level is requested, so setter calls don't
/// affect streams already handed out.
struct LevelRequest {
    formatter: Arc<dyn ValueFormatter>,
    search: Option<Arc<HierarchySearch>>,
    limit: RowLimit,
}

/// Where the nodes of a level end up in the hierarchy.
struct Placement {
    parent_keys: Vec<HierarchyNodeKey>,
    non_grouping_ancestor: Option<HierarchyNode>,
}

struct ProviderInner {
    definition: Arc<dyn HierarchyDefinition>,
    metadata: CachedMetadataProvider,
    executor: Arc<dyn LimitingQueryExecutor>,
    settings: ProviderSettings,
    state: RwLock<ProviderState>,
    source_levels: InFlight<String, SourceLevel>,
}

#[derive(Clone)]
pub struct QueryHierarchyProvider {
    inner: Arc<ProviderInner>,
}

impl QueryHierarchyProvider {
    pub fn new(
        definition: Arc<dyn HierarchyDefinition>,
        metadata: Arc<dyn MetadataProvider>,
        executor: Arc<dyn LimitingQueryExecutor>,
        settings: ProviderSettings,
    ) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                definition,
                metadata: CachedMetadataProvider::new(metadata),
                executor,
                settings,
                state: RwLock::new(ProviderState {
                    formatter: Arc::new(DefaultValueFormatter),
                    search: None,
                }),
                source_levels: InFlight::new(),
            }),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ProviderSettings {
        &self.inner.settings
    }
}

impl ProviderInner {
    fn request(&self, limit: Option<RowLimit>) -> LevelRequest {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        LevelRequest {
            formatter: state.formatter.clone(),
            search: state.search.clone(),
            limit: limit.unwrap_or(self.settings.hierarchy_level_size_limit),
        }
    }

    /// Parsed nodes of every definition of the level, in definition order.
    fn read_level(self: &Arc<Self>, parent: Option<&HierarchyNode>, limit: RowLimit) -> SourceNodeStream {
        let this = self.clone();
        let parent = parent.cloned();
        stream::once(async move {
            let definitions = this
                .definition
                .define_hierarchy_level(parent.as_ref())
                .await?;
            tracing::trace!(definitions = definitions.len(), "Resolved level definitions");
            Ok::<_, HierarchyError>(this.read_definitions(
                parent.as_ref().map(|parent| &parent.key),
                definitions,
                limit,
            ))
        })
        .try_flatten()
        .boxed()
    }

    fn read_definitions(
        &self,
        parent_key: Option<&HierarchyNodeKey>,
        definitions: Vec<HierarchyLevelDefinition>,
        limit: RowLimit,
    ) -> SourceNodeStream {
        // the limit applies to the level as a whole, not to each query
        let rows_read = Arc::new(AtomicU64::new(0));
        let streams: Vec<SourceNodeStream> = definitions
            .into_iter()
            .map(|definition| match definition {
                HierarchyLevelDefinition::GenericNode(generic) => {
                    stream::iter([Ok(generic.node)]).boxed()
                }
                HierarchyLevelDefinition::InstanceNodesQuery(definition) => {
                    let parent_key = parent_key.cloned();
                    let rows_read = rows_read.clone();
                    self.executor
                        .create_query_reader(&definition.query, Some(limit))
                        .map(move |row| {
                            let row = row.map_err(|err| {
                                HierarchyError::from_query(err, parent_key.as_ref())
                            })?;
                            let total = rows_read.fetch_add(1, Ordering::Relaxed) + 1;
                            if let RowLimit::Rows(limit) = limit {
                                if total > limit {
                                    return Err(HierarchyError::RowsLimitExceeded {
                                        limit,
                                        parent: parent_key.clone().map(Box::new),
                                    });
                                }
                            }
                            Ok(parse_node_row(&row)?)
                        })
                        .boxed()
                }
            })
            .collect();

        let definition = self.definition.clone();
        stream::iter(streams)
            .flatten()
            .try_filter_map(move |node| future::ready(Ok(definition.pre_process_node(node))))
            .boxed()
    }

    /// The level after hiding, coalesced with concurrent requests for the
    /// same parent.
    fn source_level(
        self: &Arc<Self>,
        parent: Option<HierarchyNode>,
        limit: RowLimit,
    ) -> SharedFuture<SourceLevel> {
        let key = format!(
            "{:?}",
            (
                parent.as_ref().map(|parent| (&parent.key, &parent.parent_keys)),
                limit
            )
        );
        let this = self.clone();
        self.source_levels.get_or_start(key, move || {
            async move { this.load_source_level(parent, limit).await }.boxed()
        })
    }

    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(parent = ?parent.as_ref().map(|parent| &parent.key))
    )]
    async fn load_source_level(
        self: Arc<Self>,
        parent: Option<HierarchyNode>,
        limit: RowLimit,
    ) -> SourceLevel {
        let nodes: Vec<SourceNode> = self.read_level(parent.as_ref(), limit).try_collect().await?;
        let parent_keys = parent
            .as_ref()
            .map(HierarchyNode::child_parent_keys)
            .unwrap_or_default();

        let nodes = replace_hidden_nodes(nodes, &parent_keys, |hidden| {
            self.source_level(Some(hidden), limit).boxed()
        })
        .await?;
        let nodes = self.drop_childless(nodes, &parent_keys, limit).await;

        tracing::debug!(nodes = nodes.len(), "Read hierarchy level");
        Ok(Arc::new(nodes))
    }

    /// Resolve `hide_if_no_children` nodes, dropping the ones without children.
    async fn drop_childless(
        self: &Arc<Self>,
        nodes: Vec<SourceNode>,
        parent_keys: &[HierarchyNodeKey],
        limit: RowLimit,
    ) -> Vec<SourceNode> {
        stream::iter(nodes)
            .map(|mut node| {
                let this = self.clone();
                let parent_keys = parent_keys.to_vec();
                async move {
                    if node.params.hide_if_no_children && node.children.is_none() {
                        let has_children = this
                            .determine_children(node.to_parent_node(parent_keys), limit)
                            .await;
                        node.children = Some(has_children);
                    }
                    let childless = node.params.hide_if_no_children && node.children == Some(false);
                    (!childless).then_some(node)
                }
            })
            .buffered(self.settings.query_concurrency)
            .filter_map(future::ready)
            .collect()
            .await
    }

    /// Stop-on-first-child check: reads only as far as the first node that
    /// would be visible under `parent`.
    fn has_children(
        self: &Arc<Self>,
        parent: HierarchyNode,
        limit: RowLimit,
    ) -> BoxFuture<'static, Result<bool, HierarchyError>> {
        let this = self.clone();
        async move {
            let parent_keys = parent.child_parent_keys();
            let mut nodes = this.read_level(Some(&parent), limit);
            while let Some(node) = nodes.try_next().await? {
                let params = &node.params;
                // hidden nodes count through their children, others must
                // also survive post-processing
                let visible = if params.hide_in_hierarchy {
                    node.children != Some(false)
                        && this
                            .has_children(node.to_parent_node(parent_keys.clone()), limit)
                            .await?
                } else {
                    let output = node.to_parent_node(parent_keys.clone());
                    this.definition.post_process_node(output).is_some()
                        && match (params.hide_if_no_children, node.children) {
                            (true, Some(false)) => false,
                            (true, None) => {
                                this.has_children(node.to_parent_node(parent_keys.clone()), limit)
                                    .await?
                            }
                            _ => true,
                        }
                };
                if visible {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        .boxed()
    }

    /// Children flag of a node whose children are unknown. Failed checks mean
    /// "has children" so that the error surfaces when the node is expanded.
    async fn determine_children(self: &Arc<Self>, node: HierarchyNode, limit: RowLimit) -> bool {
        let label = node.label.clone();
        match self.has_children(node, limit).await {
            Ok(has_children) => has_children,
            Err(err) if err.is_rows_limit_exceeded() => true,
            Err(err) => {
                tracing::warn!(node = %label, error = %err, "Failed to determine node children");
                true
            }
        }
    }

    #[tracing::instrument(level = "debug", skip_all)]
    async fn processed_level(
        self: &Arc<Self>,
        parent: Option<&HierarchyNode>,
        request: &LevelRequest,
    ) -> Result<Vec<LevelNode>, HierarchyError> {
        let source = self.source_level(parent.cloned(), request.limit).await?;
        let nodes = merge_by_label(source.iter().cloned().map(SourceLevelNode::new).collect());
        let mut level: Vec<LevelNode> = nodes.into_iter().map(LevelNode::Source).collect();
        sort_by_label(&mut level, LevelNode::label);

        let ctx = GroupingContext {
            metadata: &self.metadata,
            formatter: request.formatter.as_ref(),
            labels: &self.settings.labels,
            yield_every: self.settings.yield_every,
        };
        let mut level = group_level(&ctx, None, level).await?;
        assign_auto_expand(&mut level);

        format_level(&mut level, request.formatter.as_ref()).await;
        sort_level(&mut level);

        let scope = SearchScope::for_parent(request.search.as_deref(), parent);
        Ok(scope.apply(level))
    }

    async fn level_nodes(
        self: &Arc<Self>,
        parent: Option<HierarchyNode>,
        request: &LevelRequest,
    ) -> Result<(Vec<LevelNode>, Placement), HierarchyError> {
        let Some(parent) = parent else {
            let level = self.processed_level(None, request).await?;
            let placement = Placement {
                parent_keys: Vec::new(),
                non_grouping_ancestor: None,
            };
            return Ok((level, placement));
        };

        if !parent.is_grouping_node() {
            let level = self.processed_level(Some(&parent), request).await?;
            let placement = Placement {
                parent_keys: parent.child_parent_keys(),
                non_grouping_ancestor: Some(parent),
            };
            return Ok((level, placement));
        }

        // rebuild the ancestor's level and walk down to the requested group
        let ancestor = parent
            .grouping
            .as_ref()
            .and_then(|grouping| grouping.non_grouping_ancestor.as_deref())
            .cloned();
        let placement = Placement {
            parent_keys: parent.child_parent_keys(),
            non_grouping_ancestor: ancestor.clone(),
        };
        if parent.grouping.is_none() {
            tracing::debug!(key = ?parent.key, "Grouping node without grouping info");
            return Ok((Vec::new(), placement));
        }

        let depth = ancestor
            .as_ref()
            .map_or(0, |ancestor| ancestor.parent_keys.len() + 1);
        let mut level = self.processed_level(ancestor.as_ref(), request).await?;
        for key in parent.parent_keys.iter().skip(depth).chain([&parent.key]) {
            let group = level.into_iter().find_map(|node| match node {
                LevelNode::Grouping(group) if group.key == *key => Some(group),
                _ => None,
            });
            match group {
                Some(group) => level = group.children,
                None => {
                    tracing::debug!(key = ?key, "Grouping node not found in its level");
                    return Ok((Vec::new(), placement));
                }
            }
        }
        Ok((level, placement))
    }

    async fn finish_node(
        self: Arc<Self>,
        node: LevelNode,
        placement: Arc<Placement>,
        limit: RowLimit,
    ) -> HierarchyNode {
        match node {
            LevelNode::Source(SourceLevelNode {
                node,
                label,
                search,
            }) => {
                let mut output = HierarchyNode {
                    key: node.key.to_hierarchy_key(),
                    label,
                    parent_keys: placement.parent_keys.clone(),
                    children: NodeChildren::Unknown,
                    auto_expand: node.auto_expand,
                    supports_filtering: node.supports_filtering,
                    extended_data: node.extended_data,
                    grouping: None,
                    search,
                };
                let has_children = match node.children {
                    Some(has_children) => has_children,
                    None if output
                        .search
                        .as_ref()
                        .is_some_and(NodeSearchInfo::has_matching_descendants) =>
                    {
                        true
                    }
                    None => self.determine_children(output.clone(), limit).await,
                };
                output.children = NodeChildren::Flag(has_children);
                output
            }
            LevelNode::Grouping(group) => {
                let grouped_instance_keys = group.grouped_instance_keys();
                HierarchyNode {
                    key: group.key,
                    label: group.label,
                    parent_keys: placement.parent_keys.clone(),
                    children: NodeChildren::Flag(true),
                    auto_expand: group.auto_expand,
                    supports_filtering: false,
                    extended_data: None,
                    grouping: Some(GroupingNodeInfo {
                        grouped_instance_keys,
                        non_grouping_ancestor: placement.non_grouping_ancestor.clone().map(Box::new),
                    }),
                    search: group.search,
                }
            }
        }
    }

    fn instance_keys(self: &Arc<Self>, parent: Option<HierarchyNode>, limit: RowLimit) -> InstanceKeyStream {
        let this = self.clone();
        let parent_keys = parent
            .as_ref()
            .map(HierarchyNode::child_parent_keys)
            .unwrap_or_default();
        self.read_level(parent.as_ref(), limit)
            .map_ok(move |node| {
                if node.params.hide_in_hierarchy {
                    this.instance_keys(Some(node.to_parent_node(parent_keys.clone())), limit)
                } else {
                    stream::iter(node.key.instance_keys().to_vec().into_iter().map(Ok)).boxed()
                }
            })
            .try_flatten()
            .boxed()
    }
}

/// Render concatenated labels of every source node, nested ones included.
async fn format_level(level: &mut [LevelNode], formatter: &dyn ValueFormatter) {
    let mut pending: Vec<&mut LevelNode> = level.iter_mut().collect();
    while let Some(node) = pending.pop() {
        match node {
            LevelNode::Source(source) => {
                if matches!(source.node.label, NodeLabel::Concatenated(_)) {
                    source.label = format_label(formatter, &source.node.label).await;
                }
            }
            LevelNode::Grouping(group) => pending.extend(group.children.iter_mut()),
        }
    }
}

impl HierarchyProvider for QueryHierarchyProvider {
    fn get_nodes(&self, props: GetNodesProps) -> NodeStream {
        let inner = self.inner.clone();
        let request = inner.request(props.hierarchy_level_size_limit);
        let span = tracing::debug_span!(
            "get_nodes",
            parent = ?props.parent_node.as_ref().map(|parent| &parent.key)
        );

        let load = async move {
            let (level, placement) = inner.level_nodes(props.parent_node, &request).await?;
            tracing::debug!(nodes = level.len(), "Streaming hierarchy level");

            let placement = Arc::new(placement);
            let limit = request.limit;
            let definition = inner.definition.clone();
            let concurrency = inner.settings.query_concurrency;
            let nodes = stream::iter(level)
                .map(move |node| inner.clone().finish_node(node, placement.clone(), limit))
                .buffered(concurrency)
                .filter_map(move |node| future::ready(definition.post_process_node(node)))
                .map(Ok);
            Ok::<_, HierarchyError>(nodes)
        }
        .instrument(span);

        stream::once(load).try_flatten().boxed()
    }

    fn get_node_instance_keys(&self, props: GetNodesProps) -> InstanceKeyStream {
        let limit = props
            .hierarchy_level_size_limit
            .unwrap_or(self.inner.settings.hierarchy_level_size_limit);
        match props.parent_node {
            Some(parent) if parent.is_grouping_node() => {
                stream::iter(parent.instance_keys().to_vec().into_iter().map(Ok)).boxed()
            }
            parent => self.inner.instance_keys(parent, limit),
        }
    }

    fn set_formatter(&self, formatter: Option<Arc<dyn ValueFormatter>>) {
        let formatter: Arc<dyn ValueFormatter> = match formatter {
            Some(formatter) => formatter,
            None => Arc::new(DefaultValueFormatter),
        };
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .formatter = formatter;
    }

    fn set_hierarchy_search(&self, search: Option<HierarchySearch>) {
        tracing::debug!(
            paths = search.as_ref().map_or(0, |search| search.paths.len()),
            "Setting hierarchy search"
        );
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .search = search.map(Arc::new);
    }
}
