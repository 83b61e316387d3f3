//! The grouping stage: base class, class, label, then property grouping.

mod base_class;
mod class;
mod label;
mod property;

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use hier_conf::GroupingLabels;
use hier_model::normalize_full_class_name;
use hier_model::HierarchyNodeKey;
use hier_query::CachedMetadataProvider;
use hier_query::EcClass;
use rustc_hash::FxHashMap;

use crate::level::GroupingLevelNode;
use crate::level::GroupingStage;
use crate::level::LevelNode;
use crate::AutoExpand;
use crate::GroupHandling;
use crate::GroupingParams;
use crate::HierarchyError;
use crate::ValueFormatter;

pub(crate) struct GroupingContext<'a> {
    pub metadata: &'a CachedMetadataProvider,
    pub formatter: &'a dyn ValueFormatter,
    pub labels: &'a GroupingLabels,
    pub yield_every: usize,
}

/// Hands control back to the runtime every `every` steps of a long loop.
pub(crate) struct CooperativeYield {
    every: usize,
    steps: usize,
}

impl CooperativeYield {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
            steps: 0,
        }
    }

    pub async fn tick(&mut self) {
        self.steps += 1;
        if self.steps >= self.every {
            self.steps = 0;
            tokio::task::yield_now().await;
        }
    }
}

pub(crate) struct GroupingHandlerResult {
    pub grouped: Vec<GroupingLevelNode>,
    pub ungrouped: Vec<LevelNode>,
}

/// Accumulates members into grouping nodes keyed by their grouping key, in
/// first-seen order.
pub(crate) struct GroupsBuilder {
    stage: GroupingStage,
    groups: Vec<GroupingLevelNode>,
    index: FxHashMap<String, usize>,
}

impl GroupsBuilder {
    pub fn new(stage: GroupingStage) -> Self {
        Self {
            stage,
            groups: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    pub fn add(
        &mut self,
        key: HierarchyNodeKey,
        label: impl FnOnce() -> String,
        handling: GroupHandling,
        node: LevelNode,
    ) {
        let id = serde_json::to_string(&key).unwrap_or_else(|_| format!("{key:?}"));
        if let Some(&position) = self.index.get(&id) {
            let group = &mut self.groups[position];
            group.handling = group.handling.merge(handling);
            group.children.push(node);
            return;
        }
        self.index.insert(id, self.groups.len());
        let mut group = GroupingLevelNode::new(key, label(), self.stage, handling);
        group.children.push(node);
        self.groups.push(group);
    }

    pub fn finish(self) -> Vec<GroupingLevelNode> {
        self.groups
    }
}

pub(crate) fn grouping_params(node: &LevelNode) -> Option<&GroupingParams> {
    node.as_source()?.node.params.grouping.as_ref()
}

#[derive(Debug)]
enum GroupingHandler {
    BaseClass(Arc<EcClass>),
    Class,
    Label,
    Property(usize),
}

impl GroupingHandler {
    fn stage(&self) -> GroupingStage {
        match self {
            Self::BaseClass(_) => GroupingStage::BaseClass,
            Self::Class => GroupingStage::Class,
            Self::Label => GroupingStage::Label,
            Self::Property(index) => GroupingStage::Property(*index),
        }
    }

    async fn group(
        &self,
        ctx: &GroupingContext<'_>,
        nodes: Vec<LevelNode>,
        yielder: &mut CooperativeYield,
    ) -> Result<GroupingHandlerResult, HierarchyError> {
        match self {
            Self::BaseClass(class) => base_class::group(ctx, class, nodes, yielder).await,
            Self::Class => class::group(ctx, nodes, yielder).await,
            Self::Label => Ok(label::group(nodes)),
            Self::Property(index) => property::group(ctx, *index, nodes, yielder).await,
        }
    }
}

/// The grouping node whose children are being regrouped.
#[derive(Debug, Clone)]
pub(crate) struct ParentGroup {
    stage: GroupingStage,
    class_name: Option<String>,
}

impl ParentGroup {
    fn of(group: &GroupingLevelNode) -> Self {
        let class_name = match &group.key {
            HierarchyNodeKey::ClassGrouping { class_name } => Some(class_name.clone()),
            _ => None,
        };
        Self {
            stage: group.stage,
            class_name,
        }
    }
}

async fn create_handlers(
    ctx: &GroupingContext<'_>,
    parent: Option<&ParentGroup>,
    nodes: &[LevelNode],
    yielder: &mut CooperativeYield,
) -> Result<Vec<GroupingHandler>, HierarchyError> {
    let parent_stage = parent.map(|parent| parent.stage);
    let runs_after = |stage: GroupingStage| parent_stage.map_or(true, |parent| parent < stage);
    let requested = |wants: fn(&GroupingParams) -> bool| {
        nodes
            .iter()
            .filter_map(grouping_params)
            .any(wants)
    };

    let mut handlers = Vec::new();

    if parent_stage.map_or(true, |stage| stage == GroupingStage::BaseClass)
        && requested(|params| params.by_base_classes.is_some())
    {
        let classes = base_class::sorted_base_classes(ctx, nodes, yielder).await?;
        // classes up to the parent group's own class are already ancestors
        let skip = parent
            .and_then(|parent| parent.class_name.as_deref())
            .map(normalize_full_class_name)
            .and_then(|parent_class| {
                classes
                    .iter()
                    .position(|class| normalize_full_class_name(&class.full_name()) == parent_class)
            })
            .map_or(0, |position| position + 1);
        handlers.extend(classes.into_iter().skip(skip).map(GroupingHandler::BaseClass));
    }

    if runs_after(GroupingStage::Class) && requested(|params| params.by_class.is_some()) {
        handlers.push(GroupingHandler::Class);
    }

    if runs_after(GroupingStage::Label) && requested(|params| params.by_label.is_some()) {
        handlers.push(GroupingHandler::Label);
    }

    let first_property = match parent_stage {
        Some(GroupingStage::Property(index)) => index + 1,
        _ => 0,
    };
    let property_levels = nodes
        .iter()
        .filter_map(grouping_params)
        .filter_map(|params| params.by_properties.as_ref())
        .map(|params| params.property_groups.len())
        .max()
        .unwrap_or(0);
    handlers.extend((first_property..property_levels).map(GroupingHandler::Property));

    Ok(handlers)
}

/// Collapse groups whose hide policy applies back into their members.
/// `grouped_siblings` counts groups created by earlier handlers on this level.
fn apply_hiding(result: GroupingHandlerResult, grouped_siblings: usize) -> GroupingHandlerResult {
    let GroupingHandlerResult {
        grouped,
        mut ungrouped,
    } = result;
    let group_count = grouped.len();
    let has_siblings = group_count > 1 || !ungrouped.is_empty() || grouped_siblings > 0;

    let mut kept = Vec::with_capacity(group_count);
    for group in grouped {
        let hide = (group.handling.hide_if_one_grouped_node && group.children.len() == 1)
            || (group.handling.hide_if_no_siblings && !has_siblings);
        if hide {
            tracing::trace!(label = %group.label, "Hiding grouping node");
            ungrouped.extend(group.children);
        } else {
            kept.push(group);
        }
    }
    GroupingHandlerResult {
        grouped: kept,
        ungrouped,
    }
}

/// Group a level, then regroup the members of every new group with the
/// handlers that come after the one that created it.
pub(crate) fn group_level<'a>(
    ctx: &'a GroupingContext<'a>,
    parent: Option<ParentGroup>,
    nodes: Vec<LevelNode>,
) -> BoxFuture<'a, Result<Vec<LevelNode>, HierarchyError>> {
    async move {
        let mut yielder = CooperativeYield::new(ctx.yield_every);
        let handlers = create_handlers(ctx, parent.as_ref(), &nodes, &mut yielder).await?;
        if handlers.is_empty() {
            return Ok(nodes);
        }

        let mut grouped: Vec<GroupingLevelNode> = Vec::new();
        let mut ungrouped = nodes;
        for handler in handlers {
            let result = handler.group(ctx, ungrouped, &mut yielder).await?;
            tracing::trace!(
                stage = ?handler.stage(),
                groups = result.grouped.len(),
                ungrouped = result.ungrouped.len(),
                "Applied grouping handler"
            );
            let result = apply_hiding(result, grouped.len());
            grouped.extend(result.grouped);
            ungrouped = result.ungrouped;
        }

        let mut level = Vec::with_capacity(grouped.len() + ungrouped.len());
        for mut group in grouped {
            let members = std::mem::take(&mut group.children);
            group.children = group_level(ctx, Some(ParentGroup::of(&group)), members).await?;
            level.push(LevelNode::Grouping(group));
        }
        level.extend(ungrouped);
        Ok(level)
    }
    .boxed()
}

/// Set `auto_expand` on grouping nodes. Returns whether any grouping node in
/// `nodes`, at any depth, has the `always` policy, which also expands every
/// ancestor group.
pub(crate) fn assign_auto_expand(nodes: &mut [LevelNode]) -> bool {
    let mut any_always = false;
    for node in nodes {
        let LevelNode::Grouping(group) = node else {
            continue;
        };
        let nested_always = assign_auto_expand(&mut group.children);
        let always = group.handling.auto_expand == Some(AutoExpand::Always);
        let single_child = group.handling.auto_expand == Some(AutoExpand::SingleChild)
            && group.children.len() == 1;
        group.auto_expand = always || nested_always || single_child;
        any_always |= always || nested_always;
    }
    any_always
}

#[cfg(test)]
mod tests {
    use hier_model::InstanceKey;
    use hier_model::PrimitiveValue;
    use hier_query::get_class;
    use hier_query::ClassKind;
    use hier_query::EcSchema;
    use hier_query::InMemoryMetadataProvider;

    use super::*;
    use crate::level::SourceLevelNode;
    use crate::BaseClassGroupingParams;
    use crate::ClassGroupingParams;
    use crate::DefaultValueFormatter;
    use crate::LabelGroupingParams;
    use crate::PropertiesGroupingParams;
    use crate::PropertyGroup;
    use crate::SourceNode;
    use crate::SourceNodeKey;

    fn member(id: &str) -> LevelNode {
        LevelNode::Source(SourceLevelNode::new(SourceNode::new(
            SourceNodeKey::Instances(vec![InstanceKey::new("S.C", id)]),
            id,
        )))
    }

    fn group(label: &str, handling: GroupHandling, children: Vec<LevelNode>) -> GroupingLevelNode {
        let mut group = GroupingLevelNode::new(
            HierarchyNodeKey::ClassGrouping {
                class_name: label.to_string(),
            },
            label,
            GroupingStage::Class,
            handling,
        );
        group.children = children;
        group
    }

    #[test]
    fn test_hide_if_one_grouped_node() {
        let handling = GroupHandling {
            hide_if_one_grouped_node: true,
            ..GroupHandling::default()
        };
        let result = apply_hiding(
            GroupingHandlerResult {
                grouped: vec![
                    group("a", handling, vec![member("0x1")]),
                    group("b", handling, vec![member("0x2"), member("0x3")]),
                ],
                ungrouped: vec![],
            },
            0,
        );
        assert_eq!(result.grouped.len(), 1);
        assert_eq!(result.grouped[0].label, "b");
        assert_eq!(result.ungrouped.len(), 1);
    }

    #[test]
    fn test_hide_if_no_siblings() {
        let handling = GroupHandling {
            hide_if_no_siblings: true,
            ..GroupHandling::default()
        };
        let lonely = || GroupingHandlerResult {
            grouped: vec![group("a", handling, vec![member("0x1"), member("0x2")])],
            ungrouped: vec![],
        };

        let result = apply_hiding(lonely(), 0);
        assert!(result.grouped.is_empty());
        assert_eq!(result.ungrouped.len(), 2);

        let result = apply_hiding(lonely(), 1);
        assert_eq!(result.grouped.len(), 1);

        let mut with_sibling = lonely();
        with_sibling.ungrouped.push(member("0x3"));
        let result = apply_hiding(with_sibling, 0);
        assert_eq!(result.grouped.len(), 1);
    }

    #[test]
    fn test_auto_expand_propagates_always_upwards() {
        let inner = group(
            "inner",
            GroupHandling {
                auto_expand: Some(AutoExpand::Always),
                ..GroupHandling::default()
            },
            vec![member("0x1"), member("0x2")],
        );
        let single = group(
            "single",
            GroupHandling {
                auto_expand: Some(AutoExpand::SingleChild),
                ..GroupHandling::default()
            },
            vec![member("0x3")],
        );
        let outer = group(
            "outer",
            GroupHandling::default(),
            vec![LevelNode::Grouping(inner), member("0x4")],
        );
        let plain = group("plain", GroupHandling::default(), vec![member("0x5")]);

        let mut level = vec![
            LevelNode::Grouping(outer),
            LevelNode::Grouping(single),
            LevelNode::Grouping(plain),
        ];
        assert!(assign_auto_expand(&mut level));

        let expanded: Vec<(&str, bool)> = level
            .iter()
            .map(|node| match node {
                LevelNode::Grouping(group) => (group.label.as_str(), group.auto_expand),
                LevelNode::Source(_) => unreachable!(),
            })
            .collect();
        assert_eq!(expanded, [("outer", true), ("single", true), ("plain", false)]);
    }

    fn grouped_by_everything(size: Option<i64>) -> GroupingParams {
        GroupingParams {
            by_label: Some(LabelGroupingParams::default()),
            by_class: Some(ClassGroupingParams::default()),
            by_base_classes: Some(BaseClassGroupingParams {
                full_class_names: vec!["S.A".to_string()],
                handling: GroupHandling::default(),
            }),
            by_properties: Some(PropertiesGroupingParams {
                properties_class_name: "S.A".to_string(),
                property_groups: vec![PropertyGroup {
                    property_name: "Size".to_string(),
                    property_value: size.map(PrimitiveValue::Integer),
                    ranges: vec![],
                }],
                create_group_for_out_of_range_values: false,
                create_group_for_unspecified_values: true,
                handling: GroupHandling::default(),
            }),
        }
    }

    fn source(class_name: &str, id: &str, label: &str, grouping: GroupingParams) -> LevelNode {
        let mut node = SourceNode::new(
            SourceNodeKey::Instances(vec![InstanceKey::new(class_name, id)]),
            label,
        );
        node.params.grouping = Some(grouping);
        LevelNode::Source(SourceLevelNode::new(node))
    }

    fn mixed_level() -> Vec<LevelNode> {
        vec![
            source("S.A", "0x1", "x", grouped_by_everything(Some(1))),
            source("S.B", "0x2", "x", grouped_by_everything(Some(2))),
            source("S.C", "0x3", "y", grouped_by_everything(Some(1))),
            source("S.B", "0x4", "y", GroupingParams::default()),
            source("S.A", "0x5", "z", grouped_by_everything(None)),
        ]
    }

    #[tokio::test]
    async fn test_every_handler_keeps_each_node_exactly_once() {
        let metadata = CachedMetadataProvider::new(Arc::new(
            InMemoryMetadataProvider::new().with_schema(
                EcSchema::new("S")
                    .with_class(EcClass::new("A", ClassKind::Entity))
                    .with_class(EcClass::new("B", ClassKind::Entity).with_base_class("S.A"))
                    .with_class(EcClass::new("C", ClassKind::Entity)),
            ),
        ));
        let labels = GroupingLabels::default();
        let ctx = GroupingContext {
            metadata: &metadata,
            formatter: &DefaultValueFormatter,
            labels: &labels,
            yield_every: 2,
        };
        let base = get_class(&metadata, "S.A").await.unwrap();

        let handlers = [
            GroupingHandler::BaseClass(base),
            GroupingHandler::Class,
            GroupingHandler::Label,
            GroupingHandler::Property(0),
        ];
        for handler in handlers {
            let result = handler
                .group(&ctx, mixed_level(), &mut CooperativeYield::new(2))
                .await
                .unwrap();
            assert!(!result.grouped.is_empty(), "{handler:?} created no groups");

            let mut ids: Vec<String> = result
                .grouped
                .iter()
                .flat_map(GroupingLevelNode::grouped_instance_keys)
                .map(|key| key.id)
                .collect();
            let mut keys = Vec::new();
            for node in &result.ungrouped {
                node.collect_instance_keys(&mut keys);
            }
            ids.extend(keys.into_iter().map(|key| key.id));
            ids.sort();
            assert_eq!(ids, ["0x1", "0x2", "0x3", "0x4", "0x5"], "{handler:?}");
        }
    }
}
