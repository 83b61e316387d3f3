use std::sync::Arc;

use hier_model::normalize_full_class_name;
use hier_model::HierarchyNodeKey;
use hier_query::get_class;
use hier_query::ClassHierarchyInspector;
use hier_query::EcClass;
use rustc_hash::FxHashSet;

use super::grouping_params;
use super::CooperativeYield;
use super::GroupingContext;
use super::GroupingHandlerResult;
use crate::level::GroupingLevelNode;
use crate::level::GroupingStage;
use crate::level::LevelNode;
use crate::GroupHandling;
use crate::HierarchyError;

/// Every base class requested by `nodes`, ancestors before descendants.
pub(super) async fn sorted_base_classes(
    ctx: &GroupingContext<'_>,
    nodes: &[LevelNode],
    yielder: &mut CooperativeYield,
) -> Result<Vec<Arc<EcClass>>, HierarchyError> {
    let mut seen = FxHashSet::default();
    let mut names = Vec::new();
    for params in nodes
        .iter()
        .filter_map(grouping_params)
        .filter_map(|params| params.by_base_classes.as_ref())
    {
        for name in &params.full_class_names {
            if seen.insert(normalize_full_class_name(name)) {
                names.push(name.as_str());
            }
        }
    }

    let mut classes = Vec::with_capacity(names.len());
    for name in names {
        classes.push(get_class(ctx.metadata, name).await?);
    }

    sort_ancestors_first(ctx.metadata, classes, yielder).await
}

/// Insertion sort: each class goes right after the last already sorted class
/// it derives from, or to the front when there's none.
pub(super) async fn sort_ancestors_first(
    classes_inspector: &dyn ClassHierarchyInspector,
    classes: Vec<Arc<EcClass>>,
    yielder: &mut CooperativeYield,
) -> Result<Vec<Arc<EcClass>>, HierarchyError> {
    let mut sorted: Vec<Arc<EcClass>> = Vec::with_capacity(classes.len());
    for class in classes {
        let full_name = class.full_name();
        let mut position = 0;
        for (index, existing) in sorted.iter().enumerate().rev() {
            yielder.tick().await;
            if classes_inspector
                .class_derives_from(&full_name, &existing.full_name())
                .await?
            {
                position = index + 1;
                break;
            }
        }
        sorted.insert(position, class);
    }
    Ok(sorted)
}

pub(super) async fn group(
    ctx: &GroupingContext<'_>,
    class: &EcClass,
    nodes: Vec<LevelNode>,
    yielder: &mut CooperativeYield,
) -> Result<GroupingHandlerResult, HierarchyError> {
    let full_name = class.full_name();
    let normalized = normalize_full_class_name(&full_name);

    let mut group = GroupingLevelNode::new(
        HierarchyNodeKey::ClassGrouping {
            class_name: full_name.clone(),
        },
        class.display_label(),
        GroupingStage::BaseClass,
        GroupHandling::default(),
    );
    let mut handling: Option<GroupHandling> = None;
    let mut ungrouped = Vec::new();

    for node in nodes {
        let candidate = grouping_params(&node)
            .and_then(|params| params.by_base_classes.as_ref())
            .filter(|params| {
                params
                    .full_class_names
                    .iter()
                    .any(|name| normalize_full_class_name(name) == normalized)
            })
            .map(|params| params.handling)
            .zip(
                node.as_source()
                    .and_then(|source| source.node.key.primary_class_name())
                    .map(str::to_string),
            );

        let matched = match candidate {
            Some((node_handling, runtime_class)) => {
                yielder.tick().await;
                ctx.metadata
                    .class_derives_from(&runtime_class, &full_name)
                    .await?
                    .then_some(node_handling)
            }
            None => None,
        };

        match matched {
            Some(node_handling) => {
                handling = Some(handling.map_or(node_handling, |h| h.merge(node_handling)));
                group.children.push(node);
            }
            None => ungrouped.push(node),
        }
    }

    let grouped = match handling {
        Some(handling) => {
            group.handling = handling;
            vec![group]
        }
        None => Vec::new(),
    };
    Ok(GroupingHandlerResult { grouped, ungrouped })
}

#[cfg(test)]
mod tests {
    use hier_conf::GroupingLabels;
    use hier_model::InstanceKey;
    use hier_query::CachedMetadataProvider;
    use hier_query::ClassKind;
    use hier_query::EcSchema;
    use hier_query::InMemoryMetadataProvider;

    use super::*;
    use crate::level::SourceLevelNode;
    use crate::BaseClassGroupingParams;
    use crate::DefaultValueFormatter;
    use crate::GroupingParams;
    use crate::SourceNode;
    use crate::SourceNodeKey;

    async fn classes(metadata: &InMemoryMetadataProvider, names: &[&str]) -> Vec<Arc<EcClass>> {
        let mut result = Vec::new();
        for name in names {
            result.push(get_class(metadata, name).await.unwrap());
        }
        result
    }

    fn permutations(items: &[&'static str]) -> Vec<Vec<&'static str>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut result = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let mut rest = items.to_vec();
            rest.remove(index);
            for mut permutation in permutations(&rest) {
                permutation.insert(0, *item);
                result.push(permutation);
            }
        }
        result
    }

    #[tokio::test]
    async fn test_ancestors_come_first_for_every_input_order() {
        // A <- B <- C, A <- D, unrelated E, C also mixes in M
        let metadata = InMemoryMetadataProvider::new().with_schema(
            EcSchema::new("S")
                .with_class(EcClass::new("A", ClassKind::Entity))
                .with_class(EcClass::new("B", ClassKind::Entity).with_base_class("S.A"))
                .with_class(
                    EcClass::new("C", ClassKind::Entity)
                        .with_base_class("S.B")
                        .with_base_class("S.M"),
                )
                .with_class(EcClass::new("D", ClassKind::Entity).with_base_class("S.A"))
                .with_class(EcClass::new("E", ClassKind::Entity))
                .with_class(EcClass::new("M", ClassKind::Mixin)),
        );
        let names = ["S.A", "S.B", "S.C", "S.D", "S.E", "S.M"];

        for permutation in permutations(&names) {
            let input = classes(&metadata, &permutation).await;
            let mut yielder = CooperativeYield::new(2);
            let sorted = sort_ancestors_first(&metadata, input, &mut yielder)
                .await
                .unwrap();
            let sorted: Vec<String> = sorted.iter().map(|class| class.full_name()).collect();
            assert_eq!(sorted.len(), names.len());

            for (i, earlier) in sorted.iter().enumerate() {
                for later in &sorted[i + 1..] {
                    assert!(
                        !metadata.class_derives_from(earlier, later).await.unwrap(),
                        "{earlier} sorted before its ancestor {later} for input {permutation:?}"
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn test_group_by_base_class() {
        let metadata = CachedMetadataProvider::new(Arc::new(
            InMemoryMetadataProvider::new().with_schema(
                EcSchema::new("S")
                    .with_class(EcClass::new("A", ClassKind::Entity).with_label("Everything A"))
                    .with_class(EcClass::new("B", ClassKind::Entity).with_base_class("S.A"))
                    .with_class(EcClass::new("E", ClassKind::Entity)),
            ),
        ));
        let labels = GroupingLabels::default();
        let ctx = GroupingContext {
            metadata: &metadata,
            formatter: &DefaultValueFormatter,
            labels: &labels,
            yield_every: 100,
        };
        let node = |class_name: &str, id: &str| {
            let mut node = SourceNode::new(
                SourceNodeKey::Instances(vec![InstanceKey::new(class_name, id)]),
                id,
            );
            node.params.grouping = Some(GroupingParams {
                by_base_classes: Some(BaseClassGroupingParams {
                    full_class_names: vec!["S:A".to_string()],
                    handling: GroupHandling::default(),
                }),
                ..GroupingParams::default()
            });
            LevelNode::Source(SourceLevelNode::new(node))
        };
        let plain = LevelNode::Source(SourceLevelNode::new(SourceNode::new(
            SourceNodeKey::Instances(vec![InstanceKey::new("S.B", "0x3")]),
            "0x3",
        )));

        let class = get_class(&metadata, "S.A").await.unwrap();
        let mut yielder = CooperativeYield::new(100);
        let result = group(
            &ctx,
            &class,
            vec![node("S.B", "0x1"), node("S.E", "0x2"), plain],
            &mut yielder,
        )
        .await
        .unwrap();

        assert_eq!(result.grouped.len(), 1);
        assert_eq!(result.grouped[0].label, "Everything A");
        assert_eq!(
            result.grouped[0].key,
            HierarchyNodeKey::ClassGrouping {
                class_name: "S.A".to_string()
            }
        );
        assert_eq!(
            result.grouped[0].grouped_instance_keys(),
            [InstanceKey::new("S.B", "0x1")]
        );
        let ungrouped: Vec<&str> = result.ungrouped.iter().map(LevelNode::label).collect();
        assert_eq!(ungrouped, ["0x2", "0x3"]);
    }
}
