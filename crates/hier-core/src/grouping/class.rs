use hier_model::HierarchyNodeKey;
use hier_query::get_class;

use super::grouping_params;
use super::CooperativeYield;
use super::GroupingContext;
use super::GroupingHandlerResult;
use super::GroupsBuilder;
use crate::level::GroupingStage;
use crate::level::LevelNode;
use crate::HierarchyError;

pub(super) async fn group(
    ctx: &GroupingContext<'_>,
    nodes: Vec<LevelNode>,
    yielder: &mut CooperativeYield,
) -> Result<GroupingHandlerResult, HierarchyError> {
    let mut groups = GroupsBuilder::new(GroupingStage::Class);
    let mut ungrouped = Vec::new();

    for node in nodes {
        let candidate = grouping_params(&node)
            .and_then(|params| params.by_class.as_ref())
            .map(|params| params.handling)
            .zip(
                node.as_source()
                    .and_then(|source| source.node.key.primary_class_name())
                    .map(str::to_string),
            );
        let Some((handling, class_name)) = candidate else {
            ungrouped.push(node);
            continue;
        };

        yielder.tick().await;
        let class = get_class(ctx.metadata, &class_name).await?;
        groups.add(
            HierarchyNodeKey::ClassGrouping {
                class_name: class.full_name(),
            },
            || class.display_label().to_string(),
            handling,
            node,
        );
    }

    Ok(GroupingHandlerResult {
        grouped: groups.finish(),
        ungrouped,
    })
}
