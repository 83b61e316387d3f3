use hier_model::HierarchyNodeKey;

use super::grouping_params;
use super::GroupingHandlerResult;
use crate::level::GroupingLevelNode;
use crate::level::GroupingStage;
use crate::level::LevelNode;

/// Groups runs of equally labeled nodes. Expects `nodes` sorted by label: a
/// node only joins the most recently created group.
pub(super) fn group(nodes: Vec<LevelNode>) -> GroupingHandlerResult {
    let mut grouped: Vec<GroupingLevelNode> = Vec::new();
    let mut ungrouped = Vec::new();

    for node in nodes {
        let Some(params) = grouping_params(&node).and_then(|params| params.by_label.as_ref())
        else {
            ungrouped.push(node);
            continue;
        };
        let key = HierarchyNodeKey::LabelGrouping {
            label: node.label().to_string(),
            group_id: params.group_id.clone(),
        };
        let handling = params.handling;

        match grouped.last_mut() {
            Some(current) if current.key == key => {
                current.handling = current.handling.merge(handling);
                current.children.push(node);
            }
            _ => {
                let mut group =
                    GroupingLevelNode::new(key, node.label(), GroupingStage::Label, handling);
                group.children.push(node);
                grouped.push(group);
            }
        }
    }

    GroupingHandlerResult { grouped, ungrouped }
}
