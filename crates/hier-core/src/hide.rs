use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::try_join_all;
use futures::future::BoxFuture;
use hier_model::normalize_full_class_name;
use hier_model::HierarchyNode;
use hier_model::HierarchyNodeKey;

use crate::HierarchyError;
use crate::SourceNode;
use crate::SourceNodeKey;

pub(crate) type ChildrenFuture = BoxFuture<'static, Result<Arc<Vec<SourceNode>>, HierarchyError>>;

fn class_set(key: &SourceNodeKey) -> BTreeSet<String> {
    key.instance_keys()
        .iter()
        .map(|key| normalize_full_class_name(&key.class_name))
        .collect()
}

/// Hidden instance nodes of the same classes and with the same params share
/// one children lookup.
fn can_coalesce(lhs: &SourceNode, rhs: &SourceNode) -> bool {
    matches!(
        (&lhs.key, &rhs.key),
        (SourceNodeKey::Instances(_), SourceNodeKey::Instances(_))
    ) && lhs.params == rhs.params
        && class_set(&lhs.key) == class_set(&rhs.key)
}

enum Slot {
    Visible(SourceNode),
    Hidden(usize),
}

/// Replace every node flagged `hide_in_hierarchy` with its children, in
/// place. `load_children` gets the hidden node as seen from its own level.
pub(crate) async fn replace_hidden_nodes(
    nodes: Vec<SourceNode>,
    parent_keys: &[HierarchyNodeKey],
    load_children: impl Fn(HierarchyNode) -> ChildrenFuture,
) -> Result<Vec<SourceNode>, HierarchyError> {
    let mut hidden: Vec<SourceNode> = Vec::new();
    let mut slots = Vec::with_capacity(nodes.len());

    for node in nodes {
        if !node.params.hide_in_hierarchy {
            slots.push(Slot::Visible(node));
            continue;
        }
        match hidden.iter_mut().find(|existing| can_coalesce(existing, &node)) {
            Some(existing) => {
                if let (SourceNodeKey::Instances(keys), SourceNodeKey::Instances(more)) =
                    (&mut existing.key, node.key)
                {
                    for key in more {
                        if !keys.contains(&key) {
                            keys.push(key);
                        }
                    }
                }
            }
            None => {
                slots.push(Slot::Hidden(hidden.len()));
                hidden.push(node);
            }
        }
    }

    if hidden.is_empty() {
        return Ok(slots
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Visible(node) => Some(node),
                Slot::Hidden(_) => None,
            })
            .collect());
    }

    tracing::debug!(
        hidden = hidden.len(),
        "Replacing hidden nodes with their children"
    );
    let children = try_join_all(
        hidden
            .iter()
            .map(|node| load_children(node.to_parent_node(parent_keys.to_vec()))),
    )
    .await?;

    let mut result = Vec::with_capacity(slots.len());
    for slot in slots {
        match slot {
            Slot::Visible(node) => result.push(node),
            Slot::Hidden(index) => result.extend(children[index].iter().cloned()),
        }
    }
    Ok(result)
}
