use rustc_hash::FxHashMap;

use crate::level::SourceLevelNode;
use crate::SourceNodeKey;

fn merge_children(lhs: Option<bool>, rhs: Option<bool>) -> Option<bool> {
    match (lhs, rhs) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

/// Merge instance nodes that share a non-empty merge id and label. The merged
/// node takes the first node's position; its keys are the first node's keys
/// followed by the new keys of every later one.
pub(crate) fn merge_by_label(nodes: Vec<SourceLevelNode>) -> Vec<SourceLevelNode> {
    let input = nodes.len();
    let mut result: Vec<SourceLevelNode> = Vec::with_capacity(input);
    let mut merged: FxHashMap<(String, String), usize> = FxHashMap::default();

    for node in nodes {
        let merge_key = node
            .node
            .params
            .merge_id()
            .filter(|_| matches!(node.node.key, SourceNodeKey::Instances(_)))
            .map(|id| (id.to_string(), node.label.clone()));
        let Some(merge_key) = merge_key else {
            result.push(node);
            continue;
        };

        let Some(&position) = merged.get(&merge_key) else {
            merged.insert(merge_key, result.len());
            result.push(node);
            continue;
        };

        let target = &mut result[position].node;
        if let (SourceNodeKey::Instances(keys), SourceNodeKey::Instances(more)) =
            (&mut target.key, node.node.key)
        {
            for key in more {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        target.children = merge_children(target.children, node.node.children);
        target.auto_expand |= node.node.auto_expand;
    }

    if result.len() < input {
        tracing::trace!(input, output = result.len(), "Merged nodes by label");
    }
    result
}

#[cfg(test)]
mod tests {
    use hier_model::InstanceKey;

    use super::*;
    use crate::SourceNode;

    fn node(id: &str, label: &str, merge_id: Option<&str>) -> SourceLevelNode {
        let mut node = SourceNode::new(
            SourceNodeKey::Instances(vec![InstanceKey::new("S.C", id)]),
            label,
        );
        node.params.merge_by_label_id = merge_id.map(str::to_string);
        SourceLevelNode::new(node)
    }

    fn ids(node: &SourceLevelNode) -> Vec<&str> {
        node.node
            .key
            .instance_keys()
            .iter()
            .map(|key| key.id.as_str())
            .collect()
    }

    #[test]
    fn test_merges_same_id_and_label() {
        let result = merge_by_label(vec![
            node("0x1", "Model", Some("m")),
            node("0x2", "Other", None),
            node("0x3", "Model", Some("m")),
            node("0x4", "Model", Some("n")),
            node("0x5", "Model", Some("")),
            node("0x6", "Model", Some("")),
        ]);
        let merged: Vec<Vec<&str>> = result.iter().map(ids).collect();
        assert_eq!(
            merged,
            [
                vec!["0x1", "0x3"],
                vec!["0x2"],
                vec!["0x4"],
                vec!["0x5"],
                vec!["0x6"]
            ]
        );
    }

    #[test]
    fn test_merged_children_flag() {
        let mut first = node("0x1", "Model", Some("m"));
        first.node.children = Some(false);
        let mut second = node("0x2", "Model", Some("m"));
        second.node.children = Some(true);
        let result = merge_by_label(vec![first, second]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].node.children, Some(true));
    }

    #[test]
    fn test_duplicate_keys_are_not_repeated() {
        let result = merge_by_label(vec![
            node("0x1", "Model", Some("m")),
            node("0x1", "Model", Some("m")),
        ]);
        assert_eq!(ids(&result[0]), ["0x1"]);
    }
}
