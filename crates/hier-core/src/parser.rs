//! Turns node query rows into [`SourceNode`]s.

use hier_model::ConcatenatedValue;
use hier_model::InstanceKey;
use hier_model::NodeLabel;
use hier_query::Row;
use serde_json::Value;

use crate::GroupingParams;
use crate::NodeParseError;
use crate::ProcessingParams;
use crate::SourceNode;
use crate::SourceNodeKey;

/// Well-known columns of a node query projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeColumn {
    FullClassName,
    InstanceId,
    DisplayLabel,
    HasChildren,
    HideIfNoChildren,
    HideNodeInHierarchy,
    Grouping,
    ExtendedData,
    AutoExpand,
    SupportsFiltering,
    MergeByLabelId,
}

impl NodeColumn {
    pub const ALL: [Self; 11] = [
        Self::FullClassName,
        Self::InstanceId,
        Self::DisplayLabel,
        Self::HasChildren,
        Self::HideIfNoChildren,
        Self::HideNodeInHierarchy,
        Self::Grouping,
        Self::ExtendedData,
        Self::AutoExpand,
        Self::SupportsFiltering,
        Self::MergeByLabelId,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullClassName => "FullClassName",
            Self::InstanceId => "ECInstanceId",
            Self::DisplayLabel => "DisplayLabel",
            Self::HasChildren => "HasChildren",
            Self::HideIfNoChildren => "HideIfNoChildren",
            Self::HideNodeInHierarchy => "HideNodeInHierarchy",
            Self::Grouping => "Grouping",
            Self::ExtendedData => "ExtendedData",
            Self::AutoExpand => "AutoExpand",
            Self::SupportsFiltering => "SupportsFiltering",
            Self::MergeByLabelId => "MergeByLabelId",
        }
    }
}

fn column(row: &Row, column: NodeColumn) -> Option<&Value> {
    row.get(column.as_str()).filter(|value| !value.is_null())
}

fn invalid(column: NodeColumn, reason: impl Into<String>) -> NodeParseError {
    NodeParseError::InvalidColumn {
        column: column.as_str(),
        reason: reason.into(),
    }
}

fn string_column(row: &Row, name: NodeColumn) -> Result<Option<&str>, NodeParseError> {
    match column(row, name) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(other) => Err(invalid(name, format!("expected a string, got {other}"))),
    }
}

/// Booleans come back from SQL as either JSON booleans or `0`/`1`.
fn bool_column(row: &Row, name: NodeColumn) -> Result<Option<bool>, NodeParseError> {
    match column(row, name) {
        None => Ok(None),
        Some(Value::Bool(value)) => Ok(Some(*value)),
        Some(Value::Number(number)) => number
            .as_f64()
            .map(|value| Some(value != 0.0))
            .ok_or_else(|| invalid(name, format!("expected a boolean, got {number}"))),
        Some(other) => Err(invalid(name, format!("expected a boolean, got {other}"))),
    }
}

fn flag_column(row: &Row, name: NodeColumn) -> Result<bool, NodeParseError> {
    Ok(bool_column(row, name)?.unwrap_or(false))
}

fn id_column(row: &Row) -> Result<String, NodeParseError> {
    match column(row, NodeColumn::InstanceId) {
        None => Err(NodeParseError::MissingColumn(NodeColumn::InstanceId.as_str())),
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(number)) => number
            .as_u64()
            .map(|id| format!("0x{id:x}"))
            .ok_or_else(|| invalid(NodeColumn::InstanceId, format!("invalid id {number}"))),
        Some(other) => Err(invalid(
            NodeColumn::InstanceId,
            format!("expected an id, got {other}"),
        )),
    }
}

/// JSON columns may hold either serialized JSON text or an already parsed value.
fn json_column(row: &Row, name: NodeColumn) -> Result<Option<Value>, String> {
    match column(row, name) {
        None => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => serde_json::from_str(text)
            .map(Some)
            .map_err(|err| err.to_string()),
        Some(value) => Ok(Some(value.clone())),
    }
}

fn label_column(row: &Row) -> Result<NodeLabel, NodeParseError> {
    if !row.contains_key(NodeColumn::DisplayLabel.as_str()) {
        return Err(NodeParseError::MissingColumn(
            NodeColumn::DisplayLabel.as_str(),
        ));
    }
    let label = match column(row, NodeColumn::DisplayLabel) {
        None => NodeLabel::Text(String::new()),
        Some(Value::String(text)) => parse_label(text),
        Some(value @ Value::Array(_)) => {
            serde_json::from_value::<ConcatenatedValue>(value.clone())
                .map(NodeLabel::Concatenated)
                .map_err(|err| invalid(NodeColumn::DisplayLabel, err.to_string()))?
        }
        Some(other) => NodeLabel::Text(other.to_string()),
    };
    Ok(label)
}

/// Labels serialized as a JSON array become concatenated values; anything
/// else, including text that merely looks like an array, stays plain text.
fn parse_label(text: &str) -> NodeLabel {
    if text.trim_start().starts_with('[') {
        if let Ok(value) = serde_json::from_str::<ConcatenatedValue>(text) {
            return NodeLabel::Concatenated(value);
        }
    }
    NodeLabel::Text(text.to_string())
}

pub fn parse_node_row(row: &Row) -> Result<SourceNode, NodeParseError> {
    let class_name = string_column(row, NodeColumn::FullClassName)?
        .ok_or(NodeParseError::MissingColumn(NodeColumn::FullClassName.as_str()))?;
    let id = id_column(row)?;
    let label = label_column(row)?;

    let grouping = json_column(row, NodeColumn::Grouping)
        .map_err(NodeParseError::InvalidGrouping)?
        .map(serde_json::from_value::<GroupingParams>)
        .transpose()
        .map_err(|err| NodeParseError::InvalidGrouping(err.to_string()))?;

    let extended_data = match json_column(row, NodeColumn::ExtendedData)
        .map_err(NodeParseError::InvalidExtendedData)?
    {
        None => None,
        Some(Value::Object(map)) => Some(map),
        Some(other) => {
            return Err(NodeParseError::InvalidExtendedData(format!(
                "expected an object, got {other}"
            )))
        }
    };

    Ok(SourceNode {
        key: SourceNodeKey::Instances(vec![InstanceKey::new(class_name, id)]),
        label,
        children: bool_column(row, NodeColumn::HasChildren)?,
        auto_expand: flag_column(row, NodeColumn::AutoExpand)?,
        supports_filtering: flag_column(row, NodeColumn::SupportsFiltering)?,
        extended_data,
        params: ProcessingParams {
            hide_in_hierarchy: flag_column(row, NodeColumn::HideNodeInHierarchy)?,
            hide_if_no_children: flag_column(row, NodeColumn::HideIfNoChildren)?,
            merge_by_label_id: string_column(row, NodeColumn::MergeByLabelId)?
                .map(str::to_string),
            grouping,
        },
    })
}
