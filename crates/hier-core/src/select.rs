//! Builds ECSQL projections that [`parse_node_row`](crate::parse_node_row)
//! understands.

use serde_json::Value;

use crate::NodeColumn;

/// An expression selected into a node query column.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectExpr {
    /// A constant, quoted as needed.
    Literal(Value),
    /// Raw ECSQL, e.g. `[this].[UserLabel]`.
    Selector(String),
    /// Rendered with `json_object`.
    Object(Vec<(String, SelectExpr)>),
    /// Rendered with `json_array`.
    Array(Vec<SelectExpr>),
}

impl SelectExpr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn selector(ecsql: impl Into<String>) -> Self {
        Self::Selector(ecsql.into())
    }

    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, SelectExpr)>) -> Self {
        Self::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }

    fn to_ecsql(&self) -> String {
        match self {
            Self::Literal(Value::Null) => "NULL".to_string(),
            Self::Literal(Value::Bool(true)) => "TRUE".to_string(),
            Self::Literal(Value::Bool(false)) => "FALSE".to_string(),
            Self::Literal(Value::Number(number)) => number.to_string(),
            Self::Literal(Value::String(text)) => quote(text),
            Self::Literal(value @ (Value::Array(_) | Value::Object(_))) => {
                quote(&value.to_string())
            }
            Self::Selector(ecsql) => ecsql.clone(),
            Self::Object(entries) => {
                let args: Vec<String> = entries
                    .iter()
                    .flat_map(|(key, value)| [quote(key), value.to_json_ecsql()])
                    .collect();
                format!("json_object({})", args.join(", "))
            }
            Self::Array(items) => {
                let args: Vec<String> = items.iter().map(Self::to_json_ecsql).collect();
                format!("json_array({})", args.join(", "))
            }
        }
    }

    /// Same as [`Self::to_ecsql`] but keeps booleans and structured literals
    /// typed when nested inside `json_object`/`json_array`.
    fn to_json_ecsql(&self) -> String {
        match self {
            Self::Literal(value @ (Value::Bool(_) | Value::Array(_) | Value::Object(_))) => {
                format!("json({})", quote(&value.to_string()))
            }
            other => other.to_ecsql(),
        }
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Column values of a node query. Unset optional columns are selected as
/// `NULL` so that projections of different definitions line up.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSelectClauseProps {
    /// Full class name of the row's class, e.g. `BisCore.Subject`.
    pub full_class_name: SelectExpr,
    pub instance_id: SelectExpr,
    pub label: SelectExpr,
    pub has_children: Option<SelectExpr>,
    pub hide_if_no_children: Option<SelectExpr>,
    pub hide_node_in_hierarchy: Option<SelectExpr>,
    pub grouping: Option<SelectExpr>,
    pub extended_data: Option<SelectExpr>,
    pub auto_expand: Option<SelectExpr>,
    pub supports_filtering: Option<SelectExpr>,
    pub merge_by_label_id: Option<SelectExpr>,
}

impl NodeSelectClauseProps {
    /// Props for rows of a class alias, `[this]` by convention.
    pub fn for_class_alias(alias: &str, label: SelectExpr) -> Self {
        Self {
            full_class_name: SelectExpr::selector(format!(
                "ec_classname([{alias}].[ECClassId], 's.c')"
            )),
            instance_id: SelectExpr::selector(format!("[{alias}].[ECInstanceId]")),
            label,
            has_children: None,
            hide_if_no_children: None,
            hide_node_in_hierarchy: None,
            grouping: None,
            extended_data: None,
            auto_expand: None,
            supports_filtering: None,
            merge_by_label_id: None,
        }
    }

    fn expr(&self, column: NodeColumn) -> Option<&SelectExpr> {
        match column {
            NodeColumn::FullClassName => Some(&self.full_class_name),
            NodeColumn::InstanceId => Some(&self.instance_id),
            NodeColumn::DisplayLabel => Some(&self.label),
            NodeColumn::HasChildren => self.has_children.as_ref(),
            NodeColumn::HideIfNoChildren => self.hide_if_no_children.as_ref(),
            NodeColumn::HideNodeInHierarchy => self.hide_node_in_hierarchy.as_ref(),
            NodeColumn::Grouping => self.grouping.as_ref(),
            NodeColumn::ExtendedData => self.extended_data.as_ref(),
            NodeColumn::AutoExpand => self.auto_expand.as_ref(),
            NodeColumn::SupportsFiltering => self.supports_filtering.as_ref(),
            NodeColumn::MergeByLabelId => self.merge_by_label_id.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NodeSelectClauseFactory;

impl NodeSelectClauseFactory {
    #[must_use]
    pub fn create_select_clause(&self, props: &NodeSelectClauseProps) -> String {
        NodeColumn::ALL
            .iter()
            .map(|&column| {
                let expr = props
                    .expr(column)
                    .map_or_else(|| "NULL".to_string(), SelectExpr::to_ecsql);
                format!("{expr} AS [{}]", column.as_str())
            })
            .collect::<Vec<_>>()
            .join(",\n")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_literals() {
        assert_eq!(SelectExpr::literal(json!(null)).to_ecsql(), "NULL");
        assert_eq!(SelectExpr::literal(true).to_ecsql(), "TRUE");
        assert_eq!(SelectExpr::literal(12).to_ecsql(), "12");
        assert_eq!(SelectExpr::literal("it's").to_ecsql(), "'it''s'");
        assert_eq!(
            SelectExpr::literal(json!({ "a": 1 })).to_ecsql(),
            r#"'{"a":1}'"#
        );
    }

    #[test]
    fn test_json_object() {
        let grouping = SelectExpr::object([
            ("byClass", SelectExpr::literal(true)),
            (
                "byLabel",
                SelectExpr::object([("groupId", SelectExpr::selector("[this].[Kind]"))]),
            ),
        ]);
        assert_eq!(
            grouping.to_ecsql(),
            "json_object('byClass', json('true'), 'byLabel', json_object('groupId', [this].[Kind]))"
        );
    }

    #[test]
    fn test_select_clause_projects_every_column() {
        let mut props =
            NodeSelectClauseProps::for_class_alias("this", SelectExpr::selector("[this].[CodeValue]"));
        props.has_children = Some(SelectExpr::literal(false));
        props.merge_by_label_id = Some(SelectExpr::literal("models"));

        let clause = NodeSelectClauseFactory.create_select_clause(&props);
        let lines: Vec<&str> = clause.lines().collect();
        assert_eq!(lines.len(), NodeColumn::ALL.len());
        assert_eq!(
            lines[0],
            "ec_classname([this].[ECClassId], 's.c') AS [FullClassName],"
        );
        assert_eq!(lines[1], "[this].[ECInstanceId] AS [ECInstanceId],");
        assert_eq!(lines[2], "[this].[CodeValue] AS [DisplayLabel],");
        assert_eq!(lines[3], "FALSE AS [HasChildren],");
        assert_eq!(lines[4], "NULL AS [HideIfNoChildren],");
        assert_eq!(lines[10], "'models' AS [MergeByLabelId]");
    }
}
