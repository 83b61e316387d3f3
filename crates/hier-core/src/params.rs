use hier_model::PrimitiveValue;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

/// Per-node instructions for the processing pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessingParams {
    pub hide_in_hierarchy: bool,
    pub hide_if_no_children: bool,
    /// Nodes with the same non-empty id and label are merged into one.
    pub merge_by_label_id: Option<String>,
    pub grouping: Option<GroupingParams>,
}

impl ProcessingParams {
    pub(crate) fn merge_id(&self) -> Option<&str> {
        self.merge_by_label_id.as_deref().filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutoExpand {
    Always,
    SingleChild,
}

/// Hide and auto-expand policies shared by every grouping kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupHandling {
    pub hide_if_no_siblings: bool,
    pub hide_if_one_grouped_node: bool,
    pub auto_expand: Option<AutoExpand>,
}

impl GroupHandling {
    /// Combine the policies of two members of the same group. Hide flags are
    /// OR-ed, `always` wins over `single-child`.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        let auto_expand = match (self.auto_expand, other.auto_expand) {
            (Some(AutoExpand::Always), _) | (_, Some(AutoExpand::Always)) => {
                Some(AutoExpand::Always)
            }
            (Some(AutoExpand::SingleChild), _) | (_, Some(AutoExpand::SingleChild)) => {
                Some(AutoExpand::SingleChild)
            }
            (None, None) => None,
        };
        Self {
            hide_if_no_siblings: self.hide_if_no_siblings || other.hide_if_no_siblings,
            hide_if_one_grouped_node: self.hide_if_one_grouped_node
                || other.hide_if_one_grouped_node,
            auto_expand,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GroupingParams {
    #[serde(default, deserialize_with = "toggle", skip_serializing_if = "Option::is_none")]
    pub by_label: Option<LabelGroupingParams>,
    #[serde(default, deserialize_with = "toggle", skip_serializing_if = "Option::is_none")]
    pub by_class: Option<ClassGroupingParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_base_classes: Option<BaseClassGroupingParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_properties: Option<PropertiesGroupingParams>,
}

/// `byClass` and `byLabel` accept either a flag or an object with options.
fn toggle<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Toggle<P> {
        Flag(bool),
        Params(P),
    }

    Ok(match Option::<Toggle<T>>::deserialize(deserializer)? {
        None | Some(Toggle::Flag(false)) => None,
        Some(Toggle::Flag(true)) => Some(T::default()),
        Some(Toggle::Params(params)) => Some(params),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGroupingParams {
    #[serde(flatten)]
    pub handling: GroupHandling,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelGroupingParams {
    /// Only nodes with the same group id end up in the same label group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(flatten)]
    pub handling: GroupHandling,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseClassGroupingParams {
    pub full_class_names: Vec<String>,
    #[serde(flatten)]
    pub handling: GroupHandling,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertiesGroupingParams {
    pub properties_class_name: String,
    /// One nested grouping level per entry, outermost first.
    pub property_groups: Vec<PropertyGroup>,
    #[serde(default)]
    pub create_group_for_out_of_range_values: bool,
    #[serde(default)]
    pub create_group_for_unspecified_values: bool,
    #[serde(flatten)]
    pub handling: GroupHandling,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyGroup {
    pub property_name: String,
    /// Value of the property on this node; `None` when unspecified.
    #[serde(default)]
    pub property_value: Option<PrimitiveValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<PropertyRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRange {
    pub from_value: f64,
    pub to_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_label: Option<String>,
}

impl PropertyRange {
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.from_value <= value && value <= self.to_value
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_toggles() {
        let params: GroupingParams =
            serde_json::from_value(json!({ "byClass": true, "byLabel": false })).unwrap();
        assert_eq!(params.by_class, Some(ClassGroupingParams::default()));
        assert_eq!(params.by_label, None);

        let params: GroupingParams = serde_json::from_value(json!({
            "byLabel": { "groupId": "g", "hideIfOneGroupedNode": true, "autoExpand": "single-child" }
        }))
        .unwrap();
        let by_label = params.by_label.unwrap();
        assert_eq!(by_label.group_id.as_deref(), Some("g"));
        assert!(by_label.handling.hide_if_one_grouped_node);
        assert_eq!(by_label.handling.auto_expand, Some(AutoExpand::SingleChild));
    }

    #[test]
    fn test_properties() {
        let params: GroupingParams = serde_json::from_value(json!({
            "byProperties": {
                "propertiesClassName": "S.Y",
                "createGroupForUnspecifiedValues": true,
                "propertyGroups": [
                    { "propertyName": "Size", "propertyValue": 5, "ranges": [{ "fromValue": 1, "toValue": 10 }] },
                    { "propertyName": "Name", "propertyValue": null },
                ],
            }
        }))
        .unwrap();
        let by_properties = params.by_properties.unwrap();
        assert!(by_properties.create_group_for_unspecified_values);
        assert!(!by_properties.create_group_for_out_of_range_values);
        assert_eq!(
            by_properties.property_groups[0].property_value,
            Some(PrimitiveValue::Integer(5))
        );
        assert!(by_properties.property_groups[0].ranges[0].contains(5.0));
        assert_eq!(by_properties.property_groups[1].property_value, None);
    }

    #[test]
    fn test_unknown_grouping_kind_is_rejected() {
        let result = serde_json::from_value::<GroupingParams>(json!({ "byColour": true }));
        assert!(result.is_err());
    }

    #[test]
    fn test_handling_merge() {
        let single = GroupHandling {
            auto_expand: Some(AutoExpand::SingleChild),
            ..GroupHandling::default()
        };
        let always = GroupHandling {
            hide_if_no_siblings: true,
            auto_expand: Some(AutoExpand::Always),
            ..GroupHandling::default()
        };
        let merged = single.merge(always);
        assert!(merged.hide_if_no_siblings);
        assert!(!merged.hide_if_one_grouped_node);
        assert_eq!(merged.auto_expand, Some(AutoExpand::Always));
        assert_eq!(GroupHandling::default().merge(single), single);
    }
}
