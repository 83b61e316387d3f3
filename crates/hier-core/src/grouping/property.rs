use hier_model::HierarchyNodeKey;
use hier_model::PrimitiveValue;
use hier_model::PrimitiveValueType;
use hier_model::PropertyIdentifier;
use hier_model::TypedPrimitiveValue;
use hier_query::ClassHierarchyInspector;

use super::grouping_params;
use super::CooperativeYield;
use super::GroupingContext;
use super::GroupingHandlerResult;
use super::GroupsBuilder;
use crate::format::value_type_of;
use crate::level::GroupingStage;
use crate::level::LevelNode;
use crate::GroupHandling;
use crate::HierarchyError;
use crate::PropertyGroup;

struct Candidate {
    properties_class_name: String,
    runtime_class_name: String,
    handling: GroupHandling,
    out_of_range_group: bool,
    unspecified_group: bool,
    property: PropertyGroup,
}

fn candidate(node: &LevelNode, index: usize) -> Option<Candidate> {
    let params = grouping_params(node)?.by_properties.as_ref()?;
    let property = params.property_groups.get(index)?;
    Some(Candidate {
        properties_class_name: params.properties_class_name.clone(),
        runtime_class_name: node
            .as_source()?
            .node
            .key
            .primary_class_name()?
            .to_string(),
        handling: params.handling,
        out_of_range_group: params.create_group_for_out_of_range_values,
        unspecified_group: params.create_group_for_unspecified_values,
        property: property.clone(),
    })
}

#[allow(clippy::cast_precision_loss)]
fn numeric(value: &PrimitiveValue) -> Option<f64> {
    match value {
        PrimitiveValue::Integer(number) => Some(*number as f64),
        PrimitiveValue::Double(number) => Some(*number),
        _ => None,
    }
}

fn is_unspecified(value: Option<&PrimitiveValue>) -> bool {
    match value {
        None => true,
        Some(PrimitiveValue::String(text)) => text.is_empty(),
        Some(_) => false,
    }
}

/// Groups nodes by the value of their `index`-th grouping property.
pub(super) async fn group(
    ctx: &GroupingContext<'_>,
    index: usize,
    nodes: Vec<LevelNode>,
    yielder: &mut CooperativeYield,
) -> Result<GroupingHandlerResult, HierarchyError> {
    let mut groups = GroupsBuilder::new(GroupingStage::Property(index));
    let mut ungrouped = Vec::new();

    for node in nodes {
        let Some(candidate) = candidate(&node, index) else {
            ungrouped.push(node);
            continue;
        };
        yielder.tick().await;
        if !ctx
            .metadata
            .class_derives_from(&candidate.runtime_class_name, &candidate.properties_class_name)
            .await?
        {
            ungrouped.push(node);
            continue;
        }

        let Candidate {
            properties_class_name,
            handling,
            out_of_range_group,
            unspecified_group,
            property,
            ..
        } = candidate;

        let Some(value) = property.property_value.filter(|value| !is_unspecified(Some(value)))
        else {
            if unspecified_group {
                groups.add(
                    HierarchyNodeKey::PropertyValueGrouping {
                        property_class_name: properties_class_name,
                        property_name: property.property_name,
                        formatted_property_value: String::new(),
                    },
                    || ctx.labels.unspecified.clone(),
                    handling,
                    node,
                );
            } else {
                ungrouped.push(node);
            }
            continue;
        };

        if property.ranges.is_empty() {
            let formatted = ctx
                .formatter
                .format(&TypedPrimitiveValue::new(value.clone(), value_type_of(&value)))
                .await;
            groups.add(
                HierarchyNodeKey::PropertyValueGrouping {
                    property_class_name: properties_class_name,
                    property_name: property.property_name,
                    formatted_property_value: formatted.clone(),
                },
                || formatted,
                handling,
                node,
            );
            continue;
        }

        let range = numeric(&value)
            .and_then(|number| property.ranges.iter().find(|range| range.contains(number)));
        match range {
            Some(range) => {
                let label = match &range.range_label {
                    Some(label) => label.clone(),
                    None => {
                        let from = TypedPrimitiveValue::new(
                            PrimitiveValue::Double(range.from_value),
                            PrimitiveValueType::Double,
                        );
                        let to = TypedPrimitiveValue::new(
                            PrimitiveValue::Double(range.to_value),
                            PrimitiveValueType::Double,
                        );
                        format!(
                            "{} - {}",
                            ctx.formatter.format(&from).await,
                            ctx.formatter.format(&to).await
                        )
                    }
                };
                groups.add(
                    HierarchyNodeKey::PropertyValueRangeGrouping {
                        property_class_name: properties_class_name,
                        property_name: property.property_name.clone(),
                        from_value: range.from_value,
                        to_value: range.to_value,
                    },
                    || label,
                    handling,
                    node,
                );
            }
            None if out_of_range_group => {
                groups.add(
                    HierarchyNodeKey::PropertyOtherValuesGrouping {
                        properties: vec![PropertyIdentifier {
                            class_name: properties_class_name,
                            property_name: property.property_name.clone(),
                        }],
                    },
                    || ctx.labels.other.clone(),
                    handling,
                    node,
                );
            }
            None => ungrouped.push(node),
        }
    }

    Ok(GroupingHandlerResult {
        grouped: groups.finish(),
        ungrouped,
    })
}
