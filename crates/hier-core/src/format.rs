use async_trait::async_trait;
use hier_model::ConcatenatedValue;
use hier_model::ConcatenatedValuePart;
use hier_model::NodeLabel;
use hier_model::Point2d;
use hier_model::Point3d;
use hier_model::PrimitiveValue;
use hier_model::PrimitiveValueType;
use hier_model::TypedPrimitiveValue;

/// Renders typed values in node labels.
#[async_trait]
pub trait ValueFormatter: Send + Sync {
    async fn format(&self, value: &TypedPrimitiveValue) -> String;
}

/// Locale-independent formatting: doubles and point coordinates get two
/// decimals unless the value says otherwise, everything else is rendered as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValueFormatter;

impl DefaultValueFormatter {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn format_value(value: &TypedPrimitiveValue) -> String {
        let precision = value.decimal_precision.unwrap_or(2) as usize;
        match (&value.value, value.value_type) {
            (PrimitiveValue::Double(number), _) => format!("{number:.precision$}"),
            (PrimitiveValue::Integer(number), PrimitiveValueType::Double) => {
                format!("{:.precision$}", *number as f64)
            }
            (PrimitiveValue::Point2d(Point2d { x, y }), _) => {
                format!("({x:.precision$}, {y:.precision$})")
            }
            (PrimitiveValue::Point3d(Point3d { x, y, z }), _) => {
                format!("({x:.precision$}, {y:.precision$}, {z:.precision$})")
            }
            (other, _) => other.to_string(),
        }
    }
}

#[async_trait]
impl ValueFormatter for DefaultValueFormatter {
    async fn format(&self, value: &TypedPrimitiveValue) -> String {
        Self::format_value(value)
    }
}

pub async fn format_label(formatter: &dyn ValueFormatter, label: &NodeLabel) -> String {
    match label {
        NodeLabel::Text(text) => text.clone(),
        NodeLabel::Concatenated(value) => format_concatenated_value(formatter, value).await,
    }
}

pub async fn format_concatenated_value(
    formatter: &dyn ValueFormatter,
    value: &ConcatenatedValue,
) -> String {
    let mut result = String::new();
    let mut stack = vec![value.parts().iter()];
    while let Some(parts) = stack.last_mut() {
        let Some(part) = parts.next() else {
            stack.pop();
            continue;
        };
        match part {
            ConcatenatedValuePart::Text(text) => result.push_str(text),
            ConcatenatedValuePart::Nested(nested) => stack.push(nested.parts().iter()),
            ConcatenatedValuePart::Property(property) => {
                let typed = TypedPrimitiveValue::new(property.value.clone(), property.value_type);
                result.push_str(&formatter.format(&typed).await);
            }
            ConcatenatedValuePart::Typed(typed) => {
                result.push_str(&formatter.format(typed).await);
            }
        }
    }
    result
}

/// Best-guess type of a raw value.
pub(crate) fn value_type_of(value: &PrimitiveValue) -> PrimitiveValueType {
    match value {
        PrimitiveValue::Boolean(_) => PrimitiveValueType::Boolean,
        PrimitiveValue::Integer(_) => PrimitiveValueType::Integer,
        PrimitiveValue::Double(_) => PrimitiveValueType::Double,
        PrimitiveValue::Point2d(_) => PrimitiveValueType::Point2d,
        PrimitiveValue::Point3d(_) => PrimitiveValueType::Point3d,
        PrimitiveValue::String(_) => PrimitiveValueType::String,
    }
}
