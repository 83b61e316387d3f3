use std::fmt;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2d {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A raw primitive value as it comes out of a query row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimitiveValue {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    // 3d first, otherwise `{x, y, z}` would deserialize as a 2d point
    Point3d(Point3d),
    Point2d(Point2d),
    String(String),
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Double(value) => write!(f, "{value}"),
            Self::Point2d(Point2d { x, y }) => write!(f, "({x}, {y})"),
            Self::Point3d(Point3d { x, y, z }) => write!(f, "({x}, {y}, {z})"),
            Self::String(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveValueType {
    Boolean,
    DateTime,
    Double,
    Id,
    Integer,
    Long,
    Point2d,
    Point3d,
    String,
}

/// A primitive value together with the type information a formatter needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedPrimitiveValue {
    pub value: PrimitiveValue,
    #[serde(rename = "type")]
    pub value_type: PrimitiveValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind_of_quantity_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal_precision: Option<u32>,
}

impl TypedPrimitiveValue {
    #[must_use]
    pub fn new(value: PrimitiveValue, value_type: PrimitiveValueType) -> Self {
        Self {
            value,
            value_type,
            extended_type: None,
            kind_of_quantity_name: None,
            decimal_precision: None,
        }
    }
}

/// A value of a specific property, used in labels built from property values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyValue {
    pub class_name: String,
    pub property_name: String,
    pub value: PrimitiveValue,
    #[serde(rename = "type")]
    pub value_type: PrimitiveValueType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConcatenatedValuePart {
    Text(String),
    Nested(ConcatenatedValue),
    Property(PropertyValue),
    Typed(TypedPrimitiveValue),
}

/// An ordered list of label parts, rendered by concatenating every part.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConcatenatedValue(pub Vec<ConcatenatedValuePart>);

impl ConcatenatedValue {
    #[must_use]
    pub fn parts(&self) -> &[ConcatenatedValuePart] {
        &self.0
    }
}

impl fmt::Display for ConcatenatedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.0 {
            match part {
                ConcatenatedValuePart::Text(text) => f.write_str(text)?,
                ConcatenatedValuePart::Nested(nested) => write!(f, "{nested}")?,
                ConcatenatedValuePart::Property(property) => write!(f, "{}", property.value)?,
                ConcatenatedValuePart::Typed(typed) => write!(f, "{}", typed.value)?,
            }
        }
        Ok(())
    }
}

/// Label of a node before formatting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeLabel {
    Text(String),
    Concatenated(ConcatenatedValue),
}

impl NodeLabel {
    /// Render the label without a formatter. Used wherever labels are compared
    /// before the formatting stage runs.
    #[must_use]
    pub fn default_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Concatenated(value) => value.to_string(),
        }
    }
}

impl From<&str> for NodeLabel {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for NodeLabel {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}
