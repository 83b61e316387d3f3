use std::cmp::Ordering;
use std::hash::Hash;
use std::hash::Hasher;

use serde::Deserialize;
use serde::Serialize;

fn normalized_chars(full_class_name: &str) -> impl Iterator<Item = char> + '_ {
    full_class_name.chars().map(|c| match c {
        ':' => '.',
        c => c.to_ascii_lowercase(),
    })
}

/// Normalize a schema-qualified class name so that `BisCore:Element` and
/// `biscore.element` compare equal.
#[must_use]
pub fn normalize_full_class_name(full_class_name: &str) -> String {
    normalized_chars(full_class_name).collect()
}

/// Identity of a single database instance.
///
/// Class names are compared after normalization, so keys produced by
/// different query projections (`Schema:Class` vs `Schema.Class`) are equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceKey {
    pub class_name: String,
    pub id: String,
}

impl InstanceKey {
    pub fn new(class_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub fn has_class(&self, full_class_name: &str) -> bool {
        normalized_chars(&self.class_name).eq(normalized_chars(full_class_name))
    }
}

impl PartialEq for InstanceKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.has_class(&other.class_name)
    }
}

impl Eq for InstanceKey {}

impl Hash for InstanceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in normalized_chars(&self.class_name) {
            c.hash(state);
        }
        self.id.hash(state);
    }
}

impl PartialOrd for InstanceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InstanceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        normalized_chars(&self.class_name)
            .cmp(normalized_chars(&other.class_name))
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyIdentifier {
    pub class_name: String,
    pub property_name: String,
}

/// Key of a hierarchy node. The variant never changes once a node is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum HierarchyNodeKey {
    /// One or more instances represented by a single node.
    Instances { instance_keys: Vec<InstanceKey> },
    /// A custom node that doesn't represent any instance.
    Generic {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    ClassGrouping { class_name: String },
    LabelGrouping {
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group_id: Option<String>,
    },
    PropertyValueGrouping {
        property_class_name: String,
        property_name: String,
        formatted_property_value: String,
    },
    PropertyValueRangeGrouping {
        property_class_name: String,
        property_name: String,
        from_value: f64,
        to_value: f64,
    },
    PropertyOtherValuesGrouping { properties: Vec<PropertyIdentifier> },
}

impl HierarchyNodeKey {
    pub fn generic(id: impl Into<String>) -> Self {
        Self::Generic {
            id: id.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn instances(instance_keys: Vec<InstanceKey>) -> Self {
        Self::Instances { instance_keys }
    }

    #[must_use]
    pub fn is_instances(&self) -> bool {
        matches!(self, Self::Instances { .. })
    }

    #[must_use]
    pub fn is_generic(&self) -> bool {
        matches!(self, Self::Generic { .. })
    }

    #[must_use]
    pub fn is_grouping(&self) -> bool {
        !self.is_instances() && !self.is_generic()
    }

    #[must_use]
    pub fn is_class_grouping(&self) -> bool {
        matches!(self, Self::ClassGrouping { .. })
    }

    /// Instance keys carried directly by this key. Empty for non-instance keys.
    #[must_use]
    pub fn instance_keys(&self) -> &[InstanceKey] {
        match self {
            Self::Instances { instance_keys } => instance_keys,
            _ => &[],
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Instances { .. } => "instances",
            Self::Generic { .. } => "generic",
            Self::ClassGrouping { .. } => "class-grouping",
            Self::LabelGrouping { .. } => "label-grouping",
            Self::PropertyValueGrouping { .. } => "property-grouping:value",
            Self::PropertyValueRangeGrouping { .. } => "property-grouping:range",
            Self::PropertyOtherValuesGrouping { .. } => "property-grouping:other",
        }
    }
}

/// Identifies a non-grouping node in hierarchy search paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HierarchyNodeIdentifier {
    Instance(InstanceKey),
    Generic {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
}

pub type HierarchyNodeIdentifiersPath = Vec<HierarchyNodeIdentifier>;

impl HierarchyNodeIdentifier {
    pub fn generic(id: impl Into<String>) -> Self {
        Self::Generic {
            id: id.into(),
            source: None,
        }
    }

    /// Whether a node with the given key is identified by this identifier. A
    /// generic identifier without a source matches generic keys from any source.
    #[must_use]
    pub fn matches_key(&self, key: &HierarchyNodeKey) -> bool {
        match (self, key) {
            (Self::Instance(instance), HierarchyNodeKey::Instances { instance_keys }) => {
                instance_keys.contains(instance)
            }
            (
                Self::Generic { id, source },
                HierarchyNodeKey::Generic {
                    id: key_id,
                    source: key_source,
                },
            ) => id == key_id && (source.is_none() || source == key_source),
            _ => false,
        }
    }
}

impl From<InstanceKey> for HierarchyNodeIdentifier {
    fn from(key: InstanceKey) -> Self {
        Self::Instance(key)
    }
}
