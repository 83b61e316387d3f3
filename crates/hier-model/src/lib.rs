mod key;
mod node;
mod value;

pub use key::normalize_full_class_name;
pub use key::HierarchyNodeIdentifier;
pub use key::HierarchyNodeIdentifiersPath;
pub use key::HierarchyNodeKey;
pub use key::InstanceKey;
pub use key::PropertyIdentifier;
pub use node::GroupingNodeInfo;
pub use node::HierarchyNode;
pub use node::NodeChildren;
pub use node::NodeSearchInfo;
pub use value::ConcatenatedValue;
pub use value::ConcatenatedValuePart;
pub use value::NodeLabel;
pub use value::Point2d;
pub use value::Point3d;
pub use value::PrimitiveValue;
pub use value::PrimitiveValueType;
pub use value::PropertyValue;
pub use value::TypedPrimitiveValue;
