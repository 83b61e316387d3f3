mod cache;
mod class_based;
mod collect;
mod definition;
mod error;
mod format;
mod grouping;
mod hide;
mod level;
mod merge;
mod merging;
mod params;
mod parser;
mod provider;
mod query_provider;
mod search;
mod select;
mod sort;
mod source;

pub use class_based::ClassBasedHierarchyDefinition;
pub use class_based::CustomChildNodesProps;
pub use class_based::InstancesChildNodesProps;
pub use collect::collect_hierarchy;
pub use definition::GenericNodeDefinition;
pub use definition::HierarchyDefinition;
pub use definition::HierarchyLevelDefinition;
pub use definition::InstanceNodesQueryDefinition;
pub use error::HierarchyError;
pub use error::NodeParseError;
pub use format::format_concatenated_value;
pub use format::format_label;
pub use format::DefaultValueFormatter;
pub use format::ValueFormatter;
pub use merging::merge_providers;
pub use merging::MergedHierarchyProvider;
pub use params::AutoExpand;
pub use params::BaseClassGroupingParams;
pub use params::ClassGroupingParams;
pub use params::GroupHandling;
pub use params::GroupingParams;
pub use params::LabelGroupingParams;
pub use params::ProcessingParams;
pub use params::PropertiesGroupingParams;
pub use params::PropertyGroup;
pub use params::PropertyRange;
pub use parser::parse_node_row;
pub use parser::NodeColumn;
pub use provider::GetNodesProps;
pub use provider::HierarchyProvider;
pub use provider::InstanceKeyStream;
pub use provider::NodeStream;
pub use query_provider::ProviderSettings;
pub use query_provider::QueryHierarchyProvider;
pub use search::HierarchySearch;
pub use select::NodeSelectClauseFactory;
pub use select::NodeSelectClauseProps;
pub use select::SelectExpr;
pub use sort::compare_labels;
pub use sort::sort_by_label;
pub use source::SourceNode;
pub use source::SourceNodeKey;
