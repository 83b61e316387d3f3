mod ecsql;
mod executor;
mod limiting;
mod metadata;
mod metadata_cache;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use ecsql::EcsqlBinding;
pub use ecsql::EcsqlQueryDef;
pub use ecsql::RowLimit;
pub use executor::QueryError;
pub use executor::QueryExecutor;
pub use executor::QueryReaderOptions;
pub use executor::Row;
pub use executor::RowStream;
pub use limiting::LimitingExecutor;
pub use limiting::LimitingQueryExecutor;
pub use metadata::class_derives_from;
pub use metadata::get_class;
pub use metadata::parse_full_class_name;
pub use metadata::ClassHierarchyInspector;
pub use metadata::ClassKind;
pub use metadata::EcClass;
pub use metadata::EcSchema;
pub use metadata::InMemoryMetadataProvider;
pub use metadata::MetadataError;
pub use metadata::MetadataProvider;
pub use metadata_cache::CachedMetadataProvider;
