use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::future::Shared;
use futures::FutureExt;
use hier_model::normalize_full_class_name;

use crate::metadata::class_derives_from;
use crate::ClassHierarchyInspector;
use crate::EcSchema;
use crate::MetadataError;
use crate::MetadataProvider;

type SharedLookup<T> = Shared<BoxFuture<'static, Result<T, MetadataError>>>;

struct CacheInner {
    source: Arc<dyn MetadataProvider>,
    schemas: DashMap<String, SharedLookup<Option<Arc<EcSchema>>>>,
    derives: DashMap<(String, String), SharedLookup<bool>>,
}

/// Memoizing wrapper around a [`MetadataProvider`].
///
/// Concurrent lookups of the same schema or the same class pair share one
/// in-flight request. Successful results are kept for the lifetime of the
/// cache; failed lookups are evicted so a later call can retry.
#[derive(Clone)]
pub struct CachedMetadataProvider {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for CachedMetadataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedMetadataProvider")
            .field("schemas", &self.inner.schemas.len())
            .field("derives", &self.inner.derives.len())
            .finish()
    }
}

impl CachedMetadataProvider {
    pub fn new(source: Arc<dyn MetadataProvider>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                source,
                schemas: DashMap::new(),
                derives: DashMap::new(),
            }),
        }
    }
}

#[async_trait]
impl MetadataProvider for CachedMetadataProvider {
    async fn get_schema(&self, schema_name: &str) -> Result<Option<Arc<EcSchema>>, MetadataError> {
        let key = schema_name.to_ascii_lowercase();
        let lookup = self
            .inner
            .schemas
            .entry(key.clone())
            .or_insert_with(|| {
                tracing::trace!(schema_name, "Resolving schema");
                let source = self.inner.source.clone();
                let schema_name = schema_name.to_string();
                async move { source.get_schema(&schema_name).await }
                    .boxed()
                    .shared()
            })
            .clone();

        let result = lookup.await;
        if result.is_err() {
            self.inner.schemas.remove(&key);
        }
        result
    }
}

#[async_trait]
impl ClassHierarchyInspector for CachedMetadataProvider {
    async fn class_derives_from(
        &self,
        derived_full_class_name: &str,
        base_full_class_name: &str,
    ) -> Result<bool, MetadataError> {
        let key = (
            normalize_full_class_name(derived_full_class_name),
            normalize_full_class_name(base_full_class_name),
        );
        let lookup = self
            .inner
            .derives
            .entry(key.clone())
            .or_insert_with(|| {
                let this = self.clone();
                let derived = derived_full_class_name.to_string();
                let base = base_full_class_name.to_string();
                async move { class_derives_from(&this, &derived, &base).await }
                    .boxed()
                    .shared()
            })
            .clone();

        let result = lookup.await;
        if result.is_err() {
            self.inner.derives.remove(&key);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::ClassKind;
    use crate::EcClass;
    use crate::InMemoryMetadataProvider;

    struct CountingMetadata {
        inner: InMemoryMetadataProvider,
        lookups: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl MetadataProvider for CountingMetadata {
        async fn get_schema(
            &self,
            schema_name: &str,
        ) -> Result<Option<Arc<EcSchema>>, MetadataError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail {
                return Err(MetadataError::Backend("offline".to_string()));
            }
            self.inner.get_schema(schema_name).await
        }
    }

    fn counting(fail: bool) -> Arc<CountingMetadata> {
        Arc::new(CountingMetadata {
            inner: InMemoryMetadataProvider::new().with_schema(
                EcSchema::new("S")
                    .with_class(EcClass::new("A", ClassKind::Entity))
                    .with_class(EcClass::new("B", ClassKind::Entity).with_base_class("S.A")),
            ),
            lookups: AtomicUsize::new(0),
            fail,
        })
    }

    #[tokio::test]
    async fn test_concurrent_lookups_are_coalesced() {
        let source = counting(false);
        let cache = CachedMetadataProvider::new(source.clone());

        let (a, b, c) = tokio::join!(
            cache.get_schema("S"),
            cache.get_schema("s"),
            cache.get_schema("S"),
        );
        assert!(a.unwrap().is_some());
        assert!(b.unwrap().is_some());
        assert!(c.unwrap().is_some());
        assert_eq!(source.lookups.load(Ordering::SeqCst), 1);

        cache.get_schema("S").await.unwrap();
        assert_eq!(source.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_derives_from_is_cached() {
        let source = counting(false);
        let cache = CachedMetadataProvider::new(source.clone());

        assert!(cache.class_derives_from("S.B", "S.A").await.unwrap());
        assert!(cache.class_derives_from("s:b", "s:a").await.unwrap());
        assert!(!cache.class_derives_from("S.A", "S.B").await.unwrap());
        assert_eq!(source.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_lookups_are_evicted() {
        let source = counting(true);
        let cache = CachedMetadataProvider::new(source.clone());

        assert!(cache.get_schema("S").await.is_err());
        assert!(cache.get_schema("S").await.is_err());
        assert_eq!(source.lookups.load(Ordering::SeqCst), 2);
    }
}
