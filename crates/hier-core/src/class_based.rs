//! A [`HierarchyDefinition`] dispatching child levels on the parent's class.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use hier_model::HierarchyNode;
use hier_model::HierarchyNodeKey;
use hier_model::InstanceKey;
use hier_query::ClassHierarchyInspector;
use rustc_hash::FxHashSet;

use crate::HierarchyDefinition;
use crate::HierarchyError;
use crate::HierarchyLevelDefinition;

type LevelFuture = BoxFuture<'static, Result<Vec<HierarchyLevelDefinition>, HierarchyError>>;
type RootNodesFn = dyn Fn() -> LevelFuture + Send + Sync;
type InstancesChildNodesFn = dyn Fn(InstancesChildNodesProps) -> LevelFuture + Send + Sync;
type CustomChildNodesFn = dyn Fn(CustomChildNodesProps) -> LevelFuture + Send + Sync;

#[derive(Debug, Clone)]
pub struct InstancesChildNodesProps {
    pub parent_node: HierarchyNode,
    /// The class the rule was registered for, not the runtime class.
    pub parent_node_class_name: String,
    /// Ids of every parent instance whose class matched the rule.
    pub parent_node_instance_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CustomChildNodesProps {
    pub parent_node: HierarchyNode,
}

enum ChildNodesRule {
    Instances {
        parent_class_name: String,
        only_if_not_handled: bool,
        definitions: Arc<InstancesChildNodesFn>,
    },
    Custom {
        parent_key: String,
        definitions: Arc<CustomChildNodesFn>,
    },
}

pub struct ClassBasedHierarchyDefinition {
    classes: Arc<dyn ClassHierarchyInspector>,
    root_nodes: Option<Arc<RootNodesFn>>,
    rules: Vec<ChildNodesRule>,
}

impl ClassBasedHierarchyDefinition {
    pub fn new(classes: Arc<dyn ClassHierarchyInspector>) -> Self {
        Self {
            classes,
            root_nodes: None,
            rules: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_root_nodes<F, Fut>(mut self, definitions: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<HierarchyLevelDefinition>, HierarchyError>> + Send + 'static,
    {
        self.root_nodes = Some(Arc::new(move || definitions().boxed()));
        self
    }

    /// Children of instance nodes whose class is, or derives from,
    /// `parent_class_name`.
    #[must_use]
    pub fn with_instances_child_nodes<F, Fut>(
        self,
        parent_class_name: impl Into<String>,
        definitions: F,
    ) -> Self
    where
        F: Fn(InstancesChildNodesProps) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<HierarchyLevelDefinition>, HierarchyError>> + Send + 'static,
    {
        self.with_instances_rule(parent_class_name.into(), false, definitions)
    }

    /// Like [`Self::with_instances_child_nodes`], but skipped for parent
    /// instances an earlier regular rule already matched.
    #[must_use]
    pub fn with_instances_child_nodes_if_not_handled<F, Fut>(
        self,
        parent_class_name: impl Into<String>,
        definitions: F,
    ) -> Self
    where
        F: Fn(InstancesChildNodesProps) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<HierarchyLevelDefinition>, HierarchyError>> + Send + 'static,
    {
        self.with_instances_rule(parent_class_name.into(), true, definitions)
    }

    fn with_instances_rule<F, Fut>(
        mut self,
        parent_class_name: String,
        only_if_not_handled: bool,
        definitions: F,
    ) -> Self
    where
        F: Fn(InstancesChildNodesProps) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<HierarchyLevelDefinition>, HierarchyError>> + Send + 'static,
    {
        self.rules.push(ChildNodesRule::Instances {
            parent_class_name,
            only_if_not_handled,
            definitions: Arc::new(move |props| definitions(props).boxed()),
        });
        self
    }

    /// Children of generic nodes with the given id.
    #[must_use]
    pub fn with_custom_child_nodes<F, Fut>(mut self, parent_key: impl Into<String>, definitions: F) -> Self
    where
        F: Fn(CustomChildNodesProps) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<HierarchyLevelDefinition>, HierarchyError>> + Send + 'static,
    {
        self.rules.push(ChildNodesRule::Custom {
            parent_key: parent_key.into(),
            definitions: Arc::new(move |props| definitions(props).boxed()),
        });
        self
    }

    async fn define_custom_children(
        &self,
        parent_node: &HierarchyNode,
        id: &str,
    ) -> Result<Vec<HierarchyLevelDefinition>, HierarchyError> {
        let mut result = Vec::new();
        for rule in &self.rules {
            if let ChildNodesRule::Custom {
                parent_key,
                definitions,
            } = rule
            {
                if parent_key == id {
                    result.extend(
                        definitions(CustomChildNodesProps {
                            parent_node: parent_node.clone(),
                        })
                        .await?,
                    );
                }
            }
        }
        Ok(result)
    }

    async fn define_instances_children(
        &self,
        parent_node: &HierarchyNode,
        instance_keys: &[InstanceKey],
    ) -> Result<Vec<HierarchyLevelDefinition>, HierarchyError> {
        let runtime_classes = group_by_class(instance_keys);
        let mut handled = FxHashSet::default();
        let mut result = Vec::new();

        for rule in &self.rules {
            let ChildNodesRule::Instances {
                parent_class_name,
                only_if_not_handled,
                definitions,
            } = rule
            else {
                continue;
            };

            let mut matched = Vec::new();
            let mut ids = Vec::new();
            for (index, (class_name, class_ids)) in runtime_classes.iter().enumerate() {
                if *only_if_not_handled && handled.contains(&index) {
                    continue;
                }
                if self
                    .classes
                    .class_derives_from(class_name, parent_class_name)
                    .await?
                {
                    matched.push(index);
                    ids.extend(class_ids.iter().cloned());
                }
            }
            if !only_if_not_handled {
                handled.extend(matched);
            }
            if ids.is_empty() {
                continue;
            }

            tracing::trace!(
                parent_class_name = %parent_class_name,
                instances = ids.len(),
                "Applying child nodes rule"
            );
            result.extend(
                definitions(InstancesChildNodesProps {
                    parent_node: parent_node.clone(),
                    parent_node_class_name: parent_class_name.clone(),
                    parent_node_instance_ids: ids,
                })
                .await?,
            );
        }
        Ok(result)
    }
}

/// Instance ids grouped by their class, in first-seen order.
fn group_by_class(instance_keys: &[InstanceKey]) -> Vec<(&str, Vec<String>)> {
    let mut groups: Vec<(&str, Vec<String>)> = Vec::new();
    for key in instance_keys {
        match groups
            .iter_mut()
            .find(|(class_name, _)| key.has_class(class_name))
        {
            Some((_, ids)) => ids.push(key.id.clone()),
            None => groups.push((key.class_name.as_str(), vec![key.id.clone()])),
        }
    }
    groups
}

#[async_trait]
impl HierarchyDefinition for ClassBasedHierarchyDefinition {
    async fn define_hierarchy_level(
        &self,
        parent_node: Option<&HierarchyNode>,
    ) -> Result<Vec<HierarchyLevelDefinition>, HierarchyError> {
        let Some(parent_node) = parent_node else {
            return match &self.root_nodes {
                Some(root_nodes) => root_nodes().await,
                None => Ok(Vec::new()),
            };
        };

        match &parent_node.key {
            HierarchyNodeKey::Generic { id, .. } => {
                self.define_custom_children(parent_node, id).await
            }
            HierarchyNodeKey::Instances { instance_keys } => {
                self.define_instances_children(parent_node, instance_keys)
                    .await
            }
            _ => Ok(Vec::new()),
        }
    }
}
