//! Component registry and dependency graph.
//!
//! The graph is static: every component declares its dependencies when it
//! is registered, and the whole graph is validated once at startup. A cycle
//! or a dangling dependency is a configuration error, not something an
//! individual audit can hit.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;

use crate::components::Component;
use crate::domain::ComponentKey;

/// Invalid registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Component registered twice: {0}")]
    Duplicate(ComponentKey),

    #[error("Component '{component}' depends on unregistered component '{dependency}'")]
    UnknownDependency {
        component: ComponentKey,
        dependency: ComponentKey,
    },

    #[error("Dependency cycle: {}", format_path(.0))]
    Cycle(Vec<ComponentKey>),
}

fn format_path(path: &[ComponentKey]) -> String {
    path.iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Keys and their declared dependencies
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Registration order
    nodes: Vec<ComponentKey>,
    edges: HashMap<ComponentKey, Vec<ComponentKey>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with its dependencies
    pub fn register(
        &mut self,
        key: ComponentKey,
        dependencies: &[ComponentKey],
    ) -> Result<(), RegistryError> {
        if self.edges.contains_key(&key) {
            return Err(RegistryError::Duplicate(key));
        }
        self.nodes.push(key);
        self.edges.insert(key, dependencies.to_vec());
        Ok(())
    }

    pub fn contains(&self, key: ComponentKey) -> bool {
        self.edges.contains_key(&key)
    }

    /// Registered keys in registration order
    pub fn keys(&self) -> &[ComponentKey] {
        &self.nodes
    }

    /// Declared dependencies of `key` (empty if unregistered)
    pub fn dependencies(&self, key: ComponentKey) -> &[ComponentKey] {
        self.edges.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Components that declare a dependency on `key`
    pub fn dependents(&self, key: ComponentKey) -> Vec<ComponentKey> {
        self.nodes
            .iter()
            .copied()
            .filter(|node| self.dependencies(*node).contains(&key))
            .collect()
    }

    /// Check that every dependency is registered and the graph is acyclic
    pub fn validate(&self) -> Result<(), RegistryError> {
        for node in &self.nodes {
            for dep in self.dependencies(*node) {
                if !self.contains(*dep) {
                    return Err(RegistryError::UnknownDependency {
                        component: *node,
                        dependency: *dep,
                    });
                }
            }
        }

        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            InProgress,
            Done,
        }

        fn visit(
            graph: &DependencyGraph,
            key: ComponentKey,
            marks: &mut HashMap<ComponentKey, Mark>,
            path: &mut Vec<ComponentKey>,
        ) -> Result<(), RegistryError> {
            match marks.get(&key) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::InProgress) => {
                    let start = path.iter().position(|k| *k == key).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(key);
                    return Err(RegistryError::Cycle(cycle));
                }
                None => {}
            }

            marks.insert(key, Mark::InProgress);
            path.push(key);
            for dep in graph.dependencies(key) {
                visit(graph, *dep, marks, path)?;
            }
            path.pop();
            marks.insert(key, Mark::Done);
            Ok(())
        }

        let mut marks = HashMap::new();
        let mut path = Vec::new();
        for node in &self.nodes {
            visit(self, *node, &mut marks, &mut path)?;
        }
        Ok(())
    }

    /// Topological order of `keys`.
    ///
    /// Dependencies are visited before the node that needs them, and each
    /// requested key appears exactly once. Dependencies outside the request
    /// are traversed (so transitive ordering holds) but not emitted.
    pub fn order(&self, keys: &[ComponentKey]) -> Vec<ComponentKey> {
        let requested: HashSet<ComponentKey> = keys.iter().copied().collect();
        let mut visited = HashSet::new();
        let mut ordered = Vec::with_capacity(requested.len());

        fn visit(
            graph: &DependencyGraph,
            key: ComponentKey,
            requested: &HashSet<ComponentKey>,
            visited: &mut HashSet<ComponentKey>,
            ordered: &mut Vec<ComponentKey>,
        ) {
            // Marked before recursing so a cycle cannot loop forever
            if !visited.insert(key) {
                return;
            }
            for dep in graph.dependencies(key) {
                visit(graph, *dep, requested, visited, ordered);
            }
            if requested.contains(&key) {
                ordered.push(key);
            }
        }

        for key in keys {
            visit(self, *key, &requested, &mut visited, &mut ordered);
        }
        ordered
    }

    /// Members of `pending` whose dependencies are all in `completed`
    pub fn ready(
        &self,
        pending: &[ComponentKey],
        completed: &HashSet<ComponentKey>,
    ) -> Vec<ComponentKey> {
        pending
            .iter()
            .copied()
            .filter(|key| self.is_ready(*key, completed))
            .collect()
    }

    pub fn is_ready(&self, key: ComponentKey, completed: &HashSet<ComponentKey>) -> bool {
        self.dependencies(key).iter().all(|dep| completed.contains(dep))
    }
}

/// Registered component implementations plus their dependency graph
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    graph: DependencyGraph,
    components: HashMap<ComponentKey, Arc<dyn Component>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every component and validate the resulting graph
    pub fn build(
        components: impl IntoIterator<Item = Arc<dyn Component>>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for component in components {
            registry.register(component)?;
        }
        registry.graph.validate()?;
        Ok(registry)
    }

    /// Register one component; call [`DependencyGraph::validate`] afterwards
    pub fn register(&mut self, component: Arc<dyn Component>) -> Result<(), RegistryError> {
        let key = component.key();
        self.graph.register(key, component.dependencies())?;
        self.components.insert(key, component);
        Ok(())
    }

    pub fn get(&self, key: ComponentKey) -> Option<&Arc<dyn Component>> {
        self.components.get(&key)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn keys(&self) -> &[ComponentKey] {
        self.graph.keys()
    }

    pub fn order(&self, keys: &[ComponentKey]) -> Vec<ComponentKey> {
        self.graph.order(keys)
    }

    pub fn ready(
        &self,
        pending: &[ComponentKey],
        completed: &HashSet<ComponentKey>,
    ) -> Vec<ComponentKey> {
        self.graph.ready(pending, completed)
    }
}
