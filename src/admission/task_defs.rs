//! Task definition lookup for admission limits.

use dashmap::DashMap;

use crate::models::TaskDef;

/// Source of task definitions keyed by name
pub trait TaskDefLookup: Send + Sync {
    fn task_def(&self, name: &str) -> Option<TaskDef>;
}

/// In-process registry, usually seeded from `EventsConfig::task_defs`.
#[derive(Debug, Default)]
pub struct TaskDefRegistry {
    defs: DashMap<String, TaskDef>,
}

impl TaskDefRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_defs(defs: impl IntoIterator<Item = TaskDef>) -> Self {
        let registry = Self::new();
        for def in defs {
            registry.register(def);
        }
        registry
    }

    /// Insert or replace a definition, returning the previous one.
    pub fn register(&self, def: TaskDef) -> Option<TaskDef> {
        self.defs.insert(def.name.clone(), def)
    }

    pub fn remove(&self, name: &str) -> Option<TaskDef> {
        self.defs.remove(name).map(|(_, def)| def)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

impl TaskDefLookup for TaskDefRegistry {
    fn task_def(&self, name: &str) -> Option<TaskDef> {
        self.defs.get(name).map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_replaces_existing() {
        let registry = TaskDefRegistry::from_defs([TaskDef::new("http").with_concurrency_limit(1)]);
        let previous = registry.register(TaskDef::new("http").with_concurrency_limit(4));
        assert_eq!(previous.map(|d| d.concurrency_limit), Some(1));
        assert_eq!(registry.task_def("http").map(|d| d.concurrency_limit), Some(4));
        assert!(registry.task_def("missing").is_none());
        assert_eq!(registry.len(), 1);
    }
}
