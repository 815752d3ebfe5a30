//! Process-wide, name-keyed tool registry (spec §4.1).
//!
//! Semantically a singleton, but constructed as an ordinary value: callers
//! build one `ToolRegistry` at process start and thread it through contexts
//! explicitly rather than reaching for a `static`. Lookups are O(1); reads
//! never block on a lock because registration only happens at startup.

use std::collections::HashMap;
use std::sync::Arc;

use super::descriptor::ToolCategory;
use super::error::ToolError;
use super::Tool;

/// Name-keyed collection of tools, with category lookup.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Preserves registration order for deterministic schema projection and
    /// agent tool-filtering (spec §4.3 "preserving registration order").
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails if a tool with the same name already exists.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.descriptor().name.clone();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateName(name));
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn deregister(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.order.retain(|n| n != name);
        self.tools.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tools in registration order.
    pub fn list_all(&self) -> Vec<Arc<dyn Tool>> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).cloned())
            .collect()
    }

    pub fn list_by_category(&self, category: ToolCategory) -> Vec<Arc<dyn Tool>> {
        self.list_all()
            .into_iter()
            .filter(|t| t.descriptor().category == category)
            .collect()
    }

    pub fn clear(&mut self) {
        self.tools.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
