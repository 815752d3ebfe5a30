//! Agent type registry (spec §4.3): a factory over static definitions,
//! grounded in the internal-agent-type pattern quick-query-rs uses for its
//! built-in agents.

use std::collections::HashMap;

use super::model::{AgentConfig, ResourceLimits};

/// A static record describing one agent type, registered once at startup
/// and looked up by name when spawning (spec §3).
#[derive(Debug, Clone)]
pub struct AgentTypeDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub prompt_addendum: &'static str,
    pub default_tools: Option<Vec<String>>,
    pub default_limits: ResourceLimits,
    pub default_model: Option<String>,
}

impl AgentTypeDefinition {
    pub fn default_config(&self) -> AgentConfig {
        AgentConfig {
            agent_type: self.name.to_string(),
            description: self.description.to_string(),
            prompt_addendum: self.prompt_addendum.to_string(),
            tools: self.default_tools.clone(),
            inherit_context: false,
            limits: self.default_limits,
            model: self.default_model.clone(),
        }
    }
}

fn explore() -> AgentTypeDefinition {
    AgentTypeDefinition {
        name: "explore",
        description: "Reads and summarizes code or data without making changes",
        prompt_addendum: "Investigate the codebase to answer the task. Do not modify any files.",
        default_tools: Some(vec!["bash".into(), "bash_output".into()]),
        default_limits: ResourceLimits {
            max_iterations: 15,
            ..ResourceLimits::default()
        },
        default_model: None,
    }
}

fn plan() -> AgentTypeDefinition {
    AgentTypeDefinition {
        name: "plan",
        description: "Produces a step-by-step plan for a task without executing it",
        prompt_addendum: "Produce a concrete, ordered plan. Do not execute the plan yourself.",
        default_tools: Some(vec!["bash".into(), "bash_output".into()]),
        default_limits: ResourceLimits {
            max_iterations: 10,
            ..ResourceLimits::default()
        },
        default_model: None,
    }
}

fn code_review() -> AgentTypeDefinition {
    AgentTypeDefinition {
        name: "code-review",
        description: "Reviews a diff or a set of files for defects",
        prompt_addendum: "Review the specified change for correctness, security, and style issues.",
        default_tools: Some(vec!["bash".into(), "bash_output".into()]),
        default_limits: ResourceLimits::default(),
        default_model: None,
    }
}

fn general() -> AgentTypeDefinition {
    AgentTypeDefinition {
        name: "general",
        description: "General-purpose agent with access to every registered tool",
        prompt_addendum: "Complete the task using any tools available to you.",
        default_tools: None,
        default_limits: ResourceLimits::default(),
        default_model: None,
    }
}

/// Name-keyed set of agent type definitions. Unknown names fall back to
/// `general` (spec §4.3).
pub struct AgentTypeRegistry {
    types: HashMap<&'static str, AgentTypeDefinition>,
}

impl Default for AgentTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentTypeRegistry {
    pub fn new() -> Self {
        let mut types = HashMap::new();
        for def in [explore(), plan(), code_review(), general()] {
            types.insert(def.name, def);
        }
        Self { types }
    }

    /// Resolves `name` to its definition, falling back to `general` for any
    /// unrecognized type name.
    pub fn resolve(&self, name: &str) -> &AgentTypeDefinition {
        self.types
            .get(name)
            .unwrap_or_else(|| self.types.get("general").expect("general agent type always registered"))
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.types.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_falls_back_to_general() {
        let registry = AgentTypeRegistry::new();
        assert_eq!(registry.resolve("nonexistent").name, "general");
    }

    #[test]
    fn known_types_resolve_to_themselves() {
        let registry = AgentTypeRegistry::new();
        for name in ["explore", "plan", "code-review", "general"] {
            assert_eq!(registry.resolve(name).name, name);
        }
    }
}
