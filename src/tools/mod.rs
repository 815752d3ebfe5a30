//! Concrete tool bodies: the shell manager's LLM-facing surface (spec §4.2).
//!
//! Every tool here implements `crate::tool::Tool`; registration into a
//! `ToolRegistry` happens at the call site (agent executor or REPL), not in
//! this module.

mod bash;
mod bash_output;
mod kill_shell;

pub use bash::BashTool;
pub use bash_output::BashOutputTool;
pub use kill_shell::KillShellTool;

use std::sync::Arc;

use crate::shell::ShellManager;
use crate::tool::ToolRegistry;

/// Builds a `ToolRegistry` carrying the shell-backed tools, all sharing one
/// `ShellManager` so background shells started by `bash` are visible to
/// `bash_output` and `kill_shell`.
pub fn standard_registry(shells: Arc<ShellManager>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry
        .register(Arc::new(BashTool::new(shells.clone())))
        .expect("bash registers once");
    registry
        .register(Arc::new(BashOutputTool::new(shells.clone())))
        .expect("bash_output registers once");
    registry
        .register(Arc::new(KillShellTool::new(shells)))
        .expect("kill_shell registers once");
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_has_all_three_tools() {
        let registry = standard_registry(Arc::new(ShellManager::new()));
        assert!(registry.exists("bash"));
        assert!(registry.exists("bash_output"));
        assert!(registry.exists("kill_shell"));
        assert_eq!(registry.len(), 3);
    }
}
