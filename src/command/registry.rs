//! Command registry and the `Command`/`SubcommandHandler` contracts
//! (spec §4.5).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use super::parser::ParsedCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCategory {
    General,
    Session,
    Context,
    Control,
    Config,
    Debug,
}

/// The outcome of running a command (spec §6): `data.action` may request
/// `"exit"` or `"stop"` from the REPL driving this dispatcher.
#[derive(Debug, Clone, Default)]
pub struct CommandResult {
    pub ok: bool,
    pub message: String,
    pub action: Option<String>,
    pub data: Option<Value>,
}

impl CommandResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            action: None,
            data: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            action: None,
            data: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

/// Capabilities a command body may reach for, named rather than global
/// (spec §4.5): the session manager, configuration, LLM client, REPL print
/// callback, and agent manager live behind this context instead of statics.
#[derive(Default)]
pub struct CommandContext {
    pub agent_manager: Option<Arc<crate::agent::AgentManager>>,
    pub print: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    pub metadata: HashMap<String, Value>,
}

#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &str;
    fn aliases(&self) -> &[&str] {
        &[]
    }
    fn description(&self) -> &str;
    fn usage(&self) -> &str {
        ""
    }
    fn category(&self) -> CommandCategory {
        CommandCategory::General
    }
    fn required_args(&self) -> &[&str] {
        &[]
    }

    /// Commands that implement `SubcommandHandler` override this to return
    /// `Some(self)`, letting the dispatcher route through it without a
    /// downcast (spec §4.5).
    fn as_subcommand_handler(&self) -> Option<&dyn SubcommandHandler> {
        None
    }

    async fn execute(&self, parsed: &ParsedCommand, ctx: &CommandContext) -> CommandResult;
}

/// A command that dispatches to named subcommands based on the first
/// positional argument (spec §4.5), falling back to `execute_default` when
/// none is given.
#[async_trait]
pub trait SubcommandHandler: Command {
    fn subcommands(&self) -> &HashMap<String, Arc<dyn Command>>;

    async fn execute_default(&self, parsed: &ParsedCommand, ctx: &CommandContext) -> CommandResult;
}

/// Name-keyed registry with a parallel alias table (spec §4.5). Mutated
/// only at startup; reads require no lock (spec §5).
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
    aliases: HashMap<String, String>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `cmd`. Rejects a colliding canonical name; a colliding
    /// alias is skipped with a warning rather than failing the whole
    /// registration (spec §4.5).
    pub fn register(&mut self, cmd: Arc<dyn Command>) -> Result<(), super::error::CommandError> {
        let name = cmd.name().to_string();
        if self.commands.contains_key(&name) {
            return Err(super::error::CommandError::ExecutionFailed(format!(
                "command '{name}' is already registered"
            )));
        }

        for alias in cmd.aliases() {
            if self.aliases.contains_key(*alias) || self.commands.contains_key(*alias) {
                warn!(alias = %alias, command = %name, "skipping colliding command alias");
                continue;
            }
            self.aliases.insert((*alias).to_string(), name.clone());
        }

        self.commands.insert(name, cmd);
        Ok(())
    }

    /// Resolves `name` through the canonical map, then the alias map.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned().or_else(|| {
            self.aliases
                .get(name)
                .and_then(|canonical| self.commands.get(canonical).cloned())
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    /// Returns commands in `category` (or every command, if `None`),
    /// sorted by name.
    pub fn list_commands(&self, category: Option<CommandCategory>) -> Vec<Arc<dyn Command>> {
        let mut commands: Vec<_> = self
            .commands
            .values()
            .filter(|c| category.is_none_or(|cat| c.category() == cat))
            .cloned()
            .collect();
        commands.sort_by(|a, b| a.name().cmp(b.name()));
        commands
    }

    pub fn get_categories(&self) -> HashMap<CommandCategory, Vec<Arc<dyn Command>>> {
        let mut grouped: HashMap<CommandCategory, Vec<Arc<dyn Command>>> = HashMap::new();
        for cmd in self.commands.values() {
            grouped.entry(cmd.category()).or_default().push(cmd.clone());
        }
        for commands in grouped.values_mut() {
            commands.sort_by(|a, b| a.name().cmp(b.name()));
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop(&'static str, &'static [&'static str]);

    #[async_trait]
    impl Command for Noop {
        fn name(&self) -> &str {
            self.0
        }
        fn aliases(&self) -> &[&str] {
            self.1
        }
        fn description(&self) -> &str {
            "a no-op command"
        }
        async fn execute(&self, _parsed: &ParsedCommand, _ctx: &CommandContext) -> CommandResult {
            CommandResult::ok("ok")
        }
    }

    #[test]
    fn resolves_by_name_and_alias() {
        let mut reg = CommandRegistry::new();
        reg.register(Arc::new(Noop("help", &["h", "?"]))).unwrap();
        assert!(reg.resolve("help").is_some());
        assert!(reg.resolve("h").is_some());
        assert!(reg.resolve("?").is_some());
        assert!(reg.resolve("nope").is_none());
    }

    #[test]
    fn colliding_alias_is_skipped_not_rejected() {
        let mut reg = CommandRegistry::new();
        reg.register(Arc::new(Noop("help", &["h"]))).unwrap();
        reg.register(Arc::new(Noop("history", &["h"]))).unwrap();
        assert!(reg.resolve("history").is_some());
        assert_eq!(reg.resolve("h").unwrap().name(), "help");
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut reg = CommandRegistry::new();
        reg.register(Arc::new(Noop("help", &[]))).unwrap();
        assert!(reg.register(Arc::new(Noop("help", &[]))).is_err());
    }
}
