//! Command dispatcher: parse, resolve, validate, invoke (spec §4.5).

use super::error::CommandError;
use super::parser::{self, ParsedCommand};
use super::registry::{Command, CommandContext, CommandRegistry, CommandResult, SubcommandHandler};

/// Parses, resolves, and runs one line of user input through `registry`.
///
/// On an unknown command, the suggester is consulted and a "Did you mean
/// /X?" hint is folded into the failure message (spec §4.5, §6).
pub async fn execute(text: &str, registry: &CommandRegistry, ctx: &CommandContext) -> CommandResult {
    let parsed = match parser::parse(text) {
        Ok(p) => p,
        Err(e) => return CommandResult::fail(e.to_string()),
    };

    let Some(command) = registry.resolve(&parsed.name) else {
        let suggestion = parser::suggest_command(&parsed.name, registry.names());
        let unknown = CommandError::Unknown(parsed.name.clone()).to_string();
        return CommandResult::fail(match suggestion {
            Some(name) => format!("{unknown}\nDid you mean /{name}?"),
            None => unknown,
        });
    };

    if let Some(missing) = missing_required_arg(&parsed, &command) {
        return CommandResult::fail(format!(
            "{}\nUsage: {}",
            CommandError::MissingArgument(missing.to_string()),
            command.usage()
        ));
    }

    execute_command(command.as_ref(), &parsed, ctx).await
}

/// Each required arg is checked against its own positional slot (by index)
/// or a matching kwarg, not against "any positional was supplied" — a
/// command with two required args must not accept the second as a stand-in
/// for the first (spec §4.5).
fn missing_required_arg(parsed: &ParsedCommand, command: &std::sync::Arc<dyn Command>) -> Option<&'static str> {
    for (i, required) in command.required_args().iter().enumerate() {
        let present = parsed.kwargs.contains_key(*required) || parsed.args.get(i).is_some();
        if !present {
            return Some(required);
        }
    }
    None
}

/// Routes through a `SubcommandHandler` when `command` is one: the first
/// positional argument names the subcommand; anything else falls back to
/// `execute_default` (spec §4.5).
async fn execute_command(command: &dyn Command, parsed: &ParsedCommand, ctx: &CommandContext) -> CommandResult {
    let Some(handler) = command.as_subcommand_handler() else {
        return command.execute(parsed, ctx).await;
    };

    let Some(name) = parsed.args.first() else {
        return handler.execute_default(parsed, ctx).await;
    };

    let Some(sub) = handler.subcommands().get(name) else {
        return handler.execute_default(parsed, ctx).await;
    };

    let sub_parsed = subcommand_parsed(parsed, name);
    sub.execute(&sub_parsed, ctx).await
}

/// Rebuilds a `ParsedCommand` for a subcommand dispatch: the first
/// positional argument names the subcommand, and the remaining positionals
/// (plus the original kwargs/flags) become its arguments (spec §4.5).
pub fn subcommand_parsed(parsed: &ParsedCommand, subcommand_name: &str) -> ParsedCommand {
    ParsedCommand {
        name: subcommand_name.to_string(),
        args: parsed.args.iter().skip(1).cloned().collect(),
        kwargs: parsed.kwargs.clone(),
        flags: parsed.flags.clone(),
        raw: parsed.raw.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct Greet;
    #[async_trait]
    impl Command for Greet {
        fn name(&self) -> &str {
            "greet"
        }
        fn description(&self) -> &str {
            "greets someone"
        }
        fn usage(&self) -> &str {
            "/greet <name>"
        }
        fn required_args(&self) -> &[&str] {
            &["name"]
        }
        async fn execute(&self, parsed: &ParsedCommand, _ctx: &CommandContext) -> CommandResult {
            CommandResult::ok(format!("hello, {}", parsed.args[0]))
        }
    }

    fn registry() -> CommandRegistry {
        let mut reg = CommandRegistry::new();
        reg.register(Arc::new(Greet)).unwrap();
        reg
    }

    #[tokio::test]
    async fn executes_known_command() {
        let result = execute("/greet world", &registry(), &CommandContext::default()).await;
        assert!(result.ok);
        assert_eq!(result.message, "hello, world");
    }

    #[tokio::test]
    async fn unknown_command_suggests_closest_match() {
        let result = execute("/gret world", &registry(), &CommandContext::default()).await;
        assert!(!result.ok);
        assert!(result.message.contains("Unknown command: /gret"));
        assert!(result.message.contains("Did you mean /greet?"));
    }

    #[tokio::test]
    async fn missing_required_argument_fails_with_usage() {
        let result = execute("/greet", &registry(), &CommandContext::default()).await;
        assert!(!result.ok);
        assert!(result.message.contains("missing required argument: name"));
        assert!(result.message.contains("/greet <name>"));
    }

    struct SessionList;
    #[async_trait]
    impl Command for SessionList {
        fn name(&self) -> &str {
            "list"
        }
        fn description(&self) -> &str {
            "lists sessions"
        }
        async fn execute(&self, parsed: &ParsedCommand, _ctx: &CommandContext) -> CommandResult {
            let limit = parsed.kwargs.get("limit").cloned().unwrap_or_else(|| "10".into());
            CommandResult::ok(format!("listed sessions, limit={limit}"))
        }
    }

    struct Session {
        subcommands: HashMap<String, Arc<dyn Command>>,
    }
    impl Session {
        fn new() -> Self {
            let mut subcommands: HashMap<String, Arc<dyn Command>> = HashMap::new();
            subcommands.insert("list".to_string(), Arc::new(SessionList));
            Self { subcommands }
        }
    }
    #[async_trait]
    impl Command for Session {
        fn name(&self) -> &str {
            "session"
        }
        fn description(&self) -> &str {
            "manages sessions"
        }
        fn as_subcommand_handler(&self) -> Option<&dyn SubcommandHandler> {
            Some(self)
        }
        async fn execute(&self, parsed: &ParsedCommand, ctx: &CommandContext) -> CommandResult {
            execute_command(self, parsed, ctx).await
        }
    }
    #[async_trait]
    impl SubcommandHandler for Session {
        fn subcommands(&self) -> &HashMap<String, Arc<dyn Command>> {
            &self.subcommands
        }
        async fn execute_default(&self, _parsed: &ParsedCommand, _ctx: &CommandContext) -> CommandResult {
            CommandResult::ok("usage: /session <list>")
        }
    }

    #[tokio::test]
    async fn subcommand_routes_to_named_handler_with_remaining_args() {
        let mut reg = CommandRegistry::new();
        reg.register(Arc::new(Session::new())).unwrap();
        let result = execute("/session list --limit 5", &reg, &CommandContext::default()).await;
        assert!(result.ok);
        assert_eq!(result.message, "listed sessions, limit=5");
    }

    #[tokio::test]
    async fn subcommand_handler_falls_back_to_default_with_no_args() {
        let mut reg = CommandRegistry::new();
        reg.register(Arc::new(Session::new())).unwrap();
        let result = execute("/session", &reg, &CommandContext::default()).await;
        assert!(result.ok);
        assert!(result.message.contains("usage"));
    }
}
