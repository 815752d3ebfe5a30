//! Slash-command dispatcher (spec §4.5): parser, registry, and executor for
//! REPL control commands.

pub mod dispatcher;
pub mod error;
pub mod parser;
pub mod registry;

pub use dispatcher::execute;
pub use error::CommandError;
pub use parser::{is_command, parse, suggest_command, ParsedCommand};
pub use registry::{Command, CommandCategory, CommandContext, CommandRegistry, CommandResult, SubcommandHandler};
