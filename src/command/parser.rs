//! Slash-command tokenizer and parser (spec §4.5).

use std::collections::{HashMap, HashSet};

use super::error::CommandError;

/// A tokenized slash command, before name resolution.
#[derive(Debug, Clone, Default)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
    pub kwargs: HashMap<String, String>,
    pub flags: HashSet<String>,
    pub raw: String,
}

/// `true` iff `text` (after trimming) starts with `/`, has a non-empty
/// remainder, and the first character after `/` is alphabetic.
pub fn is_command(text: &str) -> bool {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return false;
    };
    rest.chars().next().is_some_and(char::is_alphabetic)
}

/// Tokenizes and parses a slash command line. Tokenization prefers
/// POSIX-shell-style quote handling; on a malformed quote it falls back to
/// plain whitespace splitting (spec §4.5).
pub fn parse(text: &str) -> Result<ParsedCommand, CommandError> {
    let trimmed = text.trim();
    let raw = trimmed.to_string();
    let without_prefix = trimmed.strip_prefix('/').unwrap_or(trimmed);

    let tokens = shlex::split(without_prefix)
        .unwrap_or_else(|| without_prefix.split_whitespace().map(str::to_string).collect());

    let mut tokens = tokens.into_iter();
    let Some(name) = tokens.next() else {
        return Err(CommandError::Empty);
    };

    let mut parsed = ParsedCommand {
        name: name.to_lowercase(),
        args: Vec::new(),
        kwargs: HashMap::new(),
        flags: HashSet::new(),
        raw,
    };

    let mut rest: Vec<String> = tokens.collect();
    let mut i = 0;
    while i < rest.len() {
        let token = rest[i].clone();
        if let Some(long) = token.strip_prefix("--") {
            if let Some((key, value)) = long.split_once('=') {
                parsed.kwargs.insert(key.to_string(), value.to_string());
            } else {
                let next_is_value = rest.get(i + 1).is_some_and(|t| !t.starts_with('-'));
                if next_is_value {
                    parsed.kwargs.insert(long.to_string(), rest[i + 1].clone());
                    i += 1;
                } else {
                    parsed.flags.insert(long.to_string());
                }
            }
        } else if token.len() == 2 && token.starts_with('-') && token != "--" {
            parsed.flags.insert(token[1..].to_string());
        } else {
            parsed.args.push(token);
        }
        i += 1;
    }
    rest.clear();

    Ok(parsed)
}

/// Character-set Jaccard similarity between two strings.
fn jaccard(a: &str, b: &str) -> f64 {
    let sa: HashSet<char> = a.chars().collect();
    let sb: HashSet<char> = b.chars().collect();
    if sa.is_empty() && sb.is_empty() {
        return 1.0;
    }
    let intersection = sa.intersection(&sb).count();
    let union = sa.union(&sb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Returns the name in `names` most similar to `text` by character-set
/// Jaccard similarity, if that similarity exceeds 0.6 (spec §4.5).
pub fn suggest_command<'a>(text: &str, names: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    names
        .into_iter()
        .map(|name| (name, jaccard(text, name)))
        .filter(|(_, score)| *score > 0.6)
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(name, _)| name)
}
