//! Dangerous-command filter (spec §4.2.1).
//!
//! Deliberately narrow: a backstop against catastrophic actions by a
//! hallucinating model, not a sandbox or a general policy layer. Do not
//! extend this to enforce general policy — that belongs in a permission
//! layer specified elsewhere.

use std::sync::OnceLock;

use regex::Regex;

const RAW_PATTERNS: &[(&str, &str)] = &[
    (r"(?i)rm\s+-rf\s+/\s*$", "remove filesystem root"),
    (r"(?i)rm\s+-rf\s+/\*", "remove filesystem root"),
    (r"(?i)mkfs\.", "format a filesystem"),
    (r"(?i)dd\s+if=.+of=/dev/sd", "raw disk write"),
    (r"(?i)>\s*/dev/sd", "redirect to raw disk"),
    (r"(?i)chmod\s+-R\s+777\s+/\s*$", "recursively open permissions at root"),
    (r"(?i):\(\)\{\s*:\|:&\s*\};:", "fork bomb"),
    (r"(?i)mv\s+/\s+", "move filesystem root"),
    (r"(?i)chown\s+-R\s+.+\s+/\s*$", "recursive ownership change of root"),
];

fn compiled() -> &'static Vec<(Regex, &'static str)> {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RAW_PATTERNS
            .iter()
            .map(|(pattern, reason)| {
                (Regex::new(pattern).expect("dangerous-command pattern must compile"), *reason)
            })
            .collect()
    })
}

/// Returns `Some(reason)` if `command` matches a known-catastrophic pattern.
/// The command must never be executed, even in dry-run mode, when this
/// returns `Some`.
pub fn check(command: &str) -> Option<&'static str> {
    compiled()
        .iter()
        .find(|(re, _)| re.is_match(command))
        .map(|(_, reason)| *reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_rm_rf_root() {
        assert!(check("rm -rf /").is_some());
        assert!(check("sudo   rm -rf /").is_some());
    }

    #[test]
    fn blocks_fork_bomb() {
        assert!(check(":(){ :|:& };:").is_some());
    }

    #[test]
    fn allows_benign_commands() {
        assert!(check("rm -rf ./build").is_none());
        assert!(check("ls -la /").is_none());
        assert!(check("echo hello").is_none());
    }
}
