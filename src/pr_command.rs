//! Pull-request comment commands.
//!
//! Recognizes `digger plan|apply|unlock [-p <project>]` on the first non-empty
//! line of a comment. Any other comment is not a command.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static COMMAND_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^digger\s+(plan|apply|unlock)(?:\s+(?:-p|--project)(?:\s+|=)(\S+))?\s*$")
        .expect("Invalid command regex")
});

/// What a comment asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Plan,
    Apply,
    Unlock,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Plan => "plan",
            CommandKind::Apply => "apply",
            CommandKind::Unlock => "unlock",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed comment command. `project: None` targets every modified project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrCommand {
    pub kind: CommandKind,
    pub project: Option<String>,
}

impl PrCommand {
    /// Parse a comment body. Returns `None` when it is not a command.
    pub fn parse(body: &str) -> Option<Self> {
        let line = body.lines().map(str::trim).find(|l| !l.is_empty())?;
        let captures = COMMAND_REGEX.captures(line)?;

        let kind = match captures.get(1)?.as_str() {
            "plan" => CommandKind::Plan,
            "apply" => CommandKind::Apply,
            _ => CommandKind::Unlock,
        };
        let project = captures.get(2).map(|m| m.as_str().to_string());

        Some(Self { kind, project })
    }
}

impl fmt::Display for PrCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "digger {}", self.kind)?;
        if let Some(project) = &self.project {
            write!(f, " -p {}", project)?;
        }
        Ok(())
    }
}
