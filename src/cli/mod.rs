//! CLI argument parsing for tfgate.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// tfgate: serialize Terraform plan/apply runs across pull requests.
///
/// Each project gets a lock keyed `repository#project`, owned by one pull
/// request until its apply succeeds, the pull request closes, an operator
/// unlocks it, or its TTL passes.
#[derive(Parser, Debug)]
#[command(name = "tfgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Directory inside the repository (defaults to the current directory).
    #[arg(long, global = true)]
    pub repo_dir: Option<PathBuf>,

    /// Repository name used in lock keys (e.g. org/infra-live).
    #[arg(long = "repo", env = "GITHUB_REPOSITORY", global = true)]
    pub repository: Option<String>,

    /// Override `lock.ttl_minutes` from the config file.
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub ttl_minutes: Option<u64>,

    /// Override `lock.store_dir` from the config file.
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,

    /// Also append published comments to this file.
    #[arg(long, global = true)]
    pub comments_file: Option<PathBuf>,
}

/// Available commands for tfgate.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pull request lifecycle events.
    Pr(PrCommandArgs),

    /// Handle a pull request comment (`digger plan|apply|unlock [-p project]`).
    ///
    /// Comments that are not commands are ignored.
    Comment(CommentArgs),

    /// Inspect or clear project locks.
    Lock(LockCommand),
}

#[derive(Parser, Debug)]
pub struct PrCommandArgs {
    #[command(subcommand)]
    pub event: PrEvent,
}

#[derive(Subcommand, Debug)]
pub enum PrEvent {
    /// Pull request opened or updated: lock the projects it modifies.
    Opened(PrOpenedArgs),

    /// Pull request merged or closed: release every lock it holds.
    Closed(PrClosedArgs),
}

/// Base and head refs used to compute the changed files.
#[derive(Args, Debug, Clone)]
pub struct DiffRefs {
    /// Base branch or commit of the pull request.
    #[arg(long, default_value = "main")]
    pub base: String,

    /// Head branch or commit of the pull request.
    #[arg(long, default_value = "HEAD")]
    pub head: String,
}

#[derive(Parser, Debug)]
pub struct PrOpenedArgs {
    /// Pull request number (the lock owner).
    #[arg(long)]
    pub pr: u64,

    #[command(flatten)]
    pub refs: DiffRefs,
}

#[derive(Parser, Debug)]
pub struct PrClosedArgs {
    /// Pull request number (the lock owner).
    #[arg(long)]
    pub pr: u64,
}

#[derive(Parser, Debug)]
pub struct CommentArgs {
    /// Pull request number the comment was posted on.
    #[arg(long)]
    pub pr: u64,

    /// Comment text.
    #[arg(long)]
    pub body: String,

    #[command(flatten)]
    pub refs: DiffRefs,
}

/// Lock subcommands.
#[derive(Parser, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

/// Available lock actions.
#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// List all locks with owner and remaining TTL.
    List,

    /// Show the lock on one project.
    Show(LockProjectArgs),

    /// Remove a project's lock regardless of owner.
    Clear(LockProjectArgs),
}

#[derive(Parser, Debug)]
pub struct LockProjectArgs {
    /// Project name from the config file.
    #[arg(long, short = 'p')]
    pub project: String,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serial_test::serial;

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_pr_opened_defaults() {
        let cli = Cli::try_parse_from(["tfgate", "pr", "opened", "--pr", "7"]).unwrap();
        match cli.command {
            Command::Pr(PrCommandArgs {
                event: PrEvent::Opened(args),
            }) => {
                assert_eq!(args.pr, 7);
                assert_eq!(args.refs.base, "main");
                assert_eq!(args.refs.head, "HEAD");
            }
            other => panic!("Expected pr opened, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_pr_closed() {
        let cli = Cli::try_parse_from(["tfgate", "pr", "closed", "--pr", "12"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Pr(PrCommandArgs {
                event: PrEvent::Closed(PrClosedArgs { pr: 12 })
            })
        ));
    }

    #[test]
    fn test_parse_comment_with_refs() {
        let cli = Cli::try_parse_from([
            "tfgate",
            "comment",
            "--pr",
            "7",
            "--body",
            "digger apply -p infra",
            "--base",
            "origin/main",
            "--head",
            "pr-7",
        ])
        .unwrap();
        if let Command::Comment(args) = cli.command {
            assert_eq!(args.body, "digger apply -p infra");
            assert_eq!(args.refs.base, "origin/main");
            assert_eq!(args.refs.head, "pr-7");
        } else {
            panic!("Expected Comment command");
        }
    }

    #[test]
    fn test_parse_lock_actions() {
        let cli = Cli::try_parse_from(["tfgate", "lock", "list"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Lock(LockCommand {
                action: LockAction::List
            })
        ));

        let cli = Cli::try_parse_from(["tfgate", "lock", "clear", "--project", "infra"]).unwrap();
        if let Command::Lock(LockCommand {
            action: LockAction::Clear(args),
        }) = cli.command
        {
            assert_eq!(args.project, "infra");
        } else {
            panic!("Expected lock clear");
        }

        let cli = Cli::try_parse_from(["tfgate", "lock", "show", "-p", "app"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Lock(LockCommand {
                action: LockAction::Show(_)
            })
        ));
    }

    #[test]
    #[serial]
    fn test_parse_global_args_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tfgate",
            "lock",
            "list",
            "--repo",
            "org/repo",
            "--ttl-minutes",
            "30",
            "--store-dir",
            "/tmp/locks",
        ])
        .unwrap();
        assert_eq!(cli.global.repository.as_deref(), Some("org/repo"));
        assert_eq!(cli.global.ttl_minutes, Some(30));
        assert_eq!(cli.global.store_dir, Some(PathBuf::from("/tmp/locks")));
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let result = Cli::try_parse_from(["tfgate", "--ttl-minutes", "0", "lock", "list"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_comment_requires_body() {
        let result = Cli::try_parse_from(["tfgate", "comment", "--pr", "7"]);
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_repository_defaults_from_environment() {
        // SAFETY: serialized with the other tests that read this variable.
        unsafe { std::env::set_var("GITHUB_REPOSITORY", "org/from-env") };
        let cli = Cli::try_parse_from(["tfgate", "lock", "list"]);
        unsafe { std::env::remove_var("GITHUB_REPOSITORY") };

        assert_eq!(
            cli.unwrap().global.repository.as_deref(),
            Some("org/from-env")
        );
    }
}
