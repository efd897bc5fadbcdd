//! Trim Terraform output down to the part worth posting on a pull request.

use super::RunOutput;
use regex::Regex;
use std::sync::LazyLock;

const CHANGES_START: &str = "Terraform will perform the following actions:";
const NO_CHANGES_START: &str = "No changes.";

static PLAN_SUMMARY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Plan: [0-9]+ to add, [0-9]+ to change, [0-9]+ to destroy\.")
        .expect("Invalid plan summary regex")
});

static APPLY_SUMMARY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Apply complete! Resources: ([0-9]+) added, ([0-9]+) changed, ([0-9]+) destroyed\.")
        .expect("Invalid apply summary regex")
});

/// Plan output from the action list (or "No changes.") through the summary line.
pub fn cleanup_plan_output(output: &RunOutput) -> String {
    cleanup(output, &PLAN_SUMMARY_REGEX)
}

/// Apply output from the action list (or "No changes.") through the summary line.
pub fn cleanup_apply_output(output: &RunOutput) -> String {
    cleanup(output, &APPLY_SUMMARY_REGEX)
}

/// Whether an apply summary reports any resource added, changed, or destroyed.
pub(super) fn apply_changed_resources(stdout: &str) -> bool {
    APPLY_SUMMARY_REGEX.captures(stdout).is_some_and(|caps| {
        (1..=3).any(|i| {
            caps.get(i)
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .is_some_and(|n| n > 0)
        })
    })
}

fn cleanup(output: &RunOutput, summary: &Regex) -> String {
    if !output.is_success() {
        let error = if output.stderr.trim().is_empty() {
            &output.stdout
        } else {
            &output.stderr
        };
        return fence(error.trim());
    }

    let stdout = output.stdout.as_str();
    let start = stdout
        .find(CHANGES_START)
        .or_else(|| stdout.find(NO_CHANGES_START))
        .unwrap_or(0);
    let end = summary
        .find(stdout)
        .map(|m| m.end())
        .filter(|end| *end > start)
        .unwrap_or(stdout.len());

    fence(stdout[start..end].trim())
}

fn fence(body: &str) -> String {
    format!("```terraform\n{}\n```", body)
}
