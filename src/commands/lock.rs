//! `tfgate lock list|show|clear`.

use crate::context::RunContext;
use crate::error::Result;
use crate::events::{Event, EventAction, append_event};
use crate::locks::{LockRecord, ResourceKey};
use serde_json::json;

pub(super) fn cmd_lock_list(ctx: &RunContext) -> Result<()> {
    let locks = ctx.lock_manager().list()?;

    if locks.is_empty() {
        println!("No active locks.");
        return Ok(());
    }

    println!("Locks ({}):", locks.len());
    println!();
    for (key, record) in &locks {
        print_lock(key, record);
        println!();
    }

    let expired = locks.iter().filter(|(_, r)| r.is_expired()).count();
    if expired > 0 {
        println!(
            "Note: {} lock(s) have expired and will be replaced by the next acquire. \
Use `tfgate lock clear --project <name>` to remove one now.",
            expired
        );
    }

    Ok(())
}

pub(super) fn cmd_lock_show(ctx: &RunContext, project: &str) -> Result<()> {
    let key = ResourceKey::new(&ctx.repository, project)?;
    match ctx.lock_manager().inspect(&key)? {
        Some(record) => print_lock(&key, &record),
        None => println!("{}: not locked", key),
    }
    Ok(())
}

/// Administrative force release. Works for projects no longer in the config.
pub(super) fn cmd_lock_clear(ctx: &RunContext, project: &str) -> Result<()> {
    let key = ResourceKey::new(&ctx.repository, project)?;
    if ctx.config.get_project(project).is_none() {
        tracing::warn!(project, "clearing lock for a project that is not in the config");
    }

    let Some(previous) = ctx.lock_manager().try_force_release(&key)? else {
        println!("{}: no lock to clear", key);
        return Ok(());
    };

    let event = Event::new(EventAction::LockForceRelease)
        .with_resource(&key)
        .with_details(json!({
            "previous_owner": previous.transaction_id.0,
            "expires_at": previous.expires_at,
            "was_expired": previous.is_expired(),
            "source": "cli",
        }));
    // The lock is already gone; a missing audit line must not fail the command.
    if let Err(e) = append_event(&ctx.events_file(), &event) {
        tracing::warn!(error = %e, "failed to log lock_force_release event");
    }

    println!("Cleared lock: {}", key);
    println!("  Owner:      PR {}", previous.transaction_id);
    println!(
        "  Expires:    {}",
        previous.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}

fn print_lock(key: &ResourceKey, record: &LockRecord) {
    println!("  {}:", key);
    println!("    Owner:      PR {}", record.transaction_id);
    println!(
        "    Expires:    {}",
        record.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if record.is_expired() {
        println!("    Status:     EXPIRED");
    } else {
        println!("    Remaining:  {}", record.remaining_string());
    }
}
