//! Checkout, check-in and lock inspection commands.

use super::user_or_local;
use crate::cli::{CheckinArgs, CheckoutArgs, LockClearArgs, LockListArgs, StatusArgs};
use partlock::context::DataDir;
use partlock::error::{PartlockError, Result};
use partlock::registry::{Authority, LockRecord};

pub fn cmd_checkout(data: &DataDir, args: CheckoutArgs) -> Result<()> {
    let user = user_or_local(args.user);
    let record = data.lock_table()?.checkout(&args.key, &user, &args.message)?;

    println!("Checked out: {}", args.key);
    print_record(&record, "  ");
    Ok(())
}

pub fn cmd_checkin(data: &DataDir, args: CheckinArgs) -> Result<()> {
    let user = user_or_local(args.user);
    let authority = if args.admin {
        Authority::Admin
    } else {
        Authority::Owner
    };

    let removed = data.lock_table()?.release(&args.key, &user, authority)?;

    if removed.owner != user {
        println!("Checked in: {} (admin, was held by {})", args.key, removed.owner);
    } else {
        println!("Checked in: {}", args.key);
    }
    Ok(())
}

pub fn cmd_status(data: &DataDir, args: StatusArgs) -> Result<()> {
    match data.lock_table()?.get(&args.key)? {
        Some(record) => {
            println!("{}: checked out", args.key);
            print_record(&record, "  ");
            if record.is_stale(data.config.lock_stale_minutes) {
                println!(
                    "  Status:     STALE (exceeds {} min threshold)",
                    data.config.lock_stale_minutes
                );
            }
        }
        None => println!("{}: available", args.key),
    }
    Ok(())
}

pub fn cmd_lock_list(data: &DataDir, args: LockListArgs) -> Result<()> {
    let stale_minutes = data.config.lock_stale_minutes;
    let table = data.lock_table()?;

    let records: Vec<(String, LockRecord)> = if args.stale {
        table.stale_entries(stale_minutes)?
    } else {
        table.entries()?.into_iter().collect()
    };

    if records.is_empty() {
        if args.stale {
            println!("No stale checkouts.");
        } else {
            println!("No active checkouts.");
        }
        return Ok(());
    }

    println!("Active checkouts ({}):", records.len());
    println!();

    for (key, record) in &records {
        println!("  {}:", key);
        print_record(record, "    ");
        if record.is_stale(stale_minutes) {
            println!("    Status:     STALE (exceeds {} min threshold)", stale_minutes);
        }
        println!();
    }

    let stale_count = records
        .iter()
        .filter(|(_, record)| record.is_stale(stale_minutes))
        .count();
    if stale_count > 0 {
        println!(
            "Note: {} checkout(s) are stale. Use `partlock lock clear <key> --force` to clear.",
            stale_count
        );
    }

    Ok(())
}

pub fn cmd_lock_clear(data: &DataDir, args: LockClearArgs) -> Result<()> {
    if !args.force {
        return Err(PartlockError::InvalidInput(format!(
            "refusing to clear checkout without --force flag.\n\n\
             Clearing a checkout lets someone else overwrite the holder's work.\n\
             Only clear it if you are certain the holder is done or gone.\n\n\
             To clear the checkout, run:\n  partlock lock clear {} --force",
            args.key
        )));
    }

    let stale_minutes = data.config.lock_stale_minutes;
    let cleared = data.lock_table()?.force_release(&args.key)?;

    println!("Cleared checkout: {}", args.key);
    println!();
    println!("Checkout details:");
    print_record(&cleared, "  ");
    if cleared.is_stale(stale_minutes) {
        println!("  Status:     was STALE");
    }
    Ok(())
}

fn print_record(record: &LockRecord, indent: &str) {
    println!("{}Owner:      {}", indent, record.owner);
    println!(
        "{}Created:    {}",
        indent,
        record.acquired_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("{}Age:        {}", indent, record.age_string());
    if !record.annotation.is_empty() {
        println!("{}Message:    {}", indent, record.annotation);
    }
}
