//! Command implementations for partlock.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Every command resolves the data directory first and
//! creates it when missing.

mod bump;
mod locks;
mod messages;

use crate::cli::{Command, LockAction, LockCommand, MessageAction, MessageCommand};
use partlock::context::DataDir;
use partlock::error::Result;
use partlock::registry::local_identity;
use std::path::Path;

/// Dispatch a command to its implementation.
pub fn dispatch(data_dir: Option<&Path>, command: Command) -> Result<()> {
    let data = DataDir::create(DataDir::resolve_path(data_dir)?)?;

    match command {
        Command::Checkout(args) => locks::cmd_checkout(&data, args),
        Command::Checkin(args) => locks::cmd_checkin(&data, args),
        Command::Status(args) => locks::cmd_status(&data, args),
        Command::Lock(lock_cmd) => dispatch_lock(&data, lock_cmd),
        Command::Message(msg_cmd) => dispatch_message(&data, msg_cmd),
        Command::Bump(args) => bump::cmd_bump(&data, args),
    }
}

/// Dispatch lock subcommands.
fn dispatch_lock(data: &DataDir, lock_cmd: LockCommand) -> Result<()> {
    match lock_cmd.action {
        LockAction::List(args) => locks::cmd_lock_list(data, args),
        LockAction::Clear(args) => locks::cmd_lock_clear(data, args),
    }
}

/// Dispatch message subcommands.
fn dispatch_message(data: &DataDir, msg_cmd: MessageCommand) -> Result<()> {
    match msg_cmd.action {
        MessageAction::Send(args) => messages::cmd_send(data, args),
        MessageAction::Inbox(args) => messages::cmd_inbox(data, args),
        MessageAction::Read(args) => messages::cmd_read(data, args),
    }
}

/// The `--user` value, or the local `user@host` identity.
fn user_or_local(user: Option<String>) -> String {
    user.map(|u| u.trim().to_string())
        .unwrap_or_else(local_identity)
}
