//! CLI argument parsing for partlock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Partlock: file checkout registry for shared part files.
///
/// State lives as JSON documents in a data directory:
/// - `locks.json` records who has which file checked out
/// - `messages.json` holds user-to-user messages
/// - `audit.ndjson` is an append-only trail of checkouts and check-ins
#[derive(Parser, Debug)]
#[command(name = "partlock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (defaults to $PARTLOCK_DATA_DIR, then ./.partlock).
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Increase diagnostic output (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for partlock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a file out.
    ///
    /// Fails if the file is already checked out by anyone, including you.
    Checkout(CheckoutArgs),

    /// Check a file back in.
    ///
    /// Only the holder may check a file in unless --admin is given.
    Checkin(CheckinArgs),

    /// Show who holds a file.
    Status(StatusArgs),

    /// Inspect or clear checkouts.
    Lock(LockCommand),

    /// Send and read messages.
    Message(MessageCommand),

    /// Increment a counter in a JSON document under its file lock.
    ///
    /// Each increment is a separate load-modify-save cycle.
    #[command(hide = true)]
    Bump(BumpArgs),
}

/// Arguments for the `checkout` command.
#[derive(Parser, Debug)]
pub struct CheckoutArgs {
    /// File name to check out.
    pub key: String,

    /// Checkout message.
    #[arg(short, long, default_value = "")]
    pub message: String,

    /// Owner identity (defaults to user@host).
    #[arg(long)]
    pub user: Option<String>,
}

/// Arguments for the `checkin` command.
#[derive(Parser, Debug)]
pub struct CheckinArgs {
    /// File name to check in.
    pub key: String,

    /// Identity checking the file in (defaults to user@host).
    #[arg(long)]
    pub user: Option<String>,

    /// Check in a file held by someone else.
    #[arg(long)]
    pub admin: bool,
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// File name to look up.
    pub key: String,
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
    /// List all checkouts with their owner and age.
    List(LockListArgs),

    /// Clear a checkout regardless of owner.
    ///
    /// Requires --force.
    Clear(LockClearArgs),
}

/// Arguments for `lock list`.
#[derive(Parser, Debug)]
pub struct LockListArgs {
    /// Only show checkouts older than `lock_stale_minutes`.
    #[arg(long)]
    pub stale: bool,
}

/// Arguments for `lock clear`.
#[derive(Parser, Debug)]
pub struct LockClearArgs {
    /// File name whose checkout should be cleared.
    pub key: String,

    /// Force clearing the checkout (required for safety).
    #[arg(long)]
    pub force: bool,
}

/// Message subcommands.
#[derive(Parser, Debug)]
pub struct MessageCommand {
    #[command(subcommand)]
    pub action: MessageAction,
}

/// Available message actions.
#[derive(Subcommand, Debug)]
pub enum MessageAction {
    /// Send a message.
    Send(MessageSendArgs),

    /// List received messages, newest first.
    Inbox(MessageInboxArgs),

    /// Print a message and mark it read.
    Read(MessageReadArgs),
}

/// Arguments for `message send`.
#[derive(Parser, Debug)]
pub struct MessageSendArgs {
    /// Recipient identity.
    pub to: String,

    /// Subject line.
    #[arg(short, long, default_value = "")]
    pub subject: String,

    /// Message body.
    #[arg(short, long, default_value = "")]
    pub body: String,

    /// Sender identity (defaults to user@host).
    #[arg(long)]
    pub user: Option<String>,
}

/// Arguments for `message inbox`.
#[derive(Parser, Debug)]
pub struct MessageInboxArgs {
    /// Recipient identity (defaults to user@host).
    #[arg(long)]
    pub user: Option<String>,

    /// Only show unread messages.
    #[arg(long)]
    pub unread: bool,
}

/// Arguments for `message read`.
#[derive(Parser, Debug)]
pub struct MessageReadArgs {
    /// Message id.
    pub id: Uuid,

    /// Recipient identity (defaults to user@host).
    #[arg(long)]
    pub user: Option<String>,
}

/// Arguments for the hidden `bump` command.
#[derive(Parser, Debug)]
pub struct BumpArgs {
    /// Document file name inside the data directory.
    pub file: String,

    /// Field to increment.
    #[arg(long, default_value = "counter")]
    pub field: String,

    /// Number of increments.
    #[arg(long, default_value_t = 1)]
    pub times: u32,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
