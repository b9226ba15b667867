//! Message commands.

use super::user_or_local;
use crate::cli::{MessageInboxArgs, MessageReadArgs, MessageSendArgs};
use partlock::context::DataDir;
use partlock::error::Result;

pub fn cmd_send(data: &DataDir, args: MessageSendArgs) -> Result<()> {
    let from = user_or_local(args.user);
    let message = data
        .message_box()?
        .send(&from, &args.to, &args.subject, &args.body)?;

    println!("Sent message {} to {}", message.id, message.to_user);
    Ok(())
}

pub fn cmd_inbox(data: &DataDir, args: MessageInboxArgs) -> Result<()> {
    let user = user_or_local(args.user);
    let messages = data.message_box()?.inbox(&user)?;

    let shown: Vec<_> = messages
        .iter()
        .filter(|m| !args.unread || !m.read)
        .collect();

    if shown.is_empty() {
        println!("No messages for {}.", user);
        return Ok(());
    }

    let unread = messages.iter().filter(|m| !m.read).count();
    println!("Messages for {} ({} unread):", user, unread);
    println!();

    for message in shown {
        let marker = if message.read { " " } else { "*" };
        println!(
            "{} {}  {}  from {}  {}",
            marker,
            message.id,
            message.timestamp.format("%Y-%m-%d %H:%M"),
            message.from_user,
            message.subject
        );
    }

    Ok(())
}

pub fn cmd_read(data: &DataDir, args: MessageReadArgs) -> Result<()> {
    let user = user_or_local(args.user);
    let message = data.message_box()?.mark_read(args.id, &user)?;

    println!("From:     {}", message.from_user);
    println!("To:       {}", message.to_user);
    println!(
        "Date:     {}",
        message.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("Subject:  {}", message.subject);
    println!();
    println!("{}", message.body);
    Ok(())
}
