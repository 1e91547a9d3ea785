use crate::platform::{Messenger, Outgoing, TelegramMessenger};
use crate::relay::{self, IncomingRequest};
use crate::state::AppState;
use crate::{commands, utils};
use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{MessageOrigin, UserId};

pub async fn on_message(
    messenger: Arc<TelegramMessenger>,
    state: Arc<AppState>,
    msg: Message,
) -> Result<()> {
    let messenger = messenger.as_ref();

    // 1) the bot itself was added to a group
    if let Some(newbies) = msg.new_chat_members() {
        let ids: Vec<UserId> = newbies.iter().map(|u| u.id).collect();
        announce_group(messenger, msg.chat.id, &ids).await?;
        return Ok(());
    }

    if msg.chat.is_private() {
        // 2) a channel post forwarded to us
        if let Some(channel) = forwarded_channel(&msg) {
            announce_channel(messenger, msg.chat.id, channel).await?;
            return Ok(());
        }
        // 3) commands
        if let Some(text) = msg.text() {
            if text.starts_with('/') {
                commands::handle_command(messenger, &state, msg.chat.id, text).await?;
            }
        }
        return Ok(());
    }

    // 4) #request in a group
    if msg.chat.is_group() || msg.chat.is_supergroup() {
        if let Some(request) = incoming_request(&msg) {
            relay::relay_request(messenger, &state, &request).await?;
        }
    }
    Ok(())
}

fn forwarded_channel(msg: &Message) -> Option<ChatId> {
    match msg.forward_origin()? {
        MessageOrigin::Channel { chat, .. } => Some(chat.id),
        _ => None,
    }
}

fn incoming_request(msg: &Message) -> Option<IncomingRequest> {
    let text = msg.text().or_else(|| msg.caption())?;
    Some(IncomingRequest {
        group_id: msg.chat.id,
        message_id: msg.id,
        requester_id: msg.from.as_ref().map(|u| u.id),
        requester_name: utils::sender_name(msg),
        text: text.to_string(),
    })
}

/// Tells a group its ID when the bot is among the new members.
pub async fn announce_group(
    messenger: &dyn Messenger,
    chat_id: ChatId,
    newbies: &[UserId],
) -> Result<()> {
    if newbies.contains(&messenger.me()) {
        messenger
            .send(Outgoing::new(
                chat_id,
                format!("Hey😁, Your Group ID is {}", chat_id.0),
            ))
            .await?;
    }
    Ok(())
}

pub async fn announce_channel(
    messenger: &dyn Messenger,
    chat_id: ChatId,
    channel: ChatId,
) -> Result<()> {
    messenger
        .send(Outgoing::new(
            chat_id,
            format!("Hey😁, Your Channel ID is {}", channel.0),
        ))
        .await?;
    Ok(())
}
