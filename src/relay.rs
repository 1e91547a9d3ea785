//! `#request` messages: relay to the paired channel and acknowledge in the group.

use crate::error::Result;
use crate::platform::{Messenger, Outgoing};
use crate::requests::{Outcome, RequestRecord, RequestStatus};
use crate::state::AppState;
use crate::utils::{message_link, url_button};
use chrono::Utc;
use log::{debug, info};
use regex::Regex;
use std::sync::LazyLock;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, UserId};

static REQUEST_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)#request ").unwrap_or_else(|e| panic!("request tag regex: {e}"))
});

/// A group message that may carry a request.
#[derive(Clone, Debug)]
pub struct IncomingRequest {
    pub group_id: ChatId,
    pub message_id: MessageId,
    pub requester_id: Option<UserId>,
    pub requester_name: String,
    pub text: String,
}

/// Whatever follows the first `#request ` tag, if there is one.
pub fn extract_request(text: &str) -> Option<&str> {
    REQUEST_TAG.find(text).map(|m| &text[m.end()..])
}

pub fn relay_text(requester_name: &str, text: &str) -> String {
    format!("Request by {requester_name}\n\n{text}")
}

fn status_notice(requester_name: &str) -> String {
    format!(
        "👋 Hello {requester_name} !!\n\n Your Request has been added to queue.\n\n 👇 See Your Request Status Here 👇"
    )
}

/// Link back to the group message, then one button per outcome.
pub fn pending_keyboard(group_id: ChatId, message_id: MessageId) -> Result<InlineKeyboardMarkup> {
    let link = url_button("Requested Message", &message_link(group_id, message_id))?;
    let actions: Vec<InlineKeyboardButton> = Outcome::ALL
        .iter()
        .map(|o| InlineKeyboardButton::callback(o.action_caption(), o.action_token()))
        .collect();
    Ok(InlineKeyboardMarkup::new([vec![link], actions]))
}

/// Relays a tagged message. Returns `None` when the message is not a request
/// or the group has no paired channel.
pub async fn relay_request(
    messenger: &dyn Messenger,
    state: &AppState,
    request: &IncomingRequest,
) -> Result<Option<RequestRecord>> {
    let Some(content) = extract_request(&request.text) else {
        return Ok(None);
    };
    let Some(pairing) = state.pairings.find_by_group(request.group_id) else {
        debug!(
            "Dropping request from unpaired group {} (message {})",
            request.group_id.0, request.message_id.0
        );
        return Ok(None);
    };

    let keyboard = pending_keyboard(request.group_id, request.message_id)?;
    let relay_id = messenger
        .send(
            Outgoing::new(
                pairing.channel_id,
                relay_text(&request.requester_name, &request.text),
            )
            .keyboard(keyboard),
        )
        .await?;

    let record = RequestRecord {
        channel_id: pairing.channel_id.0,
        relay_message_id: relay_id.0,
        group_id: request.group_id.0,
        group_message_id: request.message_id.0,
        requester_id: request.requester_id.map(|u| u.0),
        requester_name: request.requester_name.clone(),
        text: request.text.clone(),
        content: content.trim().to_string(),
        status: RequestStatus::Pending,
        created_at: Utc::now(),
        settled_at: None,
    };
    state.requests.track(record.clone());

    let status_link = url_button("⏳Request Status⏳", &message_link(pairing.channel_id, relay_id))?;
    messenger
        .send(
            Outgoing::new(request.group_id, status_notice(&request.requester_name))
                .reply_to(request.message_id)
                .keyboard(InlineKeyboardMarkup::new([[status_link]])),
        )
        .await?;

    info!(
        "Relayed request from group {} (message {}) to channel {} (message {})",
        request.group_id.0, request.message_id.0, pairing.channel_id.0, relay_id.0
    );
    Ok(Some(record))
}
