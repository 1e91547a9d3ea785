//! Button presses on relay messages inside moderation channels.

use crate::platform::{MemberLookupError, Messenger, Outgoing, TelegramMessenger};
use crate::relay::relay_text;
use crate::requests::{Outcome, RequestKey, RequestRecord};
use crate::state::AppState;
use crate::utils::url_button;
use anyhow::Result;
use log::{debug, info};
use std::sync::Arc;
use teloxide::types::{CallbackQuery, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, UserId};

const NOT_ADMIN: &str = "Wait.....??\nYou are not Admin😒.";

/// Every callback payload the bot ever attaches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    /// Pending-request button: settle with this outcome.
    Act(Outcome),
    /// The single button left on a settled request.
    Settled(Outcome),
}

impl Control {
    pub fn parse(data: &str) -> Option<Self> {
        Outcome::ALL.into_iter().find_map(|o| {
            if data == o.action_token() {
                Some(Control::Act(o))
            } else if data == o.settled_token() {
                Some(Control::Settled(o))
            } else {
                None
            }
        })
    }
}

#[derive(Clone, Debug)]
pub struct ControlPress {
    pub query_id: String,
    pub actor: UserId,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub data: String,
}

pub fn settled_text(outcome: Outcome, record: &RequestRecord) -> String {
    format!(
        "{}\n\n{}",
        outcome.label(),
        relay_text(&record.requester_name, &record.text)
    )
}

pub fn settled_keyboard(outcome: Outcome) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[InlineKeyboardButton::callback(
        outcome.settled_caption(),
        outcome.settled_token(),
    )]])
}

fn result_notice(state: &AppState, outcome: Outcome, record: &RequestRecord) -> String {
    format!(
        "Dear {}🧑\nYour request for {} {}\n({})",
        record.requester_name,
        record.content,
        outcome.group_phrase(),
        state.cfg.team_signature
    )
}

pub async fn on_callback(
    messenger: Arc<TelegramMessenger>,
    state: Arc<AppState>,
    q: CallbackQuery,
) -> Result<()> {
    let Some(message) = &q.message else {
        messenger.answer(q.id.clone(), None, false).await?;
        return Ok(());
    };
    let press = ControlPress {
        query_id: q.id.clone(),
        actor: q.from.id,
        chat_id: message.chat().id,
        message_id: message.id(),
        data: q.data.clone().unwrap_or_default(),
    };
    handle_press(messenger.as_ref(), &state, press).await
}

/// Runs one button press through the moderation rules.
pub async fn handle_press(
    messenger: &dyn Messenger,
    state: &AppState,
    press: ControlPress,
) -> Result<()> {
    let Some(control) = Control::parse(&press.data) else {
        debug!("Unknown callback payload {:?}", press.data);
        messenger.answer(press.query_id, None, false).await?;
        return Ok(());
    };
    if state.pairings.find_by_channel(press.chat_id).is_none() {
        debug!("Callback from unpaired chat {}", press.chat_id.0);
        messenger.answer(press.query_id, None, false).await?;
        return Ok(());
    }

    let outcome = match control {
        Control::Settled(outcome) => {
            messenger
                .answer(press.query_id, Some(outcome.settled_alert().to_string()), true)
                .await?;
            return Ok(());
        }
        Control::Act(outcome) => outcome,
    };

    let privileged = match messenger.member(press.chat_id, press.actor).await {
        Ok(m) => m.is_privileged(),
        Err(MemberLookupError::NotParticipant | MemberLookupError::InvalidChat) => false,
        Err(MemberLookupError::Request(e)) => return Err(e.into()),
    };
    if !privileged {
        messenger
            .answer(press.query_id, Some(NOT_ADMIN.to_string()), true)
            .await?;
        return Ok(());
    }

    let key = RequestKey {
        channel_id: press.chat_id,
        relay_message_id: press.message_id,
    };
    let record = match state.requests.settle(&key, outcome) {
        Ok(record) => record,
        Err(e) => {
            messenger.answer(press.query_id, Some(e.to_string()), true).await?;
            return Ok(());
        }
    };

    // The claim only sticks once the channel message shows it.
    if let Err(e) = messenger
        .edit(
            press.chat_id,
            press.message_id,
            settled_text(outcome, &record),
            settled_keyboard(outcome),
        )
        .await
    {
        state.requests.reopen(&key);
        return Err(e.into());
    }

    let uploads = InlineKeyboardMarkup::new([[url_button("📤UPLOADS CHANNEL📤", &state.cfg.uploads_url)?]]);
    messenger
        .send(
            Outgoing::new(record.group(), result_notice(state, outcome, &record)).keyboard(uploads),
        )
        .await?;

    messenger
        .answer(press.query_id, Some(outcome.toast().to_string()), false)
        .await?;

    info!(
        "Request {} in channel {} marked {} by user {}",
        press.message_id.0,
        press.chat_id.0,
        outcome.label(),
        press.actor.0
    );
    Ok(())
}
