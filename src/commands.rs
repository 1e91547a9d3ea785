use crate::error::Error;
use crate::platform::{MemberLookupError, Membership, Messenger, Outgoing};
use crate::state::AppState;
use crate::store::{InsertError, Pairing, UnpairError};
use crate::utils::url_button;
use anyhow::Result;
use log::debug;
use teloxide::types::{ChatId, InlineKeyboardMarkup};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AddError {
    #[error("Invalid Format😒\nSend Group ID & Channel ID in this format /add GroupID ChannelID.")]
    Usage,
    #[error("Group ID & Channel ID should be integer type😒.")]
    NotInteger,
    #[error("Your Group ID already Added.")]
    AlreadyAdded,
    #[error("😒Group ID is wrong.")]
    GroupInvalid,
    #[error("😁Add me in group and make me admin, then use /add.")]
    NotInGroup,
    #[error("🥲Make me admin in Group, Then use /add.")]
    NotAdminInGroup,
    #[error("😒Channel ID is wrong.")]
    ChannelInvalid,
    #[error("😁Add me in Channel and make me admin, then use /add.")]
    NotInChannel,
    #[error("🥲Make sure to give Permissions like Post Messages, Edit Messages & Delete Messages.")]
    ChannelRights,
    #[error("This Channel ID is already linked with another Group.")]
    ChannelTaken,
    #[error(transparent)]
    Platform(#[from] Error),
}

impl From<InsertError> for AddError {
    fn from(e: InsertError) -> Self {
        match e {
            InsertError::GroupTaken => AddError::AlreadyAdded,
            InsertError::ChannelTaken => AddError::ChannelTaken,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RemoveError {
    #[error("Invalid Command😒\nUse /remove GroupID.")]
    Usage,
    #[error("Group ID should be integer type😒.")]
    NotInteger,
    #[error(transparent)]
    Store(#[from] UnpairError),
}

const ADDED: &str = "Your Group and Channel has now been added Successfully🥳.";
const REMOVED: &str = "Your Channel ID & Group ID has now been Deleted😢 from our Database.\n\
                       You can add them again by using /add GroupID ChannelID.";

/// `/cmd arg1 arg2` or `/cmd@BotName arg1 arg2`.
fn parse_command(text: &str) -> (&str, Vec<&str>) {
    let mut parts = text.split_whitespace();
    let cmd_raw = parts.next().unwrap_or("");
    let cmd = cmd_raw
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("");
    (cmd, parts.collect())
}

/// Commands sent to the bot in a private chat.
pub async fn handle_command(
    messenger: &dyn Messenger,
    state: &AppState,
    chat_id: ChatId,
    text: &str,
) -> Result<()> {
    let (cmd, args) = parse_command(text);

    let reply = match cmd {
        "start" | "help" => {
            let keyboard =
                InlineKeyboardMarkup::new([[url_button("📤UPLOADS CHANNEL📤", &state.cfg.uploads_url)?]]);
            messenger
                .send(Outgoing::new(chat_id, welcome_text(state)).keyboard(keyboard))
                .await?;
            return Ok(());
        }
        "add" => match add_pairing(messenger, state, chat_id, &args).await {
            Ok(_) => ADDED.to_string(),
            Err(AddError::Platform(e)) => return Err(e.into()),
            Err(e) => e.to_string(),
        },
        "remove" => match remove_pairing(state, chat_id, &args) {
            Ok(_) => REMOVED.to_string(),
            Err(e) => e.to_string(),
        },
        "list" => list_text(state, chat_id),
        other => {
            debug!("Ignoring unknown command /{other} from chat {}", chat_id.0);
            return Ok(());
        }
    };

    messenger.send(Outgoing::new(chat_id, reply)).await?;
    Ok(())
}

fn welcome_text(state: &AppState) -> String {
    format!(
        "Hi, this is {} 🤖.\n\n\
         The requests can be registered by typing ( #request ) in Dump group.\n\
         Movies will be uploaded in UPLOADS CHANNEL only.\n\
         Rest of the things will be handled by Admins itself.\n\n\
         Admins: link a group with /add GroupID ChannelID, unlink it with /remove GroupID, \
         see your links with /list.\n\n\
         ({})",
        state.cfg.bot_title, state.cfg.team_signature
    )
}

/// `/add <groupID> <channelID>`: checks the bot's rights in both chats, then stores the pairing.
pub async fn add_pairing(
    messenger: &dyn Messenger,
    state: &AppState,
    registrar: ChatId,
    args: &[&str],
) -> std::result::Result<Pairing, AddError> {
    let [group_raw, channel_raw] = args else {
        return Err(AddError::Usage);
    };
    let (Ok(group), Ok(channel)) = (group_raw.parse::<i64>(), channel_raw.parse::<i64>()) else {
        return Err(AddError::NotInteger);
    };
    let (group_id, channel_id) = (ChatId(group), ChatId(channel));

    if state.pairings.find_by_group(group_id).is_some() {
        return Err(AddError::AlreadyAdded);
    }

    match messenger.member(group_id, messenger.me()).await {
        Ok(m) if m.is_privileged() => {}
        Ok(Membership::Absent) | Err(MemberLookupError::NotParticipant) => {
            return Err(AddError::NotInGroup)
        }
        Ok(_) => return Err(AddError::NotAdminInGroup),
        Err(MemberLookupError::InvalidChat) => return Err(AddError::GroupInvalid),
        Err(MemberLookupError::Request(e)) => return Err(Error::from(e).into()),
    }

    match messenger.member(channel_id, messenger.me()).await {
        Ok(m) if m.can_manage_posts() => {}
        Ok(Membership::Absent) | Err(MemberLookupError::NotParticipant) => {
            return Err(AddError::NotInChannel)
        }
        Ok(_) => return Err(AddError::ChannelRights),
        Err(MemberLookupError::InvalidChat) => return Err(AddError::ChannelInvalid),
        Err(MemberLookupError::Request(e)) => return Err(Error::from(e).into()),
    }

    let pairing = Pairing {
        group_id,
        channel_id,
        registrar_id: registrar,
    };
    state.pairings.insert(pairing)?;
    Ok(pairing)
}

/// `/remove <groupID>`: only the chat that added the pairing may remove it.
pub fn remove_pairing(
    state: &AppState,
    requester: ChatId,
    args: &[&str],
) -> std::result::Result<Pairing, RemoveError> {
    let [group_raw] = args else {
        return Err(RemoveError::Usage);
    };
    let group: i64 = group_raw.parse().map_err(|_| RemoveError::NotInteger)?;
    Ok(state.pairings.remove(ChatId(group), requester)?)
}

fn list_text(state: &AppState, registrar: ChatId) -> String {
    let mine = state.pairings.registered_by(registrar);
    if mine.is_empty() {
        return "You have not added any Group yet.\nUse /add GroupID ChannelID.".to_string();
    }
    let body = mine
        .iter()
        .map(|p| format!("{} → {}", p.group_id.0, p.channel_id.0))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Your Groups & Channels:\n{body}")
}
