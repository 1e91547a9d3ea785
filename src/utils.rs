// src/utils.rs
use crate::error::Result;
use teloxide::types::{ChatId, InlineKeyboardButton, Message, MessageId};
use url::Url;

/// Prefix Telegram puts in front of supergroup and channel IDs.
const PRIVATE_CHAT_PREFIX: &str = "-100";

/// Path segment used by `t.me/c/...` links.
///
/// IDs carrying the `-100` prefix lose it. Anything else loses its first four
/// characters, which only yields a working link for IDs of the usual width.
pub fn link_path(chat_id: ChatId) -> String {
    let raw = chat_id.0.to_string();
    match raw.strip_prefix(PRIVATE_CHAT_PREFIX) {
        Some(rest) => rest.to_string(),
        None => raw.get(PRIVATE_CHAT_PREFIX.len()..).unwrap_or_default().to_string(),
    }
}

/// Deep link that opens `message_id` inside `chat_id`.
pub fn message_link(chat_id: ChatId, message_id: MessageId) -> String {
    format!("https://t.me/c/{}/{}", link_path(chat_id), message_id.0)
}

pub fn url_button(text: &str, link: &str) -> Result<InlineKeyboardButton> {
    Ok(InlineKeyboardButton::url(text, Url::parse(link)?))
}

/// Name shown for whoever sent `msg`: the sending chat for anonymous posts,
/// else the user's first name.
pub fn sender_name(msg: &Message) -> String {
    if let Some(title) = msg.sender_chat.as_ref().and_then(|chat| chat.title()) {
        return title.to_string();
    }
    msg.from
        .as_ref()
        .map(|u| u.first_name.trim())
        .filter(|name| !name.is_empty())
        .unwrap_or("Anonymous")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_private_prefix() {
        assert_eq!(link_path(ChatId(-1001234567890)), "1234567890");
        assert_eq!(link_path(ChatId(-100)), "");
    }

    #[test]
    fn fallback_drops_four_chars() {
        // Basic groups have no -100 prefix; the fallback keeps the old behaviour.
        assert_eq!(link_path(ChatId(-123456789)), "456789");
        assert_eq!(link_path(ChatId(-1234)), "4");
        assert_eq!(link_path(ChatId(-123)), "");
        assert_eq!(link_path(ChatId(-12)), "");
        assert_eq!(link_path(ChatId(1234)), "");
        assert_eq!(link_path(ChatId(12345)), "5");
        // "-1001" still starts with "-100".
        assert_eq!(link_path(ChatId(-1001)), "1");
    }

    #[test]
    fn builds_message_links() {
        assert_eq!(
            message_link(ChatId(-1001234), MessageId(77)),
            "https://t.me/c/1234/77"
        );
    }

    #[test]
    fn url_buttons_reject_garbage() {
        assert!(url_button("ok", "https://t.me/c/1/2").is_ok());
        assert!(url_button("bad", "not a url").is_err());
    }
}
