//! The handful of Bot API calls the workflows depend on.

use crate::error::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatMember, InlineKeyboardMarkup, MessageId, ReplyParameters, UserId};
use teloxide::{ApiError, RequestError};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdminRights {
    pub can_post_messages: bool,
    pub can_edit_messages: bool,
    pub can_delete_messages: bool,
}

impl AdminRights {
    pub const FULL: AdminRights = AdminRights {
        can_post_messages: true,
        can_edit_messages: true,
        can_delete_messages: true,
    };
}

/// Someone's standing in a chat, reduced to what the workflows check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Membership {
    Owner,
    Administrator(AdminRights),
    Member,
    /// Left, kicked or never joined.
    Absent,
}

impl Membership {
    pub fn is_privileged(self) -> bool {
        matches!(self, Membership::Owner | Membership::Administrator(_))
    }

    /// Post, edit and delete rights, as needed in a moderation channel.
    pub fn can_manage_posts(self) -> bool {
        match self {
            Membership::Owner => true,
            Membership::Administrator(r) => {
                r.can_post_messages && r.can_edit_messages && r.can_delete_messages
            }
            Membership::Member | Membership::Absent => false,
        }
    }
}

impl From<&ChatMember> for Membership {
    fn from(member: &ChatMember) -> Self {
        let kind = &member.kind;
        if kind.is_owner() {
            Membership::Owner
        } else if kind.is_administrator() {
            Membership::Administrator(AdminRights {
                can_post_messages: kind.can_post_messages(),
                can_edit_messages: kind.can_edit_messages(),
                can_delete_messages: kind.can_delete_messages(),
            })
        } else if kind.is_present() {
            Membership::Member
        } else {
            Membership::Absent
        }
    }
}

#[derive(Debug, Error)]
pub enum MemberLookupError {
    #[error("chat id is invalid or unknown to the bot")]
    InvalidChat,
    #[error("user is not a participant of the chat")]
    NotParticipant,
    #[error(transparent)]
    Request(#[from] RequestError),
}

impl MemberLookupError {
    /// Sorts a failed `getChatMember` into the cases users get told about.
    pub fn classify(err: RequestError) -> Self {
        match &err {
            RequestError::Api(ApiError::ChatNotFound) => MemberLookupError::InvalidChat,
            RequestError::Api(
                ApiError::UserNotFound | ApiError::BotKicked | ApiError::BotKickedFromSupergroup,
            ) => MemberLookupError::NotParticipant,
            RequestError::Api(ApiError::Unknown(text)) => {
                let text = text.to_ascii_lowercase();
                if ["participant", "member not found", "channel_private", "not a member"]
                    .iter()
                    .any(|needle| text.contains(needle))
                {
                    MemberLookupError::NotParticipant
                } else if ["chat_id_invalid", "peer_id_invalid", "channel_invalid", "chat not found"]
                    .iter()
                    .any(|needle| text.contains(needle))
                {
                    MemberLookupError::InvalidChat
                } else {
                    MemberLookupError::Request(err)
                }
            }
            _ => MemberLookupError::Request(err),
        }
    }
}

/// A message about to be sent.
#[derive(Clone, Debug, PartialEq)]
pub struct Outgoing {
    pub chat_id: ChatId,
    pub text: String,
    pub reply_to: Option<MessageId>,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl Outgoing {
    pub fn new(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_to: None,
            keyboard: None,
        }
    }

    pub fn reply_to(mut self, message_id: MessageId) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub fn keyboard(mut self, keyboard: InlineKeyboardMarkup) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

#[async_trait]
pub trait Messenger: Send + Sync {
    /// The bot's own user ID.
    fn me(&self) -> UserId;

    async fn member(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> std::result::Result<Membership, MemberLookupError>;

    async fn send(&self, message: Outgoing) -> Result<MessageId>;

    async fn edit(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        keyboard: InlineKeyboardMarkup,
    ) -> Result<()>;

    /// Answers a callback query. `text: None` just stops the client spinner.
    async fn answer(&self, query_id: String, text: Option<String>, alert: bool) -> Result<()>;
}

/// [`Messenger`] backed by the real Bot API.
pub struct TelegramMessenger {
    bot: Bot,
    me: UserId,
}

impl TelegramMessenger {
    pub async fn connect(bot: Bot) -> Result<Self> {
        let me = bot.get_me().await?;
        Ok(Self {
            me: me.user.id,
            bot,
        })
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    fn me(&self) -> UserId {
        self.me
    }

    async fn member(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> std::result::Result<Membership, MemberLookupError> {
        match self.bot.get_chat_member(chat_id, user_id).await {
            Ok(member) => Ok(Membership::from(&member)),
            Err(e) => Err(MemberLookupError::classify(e)),
        }
    }

    async fn send(&self, message: Outgoing) -> Result<MessageId> {
        let mut req = self.bot.send_message(message.chat_id, message.text);
        if let Some(id) = message.reply_to {
            req = req.reply_parameters(ReplyParameters::new(id));
        }
        if let Some(keyboard) = message.keyboard {
            req = req.reply_markup(keyboard);
        }
        Ok(req.await?.id)
    }

    async fn edit(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        keyboard: InlineKeyboardMarkup,
    ) -> Result<()> {
        self.bot
            .edit_message_text(chat_id, message_id, text)
            .reply_markup(keyboard)
            .await?;
        Ok(())
    }

    async fn answer(&self, query_id: String, text: Option<String>, alert: bool) -> Result<()> {
        let mut req = self.bot.answer_callback_query(query_id);
        if let Some(text) = text {
            req = req.text(text).show_alert(alert);
        }
        req.await?;
        Ok(())
    }
}

#[cfg(test)]
pub mod fake {
    //! In-memory [`Messenger`] that records every call.

    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub const BOT_ID: UserId = UserId(999);

    #[derive(Clone, Copy, Debug)]
    pub enum Lookup {
        Found(Membership),
        InvalidChat,
        NotParticipant,
    }

    #[derive(Clone, Debug, PartialEq)]
    pub struct Edit {
        pub chat_id: ChatId,
        pub message_id: MessageId,
        pub text: String,
        pub keyboard: InlineKeyboardMarkup,
    }

    #[derive(Clone, Debug, PartialEq)]
    pub struct Answer {
        pub query_id: String,
        pub text: Option<String>,
        pub alert: bool,
    }

    pub struct FakeMessenger {
        lookups: Mutex<HashMap<(ChatId, UserId), Lookup>>,
        pub sent: Mutex<Vec<(MessageId, Outgoing)>>,
        pub edits: Mutex<Vec<Edit>>,
        pub answers: Mutex<Vec<Answer>>,
        next_id: AtomicI32,
        failing_edits: AtomicUsize,
    }

    impl Default for FakeMessenger {
        fn default() -> Self {
            Self {
                lookups: Mutex::new(HashMap::new()),
                sent: Mutex::new(Vec::new()),
                edits: Mutex::new(Vec::new()),
                answers: Mutex::new(Vec::new()),
                next_id: AtomicI32::new(100),
                failing_edits: AtomicUsize::new(0),
            }
        }
    }

    impl FakeMessenger {
        pub fn with_member(self, chat_id: ChatId, user_id: UserId, lookup: Lookup) -> Self {
            self.lookups
                .lock()
                .unwrap()
                .insert((chat_id, user_id), lookup);
            self
        }

        /// The next `n` edits fail without touching the message.
        pub fn failing_edits(self, n: usize) -> Self {
            self.failing_edits.store(n, Ordering::SeqCst);
            self
        }

        pub fn sent(&self) -> Vec<(MessageId, Outgoing)> {
            self.sent.lock().unwrap().clone()
        }

        pub fn edits(&self) -> Vec<Edit> {
            self.edits.lock().unwrap().clone()
        }

        pub fn answers(&self) -> Vec<Answer> {
            self.answers.lock().unwrap().clone()
        }

        /// Text of the only message sent so far.
        pub fn single_reply(&self) -> String {
            let sent = self.sent();
            assert_eq!(sent.len(), 1, "expected exactly one message, got {sent:?}");
            sent[0].1.text.clone()
        }
    }

    #[async_trait]
    impl Messenger for FakeMessenger {
        fn me(&self) -> UserId {
            BOT_ID
        }

        async fn member(
            &self,
            chat_id: ChatId,
            user_id: UserId,
        ) -> std::result::Result<Membership, MemberLookupError> {
            let lookup = self
                .lookups
                .lock()
                .unwrap()
                .get(&(chat_id, user_id))
                .copied()
                .unwrap_or(Lookup::NotParticipant);
            match lookup {
                Lookup::Found(m) => Ok(m),
                Lookup::InvalidChat => Err(MemberLookupError::InvalidChat),
                Lookup::NotParticipant => Err(MemberLookupError::NotParticipant),
            }
        }

        async fn send(&self, message: Outgoing) -> Result<MessageId> {
            let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
            self.sent.lock().unwrap().push((id, message));
            Ok(id)
        }

        async fn edit(
            &self,
            chat_id: ChatId,
            message_id: MessageId,
            text: String,
            keyboard: InlineKeyboardMarkup,
        ) -> Result<()> {
            let failing = self
                .failing_edits
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if failing.is_ok() {
                return Err(crate::error::Error::message("message edit failed"));
            }
            self.edits.lock().unwrap().push(Edit {
                chat_id,
                message_id,
                text,
                keyboard,
            });
            Ok(())
        }

        async fn answer(&self, query_id: String, text: Option<String>, alert: bool) -> Result<()> {
            self.answers.lock().unwrap().push(Answer {
                query_id,
                text,
                alert,
            });
            Ok(())
        }
    }
}
