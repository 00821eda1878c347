//! crates/gradebook_core/src/graph/chat.rs
//!
//! Chats are shared by every role: a paginated directory of chats, each with a
//! paginated message history.

use parking_lot::Mutex;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

use crate::api::Api;
use crate::cache::{Identified, Paged};
use crate::domain::{ChatInfo, EntityId, MessageInfo};
use crate::endpoints;
use crate::events::{fan_out, observed, Branch, EventHub, Outcome, PushEvent, RouteReport};
use crate::ports::{PortError, PortResult};

use super::GraphContext;

//=========================================================================================
// Messages
//=========================================================================================

#[derive(Debug)]
pub struct Message {
    info: MessageInfo,
    api: Api,
}

impl Identified for Message {
    fn id(&self) -> EntityId {
        self.info.id
    }
}

impl Message {
    pub fn info(&self) -> &MessageInfo {
        &self.info
    }

    pub fn text(&self) -> &str {
        &self.info.text
    }

    pub fn sender_id(&self) -> EntityId {
        self.info.sender_id
    }

    pub fn attachment(&self) -> Option<&str> {
        self.info.attachment.as_deref()
    }

    pub async fn download_attachment(&self, destination: &Path) -> PortResult<()> {
        let Some(link) = &self.info.attachment else {
            return Err(PortError::NotFound(format!(
                "message {} has no attachment",
                self.info.id
            )));
        };
        self.api.download(link, destination).await
    }
}

//=========================================================================================
// Chats
//=========================================================================================

#[derive(Debug)]
pub struct Chat {
    id: EntityId,
    title: String,
    last_message: Mutex<Option<MessageInfo>>,
    messages: Paged<Arc<Message>>,
    api: Api,
}

impl Identified for Chat {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl Chat {
    fn new(info: ChatInfo, ctx: &GraphContext) -> Self {
        let chat_id = info.id;
        let page_api = ctx.api.clone();
        let item_api = ctx.api.clone();
        let messages = Paged::new(
            ctx.page_size,
            move |query| {
                let api = page_api.clone();
                async move {
                    let infos: Vec<MessageInfo> =
                        api.get_with(&endpoints::chat_messages(chat_id), &query).await?;
                    Ok(infos
                        .into_iter()
                        .map(|info| Arc::new(Message { info, api: api.clone() }))
                        .collect())
                }
            },
            move |message_id| {
                let api = item_api.clone();
                async move {
                    let info: MessageInfo = api.get(&endpoints::chat_message(chat_id, message_id)).await?;
                    Ok(Arc::new(Message { info, api }))
                }
            },
        );
        Self {
            id: info.id,
            title: info.title,
            last_message: Mutex::new(info.last_message),
            messages,
            api: ctx.api.clone(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn last_message(&self) -> Option<MessageInfo> {
        self.last_message.lock().clone()
    }

    /// Newest first.
    pub fn messages(&self) -> &Paged<Arc<Message>> {
        &self.messages
    }

    pub async fn send_message(&self, text: &str) -> PortResult<Arc<Message>> {
        self.post_message(json!({ "text": text })).await
    }

    /// Uploads `file` and posts a message carrying the link the server assigned.
    pub async fn send_file(&self, file: &Path, text: Option<&str>) -> PortResult<Arc<Message>> {
        let link = self.api.upload(&endpoints::chat_files(self.id), file).await?;
        self.post_message(json!({ "text": text.unwrap_or_default(), "attachment": link }))
            .await
    }

    async fn post_message(&self, body: serde_json::Value) -> PortResult<Arc<Message>> {
        let info: MessageInfo = self.api.post(&endpoints::chat_messages(self.id), &body).await?;
        let message = Arc::new(Message {
            info: info.clone(),
            api: self.api.clone(),
        });
        if self.messages.is_realized() {
            self.messages.insert_head(message.clone());
        }
        *self.last_message.lock() = Some(info);
        Ok(message)
    }

    /// chat-message-received. The chat itself is materialized, so its last message
    /// is always refreshed; the history only if it was loaded.
    pub(crate) async fn apply_message(&self, message_id: EntityId) -> PortResult<Outcome> {
        let info: MessageInfo = self
            .api
            .get(&endpoints::chat_message(self.id, message_id))
            .await?;
        if self.messages.is_realized() {
            self.messages.insert_head(Arc::new(Message {
                info: info.clone(),
                api: self.api.clone(),
            }));
        }
        let mut last = self.last_message.lock();
        if last.as_ref().map_or(true, |current| current.sent_at <= info.sent_at) {
            *last = Some(info);
        }
        Ok(Outcome::Applied)
    }
}

//=========================================================================================
// Directory
//=========================================================================================

/// The chats the signed-in user takes part in.
#[derive(Debug)]
pub struct ChatDirectory {
    chats: Paged<Arc<Chat>>,
    ctx: GraphContext,
}

impl ChatDirectory {
    pub(crate) fn new(ctx: &GraphContext) -> Self {
        let page_ctx = ctx.clone();
        let item_ctx = ctx.clone();
        let chats = Paged::new(
            ctx.page_size,
            move |query| {
                let ctx = page_ctx.clone();
                async move {
                    let infos: Vec<ChatInfo> = ctx.api.get_with(endpoints::chats(), &query).await?;
                    Ok(infos
                        .into_iter()
                        .map(|info| Arc::new(Chat::new(info, &ctx)))
                        .collect())
                }
            },
            move |chat_id| {
                let ctx = item_ctx.clone();
                async move {
                    let info: ChatInfo = ctx.api.get(&endpoints::chat(chat_id)).await?;
                    Ok(Arc::new(Chat::new(info, &ctx)))
                }
            },
        );
        Self {
            chats,
            ctx: ctx.clone(),
        }
    }

    pub fn chats(&self) -> &Paged<Arc<Chat>> {
        &self.chats
    }

    pub async fn create_chat(&self, title: &str, member_ids: &[EntityId]) -> PortResult<Arc<Chat>> {
        let info: ChatInfo = self
            .ctx
            .api
            .post(endpoints::chats(), &json!({ "title": title, "memberIds": member_ids }))
            .await?;
        let chat = Arc::new(Chat::new(info, &self.ctx));
        if self.chats.is_realized() {
            self.chats.insert_head(chat.clone());
        }
        Ok(chat)
    }

    pub(crate) async fn route(&self, event: &PushEvent, hub: &EventHub) -> RouteReport {
        let branches: Vec<Branch<'_>> = match event {
            PushEvent::ChatCreated { chat_id } => {
                vec![observed(hub, event, self.apply_chat_created(*chat_id))]
            }
            PushEvent::ChatMessageReceived { chat_id, message_id } => {
                vec![observed(hub, event, self.apply_message(*chat_id, *message_id))]
            }
            _ => Vec::new(),
        };
        fan_out(branches).await
    }

    async fn apply_chat_created(&self, chat_id: EntityId) -> PortResult<Outcome> {
        if !self.chats.is_realized() {
            return Ok(Outcome::Dropped);
        }
        Ok(match self.chats.append(chat_id).await? {
            true => Outcome::Applied,
            false => Outcome::Dropped,
        })
    }

    async fn apply_message(&self, chat_id: EntityId, message_id: EntityId) -> PortResult<Outcome> {
        match self.chats.find_by_id(chat_id) {
            Some(chat) => chat.apply_message(message_id).await,
            None => Ok(Outcome::Dropped),
        }
    }
}
