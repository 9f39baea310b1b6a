use anyhow::Result;
use async_trait::async_trait;
use serenity::{
    http::Http,
    model::id::{ChannelId, MessageId},
};
use std::sync::Arc;

use crate::ui::{Notice, Notifier};

/// Envía los avisos como mensajes al canal de texto donde se usó el comando
pub struct ChannelNotifier {
    http: Arc<Http>,
    channel: ChannelId,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>, channel: ChannelId) -> Self {
        Self { http, channel }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn send(&self, notice: Notice) -> Result<MessageId> {
        let message = self.channel.say(&self.http, notice.to_string()).await?;
        Ok(message.id)
    }

    async fn delete(&self, message: MessageId) -> Result<()> {
        self.channel.delete_message(&self.http, message).await?;
        Ok(())
    }
}
