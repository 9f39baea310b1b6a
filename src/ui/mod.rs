//! # UI
//!
//! User-visible output. The player only produces [`Notice`] values and hands
//! them to a [`Notifier`]; the bot layer decides how they reach the chat.

pub mod notices;

use anyhow::Result;
use async_trait::async_trait;
use serenity::model::id::MessageId;

pub use notices::{queue_pages, Notice};

/// Canal de salida de un comando (normalmente el canal de texto donde se invocó)
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Envía un aviso y devuelve el id del mensaje creado
    async fn send(&self, notice: Notice) -> Result<MessageId>;

    /// Borra un mensaje enviado previamente
    async fn delete(&self, message: MessageId) -> Result<()>;
}
