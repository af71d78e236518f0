//! Ordered conversation log

use crmai_common::{Message, MessageId};

/// Messages in display order
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().rev().find(|m| &m.id == id)
    }

    fn get_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().rev().find(|m| &m.id == id)
    }

    /// Append streamed content. `None` when the message is gone or final.
    pub fn append_chunk(&mut self, id: &MessageId, content: &str) -> Option<&Message> {
        let message = self.get_mut(id)?;
        if message.append(content) {
            Some(message)
        } else {
            None
        }
    }

    /// Streaming -> Normal. `None` when the message is gone or already final.
    pub fn finalize(&mut self, id: &MessageId) -> Option<&Message> {
        let message = self.get_mut(id)?;
        if message.finalize() {
            Some(message)
        } else {
            None
        }
    }

    /// Replace the content with an error marker. `None` when the message is gone.
    pub fn fail(&mut self, id: &MessageId, marker: &str) -> Option<&Message> {
        let message = self.get_mut(id)?;
        message.fail(marker);
        Some(message)
    }

    /// Remove every message; returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.messages.len();
        self.messages.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }
}
