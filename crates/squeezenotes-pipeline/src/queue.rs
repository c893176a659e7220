//! Work queue port carrying compression tasks.
//!
//! Semantics follow a visibility-timeout queue: a received message stays in
//! the queue, hidden from other receivers until its visibility timeout
//! lapses, and is removed only by an explicit `delete` with the receipt of
//! the latest delivery. Anything not deleted is delivered again.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::StoreError;

/// One delivery of a queued message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Stable id of the underlying message
    pub message_id: String,
    /// Handle for acknowledging this particular delivery
    pub receipt: String,
    /// Raw message body
    pub body: String,
    /// How many times the message has been delivered, including this one
    pub receive_count: u32,
}

/// A message removed from circulation because it could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// Stable id of the message
    pub message_id: String,
    /// Raw message body
    pub body: String,
    /// Deliveries before it was dead-lettered
    pub receive_count: u32,
    /// Why it was dead-lettered
    pub reason: String,
}

/// Durable at-least-once queue with explicit per-message acknowledgment.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Enqueue a message body. Returns the message id.
    async fn send(&self, body: String) -> Result<String, StoreError>;

    /// Receive up to `max` visible messages, hiding each for `visibility`.
    async fn receive(&self, max: usize, visibility: Duration) -> Result<Vec<Delivery>, StoreError>;

    /// Acknowledge (remove) the message behind `receipt`.
    async fn delete(&self, receipt: &str) -> Result<(), StoreError>;

    /// Move the message behind `receipt` to the dead-letter list.
    async fn dead_letter(&self, receipt: &str, reason: &str) -> Result<(), StoreError>;
}

#[derive(Debug)]
struct QueuedMessage {
    id: String,
    body: String,
    receive_count: u32,
    invisible_until: Option<Instant>,
    receipt: Option<String>,
}

impl QueuedMessage {
    fn is_visible(&self, now: Instant) -> bool {
        self.invisible_until.map_or(true, |until| until <= now)
    }
}

#[derive(Debug, Default)]
struct QueueState {
    messages: VecDeque<QueuedMessage>,
    dead_letters: Vec<DeadLetter>,
}

impl QueueState {
    fn position(&self, receipt: &str) -> Option<usize> {
        self.messages
            .iter()
            .position(|m| m.receipt.as_deref() == Some(receipt))
    }
}

/// In-memory visibility-timeout queue.
#[derive(Debug, Default)]
pub struct MemoryWorkQueue {
    state: Mutex<QueueState>,
}

impl MemoryWorkQueue {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages still in the queue, visible or in flight.
    pub async fn len(&self) -> usize {
        self.state.lock().await.messages.len()
    }

    /// True when no messages remain (dead letters excluded).
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of the dead-letter list.
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().await.dead_letters.clone()
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    async fn send(&self, body: String) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let mut state = self.state.lock().await;
        state.messages.push_back(QueuedMessage {
            id: id.clone(),
            body,
            receive_count: 0,
            invisible_until: None,
            receipt: None,
        });
        Ok(id)
    }

    async fn receive(&self, max: usize, visibility: Duration) -> Result<Vec<Delivery>, StoreError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let mut out = Vec::new();
        for message in state.messages.iter_mut() {
            if out.len() >= max {
                break;
            }
            if !message.is_visible(now) {
                continue;
            }
            let receipt = Uuid::new_v4().to_string();
            message.receive_count += 1;
            message.invisible_until = Some(now + visibility);
            message.receipt = Some(receipt.clone());
            out.push(Delivery {
                message_id: message.id.clone(),
                receipt,
                body: message.body.clone(),
                receive_count: message.receive_count,
            });
        }
        Ok(out)
    }

    async fn delete(&self, receipt: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let pos = state
            .position(receipt)
            .ok_or_else(|| StoreError::NotFound(format!("receipt {}", receipt)))?;
        state.messages.remove(pos);
        Ok(())
    }

    async fn dead_letter(&self, receipt: &str, reason: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let pos = state
            .position(receipt)
            .ok_or_else(|| StoreError::NotFound(format!("receipt {}", receipt)))?;
        if let Some(message) = state.messages.remove(pos) {
            state.dead_letters.push(DeadLetter {
                message_id: message.id,
                body: message.body,
                receive_count: message.receive_count,
                reason: reason.to_string(),
            });
        }
        Ok(())
    }
}
