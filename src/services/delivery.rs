// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hand-off of composed notifications to the delivery collaborator.

use crate::models::NotificationContent;
use std::future::Future;
use std::sync::Mutex;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Notification receiver closed")]
    Closed,

    #[error("Notification rejected: {0}")]
    Rejected(String),
}

/// Schedules notifications for display.
pub trait NotificationSink: Send + Sync {
    fn deliver(
        &self,
        content: NotificationContent,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Forwards notifications over a channel to whoever displays them.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<NotificationContent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NotificationContent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    async fn deliver(&self, content: NotificationContent) -> Result<(), DeliveryError> {
        self.tx.send(content).map_err(|_| DeliveryError::Closed)
    }
}

/// Keeps every delivered notification in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<NotificationContent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<NotificationContent> {
        self.delivered
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

impl NotificationSink for RecordingSink {
    async fn deliver(&self, content: NotificationContent) -> Result<(), DeliveryError> {
        self.delivered
            .lock()
            .map_err(|_| DeliveryError::Rejected("recording lock poisoned".to_string()))?
            .push(content);
        Ok(())
    }
}
