use tokio::sync::mpsc;

use crate::common::{ChatEvent, DeliveryStatus, Message};

/// Where the pipeline renders messages. Implemented by the UI binding; the
/// pipeline never reaches into widget state directly.
pub trait MessageSink: Send + Sync {
    fn display(&self, message: &Message, status: DeliveryStatus);
    fn delivery(&self, message_id: &str, status: DeliveryStatus);
}

/// Forwards pipeline output to the UI thread as `ChatEvent`s.
pub struct ChannelSink {
    events: mpsc::Sender<ChatEvent>,
}

impl ChannelSink {
    pub fn new(events: mpsc::Sender<ChatEvent>) -> Self {
        Self { events }
    }

    /// Never waits on the UI. Returns false if the event was dropped.
    fn emit(&self, event: ChatEvent) -> bool {
        match self.events.try_send(event) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("Failed to forward event to UI: {err}");
                false
            }
        }
    }
}

impl MessageSink for ChannelSink {
    fn display(&self, message: &Message, status: DeliveryStatus) {
        let shown = self.emit(ChatEvent::MessageDisplayed {
            message: message.clone(),
            status,
        });
        if !shown {
            // The message still goes through the rest of the pipeline.
            log::error!(
                "Message {} was accepted but could not be shown: UI event queue unavailable",
                message.id
            );
        }
    }

    fn delivery(&self, message_id: &str, status: DeliveryStatus) {
        self.emit(ChatEvent::DeliveryUpdated {
            id: message_id.to_string(),
            status,
        });
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Sender;

    #[test]
    fn full_ui_queue_never_blocks_the_pipeline() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = ChannelSink::new(tx);
        let first = Message::new("uno".to_string(), Sender::User, "es");
        let second = Message::new("dos".to_string(), Sender::User, "es");

        sink.display(&first, DeliveryStatus::Sending);
        sink.display(&second, DeliveryStatus::Sending);
        sink.delivery(&second.id, DeliveryStatus::Delivered);

        match rx.try_recv() {
            Ok(ChatEvent::MessageDisplayed { message, status }) => {
                assert_eq!(message.id, first.id);
                assert_eq!(status, DeliveryStatus::Sending);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_ui_is_tolerated() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let sink = ChannelSink::new(tx);
        let message = Message::new("hola".to_string(), Sender::User, "es");

        sink.display(&message, DeliveryStatus::Sending);
        sink.delivery(&message.id, DeliveryStatus::Queued);
    }
}
