//! Client-side message merging
//!
//! Channel delivery is at-least-once and may reorder publishes that come
//! from different server instances. Consumers keep a `MessageTimeline` and
//! merge every delivered message (and every history fetch) into it by id.

use std::collections::HashSet;
use uuid::Uuid;

use crate::types::Message;

/// Messages of one conversation, deduplicated by id and ordered by
/// `(sent_at, id)`.
#[derive(Debug, Default, Clone)]
pub struct MessageTimeline {
    messages: Vec<Message>,
    seen: HashSet<Uuid>,
}

impl MessageTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one message. Returns `false` if it was already present.
    pub fn merge(&mut self, message: Message) -> bool {
        if !self.seen.insert(message.id) {
            return false;
        }

        let key = (message.sent_at, message.id);
        let pos = self
            .messages
            .partition_point(|m| (m.sent_at, m.id) <= key);
        self.messages.insert(pos, message);
        true
    }

    /// Merge a batch (e.g. a history fetch). Returns how many were new.
    pub fn extend<I: IntoIterator<Item = Message>>(&mut self, messages: I) -> usize {
        messages
            .into_iter()
            .map(|m| self.merge(m))
            .filter(|new| *new)
            .count()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SenderRole;
    use time::{Duration, OffsetDateTime};

    fn message_at(conversation_id: Uuid, offset_secs: i64, text: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id,
            text: text.to_string(),
            sender: SenderRole::Customer,
            sender_id: None,
            sent_at: OffsetDateTime::UNIX_EPOCH + Duration::seconds(offset_secs),
            metadata: None,
        }
    }

    #[test]
    fn test_duplicate_delivery_is_ignored() {
        let conversation_id = Uuid::new_v4();
        let mut timeline = MessageTimeline::new();
        let msg = message_at(conversation_id, 10, "Hello");

        assert!(timeline.merge(msg.clone()));
        assert!(!timeline.merge(msg));
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn test_out_of_order_delivery_is_sorted() {
        let conversation_id = Uuid::new_v4();
        let mut timeline = MessageTimeline::new();

        let first = message_at(conversation_id, 1, "first");
        let second = message_at(conversation_id, 2, "second");
        let third = message_at(conversation_id, 3, "third");

        timeline.merge(third.clone());
        timeline.merge(first.clone());
        timeline.merge(second.clone());

        let texts: Vec<&str> = timeline.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_history_merge_counts_new_messages() {
        let conversation_id = Uuid::new_v4();
        let mut timeline = MessageTimeline::new();

        let pushed = message_at(conversation_id, 5, "pushed");
        timeline.merge(pushed.clone());

        let history = vec![message_at(conversation_id, 1, "older"), pushed];
        assert_eq!(timeline.extend(history), 1);
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.messages()[0].text, "older");
    }

    #[test]
    fn test_batch_with_repeats_keeps_one_copy() {
        let conversation_id = Uuid::new_v4();
        let mut timeline = MessageTimeline::new();

        let a = message_at(conversation_id, 1, "a");
        let b = message_at(conversation_id, 2, "b");
        let batch = vec![b.clone(), a.clone(), b, a];

        assert_eq!(timeline.extend(batch), 2);
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.messages()[1].text, "b");
    }
}
