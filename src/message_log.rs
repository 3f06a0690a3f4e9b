use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

pub const MAX_MESSAGES: usize = 20;

#[derive(Debug, Clone)]
pub struct Message {
    pub created_at: DateTime<Utc>,
    pub username: String,
    pub text: String,
}

/// Shared feed of the most recent messages, newest first.
///
/// Lives for the lifetime of the process and starts out empty.
pub struct MessageLog {
    capacity: usize,
    messages: Mutex<VecDeque<Message>>,
}

impl MessageLog {
    pub fn new() -> MessageLog {
        MessageLog::with_capacity(MAX_MESSAGES)
    }

    pub fn with_capacity(capacity: usize) -> MessageLog {
        MessageLog {
            capacity,
            messages: Mutex::new(VecDeque::with_capacity(capacity + 1)),
        }
    }

    pub fn append(&self, username: &str, text: &str) {
        let message = Message {
            created_at: Utc::now(),
            username: username.to_string(),
            text: text.to_string(),
        };

        let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        messages.push_front(message);
        messages.truncate(self.capacity);
    }

    pub fn list_all(&self) -> Vec<Message> {
        let messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        messages.iter().cloned().collect()
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        MessageLog::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::thread;

    fn texts(log: &MessageLog) -> Vec<String> {
        log.list_all().into_iter().map(|m| m.text).collect()
    }

    #[test]
    fn starts_empty() {
        assert!(MessageLog::new().list_all().is_empty());
    }

    #[test]
    fn newest_message_comes_first() {
        let log = MessageLog::new();
        log.append("alice", "first");
        log.append("bob", "second");

        let messages = log.list_all();
        assert_eq!(messages[0].text, "second");
        assert_eq!(messages[0].username, "bob");
        assert_eq!(messages[1].text, "first");
        assert_eq!(messages[1].username, "alice");
    }

    #[test]
    fn keeps_only_the_twenty_most_recent() {
        let log = MessageLog::new();
        for i in 1..=25 {
            log.append("alice", &format!("m{}", i));
        }

        let expected: Vec<String> = (6..=25).rev().map(|i| format!("m{}", i)).collect();
        assert_eq!(texts(&log), expected);
    }

    #[test]
    fn snapshot_is_detached_from_the_log() {
        let log = MessageLog::new();
        log.append("alice", "before");
        let snapshot = log.list_all();
        log.append("alice", "after");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.list_all().len(), 2);
    }

    #[test]
    fn concurrent_appends_respect_the_cap() {
        let log = Arc::new(MessageLog::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = log.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        log.append("writer", &format!("{}-{}", t, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.list_all().len(), MAX_MESSAGES);
    }
}
