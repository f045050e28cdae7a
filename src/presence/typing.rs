//! Typing-indicator state, deadline-based on both ends.
//!
//! No timers run anywhere: the sender polls its stop deadline, the
//! subscriber applies the auto-clear window lazily at read time. Both sides
//! use `Instant` because the deadlines are local and never persisted.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::PresenceKind;

/// Subscriber-side view of who is typing.
///
/// A typing flag clears itself `auto_clear` after the last typing event,
/// so a lost stop_typing leaves at most a brief stale indicator.
#[derive(Debug)]
pub struct TypingTracker {
    last_typing: HashMap<Uuid, Instant>,
    auto_clear: Duration,
}

impl TypingTracker {
    pub fn new(auto_clear: Duration) -> Self {
        Self {
            last_typing: HashMap::new(),
            auto_clear,
        }
    }

    /// Feeds an observed presence event into the tracker.
    pub fn observe(&mut self, user_id: Uuid, kind: PresenceKind, at: Instant) {
        match kind {
            PresenceKind::Typing => {
                self.last_typing.insert(user_id, at);
            }
            PresenceKind::StopTyping => {
                self.last_typing.remove(&user_id);
            }
        }
    }

    /// Whether `user_id` should currently be shown as typing. Expired
    /// entries are dropped here rather than by a timer.
    pub fn is_typing(&mut self, user_id: Uuid, now: Instant) -> bool {
        match self.last_typing.get(&user_id) {
            Some(&last) if now.duration_since(last) < self.auto_clear => true,
            Some(_) => {
                self.last_typing.remove(&user_id);
                false
            }
            None => false,
        }
    }

    /// Everyone currently typing, with the same lazy expiry.
    pub fn typing_users(&mut self, now: Instant) -> Vec<Uuid> {
        let auto_clear = self.auto_clear;
        self.last_typing
            .retain(|_, &mut last| now.duration_since(last) < auto_clear);
        self.last_typing.keys().copied().collect()
    }
}

/// Sender-side keystroke debouncer.
///
/// Each keystroke emits a typing event and re-arms the stop deadline;
/// stop_typing goes out once the deadline passes with no further input, or
/// immediately when a message is sent.
#[derive(Debug)]
pub struct TypingDebouncer {
    stop_deadline: Option<Instant>,
    debounce: Duration,
}

impl TypingDebouncer {
    pub fn new(debounce: Duration) -> Self {
        Self {
            stop_deadline: None,
            debounce,
        }
    }

    /// Registers a keystroke. Always returns a typing event to publish and
    /// pushes the stop deadline out by the debounce window.
    pub fn keystroke(&mut self, now: Instant) -> PresenceKind {
        self.stop_deadline = Some(now + self.debounce);
        PresenceKind::Typing
    }

    /// Returns `StopTyping` once the armed deadline has passed; fires at
    /// most once per armed period.
    pub fn poll_stop(&mut self, now: Instant) -> Option<PresenceKind> {
        match self.stop_deadline {
            Some(deadline) if now >= deadline => {
                self.stop_deadline = None;
                Some(PresenceKind::StopTyping)
            }
            _ => None,
        }
    }

    /// A sent message ends the typing episode outright: returns the
    /// stop_typing to publish right away, if one was still pending.
    pub fn message_sent(&mut self) -> Option<PresenceKind> {
        self.stop_deadline.take().map(|_| PresenceKind::StopTyping)
    }

    pub fn is_armed(&self) -> bool {
        self.stop_deadline.is_some()
    }
}
