// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Notice queue with TTL + dedupe for Weft tools.
//!
//! The snapshot engine reports store failures, restore problems, and
//! capture outcomes here; a presentation layer polls [`NoticeQueue::visible`]
//! and renders however it likes. Timing is explicit — callers pass `now` —
//! so engine tests drive the queue without real clocks.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Notice severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Informational note.
    Info,
    /// Warning that may need attention.
    Warn,
    /// Error requiring user awareness.
    Error,
}

/// Identifier for a notice entry.
pub type NoticeId = u64;

/// Notice data held in the queue.
#[derive(Debug, Clone)]
pub struct Notice {
    /// Stable identifier.
    pub id: NoticeId,
    /// Severity.
    pub kind: NoticeKind,
    /// Short title line.
    pub title: String,
    /// Optional body text.
    pub body: Option<String>,
    /// Time-to-live duration.
    pub ttl: Duration,
    /// Creation time.
    pub created: Instant,
}

/// Bounded in-memory notice queue with TTL and a dedupe window.
#[derive(Debug)]
pub struct NoticeQueue {
    queue: VecDeque<Notice>,
    max: usize,
    dedupe_window: Duration,
    next_id: NoticeId,
}

impl NoticeQueue {
    /// Default time-to-live for pushed notices.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(6);

    /// Create a new queue with a maximum length.
    #[must_use]
    pub fn new(max: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            max,
            dedupe_window: Duration::from_millis(500),
            next_id: 1,
        }
    }

    /// Push a notice, refreshing an identical recent entry (same kind,
    /// title, and body within the dedupe window) instead of duplicating it.
    pub fn push<S, B>(&mut self, kind: NoticeKind, title: S, body: B, now: Instant) -> NoticeId
    where
        S: Into<String>,
        B: Into<Option<String>>,
    {
        let title = title.into();
        let body_opt = body.into();

        if let Some(existing) = self.queue.iter_mut().find(|n| {
            n.kind == kind
                && n.title == title
                && n.body == body_opt
                && now.duration_since(n.created) <= self.dedupe_window
        }) {
            existing.created = now;
            return existing.id;
        }

        let id = self.next_id;
        self.next_id += 1;
        let notice = Notice {
            id,
            kind,
            title,
            body: body_opt,
            ttl: Self::DEFAULT_TTL,
            created: now,
        };
        if self.queue.len() == self.max {
            self.queue.pop_front();
        }
        self.queue.push_back(notice);
        id
    }

    /// Drop expired notices (call once per frame/tick).
    pub fn retain_visible(&mut self, now: Instant) {
        self.queue.retain(|n| now.duration_since(n.created) < n.ttl);
    }

    /// Currently visible notices, oldest first.
    #[must_use]
    pub fn visible(&self, now: Instant) -> Vec<Notice> {
        self.queue
            .iter()
            .filter(|n| now.duration_since(n.created) < n.ttl)
            .cloned()
            .collect()
    }

    /// Number of entries currently queued (including expired, pre-retain).
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for NoticeQueue {
    fn default() -> Self {
        Self::new(16)
    }
}
