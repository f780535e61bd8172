//! User-visible signals raised by the client core.
//!
//! Front ends subscribe to a `Notifier` and render each `Notice` however
//! they like (toast, status line, log).

use tokio::sync::broadcast;

/// Capacity of the notice channel. Slow subscribers lag and skip old notices.
const NOTICE_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Every query strategy failed and no cached markers cover the area.
    ServiceUnavailable,

    /// Every query strategy failed; `count` markers are being served from
    /// an expired snapshot.
    StaleData { count: usize },

    /// A marker was created, changed or removed. Cached results were dropped.
    MarkersUpdated,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::ServiceUnavailable => {
                write!(f, "Marker service is unavailable, please try again later")
            }
            Notice::StaleData { count } => {
                write!(f, "Showing {} cached markers, data may be out of date", count)
            }
            Notice::MarkersUpdated => write!(f, "Markers updated"),
        }
    }
}

/// Broadcasts notices to any number of subscribers.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(NOTICE_CAPACITY);
        Self { sender }
    }

    pub fn emit(&self, notice: Notice) {
        // No receivers is fine
        let _ = self.sender.send(notice);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
