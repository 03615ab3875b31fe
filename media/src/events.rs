//! Change notifications raised by managed media.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use talkbook_audio::PcmFormatInfo;

/// A change to managed media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// A media data entity was registered.
    MediaDataAdded { uid: String },
    /// A media data entity was deregistered.
    MediaDataRemoved { uid: String },
    /// Audio of `duration` was inserted at `point`.
    DataInserted {
        uid: Option<String>,
        point: Duration,
        duration: Duration,
    },
    /// Audio of `duration` starting at `begin` was removed.
    DataRemoved {
        uid: Option<String>,
        begin: Duration,
        duration: Duration,
    },
    /// The PCM format of an audio entity changed.
    FormatChanged {
        uid: Option<String>,
        previous: PcmFormatInfo,
        current: PcmFormatInfo,
    },
}

impl MediaEvent {
    /// UID of the entity the event is about, if it is registered.
    pub fn uid(&self) -> Option<&str> {
        match self {
            MediaEvent::MediaDataAdded { uid } | MediaEvent::MediaDataRemoved { uid } => {
                Some(uid.as_str())
            }
            MediaEvent::DataInserted { uid, .. }
            | MediaEvent::DataRemoved { uid, .. }
            | MediaEvent::FormatChanged { uid, .. } => uid.as_deref(),
        }
    }
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&MediaEvent) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    filter: Option<String>,
    handler: Handler,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    list: Vec<Subscriber>,
}

/// Fan-out of [`MediaEvent`]s to registered handlers.
///
/// Handlers run synchronously on the publishing thread, after the publisher
/// has released its own locks. A handler may subscribe or unsubscribe.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for every event.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&MediaEvent) + Send + Sync + 'static,
    {
        self.add(None, Arc::new(handler))
    }

    /// Registers a handler for events about the entity `uid`.
    pub fn subscribe_to<F>(&self, uid: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&MediaEvent) + Send + Sync + 'static,
    {
        self.add(Some(uid.to_string()), Arc::new(handler))
    }

    fn add(&self, filter: Option<String>, handler: Handler) -> SubscriptionId {
        let mut subs = self.subscribers.lock();
        subs.next_id += 1;
        let id = SubscriptionId(subs.next_id);
        subs.list.push(Subscriber {
            id,
            filter,
            handler,
        });
        id
    }

    /// Removes a handler. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.lock();
        let before = subs.list.len();
        subs.list.retain(|s| s.id != id);
        subs.list.len() != before
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.subscribers.lock().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `event` to every matching handler.
    pub fn publish(&self, event: &MediaEvent) {
        let handlers: Vec<Handler> = {
            let subs = self.subscribers.lock();
            subs.list
                .iter()
                .filter(|s| match &s.filter {
                    Some(uid) => event.uid() == Some(uid.as_str()),
                    None => true,
                })
                .map(|s| Arc::clone(&s.handler))
                .collect()
        };
        for handler in handlers {
            handler(event);
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.len())
            .finish()
    }
}
