use crate::models::LinkResult;
use parking_lot::Mutex;
use std::sync::Arc;
use url::Url;

/// Events produced while a run is in flight.
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    /// A LinkResult was appended to the result list
    Link(LinkResult),
    /// An HTML body was fetched and link extraction is about to begin
    PageStart(Url),
}

/// Fan-out of crawl events to any number of subscribers.
///
/// Sends never block the emitting task; a subscriber that dropped its
/// receiver is pruned on the next emit rather than failing the crawl.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<flume::Sender<CrawlEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> flume::Receiver<CrawlEvent> {
        let (tx, rx) = flume::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn emit(&self, event: CrawlEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
