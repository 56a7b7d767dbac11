use crate::document::DocumentRef;
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum DocumentEvent {
    /// Content changed outside of this process.
    ContentChanged { document: DocumentRef },
    /// This process wrote the document.
    Written { document: DocumentRef },
}

impl DocumentEvent {
    pub fn document(&self) -> &DocumentRef {
        match self {
            DocumentEvent::ContentChanged { document } | DocumentEvent::Written { document } => {
                document
            }
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DocumentEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.tx.subscribe()
    }

    pub fn send(&self, event: DocumentEvent) {
        let _ = self.tx.send(event);
    }
}
