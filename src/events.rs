use crate::entities::shipment::OrderStatus;
use tokio::sync::mpsc;
use tracing::info;

/// Domain events emitted by the services after their transactions commit.
#[derive(Debug, Clone)]
pub enum Event {
    ShipmentCreated(i32),
    ShipmentDeleted(i32),
    StatusAppended {
        shipment_id: i32,
        status: OrderStatus,
        ord: i32,
    },
    HistoryReplaced {
        shipment_id: i32,
        count: usize,
    },
    ImportCompleted {
        processed: usize,
        succeeded: usize,
        failed: usize,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
        self.tx.send(event).await
    }
}

/// Creates a bounded event channel.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, logging each event. Runs until every sender is
/// dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        info!(?event, "domain event");
    }
}
