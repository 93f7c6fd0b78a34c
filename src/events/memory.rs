use super::{EventRecord, EventRecorder, EventType};
use crate::core::{ResourceId, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Event log kept in memory, in append order
#[derive(Default)]
pub struct InMemoryEventRecorder {
    events: RwLock<Vec<EventRecord>>,
}

impl InMemoryEventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<EventRecord> {
        self.events.read().await.clone()
    }

    pub async fn events_for(&self, id: ResourceId) -> Vec<EventRecord> {
        self.events
            .read()
            .await
            .iter()
            .filter(|event| event.resource_id == Some(id))
            .cloned()
            .collect()
    }

    pub async fn count_of(&self, event_type: EventType) -> usize {
        self.events
            .read()
            .await
            .iter()
            .filter(|event| event.event_type == event_type)
            .count()
    }
}

#[async_trait]
impl EventRecorder for InMemoryEventRecorder {
    async fn record(&self, event: EventRecord) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }
}
