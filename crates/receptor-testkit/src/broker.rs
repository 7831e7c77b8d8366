use async_trait::async_trait;
use receptor_core::{DomainEvent, EventBroker, InfraError};
use std::sync::Mutex;

/// Records every published event in arrival order. Never fails — tests that
/// need to exercise the outbox-on-failure path use a purpose-built stub
/// instead of this one.
#[derive(Default)]
pub struct InMemoryEventBroker {
    published: Mutex<Vec<DomainEvent>>,
}

#[async_trait]
impl EventBroker for InMemoryEventBroker {
    async fn publish(&self, _topic: &str, event: DomainEvent) -> Result<(), InfraError> {
        self.published.lock().unwrap().push(event);
        Ok(())
    }
}

impl InMemoryEventBroker {
    pub fn events(&self) -> Vec<DomainEvent> {
        self.published.lock().unwrap().clone()
    }
}

/// Fails every publish, for exercising the Event Publisher's outbox fallback
/// (spec.md §4.H).
#[derive(Default)]
pub struct FailingEventBroker;

#[async_trait]
impl EventBroker for FailingEventBroker {
    async fn publish(&self, _topic: &str, _event: DomainEvent) -> Result<(), InfraError> {
        Err(InfraError::Unavailable)
    }
}
