use crate::db::stripe_event_log_repository::StripeEventLogRepository;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct MockStripeEventLogRepository {
    events: Arc<Mutex<HashMap<String, String>>>,
    pub checks: Arc<Mutex<usize>>,
    pub inserts: Arc<Mutex<usize>>,
}

impl MockStripeEventLogRepository {
    pub fn recorded_events(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.events.lock().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn recorded_type(&self, event_id: &str) -> Option<String> {
        self.events.lock().unwrap().get(event_id).cloned()
    }
}

#[async_trait]
impl StripeEventLogRepository for MockStripeEventLogRepository {
    async fn has_processed_event(&self, event_id: &str) -> Result<bool, sqlx::Error> {
        let mut guard = self.checks.lock().unwrap();
        *guard += 1;
        Ok(self.events.lock().unwrap().contains_key(event_id))
    }

    async fn record_event(&self, event_id: &str, event_type: &str) -> Result<(), sqlx::Error> {
        let mut guard = self.inserts.lock().unwrap();
        *guard += 1;
        self.events
            .lock()
            .unwrap()
            .entry(event_id.to_string())
            .or_insert_with(|| event_type.to_string());
        Ok(())
    }
}
