use std::collections::HashMap;

use parking_lot::RwLock;

use wc_domain::error::Result;

use crate::record::ProducerRecord;
use crate::ProducerRegistry;

/// In-memory registry; state is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    records: RwLock<HashMap<String, ProducerRecord>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl ProducerRegistry for MemoryRegistry {
    fn load(&self, producer_id: &str) -> Result<Option<ProducerRecord>> {
        Ok(self.records.read().get(producer_id).cloned())
    }

    fn save(&self, record: &ProducerRecord) -> Result<()> {
        self.records
            .write()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn remove(&self, producer_id: &str) -> Result<bool> {
        Ok(self.records.write().remove(producer_id).is_some())
    }

    fn list(&self) -> Result<Vec<ProducerRecord>> {
        let mut records: Vec<_> = self.records.read().values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}
