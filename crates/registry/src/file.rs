//! JSON-file registry.
//!
//! Persists every producer record in `producers.json` under the configured
//! state path. The whole map is rewritten on each save; writes go to a
//! sibling temp file first and are renamed into place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use wc_domain::error::{Error, Result};
use wc_domain::trace::TraceEvent;

use crate::record::ProducerRecord;
use crate::ProducerRegistry;

/// Producer registry backed by a JSON file.
pub struct FileRegistry {
    path: PathBuf,
    records: RwLock<BTreeMap<String, ProducerRecord>>,
}

impl FileRegistry {
    /// Load or create the registry at `state_path/producers/producers.json`.
    pub fn open(state_path: &Path) -> Result<Self> {
        let dir = state_path.join("producers");
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;

        let path = dir.join("producers.json");
        let records = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            serde_json::from_str(&raw)
                .map_err(|e| Error::Registry(format!("parsing {}: {e}", path.display())))?
        } else {
            BTreeMap::new()
        };

        tracing::info!(
            producers = records.len(),
            path = %path.display(),
            "producer registry loaded"
        );

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current records to disk.
    fn flush(&self, records: &BTreeMap<String, ProducerRecord>) -> Result<()> {
        let json = serde_json::to_string_pretty(records)
            .map_err(|e| Error::Registry(format!("serializing producers: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(Error::Io)?;
        std::fs::rename(&tmp, &self.path).map_err(Error::Io)?;
        Ok(())
    }
}

impl ProducerRegistry for FileRegistry {
    fn load(&self, producer_id: &str) -> Result<Option<ProducerRecord>> {
        Ok(self.records.read().get(producer_id).cloned())
    }

    fn save(&self, record: &ProducerRecord) -> Result<()> {
        let mut records = self.records.write();
        records.insert(record.id.clone(), record.clone());
        self.flush(&records)?;

        TraceEvent::ProducerPersisted {
            producer: record.id.clone(),
            active: record.active,
        }
        .emit();
        Ok(())
    }

    fn remove(&self, producer_id: &str) -> Result<bool> {
        let mut records = self.records.write();
        if records.remove(producer_id).is_none() {
            return Ok(false);
        }
        self.flush(&records)?;
        Ok(true)
    }

    fn list(&self) -> Result<Vec<ProducerRecord>> {
        Ok(self.records.read().values().cloned().collect())
    }
}

impl std::fmt::Debug for FileRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRegistry")
            .field("path", &self.path)
            .field("producers", &self.records.read().len())
            .finish()
    }
}
