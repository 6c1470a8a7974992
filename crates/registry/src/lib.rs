//! `wc-registry`: persistence of producer state.
//!
//! The consumer core saves a [`ProducerRecord`] through a
//! [`ProducerRegistry`] on every meaningful state transition (endpoint
//! reconfiguration, registration changes, active flag flips).
//!
//! | Implementation   | Backing store                                   |
//! |------------------|-------------------------------------------------|
//! | [`FileRegistry`] | `<state_path>/producers/producers.json`         |
//! | [`MemoryRegistry`] | process memory (tests, ephemeral consumers)   |

pub mod file;
pub mod memory;
pub mod record;

pub use file::FileRegistry;
pub use memory::MemoryRegistry;
pub use record::ProducerRecord;

use wc_domain::error::Result;

/// Storage for persisted producer records.
///
/// Implementations must be safe to call from many request threads at once.
pub trait ProducerRegistry: Send + Sync {
    fn load(&self, producer_id: &str) -> Result<Option<ProducerRecord>>;

    /// Insert or replace the record with the same id.
    fn save(&self, record: &ProducerRecord) -> Result<()>;

    /// Returns whether a record was removed.
    fn remove(&self, producer_id: &str) -> Result<bool>;

    /// All records, sorted by id.
    fn list(&self) -> Result<Vec<ProducerRecord>>;
}
