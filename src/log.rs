//! Append-only decision log storage
use std::sync::Arc;

use crate::decision::Decision;

/// The durable store behind the engine. Append-only: no update, no delete.
/// `read_all` must return records in insertion order so that equal-timestamp
/// decisions tie-break deterministically.
pub trait DecisionLog: Send + Sync {
    fn append(&self, decision: &Decision) -> anyhow::Result<()>;
    fn read_all(&self) -> anyhow::Result<Vec<Decision>>;
}

/// Sled-backed log. Keys are big-endian u64 sequence numbers from the db's
/// monotonic id generator, so lexicographic scan order equals append order.
pub struct SledDecisionLog {
    instance: Arc<sled::Db>,
}

impl SledDecisionLog {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }
}

impl DecisionLog for SledDecisionLog {
    fn append(&self, decision: &Decision) -> anyhow::Result<()> {
        let seq = self.instance.generate_id()?;
        let cbor = minicbor::to_vec(decision)?;
        self.instance.insert(seq.to_be_bytes(), cbor)?;
        // The record must be durable before any notification fires.
        self.instance.flush()?;
        Ok(())
    }

    fn read_all(&self) -> anyhow::Result<Vec<Decision>> {
        let mut decisions = Vec::new();
        for entry in self.instance.iter() {
            let (_, value) = entry?;
            decisions.push(minicbor::decode(&value)?);
        }
        Ok(decisions)
    }
}
