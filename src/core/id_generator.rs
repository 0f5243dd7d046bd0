// Document ID Generator - snowflake-style ids that sort by creation time
// 64-bit layout: [timestamp:42][node_id:10][sequence:12]

use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::strong_types::DocId;
use crate::core::time::current_time_millis;

const SEQUENCE_BITS: u64 = 12;
const NODE_BITS: u64 = 10;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;
const NODE_MASK: u64 = (1 << NODE_BITS) - 1;
const TIMESTAMP_MASK: u64 = (1 << 42) - 1;

/// Lock-free id generator. The packed `state` holds `[timestamp][sequence]`
/// of the last id handed out; a sequence overflow carries into the timestamp,
/// so ids stay strictly increasing even past 4096 ids per millisecond or
/// when the wall clock steps backwards.
#[derive(Debug)]
pub struct DocIdGenerator {
    node_id: u16,
    state: AtomicU64,
}

impl DocIdGenerator {
    /// Node ids above 1023 are truncated to their low ten bits
    pub fn new(node_id: u16) -> Self {
        Self {
            node_id: (node_id as u64 & NODE_MASK) as u16,
            state: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> DocId {
        let now = (current_time_millis().max(0) as u64) & TIMESTAMP_MASK;
        let mut current = self.state.load(Ordering::Relaxed);
        loop {
            let next = if now > current >> SEQUENCE_BITS {
                now << SEQUENCE_BITS
            } else {
                current + 1
            };
            match self
                .state
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return self.compose(next),
                Err(actual) => current = actual,
            }
        }
    }

    fn compose(&self, state: u64) -> DocId {
        let timestamp = (state >> SEQUENCE_BITS) & TIMESTAMP_MASK;
        let sequence = state & SEQUENCE_MASK;
        let id = (timestamp << (NODE_BITS + SEQUENCE_BITS))
            | ((self.node_id as u64) << SEQUENCE_BITS)
            | sequence;
        DocId(id as i64)
    }

    pub fn extract_node_id(id: DocId) -> u16 {
        ((id.0 as u64 >> SEQUENCE_BITS) & NODE_MASK) as u16
    }

    pub fn extract_timestamp(id: DocId) -> u64 {
        id.0 as u64 >> (NODE_BITS + SEQUENCE_BITS)
    }

    pub fn extract_sequence(id: DocId) -> u16 {
        (id.0 as u64 & SEQUENCE_MASK) as u16
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }
}

impl Default for DocIdGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_strictly_increase() {
        let generator = DocIdGenerator::new(7);
        let mut last = generator.next_id();
        for _ in 0..10_000 {
            let id = generator.next_id();
            assert!(id > last, "{} should be greater than {}", id, last);
            last = id;
        }
    }

    #[test]
    fn test_node_extraction() {
        let generator = DocIdGenerator::new(500);
        let id = generator.next_id();

        assert_eq!(DocIdGenerator::extract_node_id(id), 500);
        assert_eq!(generator.node_id(), 500);
    }

    #[test]
    fn test_timestamp_is_recent() {
        let generator = DocIdGenerator::new(1);
        let before = current_time_millis() as u64;
        let id = generator.next_id();

        assert!(DocIdGenerator::extract_timestamp(id) >= before);
        assert!(DocIdGenerator::extract_sequence(id) < 4096);
    }

    #[test]
    fn test_oversized_node_is_masked() {
        let generator = DocIdGenerator::new(1024 + 3);
        assert_eq!(generator.node_id(), 3);
    }
}
