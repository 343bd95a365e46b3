//! Duplicate table: signature key -> best record seen so far
//!
//! Built during the first pass, consulted read-only during the second.

use std::collections::hash_map::Entry as Slot;

use rustc_hash::FxHashMap;

use crate::policy::{KeyPolicy, TableKey};
use crate::signature::Signature;

/// Winning record for one signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    /// 0-based index of the record in stream order
    pub ordinal: u64,
    pub quality_sum: u64,
}

/// Outcome of offering a record to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First record with this signature
    Inserted,
    /// Strictly better than the stored winner, which it displaced
    Replaced { previous: Entry },
    /// Not better than the stored winner; this record is the duplicate
    Rejected { winner: Entry },
}

impl Observation {
    #[inline]
    pub fn is_duplicate(&self) -> bool {
        !matches!(self, Observation::Inserted)
    }
}

pub struct DuplicateTable {
    policy: KeyPolicy,
    entries: FxHashMap<TableKey, Entry>,
    truncated_keys: u64,
}

impl DuplicateTable {
    /// Create a table for `policy`, pre-sized for `capacity` signatures.
    pub fn new(policy: KeyPolicy, capacity: usize) -> Self {
        Self {
            policy,
            entries: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            truncated_keys: 0,
        }
    }

    #[inline]
    pub fn policy(&self) -> KeyPolicy {
        self.policy
    }

    /// Offer a record. Ties keep the earlier record.
    pub fn observe(&mut self, sig: &Signature, ordinal: u64, quality_sum: u64) -> Observation {
        let keyed = self.policy.key(sig);
        if keyed.truncated {
            self.truncated_keys += 1;
        }

        let candidate = Entry {
            ordinal,
            quality_sum,
        };
        match self.entries.entry(keyed.key) {
            Slot::Vacant(slot) => {
                slot.insert(candidate);
                Observation::Inserted
            }
            Slot::Occupied(mut slot) if quality_sum > slot.get().quality_sum => {
                let previous = slot.insert(candidate);
                Observation::Replaced { previous }
            }
            Slot::Occupied(slot) => Observation::Rejected {
                winner: *slot.get(),
            },
        }
    }

    /// Stored winner for a signature
    #[inline]
    pub fn winner(&self, sig: &Signature) -> Option<Entry> {
        self.entries.get(&self.policy.key(sig).key).copied()
    }

    /// Number of distinct keys
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys that lost precision when packed (compact policy only)
    #[inline]
    pub fn truncated_keys(&self) -> u64 {
        self.truncated_keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Footprint;

    fn sig(start: i64) -> Signature {
        Signature {
            primary: Footprint {
                chrom: 0,
                start,
                len: 99,
            },
            mate: Footprint::default(),
        }
    }

    #[test]
    fn test_first_record_inserted() {
        let mut table = DuplicateTable::new(KeyPolicy::Identity, 16);
        assert!(table.is_empty());
        assert_eq!(table.observe(&sig(91), 0, 80), Observation::Inserted);
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.winner(&sig(91)),
            Some(Entry {
                ordinal: 0,
                quality_sum: 80
            })
        );
    }

    #[test]
    fn test_better_record_replaces() {
        let mut table = DuplicateTable::new(KeyPolicy::Identity, 16);
        table.observe(&sig(91), 0, 80);
        let obs = table.observe(&sig(91), 1, 95);
        assert!(obs.is_duplicate());
        assert_eq!(
            obs,
            Observation::Replaced {
                previous: Entry {
                    ordinal: 0,
                    quality_sum: 80
                }
            }
        );
        assert_eq!(table.winner(&sig(91)).unwrap().ordinal, 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_tie_keeps_earliest() {
        let mut table = DuplicateTable::new(KeyPolicy::Digest, 16);
        table.observe(&sig(91), 0, 80);
        let obs = table.observe(&sig(91), 1, 80);
        assert!(matches!(obs, Observation::Rejected { winner } if winner.ordinal == 0));
        assert_eq!(table.winner(&sig(91)).unwrap().ordinal, 0);
    }

    #[test]
    fn test_distinct_signatures_coexist() {
        let mut table = DuplicateTable::new(KeyPolicy::Compact, 0);
        table.observe(&sig(91), 0, 80);
        table.observe(&sig(500), 1, 10);
        assert_eq!(table.len(), 2);
        assert_eq!(table.truncated_keys(), 0);
        assert!(table.winner(&sig(1000)).is_none());
    }

    #[test]
    fn test_truncated_keys_counted() {
        let mut table = DuplicateTable::new(KeyPolicy::Compact, 0);
        table.observe(&sig(-9), 0, 80);
        assert_eq!(table.truncated_keys(), 1);
        assert_eq!(table.policy(), KeyPolicy::Compact);
    }
}
