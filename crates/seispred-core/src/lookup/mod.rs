//! Attribute-indexed capability lookup: maps ordered key tuples such as
//! (receiver, phase, attribute) to dense, stable integer slots and answers
//! partial "is this combination claimed" queries.

use crate::domain::{AttributeSet, GeoAttribute, SeismicPhase};
use std::collections::{BTreeSet, HashMap, HashSet};

/// One element of an index tuple. Tuples are heterogeneous; a single sum
/// type keeps the index flat instead of nesting maps per level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    Receiver(i64),
    Phase(SeismicPhase),
    Attribute(GeoAttribute),
    Name(String),
}

impl IndexKey {
    pub fn name(value: impl Into<String>) -> Self {
        Self::Name(value.into())
    }
}

/// Multi-level associative index from ordered key tuples to dense slots.
///
/// Slots are contiguous and insertion-ordered: the i-th genuinely new tuple
/// receives slot i. Tuples are compared as whole sequences; a shorter tuple
/// that happens to prefix a longer one is an independent entry. Partial
/// matching is available only through [`AttributeIndex::is_supported`].
#[derive(Debug, Clone, Default)]
pub struct AttributeIndex {
    slots: HashMap<Vec<IndexKey>, usize>,
    tuples: Vec<Vec<IndexKey>>,
    prefixes: HashSet<Vec<IndexKey>>,
    slot_attributes: Vec<Option<GeoAttribute>>,
    receivers: BTreeSet<i64>,
    phases: HashSet<SeismicPhase>,
    attributes: AttributeSet,
}

impl AttributeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an ordered tuple and return its slot. Re-inserting an existing
    /// tuple is a no-op that returns the already-assigned slot.
    pub fn add_entry(&mut self, keys: Vec<IndexKey>) -> usize {
        if let Some(slot) = self.slots.get(&keys) {
            return *slot;
        }

        let slot = self.tuples.len();
        for end in 1..=keys.len() {
            self.prefixes.insert(keys[..end].to_vec());
        }
        let final_attribute = match keys.last() {
            Some(IndexKey::Attribute(attribute)) => Some(*attribute),
            _ => None,
        };
        for key in &keys {
            match key {
                IndexKey::Receiver(id) => {
                    self.receivers.insert(*id);
                }
                IndexKey::Phase(phase) => {
                    self.phases.insert(*phase);
                }
                IndexKey::Attribute(attribute) => {
                    self.attributes.insert(*attribute);
                }
                IndexKey::Name(_) => {}
            }
        }
        self.slot_attributes.push(final_attribute);
        self.slots.insert(keys.clone(), slot);
        self.tuples.push(keys);
        slot
    }

    pub fn size(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Slot for an exact whole-tuple match.
    pub fn get_index(&self, keys: &[IndexKey]) -> Option<usize> {
        self.slots.get(keys).copied()
    }

    /// Whether any inserted tuple starts with the supplied partial tuple.
    /// An empty partial matches any non-empty index.
    pub fn is_supported(&self, partial: &[IndexKey]) -> bool {
        if partial.is_empty() {
            return !self.is_empty();
        }
        self.prefixes.contains(partial)
    }

    pub fn tuple_for_slot(&self, slot: usize) -> Option<&[IndexKey]> {
        self.tuples.get(slot).map(Vec::as_slice)
    }

    /// The attribute a slot represents, when the tuple's final key is
    /// attribute-typed.
    pub fn attribute_for_slot(&self, slot: usize) -> Option<GeoAttribute> {
        self.slot_attributes.get(slot).copied().flatten()
    }

    /// Tuples in slot order, for concatenation into combined claim lists.
    pub fn entries(&self) -> impl Iterator<Item = &[IndexKey]> {
        self.tuples.iter().map(Vec::as_slice)
    }

    pub fn receivers(&self) -> &BTreeSet<i64> {
        &self.receivers
    }

    pub fn has_phase(&self, phase: SeismicPhase) -> bool {
        self.phases.contains(&phase)
    }

    pub fn attributes(&self) -> AttributeSet {
        self.attributes
    }
}
