//! Dense place sequences.
//!
//! One `PlaceSequence` exists per `(item, relationship type, side)`. The
//! index of a relationship id in the vector *is* its place, so the sequence
//! is always `0..len` with no gaps and no duplicates. Backends rewrite the
//! whole sequence under their write lock and copy the places back onto the
//! relationships.

use serde::{Deserialize, Serialize};

use crate::model::{ItemId, RelId, RelationshipTypeId, Side};

/// Key of one ordered sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceKey {
    pub item: ItemId,
    pub type_id: RelationshipTypeId,
    pub side: Side,
}

impl SequenceKey {
    pub fn new(item: ItemId, type_id: RelationshipTypeId, side: Side) -> Self {
        Self { item, type_id, side }
    }
}

/// Arena of relationship ids; index = place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceSequence {
    ids: Vec<RelId>,
}

impl PlaceSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn position(&self, id: RelId) -> Option<u32> {
        self.ids.iter().position(|r| *r == id).map(|p| p as u32)
    }

    /// Insert `id` at `place`, shifting later entries up by one. `None` or a
    /// place past the end appends. Returns the place actually taken.
    pub fn insert(&mut self, id: RelId, place: Option<u32>) -> u32 {
        let at = place.map_or(self.ids.len(), |p| (p as usize).min(self.ids.len()));
        self.ids.insert(at, id);
        at as u32
    }

    /// Remove `id`, shifting later entries down by one. Returns its old place.
    pub fn remove(&mut self, id: RelId) -> Option<u32> {
        let at = self.ids.iter().position(|r| *r == id)?;
        self.ids.remove(at);
        Some(at as u32)
    }

    /// Move `id` to `place` (clamped to the last slot). Returns the new place.
    pub fn move_to(&mut self, id: RelId, place: u32) -> Option<u32> {
        self.remove(id)?;
        Some(self.insert(id, Some(place)))
    }

    /// `(id, place)` pairs in place order.
    pub fn places(&self) -> impl Iterator<Item = (RelId, u32)> + '_ {
        self.ids.iter().enumerate().map(|(i, id)| (*id, i as u32))
    }

    pub fn ids(&self) -> &[RelId] {
        &self.ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(seq: &PlaceSequence) -> Vec<u64> {
        seq.ids().iter().map(|r| r.0).collect()
    }

    #[test]
    fn test_append_and_insert() {
        let mut seq = PlaceSequence::new();
        assert_eq!(seq.insert(RelId(1), None), 0);
        assert_eq!(seq.insert(RelId(2), None), 1);
        assert_eq!(seq.insert(RelId(3), Some(0)), 0);
        assert_eq!(ids(&seq), vec![3, 1, 2]);
        // Past the end clamps to an append.
        assert_eq!(seq.insert(RelId(4), Some(99)), 3);
    }

    #[test]
    fn test_remove_closes_gap() {
        let mut seq = PlaceSequence::new();
        for i in 1..=4 {
            seq.insert(RelId(i), None);
        }
        assert_eq!(seq.remove(RelId(2)), Some(1));
        assert_eq!(seq.position(RelId(3)), Some(1));
        assert_eq!(seq.position(RelId(4)), Some(2));
        assert_eq!(seq.remove(RelId(2)), None);
    }

    #[test]
    fn test_move_to() {
        let mut seq = PlaceSequence::new();
        for i in 1..=3 {
            seq.insert(RelId(i), None);
        }
        assert_eq!(seq.move_to(RelId(3), 0), Some(0));
        assert_eq!(ids(&seq), vec![3, 1, 2]);
        assert_eq!(seq.move_to(RelId(3), 10), Some(2));
        assert_eq!(ids(&seq), vec![1, 2, 3]);
        assert_eq!(seq.move_to(RelId(9), 0), None);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(Option<u32>),
        Remove(usize),
        Move(usize, u32),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            proptest::option::of(0u32..8).prop_map(Op::Insert),
            (0usize..8).prop_map(Op::Remove),
            (0usize..8, 0u32..8).prop_map(|(i, p)| Op::Move(i, p)),
        ]
    }

    proptest! {
        #[test]
        fn prop_places_stay_dense(ops in proptest::collection::vec(op(), 0..64)) {
            let mut seq = PlaceSequence::new();
            let mut next = 1u64;
            for op in ops {
                match op {
                    Op::Insert(place) => {
                        seq.insert(RelId(next), place);
                        next += 1;
                    }
                    Op::Remove(i) => {
                        if let Some(id) = seq.ids().get(i).copied() {
                            seq.remove(id);
                        }
                    }
                    Op::Move(i, place) => {
                        if let Some(id) = seq.ids().get(i).copied() {
                            seq.move_to(id, place);
                        }
                    }
                }
                let places: Vec<u32> = seq.places().map(|(_, p)| p).collect();
                let expected: Vec<u32> = (0..seq.len() as u32).collect();
                prop_assert_eq!(places, expected);
                let mut unique = ids(&seq);
                unique.sort_unstable();
                unique.dedup();
                prop_assert_eq!(unique.len(), seq.len());
            }
        }
    }
}
