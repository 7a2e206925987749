// Copyright 2022 - 2024 Wenmeng See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Author: tickbh
// -----
// Created Date: 2024/03/13 15:40:08

bitflags! {
    /// Per-reference state. `ADDED` is the "added on current request" flag
    /// of the wire protocol; `EMITTED` records that the reference already
    /// contributed an emitted header to the current block, which is what
    /// keeps the end-of-block replay from emitting it a second time.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct ReferenceFlags: u8 {
        const ADDED = 0x1;
        const EMITTED = 0x2;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    pub generation: u64,
    pub flags: ReferenceFlags,
}

/// The set of dynamic table entries the peer treats as implicitly emitted.
/// References are generation ids into the dynamic table; iteration order is
/// insertion order, which the decoder's end-of-block replay relies on.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    refs: Vec<Reference>,
}

impl ReferenceSet {
    pub fn new() -> ReferenceSet {
        ReferenceSet { refs: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn contains(&self, generation: u64) -> bool {
        self.refs.iter().any(|r| r.generation == generation)
    }

    pub fn flags(&self, generation: u64) -> Option<ReferenceFlags> {
        self.refs
            .iter()
            .find(|r| r.generation == generation)
            .map(|r| r.flags)
    }

    /// Inserts a reference flagged as added on the current request. Adding a
    /// generation that is already referenced leaves the set unchanged.
    pub fn add(&mut self, generation: u64) {
        if !self.contains(generation) {
            self.refs.push(Reference {
                generation,
                flags: ReferenceFlags::ADDED | ReferenceFlags::EMITTED,
            });
        }
    }

    pub fn remove(&mut self, generation: u64) {
        self.refs.retain(|r| r.generation != generation);
    }

    pub fn clear(&mut self) {
        self.refs.clear();
    }

    pub fn mark_emitted(&mut self, generation: u64) {
        if let Some(r) = self.refs.iter_mut().find(|r| r.generation == generation) {
            r.flags.set(ReferenceFlags::EMITTED, true);
        }
    }

    /// Retains only the references added on the current request.
    pub fn remove_not_added_this_request(&mut self) {
        self.refs.retain(|r| r.flags.contains(ReferenceFlags::ADDED));
    }

    /// Clears every reference's flags. Runs at the start of each decoded
    /// block and at the end of emitting for encode, so between blocks no
    /// reference counts as added or emitted.
    pub fn reset_flags(&mut self) {
        for r in self.refs.iter_mut() {
            r.flags = ReferenceFlags::empty();
        }
    }

    /// Drops every reference whose entry was evicted. Eviction is strictly
    /// oldest-first, so dead references are exactly those below the oldest
    /// live generation.
    pub fn drop_dead(&mut self, oldest_live_generation: u64) {
        self.refs.retain(|r| r.generation >= oldest_live_generation);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reference> {
        self.refs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent() {
        let mut set = ReferenceSet::new();
        set.add(3);
        set.add(3);
        assert_eq!(set.len(), 1);
        assert!(set.contains(3));
        assert_eq!(set.flags(3), Some(ReferenceFlags::ADDED | ReferenceFlags::EMITTED));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut set = ReferenceSet::new();
        set.add(1);
        set.add(2);
        set.remove(1);
        assert!(!set.contains(1));
        assert!(set.contains(2));
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_remove_not_added_this_request() {
        let mut set = ReferenceSet::new();
        set.add(1);
        set.reset_flags();
        set.add(2);
        set.remove_not_added_this_request();
        assert!(!set.contains(1));
        assert!(set.contains(2));
    }

    #[test]
    fn test_reset_flags() {
        let mut set = ReferenceSet::new();
        set.add(1);
        set.reset_flags();
        assert_eq!(set.flags(1), Some(ReferenceFlags::empty()));
    }

    #[test]
    fn test_drop_dead_keeps_insertion_order() {
        let mut set = ReferenceSet::new();
        set.add(5);
        set.add(2);
        set.add(7);
        set.drop_dead(3);
        let order: Vec<u64> = set.iter().map(|r| r.generation).collect();
        assert_eq!(order, [5, 7]);
    }
}
