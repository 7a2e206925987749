//! The unit of per-connection compression state: one dynamic table plus the
//! reference set pointing into it, bounded by the table size ceiling most
//! recently signalled through SETTINGS. The encoder and decoder mutate their
//! contexts through the same operations here, which is what keeps the two
//! peers of a connection in sync.

use crate::dynamic::{DynamicEntry, DynamicTable, DEFAULT_SETTINGS_HEADER_TABLE_SIZE};
use crate::reference::ReferenceSet;
use crate::static_table::STATIC_TABLE;
use crate::{HpackError, HpackResult};

/// A resolved flat-space index: `1..=61` names the static table, everything
/// above it the dynamic table, newest first.
#[derive(Debug)]
pub enum Resolved<'a> {
    Static(&'static [u8], &'static [u8]),
    Dynamic(&'a DynamicEntry),
}

#[derive(Debug, Clone)]
pub struct Context {
    table: DynamicTable,
    refs: ReferenceSet,
    /// Upper bound on the table size most recently signalled via SETTINGS.
    settings_max: usize,
    /// Set when the ceiling was lowered; the next block must lead with a
    /// dynamic table size update discharging it.
    size_update_required: bool,
}

impl Context {
    pub fn new(initial_max_size: usize) -> Context {
        Context {
            table: DynamicTable::with_size(initial_max_size),
            refs: ReferenceSet::new(),
            settings_max: initial_max_size,
            size_update_required: false,
        }
    }

    pub fn dynamic_table(&self) -> &DynamicTable {
        &self.table
    }

    pub fn reference_set(&self) -> &ReferenceSet {
        &self.refs
    }

    pub(crate) fn reference_set_mut(&mut self) -> &mut ReferenceSet {
        &mut self.refs
    }

    pub fn settings_max(&self) -> usize {
        self.settings_max
    }

    pub fn size_update_required(&self) -> bool {
        self.size_update_required
    }

    /// The SETTINGS entry point. Lowering the ceiling clamps the table at
    /// once (evicting as needed) and arms the size-update requirement for
    /// the next block; raising it only widens what future size updates may
    /// ask for.
    pub fn set_max_table_size(&mut self, new_max_size: usize) {
        let lowered = new_max_size < self.settings_max;
        self.settings_max = new_max_size;
        if self.table.get_max_table_size() > new_max_size {
            self.table.set_max_table_size(new_max_size);
            self.prune_references();
        }
        if lowered {
            self.size_update_required = true;
            log::trace!("hpack: table ceiling lowered to {}", new_max_size);
        }
    }

    /// Applies a dynamic table size update instruction from the wire.
    pub(crate) fn apply_size_update(&mut self, new_max_size: usize) -> HpackResult<()> {
        if new_max_size > self.settings_max {
            return Err(HpackError::SizeUpdateTooLarge);
        }
        self.table.set_max_table_size(new_max_size);
        self.prune_references();
        self.size_update_required = false;
        Ok(())
    }

    /// Hands the encoder the size update it must place at the head of the
    /// next block, clearing the requirement.
    pub(crate) fn pending_size_update(&mut self) -> Option<usize> {
        if self.size_update_required {
            self.size_update_required = false;
            Some(self.table.get_max_table_size())
        } else {
            None
        }
    }

    /// Inserts into the dynamic table and drops any references orphaned by
    /// the accompanying eviction, in one atomic step.
    pub(crate) fn insert(&mut self, name: Vec<u8>, value: Vec<u8>) -> Option<u64> {
        let inserted = self.table.add_header(name, value);
        self.prune_references();
        inserted
    }

    pub(crate) fn resolve(&self, index: usize) -> HpackResult<Resolved> {
        if index == 0 {
            return Err(HpackError::InvalidIndex);
        }
        if index <= STATIC_TABLE.len() {
            let (name, value) = STATIC_TABLE[index - 1];
            return Ok(Resolved::Static(name, value));
        }
        match self.table.get(index - STATIC_TABLE.len()) {
            Some(entry) => Ok(Resolved::Dynamic(entry)),
            None => Err(HpackError::InvalidIndex),
        }
    }

    /// Gets an owned copy of the header at the given flat-space index.
    pub(crate) fn get_from_table(&self, index: usize) -> HpackResult<(Vec<u8>, Vec<u8>)> {
        match self.resolve(index)? {
            Resolved::Static(name, value) => Ok((name.to_vec(), value.to_vec())),
            Resolved::Dynamic(entry) => Ok((entry.name.clone(), entry.value.clone())),
        }
    }

    /// The flat-space index of a live dynamic entry.
    pub(crate) fn index_of_generation(&self, generation: u64) -> Option<usize> {
        self.table
            .position_of(generation)
            .map(|pos| pos + STATIC_TABLE.len())
    }

    fn prune_references(&mut self) {
        self.refs.drop_dead(self.table.oldest_live_generation());
    }
}

impl Default for Context {
    fn default() -> Context {
        Context::new(DEFAULT_SETTINGS_HEADER_TABLE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_flat_space() {
        let mut ctx = Context::new(4096);
        assert!(matches!(ctx.resolve(2), Ok(Resolved::Static(b":method", b"GET"))));
        assert_eq!(ctx.resolve(0).unwrap_err(), HpackError::InvalidIndex);
        assert_eq!(ctx.resolve(62).unwrap_err(), HpackError::InvalidIndex);

        ctx.insert(b"x".to_vec(), b"y".to_vec());
        assert_eq!(ctx.get_from_table(62).unwrap(), (b"x".to_vec(), b"y".to_vec()));
        assert_eq!(ctx.resolve(63).unwrap_err(), HpackError::InvalidIndex);
    }

    #[test]
    fn test_eviction_prunes_references() {
        let mut ctx = Context::new(64);
        let first = ctx.insert(b"custom-key".to_vec(), b"custom-header".to_vec()).unwrap();
        ctx.reference_set_mut().add(first);
        let second = ctx.insert(b"custom-foo".to_vec(), b"custom-header".to_vec()).unwrap();
        ctx.reference_set_mut().add(second);
        // The first entry was evicted by the second, so its reference is gone.
        assert!(!ctx.reference_set().contains(first));
        assert!(ctx.reference_set().contains(second));
        assert_eq!(ctx.reference_set().len(), 1);
    }

    #[test]
    fn test_size_update_ceiling() {
        let mut ctx = Context::new(4096);
        assert_eq!(ctx.apply_size_update(8192).unwrap_err(), HpackError::SizeUpdateTooLarge);
        ctx.apply_size_update(128).unwrap();
        assert_eq!(ctx.dynamic_table().get_max_table_size(), 128);
        // Within the ceiling the bound may go back up.
        ctx.apply_size_update(4096).unwrap();
        assert_eq!(ctx.dynamic_table().get_max_table_size(), 4096);
    }

    #[test]
    fn test_lowered_ceiling_arms_size_update() {
        let mut ctx = Context::new(4096);
        ctx.set_max_table_size(8192);
        assert!(!ctx.size_update_required());
        ctx.set_max_table_size(256);
        assert!(ctx.size_update_required());
        assert_eq!(ctx.dynamic_table().get_max_table_size(), 256);
        assert_eq!(ctx.pending_size_update(), Some(256));
        assert!(!ctx.size_update_required());
    }
}
