// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Entity registration bookkeeping.
//!
//! The registry is a pair of maps from id to registration entry: the
//! descriptor plus a provider able to produce the entity's current dimension
//! on demand. It is pure bookkeeping (no scheduling, no publishing) and is
//! read by the order resolver and the marshal.
//!
//! Entries are inserted and removed wholesale and never mutated in place, so
//! a provider handle cloned out of the registry stays valid for the rest of
//! the tick that cloned it even if the entry is removed in between. Each
//! entry records a monotonically increasing registration rank; the order
//! resolver uses ranks as its proximity/tie-break signal.
//!
//! Registering a duplicate id or unregistering an absent id is an anomaly on
//! the host's side: both are logged and ignored, and the registry is left
//! unchanged.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use core::fmt;

use crate::types::{
    DraggableDescriptor, DraggableDimension, DraggableId, DroppableDescriptor, DroppableDimension,
    DroppableId, ScrollListener,
};

/// Produces a draggable's current dimension on demand.
///
/// Implementations must not call back into the marshal that is measuring
/// them; measurement happens while the marshal's state is borrowed.
pub trait DraggableProvider {
    /// Measure the draggable right now.
    fn dimension(&self) -> DraggableDimension;
}

/// Produces a droppable's current dimension and controls its scroll watch.
///
/// Implementations must not call back into the marshal that is measuring
/// them; measurement happens while the marshal's state is borrowed.
pub trait DroppableProvider {
    /// Measure the droppable right now.
    fn dimension(&self) -> DroppableDimension;

    /// Start publishing scroll offsets through `listener` until
    /// [`unwatch_scroll`](Self::unwatch_scroll) is called.
    fn watch_scroll(&self, listener: ScrollListener);

    /// Stop publishing scroll offsets.
    fn unwatch_scroll(&self);
}

/// Registration record for a draggable.
#[derive(Clone)]
pub struct DraggableEntry {
    /// The draggable's descriptor.
    pub descriptor: DraggableDescriptor,
    /// Dimension provider for the draggable.
    pub provider: Rc<dyn DraggableProvider>,
    pub(crate) rank: usize,
}

impl fmt::Debug for DraggableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DraggableEntry")
            .field("descriptor", &self.descriptor)
            .field("rank", &self.rank)
            .finish_non_exhaustive()
    }
}

/// Registration record for a droppable.
#[derive(Clone)]
pub struct DroppableEntry {
    /// The droppable's descriptor.
    pub descriptor: DroppableDescriptor,
    /// Dimension provider and scroll-watch controls for the droppable.
    pub provider: Rc<dyn DroppableProvider>,
    pub(crate) rank: usize,
}

impl fmt::Debug for DroppableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DroppableEntry")
            .field("descriptor", &self.descriptor)
            .field("rank", &self.rank)
            .finish_non_exhaustive()
    }
}

/// Id-to-entry maps for every currently mounted entity.
#[derive(Debug, Default)]
pub struct EntryRegistry {
    draggables: BTreeMap<DraggableId, DraggableEntry>,
    droppables: BTreeMap<DroppableId, DroppableEntry>,
    next_rank: usize,
}

impl EntryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a draggable entry.
    ///
    /// Returns `false` (logging the anomaly, keeping the original entry) if
    /// the id is already registered.
    pub fn register_draggable(
        &mut self,
        descriptor: DraggableDescriptor,
        provider: Rc<dyn DraggableProvider>,
    ) -> bool {
        if self.draggables.contains_key(&descriptor.id) {
            log::error!(
                "cannot register draggable {:?}: one is already registered",
                descriptor.id
            );
            return false;
        }
        let rank = self.take_rank();
        self.draggables.insert(
            descriptor.id,
            DraggableEntry {
                descriptor,
                provider,
                rank,
            },
        );
        true
    }

    /// Insert a droppable entry.
    ///
    /// Returns `false` (logging the anomaly, keeping the original entry) if
    /// the id is already registered.
    pub fn register_droppable(
        &mut self,
        descriptor: DroppableDescriptor,
        provider: Rc<dyn DroppableProvider>,
    ) -> bool {
        if self.droppables.contains_key(&descriptor.id) {
            log::error!(
                "cannot register droppable {:?}: one is already registered",
                descriptor.id
            );
            return false;
        }
        let rank = self.take_rank();
        self.droppables.insert(
            descriptor.id,
            DroppableEntry {
                descriptor,
                provider,
                rank,
            },
        );
        true
    }

    /// Remove a draggable entry, returning it.
    ///
    /// Returns `None` (logging the anomaly) if the id is not registered.
    pub fn unregister_draggable(&mut self, id: DraggableId) -> Option<DraggableEntry> {
        let entry = self.draggables.remove(&id);
        if entry.is_none() {
            log::error!("cannot unregister draggable {id:?}: it is not registered");
        }
        entry
    }

    /// Remove a droppable entry, returning it.
    ///
    /// Returns `None` (logging the anomaly) if the id is not registered.
    pub fn unregister_droppable(&mut self, id: DroppableId) -> Option<DroppableEntry> {
        let entry = self.droppables.remove(&id);
        if entry.is_none() {
            log::error!("cannot unregister droppable {id:?}: it is not registered");
        }
        entry
    }

    /// Look up a draggable entry.
    pub fn draggable(&self, id: DraggableId) -> Option<&DraggableEntry> {
        self.draggables.get(&id)
    }

    /// Look up a droppable entry.
    pub fn droppable(&self, id: DroppableId) -> Option<&DroppableEntry> {
        self.droppables.get(&id)
    }

    /// Registration rank of a droppable, if registered.
    pub fn droppable_rank(&self, id: DroppableId) -> Option<usize> {
        self.droppables.get(&id).map(|entry| entry.rank)
    }

    /// Iterate all draggable entries (in id order).
    pub fn draggables(&self) -> impl Iterator<Item = &DraggableEntry> {
        self.draggables.values()
    }

    /// Iterate all droppable entries (in id order).
    pub fn droppables(&self) -> impl Iterator<Item = &DroppableEntry> {
        self.droppables.values()
    }

    fn take_rank(&mut self) -> usize {
        let rank = self.next_rank;
        self.next_rank += 1;
        rank
    }
}
