// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Identity, descriptor, dimension, and phase types.
//!
//! Ids are small, copyable handles in the host's keyspace; the host is
//! responsible for managing the meaning and lifecycle of individual ids (for
//! example via an interned string table or widget keys). Descriptors attach
//! immutable position metadata to an id at registration time: a changed
//! descriptor implies unregister + re-register, never in-place mutation.

use alloc::rc::Rc;

use kurbo::{Rect, Vec2};

/// Identifier of an individually movable item.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DraggableId(pub u64);

/// Identifier of a container capable of holding draggables.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DroppableId(pub u64);

/// Grouping type of a droppable.
///
/// Draggables can only move between droppables of the same group; the marshal
/// itself does not interpret the group, it only carries it through to the
/// published dimensions.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DropGroup(pub u64);

/// Immutable identity and position metadata for a draggable.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DraggableDescriptor {
    /// The draggable's id.
    pub id: DraggableId,
    /// Id of the droppable that owns this draggable.
    pub droppable_id: DroppableId,
    /// Position within the owning droppable's list.
    pub index: usize,
}

/// Immutable identity metadata for a droppable.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DroppableDescriptor {
    /// The droppable's id.
    pub id: DroppableId,
    /// Grouping type; draggables only move within one group.
    pub group: DropGroup,
}

/// A descriptor of either kind.
///
/// Draggables and droppables are collected through one ordered sequence, so
/// anything walking that sequence matches on this sum exhaustively.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EntityDescriptor {
    /// A draggable item.
    Draggable(DraggableDescriptor),
    /// A droppable container.
    Droppable(DroppableDescriptor),
}

impl EntityDescriptor {
    /// The droppable descriptor, if this entity is a droppable.
    pub fn as_droppable(&self) -> Option<&DroppableDescriptor> {
        match self {
            Self::Droppable(descriptor) => Some(descriptor),
            Self::Draggable(_) => None,
        }
    }

    /// The draggable descriptor, if this entity is a draggable.
    pub fn as_draggable(&self) -> Option<&DraggableDescriptor> {
        match self {
            Self::Draggable(descriptor) => Some(descriptor),
            Self::Droppable(_) => None,
        }
    }
}

/// Measured geometry of a draggable at a point in time.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DraggableDimension {
    /// Descriptor of the measured draggable.
    pub descriptor: DraggableDescriptor,
    /// Border-box rectangle in surface coordinates.
    pub rect: Rect,
}

/// Measured geometry and scroll metrics of a droppable at a point in time.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DroppableDimension {
    /// Descriptor of the measured droppable.
    pub descriptor: DroppableDescriptor,
    /// Border-box rectangle in surface coordinates.
    pub rect: Rect,
    /// Clipping frame, when the droppable is itself a scroll container.
    pub frame: Option<Rect>,
    /// Scroll offset at measure time.
    pub scroll: Vec2,
}

/// A freshly measured dimension of either kind.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum EntityDimension {
    /// A draggable's dimension.
    Draggable(DraggableDimension),
    /// A droppable's dimension.
    Droppable(DroppableDimension),
}

impl EntityDimension {
    /// Descriptor of the measured entity.
    pub fn descriptor(&self) -> EntityDescriptor {
        match self {
            Self::Draggable(dimension) => EntityDescriptor::Draggable(dimension.descriptor),
            Self::Droppable(dimension) => EntityDescriptor::Droppable(dimension.descriptor),
        }
    }
}

/// Externally observed phase of the drag interaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No drag interaction is in progress.
    Idle,
    /// A drag has been requested but not yet granted.
    Requested,
    /// Initial dimensions are being collected for a granted drag.
    Collecting,
    /// The user is dragging.
    Dragging,
    /// The drop is animating into place.
    DropAnimating,
    /// The drop has finished.
    DropComplete,
}

/// One observation from the phase source.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PhaseSnapshot {
    /// The observed phase.
    pub phase: Phase,
    /// The draggable a [`Phase::Collecting`] observation wants collected.
    pub request: Option<DraggableDescriptor>,
}

impl PhaseSnapshot {
    /// A snapshot with no pending request.
    pub const fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            request: None,
        }
    }
}

/// Callback invoked with a droppable's id and fresh scroll offset while its
/// scroll is under watch.
pub type ScrollListener = Rc<dyn Fn(DroppableId, Vec2)>;
