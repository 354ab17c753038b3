// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collection order: rank every entity by estimated relevance to a drag.
//!
//! When a drag starts, the subject and its home droppable are measured
//! synchronously; everything else is measured in batches over later frames.
//! This module decides the order of "everything else" so the most immediately
//! relevant dimensions reach the interaction engine soonest.
//!
//! Descriptors carry no geometry, so proximity is estimated from registration
//! structure rather than measured positions:
//!
//! - A container's distance is the absolute difference between its
//!   registration rank and the home droppable's registration rank (hosts
//!   register containers in visual order, making rank distance a cheap
//!   stand-in for spatial distance).
//! - A container sorts ahead of its own children.
//! - A draggable's distance within its container is the absolute difference
//!   between its index and the subject's index.
//! - Ties break stably: owning container's registration rank, droppables
//!   before draggables, then draggable index.
//! - A draggable whose owning container is not registered ranks last.
//!
//! The resolver is a pure function over the registry: no side effects, and
//! dimension providers are never invoked.
//!
//! ```
//! use std::rc::Rc;
//! # use kurbo::{Rect, Vec2};
//! use understory_dnd::order::collection_order;
//! use understory_dnd::registry::EntryRegistry;
//! # use understory_dnd::registry::{DraggableProvider, DroppableProvider};
//! # use understory_dnd::{DraggableDimension, DroppableDimension, ScrollListener};
//! use understory_dnd::{
//!     DraggableDescriptor, DraggableId, DropGroup, DroppableDescriptor, DroppableId,
//!     EntityDescriptor,
//! };
//! # struct Item(DraggableDescriptor);
//! # impl DraggableProvider for Item {
//! #     fn dimension(&self) -> DraggableDimension {
//! #         DraggableDimension { descriptor: self.0, rect: Rect::ZERO }
//! #     }
//! # }
//! # struct List(DroppableDescriptor);
//! # impl DroppableProvider for List {
//! #     fn dimension(&self) -> DroppableDimension {
//! #         DroppableDimension { descriptor: self.0, rect: Rect::ZERO, frame: None, scroll: Vec2::ZERO }
//! #     }
//! #     fn watch_scroll(&self, _listener: ScrollListener) {}
//! #     fn unwatch_scroll(&self) {}
//! # }
//!
//! let home = DroppableDescriptor { id: DroppableId(1), group: DropGroup::default() };
//! let other = DroppableDescriptor { id: DroppableId(2), group: DropGroup::default() };
//! let subject = DraggableDescriptor { id: DraggableId(1), droppable_id: home.id, index: 0 };
//! let neighbor = DraggableDescriptor { id: DraggableId(2), droppable_id: home.id, index: 1 };
//!
//! let mut registry = EntryRegistry::new();
//! registry.register_droppable(home, Rc::new(List(home)));
//! registry.register_droppable(other, Rc::new(List(other)));
//! registry.register_draggable(subject, Rc::new(Item(subject)));
//! registry.register_draggable(neighbor, Rc::new(Item(neighbor)));
//!
//! let order = collection_order(&subject, &home, &registry);
//! // The subject/home pair is excluded; the home's remaining child is
//! // nearest, then the other container.
//! assert_eq!(
//!     Vec::from(order),
//!     vec![
//!         EntityDescriptor::Draggable(neighbor),
//!         EntityDescriptor::Droppable(other),
//!     ],
//! );
//! ```

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::registry::EntryRegistry;
use crate::types::{DraggableDescriptor, DroppableDescriptor, EntityDescriptor};

/// Sort key implementing the ranking described in the module docs.
///
/// Field order is the comparison order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Relevance {
    /// Registration-rank distance between the owning container and home.
    container_distance: usize,
    /// 0 for the container itself; `1 + |index - subject.index|` for its
    /// children, so a container precedes everything it holds.
    child_distance: usize,
    /// Owning container's registration rank (stable tie-break).
    container_rank: usize,
    /// Droppables before draggables on otherwise equal keys.
    is_draggable: bool,
    /// Draggable index (final tie-break).
    index: usize,
}

/// Produce every registered entity except `subject` and `home`, ordered by
/// estimated relevance (closest first).
pub fn collection_order(
    subject: &DraggableDescriptor,
    home: &DroppableDescriptor,
    registry: &EntryRegistry,
) -> VecDeque<EntityDescriptor> {
    let home_rank = registry.droppable_rank(home.id).unwrap_or(0);

    let mut ranked: Vec<(Relevance, EntityDescriptor)> = Vec::new();

    for entry in registry.droppables() {
        if entry.descriptor.id == home.id {
            continue;
        }
        ranked.push((
            Relevance {
                container_distance: entry.rank.abs_diff(home_rank),
                child_distance: 0,
                container_rank: entry.rank,
                is_draggable: false,
                index: 0,
            },
            EntityDescriptor::Droppable(entry.descriptor),
        ));
    }

    for entry in registry.draggables() {
        let descriptor = entry.descriptor;
        if descriptor.id == subject.id {
            continue;
        }
        let owner_rank = registry.droppable_rank(descriptor.droppable_id);
        ranked.push((
            Relevance {
                container_distance: owner_rank
                    .map(|rank| rank.abs_diff(home_rank))
                    .unwrap_or(usize::MAX),
                child_distance: 1 + descriptor.index.abs_diff(subject.index),
                container_rank: owner_rank.unwrap_or(usize::MAX),
                is_draggable: true,
                index: descriptor.index,
            },
            EntityDescriptor::Draggable(descriptor),
        ));
    }

    ranked.sort_by_key(|(relevance, _)| *relevance);
    ranked.into_iter().map(|(_, descriptor)| descriptor).collect()
}
