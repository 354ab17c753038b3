// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_dnd --heading-base-level=0

//! Understory DnD: entity registration and staged dimension collection for
//! drag-and-drop surfaces.
//!
//! ## Overview
//!
//! Interactive surfaces with draggable items need the geometry of every item
//! and container (their *dimensions*) before collisions, displacement, and
//! drop targets can be computed. Measuring everything synchronously at
//! drag-start would block the first meaningful paint of the drag, so this
//! crate spreads the work out instead:
//!
//! - [`registry`] tracks which draggables and droppables currently exist,
//!   each registered with a provider able to measure it on demand.
//! - [`order`] ranks all entities by estimated relevance to a drag, so the
//!   most impactful dimensions are available soonest.
//! - [`schedule`] abstracts the two host primitives the collection runs on: a
//!   deferred callback and a paint tick, both cancellable.
//! - [`marshal`] ties it together: the subject and its home droppable are
//!   measured synchronously at lift, everything else in small batches across
//!   paint frames, published batch-by-batch to the interaction engine, and
//!   the whole process can be torn down at any frame boundary.
//!
//! The crate does not measure geometry itself, render anything, or decide
//! drop targets; hosts supply dimension providers and consume published
//! dimensions through the [`Publisher`] interface.
//!
//! ## Example
//!
//! A drag over a one-list surface, driven by a manually advanced scheduler:
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! # use kurbo::{Rect, Vec2};
//! use understory_dnd::schedule::ManualScheduler;
//! use understory_dnd::{
//!     DimensionMarshal, DraggableDescriptor, DraggableDimension, DraggableId, DraggableProvider,
//!     DropGroup, DroppableDescriptor, DroppableDimension, DroppableId, DroppableProvider, Phase,
//!     PhaseSnapshot, Publisher, ScrollListener,
//! };
//!
//! // The interaction engine: collects everything the marshal publishes.
//! #[derive(Default)]
//! struct Engine {
//!     published: RefCell<Vec<u64>>,
//! }
//!
//! impl Publisher for Engine {
//!     fn publish_droppables(&self, dimensions: Vec<DroppableDimension>) {
//!         let mut published = self.published.borrow_mut();
//!         published.extend(dimensions.iter().map(|d| d.descriptor.id.0));
//!     }
//!     fn publish_draggables(&self, dimensions: Vec<DraggableDimension>) {
//!         let mut published = self.published.borrow_mut();
//!         published.extend(dimensions.iter().map(|d| d.descriptor.id.0));
//!     }
//!     fn update_droppable_scroll(&self, _id: DroppableId, _offset: Vec2) {}
//!     fn cancel(&self) {}
//! }
//! # struct Item(DraggableDescriptor);
//! # impl DraggableProvider for Item {
//! #     fn dimension(&self) -> DraggableDimension {
//! #         DraggableDimension { descriptor: self.0, rect: Rect::new(0.0, 0.0, 100.0, 20.0) }
//! #     }
//! # }
//! # struct List(DroppableDescriptor);
//! # impl DroppableProvider for List {
//! #     fn dimension(&self) -> DroppableDimension {
//! #         DroppableDimension {
//! #             descriptor: self.0,
//! #             rect: Rect::new(0.0, 0.0, 120.0, 400.0),
//! #             frame: None,
//! #             scroll: Vec2::ZERO,
//! #         }
//! #     }
//! #     fn watch_scroll(&self, _listener: ScrollListener) {}
//! #     fn unwatch_scroll(&self) {}
//! # }
//!
//! let engine = Rc::new(Engine::default());
//! let scheduler = Rc::new(ManualScheduler::new());
//! let marshal = DimensionMarshal::new(engine.clone(), scheduler.clone());
//!
//! // The surface mounts: one list holding two items.
//! let list = DroppableDescriptor { id: DroppableId(1), group: DropGroup::default() };
//! let item_a = DraggableDescriptor { id: DraggableId(10), droppable_id: list.id, index: 0 };
//! let item_b = DraggableDescriptor { id: DraggableId(11), droppable_id: list.id, index: 1 };
//! marshal.register_droppable(list, Rc::new(List(list)));
//! marshal.register_draggable(item_a, Rc::new(Item(item_a)));
//! marshal.register_draggable(item_b, Rc::new(Item(item_b)));
//!
//! // A drag of item A is granted: the subject/home pair publishes at once.
//! marshal.on_phase_change(
//!     &PhaseSnapshot { phase: Phase::Collecting, request: Some(item_a) },
//!     &PhaseSnapshot::idle(),
//! );
//! assert_eq!(*engine.published.borrow(), vec![1, 10]);
//!
//! // Confirm the lift, then run paint frames until the collection drains.
//! scheduler.run_deferred();
//! while scheduler.run_frame() > 0 {}
//! assert_eq!(*engine.published.borrow(), vec![1, 10, 11]);
//!
//! // The interaction ends; the marshal tears its collection down.
//! marshal.on_phase_change(
//!     &PhaseSnapshot::idle(),
//!     &PhaseSnapshot { phase: Phase::DropComplete, request: None },
//! );
//! assert!(!marshal.is_collecting());
//! ```
//!
//! ## Cancellation
//!
//! Stopping is safe at any frame boundary: the marshal cancels its
//! outstanding timer handles, releases every scroll watch it acquired, and
//! discards measured-but-unpublished dimensions. A tick that was already
//! queued when the stop landed observes the cleared collection when it fires
//! and exits without effect.
//!
//! ## Features
//!
//! - `std` (default): enables `std` support for dependencies such as `kurbo`.
//! - `libm`: enables `no_std` + `alloc` builds that rely on `libm` for
//!   floating-point math.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod marshal;
pub mod order;
pub mod registry;
pub mod schedule;
pub mod types;

pub use marshal::{DimensionMarshal, Publisher};
pub use registry::{DraggableProvider, DroppableProvider, EntryRegistry};
pub use types::{
    DraggableDescriptor, DraggableDimension, DraggableId, DropGroup, DroppableDescriptor,
    DroppableDimension, DroppableId, EntityDescriptor, EntityDimension, Phase, PhaseSnapshot,
    ScrollListener,
};
