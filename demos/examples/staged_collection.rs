// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A full drag timeline, frame by frame: lift, staged collection, teardown.
//!
//! Two lists are mounted, a drag starts on the first item of the first list,
//! and a manually advanced scheduler plays the collection out one paint
//! frame at a time, printing every batch the marshal publishes.
//!
//! Run:
//! - `cargo run -p understory_dnd_demos --example staged_collection`

use std::cell::RefCell;
use std::rc::Rc;

use kurbo::{Rect, Vec2};
use understory_dnd::schedule::ManualScheduler;
use understory_dnd::{
    DimensionMarshal, DraggableDescriptor, DraggableDimension, DraggableId, DraggableProvider,
    DropGroup, DroppableDescriptor, DroppableDimension, DroppableId, DroppableProvider, Phase,
    PhaseSnapshot, Publisher, ScrollListener,
};

/// Stand-in for the interaction engine: prints every batch it receives.
struct PrintingEngine;

impl Publisher for PrintingEngine {
    fn publish_droppables(&self, dimensions: Vec<DroppableDimension>) {
        let ids: Vec<u64> = dimensions.iter().map(|d| d.descriptor.id.0).collect();
        println!("  published droppables {ids:?}");
    }

    fn publish_draggables(&self, dimensions: Vec<DraggableDimension>) {
        let ids: Vec<u64> = dimensions.iter().map(|d| d.descriptor.id.0).collect();
        println!("  published draggables {ids:?}");
    }

    fn update_droppable_scroll(&self, id: DroppableId, offset: Vec2) {
        println!("  droppable {} scrolled to {offset:?}", id.0);
    }

    fn cancel(&self) {
        println!("  drag cancelled");
    }
}

/// A draggable measured from a fixed rect.
struct Item {
    dimension: DraggableDimension,
}

impl Item {
    fn new(descriptor: DraggableDescriptor, rect: Rect) -> Rc<Self> {
        Rc::new(Self {
            dimension: DraggableDimension { descriptor, rect },
        })
    }
}

impl DraggableProvider for Item {
    fn dimension(&self) -> DraggableDimension {
        self.dimension
    }
}

/// A scrollable list; remembers its watch listener so the demo can simulate
/// a scroll while the drag is live.
struct List {
    dimension: DroppableDimension,
    listener: RefCell<Option<ScrollListener>>,
}

impl List {
    fn new(descriptor: DroppableDescriptor, rect: Rect) -> Rc<Self> {
        Rc::new(Self {
            dimension: DroppableDimension {
                descriptor,
                rect,
                frame: Some(rect),
                scroll: Vec2::ZERO,
            },
            listener: RefCell::new(None),
        })
    }

    fn scroll_to(&self, offset: Vec2) {
        if let Some(listener) = self.listener.borrow().clone() {
            listener(self.dimension.descriptor.id, offset);
        }
    }
}

impl DroppableProvider for List {
    fn dimension(&self) -> DroppableDimension {
        self.dimension
    }

    fn watch_scroll(&self, listener: ScrollListener) {
        *self.listener.borrow_mut() = Some(listener);
    }

    fn unwatch_scroll(&self) {
        *self.listener.borrow_mut() = None;
    }
}

fn main() {
    let engine = Rc::new(PrintingEngine);
    let scheduler = Rc::new(ManualScheduler::new());
    let marshal = DimensionMarshal::new(engine, scheduler.clone());

    // Two side-by-side lists: the left one holds items 10 and 11, the right
    // one items 20, 21, and 22.
    let left = DroppableDescriptor {
        id: DroppableId(1),
        group: DropGroup::default(),
    };
    let right = DroppableDescriptor {
        id: DroppableId(2),
        group: DropGroup::default(),
    };
    let left_list = List::new(left, Rect::new(0.0, 0.0, 120.0, 400.0));
    let right_list = List::new(right, Rect::new(140.0, 0.0, 260.0, 400.0));
    marshal.register_droppable(left, left_list.clone());
    marshal.register_droppable(right, right_list);

    for (id, droppable, index, x) in [
        (10, left, 0, 0.0),
        (11, left, 1, 0.0),
        (20, right, 0, 140.0),
        (21, right, 1, 140.0),
        (22, right, 2, 140.0),
    ] {
        let descriptor = DraggableDescriptor {
            id: DraggableId(id),
            droppable_id: droppable.id,
            index,
        };
        let y = 20.0 * index as f64;
        marshal.register_draggable(descriptor, Item::new(descriptor, Rect::new(x, y, x + 120.0, y + 20.0)));
    }

    // The user picks up item 10.
    let subject = DraggableDescriptor {
        id: DraggableId(10),
        droppable_id: left.id,
        index: 0,
    };
    println!("drag granted:");
    marshal.on_phase_change(
        &PhaseSnapshot {
            phase: Phase::Collecting,
            request: Some(subject),
        },
        &PhaseSnapshot::idle(),
    );

    println!("lift confirmed:");
    scheduler.run_deferred();

    let mut frame = 0;
    loop {
        frame += 1;
        println!("frame {frame}:");
        if scheduler.run_frame() == 0 {
            println!("  (drained)");
            break;
        }
        if frame == 2 {
            // The left list scrolls while the collection is still running.
            left_list.scroll_to(Vec2::new(0.0, 32.0));
        }
    }

    println!("drop complete:");
    marshal.on_phase_change(
        &PhaseSnapshot {
            phase: Phase::DropComplete,
            request: None,
        },
        &PhaseSnapshot {
            phase: Phase::Dragging,
            request: None,
        },
    );
    println!("  collecting? {}", marshal.is_collecting());
}
