// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The dimension marshal: staged, cancellable dimension collection.
//!
//! [`DimensionMarshal`] tracks which draggables and droppables currently
//! exist, and, once the host's phase source reports that a drag has been
//! granted, orchestrates measuring all of their dimensions without ever
//! blocking a paint:
//!
//! 1. **Lift**: the dragging item and its home droppable are measured and
//!    published synchronously so drag-start feedback can render immediately,
//!    and the home droppable's scroll is put under watch. A deferred callback
//!    is armed so one render pass completes with this minimal set before bulk
//!    measurement begins.
//! 2. **Staged collection**: when the deferred callback fires, every other
//!    entity is ranked by [`collection_order`] and measured in fixed-size
//!    batches, one batch per paint frame. Each frame first publishes the
//!    previous frame's batch (droppables, then draggables, then putting each
//!    published droppable's scroll under watch) and then measures the next
//!    batch, so measuring never competes with the publish that triggered it.
//! 3. **Stop**: when the phase source reports the interaction is over, the
//!    collection is torn down from any point in that timeline: outstanding
//!    timers are cancelled, scroll watches are released, and buffered but
//!    unpublished dimensions are discarded.
//!
//! The marshal owns one state value and replaces the active collection
//! wholesale on every transition; a scheduled callback that outlives its
//! collection observes `None` at fire time and exits without effect. That
//! staleness check is the entire cancellation story: ticks never need to be
//! raced or joined.
//!
//! Entities may mount and unmount while a collection is in flight.
//! Registering mid-collection measures and publishes the new entity
//! immediately, outside the staged order. Unregistering mid-collection is
//! not supported and is logged; a pending entity whose registration has
//! vanished is skipped when its batch comes up.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::{vec, vec::Vec};
use core::cell::RefCell;
use core::fmt;

use kurbo::Vec2;

use crate::order::collection_order;
use crate::registry::{DraggableProvider, DroppableProvider, EntryRegistry};
use crate::schedule::{Scheduler, TaskHandle};
use crate::types::{
    DraggableDescriptor, DraggableDimension, DraggableId, DroppableDescriptor, DroppableDimension,
    DroppableId, EntityDescriptor, EntityDimension, Phase, PhaseSnapshot, ScrollListener,
};

/// How many entities are measured per paint frame.
///
/// Two bounds the per-frame measurement cost while still converging quickly
/// for typical list sizes; hosts with cheaper providers can raise it via
/// [`DimensionMarshal::with_batch_size`].
const DEFAULT_BATCH_SIZE: usize = 2;

/// The interaction engine's intake for everything the marshal produces.
///
/// Publish calls append freshly measured dimensions in batches;
/// [`update_droppable_scroll`](Self::update_droppable_scroll) forwards scroll
/// offsets from watched droppables; [`cancel`](Self::cancel) asks the engine
/// to abandon the drag when the marshal cannot proceed.
pub trait Publisher {
    /// Append a batch of freshly measured droppable dimensions.
    fn publish_droppables(&self, dimensions: Vec<DroppableDimension>);

    /// Append a batch of freshly measured draggable dimensions.
    fn publish_draggables(&self, dimensions: Vec<DraggableDimension>);

    /// A watched droppable reported a new scroll offset.
    fn update_droppable_scroll(&self, id: DroppableId, offset: Vec2);

    /// The drag cannot proceed; the engine should cancel it.
    fn cancel(&self);
}

/// Outstanding scheduled work for the active collection.
///
/// Both handles are `None` whenever no collection is active; this is checked
/// at collection teardown.
#[derive(Copy, Clone, Debug, Default)]
struct Timers {
    /// One-shot lift-confirmation callback.
    lift: Option<TaskHandle>,
    /// The next queued collection tick.
    frame: Option<TaskHandle>,
}

impl Timers {
    fn is_clear(&self) -> bool {
        self.lift.is_none() && self.frame.is_none()
    }
}

/// Transient state of one drag's dimension gathering.
///
/// Every registered entity reachable at collection start is, at any instant,
/// in exactly one of: `pending` (not yet measured), `buffer` (measured, not
/// yet published, represented by its dimension), or `collected` (measured
/// and published, including the initial subject/home pair).
#[derive(Clone, Debug)]
struct Collection {
    /// The draggable being dragged.
    subject: DraggableDescriptor,
    /// Descriptors not yet measured, closest first.
    pending: VecDeque<EntityDescriptor>,
    /// Dimensions measured on the current frame, published on the next.
    buffer: Vec<EntityDimension>,
    /// Descriptors whose dimensions have been published.
    collected: Vec<EntityDescriptor>,
}

struct State {
    registry: EntryRegistry,
    collection: Option<Collection>,
    timers: Timers,
}

/// Registration surface and collection driver for one drag-and-drop surface.
///
/// The marshal is a cheaply cloneable handle; clones share one underlying
/// state. Construct one per drag surface and feed it every phase change the
/// host observes; it is entirely driven by
/// [`on_phase_change`](Self::on_phase_change).
///
/// See the [module docs](self) for the collection timeline and the crate
/// docs for a complete worked example.
#[derive(Clone)]
pub struct DimensionMarshal {
    state: Rc<RefCell<State>>,
    publisher: Rc<dyn Publisher>,
    scheduler: Rc<dyn Scheduler>,
    on_scroll: ScrollListener,
    batch_size: usize,
}

impl fmt::Debug for DimensionMarshal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("DimensionMarshal")
            .field("collection", &state.collection)
            .field("timers", &state.timers)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl DimensionMarshal {
    /// Create a marshal with the default measurement batch size.
    pub fn new(publisher: Rc<dyn Publisher>, scheduler: Rc<dyn Scheduler>) -> Self {
        Self::with_batch_size(publisher, scheduler, DEFAULT_BATCH_SIZE)
    }

    /// Create a marshal measuring `batch_size` entities per paint frame.
    ///
    /// A `batch_size` of zero is treated as one.
    pub fn with_batch_size(
        publisher: Rc<dyn Publisher>,
        scheduler: Rc<dyn Scheduler>,
        batch_size: usize,
    ) -> Self {
        let on_scroll: ScrollListener = {
            let publisher = publisher.clone();
            Rc::new(move |id, offset| publisher.update_droppable_scroll(id, offset))
        };
        Self {
            state: Rc::new(RefCell::new(State {
                registry: EntryRegistry::new(),
                collection: None,
                timers: Timers::default(),
            })),
            publisher,
            scheduler,
            on_scroll,
            batch_size: batch_size.max(1),
        }
    }

    /// Whether a collection is currently active.
    pub fn is_collecting(&self) -> bool {
        self.state.borrow().collection.is_some()
    }

    /// Register a draggable.
    ///
    /// A duplicate id is logged and ignored. If a collection is active the
    /// new draggable is measured and published immediately, outside the
    /// staged order, so entities mounted mid-drag still participate.
    pub fn register_draggable(
        &self,
        descriptor: DraggableDescriptor,
        provider: Rc<dyn DraggableProvider>,
    ) {
        let side_publish = {
            let mut state = self.state.borrow_mut();
            let inserted = state.registry.register_draggable(descriptor, provider.clone());
            inserted && state.collection.is_some()
        };
        if side_publish {
            log::debug!("publishing draggable {:?} mid collection", descriptor.id);
            let dimension = provider.dimension();
            self.publisher.publish_draggables(vec![dimension]);
        }
    }

    /// Register a droppable.
    ///
    /// A duplicate id is logged and ignored. If a collection is active the
    /// new droppable is measured and published immediately, outside the
    /// staged order; its scroll is not put under watch.
    pub fn register_droppable(
        &self,
        descriptor: DroppableDescriptor,
        provider: Rc<dyn DroppableProvider>,
    ) {
        let side_publish = {
            let mut state = self.state.borrow_mut();
            let inserted = state.registry.register_droppable(descriptor, provider.clone());
            inserted && state.collection.is_some()
        };
        if side_publish {
            log::debug!("publishing droppable {:?} mid collection", descriptor.id);
            let dimension = provider.dimension();
            self.publisher.publish_droppables(vec![dimension]);
        }
    }

    /// Unregister a draggable.
    ///
    /// An absent id is logged and ignored. Unmounting during an active
    /// collection is not supported: the entry is removed, but collection
    /// state referencing it is not unwound.
    pub fn unregister_draggable(&self, id: DraggableId) {
        let mid_collection = {
            let mut state = self.state.borrow_mut();
            state.registry.unregister_draggable(id).is_some() && state.collection.is_some()
        };
        if mid_collection {
            log::warn!("unmounting draggable {id:?} during a drag is not supported");
        }
    }

    /// Unregister a droppable.
    ///
    /// An absent id is logged and ignored. Unmounting during an active
    /// collection is not supported: the entry is removed, but the droppable
    /// is not retracted from dimensions already published.
    pub fn unregister_droppable(&self, id: DroppableId) {
        let mid_collection = {
            let mut state = self.state.borrow_mut();
            state.registry.unregister_droppable(id).is_some() && state.collection.is_some()
        };
        if mid_collection {
            log::warn!("unmounting droppable {id:?} during a drag is not supported");
        }
    }

    /// Drive the marshal from an externally observed phase change.
    ///
    /// Observations whose phase equals the previous phase are ignored.
    /// Entering [`Phase::Collecting`] starts a collection for the snapshot's
    /// requested draggable (cancelling the drag if the request is missing or
    /// unresolvable); entering [`Phase::DropAnimating`],
    /// [`Phase::DropComplete`], or [`Phase::Idle`] stops any active
    /// collection.
    pub fn on_phase_change(&self, current: &PhaseSnapshot, previous: &PhaseSnapshot) {
        if current.phase == previous.phase {
            return;
        }

        match current.phase {
            Phase::Collecting => match current.request {
                Some(descriptor) => self.start_collecting(descriptor),
                None => {
                    log::error!("no draggable requested on entering the collecting phase");
                    self.publisher.cancel();
                }
            },
            Phase::DropAnimating | Phase::DropComplete | Phase::Idle => {
                if self.is_collecting() {
                    self.stop_collecting();
                }
            }
            Phase::Requested | Phase::Dragging => {}
        }
    }

    /// Begin a collection: measure and publish the subject/home pair, watch
    /// the home droppable's scroll, and arm the lift-confirmation callback.
    fn start_collecting(&self, descriptor: DraggableDescriptor) {
        let Some((subject_provider, home_provider)) = self.arm_lift(descriptor) else {
            self.publisher.cancel();
            return;
        };

        let home_dimension = home_provider.dimension();
        let subject_dimension = subject_provider.dimension();
        self.publisher.publish_droppables(vec![home_dimension]);
        self.publisher.publish_draggables(vec![subject_dimension]);
        home_provider.watch_scroll(self.on_scroll.clone());
    }

    /// Resolve the subject and home entries, install the fresh collection,
    /// and arm the lift timer. Returns `None`, with the anomaly logged and
    /// no state left behind, if either entry is unresolvable or a
    /// collection is already in progress.
    fn arm_lift(
        &self,
        descriptor: DraggableDescriptor,
    ) -> Option<(Rc<dyn DraggableProvider>, Rc<dyn DroppableProvider>)> {
        let mut state = self.state.borrow_mut();

        if state.collection.is_some() {
            log::error!(
                "cannot start collecting for {:?}: a collection is already in progress",
                descriptor.id
            );
            return None;
        }

        let subject_provider = match state.registry.draggable(descriptor.id) {
            Some(entry) => entry.provider.clone(),
            None => {
                log::error!(
                    "cannot find draggable {:?} to start collecting dimensions",
                    descriptor.id
                );
                return None;
            }
        };
        let (home_descriptor, home_provider) =
            match state.registry.droppable(descriptor.droppable_id) {
                Some(entry) => (entry.descriptor, entry.provider.clone()),
                None => {
                    log::error!(
                        "cannot find home droppable {:?} for draggable {:?}",
                        descriptor.droppable_id,
                        descriptor.id
                    );
                    return None;
                }
            };

        state.collection = Some(Collection {
            subject: descriptor,
            pending: VecDeque::new(),
            buffer: Vec::new(),
            collected: vec![
                EntityDescriptor::Draggable(descriptor),
                EntityDescriptor::Droppable(home_descriptor),
            ],
        });

        let marshal = self.clone();
        let lift = self
            .scheduler
            .after_current_work(Box::new(move || marshal.lift(home_descriptor)));
        state.timers.lift = Some(lift);

        Some((subject_provider, home_provider))
    }

    /// Lift confirmed: rank everything else and start the tick loop.
    ///
    /// The ranking happens now, not at collection start, so entities
    /// registered during the deferral are ranked too.
    fn lift(&self, home: DroppableDescriptor) {
        let mut state = self.state.borrow_mut();
        state.timers.lift = None;

        // The collection was torn down during the deferral.
        let Some(collection) = state.collection.take() else {
            return;
        };

        let pending = collection_order(&collection.subject, &home, &state.registry);
        state.collection = Some(Collection {
            pending,
            ..collection
        });
        self.arm_tick(&mut state);
    }

    /// Queue the next tick if the collection still has work and none is
    /// queued already.
    fn arm_tick(&self, state: &mut State) {
        let Some(collection) = &state.collection else {
            return;
        };
        if collection.pending.is_empty() && collection.buffer.is_empty() {
            return; // drained
        }
        if state.timers.frame.is_some() {
            return;
        }
        let marshal = self.clone();
        state.timers.frame = Some(self.scheduler.next_frame(Box::new(move || marshal.tick())));
    }

    /// One frame of collection work: publish the previous frame's batch,
    /// measure the next one, and re-arm while work remains.
    fn tick(&self) {
        let flush: Vec<EntityDimension>;
        let mut watch: Vec<Rc<dyn DroppableProvider>> = Vec::new();
        {
            let mut state = self.state.borrow_mut();
            state.timers.frame = None;

            // A stop landed between this tick being queued and firing.
            let Some(collection) = state.collection.take() else {
                return;
            };
            let Collection {
                subject,
                mut pending,
                buffer,
                mut collected,
            } = collection;

            // Drain the buffer first: everything measured last frame is
            // published before any further measurement is taken.
            flush = buffer;
            for dimension in &flush {
                collected.push(dimension.descriptor());
                if let EntityDimension::Droppable(dimension) = dimension {
                    if let Some(entry) = state.registry.droppable(dimension.descriptor.id) {
                        watch.push(entry.provider.clone());
                    }
                }
            }

            // Measure the next batch into a fresh buffer.
            let mut buffer = Vec::new();
            while buffer.len() < self.batch_size {
                let Some(descriptor) = pending.pop_front() else {
                    break;
                };
                match descriptor {
                    EntityDescriptor::Draggable(draggable) => {
                        match state.registry.draggable(draggable.id) {
                            Some(entry) => {
                                buffer.push(EntityDimension::Draggable(entry.provider.dimension()));
                            }
                            None => {
                                log::warn!(
                                    "draggable {:?} was unregistered before it was measured",
                                    draggable.id
                                );
                                collected.push(descriptor);
                            }
                        }
                    }
                    EntityDescriptor::Droppable(droppable) => {
                        match state.registry.droppable(droppable.id) {
                            Some(entry) => {
                                buffer.push(EntityDimension::Droppable(entry.provider.dimension()));
                            }
                            None => {
                                log::warn!(
                                    "droppable {:?} was unregistered before it was measured",
                                    droppable.id
                                );
                                collected.push(descriptor);
                            }
                        }
                    }
                }
            }

            state.collection = Some(Collection {
                subject,
                pending,
                buffer,
                collected,
            });
            self.arm_tick(&mut state);
        }

        // State is committed; run the publish side effects.
        if flush.is_empty() {
            return;
        }
        let mut droppables = Vec::new();
        let mut draggables = Vec::new();
        for dimension in flush {
            match dimension {
                EntityDimension::Droppable(dimension) => droppables.push(dimension),
                EntityDimension::Draggable(dimension) => draggables.push(dimension),
            }
        }
        if !droppables.is_empty() {
            self.publisher.publish_droppables(droppables);
        }
        if !draggables.is_empty() {
            self.publisher.publish_draggables(draggables);
        }
        for provider in watch {
            provider.watch_scroll(self.on_scroll.clone());
        }
    }

    /// Tear the active collection down: release scroll watches, cancel
    /// outstanding timers, and discard unpublished buffer contents.
    fn stop_collecting(&self) {
        let unwatch: Vec<Rc<dyn DroppableProvider>>;
        {
            let mut state = self.state.borrow_mut();
            let Some(collection) = state.collection.take() else {
                log::warn!("not stopping dimension collection: none is in progress");
                return;
            };

            // Only collected droppables were put under watch; entries
            // removed during the drag are skipped.
            unwatch = collection
                .collected
                .iter()
                .filter_map(|entity| match entity {
                    EntityDescriptor::Droppable(droppable) => state
                        .registry
                        .droppable(droppable.id)
                        .map(|entry| entry.provider.clone()),
                    EntityDescriptor::Draggable(_) => None,
                })
                .collect();

            if let Some(handle) = state.timers.lift.take() {
                self.scheduler.cancel(handle);
            }
            if let Some(handle) = state.timers.frame.take() {
                self.scheduler.cancel(handle);
            }
            debug_assert!(
                state.timers.is_clear(),
                "timers must be clear once the collection is gone"
            );
        }

        for provider in unwatch {
            provider.unwatch_scroll();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ManualScheduler;
    use crate::types::DropGroup;
    use alloc::vec;
    use core::cell::Cell;
    use kurbo::Rect;

    /// Everything the marshal tells the engine, in call order.
    #[derive(Clone, Debug, PartialEq)]
    enum Event {
        Droppables(Vec<DroppableId>),
        Draggables(Vec<DraggableId>),
        Scroll(DroppableId, Vec2),
        Cancel,
    }

    #[derive(Default)]
    struct Recording {
        events: RefCell<Vec<Event>>,
    }

    impl Recording {
        fn events(&self) -> Vec<Event> {
            self.events.borrow().clone()
        }
    }

    impl Publisher for Recording {
        fn publish_droppables(&self, dimensions: Vec<DroppableDimension>) {
            self.events.borrow_mut().push(Event::Droppables(
                dimensions.iter().map(|d| d.descriptor.id).collect(),
            ));
        }

        fn publish_draggables(&self, dimensions: Vec<DraggableDimension>) {
            self.events.borrow_mut().push(Event::Draggables(
                dimensions.iter().map(|d| d.descriptor.id).collect(),
            ));
        }

        fn update_droppable_scroll(&self, id: DroppableId, offset: Vec2) {
            self.events.borrow_mut().push(Event::Scroll(id, offset));
        }

        fn cancel(&self) {
            self.events.borrow_mut().push(Event::Cancel);
        }
    }

    struct Item {
        dimension: DraggableDimension,
        measures: Cell<usize>,
    }

    impl Item {
        fn new(descriptor: DraggableDescriptor) -> Rc<Self> {
            Rc::new(Self {
                dimension: DraggableDimension {
                    descriptor,
                    rect: Rect::new(0.0, 0.0, 100.0, 20.0),
                },
                measures: Cell::new(0),
            })
        }
    }

    impl DraggableProvider for Item {
        fn dimension(&self) -> DraggableDimension {
            self.measures.set(self.measures.get() + 1);
            self.dimension
        }
    }

    struct List {
        dimension: DroppableDimension,
        listener: RefCell<Option<ScrollListener>>,
        watches: Cell<usize>,
        unwatches: Cell<usize>,
    }

    impl List {
        fn new(descriptor: DroppableDescriptor) -> Rc<Self> {
            Rc::new(Self {
                dimension: DroppableDimension {
                    descriptor,
                    rect: Rect::new(0.0, 0.0, 120.0, 400.0),
                    frame: None,
                    scroll: Vec2::ZERO,
                },
                listener: RefCell::new(None),
                watches: Cell::new(0),
                unwatches: Cell::new(0),
            })
        }

        fn is_watched(&self) -> bool {
            self.listener.borrow().is_some()
        }

        /// Simulate the droppable scrolling while under watch.
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
            self.watches.set(self.watches.get() + 1);
            *self.listener.borrow_mut() = Some(listener);
        }

        fn unwatch_scroll(&self) {
            self.unwatches.set(self.unwatches.get() + 1);
            *self.listener.borrow_mut() = None;
        }
    }

    fn draggable(id: u64, droppable_id: u64, index: usize) -> DraggableDescriptor {
        DraggableDescriptor {
            id: DraggableId(id),
            droppable_id: DroppableId(droppable_id),
            index,
        }
    }

    fn droppable(id: u64) -> DroppableDescriptor {
        DroppableDescriptor {
            id: DroppableId(id),
            group: DropGroup::default(),
        }
    }

    struct Fixture {
        marshal: DimensionMarshal,
        scheduler: Rc<ManualScheduler>,
        publisher: Rc<Recording>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_batch_size(DEFAULT_BATCH_SIZE)
        }

        fn with_batch_size(batch_size: usize) -> Self {
            let scheduler = Rc::new(ManualScheduler::new());
            let publisher = Rc::new(Recording::default());
            let marshal = DimensionMarshal::with_batch_size(
                publisher.clone(),
                scheduler.clone(),
                batch_size,
            );
            Self {
                marshal,
                scheduler,
                publisher,
            }
        }

        fn start_drag(&self, subject: DraggableDescriptor) {
            self.marshal.on_phase_change(
                &PhaseSnapshot {
                    phase: Phase::Collecting,
                    request: Some(subject),
                },
                &PhaseSnapshot {
                    phase: Phase::Requested,
                    request: Some(subject),
                },
            );
        }

        fn finish_drag(&self) {
            self.marshal.on_phase_change(
                &PhaseSnapshot {
                    phase: Phase::DropComplete,
                    request: None,
                },
                &PhaseSnapshot {
                    phase: Phase::Dragging,
                    request: None,
                },
            );
        }

        /// Run the lift callback and every remaining tick.
        fn run_to_completion(&self) {
            self.scheduler.run_deferred();
            while self.scheduler.run_frame() > 0 {}
        }

        fn assert_torn_down(&self) {
            assert!(!self.marshal.is_collecting());
            assert_eq!(self.scheduler.pending_deferred(), 0);
            assert_eq!(self.scheduler.pending_frame(), 0);
        }
    }

    /// The two-list scene used throughout: subject `d1` in home `c1`;
    /// `c2` holds `d2` and `d3`. Collection order is `[c2, d2, d3]`.
    struct Scene {
        d1: DraggableDescriptor,
        c1_provider: Rc<List>,
        c2_provider: Rc<List>,
        d3_provider: Rc<Item>,
    }

    fn two_lists(fixture: &Fixture) -> Scene {
        let c1 = droppable(1);
        let c2 = droppable(2);
        let d1 = draggable(1, 1, 0);
        let d2 = draggable(2, 2, 0);
        let d3 = draggable(3, 2, 1);

        let c1_provider = List::new(c1);
        let c2_provider = List::new(c2);
        let d3_provider = Item::new(d3);
        fixture.marshal.register_droppable(c1, c1_provider.clone());
        fixture.marshal.register_droppable(c2, c2_provider.clone());
        fixture.marshal.register_draggable(d1, Item::new(d1));
        fixture.marshal.register_draggable(d2, Item::new(d2));
        fixture.marshal.register_draggable(d3, d3_provider.clone());

        Scene {
            d1,
            c1_provider,
            c2_provider,
            d3_provider,
        }
    }

    #[test]
    fn lift_publishes_the_subject_and_home_synchronously() {
        let fixture = Fixture::new();
        let scene = two_lists(&fixture);

        fixture.start_drag(scene.d1);

        assert_eq!(
            fixture.publisher.events(),
            vec![
                Event::Droppables(vec![DroppableId(1)]),
                Event::Draggables(vec![DraggableId(1)]),
            ],
        );
        assert!(scene.c1_provider.is_watched());
        assert!(!scene.c2_provider.is_watched());
        assert!(fixture.marshal.is_collecting());
        // The lift confirmation is deferred; no frame work is queued yet.
        assert_eq!(fixture.scheduler.pending_deferred(), 1);
        assert_eq!(fixture.scheduler.pending_frame(), 0);
    }

    #[test]
    fn staged_collection_publishes_in_relevance_order() {
        let fixture = Fixture::new();
        let scene = two_lists(&fixture);

        fixture.start_drag(scene.d1);
        assert_eq!(fixture.scheduler.run_deferred(), 1);

        // Tick 1: nothing buffered yet; measure [c2, d2].
        assert_eq!(fixture.scheduler.run_frame(), 1);
        assert_eq!(fixture.publisher.events().len(), 2, "no publish on tick 1");

        // Tick 2: publish [c2], [d2]; measure [d3]. c2 goes under watch.
        assert_eq!(fixture.scheduler.run_frame(), 1);
        assert!(scene.c2_provider.is_watched());

        // Tick 3: publish [d3]; nothing left, so no tick 4 is armed.
        assert_eq!(fixture.scheduler.run_frame(), 1);
        assert_eq!(fixture.scheduler.run_frame(), 0);

        assert_eq!(
            fixture.publisher.events(),
            vec![
                Event::Droppables(vec![DroppableId(1)]),
                Event::Draggables(vec![DraggableId(1)]),
                Event::Droppables(vec![DroppableId(2)]),
                Event::Draggables(vec![DraggableId(2)]),
                Event::Draggables(vec![DraggableId(3)]),
            ],
        );
    }

    #[test]
    fn every_entity_is_published_exactly_once() {
        let fixture = Fixture::new();
        let scene = two_lists(&fixture);

        fixture.start_drag(scene.d1);
        fixture.run_to_completion();

        let mut droppables: Vec<DroppableId> = Vec::new();
        let mut draggables: Vec<DraggableId> = Vec::new();
        for event in fixture.publisher.events() {
            match event {
                Event::Droppables(ids) => droppables.extend(ids),
                Event::Draggables(ids) => draggables.extend(ids),
                Event::Scroll(..) | Event::Cancel => panic!("unexpected event"),
            }
        }
        droppables.sort();
        draggables.sort();
        assert_eq!(droppables, vec![DroppableId(1), DroppableId(2)]);
        assert_eq!(
            draggables,
            vec![DraggableId(1), DraggableId(2), DraggableId(3)],
        );
    }

    #[test]
    fn droppables_precede_draggables_within_a_flush() {
        // Batch size 3 makes tick 1 measure [c2, d2, d3], so tick 2 flushes
        // a mixed batch.
        let fixture = Fixture::with_batch_size(3);
        let scene = two_lists(&fixture);

        fixture.start_drag(scene.d1);
        fixture.run_to_completion();

        assert_eq!(
            fixture.publisher.events(),
            vec![
                Event::Droppables(vec![DroppableId(1)]),
                Event::Draggables(vec![DraggableId(1)]),
                Event::Droppables(vec![DroppableId(2)]),
                Event::Draggables(vec![DraggableId(2), DraggableId(3)]),
            ],
        );
    }

    #[test]
    fn stopping_at_any_tick_leaves_no_timers_or_watches() {
        for ticks in 0..=3 {
            let fixture = Fixture::new();
            let scene = two_lists(&fixture);

            fixture.start_drag(scene.d1);
            if ticks > 0 {
                fixture.scheduler.run_deferred();
                for _ in 0..ticks {
                    fixture.scheduler.run_frame();
                }
            }
            fixture.finish_drag();

            fixture.assert_torn_down();
            assert!(
                !scene.c1_provider.is_watched(),
                "home watch must be released after {ticks} ticks"
            );
            assert!(
                !scene.c2_provider.is_watched(),
                "flushed watches must be released after {ticks} ticks"
            );
        }
    }

    #[test]
    fn stopping_discards_buffered_dimensions() {
        let fixture = Fixture::new();
        let scene = two_lists(&fixture);

        fixture.start_drag(scene.d1);
        fixture.scheduler.run_deferred();
        // Tick 1 measures [c2, d2] into the buffer; stop before they flush.
        fixture.scheduler.run_frame();
        fixture.finish_drag();

        assert_eq!(
            fixture.publisher.events(),
            vec![
                Event::Droppables(vec![DroppableId(1)]),
                Event::Draggables(vec![DraggableId(1)]),
            ],
            "buffered dimensions must never be published after a stop"
        );
        fixture.assert_torn_down();
    }

    #[test]
    fn stopping_when_not_collecting_is_a_no_op() {
        let fixture = Fixture::new();
        two_lists(&fixture);

        // Terminal phases with no active collection do nothing.
        fixture.finish_drag();
        assert!(fixture.publisher.events().is_empty());

        // An explicit stop with no collection is the logged no-op.
        fixture.marshal.stop_collecting();
        assert!(fixture.publisher.events().is_empty());
        fixture.assert_torn_down();
    }

    #[test]
    fn a_full_drag_then_idle_transition_stops_once() {
        let fixture = Fixture::new();
        let scene = two_lists(&fixture);

        fixture.start_drag(scene.d1);
        fixture.run_to_completion();
        fixture.finish_drag();
        let after_stop = fixture.publisher.events();

        // The follow-up transition to idle observes no collection.
        fixture.marshal.on_phase_change(
            &PhaseSnapshot::idle(),
            &PhaseSnapshot {
                phase: Phase::DropComplete,
                request: None,
            },
        );
        assert_eq!(fixture.publisher.events(), after_stop);
        fixture.assert_torn_down();
    }

    #[test]
    fn registering_mid_collection_publishes_immediately_exactly_once() {
        let fixture = Fixture::new();
        let scene = two_lists(&fixture);

        fixture.start_drag(scene.d1);
        fixture.scheduler.run_deferred();

        let d4 = draggable(4, 1, 1);
        let d4_provider = Item::new(d4);
        fixture.marshal.register_draggable(d4, d4_provider.clone());
        assert_eq!(
            fixture.publisher.events().last(),
            Some(&Event::Draggables(vec![DraggableId(4)])),
        );
        assert_eq!(d4_provider.measures.get(), 1);

        // The staged collection is unaffected: the remaining publishes are
        // exactly the ones from the ordered sequence.
        fixture.run_to_completion();
        let published: Vec<Event> = fixture
            .publisher
            .events()
            .iter()
            .filter(|event| matches!(event, Event::Draggables(ids) if ids == &vec![DraggableId(4)]))
            .cloned()
            .collect();
        assert_eq!(published.len(), 1, "mid-drag registration publishes once");
        assert_eq!(d4_provider.measures.get(), 1);
    }

    #[test]
    fn a_droppable_registered_mid_collection_is_not_watched() {
        let fixture = Fixture::new();
        let scene = two_lists(&fixture);

        fixture.start_drag(scene.d1);
        fixture.scheduler.run_deferred();

        let c3 = droppable(3);
        let c3_provider = List::new(c3);
        fixture.marshal.register_droppable(c3, c3_provider.clone());

        assert_eq!(
            fixture.publisher.events().last(),
            Some(&Event::Droppables(vec![DroppableId(3)])),
        );
        assert!(!c3_provider.is_watched());

        fixture.run_to_completion();
        fixture.finish_drag();
        assert_eq!(c3_provider.unwatches.get(), 0);
    }

    #[test]
    fn registration_before_the_lift_fires_is_still_ranked() {
        let fixture = Fixture::new();
        let scene = two_lists(&fixture);

        fixture.start_drag(scene.d1);
        // Mounted during the lift deferral: side-published now, and still
        // part of the ordered sequence, which is only computed once the
        // deferral fires.
        let d4 = draggable(4, 1, 1);
        let d4_provider = Item::new(d4);
        fixture.marshal.register_draggable(d4, d4_provider.clone());
        assert_eq!(d4_provider.measures.get(), 1);

        fixture.run_to_completion();
        // Ranked into the staged sequence as well, so it is measured again
        // there; the home neighbor ranks ahead of everything in c2.
        assert_eq!(d4_provider.measures.get(), 2);
    }

    #[test]
    fn unregistering_mid_collection_is_skipped_at_measure_time() {
        let fixture = Fixture::new();
        let scene = two_lists(&fixture);

        fixture.start_drag(scene.d1);
        fixture.scheduler.run_deferred();
        // d3 is still pending; removing it now must not unwind the
        // collection, and it is skipped when its batch comes up.
        fixture.marshal.unregister_draggable(DraggableId(3));
        assert_eq!(scene.d3_provider.measures.get(), 0);

        fixture.run_to_completion();

        assert_eq!(
            fixture.publisher.events(),
            vec![
                Event::Droppables(vec![DroppableId(1)]),
                Event::Draggables(vec![DraggableId(1)]),
                Event::Droppables(vec![DroppableId(2)]),
                Event::Draggables(vec![DraggableId(2)]),
            ],
        );
        assert_eq!(scene.d3_provider.measures.get(), 0);

        fixture.finish_drag();
        fixture.assert_torn_down();
    }

    #[test]
    fn scroll_updates_are_forwarded_while_watched() {
        let fixture = Fixture::new();
        let scene = two_lists(&fixture);

        fixture.start_drag(scene.d1);
        scene.c1_provider.scroll_to(Vec2::new(0.0, 25.0));
        assert_eq!(
            fixture.publisher.events().last(),
            Some(&Event::Scroll(DroppableId(1), Vec2::new(0.0, 25.0))),
        );

        fixture.finish_drag();
        scene.c1_provider.scroll_to(Vec2::new(0.0, 50.0));
        assert!(
            !fixture
                .publisher
                .events()
                .contains(&Event::Scroll(DroppableId(1), Vec2::new(0.0, 50.0))),
            "a released watch must not forward scroll updates"
        );
    }

    #[test]
    fn a_missing_subject_cancels_the_drag() {
        let fixture = Fixture::new();
        // Nothing registered at all.
        fixture.start_drag(draggable(9, 1, 0));

        assert_eq!(fixture.publisher.events(), vec![Event::Cancel]);
        fixture.assert_torn_down();
    }

    #[test]
    fn a_missing_home_cancels_the_drag() {
        let fixture = Fixture::new();
        let d1 = draggable(1, 1, 0);
        fixture.marshal.register_draggable(d1, Item::new(d1));

        fixture.start_drag(d1);

        assert_eq!(fixture.publisher.events(), vec![Event::Cancel]);
        fixture.assert_torn_down();
    }

    #[test]
    fn a_collecting_phase_without_a_request_cancels_the_drag() {
        let fixture = Fixture::new();
        two_lists(&fixture);

        fixture.marshal.on_phase_change(
            &PhaseSnapshot {
                phase: Phase::Collecting,
                request: None,
            },
            &PhaseSnapshot::idle(),
        );

        assert_eq!(fixture.publisher.events(), vec![Event::Cancel]);
        fixture.assert_torn_down();
    }

    #[test]
    fn starting_while_already_collecting_cancels_the_new_drag_only() {
        let fixture = Fixture::new();
        let scene = two_lists(&fixture);

        fixture.start_drag(scene.d1);
        let before = fixture.publisher.events();

        fixture.marshal.on_phase_change(
            &PhaseSnapshot {
                phase: Phase::Collecting,
                request: Some(draggable(2, 2, 0)),
            },
            &PhaseSnapshot {
                phase: Phase::Dragging,
                request: None,
            },
        );

        let mut expected = before;
        expected.push(Event::Cancel);
        assert_eq!(fixture.publisher.events(), expected);
        // The original collection is untouched and still completes.
        assert!(fixture.marshal.is_collecting());
        fixture.run_to_completion();
        assert!(
            fixture
                .publisher
                .events()
                .contains(&Event::Draggables(vec![DraggableId(3)])),
        );
    }

    #[test]
    fn an_unchanged_phase_is_ignored() {
        let fixture = Fixture::new();
        let scene = two_lists(&fixture);

        fixture.start_drag(scene.d1);
        let before = fixture.publisher.events();

        // The phase source re-emits the collecting phase; nothing restarts.
        fixture.marshal.on_phase_change(
            &PhaseSnapshot {
                phase: Phase::Collecting,
                request: Some(scene.d1),
            },
            &PhaseSnapshot {
                phase: Phase::Collecting,
                request: Some(scene.d1),
            },
        );
        assert_eq!(fixture.publisher.events(), before);
    }

    #[test]
    fn a_cancelled_drag_looks_like_a_stopped_one() {
        let fixture = Fixture::new();
        let scene = two_lists(&fixture);

        fixture.start_drag(scene.d1);
        fixture.scheduler.run_deferred();
        fixture.scheduler.run_frame();
        fixture.finish_drag();

        fixture.assert_torn_down();
        assert_eq!(scene.c1_provider.watches.get(), scene.c1_provider.unwatches.get());
        assert_eq!(scene.c2_provider.watches.get(), scene.c2_provider.unwatches.get());

        // The marshal is immediately ready for the next drag.
        fixture.marshal.on_phase_change(
            &PhaseSnapshot {
                phase: Phase::Collecting,
                request: Some(scene.d1),
            },
            &PhaseSnapshot::idle(),
        );
        assert!(fixture.marshal.is_collecting());
        fixture.run_to_completion();
        fixture.finish_drag();
        fixture.assert_torn_down();
    }
}
