// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scheduling capabilities: deferred callbacks and paint ticks.
//!
//! The marshal never blocks and never spins; all multi-frame behavior is
//! driven by two host primitives, injected as a [`Scheduler`]:
//!
//! - [`Scheduler::after_current_work`] runs a task once after the current
//!   synchronous work completes (a zero-delay timer in browser-like hosts).
//! - [`Scheduler::next_frame`] runs a task once on the next paint frame.
//!
//! Both return a [`TaskHandle`] that can be passed to [`Scheduler::cancel`]
//! to drop the task before it runs. Production hosts bind these to their real
//! timer and paint primitives; tests and demos drive a [`ManualScheduler`]
//! by hand.
//!
//! A scheduler must never run a task synchronously inside the scheduling
//! call itself; tasks fire on a later turn of the host's cooperative
//! timeline. The marshal relies on this to keep its state consistent while
//! scheduling.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::mem;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + 'static>;

/// Identifies a scheduled task so it can be cancelled.
///
/// Handles are minted by the [`Scheduler`] implementation; the only
/// requirement is that a handle is not reused while its task is pending.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TaskHandle(pub u64);

/// Host scheduling primitives consumed by the marshal.
pub trait Scheduler {
    /// Run `task` once, after the current synchronous work completes.
    fn after_current_work(&self, task: Task) -> TaskHandle;

    /// Run `task` once, on the next paint frame.
    fn next_frame(&self, task: Task) -> TaskHandle;

    /// Drop a scheduled task before it runs.
    ///
    /// Cancelling a handle whose task already ran (or was never issued) is a
    /// no-op.
    fn cancel(&self, handle: TaskHandle);
}

/// A [`Scheduler`] advanced explicitly by the caller.
///
/// Tasks are queued, never run inline; [`run_deferred`](Self::run_deferred)
/// drains the deferred queue and [`run_frame`](Self::run_frame) drains one
/// frame's queue. Tasks scheduled *while* a queue is draining land in the
/// next drain, matching the semantics of zero-delay timers and paint ticks.
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use understory_dnd::schedule::{ManualScheduler, Scheduler};
///
/// let scheduler = ManualScheduler::new();
/// let fired = Rc::new(Cell::new(0));
///
/// let observed = fired.clone();
/// scheduler.next_frame(Box::new(move || observed.set(observed.get() + 1)));
/// assert_eq!(fired.get(), 0); // queued, not run inline
///
/// assert_eq!(scheduler.run_frame(), 1);
/// assert_eq!(fired.get(), 1);
/// assert_eq!(scheduler.run_frame(), 0); // one-shot
/// ```
#[derive(Default)]
pub struct ManualScheduler {
    queues: RefCell<Queues>,
}

#[derive(Default)]
struct Queues {
    next_handle: u64,
    deferred: Vec<(TaskHandle, Task)>,
    frame: Vec<(TaskHandle, Task)>,
}

impl Queues {
    fn mint(&mut self) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }
}

impl ManualScheduler {
    /// Create a scheduler with empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain and run every currently queued deferred task.
    ///
    /// Returns how many tasks ran. Deferred tasks queued by the tasks
    /// themselves are left for the next call.
    pub fn run_deferred(&self) -> usize {
        let drained = mem::take(&mut self.queues.borrow_mut().deferred);
        let count = drained.len();
        for (_, task) in drained {
            task();
        }
        count
    }

    /// Drain and run one frame's worth of queued frame tasks.
    ///
    /// Returns how many tasks ran. Frame tasks queued by the tasks themselves
    /// land in the next frame.
    pub fn run_frame(&self) -> usize {
        let drained = mem::take(&mut self.queues.borrow_mut().frame);
        let count = drained.len();
        for (_, task) in drained {
            task();
        }
        count
    }

    /// Number of queued deferred tasks.
    pub fn pending_deferred(&self) -> usize {
        self.queues.borrow().deferred.len()
    }

    /// Number of tasks queued for the next frame.
    pub fn pending_frame(&self) -> usize {
        self.queues.borrow().frame.len()
    }
}

impl Scheduler for ManualScheduler {
    fn after_current_work(&self, task: Task) -> TaskHandle {
        let mut queues = self.queues.borrow_mut();
        let handle = queues.mint();
        queues.deferred.push((handle, task));
        handle
    }

    fn next_frame(&self, task: Task) -> TaskHandle {
        let mut queues = self.queues.borrow_mut();
        let handle = queues.mint();
        queues.frame.push((handle, task));
        handle
    }

    fn cancel(&self, handle: TaskHandle) {
        let mut queues = self.queues.borrow_mut();
        queues.deferred.retain(|(pending, _)| *pending != handle);
        queues.frame.retain(|(pending, _)| *pending != handle);
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queues = self.queues.borrow();
        f.debug_struct("ManualScheduler")
            .field("pending_deferred", &queues.deferred.len())
            .field("pending_frame", &queues.frame.len())
            .field("next_handle", &queues.next_handle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::RefCell;

    fn recorder() -> (Rc<RefCell<Vec<u32>>>, impl Fn(u32) -> Task) {
        let seen: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));
        let make = {
            let seen = seen.clone();
            move |value: u32| -> Task {
                let seen = seen.clone();
                Box::new(move || seen.borrow_mut().push(value))
            }
        };
        (seen, make)
    }

    #[test]
    fn deferred_tasks_run_in_order_once() {
        let scheduler = ManualScheduler::new();
        let (seen, task) = recorder();
        scheduler.after_current_work(task(1));
        scheduler.after_current_work(task(2));

        assert_eq!(scheduler.run_deferred(), 2);
        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert_eq!(scheduler.run_deferred(), 0);
    }

    #[test]
    fn frame_tasks_scheduled_during_a_frame_land_in_the_next() {
        let scheduler = Rc::new(ManualScheduler::new());
        let (seen, task) = recorder();

        let inner = scheduler.clone();
        let second = task(2);
        scheduler.next_frame({
            let seen = seen.clone();
            Box::new(move || {
                seen.borrow_mut().push(1);
                inner.next_frame(second);
            })
        });

        assert_eq!(scheduler.run_frame(), 1);
        assert_eq!(*seen.borrow(), vec![1]);
        assert_eq!(scheduler.pending_frame(), 1);

        assert_eq!(scheduler.run_frame(), 1);
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn cancel_drops_a_pending_task() {
        let scheduler = ManualScheduler::new();
        let (seen, task) = recorder();
        scheduler.next_frame(task(1));
        let cancelled = scheduler.next_frame(task(2));
        scheduler.cancel(cancelled);

        assert_eq!(scheduler.run_frame(), 1);
        assert_eq!(*seen.borrow(), vec![1]);
    }

    #[test]
    fn cancel_unknown_handle_is_a_no_op() {
        let scheduler = ManualScheduler::new();
        scheduler.cancel(TaskHandle(42));
        let (seen, task) = recorder();
        let handle = scheduler.after_current_work(task(1));
        scheduler.run_deferred();
        // Already fired; cancelling again changes nothing.
        scheduler.cancel(handle);
        assert_eq!(*seen.borrow(), vec![1]);
    }

    #[test]
    fn handles_are_unique_across_both_queues() {
        let scheduler = ManualScheduler::new();
        let a = scheduler.after_current_work(Box::new(|| {}));
        let b = scheduler.next_frame(Box::new(|| {}));
        let c = scheduler.after_current_work(Box::new(|| {}));
        assert!(a != b && b != c && a != c, "handles must not collide");
    }

    #[test]
    fn pending_counts_track_queues() {
        let scheduler = ManualScheduler::new();
        scheduler.after_current_work(Box::new(|| {}));
        scheduler.next_frame(Box::new(|| {}));
        scheduler.next_frame(Box::new(|| {}));
        assert_eq!(scheduler.pending_deferred(), 1);
        assert_eq!(scheduler.pending_frame(), 2);
        scheduler.run_deferred();
        scheduler.run_frame();
        assert_eq!(scheduler.pending_deferred(), 0);
        assert_eq!(scheduler.pending_frame(), 0);
    }
}
