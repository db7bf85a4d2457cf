//! Cooperative single-threaded task scheduler.
//!
//! Every subsystem that needs to wait does so by awaiting a [`Sleep`]
//! obtained from a [`SchedulerHandle`].  The scheduler keeps a min-heap of
//! absolute wake deadlines and polls a task only when its deadline has
//! passed, so tasks that sleep for minutes cost nothing in between.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Scheduler                              │
//! │                                                              │
//! │   timers (min-heap by deadline, then FIFO)                   │
//! │   ┌────────────┬────────────┬────────────┐                   │
//! │   │ t=1000 #0  │ t=1100 #1  │ t=2000 #2  │ ...               │
//! │   └─────┬──────┴────────────┴────────────┘                   │
//! │         │ due?                                               │
//! │         ▼                                                    │
//! │   poll task ──▶ Sleep registers next deadline ──▶ push heap  │
//! │                                                              │
//! │   nothing due ──▶ Clock::idle(min(next, BACKGROUND_WAKE_MS)) │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no preemption: a task runs until it awaits.  Tasks are plain
//! `async` blocks; the scheduler polls them with a no-op waker because the
//! only thing a task can wait on is time.

use core::cell::Cell;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::rc::Rc;

use log::{debug, info, warn};

use crate::app::ports::Clock;

/// Upper bound on one idle period.  The loop wakes at least this often even
/// when every task is asleep, which keeps `run_forever` alive on an empty
/// task table.
pub const BACKGROUND_WAKE_MS: u32 = 10_000;

type BoxedTask = Pin<Box<dyn Future<Output = ()>>>;

struct TaskSlot {
    name: &'static str,
    future: BoxedTask,
}

/// Heap entry.  Ordered by deadline, then by insertion sequence so tasks
/// due at the same instant run FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Wake {
    at: u64,
    seq: u64,
    task: usize,
}

/// State shared between the scheduler and the [`Sleep`] futures it hands
/// out.  Single-threaded, so plain `Cell`s.
struct Shared {
    /// Extended (non-wrapping) milliseconds since the scheduler started.
    now: Cell<u64>,
    /// Raw clock reading that corresponds to `now`.
    raw_now: Cell<u32>,
    /// Deadline requested by the task currently being polled.
    requested: Cell<Option<u64>>,
}

// ═══════════════════════════════════════════════════════════════
//  Handle and sleep future
// ═══════════════════════════════════════════════════════════════

/// Cheap clonable handle passed into every task.
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Rc<Shared>,
}

impl SchedulerHandle {
    /// Suspend the calling task for at least `secs` seconds.
    pub fn sleep(&self, secs: u32) -> Sleep {
        self.sleep_ms(secs.saturating_mul(1000))
    }

    /// Suspend the calling task for at least `ms` milliseconds.
    pub fn sleep_ms(&self, ms: u32) -> Sleep {
        Sleep {
            shared: self.shared.clone(),
            duration_ms: ms,
            deadline: None,
        }
    }

    /// Let every other task that is already due run before continuing.
    pub async fn yield_now(&self) {
        futures_lite::future::yield_now().await;
    }

    /// Clock reading at the moment the current task was resumed.
    pub fn now_ms(&self) -> u32 {
        self.shared.raw_now.get()
    }

    /// Milliseconds since the scheduler was created, never wrapping.
    pub fn uptime_ms(&self) -> u64 {
        self.shared.now.get()
    }
}

/// Future returned by [`SchedulerHandle::sleep_ms`].
pub struct Sleep {
    shared: Rc<Shared>,
    duration_ms: u32,
    deadline: Option<u64>,
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let now = self.shared.now.get();
        let duration = u64::from(self.duration_ms);
        let deadline = *self.deadline.get_or_insert(now + duration);

        if now >= deadline {
            return Poll::Ready(());
        }

        let earliest = match self.shared.requested.get() {
            Some(other) => other.min(deadline),
            None => deadline,
        };
        self.shared.requested.set(Some(earliest));
        Poll::Pending
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

/// The cooperative scheduler.  Owns every registered task and the clock.
pub struct Scheduler<C: Clock> {
    clock: C,
    shared: Rc<Shared>,
    tasks: Vec<Option<TaskSlot>>,
    timers: BinaryHeap<Reverse<Wake>>,
    next_seq: u64,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(clock: C) -> Self {
        let raw = clock.now_ms();
        Self {
            clock,
            shared: Rc::new(Shared {
                now: Cell::new(0),
                raw_now: Cell::new(raw),
                requested: Cell::new(None),
            }),
            tasks: Vec::new(),
            timers: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Handle for building sleeps outside of `create_task`.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            shared: self.shared.clone(),
        }
    }

    /// Register a task built from a handle.  The task first runs at the
    /// next scheduler opportunity.
    pub fn create_task<F, B>(&mut self, name: &'static str, body: B) -> usize
    where
        B: FnOnce(SchedulerHandle) -> F,
        F: Future<Output = ()> + 'static,
    {
        let fut = body(self.handle());
        self.spawn(name, fut)
    }

    /// Register an already-built future as a task.  Returns its slot id.
    pub fn spawn(&mut self, name: &'static str, future: impl Future<Output = ()> + 'static) -> usize {
        let slot = TaskSlot {
            name,
            future: Box::pin(future),
        };

        let id = match self.tasks.iter().position(Option::is_none) {
            Some(free) => {
                self.tasks[free] = Some(slot);
                free
            }
            None => {
                self.tasks.push(Some(slot));
                self.tasks.len() - 1
            }
        };

        info!("Scheduler: task '{}' registered as #{}", name, id);
        let now = self.shared.now.get();
        self.schedule(id, now);
        id
    }

    /// Number of tasks that have not finished.
    pub fn task_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_some()).count()
    }

    /// Extended milliseconds since construction.
    pub fn uptime_ms(&self) -> u64 {
        self.shared.now.get()
    }

    /// Poll every task whose deadline has passed.
    ///
    /// Tasks that yield during this pass are picked up on the next pass,
    /// so a task that never sleeps cannot starve the loop.
    pub fn run_due(&mut self) {
        self.refresh_now();
        let now = self.shared.now.get();
        let horizon = self.next_seq;

        while let Some(Reverse(top)) = self.timers.peek().copied() {
            if top.at > now || top.seq >= horizon {
                break;
            }
            self.timers.pop();
            self.poll_task(top.task);
        }
    }

    /// Milliseconds the loop may idle before something is due, capped at
    /// [`BACKGROUND_WAKE_MS`].
    pub fn idle_budget_ms(&self) -> u32 {
        let now = self.shared.now.get();
        match self.timers.peek() {
            Some(Reverse(top)) => {
                let wait = top.at.saturating_sub(now);
                wait.min(u64::from(BACKGROUND_WAKE_MS)) as u32
            }
            None => BACKGROUND_WAKE_MS,
        }
    }

    /// Drive the loop until `ms` milliseconds have elapsed on the clock.
    pub fn run_for(&mut self, ms: u32) {
        self.refresh_now();
        let end = self.shared.now.get() + u64::from(ms);

        loop {
            self.run_due();
            let now = self.shared.now.get();
            if now >= end {
                break;
            }
            let remaining = (end - now).min(u64::from(u32::MAX)) as u32;
            self.clock.idle(self.idle_budget_ms().min(remaining));
        }
    }

    /// Run the loop for the lifetime of the process.
    pub fn run_forever(&mut self) -> ! {
        info!("Scheduler: running {} task(s)", self.task_count());
        loop {
            self.run_due();
            let idle = self.idle_budget_ms();
            if idle > 0 {
                self.clock.idle(idle);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn refresh_now(&mut self) {
        let raw = self.clock.now_ms();
        let elapsed = raw.wrapping_sub(self.shared.raw_now.get());
        self.shared.raw_now.set(raw);
        self.shared.now.set(self.shared.now.get() + u64::from(elapsed));
    }

    fn schedule(&mut self, task: usize, at: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.push(Reverse(Wake { at, seq, task }));
    }

    fn poll_task(&mut self, id: usize) {
        let Some(slot) = self.tasks.get_mut(id).and_then(Option::as_mut) else {
            return;
        };

        let name = slot.name;
        self.shared.requested.set(None);
        let mut cx = Context::from_waker(Waker::noop());

        match slot.future.as_mut().poll(&mut cx) {
            Poll::Ready(()) => {
                info!("Scheduler: task '{}' (#{}) finished", name, id);
                self.tasks[id] = None;
            }
            Poll::Pending => {
                let now = self.shared.now.get();
                let at = match self.shared.requested.take() {
                    Some(deadline) => deadline,
                    None => {
                        debug!("Scheduler: task '{}' yielded", name);
                        now
                    }
                };
                if at < now {
                    warn!("Scheduler: task '{}' asked for a past deadline", name);
                }
                self.schedule(id, at.max(now));
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
