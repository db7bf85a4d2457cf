//! Named events with synchronous, fault-isolated fan-out.
//!
//! Producers own an [`Event`] and call [`Event::trigger`]; consumers attach
//! listeners with [`Event::listen`].  Listeners run in registration order
//! on the caller's stack.
//!
//! ```text
//! ┌──────────────┐  trigger(&payload)  ┌────────────┐
//! │  Producer    │────────────────────▶│ listener 0 │ ok
//! │ (AdaptiveCycle,                    ├────────────┤
//! │  DHT, …)     │                     │ listener 1 │ Err / panic ─▶ logged
//! └──────────────┘                     ├────────────┤
//!                                      │ listener 2 │ still runs
//!                                      └────────────┘
//! ```
//!
//! A failing listener never stops the ones after it and never reaches the
//! producer.  `trigger` takes `&mut self`, so a listener cannot re-enter
//! the event it is being called from.

use std::panic::{AssertUnwindSafe, catch_unwind};

use log::warn;

use crate::error::ListenerFault;

/// Boxed listener callback.  Errors are logged by the event, not returned.
pub type Listener<T> = Box<dyn FnMut(&T) -> anyhow::Result<()>>;

/// A named, ordered list of listeners for payloads of type `T`.
pub struct Event<T> {
    name: &'static str,
    listeners: Vec<Listener<T>>,
}

impl<T> Event<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Attach a listener.  It will be invoked after every listener already
    /// attached.
    pub fn listen(&mut self, listener: impl FnMut(&T) -> anyhow::Result<()> + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Invoke every listener with `payload`.
    ///
    /// Returns the faults that were caught (already logged).  Callers are
    /// free to ignore the list.
    pub fn trigger(&mut self, payload: &T) -> Vec<ListenerFault> {
        let mut faults = Vec::new();

        for (index, listener) in self.listeners.iter_mut().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener(payload)));

            let panicked = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => {
                    warn!("Event[{}]: listener #{} failed: {:#}", self.name, index, e);
                    false
                }
                Err(_) => {
                    warn!("Event[{}]: listener #{} panicked", self.name, index);
                    true
                }
            };

            faults.push(ListenerFault {
                event: self.name,
                index,
                panicked,
            });
        }

        faults
    }
}

impl<T> core::fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
