//! Tick service contract and a manually driven implementation.
//!
//! A clock delivers the elapsed time since the previous call to each scheduled
//! callback, on one thread, never overlapping for the same handle. Callbacks
//! may schedule and unschedule (including themselves) while being dispatched.

use std::cell::RefCell;
use std::fmt;

use indexmap::IndexMap;

/// Per-tick callback, receives `dt` in seconds.
pub type TickFn = Box<dyn FnMut(f64)>;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TickHandle(pub u64);

/// Periodic tick source driving animation updates.
pub trait Clock {
    /// Register `callback` to run every `interval` seconds (0 = every tick).
    fn schedule(&self, callback: TickFn, interval: f64) -> TickHandle;

    /// Remove a callback. Unknown handles are ignored. Takes effect
    /// immediately, even from inside a dispatch.
    fn unschedule(&self, handle: TickHandle);
}

struct Entry {
    interval: f64,
    pending: f64,
    // None while the callback is being dispatched
    callback: Option<TickFn>,
}

#[derive(Default)]
struct ClockState {
    next: u64,
    entries: IndexMap<TickHandle, Entry>,
}

/// Clock advanced explicitly by the host (frame loop, tests).
#[derive(Default)]
pub struct ManualClock {
    state: RefCell<ClockState>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance time by `dt` and dispatch every due callback in scheduling order.
    /// Callbacks scheduled during this call first run on the next one.
    pub fn advance(&self, dt: f64) {
        let handles: Vec<TickHandle> = self.state.borrow().entries.keys().copied().collect();
        for handle in handles {
            let due = {
                let mut st = self.state.borrow_mut();
                let Some(entry) = st.entries.get_mut(&handle) else {
                    continue;
                };
                entry.pending += dt;
                if entry.pending + 1e-9 < entry.interval {
                    None
                } else {
                    let elapsed = std::mem::take(&mut entry.pending);
                    entry.callback.take().map(|cb| (cb, elapsed))
                }
            };
            if let Some((mut callback, elapsed)) = due {
                callback(elapsed);
                let mut st = self.state.borrow_mut();
                if let Some(entry) = st.entries.get_mut(&handle) {
                    entry.callback = Some(callback);
                }
            }
        }
    }

    /// Advance in fixed `step`s until `total` seconds have elapsed.
    pub fn run_for(&self, total: f64, step: f64) {
        if step <= 0.0 {
            return;
        }
        let mut elapsed = 0.0;
        while elapsed + 1e-9 < total {
            let dt = step.min(total - elapsed);
            self.advance(dt);
            elapsed += dt;
        }
    }

    /// Number of live registrations.
    pub fn scheduled(&self) -> usize {
        self.state.borrow().entries.len()
    }
}

impl Clock for ManualClock {
    fn schedule(&self, callback: TickFn, interval: f64) -> TickHandle {
        let mut st = self.state.borrow_mut();
        let handle = TickHandle(st.next);
        st.next += 1;
        st.entries.insert(
            handle,
            Entry {
                interval: interval.max(0.0),
                pending: 0.0,
                callback: Some(callback),
            },
        );
        handle
    }

    fn unschedule(&self, handle: TickHandle) {
        self.state.borrow_mut().entries.shift_remove(&handle);
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("scheduled", &self.scheduled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn delivers_dt_to_each_callback() {
        let clock = ManualClock::new();
        let total = Rc::new(Cell::new(0.0));
        let t = total.clone();
        clock.schedule(Box::new(move |dt| t.set(t.get() + dt)), 0.0);
        clock.advance(0.5);
        clock.advance(0.25);
        assert_eq!(total.get(), 0.75);
    }

    #[test]
    fn interval_accumulates_pending_time() {
        let clock = ManualClock::new();
        let calls = Rc::new(Cell::new(Vec::<f64>::new()));
        let c = calls.clone();
        clock.schedule(
            Box::new(move |dt| {
                let mut v = c.take();
                v.push(dt);
                c.set(v);
            }),
            0.1,
        );
        clock.advance(0.05);
        clock.advance(0.05);
        clock.advance(0.2);
        assert_eq!(calls.take(), vec![0.1, 0.2]);
    }

    #[test]
    fn callback_can_unschedule_itself() {
        let clock = Rc::new(ManualClock::new());
        let slot = Rc::new(Cell::new(None::<TickHandle>));
        let count = Rc::new(Cell::new(0));
        let (c, s, k) = (clock.clone(), slot.clone(), count.clone());
        let handle = clock.schedule(
            Box::new(move |_| {
                k.set(k.get() + 1);
                if let Some(h) = s.get() {
                    c.unschedule(h);
                }
            }),
            0.0,
        );
        slot.set(Some(handle));
        clock.advance(0.1);
        clock.advance(0.1);
        assert_eq!(count.get(), 1);
        assert_eq!(clock.scheduled(), 0);
    }

    #[test]
    fn run_for_steps_until_total() {
        let clock = ManualClock::new();
        let total = Rc::new(Cell::new(0.0));
        let t = total.clone();
        clock.schedule(Box::new(move |dt| t.set(t.get() + dt)), 0.0);
        clock.run_for(1.0, 0.25);
        assert!((total.get() - 1.0).abs() < 1e-12);
    }
}
