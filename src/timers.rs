use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u32);

#[derive(Debug)]
struct TimerHandle {
    cancel_tx: mpsc::UnboundedSender<()>,
}

/// Timeouts and intervals running on the current `LocalSet`.
///
/// Callbacks are plain closures; they run on the same thread as the
/// runtime, so they may hold `Rc` state.
#[derive(Default)]
pub struct TimerRegistry {
    next_id: Cell<u32>,
    timers: Rc<RefCell<HashMap<TimerId, TimerHandle>>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&self) -> TimerId {
        let id = self.next_id.get().wrapping_add(1);
        self.next_id.set(id);
        TimerId(id)
    }

    pub fn set_timeout(&self, delay: Duration, callback: impl FnOnce() + 'static) -> TimerId {
        let timer_id = self.allocate();
        let (cancel_tx, mut cancel_rx) = mpsc::unbounded_channel();
        let timers = Rc::clone(&self.timers);

        tokio::task::spawn_local(async move {
            tokio::select! {
                _ = sleep(delay) => {
                    timers.borrow_mut().remove(&timer_id);
                    callback();
                }
                _ = cancel_rx.recv() => {
                    // Timer was cancelled
                }
            }
        });

        self.timers
            .borrow_mut()
            .insert(timer_id, TimerHandle { cancel_tx });
        timer_id
    }

    /// Run `callback` every `period`; the first run happens after one period.
    /// Periods shorter than a millisecond are raised to one.
    pub fn set_interval(&self, period: Duration, mut callback: impl FnMut() + 'static) -> TimerId {
        let period = period.max(MIN_INTERVAL);
        let timer_id = self.allocate();
        let (cancel_tx, mut cancel_rx) = mpsc::unbounded_channel::<()>();

        tokio::task::spawn_local(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // First tick happens immediately, skip it
            loop {
                tokio::select! {
                    _ = interval.tick() => callback(),
                    _ = cancel_rx.recv() => break,
                }
            }
        });

        self.timers
            .borrow_mut()
            .insert(timer_id, TimerHandle { cancel_tx });
        timer_id
    }

    pub fn clear_timer(&self, timer_id: TimerId) {
        if let Some(handle) = self.timers.borrow_mut().remove(&timer_id) {
            let _ = handle.cancel_tx.send(());
        }
    }

    pub fn clear_all(&self) {
        let mut timers = self.timers.borrow_mut();
        for (_, handle) in timers.drain() {
            let _ = handle.cancel_tx.send(());
        }
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        self.clear_all();
    }
}
