/// Identifies one scheduled presentation tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TickHandle(u64);

/// One-shot "run at the next presentation opportunity" scheduling.
///
/// At most one tick is pending at a time: scheduling replaces any pending
/// tick, and a tick fires at most once. Cancelling requires the handle
/// returned by [`schedule`](Self::schedule).
#[derive(Debug, Default)]
pub struct FrameScheduler {
    next_id: u64,
    pending: Option<TickHandle>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a tick for the next opportunity and returns its handle.
    pub fn schedule(&mut self) -> TickHandle {
        self.next_id += 1;
        let handle = TickHandle(self.next_id);
        self.pending = Some(handle);
        handle
    }

    /// Cancels `handle` if it is still pending. Returns whether anything was
    /// cancelled; stale or already fired handles are ignored.
    pub fn cancel(&mut self, handle: TickHandle) -> bool {
        if self.pending == Some(handle) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Fires the pending tick, if any. Called once per presentation
    /// opportunity.
    pub fn take_due(&mut self) -> Option<TickHandle> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
