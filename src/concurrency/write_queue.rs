use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct QueueState {
    next_ticket: u64,
    now_serving: u64,
    active: bool,
}

/// FIFO admission queue running submitted writes one at a time, in
/// submission order. Each submission's outcome is its own: a failing or
/// panicking operation still hands the turn to the next ticket.
#[derive(Debug, Default)]
pub struct WriteQueue {
    state: Mutex<QueueState>,
    turn: Condvar,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until every earlier submission has finished, then runs `op`.
    pub fn submit<T, F>(&self, op: F) -> T
    where
        F: FnOnce() -> T,
    {
        let ticket = {
            let mut state = self.state.lock();
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            ticket
        };
        {
            let mut state = self.state.lock();
            while state.now_serving != ticket {
                self.turn.wait(&mut state);
            }
            state.active = true;
        }
        tracing::trace!(target: "relgraph::write_queue", ticket, "admitted");
        let _turn = Turn { queue: self };
        op()
    }

    /// Submissions waiting for their turn (the running one excluded).
    pub fn depth(&self) -> usize {
        let state = self.state.lock();
        let outstanding = state.next_ticket - state.now_serving;
        usize::try_from(outstanding - u64::from(state.active)).unwrap_or(usize::MAX)
    }

    /// True while a submitted operation is executing.
    pub fn is_processing(&self) -> bool {
        self.state.lock().active
    }
}

struct Turn<'q> {
    queue: &'q WriteQueue,
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        let mut state = self.queue.state.lock();
        state.active = false;
        state.now_serving += 1;
        drop(state);
        self.queue.turn.notify_all();
    }
}
