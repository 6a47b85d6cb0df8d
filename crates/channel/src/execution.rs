//! Per-request state: the output queue of one in-flight code submission and
//! the registry that maps correlation ids to it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::output::Output;

/// What travels through an execution's queue. The termination marker stays
/// internal; [`Execution::recv`] maps it to stream exhaustion.
#[derive(Debug)]
pub(crate) enum Event {
    Output(Output),
    EndOfExecution,
}

/// Registry-side state of one execution. The two flags are read and written
/// only by the receiver task.
struct ExecutionState {
    outputs: mpsc::Sender<Event>,
    input_accepted: bool,
    errored: bool,
}

/// Correlation id to execution state, shared between caller tasks
/// (register/remove) and the receiver task (lookup and flag updates).
#[derive(Default)]
pub(crate) struct Registry {
    executions: Mutex<HashMap<String, ExecutionState>>,
}

impl Registry {
    /// Registers a fresh execution under `msg_id` and hands back the consumer
    /// half of its queue. A previous entry under the same id is replaced; ids
    /// are uuids, so in practice every entry is fresh.
    pub(crate) fn register(&self, msg_id: &str, capacity: usize) -> mpsc::Receiver<Event> {
        let (sender, receiver) = mpsc::channel(capacity);
        let state = ExecutionState {
            outputs: sender,
            input_accepted: false,
            errored: false,
        };

        self.lock().insert(msg_id.to_owned(), state);
        receiver
    }

    pub(crate) fn remove(&self, msg_id: &str) {
        self.lock().remove(msg_id);
    }

    /// Queue sender for `msg_id`, or `None` if the execution is not (or no
    /// longer) registered.
    pub(crate) fn sender(&self, msg_id: &str) -> Option<mpsc::Sender<Event>> {
        self.lock().get(msg_id).map(|state| state.outputs.clone())
    }

    pub(crate) fn mark_input_accepted(&self, msg_id: &str) {
        if let Some(state) = self.lock().get_mut(msg_id) {
            state.input_accepted = true;
        }
    }

    pub(crate) fn input_accepted(&self, msg_id: &str) -> bool {
        self.lock()
            .get(msg_id)
            .map(|state| state.input_accepted)
            .unwrap_or(false)
    }

    /// Marks the execution errored. Returns `false` if it already was (or is
    /// not registered), so the caller can suppress a duplicate error event.
    pub(crate) fn mark_errored(&self, msg_id: &str) -> bool {
        match self.lock().get_mut(msg_id) {
            Some(state) if !state.errored => {
                state.errored = true;
                true
            }
            _ => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ExecutionState>> {
        self.executions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Caller-side handle of one in-flight code submission, returned by the
/// streaming entry point. Dropping it deregisters the execution; the receiver
/// loop notices the closed queue and stops delivering to it.
pub struct Execution {
    msg_id: String,
    queue: mpsc::Receiver<Event>,
    registry: Arc<Registry>,
    finished: bool,
}

impl Execution {
    pub(crate) fn new(
        msg_id: String,
        queue: mpsc::Receiver<Event>,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            msg_id,
            queue,
            registry,
            finished: false,
        }
    }

    /// The correlation id of this execution.
    pub fn msg_id(&self) -> &str {
        &self.msg_id
    }

    /// Waits for the next output. `None` once the execution has terminated
    /// (and on every call after that); there is no built-in timeout, wrap the
    /// call in one if the kernel may never terminate this execution.
    pub async fn recv(&mut self) -> Option<Output> {
        if self.finished {
            return None;
        }

        match self.queue.recv().await {
            Some(Event::Output(output)) => Some(output),
            Some(Event::EndOfExecution) | None => {
                self.finished = true;
                None
            }
        }
    }
}

impl Drop for Execution {
    fn drop(&mut self) {
        self.registry.remove(&self.msg_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;

    #[googletest::test]
    fn lookup_of_unregistered_id_yields_nothing() {
        let registry = Registry::default();
        expect_that!(registry.sender("missing").is_none(), eq(true));
        expect_that!(registry.input_accepted("missing"), eq(false));
        expect_that!(registry.mark_errored("missing"), eq(false));
    }

    #[googletest::test]
    fn registered_execution_can_be_looked_up_until_removed() {
        let registry = Registry::default();
        let _queue = registry.register("a", 10);

        expect_that!(registry.sender("a").is_some(), eq(true));
        registry.remove("a");
        expect_that!(registry.sender("a").is_none(), eq(true));
    }

    #[googletest::test]
    fn errored_is_marked_exactly_once() {
        let registry = Registry::default();
        let _queue = registry.register("a", 10);

        expect_that!(registry.mark_errored("a"), eq(true));
        expect_that!(registry.mark_errored("a"), eq(false));
    }

    #[googletest::test]
    fn input_accepted_starts_unset() {
        let registry = Registry::default();
        let _queue = registry.register("a", 10);

        expect_that!(registry.input_accepted("a"), eq(false));
        registry.mark_input_accepted("a");
        expect_that!(registry.input_accepted("a"), eq(true));
    }

    #[googletest::test]
    #[tokio::test]
    async fn recv_maps_the_termination_marker_to_exhaustion() {
        let registry = Arc::new(Registry::default());
        let queue = registry.register("a", 10);
        let sender = registry.sender("a").unwrap();
        let mut execution = Execution::new("a".into(), queue, registry.clone());

        sender
            .send(Event::Output(Output::stdout("", "hi")))
            .await
            .unwrap();
        sender.send(Event::EndOfExecution).await.unwrap();
        sender
            .send(Event::Output(Output::stdout("", "late")))
            .await
            .unwrap();

        expect_that!(execution.recv().await, some(eq(Output::stdout("", "hi"))));
        expect_that!(execution.recv().await.is_none(), eq(true));
        // Exhaustion is sticky even though a late event sits in the queue.
        expect_that!(execution.recv().await.is_none(), eq(true));
    }

    #[googletest::test]
    #[tokio::test]
    async fn dropping_the_handle_deregisters_the_execution() {
        let registry = Arc::new(Registry::default());
        let queue = registry.register("a", 10);
        let execution = Execution::new("a".into(), queue, registry.clone());

        drop(execution);
        expect_that!(registry.sender("a").is_none(), eq(true));
    }
}
