//! The breadth-first delivery queue of one stimulus.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use wisp_script::Trigger;
use wisp_types::ObjectId;

/// Text printed to an observer when the delivery goes unhandled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Fallback {
    pub observer: ObjectId,
    pub text: String,
}

/// One pending invocation.
#[derive(Debug, Clone)]
pub(crate) struct Delivery {
    pub target: ObjectId,
    pub trigger: Trigger,
    /// Number of emits between the original stimulus and this delivery.
    pub depth: usize,
    pub fallback: Option<Fallback>,
    /// A `movementRendered` reply from the mover's `renderMovement`
    /// invocation. Only these print their message.
    pub narration: bool,
}

impl Delivery {
    pub fn new(target: ObjectId, trigger: Trigger, depth: usize) -> Self {
        Self {
            target,
            trigger,
            depth,
            fallback: None,
            narration: false,
        }
    }

    pub fn with_fallback(mut self, observer: ObjectId, text: String) -> Self {
        self.fallback = Some(Fallback { observer, text });
        self
    }

    pub fn as_narration(mut self) -> Self {
        self.narration = true;
        self
    }
}

/// FIFO of deliveries shared by the draining loop and the hosts of the
/// invocations it runs.
#[derive(Debug, Default)]
pub(crate) struct Cascade {
    queue: Mutex<VecDeque<Delivery>>,
}

impl Cascade {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, delivery: Delivery) {
        self.queue.lock().push_back(delivery);
    }

    pub fn pop(&self) -> Option<Delivery> {
        self.queue.lock().pop_front()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }
}
