use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use bytes::Bytes;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::Channel;

/// Default number of messages a queue holds before `send` reports `Full`.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// A process-local message queue.
///
/// Clones share the same underlying queue, so one clone can act as the
/// sending end and another as the receiving end. Named queues opened with
/// [`MemoryQueue::open`] are shared by every caller using the same name,
/// which mirrors how system message queues are addressed by key.
#[derive(Clone)]
pub struct MemoryQueue {
    name: Arc<str>,
    state: Arc<Mutex<QueueState>>,
    max_message_size: usize,
}

struct QueueState {
    messages: VecDeque<Bytes>,
    capacity: usize,
    closed: bool,
}

fn named_queues() -> &'static Mutex<HashMap<String, MemoryQueue>> {
    static QUEUES: OnceLock<Mutex<HashMap<String, MemoryQueue>>> = OnceLock::new();
    QUEUES.get_or_init(|| Mutex::new(HashMap::new()))
}

impl MemoryQueue {
    /// Create an anonymous queue with default capacity.
    pub fn new(max_message_size: usize) -> Self {
        Self::with_capacity("anonymous", max_message_size, DEFAULT_QUEUE_CAPACITY)
    }

    /// Create an anonymous queue with an explicit capacity (in messages).
    pub fn with_capacity(name: &str, max_message_size: usize, capacity: usize) -> Self {
        Self {
            name: Arc::from(name),
            state: Arc::new(Mutex::new(QueueState {
                messages: VecDeque::new(),
                capacity,
                closed: false,
            })),
            max_message_size,
        }
    }

    /// Open the process-wide queue registered under `name`, creating it on
    /// first use.
    ///
    /// The `max_message_size` of the first opener wins.
    pub fn open(name: &str, max_message_size: usize) -> Result<Self> {
        let mut queues = named_queues().lock().map_err(|_| TransportError::Closed)?;
        if let Some(existing) = queues.get(name) {
            debug!(queue = name, "reusing named memory queue");
            return Ok(existing.clone());
        }
        let queue = Self::with_capacity(name, max_message_size, DEFAULT_QUEUE_CAPACITY);
        queues.insert(name.to_string(), queue.clone());
        info!(queue = name, max_message_size, "opened named memory queue");
        Ok(queue)
    }

    /// Remove a named queue from the process-wide table and close it.
    pub fn unlink(name: &str) -> Result<()> {
        let removed = named_queues()
            .lock()
            .map_err(|_| TransportError::Closed)?
            .remove(name);
        if let Some(queue) = removed {
            queue.close()?;
        }
        Ok(())
    }

    /// Close the queue. Pending messages can still be drained; new sends fail.
    pub fn close(&self) -> Result<()> {
        self.lock()?.closed = true;
        Ok(())
    }

    /// Whether the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.lock().map(|state| state.closed).unwrap_or(true)
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.lock().map(|state| state.messages.len()).unwrap_or(0)
    }

    /// Whether no messages are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>> {
        self.state.lock().map_err(|_| TransportError::Closed)
    }
}

impl Channel for MemoryQueue {
    fn send(&mut self, msg: &[u8]) -> Result<()> {
        if msg.len() > self.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: msg.len(),
                max: self.max_message_size,
            });
        }
        let mut state = self.lock()?;
        if state.closed {
            return Err(TransportError::Closed);
        }
        if state.messages.len() >= state.capacity {
            return Err(TransportError::Full {
                name: self.name.to_string(),
                capacity: state.capacity,
            });
        }
        state.messages.push_back(Bytes::copy_from_slice(msg));
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<Bytes>> {
        let mut state = self.lock()?;
        match state.messages.pop_front() {
            Some(msg) => Ok(Some(msg)),
            None if state.closed => Err(TransportError::Closed),
            None => Ok(None),
        }
    }

    fn pending(&mut self) -> Result<usize> {
        Ok(self.lock()?.messages.len())
    }

    fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for MemoryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryQueue")
            .field("name", &self.name)
            .field("max_message_size", &self.max_message_size)
            .field("queued", &self.len())
            .finish()
    }
}
