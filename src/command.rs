//! Deferred commands executed on the decode thread.
//!
//! Any thread may ask for a state change (a seek, a codec session rebuild)
//! through a [`CommandSender`]. The change itself only ever runs on the
//! thread that owns the state, when it calls [`CommandQueue::flush`]
//! between units of work. Commands run in submission order, exactly once.

use std::fmt::{Debug, Formatter, Result as FmtResult};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

/// A deferred call against the owner's state.
pub type Command<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Receiving side, held by the owning thread.
pub struct CommandQueue<T> {
    sender: Sender<Command<T>>,
    receiver: Receiver<Command<T>>,
}

/// Sending side; cheap to clone and safe to use from any thread.
pub struct CommandSender<T> {
    sender: Sender<Command<T>>,
}

impl<T> CommandQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    /// A new sender feeding this queue.
    pub fn sender(&self) -> CommandSender<T> {
        CommandSender {
            sender: self.sender.clone(),
        }
    }

    /// Number of commands waiting to run.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Run every pending command against `target`, in submission order.
    ///
    /// Commands pushed by the commands themselves run in the same flush.
    /// Returns how many commands ran.
    pub fn flush(&self, target: &mut T) -> usize {
        let mut executed = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(command) => {
                    command(target);
                    executed += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        executed
    }
}

impl<T> Default for CommandQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for CommandQueue<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CommandQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

impl<T> CommandSender<T> {
    /// Queue `command` to run on the owning thread.
    ///
    /// Returns `false` if the queue has been dropped; the command is
    /// discarded in that case.
    pub fn push<F>(&self, command: F) -> bool
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.sender.send(Box::new(command)).is_ok()
    }
}

impl<T> Clone for CommandSender<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> Debug for CommandSender<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CommandSender").finish_non_exhaustive()
    }
}
