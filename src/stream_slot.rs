//! Single-slot ownership of the live stream's cancellation handle.

use tokio_util::sync::CancellationToken;

/// Handle given to the task that owns a stream.
#[derive(Debug, Clone)]
pub struct StreamTicket {
    generation: u64,
    token: CancellationToken,
}

impl StreamTicket {
    /// Token that fires when the stream is superseded or cancelled.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns true once the stream has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Position of this stream in the slot's history.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Holds at most one live stream.
///
/// Installing a stream cancels the one before it.
#[derive(Debug, Default)]
pub struct StreamSlot {
    current: Option<StreamTicket>,
    generation: u64,
}

impl StreamSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the current stream, if any, and installs a new one.
    pub fn replace(&mut self) -> StreamTicket {
        self.cancel();
        self.generation += 1;
        let ticket = StreamTicket {
            generation: self.generation,
            token: CancellationToken::new(),
        };
        self.current = Some(ticket.clone());
        ticket
    }

    /// Cancels and removes the current stream.  Returns false if the slot was
    /// empty.
    pub fn cancel(&mut self) -> bool {
        match self.current.take() {
            Some(ticket) => {
                ticket.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Empties the slot if `ticket` still owns it.
    ///
    /// A superseded stream calling this leaves its successor in place.
    pub fn release(&mut self, ticket: &StreamTicket) -> bool {
        if self.owned_by(ticket) {
            self.current = None;
            true
        } else {
            false
        }
    }

    /// Returns true if `ticket` is the current stream.
    pub fn owned_by(&self, ticket: &StreamTicket) -> bool {
        self.current
            .as_ref()
            .is_some_and(|current| current.generation == ticket.generation)
    }

    /// Returns true if a stream is installed.
    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }
}
