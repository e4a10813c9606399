//! Where the front end should be.
//!
//! The HTTP wrapper and the chat controller never draw anything; they move the
//! front end by publishing a [`Route`].  The front end subscribes and reacts.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// A view of the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Ask for credentials.
    Login,
    /// An empty conversation that has not been assigned a session yet.
    NewChat,
    /// The conversation of an existing session.
    Session(i64),
}

impl Route {
    /// Returns the session id for [`Route::Session`].
    pub fn session_id(&self) -> Option<i64> {
        match self {
            Route::Session(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Login => write!(f, "/login"),
            Route::NewChat => write!(f, "/"),
            Route::Session(id) => write!(f, "/c/{id}"),
        }
    }
}

/// Shared handle to the current route.
///
/// Clones observe and change the same route.
#[derive(Debug, Clone)]
pub struct Navigator {
    tx: Arc<watch::Sender<Route>>,
}

impl Navigator {
    /// Creates a navigator starting at `initial`.
    pub fn new(initial: Route) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Returns the current route.
    pub fn current(&self) -> Route {
        *self.tx.borrow()
    }

    /// Moves to `route`.  Returns false, and wakes nobody, if already there.
    pub fn navigate(&self, route: Route) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == route {
                false
            } else {
                *current = route;
                true
            }
        });
        if changed {
            tracing::debug!(%route, "navigated");
        }
        changed
    }

    /// Returns a receiver notified on every route change.
    pub fn subscribe(&self) -> watch::Receiver<Route> {
        self.tx.subscribe()
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(Route::NewChat)
    }
}
