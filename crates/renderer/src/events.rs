use std::cell::RefCell;
use std::rc::Rc;

use crate::types::{ClientRect, Viewport};

/// Window-level input a visualization listens to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    Resized { viewport: Viewport, rect: ClientRect },
    /// Pointer position in logical client coordinates.
    PointerMoved { client_x: f64, client_y: f64 },
}

impl HostEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HostEvent::Resized { .. } => EventKind::Resize,
            HostEvent::PointerMoved { .. } => EventKind::PointerMove,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Resize,
    PointerMove,
}

/// Handle returned by [`EventHub::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Box<dyn FnMut(&HostEvent)>;

struct Subscription {
    id: ListenerId,
    kind: EventKind,
    listener: Listener,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    subscriptions: Vec<Subscription>,
}

/// Process-wide resize and pointer-move source shared by every instance.
///
/// Each subscriber is independent; removing one never affects another.
#[derive(Clone, Default)]
pub struct EventHub {
    inner: Rc<RefCell<HubState>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let mut state = self.inner.borrow_mut();
        state.next_id += 1;
        let id = ListenerId(state.next_id);
        state.subscriptions.push(Subscription { id, kind, listener });
        id
    }

    /// Removes a listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut state = self.inner.borrow_mut();
        let before = state.subscriptions.len();
        state.subscriptions.retain(|subscription| subscription.id != id);
        state.subscriptions.len() != before
    }

    /// Delivers an event to every listener of its kind.
    ///
    /// Listeners must not subscribe or unsubscribe from inside the callback.
    pub fn dispatch(&self, event: HostEvent) {
        let kind = event.kind();
        let mut state = self.inner.borrow_mut();
        for subscription in state
            .subscriptions
            .iter_mut()
            .filter(|subscription| subscription.kind == kind)
        {
            (subscription.listener)(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().subscriptions.len()
    }
}
