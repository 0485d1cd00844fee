use crate::DynSvc;
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

/// Receives the payload of an event.
pub type EventHandler = Rc<dyn Fn(&DynSvc)>;

/// The event bus used by a [`PubSubExtension`](crate::PubSubExtension). It is
/// resolved from the container like any other service.
pub trait EventBus {
    /// Calls the handler with the payload of every later event with this
    /// name. The returned token removes the handler again (see
    /// [`EventBus::off`]).
    fn on(&self, event_name: &str, handler: EventHandler) -> u64;

    /// Removes a handler added with [`EventBus::on`].
    fn off(&self, token: u64);

    /// Calls every handler of the event with the payload.
    fn trigger(&self, event_name: &str, payload: &DynSvc);
}

struct Registration {
    token: u64,
    event_name: String,
    handler: EventHandler,
}

/// An [`EventBus`] which calls handlers synchronously, in the order they were
/// added.
#[derive(Default)]
pub struct LocalEventBus {
    registrations: RefCell<Vec<Registration>>,
    next_token: Cell<u64>,
}

impl LocalEventBus {
    /// Creates a bus with no handlers.
    #[must_use]
    pub fn new() -> Self {
        LocalEventBus::default()
    }

    /// The number of handlers of an event.
    #[must_use]
    pub fn handler_count(&self, event_name: &str) -> usize {
        self.registrations
            .borrow()
            .iter()
            .filter(|registration| registration.event_name == event_name)
            .count()
    }
}

impl EventBus for LocalEventBus {
    fn on(&self, event_name: &str, handler: EventHandler) -> u64 {
        let token = self.next_token.get();
        self.next_token.set(token + 1);
        self.registrations.borrow_mut().push(Registration {
            token,
            event_name: event_name.to_owned(),
            handler,
        });

        token
    }

    fn off(&self, token: u64) {
        self.registrations
            .borrow_mut()
            .retain(|registration| registration.token != token);
    }

    fn trigger(&self, event_name: &str, payload: &DynSvc) {
        // Handlers may subscribe or unsubscribe while the event is delivered.
        let handlers: Vec<EventHandler> = self
            .registrations
            .borrow()
            .iter()
            .filter(|registration| registration.event_name == event_name)
            .map(|registration| registration.handler.clone())
            .collect();

        for handler in handlers {
            handler(payload);
        }
    }
}
