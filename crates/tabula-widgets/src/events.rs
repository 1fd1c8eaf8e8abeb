#![forbid(unsafe_code)]

//! Named-event bus.
//!
//! The table re-emits what its observers did as named events. Details can be
//! passed eagerly ([`EventBus::emit`]) or as a factory that only runs when
//! someone listens ([`EventBus::emit_with`]).
//!
//! Handlers run outside any internal borrow, so a handler may register or
//! remove listeners (taking effect from the next emit).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

/// Identifier of one listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler<D> = Rc<dyn Fn(&D)>;

struct BusState<D> {
    next_id: u64,
    listeners: AHashMap<String, Vec<(ListenerId, Handler<D>)>>,
}

/// Event bus carrying details of type `D`. Clones share listeners.
pub struct EventBus<D> {
    state: Rc<RefCell<BusState<D>>>,
}

impl<D> Clone for EventBus<D> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<D> Default for EventBus<D> {
    fn default() -> Self {
        Self {
            state: Rc::new(RefCell::new(BusState {
                next_id: 1,
                listeners: AHashMap::new(),
            })),
        }
    }
}

impl<D> fmt::Debug for EventBus<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        let mut names: Vec<_> = state.listeners.keys().collect();
        names.sort();
        f.debug_struct("EventBus").field("events", &names).finish()
    }
}

impl<D> EventBus<D> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for `name`.
    pub fn on(&self, name: &str, handler: impl Fn(&D) + 'static) -> ListenerId {
        let handler: Handler<D> = Rc::new(handler);
        let mut state = self.state.borrow_mut();
        let id = ListenerId(state.next_id);
        state.next_id += 1;
        state
            .listeners
            .entry(name.to_owned())
            .or_default()
            .push((id, handler));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut state = self.state.borrow_mut();
        let mut found = false;
        state.listeners.retain(|_, handlers| {
            let before = handlers.len();
            handlers.retain(|(h, _)| *h != id);
            found |= handlers.len() != before;
            !handlers.is_empty()
        });
        found
    }

    #[must_use]
    pub fn has_listeners(&self, name: &str) -> bool {
        self.state.borrow().listeners.contains_key(name)
    }

    #[must_use]
    pub fn listener_count(&self, name: &str) -> usize {
        self.state.borrow().listeners.get(name).map_or(0, Vec::len)
    }

    fn handlers(&self, name: &str) -> Vec<Handler<D>> {
        self.state
            .borrow()
            .listeners
            .get(name)
            .map(|hs| hs.iter().map(|(_, h)| Rc::clone(h)).collect())
            .unwrap_or_default()
    }

    /// Deliver `details` to every listener of `name`. Returns the number of
    /// listeners invoked.
    pub fn emit(&self, name: &str, details: D) -> usize {
        let handlers = self.handlers(name);
        for handler in &handlers {
            handler(&details);
        }
        handlers.len()
    }

    /// Like [`emit`](Self::emit), building details only if `name` has
    /// listeners.
    pub fn emit_with(&self, name: &str, details: impl FnOnce() -> D) -> usize {
        let handlers = self.handlers(name);
        if handlers.is_empty() {
            return 0;
        }
        let details = details();
        for handler in &handlers {
            handler(&details);
        }
        handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn emit_reaches_listeners_of_that_name() {
        let bus: EventBus<u32> = EventBus::new();
        let sum = Rc::new(Cell::new(0));
        let s = Rc::clone(&sum);
        bus.on("add", move |n| s.set(s.get() + n));
        assert_eq!(bus.emit("add", 3), 1);
        assert_eq!(bus.emit("other", 5), 0);
        assert_eq!(sum.get(), 3);
    }

    #[test]
    fn off_removes_only_that_listener() {
        let bus: EventBus<()> = EventBus::new();
        let a = bus.on("x", |_| {});
        bus.on("x", |_| {});
        assert!(bus.off(a));
        assert!(!bus.off(a));
        assert_eq!(bus.listener_count("x"), 1);
    }

    #[test]
    fn lazy_details_skip_work_without_listeners() {
        let bus: EventBus<String> = EventBus::new();
        let built = Cell::new(false);
        bus.emit_with("x", || {
            built.set(true);
            String::new()
        });
        assert!(!built.get());

        bus.on("x", |_| {});
        bus.emit_with("x", || {
            built.set(true);
            String::new()
        });
        assert!(built.get());
    }

    #[test]
    fn handler_may_register_listeners() {
        let bus: EventBus<()> = EventBus::new();
        let inner = bus.clone();
        bus.on("x", move |_| {
            inner.on("x", |_| {});
        });
        assert_eq!(bus.emit("x", ()), 1);
        assert_eq!(bus.listener_count("x"), 2);
    }
}
