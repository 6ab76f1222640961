//! Observer registry used for engine notifications.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<T> = Rc<dyn Fn(T)>;

struct Registry<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

/// Ordered set of listeners receiving owned copies of `T`.
pub struct Listeners<T> {
    registry: Rc<RefCell<Registry<T>>>,
}

impl<T: Clone + 'static> Listeners<T> {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(T) + 'static,
    {
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.entries.push((id, Rc::new(listener)));
            id
        };

        let weak: Weak<RefCell<Registry<T>>> = Rc::downgrade(&self.registry);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    registry.borrow_mut().entries.retain(|(entry_id, _)| *entry_id != id);
                }
            })),
        }
    }

    /// Deliver `value` to every listener registered when the pass begins.
    ///
    /// The registry is copied first, so listeners may subscribe or unsubscribe
    /// from inside the callback.
    pub fn emit(&self, value: &T) {
        let pass: Vec<Callback<T>> = self
            .registry
            .borrow()
            .entries
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();

        for callback in pass {
            callback(value.clone());
        }
    }

    pub fn clear(&self) {
        self.registry.borrow_mut().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.registry.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + 'static> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.registry.borrow().entries.len())
            .finish()
    }
}

/// Handle returned by `subscribe`. Dropping it keeps the listener registered.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
