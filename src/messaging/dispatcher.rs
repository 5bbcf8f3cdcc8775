use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Identifies one registration made with [`EventDispatcher::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync + 'static>;

struct Registry<E> {
    next_id: u64,
    listeners: HashMap<String, Vec<(ListenerId, Listener<E>)>>,
}

/// Named-listener registry.
///
/// Listeners run synchronously in registration order. The registry lock is
/// released before any listener runs, so a listener may register or remove
/// listeners (including itself) without deadlocking; such changes take effect
/// from the next `emit`.
pub struct EventDispatcher<E> {
    registry: Mutex<Registry<E>>,
}

impl<E> EventDispatcher<E> {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry {
                next_id: 0,
                listeners: HashMap::new(),
            }),
        }
    }

    /// Appends a listener for `event`. Registering the same closure twice
    /// yields two independent registrations.
    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry
            .listeners
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Invokes every listener registered for `event`.
    ///
    /// Returns `false` when nothing is registered under that name.
    pub fn emit(&self, event: &str, payload: &E) -> bool {
        let listeners: Vec<Listener<E>> = {
            let registry = self.registry.lock();
            match registry.listeners.get(event) {
                Some(store) => store.iter().map(|(_, l)| Arc::clone(l)).collect(),
                None => return false,
            }
        };

        for listener in &listeners {
            listener(payload);
        }
        true
    }

    /// Removes one listener, or every listener for `event` when `id` is `None`.
    pub fn off(&self, event: &str, id: Option<ListenerId>) {
        let mut registry = self.registry.lock();
        let Some(store) = registry.listeners.get_mut(event) else {
            return;
        };

        match id {
            Some(id) => store.retain(|(existing, _)| *existing != id),
            None => store.clear(),
        }

        if store.is_empty() {
            registry.listeners.remove(event);
        }
    }

    /// Removes every listener for every event.
    pub fn clear(&self) {
        self.registry.lock().listeners.clear();
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.registry
            .lock()
            .listeners
            .get(event)
            .map_or(0, Vec::len)
    }
}

impl<E> Default for EventDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventDispatcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        let counts: HashMap<&str, usize> = registry
            .listeners
            .iter()
            .map(|(name, store)| (name.as_str(), store.len()))
            .collect();
        f.debug_struct("EventDispatcher")
            .field("listeners", &counts)
            .finish()
    }
}
