//! Named-event bus.
//!
//! # Responsibilities
//! - Track declared event names and their listeners
//! - Fire events in registration order with `once` budgets
//! - Fold listener results through an optional transform
//!
//! # Design Decisions
//! - Listening to an undeclared event is a no-op
//! - Listeners are identified by `Arc` pointer for removal
//! - The registry lock is released before any listener runs, so listeners
//!   may subscribe or unsubscribe while an event is firing
//! - Listener panics are not caught

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// A listener's answer to one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal<A> {
    /// Observed; continue with the next listener.
    Pass,
    /// Continue, offering a value to the transform.
    Yield(A),
    /// Stop propagation; the event counts as handled.
    Stop,
}

pub type Listener<A> = Arc<dyn Fn(&A) -> Signal<A> + Send + Sync>;

/// Wrap a closure as a listener.
pub fn listener<A, F>(func: F) -> Listener<A>
where
    F: Fn(&A) -> Signal<A> + Send + Sync + 'static,
{
    Arc::new(func)
}

/// Result of one firing round.
#[derive(Debug, Clone, PartialEq)]
pub struct Fired<A> {
    /// Final accumulator (the input, unless the transform replaced it).
    pub args: A,
    /// A listener stopped propagation.
    pub handled: bool,
    /// Number of listeners that ran.
    pub invoked: usize,
}

struct Subscription<A> {
    listener: Listener<A>,
    /// `None` = unlimited.
    remaining: Option<AtomicUsize>,
}

impl<A> Subscription<A> {
    /// Take one unit of the fire budget.
    fn claim(&self) -> bool {
        match &self.remaining {
            None => true,
            Some(left) => left
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                .is_ok(),
        }
    }

    fn spent(&self) -> bool {
        self.remaining
            .as_ref()
            .is_some_and(|left| left.load(Ordering::Acquire) == 0)
    }
}

struct Registry<A> {
    declared: HashSet<String>,
    listeners: HashMap<String, Vec<Arc<Subscription<A>>>>,
}

/// Named-event pub/sub.
pub struct EventBus<A> {
    registry: Mutex<Registry<A>>,
}

impl<A> Default for EventBus<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for EventBus<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.lock();
        let mut names: Vec<_> = registry.declared.iter().collect();
        names.sort();
        f.debug_struct("EventBus").field("declared", &names).finish()
    }
}

impl<A> EventBus<A> {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry {
                declared: HashSet::new(),
                listeners: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry<A>> {
        // A panicking listener never runs under the lock, so the data is intact
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Declare event names, optionally attaching one listener to all of them.
    pub fn declare<I, S>(&self, names: I, initial: Option<Listener<A>>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = self.lock();
        for name in names {
            let name = name.into();
            if let Some(listener) = &initial {
                registry
                    .listeners
                    .entry(name.clone())
                    .or_default()
                    .push(Arc::new(Subscription {
                        listener: listener.clone(),
                        remaining: None,
                    }));
            }
            registry.declared.insert(name);
        }
    }

    fn subscribe(&self, name: &str, listener: Listener<A>, budget: Option<usize>) -> bool {
        let mut registry = self.lock();
        if !registry.declared.contains(name) {
            tracing::debug!(event = %name, "Ignoring listener for undeclared event");
            return false;
        }
        registry
            .listeners
            .entry(name.to_string())
            .or_default()
            .push(Arc::new(Subscription {
                listener,
                remaining: budget.map(AtomicUsize::new),
            }));
        true
    }

    /// Append a listener. Returns false when `name` was never declared.
    pub fn on(&self, name: &str, listener: Listener<A>) -> bool {
        self.subscribe(name, listener, None)
    }

    /// Append a listener that runs at most once.
    pub fn once(&self, name: &str, listener: Listener<A>) -> bool {
        self.subscribe(name, listener, Some(1))
    }

    /// Remove one listener, or all listeners of `name` when `listener` is
    /// `None`. Returns the number removed.
    pub fn off(&self, name: &str, listener: Option<&Listener<A>>) -> usize {
        let mut registry = self.lock();
        let Some(subs) = registry.listeners.get_mut(name) else {
            return 0;
        };
        let before = subs.len();
        match listener {
            Some(target) => subs.retain(|s| !Arc::ptr_eq(&s.listener, target)),
            None => subs.clear(),
        }
        before - subs.len()
    }

    /// Whether `name` was declared.
    pub fn has(&self, name: &str) -> bool {
        self.lock().declared.contains(name)
    }

    /// Whether `listener` is subscribed to `name` with budget left.
    pub fn has_listener(&self, name: &str, listener: &Listener<A>) -> bool {
        self.lock().listeners.get(name).is_some_and(|subs| {
            subs.iter()
                .any(|s| Arc::ptr_eq(&s.listener, listener) && !s.spent())
        })
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.lock()
            .listeners
            .get(name)
            .map_or(0, |subs| subs.iter().filter(|s| !s.spent()).count())
    }

    /// Forget one event (listeners and declaration), or every event.
    pub fn clear(&self, name: Option<&str>) {
        let mut registry = self.lock();
        match name {
            Some(name) => {
                registry.listeners.remove(name);
                registry.declared.remove(name);
            }
            None => {
                registry.listeners.clear();
                registry.declared.clear();
            }
        }
    }

    /// Run every listener of `name` with `args`.
    pub fn fire(&self, name: &str, args: A) -> Fired<A> {
        self.trigger(name, args, None)
    }

    /// Run every listener of `name` in registration order.
    ///
    /// With a `transform`, each `Signal::Yield` value is passed through it and
    /// a `Some` result replaces the args seen by the following listeners. A
    /// `Signal::Stop` ends the round and marks the event handled.
    pub fn trigger(
        &self,
        name: &str,
        args: A,
        transform: Option<&dyn Fn(A) -> Option<A>>,
    ) -> Fired<A> {
        let subs: Vec<Arc<Subscription<A>>> = self
            .lock()
            .listeners
            .get(name)
            .cloned()
            .unwrap_or_default();

        let mut fired = Fired {
            args,
            handled: false,
            invoked: 0,
        };

        for sub in &subs {
            if !sub.claim() {
                continue;
            }
            fired.invoked += 1;
            match (sub.listener)(&fired.args) {
                Signal::Pass => {}
                Signal::Stop => {
                    fired.handled = true;
                    break;
                }
                Signal::Yield(value) => {
                    if let Some(replacement) = transform.and_then(|t| t(value)) {
                        fired.args = replacement;
                    }
                }
            }
        }

        if subs.iter().any(|s| s.spent()) {
            if let Some(live) = self.lock().listeners.get_mut(name) {
                live.retain(|s| !s.spent());
            }
        }

        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn counter(hits: &Arc<AtomicU32>) -> Listener<String> {
        let hits = hits.clone();
        listener(move |_: &String| {
            hits.fetch_add(1, Ordering::SeqCst);
            Signal::Pass
        })
    }

    #[test]
    fn test_undeclared_event_ignores_listeners() {
        let bus = EventBus::<String>::new();
        let hits = Arc::new(AtomicU32::new(0));
        assert!(!bus.on("boot", counter(&hits)));
        bus.fire("boot", String::new());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_once_fires_exactly_once() {
        let bus = EventBus::<String>::new();
        bus.declare(["tick"], None);
        let hits = Arc::new(AtomicU32::new(0));
        assert!(bus.once("tick", counter(&hits)));

        for _ in 0..3 {
            bus.fire("tick", String::new());
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count("tick"), 0);
    }

    #[test]
    fn test_stop_prevents_later_listeners() {
        let bus = EventBus::<String>::new();
        bus.declare(["save"], None);
        let hits = Arc::new(AtomicU32::new(0));
        bus.on("save", listener(|_: &String| Signal::Stop));
        bus.on("save", counter(&hits));

        let fired = bus.fire("save", String::new());
        assert!(fired.handled);
        assert_eq!(fired.invoked, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_transform_rewrites_args_for_next_listener() {
        let bus = EventBus::<String>::new();
        bus.declare(["present"], None);
        bus.on("present", listener(|body: &String| Signal::Yield(format!("<b>{body}</b>"))));
        bus.on("present", listener(|body: &String| Signal::Yield(format!("<i>{body}</i>"))));

        let identity = |v: String| Some(v);
        let fired = bus.trigger("present", "hi".to_string(), Some(&identity));
        assert_eq!(fired.args, "<i><b>hi</b></i>");
    }

    #[test]
    fn test_transform_returning_none_keeps_args() {
        let bus = EventBus::<String>::new();
        bus.declare(["present"], None);
        bus.on("present", listener(|_: &String| Signal::Yield(String::new())));

        let non_empty = |v: String| (!v.is_empty()).then_some(v);
        let fired = bus.trigger("present", "keep".to_string(), Some(&non_empty));
        assert_eq!(fired.args, "keep");
    }

    #[test]
    fn test_yield_without_transform_is_ignored() {
        let bus = EventBus::<String>::new();
        bus.declare(["e"], None);
        bus.on("e", listener(|_: &String| Signal::Yield("x".into())));
        assert_eq!(bus.fire("e", "orig".into()).args, "orig");
    }

    #[test]
    fn test_off_by_identity_and_clear_all() {
        let bus = EventBus::<String>::new();
        bus.declare(["e"], None);
        let hits = Arc::new(AtomicU32::new(0));
        let a = counter(&hits);
        let b = counter(&hits);
        bus.on("e", a.clone());
        bus.on("e", b.clone());

        assert_eq!(bus.off("e", Some(&a)), 1);
        assert!(!bus.has_listener("e", &a));
        assert!(bus.has_listener("e", &b));

        assert_eq!(bus.off("e", None), 1);
        assert_eq!(bus.listener_count("e"), 0);
        assert!(bus.has("e"));
    }

    #[test]
    fn test_declare_with_initial_listener() {
        let bus = EventBus::<String>::new();
        let hits = Arc::new(AtomicU32::new(0));
        bus.declare(["a", "b"], Some(counter(&hits)));
        bus.fire("a", String::new());
        bus.fire("b", String::new());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clear_removes_declaration() {
        let bus = EventBus::<String>::new();
        bus.declare(["a", "b"], None);
        bus.clear(Some("a"));
        assert!(!bus.has("a"));
        assert!(bus.has("b"));
        bus.clear(None);
        assert!(!bus.has("b"));
    }

    #[test]
    fn test_listener_may_subscribe_while_firing() {
        let bus = Arc::new(EventBus::<String>::new());
        bus.declare(["e"], None);
        let inner = bus.clone();
        bus.on(
            "e",
            listener(move |_: &String| {
                inner.on("e", listener(|_: &String| Signal::Pass));
                Signal::Pass
            }),
        );
        let fired = bus.fire("e", String::new());
        assert_eq!(fired.invoked, 1);
        assert_eq!(bus.listener_count("e"), 2);
    }
}
