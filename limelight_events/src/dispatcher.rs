//! Listener registry and bubbling dispatch.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::hash::Hash;

use hashbrown::HashMap;

use crate::event::{Event, EventKind};

/// Supplies the parent of a node so an event can bubble.
///
/// The dispatcher never inspects scene structure itself; the caller passes a
/// lookup over whatever hierarchy it maintains. Any `Fn(K) -> Option<K>`
/// closure implements this.
pub trait ParentLookup<K> {
    /// The parent of `key`, or `None` at the root.
    fn parent_of(&self, key: K) -> Option<K>;
}

impl<K, F> ParentLookup<K> for F
where
    F: Fn(K) -> Option<K>,
{
    fn parent_of(&self, key: K) -> Option<K> {
        self(key)
    }
}

/// Handle to a registered listener, used for removal.
///
/// Ids are unique across the whole dispatcher and are never reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// What a listener wants done with itself after an invocation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ListenerOutcome {
    /// Stay registered.
    Keep,
    /// Unregister this listener; it will not be invoked again.
    Remove,
}

type ListenerFn<K> = Box<dyn FnMut(&Event<K>) -> ListenerOutcome>;

struct Slot<K> {
    id: ListenerId,
    f: ListenerFn<K>,
}

/// Routes events to listeners registered per `(node, event kind)` pair.
///
/// Listeners for a pair run in registration order. See the crate docs for
/// the bubbling and frame-tick contracts.
pub struct EventDispatcher<K> {
    listeners: HashMap<(K, EventKind), Vec<Slot<K>>>,
    /// Nodes with at least one `EnterFrame` listener, in subscription order.
    /// Each node appears at most once.
    tick_list: Vec<K>,
    next_id: u64,
}

impl<K> fmt::Debug for EventDispatcher<K>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listener_keys", &self.listeners.len())
            .field("tick_list", &self.tick_list)
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl<K> Default for EventDispatcher<K>
where
    K: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> EventDispatcher<K>
where
    K: Copy + Eq + Hash,
{
    /// An empty dispatcher.
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
            tick_list: Vec::new(),
            next_id: 0,
        }
    }

    /// Register `f` to run when `kind` is delivered at `key`.
    ///
    /// Returns the id to pass to [`remove_listener`](Self::remove_listener).
    /// Registering an [`EventKind::EnterFrame`] listener also subscribes
    /// `key` to [`broadcast_tick`](Self::broadcast_tick); a node subscribes
    /// once no matter how many `EnterFrame` listeners it holds.
    pub fn add_listener(
        &mut self,
        key: K,
        kind: EventKind,
        f: impl FnMut(&Event<K>) -> ListenerOutcome + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners
            .entry((key, kind))
            .or_default()
            .push(Slot { id, f: Box::new(f) });
        if kind == EventKind::EnterFrame && !self.tick_list.contains(&key) {
            self.tick_list.push(key);
        }
        id
    }

    /// Unregister a listener. Returns whether anything was removed; removing
    /// an unknown id is a no-op.
    ///
    /// Dropping the last `EnterFrame` listener of a node also drops the node
    /// from the tick list.
    pub fn remove_listener(&mut self, key: K, kind: EventKind, id: ListenerId) -> bool {
        let Some(slots) = self.listeners.get_mut(&(key, kind)) else {
            return false;
        };
        let before = slots.len();
        slots.retain(|s| s.id != id);
        let removed = slots.len() != before;
        if slots.is_empty() {
            self.listeners.remove(&(key, kind));
            if kind == EventKind::EnterFrame {
                self.tick_list.retain(|k| *k != key);
            }
        }
        removed
    }

    /// Whether any listener is registered for `kind` at `key`.
    pub fn has_listener(&self, key: K, kind: EventKind) -> bool {
        self.listeners
            .get(&(key, kind))
            .is_some_and(|slots| !slots.is_empty())
    }

    /// Number of listeners registered for `kind` at `key`.
    pub fn listener_count(&self, key: K, kind: EventKind) -> usize {
        self.listeners.get(&(key, kind)).map_or(0, Vec::len)
    }

    /// Drop every listener registered at `key`, for all event kinds, along
    /// with the node's tick subscription.
    ///
    /// Keys are typically generational ids that are never reused, so owners
    /// call this when a node is destroyed to keep the registry from
    /// accumulating entries for dead nodes.
    pub fn remove_all(&mut self, key: K) {
        self.listeners.retain(|(k, _), _| *k != key);
        self.tick_list.retain(|k| *k != key);
    }

    /// The nodes currently subscribed to frame ticks, in subscription order.
    pub fn tick_subscribers(&self) -> &[K] {
        &self.tick_list
    }

    /// Deliver `event` at `key` only, without bubbling.
    ///
    /// Sets `current_target` to `key`, and `target` too if it was unset.
    /// Listeners returning [`ListenerOutcome::Remove`] are unregistered
    /// before the next delivery.
    pub fn dispatch(&mut self, key: K, event: &mut Event<K>) {
        event.current_target = Some(key);
        if event.target.is_none() {
            event.target = Some(key);
        }
        // Listeners only see `&Event`, so nothing can re-enter the registry
        // while the slot list is detached here.
        let Some(mut slots) = self.listeners.remove(&(key, event.kind)) else {
            return;
        };
        slots.retain_mut(|slot| matches!((slot.f)(event), ListenerOutcome::Keep));
        if slots.is_empty() {
            if event.kind == EventKind::EnterFrame {
                self.tick_list.retain(|k| *k != key);
            }
        } else {
            self.listeners.insert((key, event.kind), slots);
        }
    }

    /// Deliver `event` at `key`, then re-deliver it at each ancestor when the
    /// event bubbles.
    ///
    /// `target` stays fixed on `key`; `current_target` tracks the node whose
    /// listeners are running.
    pub fn dispatch_bubbling(&mut self, key: K, event: &mut Event<K>, parents: &impl ParentLookup<K>) {
        self.dispatch(key, event);
        if !event.bubbles {
            return;
        }
        let mut cur = key;
        while let Some(parent) = parents.parent_of(cur) {
            self.dispatch(parent, event);
            cur = parent;
        }
    }

    /// Deliver one non-bubbling [`EventKind::EnterFrame`] event to every tick
    /// subscriber.
    ///
    /// The subscriber list is snapshotted up front, and membership is
    /// re-checked before each delivery so a node unsubscribed mid-broadcast
    /// is skipped rather than delivered stale.
    pub fn broadcast_tick(&mut self) {
        let snapshot = self.tick_list.clone();
        for key in snapshot {
            if !self.tick_list.contains(&key) {
                continue;
            }
            let mut event = Event::new(EventKind::EnterFrame, false);
            self.dispatch(key, &mut event);
        }
    }
}
