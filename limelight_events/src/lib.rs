//! Limelight Events: event types and a bubbling listener dispatcher.
//!
//! ## Overview
//!
//! This crate defines the event vocabulary of the Limelight scene graph
//! ([`EventKind`], [`Event`], and the pointer/touch/keyboard payloads) and the
//! [`EventDispatcher`] that routes them.
//!
//! The dispatcher is generic over a node key `K` and knows nothing about the
//! scene structure. Listeners are registered per `(node, event kind)` pair and
//! are invoked in registration order. Bubbling is driven by a
//! [`ParentLookup`] the caller supplies: when an event bubbles, the dispatcher
//! re-delivers it at each ancestor while `target` stays fixed on the node it
//! was dispatched at.
//!
//! ## Listener identity and self-removal
//!
//! [`add_listener`](EventDispatcher::add_listener) returns a [`ListenerId`]
//! which is the handle for later removal. A listener can also remove *itself*
//! by returning [`ListenerOutcome::Remove`] from an invocation; removing other
//! listeners mid-dispatch is not supported.
//!
//! ## Frame ticks
//!
//! Nodes with at least one [`EventKind::EnterFrame`] listener form the *tick
//! list*. [`broadcast_tick`](EventDispatcher::broadcast_tick) delivers one
//! non-bubbling `EnterFrame` event to each member. Membership is
//! exactly-once per node regardless of listener count, and a node whose last
//! `EnterFrame` listener is removed mid-broadcast is skipped for the rest of
//! that broadcast.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod dispatcher;
mod event;

pub use dispatcher::{EventDispatcher, ListenerId, ListenerOutcome, ParentLookup};
pub use event::{Event, EventKind, EventPayload, Modifiers, PointerButton};
