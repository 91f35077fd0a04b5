//! Event kinds and payloads.

use bitflags::bitflags;

/// The mouse button a pointer event refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PointerButton {
    /// The primary (usually left) button.
    Primary,
    /// The middle button or wheel press.
    Middle,
    /// The secondary (usually right) button.
    Secondary,
}

bitflags! {
    /// Keyboard modifier state carried on key events.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        /// Shift is held.
        const SHIFT = 1 << 0;
        /// Control is held.
        const CTRL = 1 << 1;
        /// Alt/Option is held.
        const ALT = 1 << 2;
    }
}

/// Every event the scene graph can deliver.
///
/// Pointer press/release/click kinds carry the button so each of the three
/// buttons gets its own listener slot, matching per-button registration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Broadcast once per tick to every subscribed node.
    EnterFrame,
    /// The stage viewport was resized.
    Resize,
    /// The node (or an ancestor) was attached to the stage tree.
    AddedToStage,
    /// The node (or an ancestor) was detached from the stage tree.
    RemovedFromStage,

    /// A pointer button was pressed over the target.
    PointerDown(PointerButton),
    /// A pointer button was released over the target.
    PointerUp(PointerButton),
    /// A press and release of the same button resolved to the same target.
    Click(PointerButton),
    /// The pointer moved while over the target.
    PointerMove,
    /// The resolved pointer target changed to this node.
    PointerOver,
    /// The resolved pointer target changed away from this node.
    PointerOut,

    /// A touch contact began over the target.
    TouchBegin,
    /// A touch contact ended over the target.
    TouchEnd,
    /// A touch contact moved while over the target.
    TouchMove,
    /// A touch contact's resolved target changed to this node.
    TouchOver,
    /// A touch contact's resolved target changed away from this node.
    TouchOut,
    /// A touch began and ended on the same target.
    TouchTap,

    /// A key was pressed while the target had keyboard focus.
    KeyDown,
    /// A key was released while the target had keyboard focus.
    KeyUp,
    /// The target lost keyboard focus.
    FocusOut,
}

/// Kind-specific event data.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum EventPayload {
    /// No extra data.
    None,
    /// Pointer data: the position in stage units, plus movement since the
    /// previous sample (zero for non-move events).
    Pointer {
        /// Pointer x in stage coordinates.
        stage_x: f64,
        /// Pointer y in stage coordinates.
        stage_y: f64,
        /// Horizontal movement since the previous pointer sample.
        movement_x: f64,
        /// Vertical movement since the previous pointer sample.
        movement_y: f64,
    },
    /// Touch data: the contact position in stage units and its slot.
    Touch {
        /// Contact x in stage coordinates.
        stage_x: f64,
        /// Contact y in stage coordinates.
        stage_y: f64,
        /// The touch slot this contact occupies.
        touch_id: usize,
    },
    /// Keyboard data.
    Key {
        /// Platform key code of the key.
        key_code: u32,
        /// Character code, where the key produces one.
        char_code: u32,
        /// Modifier state at the time of the event.
        modifiers: Modifiers,
    },
}

/// An event in flight.
///
/// `target` is the node the event was originally dispatched at and never
/// changes during bubbling; `current_target` is the node whose listeners are
/// currently being invoked.
#[derive(Clone, Debug, PartialEq)]
pub struct Event<K> {
    /// What happened.
    pub kind: EventKind,
    /// The node the event was dispatched at.
    pub target: Option<K>,
    /// The node whose listeners are currently running.
    pub current_target: Option<K>,
    /// Whether the event re-delivers at each ancestor after the target.
    pub bubbles: bool,
    /// Kind-specific data.
    pub payload: EventPayload,
}

impl<K> Event<K> {
    /// A fresh event with no target and no payload.
    pub fn new(kind: EventKind, bubbles: bool) -> Self {
        Self {
            kind,
            target: None,
            current_target: None,
            bubbles,
            payload: EventPayload::None,
        }
    }

    /// Attach a payload.
    #[must_use]
    pub fn with_payload(mut self, payload: EventPayload) -> Self {
        self.payload = payload;
        self
    }
}
