//! The stage: tree root, tick driver, and input state machine.

use alloc::vec::Vec;
use hashbrown::HashMap;
use kurbo::Point;
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use limelight_events::{
    Event, EventDispatcher, EventKind, EventPayload, ListenerId, ListenerOutcome, Modifiers,
    PointerButton,
};
use limelight_geom::{Mat4, Vec4};

use crate::node::{BlendMode, NodeFlags, NodeId};
use crate::scene::{Scene, StageTransitions};
use crate::stacks::{ColorMatrixStack, ColorState, MatrixStack};

/// Maximum render/traversal nesting depth before the state stacks fail
/// loudly.
const STACK_CAPACITY: usize = 64;

/// Default vertical field of view, matching the classic 55° stage
/// projection.
const DEFAULT_FOV_DEGREES: f64 = 55.0;

const BUTTONS: [PointerButton; 3] = [
    PointerButton::Primary,
    PointerButton::Middle,
    PointerButton::Secondary,
];

fn button_index(button: PointerButton) -> usize {
    match button {
        PointerButton::Primary => 0,
        PointerButton::Middle => 1,
        PointerButton::Secondary => 2,
    }
}

/// Composed render state handed to the visitor for one node.
#[derive(Clone, Debug)]
pub struct RenderState {
    /// Root-to-node transform (top of the matrix stack).
    pub matrix: Mat4,
    /// Accumulated color transform (top of the color stack).
    pub color: ColorState,
    /// Blend mode in effect for this node's draws.
    pub blend: BlendMode,
    /// Whether the accumulated color state changed since the previous
    /// visit; when false the rasterizer's uploaded state is still valid.
    pub color_dirty: bool,
}

/// Receives every visible node during the render traversal, in render
/// order (parents before children, children back-to-front).
pub trait RenderVisitor {
    /// Called once per visible node with the composed state at its level.
    fn visit(&mut self, node: NodeId, state: &RenderState);
}

/// A touch contact's lifecycle step, as reported by the input source.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TouchPhase {
    /// Contact started.
    Begin,
    /// Contact moved.
    Move,
    /// Contact lifted.
    End,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TouchAction {
    Idle,
    Began,
    Moved,
    Ended,
}

#[derive(Copy, Clone, Debug)]
struct TouchSlot {
    position: Point,
    action: TouchAction,
    /// Last tick's resolved target, for enter/exit transitions.
    over: NodeId,
    /// Target latched on the begin edge; a tap requires the end edge to
    /// resolve the same node.
    began_on: Option<NodeId>,
}

#[derive(Copy, Clone, Debug)]
struct PointerState {
    position: Point,
    previous: Point,
    moved: bool,
    /// Per-button down edges since the last tick.
    down: [bool; 3],
    /// Per-button up edges since the last tick.
    up: [bool; 3],
    /// Last tick's resolved target (the root when nothing was hit).
    over: NodeId,
    /// Per-button target latched on the most recent down edge.
    latched: [Option<NodeId>; 3],
}

#[derive(Copy, Clone, Debug)]
struct KeySample {
    pressed: bool,
    key_code: u32,
    char_code: u32,
    modifiers: Modifiers,
}

/// The root of a scene tree and the driver of its per-frame tick.
///
/// The stage owns the [`Scene`], the event dispatcher, both render-state
/// stacks, and all input state. Input sources feed raw samples in between
/// ticks ([`pointer_move`](Self::pointer_move),
/// [`pointer_button`](Self::pointer_button),
/// [`touch_sample`](Self::touch_sample), [`key_sample`](Self::key_sample),
/// [`resize`](Self::resize)); one call to [`tick`](Self::tick) per display
/// refresh then runs resize handling, the frame-tick broadcast, input
/// resolution and event dispatch, and the full render traversal.
///
/// Structural edits that should fire added/removed-from-stage events must
/// go through the stage's [`add_child`](Self::add_child) /
/// [`remove_child`](Self::remove_child) wrappers; editing the scene
/// directly skips the notifications.
///
/// Multiple stages coexist; nothing here is process-global.
#[derive(Debug)]
pub struct Stage {
    scene: Scene,
    dispatcher: EventDispatcher<NodeId>,
    root: NodeId,
    width: f64,
    height: f64,
    focal_length: f64,
    resized: bool,
    mstack: MatrixStack,
    cmstack: ColorMatrixStack,
    pointer: PointerState,
    touches: HashMap<usize, TouchSlot>,
    keys: Vec<KeySample>,
    focus: Option<NodeId>,
    pointer_cursor: bool,
}

impl Stage {
    /// A stage with an empty attached root and the given viewport size in
    /// device pixels.
    pub fn new(width: f64, height: f64) -> Self {
        let mut scene = Scene::new();
        let root = scene.insert();
        scene.set_attached(root, true);
        Self {
            scene,
            dispatcher: EventDispatcher::new(),
            root,
            width,
            height,
            focal_length: default_focal_length(width),
            resized: false,
            mstack: MatrixStack::new(STACK_CAPACITY),
            cmstack: ColorMatrixStack::new(STACK_CAPACITY),
            pointer: PointerState {
                position: Point::ZERO,
                previous: Point::ZERO,
                moved: false,
                down: [false; 3],
                up: [false; 3],
                over: root,
                latched: [None; 3],
            },
            touches: HashMap::new(),
            keys: Vec::new(),
            focus: None,
            pointer_cursor: false,
        }
    }

    /// The root node. Always attached; it is the fallback event target
    /// when a pointer sample hits nothing.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Shared access to the scene.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Mutable access to the scene for attribute and transform edits.
    /// Structural edits made here bypass stage attach/detach events.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Viewport width in device pixels.
    pub fn stage_width(&self) -> f64 {
        self.width
    }

    /// Viewport height in device pixels.
    pub fn stage_height(&self) -> f64 {
        self.height
    }

    /// The perspective eye point in root coordinates: centered on the
    /// viewport, pulled back by the focal length. Every screen↔local
    /// conversion casts rays from here.
    pub fn origin(&self) -> Vec4 {
        [self.width / 2.0, self.height / 2.0, -self.focal_length, 1.0]
    }

    /// Distance from the eye to the viewport plane.
    pub fn focal_length(&self) -> f64 {
        self.focal_length
    }

    /// Override the focal length. [`resize`](Self::resize) resets it to
    /// the default for the new width.
    pub fn set_focal_length(&mut self, focal_length: f64) {
        self.focal_length = focal_length;
    }

    /// Latest pointer position in stage coordinates.
    pub fn pointer_position(&self) -> Point {
        self.pointer.position
    }

    /// The pointer position in `id`'s local frame, or `None` when the
    /// node's transform chain is degenerate.
    pub fn local_pointer(&mut self, id: NodeId) -> Option<Point> {
        let origin = self.origin();
        let p = self.pointer.position;
        self.scene.global_to_local(id, origin, p)
    }

    /// Whether the node under the pointer (or one of its ancestors) asks
    /// for the pointer cursor. Recomputed each tick.
    pub fn pointer_cursor(&self) -> bool {
        self.pointer_cursor
    }

    /// The keyboard focus, if any.
    pub fn focus(&self) -> Option<NodeId> {
        self.focus
    }

    /// Route subsequent key events to `target`. Focus is dropped when a
    /// button-down edge resolves to a different node.
    pub fn set_focus(&mut self, target: Option<NodeId>) {
        self.focus = target;
    }

    // Listener registry, delegated to the dispatcher.

    /// Register a listener for `kind` at `target`. See
    /// [`EventDispatcher::add_listener`].
    pub fn add_listener(
        &mut self,
        target: NodeId,
        kind: EventKind,
        f: impl FnMut(&Event<NodeId>) -> ListenerOutcome + 'static,
    ) -> ListenerId {
        self.dispatcher.add_listener(target, kind, f)
    }

    /// Unregister a listener. See [`EventDispatcher::remove_listener`].
    pub fn remove_listener(&mut self, target: NodeId, kind: EventKind, id: ListenerId) -> bool {
        self.dispatcher.remove_listener(target, kind, id)
    }

    /// Whether any listener is registered for `kind` at `target`.
    pub fn has_listener(&self, target: NodeId, kind: EventKind) -> bool {
        self.dispatcher.has_listener(target, kind)
    }

    /// Dispatch a user event at `target`, bubbling if the event asks to.
    pub fn dispatch(&mut self, target: NodeId, event: &mut Event<NodeId>) {
        let Self {
            scene, dispatcher, ..
        } = self;
        let lookup = |k: NodeId| scene.parent_of(k);
        dispatcher.dispatch_bubbling(target, event, &lookup);
    }

    fn dispatch_at(&mut self, target: NodeId, kind: EventKind, bubbles: bool, payload: EventPayload) {
        let mut event = Event::new(kind, bubbles).with_payload(payload);
        self.dispatch(target, &mut event);
    }

    // Structure, with stage attach/detach notifications.

    /// Create a standalone node in the scene.
    pub fn new_node(&mut self) -> NodeId {
        self.scene.insert()
    }

    /// Append `child` to `parent`, firing added/removed-from-stage events
    /// for every node whose attachment changes (pre-order, exactly once).
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        let transitions = self.scene.add_child(parent, child);
        self.dispatch_transitions(transitions);
    }

    /// Insert `child` into `parent` at `index`, with the same notifications
    /// as [`add_child`](Self::add_child).
    pub fn add_child_at(&mut self, parent: NodeId, child: NodeId, index: usize) {
        let transitions = self.scene.add_child_at(parent, child, index);
        self.dispatch_transitions(transitions);
    }

    /// Detach `child` from `parent`, firing removed-from-stage events.
    /// The node stays alive as a standalone subtree.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        let removed = self.scene.remove_child(parent, child);
        self.dispatch_detached(removed);
    }

    /// Remove a node and its subtree from the scene entirely, firing
    /// removed-from-stage events first. Every listener registered on a
    /// freed node is dropped with it.
    pub fn remove_node(&mut self, id: NodeId) {
        let mut freed = Vec::new();
        self.scene.collect_subtree(id, &mut freed);
        // Events must fire while the nodes are still alive, so detach
        // first and free afterwards.
        if self.scene.parent_of(id).is_some() || self.scene.is_attached(id) {
            let parent = self.scene.parent_of(id);
            let removed = match parent {
                Some(p) => self.scene.remove_child(p, id),
                None => self.scene.set_attached(id, false),
            };
            self.dispatch_detached(removed);
        }
        self.scene.remove(id);
        // Ids are never reused, so stale registry entries would otherwise
        // pile up (and keep receiving frame ticks) forever.
        for node in freed {
            self.dispatcher.remove_all(node);
        }
    }

    fn dispatch_transitions(&mut self, transitions: StageTransitions) {
        self.dispatch_detached(transitions.removed);
        for id in transitions.added {
            self.dispatch_at(id, EventKind::AddedToStage, false, EventPayload::None);
        }
    }

    fn dispatch_detached(&mut self, removed: Vec<NodeId>) {
        for id in removed {
            self.dispatch_at(id, EventKind::RemovedFromStage, false, EventPayload::None);
        }
    }

    // Raw input ingestion, called by the input source between ticks.

    /// Record a pointer position sample in device pixels.
    pub fn pointer_move(&mut self, x: f64, y: f64) {
        self.pointer.position = Point::new(x, y);
        self.pointer.moved = true;
    }

    /// Record a button edge: `pressed` for down, otherwise up. Edges are
    /// latched until the next tick processes them.
    pub fn pointer_button(&mut self, button: PointerButton, pressed: bool) {
        let i = button_index(button);
        if pressed {
            self.pointer.down[i] = true;
        } else {
            self.pointer.up[i] = true;
        }
    }

    /// Record a touch contact sample. `id` is the stable identifier the
    /// input source assigns to this contact.
    pub fn touch_sample(&mut self, id: usize, x: f64, y: f64, phase: TouchPhase) {
        let root = self.root;
        let slot = self.touches.entry(id).or_insert(TouchSlot {
            position: Point::ZERO,
            action: TouchAction::Idle,
            over: root,
            began_on: None,
        });
        slot.position = Point::new(x, y);
        slot.action = match phase {
            TouchPhase::Begin => TouchAction::Began,
            TouchPhase::Move => TouchAction::Moved,
            TouchPhase::End => TouchAction::Ended,
        };
    }

    /// Queue a key edge for delivery to the focused node on the next tick.
    pub fn key_sample(&mut self, pressed: bool, key_code: u32, char_code: u32, modifiers: Modifiers) {
        self.keys.push(KeySample {
            pressed,
            key_code,
            char_code,
            modifiers,
        });
    }

    /// Record a viewport resize in device pixels. The resize event fires
    /// on the next tick.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
        self.focal_length = default_focal_length(width);
        self.resized = true;
    }

    // The tick.

    /// Run one frame: resize handling, frame-tick broadcast, input
    /// resolution and dispatch, then the render traversal into `visitor`.
    pub fn tick(&mut self, visitor: &mut dyn RenderVisitor) {
        if self.resized {
            self.resized = false;
            self.dispatch_at(self.root, EventKind::Resize, false, EventPayload::None);
        }
        self.dispatcher.broadcast_tick();
        self.process_pointer();
        self.process_touches();
        self.process_keys();
        self.update_cursor();
        self.render_node(self.root, visitor);
        debug_assert_eq!(self.mstack.depth(), 0, "unbalanced matrix stack after render");
    }

    /// Resolve the node under a stage-space point, falling back to the
    /// root when nothing is hit.
    fn resolve_at(&mut self, p: Point) -> NodeId {
        let origin = self.origin();
        self.scene
            .resolve_target(self.root, origin, [p.x, p.y, 0.0, 1.0])
            .unwrap_or(self.root)
    }

    fn process_pointer(&mut self) {
        let position = self.pointer.position;
        let target = self.resolve_at(position);
        let payload = EventPayload::Pointer {
            stage_x: position.x,
            stage_y: position.y,
            movement_x: 0.0,
            movement_y: 0.0,
        };

        // Enter/exit transitions; the root stands for "no target" and gets
        // neither.
        let previous = self.pointer.over;
        if target != previous {
            if previous != self.root {
                self.dispatch_at(previous, EventKind::PointerOut, true, payload);
            }
            if target != self.root {
                self.dispatch_at(target, EventKind::PointerOver, true, payload);
            }
            self.pointer.over = target;
        }

        // A down edge anywhere else steals keyboard focus; the node losing
        // it hears about it first.
        if self.pointer.down.iter().any(|&d| d)
            && let Some(focused) = self.focus
            && focused != target
        {
            self.focus = None;
            self.dispatch_at(focused, EventKind::FocusOut, false, EventPayload::None);
        }

        for (i, &button) in BUTTONS.iter().enumerate() {
            if self.pointer.down[i] {
                self.dispatch_at(target, EventKind::PointerDown(button), true, payload);
                self.pointer.latched[i] = Some(target);
            }
            if self.pointer.up[i] {
                self.dispatch_at(target, EventKind::PointerUp(button), true, payload);
                // A click is a down and an up resolving to the same target,
                // regardless of movement in between.
                if self.pointer.latched[i] == Some(target) {
                    self.dispatch_at(target, EventKind::Click(button), true, payload);
                }
                self.pointer.latched[i] = None;
            }
        }

        if self.pointer.moved {
            let movement = position - self.pointer.previous;
            self.dispatch_at(
                target,
                EventKind::PointerMove,
                true,
                EventPayload::Pointer {
                    stage_x: position.x,
                    stage_y: position.y,
                    movement_x: movement.x,
                    movement_y: movement.y,
                },
            );
            self.pointer.previous = position;
            self.pointer.moved = false;
        }

        // Edges are per-tick, not level-triggered.
        self.pointer.down = [false; 3];
        self.pointer.up = [false; 3];
    }

    fn process_touches(&mut self) {
        let ids: Vec<usize> = self.touches.keys().copied().collect();
        for id in ids {
            let Some(&TouchSlot {
                position,
                action,
                over,
                began_on,
            }) = self.touches.get(&id)
            else {
                continue;
            };
            if action == TouchAction::Idle {
                continue;
            }
            let target = self.resolve_at(position);
            let payload = EventPayload::Touch {
                stage_x: position.x,
                stage_y: position.y,
                touch_id: id,
            };

            if target != over {
                if over != self.root {
                    self.dispatch_at(over, EventKind::TouchOut, true, payload);
                }
                if target != self.root {
                    self.dispatch_at(target, EventKind::TouchOver, true, payload);
                }
            }

            match action {
                TouchAction::Began => {
                    self.dispatch_at(target, EventKind::TouchBegin, true, payload);
                }
                TouchAction::Moved => {
                    self.dispatch_at(target, EventKind::TouchMove, true, payload);
                }
                TouchAction::Ended => {
                    self.dispatch_at(target, EventKind::TouchEnd, true, payload);
                    if began_on == Some(target) {
                        self.dispatch_at(target, EventKind::TouchTap, true, payload);
                    }
                }
                TouchAction::Idle => unreachable!("filtered above"),
            }

            if action == TouchAction::Ended {
                self.touches.remove(&id);
            } else if let Some(slot) = self.touches.get_mut(&id) {
                slot.over = target;
                slot.action = TouchAction::Idle;
                if action == TouchAction::Began {
                    slot.began_on = Some(target);
                }
            }
        }
    }

    fn process_keys(&mut self) {
        let samples = core::mem::take(&mut self.keys);
        for sample in samples {
            let target = self.focus.unwrap_or(self.root);
            let kind = if sample.pressed {
                EventKind::KeyDown
            } else {
                EventKind::KeyUp
            };
            self.dispatch_at(
                target,
                kind,
                true,
                EventPayload::Key {
                    key_code: sample.key_code,
                    char_code: sample.char_code,
                    modifiers: sample.modifiers,
                },
            );
        }
    }

    /// Cursor affordance: OR the pointer-cursor flag from the resolved
    /// target up to the root.
    fn update_cursor(&mut self) {
        let mut cursor = false;
        let mut cur = Some(self.pointer.over);
        while let Some(id) = cur {
            if self.scene.flags(id).contains(NodeFlags::POINTER_CURSOR) {
                cursor = true;
                break;
            }
            cur = self.scene.parent_of(id);
        }
        self.pointer_cursor = cursor;
    }

    fn render_node(&mut self, id: NodeId, visitor: &mut dyn RenderVisitor) {
        if !self.scene.visible(id) {
            return;
        }
        let blend = self.scene.blend_mode(id);
        let (local, cmat, cvec, color_identity) = {
            let t = self.scene.transform_mut(id).expect("dangling NodeId");
            (
                t.local_matrix(),
                t.color_matrix(),
                t.color_offset(),
                t.is_color_identity(),
            )
        };
        self.mstack.push(local);
        self.cmstack.push(cmat, cvec, color_identity, blend);

        let state = RenderState {
            matrix: *self.mstack.top(),
            color: *self.cmstack.top(),
            blend: self.cmstack.effective_blend(),
            color_dirty: self.cmstack.is_dirty(),
        };
        visitor.visit(id, &state);
        self.cmstack.clear_dirty();

        let children: Vec<NodeId> = self.scene.children_of(id).to_vec();
        for child in children {
            self.render_node(child, visitor);
        }

        self.mstack.pop();
        self.cmstack.pop();
    }
}

/// The 55°-field-of-view focal length for a given viewport width.
fn default_focal_length(width: f64) -> f64 {
    (width / 2.0) / (DEFAULT_FOV_DEGREES.to_radians() / 2.0).tan()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::RefCell;

    use limelight_geom::Rectangle;

    use crate::node::LocalShape;

    struct NullVisitor;
    impl RenderVisitor for NullVisitor {
        fn visit(&mut self, _node: NodeId, _state: &RenderState) {}
    }

    struct CollectVisitor(Vec<(NodeId, f64, BlendMode)>);
    impl RenderVisitor for CollectVisitor {
        fn visit(&mut self, node: NodeId, state: &RenderState) {
            self.0.push((node, state.matrix.m[12], state.blend));
        }
    }

    fn event_log() -> Rc<RefCell<Vec<(EventKind, Option<NodeId>)>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn log_kind(
        stage: &mut Stage,
        node: NodeId,
        kind: EventKind,
        log: &Rc<RefCell<Vec<(EventKind, Option<NodeId>)>>>,
    ) {
        let log = log.clone();
        stage.add_listener(node, kind, move |e| {
            log.borrow_mut().push((e.kind, e.target));
            ListenerOutcome::Keep
        });
    }

    fn rect_child(stage: &mut Stage, parent: NodeId, x: f64, y: f64, w: f64, h: f64) -> NodeId {
        let id = stage.new_node();
        stage
            .scene_mut()
            .set_shape(id, LocalShape::Rect(Rectangle::new(0.0, 0.0, w, h)));
        stage.scene_mut().set_x(id, x);
        stage.scene_mut().set_y(id, y);
        stage.add_child(parent, id);
        id
    }

    #[test]
    fn added_to_stage_fires_preorder_exactly_once() {
        let mut stage = Stage::new(800.0, 600.0);
        let root = stage.root();

        let c = stage.new_node();
        let gc1 = stage.new_node();
        let gc2 = stage.new_node();
        stage.scene_mut().add_child(c, gc1);
        stage.scene_mut().add_child(c, gc2);

        let log = event_log();
        for node in [c, gc1, gc2] {
            log_kind(&mut stage, node, EventKind::AddedToStage, &log);
            log_kind(&mut stage, node, EventKind::RemovedFromStage, &log);
        }

        stage.add_child(root, c);
        assert_eq!(
            *log.borrow(),
            vec![
                (EventKind::AddedToStage, Some(c)),
                (EventKind::AddedToStage, Some(gc1)),
                (EventKind::AddedToStage, Some(gc2)),
            ]
        );

        log.borrow_mut().clear();
        stage.remove_child(root, c);
        assert_eq!(
            *log.borrow(),
            vec![
                (EventKind::RemovedFromStage, Some(c)),
                (EventKind::RemovedFromStage, Some(gc1)),
                (EventKind::RemovedFromStage, Some(gc2)),
            ]
        );
    }

    #[test]
    fn resize_event_fires_once_on_next_tick() {
        let mut stage = Stage::new(800.0, 600.0);
        let root = stage.root();
        let log = event_log();
        log_kind(&mut stage, root, EventKind::Resize, &log);

        stage.resize(1024.0, 768.0);
        assert_eq!(stage.stage_width(), 1024.0);
        stage.tick(&mut NullVisitor);
        stage.tick(&mut NullVisitor);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn enter_frame_broadcasts_each_tick() {
        let mut stage = Stage::new(800.0, 600.0);
        let node = stage.new_node();
        stage.add_child(stage.root(), node);

        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        stage.add_listener(node, EventKind::EnterFrame, move |_| {
            *c.borrow_mut() += 1;
            ListenerOutcome::Keep
        });

        stage.tick(&mut NullVisitor);
        stage.tick(&mut NullVisitor);
        stage.tick(&mut NullVisitor);
        assert_eq!(*count.borrow(), 3);
    }

    #[test]
    fn over_and_out_fire_once_per_transition() {
        let mut stage = Stage::new(800.0, 600.0);
        let root = stage.root();
        let a = rect_child(&mut stage, root, 0.0, 0.0, 50.0, 50.0);
        let b = rect_child(&mut stage, root, 100.0, 0.0, 50.0, 50.0);

        let log = event_log();
        for node in [a, b] {
            log_kind(&mut stage, node, EventKind::PointerOver, &log);
            log_kind(&mut stage, node, EventKind::PointerOut, &log);
        }

        stage.pointer_move(10.0, 10.0);
        stage.tick(&mut NullVisitor);
        stage.tick(&mut NullVisitor); // no transition, no extra events
        stage.pointer_move(110.0, 10.0);
        stage.tick(&mut NullVisitor);

        assert_eq!(
            *log.borrow(),
            vec![
                (EventKind::PointerOver, Some(a)),
                (EventKind::PointerOut, Some(a)),
                (EventKind::PointerOver, Some(b)),
            ]
        );
    }

    #[test]
    fn over_events_bubble_to_ancestors() {
        let mut stage = Stage::new(800.0, 600.0);
        let root = stage.root();
        let leaf = rect_child(&mut stage, root, 0.0, 0.0, 50.0, 50.0);

        let log = event_log();
        log_kind(&mut stage, root, EventKind::PointerOver, &log);

        stage.pointer_move(5.0, 5.0);
        stage.tick(&mut NullVisitor);

        // Heard at the root, with the target still the leaf.
        assert_eq!(*log.borrow(), vec![(EventKind::PointerOver, Some(leaf))]);
    }

    #[test]
    fn click_requires_same_target_on_down_and_up() {
        let mut stage = Stage::new(800.0, 600.0);
        let root = stage.root();
        let a = rect_child(&mut stage, root, 0.0, 0.0, 50.0, 50.0);
        let b = rect_child(&mut stage, root, 100.0, 0.0, 50.0, 50.0);

        let log = event_log();
        for node in [a, b] {
            log_kind(&mut stage, node, EventKind::Click(PointerButton::Primary), &log);
        }

        // Down and up on the same node: click, even with movement between.
        stage.pointer_move(10.0, 10.0);
        stage.pointer_button(PointerButton::Primary, true);
        stage.tick(&mut NullVisitor);
        stage.pointer_move(20.0, 20.0);
        stage.pointer_button(PointerButton::Primary, false);
        stage.tick(&mut NullVisitor);
        assert_eq!(*log.borrow(), vec![(EventKind::Click(PointerButton::Primary), Some(a))]);

        // Down on a, up on b: no click on either.
        log.borrow_mut().clear();
        stage.pointer_move(10.0, 10.0);
        stage.pointer_button(PointerButton::Primary, true);
        stage.tick(&mut NullVisitor);
        stage.pointer_move(110.0, 10.0);
        stage.pointer_button(PointerButton::Primary, false);
        stage.tick(&mut NullVisitor);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn buttons_latch_independently() {
        let mut stage = Stage::new(800.0, 600.0);
        let root = stage.root();
        let a = rect_child(&mut stage, root, 0.0, 0.0, 50.0, 50.0);

        let log = event_log();
        log_kind(&mut stage, a, EventKind::Click(PointerButton::Primary), &log);
        log_kind(&mut stage, a, EventKind::Click(PointerButton::Secondary), &log);

        stage.pointer_move(10.0, 10.0);
        stage.pointer_button(PointerButton::Primary, true);
        stage.pointer_button(PointerButton::Secondary, true);
        stage.tick(&mut NullVisitor);
        stage.pointer_button(PointerButton::Secondary, false);
        stage.tick(&mut NullVisitor);

        // Only the secondary button completed its edge pair.
        assert_eq!(
            *log.borrow(),
            vec![(EventKind::Click(PointerButton::Secondary), Some(a))]
        );
    }

    #[test]
    fn pointer_move_carries_movement_delta() {
        let mut stage = Stage::new(800.0, 600.0);
        let root = stage.root();

        let samples = Rc::new(RefCell::new(Vec::new()));
        let s = samples.clone();
        stage.add_listener(root, EventKind::PointerMove, move |e| {
            if let EventPayload::Pointer {
                stage_x,
                stage_y,
                movement_x,
                movement_y,
            } = e.payload
            {
                s.borrow_mut().push((stage_x, stage_y, movement_x, movement_y));
            }
            ListenerOutcome::Keep
        });

        stage.pointer_move(10.0, 5.0);
        stage.tick(&mut NullVisitor);
        stage.pointer_move(25.0, 15.0);
        stage.tick(&mut NullVisitor);

        assert_eq!(
            *samples.borrow(),
            vec![(10.0, 5.0, 10.0, 5.0), (25.0, 15.0, 15.0, 10.0)]
        );
    }

    #[test]
    fn pointer_down_carries_stage_position() {
        let mut stage = Stage::new(800.0, 600.0);
        let root = stage.root();
        let a = rect_child(&mut stage, root, 0.0, 0.0, 50.0, 50.0);
        let _ = a;

        let samples = Rc::new(RefCell::new(Vec::new()));
        let s = samples.clone();
        stage.add_listener(
            root,
            EventKind::PointerDown(PointerButton::Primary),
            move |e| {
                if let EventPayload::Pointer { stage_x, stage_y, .. } = e.payload {
                    s.borrow_mut().push((stage_x, stage_y));
                }
                ListenerOutcome::Keep
            },
        );

        stage.pointer_move(12.0, 34.0);
        stage.pointer_button(PointerButton::Primary, true);
        stage.tick(&mut NullVisitor);
        assert_eq!(*samples.borrow(), vec![(12.0, 34.0)]);
    }

    #[test]
    fn touch_tap_requires_matching_begin_and_end_target() {
        let mut stage = Stage::new(800.0, 600.0);
        let root = stage.root();
        let a = rect_child(&mut stage, root, 0.0, 0.0, 50.0, 50.0);
        let b = rect_child(&mut stage, root, 100.0, 0.0, 50.0, 50.0);

        let log = event_log();
        for node in [a, b] {
            log_kind(&mut stage, node, EventKind::TouchBegin, &log);
            log_kind(&mut stage, node, EventKind::TouchEnd, &log);
            log_kind(&mut stage, node, EventKind::TouchTap, &log);
        }

        stage.touch_sample(1, 10.0, 10.0, TouchPhase::Begin);
        stage.tick(&mut NullVisitor);
        stage.touch_sample(1, 12.0, 12.0, TouchPhase::End);
        stage.tick(&mut NullVisitor);
        assert_eq!(
            *log.borrow(),
            vec![
                (EventKind::TouchBegin, Some(a)),
                (EventKind::TouchEnd, Some(a)),
                (EventKind::TouchTap, Some(a)),
            ]
        );

        // Begin on a, end on b: no tap.
        log.borrow_mut().clear();
        stage.touch_sample(2, 10.0, 10.0, TouchPhase::Begin);
        stage.tick(&mut NullVisitor);
        stage.touch_sample(2, 110.0, 10.0, TouchPhase::End);
        stage.tick(&mut NullVisitor);
        assert_eq!(
            *log.borrow(),
            vec![
                (EventKind::TouchBegin, Some(a)),
                (EventKind::TouchEnd, Some(b)),
            ]
        );
    }

    #[test]
    fn keys_route_to_focus_and_focus_drops_on_down_elsewhere() {
        let mut stage = Stage::new(800.0, 600.0);
        let root = stage.root();
        let field = rect_child(&mut stage, root, 0.0, 0.0, 50.0, 50.0);

        let log = event_log();
        log_kind(&mut stage, field, EventKind::KeyDown, &log);
        log_kind(&mut stage, field, EventKind::FocusOut, &log);

        stage.set_focus(Some(field));
        stage.key_sample(true, 65, 97, Modifiers::empty());
        stage.tick(&mut NullVisitor);
        assert_eq!(*log.borrow(), vec![(EventKind::KeyDown, Some(field))]);

        // A down edge outside the focused node clears focus, and the node
        // losing it is told so.
        stage.pointer_move(400.0, 400.0);
        stage.pointer_button(PointerButton::Primary, true);
        stage.tick(&mut NullVisitor);
        assert_eq!(stage.focus(), None);
        assert_eq!(
            log.borrow().last(),
            Some(&(EventKind::FocusOut, Some(field)))
        );

        log.borrow_mut().clear();
        stage.key_sample(true, 66, 98, Modifiers::empty());
        stage.tick(&mut NullVisitor);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn remove_node_drops_listeners_and_tick_subscription() {
        let mut stage = Stage::new(800.0, 600.0);
        let root = stage.root();
        let parent = stage.new_node();
        let child = stage.new_node();
        stage.scene_mut().add_child(parent, child);
        stage.add_child(root, parent);

        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        stage.add_listener(child, EventKind::EnterFrame, move |_| {
            *c.borrow_mut() += 1;
            ListenerOutcome::Keep
        });
        stage.tick(&mut NullVisitor);
        assert_eq!(*count.borrow(), 1);

        // Freeing the subtree takes every registration down with it.
        stage.remove_node(parent);
        assert!(!stage.has_listener(child, EventKind::EnterFrame));
        stage.tick(&mut NullVisitor);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn cursor_affordance_ors_up_the_ancestor_chain() {
        let mut stage = Stage::new(800.0, 600.0);
        let root = stage.root();
        let container = stage.new_node();
        stage.add_child(root, container);
        let leaf = rect_child(&mut stage, container, 0.0, 0.0, 50.0, 50.0);
        let _ = leaf;

        stage.pointer_move(10.0, 10.0);
        stage.tick(&mut NullVisitor);
        assert!(!stage.pointer_cursor());

        let flags = stage.scene().flags(container) | NodeFlags::POINTER_CURSOR;
        stage.scene_mut().set_flags(container, flags);
        stage.tick(&mut NullVisitor);
        assert!(stage.pointer_cursor());
    }

    #[test]
    fn render_traversal_visits_visible_nodes_with_composed_state() {
        let mut stage = Stage::new(800.0, 600.0);
        let root = stage.root();
        let parent = stage.new_node();
        stage.add_child(root, parent);
        stage.scene_mut().set_x(parent, 100.0);
        stage.scene_mut().set_blend_mode(parent, BlendMode::Add);
        let child = rect_child(&mut stage, parent, 10.0, 0.0, 5.0, 5.0);
        let hidden = stage.new_node();
        stage.add_child(root, hidden);
        stage.scene_mut().set_visible(hidden, false);

        let mut visitor = CollectVisitor(Vec::new());
        stage.tick(&mut visitor);

        assert_eq!(
            visitor.0,
            vec![
                (root, 0.0, BlendMode::Normal),
                (parent, 100.0, BlendMode::Add),
                // Composed translation, and the Add blend inherited from
                // the parent level.
                (child, 110.0, BlendMode::Add),
            ]
        );
    }

    #[test]
    fn local_pointer_converts_into_node_frame() {
        let mut stage = Stage::new(800.0, 600.0);
        let root = stage.root();
        let node = rect_child(&mut stage, root, 100.0, 50.0, 10.0, 10.0);

        stage.pointer_move(105.0, 58.0);
        let p = stage.local_pointer(node).expect("non-degenerate chain");
        assert!((p.x - 5.0).abs() < 1e-9, "x: {p:?}");
        assert!((p.y - 8.0).abs() < 1e-9, "y: {p:?}");
    }
}
