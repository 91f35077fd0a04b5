//! The node arena: tree structure, coordinate conversion, bounds, and
//! pointer target resolution.

use alloc::vec::Vec;
use kurbo::Point;
use smallvec::SmallVec;

use limelight_geom::{Mat4, Rectangle, Vec4, line_plane_intersection};

use crate::node::{BlendMode, LocalShape, NodeFlags, NodeId};
use crate::transform::Transform;

/// Stage-attachment transitions produced by a structural edit.
///
/// Each list holds the nodes whose attachment changed, in pre-order
/// (parents before children), exactly once per node. The caller (normally a
/// [`Stage`](crate::Stage)) turns these into added/removed-from-stage
/// events. Reparenting a subtree that stays attached reports it in both
/// lists: it leaves the tree, then rejoins it.
#[derive(Clone, Debug, Default)]
pub struct StageTransitions {
    /// Nodes that left the attached tree, pre-order.
    pub removed: Vec<NodeId>,
    /// Nodes that joined the attached tree, pre-order.
    pub added: Vec<NodeId>,
}

impl StageTransitions {
    /// True when no attachment changed.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

pub(crate) struct Node {
    generation: u32,
    parent: Option<NodeId>,
    children: SmallVec<[NodeId; 4]>,
    attached: bool,
    pub(crate) visible: bool,
    pub(crate) flags: NodeFlags,
    pub(crate) blend_mode: BlendMode,
    pub(crate) shape: LocalShape,
    pub(crate) transform: Transform,
}

impl Node {
    fn new(generation: u32) -> Self {
        Self {
            generation,
            parent: None,
            children: SmallVec::new(),
            attached: false,
            visible: true,
            flags: NodeFlags::default(),
            blend_mode: BlendMode::Normal,
            shape: LocalShape::None,
            transform: Transform::new(),
        }
    }
}

/// The scene graph: generational slots of nodes plus every tree-relative
/// query (absolute matrices, coordinate conversion, bounds, hit-testing,
/// pointer target resolution).
///
/// Structural edits return [`StageTransitions`] so the owner can fire
/// attach/detach notifications; the scene itself dispatches nothing.
///
/// Most geometry queries take `&mut self` because a node's pose carries a
/// lazily reconciled value/matrix cache. Absolute matrices are recomputed
/// from the parent chain on every query (O(depth)); callers issuing many
/// queries against one node in a single tick should hold on to the result.
pub struct Scene {
    nodes: Vec<Option<Node>>,
    /// Last generation per slot (persists across frees).
    generations: Vec<u32>,
    free_list: Vec<usize>,
}

impl core::fmt::Debug for Scene {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        f.debug_struct("Scene")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &self.free_list.len())
            .finish()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// An empty scene.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Create a standalone node: no parent, detached, visible, default
    /// flags, identity transform, no shape.
    pub fn insert(&mut self) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node::new(generation)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        NodeId::new(idx, generation)
    }

    /// Whether `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.idx())
            .and_then(|slot| slot.as_ref())
            .is_some_and(|n| n.generation == id.1)
    }

    /// Whether the node is part of the attached (stage-rooted) tree.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some_and(|n| n.attached)
    }

    /// The node's parent, or `None` for roots and stale ids.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id).and_then(|n| n.parent)
    }

    /// The node's children in render order (index 0 is furthest back).
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.node_opt(id).map_or(&[], |n| &n.children)
    }

    /// The child's position in its parent's list.
    pub fn child_index(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.node_opt(parent)?.children.iter().position(|&c| c == child)
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.idx()].as_ref().expect("dangling NodeId")
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.idx()].as_mut().expect("dangling NodeId")
    }

    fn node_opt(&self, id: NodeId) -> Option<&Node> {
        self.nodes
            .get(id.idx())
            .and_then(|slot| slot.as_ref())
            .filter(|n| n.generation == id.1)
    }

    fn node_opt_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes
            .get_mut(id.idx())
            .and_then(|slot| slot.as_mut())
            .filter(|n| n.generation == id.1)
    }

    // Structure.

    /// Mark a root node (and its subtree) attached or detached, returning
    /// the pre-order transition list. This is the stage-root hook; ordinary
    /// attachment flows through [`add_child`](Self::add_child).
    pub fn set_attached(&mut self, id: NodeId, attached: bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        if self.is_alive(id) {
            self.mark_attached(id, attached, &mut out);
        }
        out
    }

    /// Flip attachment across a subtree, pre-order, exactly once per node.
    /// A child whose state already matches is skipped along with its
    /// subtree (attachment is always uniform below such a node).
    fn mark_attached(&mut self, id: NodeId, attached: bool, out: &mut Vec<NodeId>) {
        let node = self.node_mut(id);
        if node.attached == attached {
            return;
        }
        node.attached = attached;
        out.push(id);
        let children = node.children.clone();
        for child in children {
            self.mark_attached(child, attached, out);
        }
    }

    /// Append `child` to `parent`'s child list (front-most position).
    ///
    /// A child already in another parent is moved: it is detached first,
    /// so a reparent across the attached tree reports both a removal and an
    /// addition.
    ///
    /// ## Panics
    ///
    /// Panics when the edit would create a cycle (adding a node to its own
    /// subtree, or to itself).
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> StageTransitions {
        let index = self.children_of(parent).len();
        self.add_child_at(parent, child, index)
    }

    /// Insert `child` into `parent`'s child list at `index` (clamped to the
    /// list length). Same semantics as [`add_child`](Self::add_child).
    pub fn add_child_at(&mut self, parent: NodeId, child: NodeId, index: usize) -> StageTransitions {
        let mut transitions = StageTransitions::default();
        if !self.is_alive(parent) || !self.is_alive(child) {
            return transitions;
        }
        assert!(
            !self.is_in_subtree(child, parent),
            "node cannot be added to its own subtree"
        );

        // Re-adding under the current parent is a reorder, not a
        // re-attachment: nothing leaves or joins the attached tree.
        if self.node(child).parent == Some(parent) {
            self.set_child_index(parent, child, index);
            return transitions;
        }

        if self.node(child).parent.is_some() {
            self.unlink(child, &mut transitions.removed);
        }

        let parent_attached = self.node(parent).attached;
        {
            let p = self.node_mut(parent);
            let index = index.min(p.children.len());
            p.children.insert(index, child);
        }
        self.node_mut(child).parent = Some(parent);
        if parent_attached {
            self.mark_attached(child, true, &mut transitions.added);
        } else {
            // An attached root moved under a detached parent leaves the
            // stage tree; attachment always mirrors reachability.
            self.mark_attached(child, false, &mut transitions.removed);
        }
        transitions
    }

    /// Remove `child` from `parent`, leaving it alive as a standalone node.
    /// Returns the pre-order detach transitions; a no-op (empty list) when
    /// `child` is not a child of `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Vec<NodeId> {
        let mut removed = Vec::new();
        if self.is_alive(child) && self.parent_of(child) == Some(parent) {
            self.unlink(child, &mut removed);
        }
        removed
    }

    /// Remove a node and its whole subtree from the scene. Ids into the
    /// subtree go stale. Returns the pre-order detach transitions.
    pub fn remove(&mut self, id: NodeId) -> Vec<NodeId> {
        let mut removed = Vec::new();
        if !self.is_alive(id) {
            return removed;
        }
        self.unlink(id, &mut removed);
        self.free_subtree(id);
        removed
    }

    /// Detach `id` from its parent (if any) and mark its subtree detached.
    fn unlink(&mut self, id: NodeId, removed: &mut Vec<NodeId>) {
        if let Some(parent) = self.node(id).parent {
            let p = self.node_mut(parent);
            p.children.retain(|c| *c != id);
            self.node_mut(id).parent = None;
        }
        self.mark_attached(id, false, removed);
    }

    /// Collect `id` and every descendant, pre-order. Used by owners that
    /// need the full id set before a subtree is freed.
    pub(crate) fn collect_subtree(&self, id: NodeId, out: &mut Vec<NodeId>) {
        if !self.is_alive(id) {
            return;
        }
        out.push(id);
        for &child in self.children_of(id) {
            self.collect_subtree(child, out);
        }
    }

    fn free_subtree(&mut self, id: NodeId) {
        let children = self.node(id).children.clone();
        for child in children {
            self.free_subtree(child);
        }
        self.nodes[id.idx()] = None;
        self.free_list.push(id.idx());
    }

    /// Move `child` to `index` within `parent`'s list by shifting the
    /// intervening run one slot, preserving the identity and relative order
    /// of every other child. `index` is clamped; a no-op when `child` is not
    /// a child of `parent`.
    pub fn set_child_index(&mut self, parent: NodeId, child: NodeId, index: usize) {
        let Some(old) = self.child_index(parent, child) else {
            return;
        };
        let p = self.node_mut(parent);
        let new = index.min(p.children.len() - 1);
        if new > old {
            p.children[old..=new].rotate_left(1);
        } else if new < old {
            p.children[new..=old].rotate_right(1);
        }
    }

    /// Whether `id` lies in the subtree rooted at `root` (inclusive).
    fn is_in_subtree(&self, root: NodeId, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(n) = cur {
            if n == root {
                return true;
            }
            cur = self.node(n).parent;
        }
        false
    }

    // Per-node attributes.

    /// Whether the node renders and participates in hit-testing.
    pub fn visible(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some_and(|n| n.visible)
    }

    /// Set visibility.
    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        if let Some(n) = self.node_opt_mut(id) {
            n.visible = visible;
        }
    }

    /// Pointer-interaction flags.
    pub fn flags(&self, id: NodeId) -> NodeFlags {
        self.node_opt(id).map_or(NodeFlags::empty(), |n| n.flags)
    }

    /// Set pointer-interaction flags.
    pub fn set_flags(&mut self, id: NodeId, flags: NodeFlags) {
        if let Some(n) = self.node_opt_mut(id) {
            n.flags = flags;
        }
    }

    /// Blend mode.
    pub fn blend_mode(&self, id: NodeId) -> BlendMode {
        self.node_opt(id).map_or(BlendMode::Normal, |n| n.blend_mode)
    }

    /// Set the blend mode.
    pub fn set_blend_mode(&mut self, id: NodeId, blend: BlendMode) {
        if let Some(n) = self.node_opt_mut(id) {
            n.blend_mode = blend;
        }
    }

    /// The node's local shape.
    pub fn shape(&self, id: NodeId) -> LocalShape {
        self.node_opt(id).map_or(LocalShape::None, |n| n.shape)
    }

    /// Set the local shape.
    pub fn set_shape(&mut self, id: NodeId, shape: LocalShape) {
        if let Some(n) = self.node_opt_mut(id) {
            n.shape = shape;
        }
    }

    /// Shared access to the node's transform (color accessors and other
    /// cache-free reads).
    pub fn transform(&self, id: NodeId) -> Option<&Transform> {
        self.node_opt(id).map(|n| &n.transform)
    }

    /// Mutable access to the node's transform.
    pub fn transform_mut(&mut self, id: NodeId) -> Option<&mut Transform> {
        self.node_opt_mut(id).map(|n| &mut n.transform)
    }

    /// Translation x.
    pub fn x(&self, id: NodeId) -> f64 {
        self.transform(id).map_or(0.0, Transform::x)
    }
    /// Translation y.
    pub fn y(&self, id: NodeId) -> f64 {
        self.transform(id).map_or(0.0, Transform::y)
    }
    /// Translation z.
    pub fn z(&self, id: NodeId) -> f64 {
        self.transform(id).map_or(0.0, Transform::z)
    }
    /// Set translation x.
    pub fn set_x(&mut self, id: NodeId, x: f64) {
        if let Some(t) = self.transform_mut(id) {
            t.set_x(x);
        }
    }
    /// Set translation y.
    pub fn set_y(&mut self, id: NodeId, y: f64) {
        if let Some(t) = self.transform_mut(id) {
            t.set_y(y);
        }
    }
    /// Set translation z.
    pub fn set_z(&mut self, id: NodeId, z: f64) {
        if let Some(t) = self.transform_mut(id) {
            t.set_z(z);
        }
    }

    // Geometry.

    /// The node's transform relative to the root frame, composed down the
    /// parent chain. `None` for stale ids.
    pub fn absolute_matrix(&mut self, id: NodeId) -> Option<Mat4> {
        if !self.is_alive(id) {
            return None;
        }
        let mut m = self.node_mut(id).transform.local_matrix();
        let mut cur = id;
        while let Some(parent) = self.node(cur).parent {
            m = self.node_mut(parent).transform.local_matrix() * m;
            cur = parent;
        }
        Some(m)
    }

    /// Inverse of the absolute transform, composed from per-node local
    /// inverses. `None` for stale ids or a singular matrix anywhere on the
    /// chain.
    pub fn absolute_inverse(&mut self, id: NodeId) -> Option<Mat4> {
        if !self.is_alive(id) {
            return None;
        }
        let mut m = self.node_mut(id).transform.local_inverse()?;
        let mut cur = id;
        while let Some(parent) = self.node(cur).parent {
            m = m * self.node_mut(parent).transform.local_inverse()?;
            cur = parent;
        }
        Some(m)
    }

    /// Convert a root-frame point into the node's local frame.
    ///
    /// `origin` is the viewing eye point in root coordinates (see
    /// [`Stage::origin`](crate::Stage::origin)); the conversion casts a ray
    /// from it through the point and intersects the node's local `z = 0`
    /// plane. `None` when the chain is singular or the ray degenerates.
    pub fn global_to_local(&mut self, id: NodeId, origin: Vec4, p: Point) -> Option<Point> {
        let ai = self.absolute_inverse(id)?;
        let org = ai.transform_vec4(origin);
        let p1 = ai.transform_vec4([p.x, p.y, 0.0, 1.0]);
        line_plane_intersection(org, p1)
    }

    /// Convert a point in the node's local frame into the root frame.
    pub fn local_to_global(&mut self, id: NodeId, origin: Vec4, p: Point) -> Option<Point> {
        let at = self.absolute_matrix(id)?;
        let p1 = at.transform_vec4([p.x, p.y, 0.0, 1.0]);
        line_plane_intersection(origin, p1)
    }

    /// Axis-aligned bounds of the node's subtree in `target`'s frame
    /// (`None` target means the root frame).
    ///
    /// Each shaped node contributes the AABB of its four local-rect corners
    /// projected through the transform chain and back onto the target
    /// plane; invisible children are excluded entirely. A node whose
    /// projection degenerates contributes nothing. Returns `None` only for
    /// stale ids or a singular target chain; an empty result is the all-zero
    /// rectangle.
    pub fn bounds_in(
        &mut self,
        id: NodeId,
        target: Option<NodeId>,
        origin: Vec4,
    ) -> Option<Rectangle> {
        if !self.is_alive(id) {
            return None;
        }
        let (tmat, torg) = match target {
            Some(t) => {
                let ai = self.absolute_inverse(t)?;
                (ai, ai.transform_vec4(origin))
            }
            None => (Mat4::IDENTITY, origin),
        };
        let mut acc = Rectangle::ZERO;
        self.accumulate_bounds(id, tmat, torg, &mut acc);
        Some(acc)
    }

    fn accumulate_bounds(&mut self, id: NodeId, tmat: Mat4, torg: Vec4, acc: &mut Rectangle) {
        if let Some(rect) = self.node(id).shape.bounding_rect()
            && let Some(abs) = self.absolute_matrix(id)
            && let Some(projected) = project_rect(tmat * abs, torg, rect)
        {
            acc.union_with(&projected);
        }
        let children = self.node(id).children.clone();
        for child in children {
            if self.node(child).visible {
                self.accumulate_bounds(child, tmat, torg, acc);
            }
        }
    }

    /// Bounds of the node's subtree in its parent's frame (or the root
    /// frame for a parentless node).
    pub fn bounds_in_parent(&mut self, id: NodeId, origin: Vec4) -> Option<Rectangle> {
        let parent = self.parent_of(id);
        self.bounds_in(id, parent, origin)
    }

    /// Horizontal extent of the subtree in the parent frame.
    pub fn width(&mut self, id: NodeId, origin: Vec4) -> Option<f64> {
        self.bounds_in_parent(id, origin).map(|r| r.width)
    }

    /// Vertical extent of the subtree in the parent frame.
    pub fn height(&mut self, id: NodeId, origin: Vec4) -> Option<f64> {
        self.bounds_in_parent(id, origin).map(|r| r.height)
    }

    /// Scale the node so its subtree spans `width` in the parent frame.
    /// A no-op when the current extent is zero.
    pub fn set_width(&mut self, id: NodeId, origin: Vec4, width: f64) {
        if let Some(current) = self.width(id, origin)
            && current != 0.0
            && let Some(t) = self.transform_mut(id)
        {
            t.post_scale(width / current, 1.0);
        }
    }

    /// Scale the node so its subtree spans `height` in the parent frame.
    /// A no-op when the current extent is zero.
    pub fn set_height(&mut self, id: NodeId, origin: Vec4, height: f64) {
        if let Some(current) = self.height(id, origin)
            && current != 0.0
            && let Some(t) = self.transform_mut(id)
        {
            t.post_scale(1.0, height / current);
        }
    }

    /// Test whether the node intersects a root-frame point.
    ///
    /// When `exact` is false the test is against the subtree's root-frame
    /// AABB; when true the point is carried into local space by ray/plane
    /// intersection and tested against the node's own shape (shapeless
    /// nodes never match exactly).
    pub fn hit_test_point(&mut self, id: NodeId, origin: Vec4, x: f64, y: f64, exact: bool) -> bool {
        if exact {
            let Some(rect) = self.node_opt(id).and_then(|n| n.shape.bounding_rect()) else {
                return false;
            };
            let Some(ai) = self.absolute_inverse(id) else {
                return false;
            };
            let org = ai.transform_vec4(origin);
            let p1 = ai.transform_vec4([x, y, 0.0, 1.0]);
            line_plane_intersection(org, p1).is_some_and(|p| rect.contains(p.x, p.y))
        } else {
            self.bounds_in(id, None, origin)
                .is_some_and(|r| r.contains(x, y))
        }
    }

    /// Test whether two nodes' root-frame AABBs intersect.
    pub fn hit_test_object(&mut self, a: NodeId, b: NodeId, origin: Vec4) -> bool {
        let Some(ra) = self.bounds_in(a, None, origin) else {
            return false;
        };
        let Some(rb) = self.bounds_in(b, None, origin) else {
            return false;
        };
        ra.intersects(&rb)
    }

    /// Resolve the front-most interactive node under a pointer ray.
    ///
    /// `org` and `pp` are the eye point and the pointed-at plane point in
    /// the frame of `id`'s parent (for a root, the root frame). The ray is
    /// carried into each node's local frame by its local inverse as the
    /// recursion descends. Children are visited back-to-front so the
    /// front-most match wins; a node with pointer-children disabled but
    /// itself pointer-enabled claims any hit inside its subtree.
    ///
    /// Invisible nodes (with their whole subtree), nodes with both pointer
    /// flags clear, and nodes behind a singular transform resolve to `None`.
    pub fn resolve_target(&mut self, id: NodeId, org: Vec4, pp: Vec4) -> Option<NodeId> {
        let node = self.node_opt(id)?;
        if !node.visible {
            return None;
        }
        let enabled = node.flags.contains(NodeFlags::POINTER_ENABLED);
        let children_enabled = node.flags.contains(NodeFlags::POINTER_CHILDREN);
        if !enabled && !children_enabled {
            return None;
        }

        let inv = self.node_mut(id).transform.local_inverse()?;
        let org_l = inv.transform_vec4(org);
        let pp_l = inv.transform_vec4(pp);

        // Children first: they render above the node's own content.
        let children = self.node(id).children.clone();
        for child in children.iter().rev() {
            if let Some(hit) = self.resolve_target(*child, org_l, pp_l) {
                // With pointer-children disabled the subtree still blocks
                // the ray, but the container takes the hit.
                return Some(if children_enabled { hit } else { id });
            }
        }

        if enabled
            && let Some(rect) = self.node(id).shape.bounding_rect()
            && let Some(p) = line_plane_intersection(org_l, pp_l)
            && rect.contains(p.x, p.y)
        {
            return Some(id);
        }
        None
    }
}

/// Project the four corners of `rect` through `mat`, pull each back onto
/// the target plane along the ray from `torg`, and take the AABB.
///
/// `None` when any corner's ray degenerates; callers drop the rectangle
/// from bounds/hit results in that case.
fn project_rect(mat: Mat4, torg: Vec4, rect: Rectangle) -> Option<Rectangle> {
    let corners = [
        (rect.x, rect.y),
        (rect.x + rect.width, rect.y),
        (rect.x, rect.y + rect.height),
        (rect.x + rect.width, rect.y + rect.height),
    ];
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for (cx, cy) in corners {
        let tp = mat.transform_vec4([cx, cy, 0.0, 1.0]);
        let p = line_plane_intersection(torg, tp)?;
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(Rectangle::new(min_x, min_y, max_x - min_x, max_y - min_y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    /// Eye point for an 800×600 view, far enough back that identity-chain
    /// conversions are numerically benign.
    const ORIGIN: Vec4 = [400.0, 300.0, -1000.0, 1.0];

    fn plane_point(x: f64, y: f64) -> Vec4 {
        [x, y, 0.0, 1.0]
    }

    fn assert_rect_close(actual: &Rectangle, expected: &Rectangle) {
        for (a, e) in [
            (actual.x, expected.x),
            (actual.y, expected.y),
            (actual.width, expected.width),
            (actual.height, expected.height),
        ] {
            assert!((a - e).abs() < 1e-9, "{actual:?} vs {expected:?}");
        }
    }

    fn rect_node(scene: &mut Scene, x: f64, y: f64, w: f64, h: f64) -> NodeId {
        let id = scene.insert();
        scene.set_shape(id, LocalShape::Rect(Rectangle::new(0.0, 0.0, w, h)));
        scene.set_x(id, x);
        scene.set_y(id, y);
        id
    }

    #[test]
    fn insert_link_and_order() {
        let mut scene = Scene::new();
        let root = scene.insert();
        let a = scene.insert();
        let b = scene.insert();
        scene.add_child(root, a);
        scene.add_child(root, b);

        assert_eq!(scene.children_of(root), &[a, b]);
        assert_eq!(scene.parent_of(a), Some(root));
        assert_eq!(scene.child_index(root, b), Some(1));
    }

    #[test]
    fn removed_ids_go_stale_and_slots_recycle() {
        let mut scene = Scene::new();
        let a = scene.insert();
        assert!(scene.is_alive(a));
        scene.remove(a);
        assert!(!scene.is_alive(a));

        let b = scene.insert();
        // Slot reused under a fresh generation; the old id stays dead.
        assert!(scene.is_alive(b));
        assert!(!scene.is_alive(a));
        assert_ne!(a, b);
    }

    #[test]
    fn remove_frees_whole_subtree() {
        let mut scene = Scene::new();
        let root = scene.insert();
        let child = scene.insert();
        let grandchild = scene.insert();
        scene.add_child(root, child);
        scene.add_child(child, grandchild);

        scene.remove(child);
        assert!(!scene.is_alive(child));
        assert!(!scene.is_alive(grandchild));
        assert_eq!(scene.children_of(root), &[] as &[NodeId]);
    }

    #[test]
    fn attach_transitions_are_preorder_and_exactly_once() {
        let mut scene = Scene::new();
        let root = scene.insert();
        scene.set_attached(root, true);

        let c = scene.insert();
        let gc1 = scene.insert();
        let gc2 = scene.insert();
        scene.add_child(c, gc1);
        scene.add_child(c, gc2);

        let t = scene.add_child(root, c);
        assert_eq!(t.added, vec![c, gc1, gc2]);
        assert!(t.removed.is_empty());

        // Attaching again under the same tree reports nothing new.
        let t = scene.add_child(root, c);
        assert!(t.added.is_empty());

        let removed = scene.remove_child(root, c);
        assert_eq!(removed, vec![c, gc1, gc2]);
        assert!(!scene.is_attached(gc1));
        // Nodes survive detachment.
        assert!(scene.is_alive(gc1));
    }

    #[test]
    fn readd_under_same_parent_reorders_without_transitions() {
        let mut scene = Scene::new();
        let root = scene.insert();
        scene.set_attached(root, true);
        let a = scene.insert();
        let b = scene.insert();
        scene.add_child(root, a);
        scene.add_child(root, b);

        // Re-adding moves the child to the front of the list but nothing
        // leaves or joins the attached tree.
        let t = scene.add_child(root, a);
        assert!(t.is_empty());
        assert_eq!(scene.children_of(root), &[b, a]);
        assert!(scene.is_attached(a));
    }

    #[test]
    fn attached_child_under_detached_parent_detaches() {
        let mut scene = Scene::new();
        let detached = scene.insert();
        let a = scene.insert();
        let leaf = scene.insert();
        scene.add_child(a, leaf);
        scene.set_attached(a, true);

        let t = scene.add_child(detached, a);
        assert_eq!(t.removed, vec![a, leaf]);
        assert!(t.added.is_empty());
        assert!(!scene.is_attached(a));
        assert!(!scene.is_attached(leaf));
    }

    #[test]
    fn reparent_within_attached_tree_reports_both_transitions() {
        let mut scene = Scene::new();
        let root = scene.insert();
        scene.set_attached(root, true);
        let a = scene.insert();
        let b = scene.insert();
        scene.add_child(root, a);
        scene.add_child(root, b);
        let child = scene.insert();
        scene.add_child(a, child);

        let t = scene.add_child(b, child);
        assert_eq!(t.removed, vec![child]);
        assert_eq!(t.added, vec![child]);
    }

    #[test]
    #[should_panic(expected = "own subtree")]
    fn adding_ancestor_as_child_panics() {
        let mut scene = Scene::new();
        let a = scene.insert();
        let b = scene.insert();
        scene.add_child(a, b);
        scene.add_child(b, a);
    }

    #[test]
    fn set_child_index_shifts_intervening_run() {
        let mut scene = Scene::new();
        let root = scene.insert();
        let ids: Vec<NodeId> = (0..5).map(|_| scene.insert()).collect();
        for &id in &ids {
            scene.add_child(root, id);
        }

        // Move index 3 to the back (index 0): 0..=3 rotates right.
        scene.set_child_index(root, ids[3], 0);
        assert_eq!(scene.children_of(root), &[ids[3], ids[0], ids[1], ids[2], ids[4]]);

        // Move it to the front: everything shifts back one.
        scene.set_child_index(root, ids[3], 4);
        assert_eq!(scene.children_of(root), &[ids[0], ids[1], ids[2], ids[4], ids[3]]);
    }

    #[test]
    fn absolute_matrix_composes_parent_chain() {
        let mut scene = Scene::new();
        let root = scene.insert();
        let child = scene.insert();
        scene.add_child(root, child);
        scene.set_x(root, 100.0);
        scene.set_x(child, 10.0);

        let abs = scene.absolute_matrix(child).expect("live node");
        assert_eq!(abs.m[12], 110.0);

        // Self-consistency: absolute == parent_absolute * local.
        let pa = scene.absolute_matrix(root).expect("live node");
        let local = scene.transform_mut(child).expect("live node").local_matrix();
        assert_eq!(abs, pa * local);

        // The composed inverse matches the inverted absolute.
        let ai = scene.absolute_inverse(child).expect("invertible");
        let inv = abs.invert().expect("invertible");
        for i in 0..16 {
            assert!((ai.m[i] - inv.m[i]).abs() < 1e-12, "element {i}");
        }
    }

    #[test]
    fn global_local_roundtrip() {
        let mut scene = Scene::new();
        let root = scene.insert();
        let child = scene.insert();
        scene.add_child(root, child);
        scene.set_x(child, 50.0);
        scene.set_y(child, 20.0);
        scene
            .transform_mut(child)
            .expect("live node")
            .set_rotation(30.0);

        let p = Point::new(123.0, 45.0);
        let local = scene.global_to_local(child, ORIGIN, p).expect("non-degenerate");
        let back = scene.local_to_global(child, ORIGIN, local).expect("non-degenerate");
        assert!((back.x - p.x).abs() < 1e-9, "x: {back:?}");
        assert!((back.y - p.y).abs() < 1e-9, "y: {back:?}");
    }

    #[test]
    fn bounds_follow_rotation() {
        let mut scene = Scene::new();
        let node = rect_node(&mut scene, 0.0, 0.0, 10.0, 10.0);
        scene
            .transform_mut(node)
            .expect("live node")
            .set_rotation(90.0);

        let r = scene.bounds_in(node, None, ORIGIN).expect("live node");
        // +90° takes local +x onto +y: the rect swings to negative x.
        assert!((r.x - -10.0).abs() < 1e-9, "x: {r:?}");
        assert!(r.y.abs() < 1e-9, "y: {r:?}");
        assert!((r.width - 10.0).abs() < 1e-9, "w: {r:?}");
        assert!((r.height - 10.0).abs() < 1e-9, "h: {r:?}");
    }

    #[test]
    fn bounds_union_children_and_skip_invisible() {
        let mut scene = Scene::new();
        let root = scene.insert();
        let a = rect_node(&mut scene, 0.0, 0.0, 10.0, 10.0);
        let b = rect_node(&mut scene, 30.0, 0.0, 10.0, 10.0);
        scene.add_child(root, a);
        scene.add_child(root, b);

        let r = scene.bounds_in(root, None, ORIGIN).expect("live node");
        assert_rect_close(&r, &Rectangle::new(0.0, 0.0, 40.0, 10.0));

        scene.set_visible(b, false);
        let r = scene.bounds_in(root, None, ORIGIN).expect("live node");
        assert_rect_close(&r, &Rectangle::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn out_of_plane_bounds_depend_on_eye_distance() {
        let mut scene = Scene::new();
        let node = rect_node(&mut scene, 100.0, 100.0, 10.0, 10.0);
        scene
            .transform_mut(node)
            .expect("live node")
            .set_rotation_y(60.0);

        // A rect tilted out of the z = 0 plane projects differently as the
        // eye moves: the focal length is part of the answer.
        let near: Vec4 = [400.0, 300.0, -500.0, 1.0];
        let far: Vec4 = [400.0, 300.0, -5000.0, 1.0];
        let r_near = scene.bounds_in(node, None, near).expect("live node");
        let r_far = scene.bounds_in(node, None, far).expect("live node");
        assert!(
            (r_near.width - r_far.width).abs() > 1e-3,
            "near {r_near:?} vs far {r_far:?}"
        );
        // Foreshortening: both projections are narrower than the flat rect.
        assert!(r_near.width < 10.0, "near: {r_near:?}");
        assert!(r_far.width < 10.0, "far: {r_far:?}");

        // A flat rect is eye-independent: its plane is the target plane.
        scene
            .transform_mut(node)
            .expect("live node")
            .set_rotation_y(0.0);
        let f_near = scene.bounds_in(node, None, near).expect("live node");
        let f_far = scene.bounds_in(node, None, far).expect("live node");
        assert_rect_close(&f_near, &f_far);
    }

    #[test]
    fn width_setter_scales_to_requested_extent() {
        let mut scene = Scene::new();
        let node = rect_node(&mut scene, 5.0, 0.0, 10.0, 10.0);
        assert_eq!(scene.width(node, ORIGIN), Some(10.0));

        scene.set_width(node, ORIGIN, 25.0);
        let w = scene.width(node, ORIGIN).expect("live node");
        assert!((w - 25.0).abs() < 1e-9, "width: {w}");
        // Position is preserved: post-scale leaves the stored translation.
        assert_eq!(scene.x(node), 5.0);
    }

    #[test]
    fn hit_test_point_exact_vs_aabb() {
        let mut scene = Scene::new();
        let node = rect_node(&mut scene, 0.0, 0.0, 10.0, 10.0);
        scene
            .transform_mut(node)
            .expect("live node")
            .set_rotation(45.0);

        // (-6.9, 0.1) lies inside the rotated square's AABB but outside the
        // square itself.
        assert!(scene.hit_test_point(node, ORIGIN, -6.9, 0.1, false));
        assert!(!scene.hit_test_point(node, ORIGIN, -6.9, 0.1, true));
        // A point actually inside matches both ways.
        assert!(scene.hit_test_point(node, ORIGIN, 0.0, 5.0, true));
    }

    #[test]
    fn hit_test_object_compares_root_frame_aabbs() {
        let mut scene = Scene::new();
        let a = rect_node(&mut scene, 0.0, 0.0, 10.0, 10.0);
        let b = rect_node(&mut scene, 9.0, 9.0, 10.0, 10.0);
        let c = rect_node(&mut scene, 50.0, 50.0, 10.0, 10.0);
        assert!(scene.hit_test_object(a, b, ORIGIN));
        assert!(!scene.hit_test_object(a, c, ORIGIN));
    }

    #[test]
    fn resolve_target_prefers_front_most_child() {
        let mut scene = Scene::new();
        let root = scene.insert();
        let back = rect_node(&mut scene, 0.0, 0.0, 20.0, 20.0);
        let front = rect_node(&mut scene, 10.0, 10.0, 20.0, 20.0);
        scene.add_child(root, back);
        scene.add_child(root, front);

        // Inside the overlap, the higher-index child wins.
        let hit = scene.resolve_target(root, ORIGIN, plane_point(15.0, 15.0));
        assert_eq!(hit, Some(front));

        // Swap depth order and the other child wins.
        scene.set_child_index(root, front, 0);
        let hit = scene.resolve_target(root, ORIGIN, plane_point(15.0, 15.0));
        assert_eq!(hit, Some(back));
    }

    #[test]
    fn resolve_target_skips_invisible_and_disabled() {
        let mut scene = Scene::new();
        let root = scene.insert();
        let child = rect_node(&mut scene, 0.0, 0.0, 20.0, 20.0);
        scene.add_child(root, child);

        scene.set_visible(child, false);
        assert_eq!(scene.resolve_target(root, ORIGIN, plane_point(5.0, 5.0)), None);

        scene.set_visible(child, true);
        scene.set_flags(child, NodeFlags::POINTER_CHILDREN);
        // Pointer-disabled leaf with no interactive children: no target.
        assert_eq!(scene.resolve_target(root, ORIGIN, plane_point(5.0, 5.0)), None);
    }

    #[test]
    fn container_claims_hit_when_children_disabled() {
        let mut scene = Scene::new();
        let root = scene.insert();
        let container = scene.insert();
        let leaf = rect_node(&mut scene, 0.0, 0.0, 20.0, 20.0);
        scene.add_child(root, container);
        scene.add_child(container, leaf);

        scene.set_flags(container, NodeFlags::POINTER_ENABLED);
        let hit = scene.resolve_target(root, ORIGIN, plane_point(5.0, 5.0));
        assert_eq!(hit, Some(container));

        // With neither flag the subtree short-circuits to no target.
        scene.set_flags(container, NodeFlags::empty());
        assert_eq!(scene.resolve_target(root, ORIGIN, plane_point(5.0, 5.0)), None);
    }

    #[test]
    fn resolved_target_honors_transformed_children() {
        let mut scene = Scene::new();
        let root = scene.insert();
        let child = rect_node(&mut scene, 100.0, 100.0, 10.0, 10.0);
        scene.add_child(root, child);

        assert_eq!(
            scene.resolve_target(root, ORIGIN, plane_point(105.0, 105.0)),
            Some(child)
        );
        assert_eq!(scene.resolve_target(root, ORIGIN, plane_point(5.0, 5.0)), None);
    }
}
