//! Render-state accumulators consumed during the render traversal.
//!
//! Both stacks are fixed-capacity, sized to the maximum expected tree
//! depth. Exceeding capacity is a traversal bug, not a recoverable
//! condition, so overflow panics rather than silently corrupting state.

use alloc::vec::Vec;

use limelight_geom::{Mat4, Vec4, vec4_add};

use crate::node::BlendMode;

/// Cumulative matrix stack: each push composes the new local matrix into
/// the current top and stores the result, so the top is always the full
/// root-to-here transform.
#[derive(Clone, Debug)]
pub struct MatrixStack {
    stack: Vec<Mat4>,
    capacity: usize,
}

impl MatrixStack {
    /// A stack holding at most `capacity` pushed frames above the identity
    /// base.
    pub fn new(capacity: usize) -> Self {
        let mut stack = Vec::with_capacity(capacity + 1);
        stack.push(Mat4::IDENTITY);
        Self { stack, capacity }
    }

    /// Compose `m` onto the current top and push the result.
    ///
    /// ## Panics
    ///
    /// Panics on overflow; the stack is sized to the maximum expected
    /// nesting depth and running past it indicates a traversal bug.
    pub fn push(&mut self, m: Mat4) {
        assert!(
            self.stack.len() <= self.capacity,
            "matrix stack overflow: traversal deeper than capacity {}",
            self.capacity
        );
        let top = *self.top();
        self.stack.push(top * m);
    }

    /// Drop the top frame.
    ///
    /// ## Panics
    ///
    /// Panics when only the identity base remains (unbalanced pop).
    pub fn pop(&mut self) {
        assert!(self.stack.len() > 1, "matrix stack underflow: unbalanced pop");
        self.stack.pop();
    }

    /// The composed transform for the node currently being visited.
    pub fn top(&self) -> &Mat4 {
        self.stack.last().expect("stack retains its identity base")
    }

    /// Number of pushed frames (the identity base is not counted).
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }
}

/// Composed color state for one level of the render traversal.
#[derive(Copy, Clone, Debug)]
pub struct ColorState {
    /// Accumulated 4×4 color matrix.
    pub matrix: Mat4,
    /// Accumulated additive RGBA offset.
    pub offset: Vec4,
    /// Whether the accumulated transform is still the identity.
    pub identity: bool,
    /// The blend mode pushed at this level (not inherited).
    pub blend: BlendMode,
    /// Stack index of the nearest level (self included) that pushed a
    /// non-[`BlendMode::Normal`] blend; 0 when none did.
    pub last_blend: usize,
}

/// Color-transform counterpart of [`MatrixStack`], with a cheap path for
/// the common identity case.
///
/// Pushing an identity color transform copies the parent's accumulated
/// state verbatim; a non-identity push composes matrix and offset and sets
/// the dirty flag so the rasterizer knows its uploaded color state is
/// stale. The rasterizer clears the flag with
/// [`clear_dirty`](Self::clear_dirty) after re-uploading.
#[derive(Clone, Debug)]
pub struct ColorMatrixStack {
    stack: Vec<ColorState>,
    capacity: usize,
    dirty: bool,
}

impl ColorMatrixStack {
    /// A stack holding at most `capacity` pushed frames above the identity
    /// base.
    pub fn new(capacity: usize) -> Self {
        let mut stack = Vec::with_capacity(capacity + 1);
        stack.push(ColorState {
            matrix: Mat4::IDENTITY,
            offset: [0.0; 4],
            identity: true,
            blend: BlendMode::Normal,
            last_blend: 0,
        });
        Self {
            stack,
            capacity,
            dirty: false,
        }
    }

    /// Push one node's color transform and blend mode.
    ///
    /// ## Panics
    ///
    /// Panics on overflow, like [`MatrixStack::push`].
    pub fn push(&mut self, matrix: Mat4, offset: Vec4, identity: bool, blend: BlendMode) {
        assert!(
            self.stack.len() <= self.capacity,
            "color stack overflow: traversal deeper than capacity {}",
            self.capacity
        );
        let parent = *self.top();
        let depth = self.stack.len();
        let last_blend = if blend == BlendMode::Normal {
            parent.last_blend
        } else {
            depth
        };

        let state = if identity {
            // Identity fast path: the accumulated color state is unchanged.
            ColorState {
                blend,
                last_blend,
                ..parent
            }
        } else {
            self.dirty = true;
            ColorState {
                matrix: parent.matrix * matrix,
                offset: vec4_add(parent.matrix.transform_vec4(offset), parent.offset),
                identity: false,
                blend,
                last_blend,
            }
        };
        self.stack.push(state);
    }

    /// Drop the top frame. Popping a frame that changed the accumulated
    /// state marks the stack dirty again, since the rasterizer's uploaded
    /// state no longer matches the new top.
    ///
    /// ## Panics
    ///
    /// Panics when only the identity base remains (unbalanced pop).
    pub fn pop(&mut self) {
        assert!(self.stack.len() > 1, "color stack underflow: unbalanced pop");
        let popped = self.stack.pop().expect("guarded by the assert above");
        let top = self.top();
        if !popped.identity || popped.last_blend != top.last_blend {
            self.dirty = true;
        }
    }

    /// The composed color state for the node currently being visited.
    pub fn top(&self) -> &ColorState {
        self.stack.last().expect("stack retains its identity base")
    }

    /// The blend mode in effect at the top: the blend pushed by the nearest
    /// level that used a non-default mode, or [`BlendMode::Normal`].
    pub fn effective_blend(&self) -> BlendMode {
        self.stack[self.top().last_blend].blend
    }

    /// Whether the accumulated state changed since the last
    /// [`clear_dirty`](Self::clear_dirty).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Acknowledge the current state as uploaded.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Number of pushed frames (the identity base is not counted).
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }
}
