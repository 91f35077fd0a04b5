//! Public node types: identifiers, flags, blend modes, local shapes.

use limelight_geom::Rectangle;

/// Identifier for a node in a [`Scene`](crate::Scene) (generational).
///
/// Ids stay stable while the node is alive and go stale when it is removed;
/// stale ids are rejected by liveness checks rather than aliasing a reused
/// slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Per-node pointer-interaction flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// The node itself can be resolved as a pointer target.
        const POINTER_ENABLED  = 0b0000_0001;
        /// The node's children participate in pointer target resolution.
        /// When clear (and the node is pointer-enabled), the node claims any
        /// hit inside its subtree, acting as an opaque input surface.
        const POINTER_CHILDREN = 0b0000_0010;
        /// Hovering the node (or any descendant) shows the pointer cursor.
        const POINTER_CURSOR   = 0b0000_0100;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self::POINTER_ENABLED | Self::POINTER_CHILDREN
    }
}

/// How a node's pixels combine with what is already drawn beneath it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum BlendMode {
    /// Source-over compositing.
    #[default]
    Normal,
    /// Additive.
    Add,
    /// Subtractive.
    Subtract,
    /// Multiplicative.
    Multiply,
    /// Screen.
    Screen,
    /// Erase destination alpha.
    Erase,
    /// Replace destination alpha.
    Alpha,
}

/// A node's hit-testable geometry in its own plane.
///
/// Nodes without a shape are boundless: they contribute nothing to bounds
/// queries and are invisible to exact hit-testing, though their children
/// still participate.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum LocalShape {
    /// No geometry of its own.
    #[default]
    None,
    /// An axis-aligned rectangle in the node's local `z = 0` plane.
    Rect(Rectangle),
}

impl LocalShape {
    /// The local bounding rectangle, or `None` for a shapeless node.
    pub fn bounding_rect(&self) -> Option<Rectangle> {
        match self {
            Self::None => None,
            Self::Rect(r) => Some(*r),
        }
    }
}
