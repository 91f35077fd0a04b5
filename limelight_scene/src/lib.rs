//! Limelight Scene: a retained-mode scene graph with hierarchical
//! transforms, event dispatch, and per-frame input resolution.
//!
//! ## Overview
//!
//! Nodes live in a [`Scene`] arena and are addressed by generational
//! [`NodeId`]s. Each node carries a [`Transform`] (affine pose plus color
//! transform), a [`LocalShape`] for hit-testing and bounds, visibility, a
//! [`BlendMode`], and pointer-interaction [`NodeFlags`]. The scene answers
//! every tree-relative question: absolute matrices, screen↔local
//! conversion by ray/plane intersection, subtree bounds, hit-testing, and
//! front-most pointer target resolution.
//!
//! A [`Stage`] wraps one scene with the run loop around it: raw
//! pointer/touch/keyboard samples go in between frames, and one
//! [`tick`](Stage::tick) per display refresh turns them into bubbling
//! events (down/up/click latching, over/out transitions, tap detection,
//! focus routing), broadcasts the frame tick, and walks the visible tree
//! into a [`RenderVisitor`] with composed [`MatrixStack`] /
//! [`ColorMatrixStack`] state at every node.
//!
//! Rendering itself is left to the visitor; this crate computes what to
//! draw where, under which transform, color, and blend, and never touches
//! a GPU.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod node;
mod scene;
mod stacks;
mod stage;
mod transform;

pub use node::{BlendMode, LocalShape, NodeFlags, NodeId};
pub use scene::{Scene, StageTransitions};
pub use stacks::{ColorMatrixStack, ColorState, MatrixStack};
pub use stage::{RenderState, RenderVisitor, Stage, TouchPhase};
pub use transform::{CacheState, Transform};
