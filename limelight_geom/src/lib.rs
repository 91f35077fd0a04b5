//! Limelight Geom: the numeric substrate of the Limelight scene graph.
//!
//! ## Overview
//!
//! This crate provides the two geometric primitives the scene graph is built
//! on:
//!
//! - [`Mat4`] / [`Vec4`]: 4×4 projective matrices and 4-component vectors,
//!   with the composition, inversion, and point-transform operations a
//!   transform chain needs. Scene positions live in a 2D plane embedded in a
//!   projective 3D frame; [`line_plane_intersection`] recovers a 2D point by
//!   intersecting a 3D ray with the local `z = 0` plane, which is how every
//!   screen↔local conversion in the scene graph works.
//! - [`Rectangle`]: an axis-aligned box with the union/containment semantics
//!   hit-testing and bounds aggregation rely on, including in-place
//!   union-with-point and union-with-line growth.
//!
//! All operations are pure and allocation-free; matrices and vectors are
//! small `Copy` values. Degenerate inputs (singular matrices, zero-length
//! rays) yield `None` rather than panicking, and callers treat them as
//! "no intersection".
//!
//! 2D points interoperate with [`kurbo::Point`], and [`Rectangle`] converts
//! to and from [`kurbo::Rect`].
//!
//! This crate is `no_std` and does not allocate.

#![no_std]

mod mat4;
mod rect;

pub use mat4::{Mat4, Vec4, line_plane_intersection, vec4_add};
pub use rect::Rectangle;
