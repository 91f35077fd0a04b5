//! 4×4 projective matrices and 4-component vectors.
//!
//! Matrices are stored as a flat `[f64; 16]` in the element order used by
//! GPU APIs: the first three groups of four hold the transformed basis
//! vectors, and the translation lives in elements 12..15. A point
//! `(x, y, z, w)` is transformed as:
//!
//! ```text
//! x' = m0*x + m4*y + m8*z  + m12*w
//! y' = m1*x + m5*y + m9*z  + m13*w
//! z' = m2*x + m6*y + m10*z + m14*w
//! w' = m3*x + m7*y + m11*z + m15*w
//! ```
//!
//! Composition follows the mathematical convention: `a * b` applies `b`
//! first, then `a`. An absolute transform is therefore
//! `parent_absolute * local`.

use kurbo::Point;
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _; // for `sqrt`

/// A 4-component vector: `[x, y, z, w]`.
///
/// Points on a node's local plane are written `[x, y, 0.0, 1.0]` before
/// being pushed through a transform chain.
pub type Vec4 = [f64; 4];

/// Component-wise sum of two 4-vectors.
#[inline]
#[must_use]
pub fn vec4_add(a: Vec4, b: Vec4) -> Vec4 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2], a[3] + b[3]]
}

/// A 4×4 projective transform matrix.
///
/// `Mat4` is a small `Copy` value; operations return fresh matrices rather
/// than writing through out-parameters, so no allocation is involved in the
/// hot path.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Mat4 {
    /// Flat matrix elements; see the module docs for the layout.
    pub m: [f64; 16],
}

impl Mat4 {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        m: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    /// Construct from flat elements (see module docs for the layout).
    #[inline]
    pub const fn from_elements(m: [f64; 16]) -> Self {
        Self { m }
    }

    /// A matrix scaling by `(sx, sy, sz)`.
    #[inline]
    pub const fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        let mut m = Self::IDENTITY.m;
        m[0] = sx;
        m[5] = sy;
        m[10] = sz;
        Self { m }
    }

    /// A matrix translating by `(x, y, z)`.
    #[inline]
    pub const fn translation(x: f64, y: f64, z: f64) -> Self {
        let mut m = Self::IDENTITY.m;
        m[12] = x;
        m[13] = y;
        m[14] = z;
        Self { m }
    }

    /// Transform a 4-vector, including the homogeneous `w` component.
    #[must_use]
    pub fn transform_vec4(&self, v: Vec4) -> Vec4 {
        let m = &self.m;
        let [v0, v1, v2, v3] = v;
        [
            m[0] * v0 + m[4] * v1 + m[8] * v2 + m[12] * v3,
            m[1] * v0 + m[5] * v1 + m[9] * v2 + m[13] * v3,
            m[2] * v0 + m[6] * v1 + m[10] * v2 + m[14] * v3,
            m[3] * v0 + m[7] * v1 + m[11] * v2 + m[15] * v3,
        ]
    }

    /// Transform a point on the `z = 0` plane, ignoring the projected `z`/`w`.
    ///
    /// This is the cheap 2D-affine path; use [`Mat4::transform_vec4`] plus
    /// [`line_plane_intersection`] when the chain may carry perspective.
    #[must_use]
    pub fn transform_point2(&self, p: Point) -> Point {
        let m = &self.m;
        Point::new(
            p.x * m[0] + p.y * m[4] + m[12],
            p.x * m[1] + p.y * m[5] + m[13],
        )
    }

    /// Invert the matrix via the cofactor expansion.
    ///
    /// Returns `None` when the determinant is exactly zero. Callers in
    /// hit-testing and bounds code treat a singular transform as "nothing
    /// under this matrix is reachable" rather than an error.
    #[must_use]
    pub fn invert(&self) -> Option<Self> {
        let a = &self.m;
        let (a00, a01, a02, a03) = (a[0], a[1], a[2], a[3]);
        let (a10, a11, a12, a13) = (a[4], a[5], a[6], a[7]);
        let (a20, a21, a22, a23) = (a[8], a[9], a[10], a[11]);
        let (a30, a31, a32, a33) = (a[12], a[13], a[14], a[15]);

        let b00 = a00 * a11 - a01 * a10;
        let b01 = a00 * a12 - a02 * a10;
        let b02 = a00 * a13 - a03 * a10;
        let b03 = a01 * a12 - a02 * a11;
        let b04 = a01 * a13 - a03 * a11;
        let b05 = a02 * a13 - a03 * a12;
        let b06 = a20 * a31 - a21 * a30;
        let b07 = a20 * a32 - a22 * a30;
        let b08 = a20 * a33 - a23 * a30;
        let b09 = a21 * a32 - a22 * a31;
        let b10 = a21 * a33 - a23 * a31;
        let b11 = a22 * a33 - a23 * a32;

        let det = b00 * b11 - b01 * b10 + b02 * b09 + b03 * b08 - b04 * b07 + b05 * b06;
        if det == 0.0 {
            return None;
        }
        let det = 1.0 / det;

        Some(Self {
            m: [
                (a11 * b11 - a12 * b10 + a13 * b09) * det,
                (a02 * b10 - a01 * b11 - a03 * b09) * det,
                (a31 * b05 - a32 * b04 + a33 * b03) * det,
                (a22 * b04 - a21 * b05 - a23 * b03) * det,
                (a12 * b08 - a10 * b11 - a13 * b07) * det,
                (a00 * b11 - a02 * b08 + a03 * b07) * det,
                (a32 * b02 - a30 * b05 - a33 * b01) * det,
                (a20 * b05 - a22 * b02 + a23 * b01) * det,
                (a10 * b10 - a11 * b08 + a13 * b06) * det,
                (a01 * b08 - a00 * b10 - a03 * b06) * det,
                (a30 * b04 - a31 * b02 + a33 * b00) * det,
                (a21 * b02 - a20 * b04 - a23 * b00) * det,
                (a11 * b07 - a10 * b09 - a12 * b06) * det,
                (a00 * b09 - a01 * b07 + a02 * b06) * det,
                (a31 * b01 - a30 * b03 - a32 * b00) * det,
                (a20 * b03 - a21 * b01 + a22 * b00) * det,
            ],
        })
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl core::ops::Mul for Mat4 {
    type Output = Self;

    /// Compose two transforms: `a * b` applies `b` first, then `a`.
    fn mul(self, rhs: Self) -> Self {
        let a = &self.m;
        let b = &rhs.m;
        let mut out = [0.0; 16];
        for col in 0..4 {
            let (b0, b1, b2, b3) = (b[4 * col], b[4 * col + 1], b[4 * col + 2], b[4 * col + 3]);
            out[4 * col] = b0 * a[0] + b1 * a[4] + b2 * a[8] + b3 * a[12];
            out[4 * col + 1] = b0 * a[1] + b1 * a[5] + b2 * a[9] + b3 * a[13];
            out[4 * col + 2] = b0 * a[2] + b1 * a[6] + b2 * a[10] + b3 * a[14];
            out[4 * col + 3] = b0 * a[3] + b1 * a[7] + b2 * a[11] + b3 * a[15];
        }
        Self { m: out }
    }
}

impl core::ops::MulAssign for Mat4 {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

/// Intersect the line through `p0` and `p1` with the plane `z = 0`.
///
/// Both endpoints are expected to already be in the target coordinate frame
/// (typically produced by pushing a screen-space ray through an inverse
/// absolute transform). Returns the 2D intersection point, or `None` when
/// the line is degenerate: zero length, or parallel to the plane (the ray
/// direction has no `z` component while the origin sits off the plane).
#[must_use]
pub fn line_plane_intersection(p0: Vec4, p1: Vec4) -> Option<Point> {
    let dx = p1[0] - p0[0];
    let dy = p1[1] - p0[1];
    let dz = p1[2] - p0[2];

    let len = (dx * dx + dy * dy + dz * dz).sqrt();
    if len == 0.0 {
        return None;
    }
    let (dx, dy, dz) = (dx / len, dy / len, dz / len);
    if dz == 0.0 {
        // Parallel to the plane: either every point intersects or none does.
        // Both cases carry no usable 2D answer.
        return None;
    }

    let d = -p0[2] / dz;
    Some(Point::new(p0[0] + d * dx, p0[1] + d * dy))
}
