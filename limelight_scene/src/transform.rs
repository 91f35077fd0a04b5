//! Per-node pose and color transform with lazy value/matrix reconciliation.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use limelight_geom::{Mat4, Vec4};

/// Degrees → radians, negated to match the screen-space rotation direction
/// (y grows downward, so positive rotation is clockwise on screen).
const DEG_TO_RAD_NEG: f64 = -0.017_453_292_52;
/// Radians → degrees, negated (inverse of [`DEG_TO_RAD_NEG`]).
const RAD_TO_DEG_NEG: f64 = -57.295_779_513_08;

/// Which half of the pose representation is stale.
///
/// The pose is held twice: as decomposed scale/rotation values and as a 4×4
/// matrix. Mutating one side marks the other stale; the stale side is
/// rebuilt lazily on first read. By construction at most one side is ever
/// stale.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CacheState {
    /// Both representations agree.
    Clean,
    /// Decomposed values changed; the matrix must be rebuilt before use.
    MatrixDirty,
    /// The matrix was set directly; decomposed values must be rebuilt.
    ValuesDirty,
}

/// A node's local pose (translation, scale, rotation) plus its color
/// transform.
///
/// Translation is held apart from the matrix: the `x`/`y`/`z` fields are
/// written into elements 12..15 whenever [`local_matrix`](Self::local_matrix)
/// is read. Scale and rotation live in both decomposed and matrix form,
/// reconciled through [`CacheState`].
///
/// Rotations are Euler angles in degrees, composed in X-Y-Z order.
/// Decomposition divides scale out first and is lossy under non-uniform or
/// near-zero scale; matrix → values → matrix round-trips exactly, the
/// reverse only for non-degenerate, non-gimbal-locked poses.
///
/// The color transform is a 4×4 matrix over RGBA plus an additive offset,
/// with a cached "is identity" flag so the render stack can take a cheap
/// copy-parent path. The flag uses exact equality: an almost-identity float
/// color transform counts as non-identity.
#[derive(Clone, Debug)]
pub struct Transform {
    x: f64,
    y: f64,
    z: f64,

    tmat: Mat4,
    cache: CacheState,

    scale_x: f64,
    scale_y: f64,
    scale_z: f64,
    rotation_x: f64,
    rotation_y: f64,
    rotation_z: f64,

    cmat: Mat4,
    cvec: Vec4,
    color_identity: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform {
    /// The identity pose with an identity color transform.
    pub fn new() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            tmat: Mat4::IDENTITY,
            cache: CacheState::Clean,
            scale_x: 1.0,
            scale_y: 1.0,
            scale_z: 1.0,
            rotation_x: 0.0,
            rotation_y: 0.0,
            rotation_z: 0.0,
            cmat: Mat4::IDENTITY,
            cvec: [0.0; 4],
            color_identity: true,
        }
    }

    /// Current cache state, for diagnostics.
    pub fn cache_state(&self) -> CacheState {
        self.cache
    }

    // Translation is mirrored straight into the matrix on read, so these
    // never touch the cache state.

    /// Translation x.
    pub fn x(&self) -> f64 {
        self.x
    }
    /// Translation y.
    pub fn y(&self) -> f64 {
        self.y
    }
    /// Translation z (depth; participates in perspective, not draw order).
    pub fn z(&self) -> f64 {
        self.z
    }
    /// Set translation x.
    pub fn set_x(&mut self, x: f64) {
        self.x = x;
    }
    /// Set translation y.
    pub fn set_y(&mut self, y: f64) {
        self.y = y;
    }
    /// Set translation z.
    pub fn set_z(&mut self, z: f64) {
        self.z = z;
    }

    fn check_matrix(&mut self) {
        if self.cache == CacheState::MatrixDirty {
            self.vals_to_mat();
            self.cache = CacheState::Clean;
        }
    }

    fn check_values(&mut self) {
        if self.cache == CacheState::ValuesDirty {
            self.mat_to_vals();
            self.cache = CacheState::Clean;
        }
    }

    /// Scale along local x.
    pub fn scale_x(&mut self) -> f64 {
        self.check_values();
        self.scale_x
    }
    /// Scale along local y.
    pub fn scale_y(&mut self) -> f64 {
        self.check_values();
        self.scale_y
    }
    /// Scale along local z.
    pub fn scale_z(&mut self) -> f64 {
        self.check_values();
        self.scale_z
    }
    /// Rotation about local x, in degrees.
    pub fn rotation_x(&mut self) -> f64 {
        self.check_values();
        self.rotation_x
    }
    /// Rotation about local y, in degrees.
    pub fn rotation_y(&mut self) -> f64 {
        self.check_values();
        self.rotation_y
    }
    /// Rotation about local z, in degrees.
    pub fn rotation_z(&mut self) -> f64 {
        self.check_values();
        self.rotation_z
    }
    /// Alias for [`rotation_z`](Self::rotation_z), the in-plane rotation.
    pub fn rotation(&mut self) -> f64 {
        self.rotation_z()
    }

    /// Set scale along local x.
    pub fn set_scale_x(&mut self, sx: f64) {
        self.check_values();
        self.scale_x = sx;
        self.cache = CacheState::MatrixDirty;
    }
    /// Set scale along local y.
    pub fn set_scale_y(&mut self, sy: f64) {
        self.check_values();
        self.scale_y = sy;
        self.cache = CacheState::MatrixDirty;
    }
    /// Set scale along local z.
    pub fn set_scale_z(&mut self, sz: f64) {
        self.check_values();
        self.scale_z = sz;
        self.cache = CacheState::MatrixDirty;
    }
    /// Set rotation about local x, in degrees.
    pub fn set_rotation_x(&mut self, deg: f64) {
        self.check_values();
        self.rotation_x = deg;
        self.cache = CacheState::MatrixDirty;
    }
    /// Set rotation about local y, in degrees.
    pub fn set_rotation_y(&mut self, deg: f64) {
        self.check_values();
        self.rotation_y = deg;
        self.cache = CacheState::MatrixDirty;
    }
    /// Set rotation about local z, in degrees.
    pub fn set_rotation_z(&mut self, deg: f64) {
        self.check_values();
        self.rotation_z = deg;
        self.cache = CacheState::MatrixDirty;
    }
    /// Alias for [`set_rotation_z`](Self::set_rotation_z).
    pub fn set_rotation(&mut self, deg: f64) {
        self.set_rotation_z(deg);
    }

    /// The local matrix: scale/rotation with the current translation written
    /// into elements 12..15.
    pub fn local_matrix(&mut self) -> Mat4 {
        self.check_matrix();
        self.tmat.m[12] = self.x;
        self.tmat.m[13] = self.y;
        self.tmat.m[14] = self.z;
        self.tmat
    }

    /// Inverse of the local matrix, or `None` when it is singular.
    pub fn local_inverse(&mut self) -> Option<Mat4> {
        self.local_matrix().invert()
    }

    /// Replace the full local matrix. Translation is copied out into the
    /// `x`/`y`/`z` fields; decomposed values are rebuilt on next read.
    pub fn set_matrix3d(&mut self, m: Mat4) {
        self.check_matrix();
        self.tmat = m;
        self.x = m.m[12];
        self.y = m.m[13];
        self.z = m.m[14];
        self.cache = CacheState::ValuesDirty;
    }

    /// The full local matrix, same as [`local_matrix`](Self::local_matrix).
    pub fn matrix3d(&mut self) -> Mat4 {
        self.local_matrix()
    }

    /// Replace the 2D-affine part from a row-major 3×3 matrix
    /// `[a, b, _, c, d, _, tx, ty, _]`; the depth-related elements are left
    /// untouched.
    pub fn set_matrix(&mut self, m3: [f64; 9]) {
        self.check_matrix();
        self.tmat.m[0] = m3[0];
        self.tmat.m[1] = m3[1];
        self.tmat.m[4] = m3[3];
        self.tmat.m[5] = m3[4];
        self.x = m3[6];
        self.y = m3[7];
        self.cache = CacheState::ValuesDirty;
    }

    /// The 2D-affine part as a row-major 3×3 matrix.
    pub fn matrix(&mut self) -> [f64; 9] {
        self.check_matrix();
        let m = &self.tmat.m;
        [
            m[0], m[1], 0.0, //
            m[4], m[5], 0.0, //
            self.x, self.y, 1.0,
        ]
    }

    /// Left-multiply a 2D scale into the current matrix without touching the
    /// decomposed values or the stored translation.
    ///
    /// This is how "set width/height" is expressed: scale whatever pose is
    /// already there, around the node's own position.
    pub fn post_scale(&mut self, sx: f64, sy: f64) {
        self.check_matrix();
        self.tmat = Mat4::scale(sx, sy, 1.0) * self.tmat;
        self.cache = CacheState::ValuesDirty;
    }

    /// Build the matrix from decomposed values: rotateX ∘ rotateY ∘ rotateZ
    /// composed into scale. Translation elements are not touched here.
    fn vals_to_mat(&mut self) {
        let m = &mut self.tmat.m;

        let sx = self.scale_x;
        let sy = self.scale_y;
        let sz = self.scale_z;

        let a = self.rotation_x * DEG_TO_RAD_NEG;
        let b = self.rotation_y * DEG_TO_RAD_NEG;
        let g = self.rotation_z * DEG_TO_RAD_NEG;

        let (ca, cb, cg) = (a.cos(), b.cos(), g.cos());
        let (sa, sb, sg) = (a.sin(), b.sin(), g.sin());

        m[0] = cb * cg * sx;
        m[1] = -cb * sg * sx;
        m[2] = sb * sx;
        m[4] = (ca * sg + sa * sb * cg) * sy;
        m[5] = (ca * cg - sa * sb * sg) * sy;
        m[6] = -sa * cb * sy;
        m[8] = (sa * sg - ca * sb * cg) * sz;
        m[9] = (sa * cg + ca * sb * sg) * sz;
        m[10] = ca * cb * sz;
    }

    /// Decompose the matrix back into scale and Euler angles, dividing scale
    /// out of the basis vectors first.
    fn mat_to_vals(&mut self) {
        let (a00, a01, a02) = (self.tmat.m[0], self.tmat.m[1], self.tmat.m[2]);
        let (a10, a11, a12) = (self.tmat.m[4], self.tmat.m[5], self.tmat.m[6]);
        let (a20, a21, a22) = (self.tmat.m[8], self.tmat.m[9], self.tmat.m[10]);

        self.scale_x = (a00 * a00 + a01 * a01 + a02 * a02).sqrt();
        self.scale_y = (a10 * a10 + a11 * a11 + a12 * a12).sqrt();
        self.scale_z = (a20 * a20 + a21 * a21 + a22 * a22).sqrt();

        let a00 = a00 / self.scale_x;
        let a01 = a01 / self.scale_x;
        let a02 = a02 / self.scale_x;
        let a12 = a12 / self.scale_y;
        let a22 = a22 / self.scale_z;

        self.rotation_x = RAD_TO_DEG_NEG * (-a12).atan2(a22);
        self.rotation_y = RAD_TO_DEG_NEG * a02.atan2((a12 * a12 + a22 * a22).sqrt());
        self.rotation_z = RAD_TO_DEG_NEG * (-a01).atan2(a00);
    }

    // Color transform.

    /// The 4×4 color matrix (RGBA in, RGBA out).
    pub fn color_matrix(&self) -> Mat4 {
        self.cmat
    }

    /// The additive RGBA color offset.
    pub fn color_offset(&self) -> Vec4 {
        self.cvec
    }

    /// Whether the color transform is exactly the identity.
    pub fn is_color_identity(&self) -> bool {
        self.color_identity
    }

    /// Replace the color transform and refresh the identity cache.
    pub fn set_color_transform(&mut self, matrix: Mat4, offset: Vec4) {
        self.cmat = matrix;
        self.cvec = offset;
        self.check_color_identity();
    }

    /// Alpha multiplier, backed by the color matrix's alpha-row diagonal.
    pub fn alpha(&self) -> f64 {
        self.cmat.m[15]
    }

    /// Set the alpha multiplier.
    pub fn set_alpha(&mut self, alpha: f64) {
        self.cmat.m[15] = alpha;
        self.check_color_identity();
    }

    /// The color transform as a row-major 5×5-style buffer: four rows of
    /// five (matrix row then that row's offset), with element 24 fixed at 1.
    pub fn color_transform_5x5(&self) -> [f64; 25] {
        let mut m5 = [0.0; 25];
        m5[24] = 1.0;
        for i in 0..4 {
            m5[20 + i] = self.cvec[i];
            for j in 0..4 {
                m5[5 * i + j] = self.cmat.m[4 * i + j];
            }
        }
        m5
    }

    /// Replace the color transform from the 5×5-style buffer layout.
    pub fn set_color_transform_5x5(&mut self, m5: &[f64; 25]) {
        for i in 0..4 {
            self.cvec[i] = m5[20 + i];
            for j in 0..4 {
                self.cmat.m[4 * i + j] = m5[5 * i + j];
            }
        }
        self.check_color_identity();
    }

    /// Exact-equality identity test; almost-identity floats count as
    /// non-identity.
    fn check_color_identity(&mut self) {
        self.color_identity = self.cmat == Mat4::IDENTITY && self.cvec == [0.0; 4];
    }
}
