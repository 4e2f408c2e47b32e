//! Rigid-body transform matrix (right/up/at basis plus translation).
//!
//! The basis vectors are stored as columns: transforming a vector yields
//! `right * v.x + up * v.y + at * v.z`. The engine treats `up` as the forward
//! direction and `at` as the vertical one; `forward()`/`vertical()` name them
//! that way.

use std::ops::{AddAssign, Mul, MulAssign};

use crate::math::{cross_product, vector_normalize, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub right: Vec3,
    pub up: Vec3,
    pub at: Vec3,
    pub pos: Vec3,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::unity()
    }
}

impl Matrix {
    pub const fn unity() -> Self {
        Self {
            right: [1.0, 0.0, 0.0],
            up: [0.0, 1.0, 0.0],
            at: [0.0, 0.0, 1.0],
            pos: [0.0, 0.0, 0.0],
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.up
    }

    pub fn vertical(&self) -> Vec3 {
        self.at
    }

    pub fn set_unity(&mut self) {
        *self = Self::unity();
    }

    pub fn reset_orientation(&mut self) {
        let pos = self.pos;
        *self = Self::unity();
        self.pos = pos;
    }

    pub fn set_scale(&mut self, s: f32) {
        self.right = [s, 0.0, 0.0];
        self.up = [0.0, s, 0.0];
        self.at = [0.0, 0.0, s];
        self.pos = [0.0, 0.0, 0.0];
    }

    pub fn set_translate(&mut self, x: f32, y: f32, z: f32) {
        self.set_unity();
        self.pos = [x, y, z];
    }

    pub fn set_rotate_x_only(&mut self, angle: f32) {
        let (s, c) = angle.sin_cos();
        self.right = [1.0, 0.0, 0.0];
        self.up = [0.0, c, s];
        self.at = [0.0, -s, c];
    }

    pub fn set_rotate_y_only(&mut self, angle: f32) {
        let (s, c) = angle.sin_cos();
        self.right = [c, 0.0, -s];
        self.up = [0.0, 1.0, 0.0];
        self.at = [s, 0.0, c];
    }

    pub fn set_rotate_z_only(&mut self, angle: f32) {
        let (s, c) = angle.sin_cos();
        self.right = [c, s, 0.0];
        self.up = [-s, c, 0.0];
        self.at = [0.0, 0.0, 1.0];
    }

    pub fn set_rotate_x(&mut self, angle: f32) {
        self.set_rotate_x_only(angle);
        self.pos = [0.0; 3];
    }

    pub fn set_rotate_y(&mut self, angle: f32) {
        self.set_rotate_y_only(angle);
        self.pos = [0.0; 3];
    }

    pub fn set_rotate_z(&mut self, angle: f32) {
        self.set_rotate_z_only(angle);
        self.pos = [0.0; 3];
    }

    /// Rotation about Z, then X, then Y (the engine's Euler order), no translation.
    pub fn set_rotate(&mut self, x_angle: f32, y_angle: f32, z_angle: f32) {
        let (sx, cx) = x_angle.sin_cos();
        let (sy, cy) = y_angle.sin_cos();
        let (sz, cz) = z_angle.sin_cos();

        self.right = [
            cz * cy - (sz * sx) * sy,
            (cz * sx) * sy + sz * cy,
            -cx * sy,
        ];
        self.up = [-sz * cx, cz * cx, sx];
        self.at = [
            (sz * sx) * cy + cz * sy,
            sz * sy - (cz * sx) * cy,
            cx * cy,
        ];
        self.pos = [0.0; 3];
    }

    /// Rotate every column (translation included) by `rotation`'s basis.
    fn apply_rotation(&mut self, rotation: &Matrix) {
        self.right = rotation.transform_vector(&self.right);
        self.up = rotation.transform_vector(&self.up);
        self.at = rotation.transform_vector(&self.at);
        self.pos = rotation.transform_vector(&self.pos);
    }

    pub fn rotate_x(&mut self, angle: f32) {
        let mut r = Matrix::unity();
        r.set_rotate_x(angle);
        self.apply_rotation(&r);
    }

    pub fn rotate_y(&mut self, angle: f32) {
        let mut r = Matrix::unity();
        r.set_rotate_y(angle);
        self.apply_rotation(&r);
    }

    pub fn rotate_z(&mut self, angle: f32) {
        let mut r = Matrix::unity();
        r.set_rotate_z(angle);
        self.apply_rotation(&r);
    }

    /// Pre-multiply by the `set_rotate(x, y, z)` rotation.
    pub fn rotate(&mut self, x: f32, y: f32, z: f32) {
        let mut r = Matrix::unity();
        r.set_rotate(x, y, z);
        self.apply_rotation(&r);
    }

    /// Rebuild an orthonormal basis from `right` and `forward`.
    pub fn reorthogonalise(&mut self) {
        let mut vertical = cross_product(&self.right, &self.up);
        vector_normalize(&mut vertical);
        let mut right = cross_product(&self.up, &vertical);
        vector_normalize(&mut right);
        self.up = cross_product(&vertical, &right);
        self.right = right;
        self.at = vertical;
    }

    pub fn transform_vector(&self, v: &Vec3) -> Vec3 {
        [
            self.right[0] * v[0] + self.up[0] * v[1] + self.at[0] * v[2],
            self.right[1] * v[0] + self.up[1] * v[1] + self.at[1] * v[2],
            self.right[2] * v[0] + self.up[2] * v[1] + self.at[2] * v[2],
        ]
    }

    pub fn transform_point(&self, p: &Vec3) -> Vec3 {
        let v = self.transform_vector(p);
        [v[0] + self.pos[0], v[1] + self.pos[1], v[2] + self.pos[2]]
    }

    /// Inverse of a rigid-body transform: transposed basis, translation
    /// rotated back and negated. Scaled or sheared matrices are not handled.
    pub fn invert(&self) -> Matrix {
        let right = [self.right[0], self.up[0], self.at[0]];
        let up = [self.right[1], self.up[1], self.at[1]];
        let at = [self.right[2], self.up[2], self.at[2]];
        let p = self.pos;
        let pos = [
            -(right[0] * p[0] + up[0] * p[1] + at[0] * p[2]),
            -(right[1] * p[0] + up[1] * p[1] + at[1] * p[2]),
            -(right[2] * p[0] + up[2] * p[1] + at[2] * p[2]),
        ];
        Matrix { right, up, at, pos }
    }
}

impl Mul for Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Matrix) -> Matrix {
        Matrix {
            right: self.transform_vector(&rhs.right),
            up: self.transform_vector(&rhs.up),
            at: self.transform_vector(&rhs.at),
            pos: self.transform_point(&rhs.pos),
        }
    }
}

impl MulAssign for Matrix {
    fn mul_assign(&mut self, rhs: Matrix) {
        *self = *self * rhs;
    }
}

impl AddAssign for Matrix {
    fn add_assign(&mut self, rhs: Matrix) {
        for i in 0..3 {
            self.right[i] += rhs.right[i];
            self.up[i] += rhs.up[i];
            self.at[i] += rhs.at[i];
            self.pos[i] += rhs.pos[i];
        }
    }
}

/// Matrix packed into two i8 direction vectors (scaled by 127) and a position.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompressedMatrix {
    pub right: [i8; 3],
    pub forward: [i8; 3],
    pub pos: Vec3,
}

impl CompressedMatrix {
    pub fn compress(m: &Matrix) -> Self {
        let pack = |v: &Vec3| [(127.0 * v[0]) as i8, (127.0 * v[1]) as i8, (127.0 * v[2]) as i8];
        Self {
            right: pack(&m.right),
            forward: pack(&m.up),
            pos: m.pos,
        }
    }

    pub fn decompress(&self) -> Matrix {
        let unpack = |v: &[i8; 3]| [v[0] as f32 / 127.0, v[1] as f32 / 127.0, v[2] as f32 / 127.0];
        let right = unpack(&self.right);
        let up = unpack(&self.forward);
        let mut m = Matrix {
            right,
            up,
            at: cross_product(&right, &up),
            pos: self.pos,
        };
        m.reorthogonalise();
        m
    }
}
