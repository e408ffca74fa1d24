//! Culling Geometry
//!
//! Minimal bounding-volume math used by light culling:
//!
//! - [`Frustum`]: six normalized planes extracted from a view-projection matrix
//! - [`Aabb`]: center / half-extent box with affine transform support
//!
//! Plane extraction follows the Gribb-Hartmann method for a `[0, 1]` clip-space
//! depth range (the convention of `glam::Mat4::perspective_rh`).

use glam::{Mat4, Vec3, Vec4};

/// View frustum as six inward-facing planes.
///
/// Plane order: Left, Right, Bottom, Top, Near, Far. Each plane is stored as
/// `(n.x, n.y, n.z, d)` with `|n| = 1`, so `dot(n, p) + d` is a signed distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extracts the frustum planes from a view-projection matrix.
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        let mut planes = [
            rows[3] + rows[0], // Left
            rows[3] - rows[0], // Right
            rows[3] + rows[1], // Bottom
            rows[3] - rows[1], // Top
            rows[2],           // Near ([0, 1] depth)
            rows[3] - rows[2], // Far
        ];

        for plane in &mut planes {
            let length = plane.truncate().length();
            if length > f32::EPSILON {
                *plane /= length;
            }
        }

        Self { planes }
    }

    /// The six planes in `Left, Right, Bottom, Top, Near, Far` order.
    #[inline]
    #[must_use]
    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }

    /// Sphere-vs-frustum test. Conservative: spheres straddling a plane count
    /// as inside.
    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(center) + plane.w >= -radius)
    }

    /// AABB-vs-frustum test using the positive-vertex distance per plane.
    #[must_use]
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            let normal = plane.truncate();
            let extent = normal.abs().dot(aabb.half_extents);
            normal.dot(aabb.center) + plane.w + extent >= 0.0
        })
    }
}

/// Axis-aligned bounding box stored as center and half extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl Aabb {
    #[inline]
    #[must_use]
    pub const fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    /// Local-space box of a ranged directional light: unit cube around the
    /// light node's origin.
    pub const RANGED_DIRECTIONAL_LIGHT: Self = Self::new(Vec3::ZERO, Vec3::splat(0.5));

    /// Transforms the box by an affine matrix and returns the enclosing AABB.
    #[must_use]
    pub fn transform(&self, m: &Mat4) -> Self {
        let center = m.transform_point3(self.center);
        let abs_x = m.x_axis.truncate().abs();
        let abs_y = m.y_axis.truncate().abs();
        let abs_z = m.z_axis.truncate().abs();
        let half_extents =
            abs_x * self.half_extents.x + abs_y * self.half_extents.y + abs_z * self.half_extents.z;
        Self {
            center,
            half_extents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_frustum() -> Frustum {
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100.0);
        Frustum::from_matrix(proj * view)
    }

    #[test]
    fn sphere_in_front_is_visible() {
        let f = camera_frustum();
        assert!(f.intersects_sphere(Vec3::new(0.0, 0.0, -10.0), 1.0));
    }

    #[test]
    fn sphere_behind_is_culled() {
        let f = camera_frustum();
        assert!(!f.intersects_sphere(Vec3::new(0.0, 0.0, 10.0), 1.0));
    }

    #[test]
    fn sphere_beyond_far_is_culled() {
        let f = camera_frustum();
        assert!(!f.intersects_sphere(Vec3::new(0.0, 0.0, -200.0), 5.0));
    }

    #[test]
    fn aabb_transform_scales_extents() {
        let m = Mat4::from_scale_rotation_translation(
            Vec3::new(4.0, 2.0, 1.0),
            glam::Quat::IDENTITY,
            Vec3::new(1.0, 2.0, 3.0),
        );
        let b = Aabb::RANGED_DIRECTIONAL_LIGHT.transform(&m);
        assert_eq!(b.center, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.half_extents, Vec3::new(2.0, 1.0, 0.5));
    }

    #[test]
    fn aabb_straddling_side_plane_is_visible() {
        let f = camera_frustum();
        let b = Aabb::new(Vec3::new(8.0, 0.0, -10.0), Vec3::splat(3.0));
        assert!(f.intersects_aabb(&b));
        let far_right = Aabb::new(Vec3::new(50.0, 0.0, -10.0), Vec3::splat(1.0));
        assert!(!f.intersects_aabb(&far_right));
    }
}
