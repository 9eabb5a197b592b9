//! Transform helpers shared by the evaluator, frame writer and animation
//! generators

use nalgebra::{Matrix3, Matrix4, Quaternion, Rotation3, Translation3, UnitQuaternion, Vector3};

use crate::snapshot::Rotation;

/// Rotation as a unit quaternion
pub fn rotation_quaternion(rotation: &Rotation) -> UnitQuaternion<f32> {
    match *rotation {
        // X first, then Y, then Z
        Rotation::Xyz { euler } => UnitQuaternion::from_euler_angles(euler[0], euler[1], euler[2]),
        Rotation::Quaternion { quaternion: [w, x, y, z] } => {
            UnitQuaternion::new_normalize(Quaternion::new(w, x, y, z))
        }
    }
}

/// Translation, rotation and scale combined as `T * R * S`
pub fn compose(location: Vector3<f32>, rotation: &UnitQuaternion<f32>, scale: Vector3<f32>) -> Matrix4<f32> {
    Translation3::from(location).to_homogeneous()
        * rotation.to_homogeneous()
        * Matrix4::new_nonuniform_scaling(&scale)
}

/// Translation column of an affine matrix
pub fn to_translation(m: &Matrix4<f32>) -> Vector3<f32> {
    Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
}

/// Rotation of an affine matrix with scale removed
pub fn to_quaternion(m: &Matrix4<f32>) -> UnitQuaternion<f32> {
    let mut basis: Matrix3<f32> = m.fixed_view::<3, 3>(0, 0).into_owned();
    for mut column in basis.column_iter_mut() {
        let len = column.norm();
        if len > f32::EPSILON {
            column /= len;
        }
    }
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(basis))
}

/// Upper-left 3x3 block
pub fn to_3x3(m: &Matrix4<f32>) -> Matrix3<f32> {
    m.fixed_view::<3, 3>(0, 0).into_owned()
}

/// Rotation taking `from` to `to`, i.e. `from⁻¹ · to`
pub fn rotation_difference(from: &UnitQuaternion<f32>, to: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
    from.inverse() * to
}

/// Inverse of an affine matrix, identity when singular
///
/// Degenerate matrices show up for zero-scaled helpers; the host falls back
/// to identity as well.
pub fn inverse_or_identity(m: &Matrix4<f32>) -> Matrix4<f32> {
    m.try_inverse().unwrap_or_else(Matrix4::identity)
}
