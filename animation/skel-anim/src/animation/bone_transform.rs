//! Bone hierarchy matrix computation
//!
//! Local poses are composed into global (skeleton-space) matrices by
//! walking bones in index order, which is valid because parents always
//! precede their children. Skinning matrices additionally fold in the
//! skeleton's global inverse and each bone's inverse bind matrix.

use glam::Mat4;

use super::pose::LocalPose;
use crate::skeleton::Skeleton;

/// Local matrix for bone `index`, bind pose when the pose does not cover it
fn local_matrix(skeleton: &Skeleton, pose: &LocalPose, index: usize) -> Mat4 {
    pose.trs(index)
        .unwrap_or_else(|| skeleton.bind_trs(index))
        .to_matrix()
}

/// Compose global (skeleton-space) transforms for every bone into `out`
pub fn build_global_pose(skeleton: &Skeleton, pose: &LocalPose, out: &mut Vec<Mat4>) {
    out.clear();
    out.reserve(skeleton.len());

    for (index, bone) in skeleton.bones().iter().enumerate() {
        let local = local_matrix(skeleton, pose, index);
        let global = match bone.parent {
            // An out-of-order parent is treated as a root instead of reading
            // a matrix that has not been computed yet
            Some(parent) if parent < index => out[parent] * local,
            _ => local,
        };
        out.push(global);
    }
}

/// Compose skinning matrices (`global_inverse * global * inverse_bind`)
///
/// `globals` is scratch space; it holds the global pose afterwards.
pub fn build_skin_matrices(
    skeleton: &Skeleton,
    pose: &LocalPose,
    globals: &mut Vec<Mat4>,
    out: &mut Vec<Mat4>,
) {
    build_global_pose(skeleton, pose, globals);

    let global_inverse = skeleton.global_inverse();
    out.clear();
    out.extend(
        skeleton
            .bones()
            .iter()
            .zip(globals.iter())
            .map(|(bone, global)| global_inverse * *global * bone.inverse_bind),
    );
}

/// Global transform of a single bone, walking its parent chain
///
/// Returns identity for an out-of-range index.
pub fn bone_global_transform(skeleton: &Skeleton, pose: &LocalPose, index: usize) -> Mat4 {
    let mut current = Some(index);
    let mut global = Mat4::IDENTITY;
    // Bounded by the bone count so a malformed parent link cannot spin
    let mut remaining = skeleton.len();

    while let Some(bone_index) = current {
        let Some(bone) = skeleton.bone(bone_index) else {
            break;
        };
        if remaining == 0 {
            break;
        }
        remaining -= 1;

        global = local_matrix(skeleton, pose, bone_index) * global;
        current = bone.parent;
    }

    global
}

/// Flatten matrices to 4x3 (last row stripped) for GPU upload
///
/// Twelve floats per matrix: the three basis columns, then translation.
pub fn pack_matrices_4x3(matrices: &[Mat4]) -> Vec<f32> {
    let mut data = Vec::with_capacity(matrices.len() * 12);
    for matrix in matrices {
        data.extend_from_slice(&matrix.x_axis.truncate().to_array());
        data.extend_from_slice(&matrix.y_axis.truncate().to_array());
        data.extend_from_slice(&matrix.z_axis.truncate().to_array());
        data.extend_from_slice(&matrix.w_axis.truncate().to_array());
    }
    data
}

/// Reusable matrix buffers for one animated instance
///
/// Holds the global pose and the skinning matrices so the per-frame build
/// does not allocate once the buffers have grown to the bone count.
#[derive(Debug, Clone, Default)]
pub struct SkinningComputer {
    globals: Vec<Mat4>,
    skin: Vec<Mat4>,
}

impl SkinningComputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild both buffers from `pose`
    pub fn update(&mut self, skeleton: &Skeleton, pose: &LocalPose) -> &[Mat4] {
        build_skin_matrices(skeleton, pose, &mut self.globals, &mut self.skin);
        &self.skin
    }

    /// Global pose from the last update
    pub fn globals(&self) -> &[Mat4] {
        &self.globals
    }

    /// Skinning matrices from the last update
    pub fn skin_matrices(&self) -> &[Mat4] {
        &self.skin
    }

    pub fn bone_count(&self) -> usize {
        self.skin.len()
    }

    pub fn clear(&mut self) {
        self.globals.clear();
        self.skin.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    fn assert_mat_eq(a: &Mat4, b: &Mat4) {
        assert!(a.abs_diff_eq(*b, 0.0001), "{a:?} != {b:?}");
    }

    /// Three bones stacked along +Y with inverse binds derived from the bind globals
    fn stacked() -> Skeleton {
        let mut skeleton = Skeleton::new();
        let mut parent = None;
        let mut bind_global = Mat4::IDENTITY;
        for (i, name) in ["Root", "Spine", "Head"].iter().enumerate() {
            let local = if i == 0 {
                Mat4::IDENTITY
            } else {
                Mat4::from_rotation_translation(Quat::from_rotation_z(0.3), Vec3::Y)
            };
            bind_global *= local;
            parent = Some(skeleton.add_bone(*name, parent, local, bind_global.inverse()));
        }
        skeleton
    }

    #[test]
    fn test_bind_pose_skin_is_identity() {
        let skeleton = stacked();
        let pose = LocalPose::from_bind(&skeleton);
        let mut computer = SkinningComputer::new();
        let skin = computer.update(&skeleton, &pose);

        assert_eq!(skin.len(), 3);
        for matrix in skin {
            assert_mat_eq(matrix, &Mat4::IDENTITY);
        }
    }

    #[test]
    fn test_global_pose_walks_parents() {
        let skeleton = stacked();
        let pose = LocalPose::from_bind(&skeleton);
        let mut globals = Vec::new();
        build_global_pose(&skeleton, &pose, &mut globals);

        let expected = skeleton.bones()[1].local_bind * skeleton.bones()[2].local_bind;
        assert_mat_eq(&globals[2], &expected);
        assert_mat_eq(&bone_global_transform(&skeleton, &pose, 2), &expected);
    }

    #[test]
    fn test_global_inverse_applied() {
        let mut skeleton = stacked();
        let offset = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        skeleton.set_global_inverse(offset);

        let pose = LocalPose::from_bind(&skeleton);
        let mut globals = Vec::new();
        let mut skin = Vec::new();
        build_skin_matrices(&skeleton, &pose, &mut globals, &mut skin);
        assert_mat_eq(&skin[0], &offset);
    }

    #[test]
    fn test_short_pose_uses_bind() {
        let skeleton = stacked();
        let mut pose = LocalPose::from_bind(&skeleton);
        pose.resize(1);
        let mut globals = Vec::new();
        let mut skin = Vec::new();
        build_skin_matrices(&skeleton, &pose, &mut globals, &mut skin);
        assert_eq!(skin.len(), 3);
        assert_mat_eq(&skin[2], &Mat4::IDENTITY);
    }

    #[test]
    fn test_bone_global_out_of_range() {
        let skeleton = stacked();
        let pose = LocalPose::from_bind(&skeleton);
        assert_eq!(bone_global_transform(&skeleton, &pose, 42), Mat4::IDENTITY);
    }

    #[test]
    fn test_pack_4x3() {
        let matrix = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let data = pack_matrices_4x3(&[matrix, Mat4::IDENTITY]);
        assert_eq!(data.len(), 24);
        assert_eq!(&data[0..3], &[1.0, 0.0, 0.0]);
        assert_eq!(&data[9..12], &[1.0, 2.0, 3.0]);
    }
}
