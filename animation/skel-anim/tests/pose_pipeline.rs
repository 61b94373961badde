//! Sampling, blending, skinning and IK against small rigs

use glam::{EulerRot, Mat4, Quat, Vec3};
use proptest::prelude::*;
use rstest::rstest;
use skel_anim::animation::{
    apply_two_bone_ik, blend_local_poses, build_global_pose, build_skin_matrices,
    resolve_clip_ticks,
};
use skel_anim::{AnimationClip, LocalPose, Skeleton, Trs};

const EPSILON: f32 = 0.0001;

/// Three bones stacked along +Y, one unit apart
fn arm() -> Skeleton {
    let mut skeleton = Skeleton::new();
    let mut parent = None;
    let mut height = 0.0;
    for name in ["Shoulder", "Elbow", "Wrist"] {
        let local = if parent.is_some() {
            Mat4::from_translation(Vec3::Y)
        } else {
            Mat4::IDENTITY
        };
        let inverse = Mat4::from_translation(Vec3::new(0.0, -height, 0.0));
        parent = Some(skeleton.add_bone(name, parent, local, inverse));
        height += 1.0;
    }
    skeleton
}

fn pose_with(positions: Vec<Vec3>) -> LocalPose {
    let count = positions.len();
    LocalPose {
        positions,
        rotations: vec![Quat::IDENTITY; count],
        scales: vec![Vec3::ONE; count],
    }
}

#[test]
fn test_bind_pose_skins_to_identity() {
    let skeleton = arm();
    let pose = LocalPose::from_bind(&skeleton);
    let mut globals = Vec::new();
    let mut skin = Vec::new();
    build_skin_matrices(&skeleton, &pose, &mut globals, &mut skin);

    assert_eq!(skin.len(), 3);
    for matrix in &skin {
        assert!(matrix.abs_diff_eq(Mat4::IDENTITY, EPSILON), "{matrix:?}");
    }
    let wrist = globals[2].transform_point3(Vec3::ZERO);
    assert!((wrist - Vec3::new(0.0, 2.0, 0.0)).length() < EPSILON);
}

#[test]
fn test_blend_truncates_to_shorter_pose() {
    let a = pose_with(vec![Vec3::ZERO; 3]);
    let b = pose_with(vec![Vec3::ONE; 2]);
    let mut out = LocalPose::new();
    blend_local_poses(&a, &b, 0.5, &mut out);

    assert_eq!(out.len(), 2);
    assert_eq!(out.positions.len(), 2);
    assert!((out.positions[1] - Vec3::splat(0.5)).length() < EPSILON);
}

#[test]
fn test_ik_leaves_aligned_chain_alone() {
    let skeleton = arm();
    let mut pose = LocalPose::from_bind(&skeleton);
    let before = pose.clone();
    let mut scratch = Vec::new();

    apply_two_bone_ik(&skeleton, &mut pose, [0, 1, 2], Vec3::new(0.0, 5.0, 0.0), 1.0, &mut scratch);

    for i in 0..pose.len() {
        assert!(pose.rotations[i].abs_diff_eq(before.rotations[i], EPSILON));
        assert!((pose.positions[i] - before.positions[i]).length() < EPSILON);
    }
}

#[test]
fn test_ik_bends_chain_toward_target() {
    let skeleton = arm();
    let mut pose = LocalPose::from_bind(&skeleton);
    let mut scratch = Vec::new();
    let target = Vec3::new(1.5, 1.0, 0.0);

    let mut globals = Vec::new();
    build_global_pose(&skeleton, &pose, &mut globals);
    let before = globals[2].transform_point3(Vec3::ZERO).distance(target);

    apply_two_bone_ik(&skeleton, &mut pose, [0, 1, 2], target, 1.0, &mut scratch);
    build_global_pose(&skeleton, &pose, &mut globals);
    let after = globals[2].transform_point3(Vec3::ZERO).distance(target);

    assert!(after < before, "end effector moved away: {before} -> {after}");
}

#[rstest]
#[case::zero_weight(0.0)]
#[case::below_threshold(0.00005)]
fn test_ik_skips_negligible_weight(#[case] weight: f32) {
    let skeleton = arm();
    let mut pose = LocalPose::from_bind(&skeleton);
    let before = pose.clone();
    let mut scratch = Vec::new();
    apply_two_bone_ik(&skeleton, &mut pose, [0, 1, 2], Vec3::X * 3.0, weight, &mut scratch);
    assert_eq!(pose, before);
}

#[test]
fn test_trs_round_trips_through_matrix() {
    let trs = Trs::new(
        Vec3::new(1.0, -2.0, 3.0),
        Quat::from_rotation_z(0.7),
        Vec3::new(2.0, 2.0, 2.0),
    );
    let back = Trs::from_matrix(&trs.to_matrix());
    assert!((back.translation - trs.translation).length() < EPSILON);
    assert!(back.rotation.abs_diff_eq(trs.rotation, EPSILON));
    assert!((back.scale - trs.scale).length() < EPSILON);
}

fn vec3() -> impl Strategy<Value = Vec3> {
    (-100.0f32..100.0, -100.0f32..100.0, -100.0f32..100.0).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn rotation() -> impl Strategy<Value = Quat> {
    use std::f32::consts::PI;
    (-PI..PI, -PI..PI, -PI..PI).prop_map(|(x, y, z)| Quat::from_euler(EulerRot::XYZ, x, y, z))
}

fn scale() -> impl Strategy<Value = Vec3> {
    (0.1f32..4.0, 0.1f32..4.0, 0.1f32..4.0).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn single_bone(trs: Trs) -> LocalPose {
    LocalPose {
        positions: vec![trs.translation],
        rotations: vec![trs.rotation],
        scales: vec![trs.scale],
    }
}

fn trs() -> impl Strategy<Value = Trs> {
    (vec3(), rotation(), scale()).prop_map(|(translation, rotation, scale)| Trs {
        translation,
        rotation,
        scale,
    })
}

/// `q` and `-q` are the same rotation
fn same_rotation(a: Quat, b: Quat) -> bool {
    a.dot(b).abs() > 1.0 - EPSILON
}

fn same_trs(pose: &LocalPose, trs: &Trs) -> bool {
    (pose.positions[0] - trs.translation).length() < 0.001
        && same_rotation(pose.rotations[0], trs.rotation)
        && (pose.scales[0] - trs.scale).length() < 0.001
}

proptest! {
    #[test]
    fn prop_blend_with_self_is_identity(a in trs(), t in 0.0f32..=1.0) {
        let pose = single_bone(a);
        let mut out = LocalPose::new();
        blend_local_poses(&pose, &pose, t, &mut out);
        prop_assert!(same_trs(&out, &a));
        prop_assert!(out.rotations[0].is_normalized());
    }

    #[test]
    fn prop_blend_endpoints_with_rotations(a in trs(), b in trs()) {
        let (pa, pb) = (single_bone(a), single_bone(b));
        let mut out = LocalPose::new();

        blend_local_poses(&pa, &pb, 0.0, &mut out);
        prop_assert!(same_trs(&out, &a));

        blend_local_poses(&pa, &pb, 1.0, &mut out);
        prop_assert!(same_trs(&out, &b));
    }

    #[test]
    fn prop_blend_endpoints_match_inputs(a in vec3(), b in vec3()) {
        let pa = pose_with(vec![a]);
        let pb = pose_with(vec![b]);
        let mut out = LocalPose::new();

        blend_local_poses(&pa, &pb, 0.0, &mut out);
        prop_assert!((out.positions[0] - a).length() < 0.001);

        blend_local_poses(&pa, &pb, 1.0, &mut out);
        prop_assert!((out.positions[0] - b).length() < 0.001);

        // Out-of-range factors clamp
        blend_local_poses(&pa, &pb, 3.0, &mut out);
        prop_assert!((out.positions[0] - b).length() < 0.001);
    }

    #[test]
    fn prop_looping_ticks_stay_in_range(seconds in -1000.0f32..1000.0, duration in 1.0f32..500.0) {
        let mut clip = AnimationClip::new("Loop");
        clip.set_duration_ticks(duration);
        let ticks = resolve_clip_ticks(&clip, seconds, true);
        prop_assert!(ticks >= 0.0);
        prop_assert!(ticks < duration);
    }

    #[test]
    fn prop_clamped_ticks_stay_in_range(seconds in -1000.0f32..1000.0, duration in 1.0f32..500.0) {
        let mut clip = AnimationClip::new("Once");
        clip.set_duration_ticks(duration);
        let ticks = resolve_clip_ticks(&clip, seconds, false);
        prop_assert!((0.0..=duration).contains(&ticks));
    }
}
