//! Head pose mapping
//!
//! Maps the tracker's camera-relative rotation estimate onto the
//! head/neck/spine chain with fixed per-bone weights. Each frame is an
//! absolute overwrite; smoothing is the tracker's job.

use crate::config::HeadOffset;

use super::rig::{BoneName, BoneRotation, Humanoid};

/// Share of the face rotation each bone in the chain receives
pub const ROTATION_WEIGHTS: [(BoneName, f32); 3] = [
    (BoneName::Head, 0.7),
    (BoneName::Neck, 0.2),
    (BoneName::Spine, 0.1),
];

/// Convert a raw tracker rotation estimate `[pitch, yaw, roll]` into the
/// avatar-space face rotation.
///
/// Pitch is always inverted (camera looks back at the face). Mirror mode
/// flips yaw instead of roll so the avatar turns with the viewer's
/// reflection rather than against it.
pub fn face_rotation(raw: [f32; 3], mirror: bool, offset: &HeadOffset) -> [f32; 3] {
    let xd = -1.0;
    let (yd, zd) = if mirror { (-1.0, 1.0) } else { (1.0, -1.0) };

    [
        offset.x + xd * raw[0],
        offset.y + yd * raw[1],
        offset.z + zd * raw[2],
    ]
}

/// Write the weighted face rotation onto the bone chain.
///
/// Bones the rig lacks are skipped; the rest still update.
pub fn apply_head_rotation(rig: &mut dyn Humanoid, rotation: [f32; 3]) {
    for (name, weight) in ROTATION_WEIGHTS {
        if let Some(bone) = rig.bone_mut(name) {
            bone.set_rotation(BoneRotation::new(
                rotation[0] * weight,
                rotation[1] * weight,
                rotation[2] * weight,
            ));
        }
    }
}
