//! Humanoid rig primitives
//!
//! The rig provider resolves a fixed set of humanoid bone names to bone
//! nodes. A bone may be absent on a given model; callers skip it silently.

use serde::{Deserialize, Serialize};

/// Humanoid bones the puppeteering pipeline can address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BoneName {
    Head,
    Neck,
    Spine,
    LeftUpperArm,
    RightUpperArm,
}

impl BoneName {
    /// All addressable bones, in skeleton order
    pub const ALL: [BoneName; 5] = [
        BoneName::Head,
        BoneName::Neck,
        BoneName::Spine,
        BoneName::LeftUpperArm,
        BoneName::RightUpperArm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BoneName::Head => "head",
            BoneName::Neck => "neck",
            BoneName::Spine => "spine",
            BoneName::LeftUpperArm => "leftUpperArm",
            BoneName::RightUpperArm => "rightUpperArm",
        }
    }
}

impl std::fmt::Display for BoneName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Euler rotation of a bone in radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoneRotation {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl BoneRotation {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// A joint in the avatar's skeleton that accepts rotation assignments
#[derive(Debug, Clone, Default)]
pub struct BoneNode {
    rotation: BoneRotation,
    world_position: [f32; 3],
}

impl BoneNode {
    /// Create a bone node at the given world position, with identity rotation
    pub fn at(world_position: [f32; 3]) -> Self {
        Self {
            rotation: BoneRotation::default(),
            world_position,
        }
    }

    pub fn rotation(&self) -> BoneRotation {
        self.rotation
    }

    /// Overwrite the bone's rotation (absolute, not additive)
    pub fn set_rotation(&mut self, rotation: BoneRotation) {
        self.rotation = rotation;
    }

    pub fn world_position(&self) -> [f32; 3] {
        self.world_position
    }
}

/// Rig provider: resolves bone names to live bone nodes.
///
/// Returning `None` means the humanoid model lacks that joint; it is a
/// normal case, never an error.
pub trait Humanoid {
    fn bone(&self, name: BoneName) -> Option<&BoneNode>;
    fn bone_mut(&mut self, name: BoneName) -> Option<&mut BoneNode>;
}

/// Blend-channel control surface of an avatar.
///
/// `set_value` is fire-and-forget: unknown channel names are ignored.
pub trait BlendShapeSink {
    fn set_value(&mut self, name: &str, value: f32);
}
