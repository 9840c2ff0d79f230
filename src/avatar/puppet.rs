//! Data-backed avatar
//!
//! A `Puppet` is the live avatar the pipeline writes into: bone nodes
//! resolved from a declarative descriptor plus an optional blend-shape
//! surface. Loading real model files and extracting skeletons is the job
//! of an external renderer; the service only needs the rig's shape.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f32::consts::PI;

use crate::error::AvatarError;

use super::rig::{BlendShapeSink, BoneName, BoneNode, BoneRotation, Humanoid};

/// Rest-pose drop applied to the upper arms so the avatar doesn't T-pose
const ARM_DROP: f32 = 70.0 * PI / 180.0;

/// Blend channels a VRM-style avatar exposes
const VRM_CHANNELS: [&str; 7] = ["blink_r", "blink_l", "a", "i", "u", "e", "o"];

/// Declarative description of an avatar rig
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarDescriptor {
    /// Display name, echoed in published frames
    pub name: String,
    /// Bones this rig actually has; anything missing is skipped at runtime
    pub bones: Vec<BoneName>,
    /// Whether the avatar exposes a blend-shape surface
    pub blend_shapes: bool,
    /// World position of the head joint (renderers aim the camera at it)
    pub head_position: [f32; 3],
}

impl Default for AvatarDescriptor {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            bones: BoneName::ALL.to_vec(),
            blend_shapes: true,
            head_position: [0.0, 1.3, 0.0],
        }
    }
}

impl AvatarDescriptor {
    /// Check the descriptor is well-formed before building a puppet from it
    pub fn validate(&self) -> Result<(), AvatarError> {
        if self.name.trim().is_empty() {
            return Err(AvatarError::Descriptor("name must not be empty".to_string()));
        }

        let mut seen = std::collections::HashSet::new();
        for bone in &self.bones {
            if !seen.insert(bone) {
                return Err(AvatarError::Descriptor(format!(
                    "duplicate bone entry: {bone}"
                )));
            }
        }

        Ok(())
    }
}

/// Blend-shape surface backed by a fixed channel table.
///
/// Only pre-registered channel names accept writes; anything else is
/// silently dropped, matching the fire-and-forget sink contract.
#[derive(Debug, Clone)]
pub struct BlendShapeProxy {
    values: HashMap<String, f32>,
}

impl BlendShapeProxy {
    /// Proxy with the standard VRM channel set, all at zero
    pub fn vrm() -> Self {
        Self {
            values: VRM_CHANNELS
                .iter()
                .map(|name| (name.to_string(), 0.0))
                .collect(),
        }
    }

    pub fn value(&self, name: &str) -> Option<f32> {
        self.values.get(name).copied()
    }

    pub fn values(&self) -> &HashMap<String, f32> {
        &self.values
    }
}

impl BlendShapeSink for BlendShapeProxy {
    fn set_value(&mut self, name: &str, value: f32) {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value.clamp(0.0, 1.0);
        }
    }
}

/// The currently loaded avatar: bone references plus blend surface.
///
/// Replaced wholesale on avatar swap, never merged with a predecessor.
#[derive(Debug, Clone)]
pub struct Puppet {
    name: String,
    bones: HashMap<BoneName, BoneNode>,
    blend: Option<BlendShapeProxy>,
}

impl Puppet {
    /// Build a puppet from its descriptor and settle it into the rest pose
    pub fn from_descriptor(descriptor: &AvatarDescriptor) -> Self {
        let bones = descriptor
            .bones
            .iter()
            .map(|&name| {
                let position = match name {
                    BoneName::Head => descriptor.head_position,
                    _ => [0.0, 0.0, 0.0],
                };
                (name, BoneNode::at(position))
            })
            .collect();

        let mut puppet = Self {
            name: descriptor.name.clone(),
            bones,
            blend: descriptor.blend_shapes.then(BlendShapeProxy::vrm),
        };
        puppet.apply_rest_pose();
        puppet
    }

    /// Lower the upper arms from the T-pose
    fn apply_rest_pose(&mut self) {
        if let Some(arm) = self.bone_mut(BoneName::LeftUpperArm) {
            arm.set_rotation(BoneRotation::new(0.0, 0.0, ARM_DROP));
        }
        if let Some(arm) = self.bone_mut(BoneName::RightUpperArm) {
            arm.set_rotation(BoneRotation::new(0.0, 0.0, -ARM_DROP));
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The blend-shape surface, if this avatar has one
    pub fn blend_mut(&mut self) -> Option<&mut BlendShapeProxy> {
        self.blend.as_mut()
    }

    /// Serializable snapshot of the puppet for publishing to renderers
    pub fn snapshot(&self, detected: bool) -> PuppetFrame {
        PuppetFrame {
            avatar: self.name.clone(),
            detected,
            bones: self
                .bones
                .iter()
                .map(|(name, node)| (*name, node.rotation()))
                .collect(),
            blend: self
                .blend
                .as_ref()
                .map(|proxy| proxy.values().clone())
                .unwrap_or_default(),
            head_position: self
                .bone(BoneName::Head)
                .map(|head| head.world_position())
                .unwrap_or_default(),
        }
    }
}

impl Humanoid for Puppet {
    fn bone(&self, name: BoneName) -> Option<&BoneNode> {
        self.bones.get(&name)
    }

    fn bone_mut(&mut self, name: BoneName) -> Option<&mut BoneNode> {
        self.bones.get_mut(&name)
    }
}

/// One published avatar frame: everything an external renderer needs to
/// draw the current tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PuppetFrame {
    pub avatar: String,
    pub detected: bool,
    pub bones: HashMap<BoneName, BoneRotation>,
    pub blend: HashMap<String, f32>,
    pub head_position: [f32; 3],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_descriptor_full_rig() {
        let puppet = Puppet::from_descriptor(&AvatarDescriptor::default());

        for bone in BoneName::ALL {
            assert!(puppet.bone(bone).is_some(), "missing {bone}");
        }
        assert_eq!(
            puppet.bone(BoneName::Head).unwrap().world_position(),
            [0.0, 1.3, 0.0]
        );
    }

    #[test]
    fn test_rest_pose_lowers_arms() {
        let puppet = Puppet::from_descriptor(&AvatarDescriptor::default());

        let left = puppet.bone(BoneName::LeftUpperArm).unwrap().rotation();
        let right = puppet.bone(BoneName::RightUpperArm).unwrap().rotation();
        assert!((left.z - ARM_DROP).abs() < 1e-6);
        assert!((right.z + ARM_DROP).abs() < 1e-6);
        // Head stays at identity
        assert_eq!(
            puppet.bone(BoneName::Head).unwrap().rotation(),
            BoneRotation::default()
        );
    }

    #[test]
    fn test_partial_rig() {
        let descriptor = AvatarDescriptor {
            bones: vec![BoneName::Head, BoneName::Spine],
            ..Default::default()
        };
        let puppet = Puppet::from_descriptor(&descriptor);

        assert!(puppet.bone(BoneName::Head).is_some());
        assert!(puppet.bone(BoneName::Neck).is_none());
        assert!(puppet.bone(BoneName::LeftUpperArm).is_none());
    }

    #[test]
    fn test_blendless_avatar() {
        let descriptor = AvatarDescriptor {
            blend_shapes: false,
            ..Default::default()
        };
        let mut puppet = Puppet::from_descriptor(&descriptor);

        assert!(puppet.blend_mut().is_none());
        assert!(puppet.snapshot(true).blend.is_empty());
    }

    #[test]
    fn test_proxy_ignores_unknown_channels() {
        let mut proxy = BlendShapeProxy::vrm();
        proxy.set_value("a", 0.8);
        proxy.set_value("jawOpen", 0.9);

        assert_eq!(proxy.value("a"), Some(0.8));
        assert_eq!(proxy.value("jawOpen"), None);
    }

    #[test]
    fn test_proxy_clamps() {
        let mut proxy = BlendShapeProxy::vrm();
        proxy.set_value("u", 1.7);
        proxy.set_value("i", -0.3);

        assert_eq!(proxy.value("u"), Some(1.0));
        assert_eq!(proxy.value("i"), Some(0.0));
    }

    #[test]
    fn test_descriptor_validation() {
        assert!(AvatarDescriptor::default().validate().is_ok());

        let unnamed = AvatarDescriptor {
            name: "  ".to_string(),
            ..Default::default()
        };
        assert!(unnamed.validate().is_err());

        let doubled = AvatarDescriptor {
            bones: vec![BoneName::Head, BoneName::Head],
            ..Default::default()
        };
        assert!(doubled.validate().is_err());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let puppet = Puppet::from_descriptor(&AvatarDescriptor::default());
        let frame = puppet.snapshot(true);

        let json = serde_json::to_string(&frame).unwrap();
        let back: PuppetFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(frame, back);
        assert!(back.bones.contains_key(&BoneName::Head));
    }
}
