use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Data unique to each frame, written into that frame's uniform buffer
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, Pod, Zeroable)]
pub struct SceneUbo {
    pub projection: Mat4,
    pub view: Mat4,
}

/// Data unique to each sprite draw, passed as a push constant
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, Pod, Zeroable)]
pub struct SpriteConstants {
    pub model: Mat4,
}
