//! Per-node transforms and their GPU representation.
//!
//! Every scene node carries a local [`Instance`] (relative to its parent) and a
//! world [`Instance`] (accumulated from the root). The world transform is packed
//! into an [`InstanceRaw`] and uploaded as a per-instance vertex buffer.

use std::ops::Mul;

use cgmath::{ElementWise, Matrix3, Matrix4, One, Point3, Quaternion, SquareMatrix, Transform, Vector3, Zero};

use crate::data_structures::model;

/// Translation, rotation and non-uniform scale of a node.
///
/// `parent * local` yields the child's world transform: the right-hand side is
/// applied inside the frame of the left-hand side.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Instance {
    /// Identity transform.
    pub fn new() -> Self {
        Self::placed(Vector3::zero(), Quaternion::one(), Vector3::new(1.0, 1.0, 1.0))
    }

    pub fn placed(position: Vector3<f32>, rotation: Quaternion<f32>, scale: Vector3<f32>) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Translation * rotation * scale.
    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    pub fn transform_point(&self, point: Point3<f32>) -> Point3<f32> {
        self.to_matrix().transform_point(point)
    }

    pub fn to_raw(&self) -> InstanceRaw {
        let model = self.to_matrix();
        InstanceRaw {
            handedness: model.determinant().signum(),
            model: model.into(),
            normal: Matrix3::from(self.rotation).into(),
        }
    }
}

impl Mul<&Instance> for &Instance {
    type Output = Instance;

    fn mul(self, rhs: &Instance) -> Instance {
        Instance {
            position: self.position + self.rotation * self.scale.mul_element_wise(rhs.position),
            rotation: self.rotation * rhs.rotation,
            scale: self.scale.mul_element_wise(rhs.scale),
        }
    }
}

impl Mul for Instance {
    type Output = Instance;

    fn mul(self, rhs: Instance) -> Instance {
        &self * &rhs
    }
}

impl From<Vector3<f32>> for Instance {
    fn from(position: Vector3<f32>) -> Self {
        Self {
            position,
            ..Self::new()
        }
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

/// World transform as laid out in the per-instance vertex buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
    handedness: f32,
}

impl InstanceRaw {
    // 5..=8 model matrix columns, 9..=11 normal matrix, 12 determinant sign
    const ATTRIBUTES: [wgpu::VertexAttribute; 8] = wgpu::vertex_attr_array![
        5 => Float32x4,
        6 => Float32x4,
        7 => Float32x4,
        8 => Float32x4,
        9 => Float32x3,
        10 => Float32x3,
        11 => Float32x3,
        12 => Float32,
    ];
}

impl model::Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}
