//! Orbit camera, projection and the camera uniform.
//!
//! The camera always looks at a fixed target and is described by spherical
//! coordinates around it (distance, yaw, pitch). [`OrbitController`] turns
//! mouse drags into rotation and wheel input into zoom; panning is disabled
//! so the target never moves.

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Rad, Vector3, perspective};
use winit::event::{MouseScrollDelta, WindowEvent};

use crate::config::{CameraConfig, OrbitConfig};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

// Keeps the camera off the poles, where the up vector degenerates
const SAFE_PITCH: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub target: Point3<f32>,
    pub distance: f32,
    pub yaw: Rad<f32>,
    pub pitch: Rad<f32>,
}

impl Camera {
    /// A camera at `position` looking at `target`.
    pub fn looking_at(position: Point3<f32>, target: Point3<f32>) -> Self {
        let offset = position - target;
        let distance = offset.magnitude();
        let (yaw, pitch) = if distance > f32::EPSILON {
            (
                Rad(offset.x.atan2(offset.z)),
                Rad((offset.y / distance).clamp(-1.0, 1.0).asin()),
            )
        } else {
            (Rad(0.0), Rad(0.0))
        };
        Self {
            target,
            distance,
            yaw,
            pitch,
        }
    }

    pub fn position(&self) -> Point3<f32> {
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.0.sin_cos();
        let offset = Vector3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw) * self.distance;
        self.target + offset
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position(), self.target, Vector3::unit_y())
    }
}

pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// Orbit-style navigation around a fixed target.
#[derive(Debug)]
pub struct OrbitController {
    config: OrbitConfig,
    rotate_horizontal: f32,
    rotate_vertical: f32,
    zoom: f32,
    rotate_speed: f32,
    zoom_speed: f32,
    dragging: bool,
}

impl OrbitController {
    pub fn new(config: OrbitConfig, rotate_speed: f32, zoom_speed: f32) -> Self {
        Self {
            config,
            rotate_horizontal: 0.0,
            rotate_vertical: 0.0,
            zoom: 0.0,
            rotate_speed,
            zoom_speed,
            dragging: false,
        }
    }

    pub fn set_dragging(&mut self, dragging: bool) {
        self.dragging = dragging;
    }

    /// Mouse motion in pixels; only rotates while a drag is active.
    pub fn handle_mouse(&mut self, dx: f64, dy: f64) {
        if !self.config.enable_rotate || !self.dragging {
            return;
        }
        self.rotate_horizontal += dx as f32;
        self.rotate_vertical += dy as f32;
    }

    /// Positive `amount` zooms in.
    pub fn handle_scroll(&mut self, amount: f32) {
        if !self.config.enable_zoom {
            return;
        }
        self.zoom += amount;
    }

    pub fn handle_window_events(&mut self, event: &WindowEvent) {
        if let WindowEvent::MouseWheel { delta, .. } = event {
            let amount = match delta {
                MouseScrollDelta::LineDelta(_, y) => *y,
                MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
            };
            self.handle_scroll(amount);
        }
    }

    /// Applies the accumulated input to `camera`. Distance ends up in
    /// `[min_distance, max_distance]` and the target is pinned.
    ///
    /// Rotation is `rotate_speed` radians per dragged pixel, however many
    /// frames the drag was spread over.
    pub fn update(&mut self, camera: &mut Camera) {
        camera.yaw -= Rad(self.rotate_horizontal * self.rotate_speed);
        camera.pitch += Rad(self.rotate_vertical * self.rotate_speed);
        camera.pitch = Rad(camera.pitch.0.clamp(-SAFE_PITCH, SAFE_PITCH));
        self.rotate_horizontal = 0.0;
        self.rotate_vertical = 0.0;

        // Zoom scales the distance so steps feel the same near and far
        let factor = (1.0 - self.zoom * self.zoom_speed).max(0.05);
        camera.distance = (camera.distance * factor).clamp(self.config.min_distance, self.config.max_distance);
        self.zoom = 0.0;

        camera.target = Point3::from_vec(self.config.target);
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position().to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

pub struct CameraResources {
    pub camera: Camera,
    pub controller: OrbitController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

/// Camera and projection for the configured start position.
pub fn from_config(config: &CameraConfig, orbit: &OrbitConfig, width: u32, height: u32) -> (Camera, Projection) {
    let mut camera = Camera::looking_at(Point3::from_vec(config.position), Point3::from_vec(orbit.target));
    camera.distance = camera.distance.clamp(orbit.min_distance, orbit.max_distance);
    let projection = Projection::new(width, height, cgmath::Deg(config.fov_degrees), config.near, config.far);
    (camera, projection)
}
