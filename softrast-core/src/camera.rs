/// Free-fly first-person camera and the matrices it feeds to the rasterizer
use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};
use std::f32::consts::PI;

use crate::input::InputSnapshot;

/// Movement per update while a key is held; multiplied by the frame time in milliseconds
pub const DEFAULT_LINEAR_SPEED: f32 = 0.005;

/// Elevation is kept strictly inside the poles so the look-at basis never degenerates
pub const MAX_ELEVATION: f32 = 0.49 * PI;

/// Output rectangle the projection is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

pub struct Camera {
    viewport: Viewport,
    aspect: f32,
    fov: f32,
    near: f32,
    far: f32,
    linear_speed: f32,

    position: Point3<f32>,
    velocity: Vector3<f32>,
    orientation: UnitQuaternion<f32>,
    forward: Vector3<f32>,
    up: Vector3<f32>,
    right: Vector3<f32>,
    elevation: f32,

    view: Matrix4<f32>,
    projection: Matrix4<f32>,
    view_projection: Matrix4<f32>,
}

impl Camera {
    pub fn new() -> Self {
        let mut camera = Self {
            viewport: Viewport {
                x: 0,
                y: 0,
                width: 1,
                height: 1,
            },
            aspect: 1.0,
            fov: 0.0,
            near: 0.0,
            far: 0.0,
            linear_speed: DEFAULT_LINEAR_SPEED,
            position: Point3::new(0.0, 0.0, 10.0),
            velocity: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            forward: -Vector3::z(),
            up: Vector3::y(),
            right: Vector3::x(),
            elevation: 0.0,
            view: Matrix4::identity(),
            projection: Matrix4::identity(),
            view_projection: Matrix4::identity(),
        };
        camera.set_viewport(0, 0, 640, 480);
        camera.set_fov(0.25 * PI);
        camera.set_clipping_planes(1.0, 100.0);
        camera
    }

    /// Width and height are floored at 1 so the aspect ratio stays finite
    pub fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        self.viewport = Viewport { x, y, width, height };
        self.aspect = width as f32 / height as f32;
    }

    pub fn set_clipping_planes(&mut self, near: f32, far: f32) {
        self.near = near;
        self.far = far;
    }

    pub fn set_fov(&mut self, fov_radians: f32) {
        self.fov = fov_radians;
    }

    pub fn set_linear_speed(&mut self, speed: f32) {
        self.linear_speed = speed;
    }

    pub fn set_position(&mut self, position: Point3<f32>) {
        self.position = position;
    }

    /// Advance one frame. `dt` is the previous frame time in milliseconds.
    pub fn update(&mut self, dt: f32, input: &InputSnapshot) {
        self.apply_keys(input);
        self.apply_mouse(input.mouse_dx, input.mouse_dy);

        self.position += self.velocity * dt;

        self.forward = (self.orientation * -Vector3::z()).normalize();
        self.up = (self.orientation * Vector3::y()).normalize();
        self.right = (self.orientation * Vector3::x()).normalize();

        let target = self.position + self.forward;
        self.view = Matrix4::look_at_rh(&self.position, &target, &self.up);
        self.projection = Matrix4::new_perspective(self.aspect, self.fov, self.near, self.far);
        self.view_projection = self.projection * self.view;
    }

    /// Velocity is re-derived from the held keys every frame, never integrated.
    /// It uses the basis from the previous update.
    fn apply_keys(&mut self, input: &InputSnapshot) {
        let keys = input.keys;
        let speed = self.linear_speed;

        self.velocity = if keys.forward {
            self.forward * speed
        } else if keys.backward {
            -self.forward * speed
        } else {
            Vector3::zeros()
        };

        if keys.strafe_left {
            self.velocity -= self.right * speed;
        } else if keys.strafe_right {
            self.velocity += self.right * speed;
        }

        if keys.descend {
            self.velocity -= self.up * speed;
        }
    }

    fn apply_mouse(&mut self, dx: f32, dy: f32) {
        let mut rotation_x = dy / self.viewport.height as f32;
        let rotation_y = dx / self.viewport.width as f32;

        self.elevation += rotation_x;

        // Shrink the pitch by the overshoot so the orientation lands exactly on the bound
        if self.elevation > MAX_ELEVATION {
            rotation_x = MAX_ELEVATION - (self.elevation - rotation_x);
            self.elevation = MAX_ELEVATION;
        }
        if self.elevation < -MAX_ELEVATION {
            rotation_x = -MAX_ELEVATION - (self.elevation - rotation_x);
            self.elevation = -MAX_ELEVATION;
        }

        // Yaw in world space, pitch in local space: no roll can build up
        if rotation_y != 0.0 {
            self.orientation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), -rotation_y) * self.orientation;
        }
        if rotation_x != 0.0 {
            self.orientation *= UnitQuaternion::from_axis_angle(&Vector3::x_axis(), rotation_x);
        }

        self.orientation.renormalize();
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn clipping_planes(&self) -> (f32, f32) {
        (self.near, self.far)
    }

    pub fn position(&self) -> Point3<f32> {
        self.position
    }

    pub fn velocity(&self) -> Vector3<f32> {
        self.velocity
    }

    pub fn orientation(&self) -> UnitQuaternion<f32> {
        self.orientation
    }

    pub fn forward(&self) -> Vector3<f32> {
        self.forward
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    pub fn right(&self) -> Vector3<f32> {
        self.right
    }

    pub fn elevation(&self) -> f32 {
        self.elevation
    }

    pub fn view_matrix(&self) -> &Matrix4<f32> {
        &self.view
    }

    pub fn projection_matrix(&self) -> &Matrix4<f32> {
        &self.projection
    }

    pub fn view_projection_matrix(&self) -> &Matrix4<f32> {
        &self.view_projection
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}
