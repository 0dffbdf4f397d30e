//! Free-fly camera, perspective projection and mouse-look tracking.
//!
//! The [`Camera`] is only ever mutated through [`Camera::process_keyboard`] and
//! [`Camera::process_mouse_movement`]; the frame pipeline reads it. Angles are
//! kept in degrees, yaw measured from +X towards +Z, so a yaw of -90 looks
//! down -Z.

use cgmath::{Deg, InnerSpace, Matrix4, Point3, Rad, Vector3};

use crate::config::CameraConfig;

/// wgpu clips depth to 0..1 where cgmath's projection targets OpenGL's -1..1.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Discrete movement input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
}

#[derive(Clone, Debug)]
pub struct Camera {
    position: Point3<f32>,
    front: Vector3<f32>,
    up: Vector3<f32>,
    right: Vector3<f32>,
    world_up: Vector3<f32>,
    yaw: f32,
    pitch: f32,
    /// World units per unit of movement delta.
    pub speed: f32,
    /// Degrees per unit of pointer delta.
    pub sensitivity: f32,
}

impl Camera {
    /// Pitch stays strictly inside +-90 degrees so the basis never flips.
    pub const PITCH_LIMIT: f32 = 89.0;

    pub fn new(position: impl Into<Point3<f32>>, yaw: f32, pitch: f32) -> Self {
        let mut camera = Self {
            position: position.into(),
            front: Vector3::new(0.0, 0.0, -1.0),
            up: Vector3::unit_y(),
            right: Vector3::unit_x(),
            world_up: Vector3::unit_y(),
            yaw,
            pitch: pitch.clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT),
            speed: 3.0,
            sensitivity: 0.25,
        };
        camera.update_vectors();
        camera
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        let mut camera = Self::new(config.position, config.yaw, config.pitch);
        camera.speed = config.speed;
        camera.sensitivity = config.sensitivity;
        camera
    }

    pub fn position(&self) -> Point3<f32> {
        self.position
    }

    pub fn front(&self) -> Vector3<f32> {
        self.front
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    pub fn right(&self) -> Vector3<f32> {
        self.right
    }

    pub fn world_up(&self) -> Vector3<f32> {
        self.world_up
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Move along `front` or `right` by `delta * speed`. Orientation is untouched.
    pub fn process_keyboard(&mut self, direction: CameraMovement, delta: f32) {
        let velocity = self.speed * delta;
        match direction {
            CameraMovement::Forward => self.position += self.front * velocity,
            CameraMovement::Backward => self.position -= self.front * velocity,
            CameraMovement::Left => self.position -= self.right * velocity,
            CameraMovement::Right => self.position += self.right * velocity,
        }
    }

    /// Turn by a pointer delta. Positive `dy` looks up.
    pub fn process_mouse_movement(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch = (self.pitch + dy * self.sensitivity).clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
        self.update_vectors();
    }

    /// Right-handed look-at from the position towards `position + front`.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.position + self.front, self.world_up)
    }

    fn update_vectors(&mut self) {
        let (yaw_sin, yaw_cos) = Rad::from(Deg(self.yaw)).0.sin_cos();
        let (pitch_sin, pitch_cos) = Rad::from(Deg(self.pitch)).0.sin_cos();
        self.front = Vector3::new(yaw_cos * pitch_cos, pitch_sin, yaw_sin * pitch_cos).normalize();
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

/// Perspective projection. Tracks a generation counter so programs can tell
/// whether the matrix they hold is stale.
#[derive(Clone, Debug)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
    generation: u64,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width.max(1) as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
            generation: 0,
        }
    }

    /// Recompute the aspect ratio. A zero dimension (minimised window) is
    /// ignored and reported as `false`.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        self.aspect = width as f32 / height as f32;
        self.generation += 1;
        true
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// Turns absolute pointer positions into look deltas.
///
/// The first sample after control is (re)acquired only sets the reference
/// point, so the camera does not jump.
#[derive(Clone, Copy, Debug, Default)]
pub struct MouseLook {
    last: Option<(f64, f64)>,
}

impl MouseLook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look delta for a new pointer position. Screen y grows downwards, so
    /// the returned `dy` is positive when the pointer moves up.
    pub fn sample(&mut self, x: f64, y: f64) -> (f32, f32) {
        let delta = match self.last {
            None => (0.0, 0.0),
            Some((last_x, last_y)) => ((x - last_x) as f32, (last_y - y) as f32),
        };
        self.last = Some((x, y));
        delta
    }

    /// Forget the reference; the next sample is treated as the first.
    pub fn release(&mut self) {
        self.last = None;
    }

    /// Use `(x, y)` as the reference, e.g. after warping the pointer there.
    pub fn recenter(&mut self, x: f64, y: f64) {
        self.last = Some((x, y));
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{EuclideanSpace, SquareMatrix};

    use super::*;

    const EPSILON: f32 = 1e-5;

    fn assert_matrix_eq(a: Matrix4<f32>, b: Matrix4<f32>) {
        for col in 0..4 {
            for row in 0..4 {
                assert!((a[col][row] - b[col][row]).abs() < EPSILON, "{a:?} != {b:?}");
            }
        }
    }

    #[test]
    fn default_orientation_looks_down_negative_z() {
        let camera = Camera::new((0.0, 0.0, 3.0), -90.0, 0.0);
        assert!((camera.front() - Vector3::new(0.0, 0.0, -1.0)).magnitude() < EPSILON);
        assert!((camera.right() - Vector3::new(1.0, 0.0, 0.0)).magnitude() < EPSILON);
        assert!((camera.up() - Vector3::new(0.0, 1.0, 0.0)).magnitude() < EPSILON);
    }

    #[test]
    fn view_matrix_without_movement_is_plain_look_at() {
        let camera = Camera::new((1.0, 2.0, 3.0), -90.0, 0.0);
        let expected = Matrix4::look_at_rh(
            Point3::new(1.0, 2.0, 3.0),
            Point3::new(1.0, 2.0, 2.0),
            Vector3::unit_y(),
        );
        assert_matrix_eq(camera.view_matrix(), expected);
    }

    #[test]
    fn zero_mouse_delta_keeps_angles() {
        let mut camera = Camera::new((0.0, 0.0, 0.0), -42.0, 17.0);
        for _ in 0..100 {
            camera.process_mouse_movement(0.0, 0.0);
        }
        assert_eq!(camera.yaw(), -42.0);
        assert_eq!(camera.pitch(), 17.0);
    }

    #[test]
    fn pitch_is_clamped_inside_ninety_degrees() {
        let mut camera = Camera::new((0.0, 0.0, 0.0), -90.0, 0.0);
        camera.process_mouse_movement(0.0, 10_000.0);
        assert_eq!(camera.pitch(), Camera::PITCH_LIMIT);
        camera.process_mouse_movement(0.0, -100_000.0);
        assert_eq!(camera.pitch(), -Camera::PITCH_LIMIT);
        assert!(camera.front().y > -1.0);
    }

    #[test]
    fn strafing_follows_the_right_vector() {
        let mut camera = Camera::new((0.0, 0.0, 0.0), -90.0, 0.0);
        camera.speed = 2.0;
        camera.process_keyboard(CameraMovement::Right, 0.5);
        assert!((camera.position().to_vec() - Vector3::new(1.0, 0.0, 0.0)).magnitude() < EPSILON);
        camera.process_keyboard(CameraMovement::Left, 1.0);
        assert!((camera.position().to_vec() - Vector3::new(-1.0, 0.0, 0.0)).magnitude() < EPSILON);
    }

    #[test]
    fn projection_tracks_aspect_and_ignores_zero_sizes() {
        let mut projection = Projection::new(1280, 720, Deg(45.0), 0.1, 100.0);
        assert!(!projection.resize(0, 720));
        assert_eq!(projection.generation(), 0);
        assert!(projection.resize(800, 400));
        assert_eq!(projection.aspect(), 2.0);
        assert_eq!(projection.generation(), 1);
        let m = projection.calc_matrix();
        assert!((m[1][1] / m[0][0] - 2.0).abs() < EPSILON);
        assert!(m.invert().is_some());
    }

    #[test]
    fn first_mouse_sample_is_only_a_reference() {
        let mut look = MouseLook::new();
        assert_eq!(look.sample(640.0, 360.0), (0.0, 0.0));
        assert_eq!(look.sample(650.0, 350.0), (10.0, 10.0));
        look.release();
        assert_eq!(look.sample(10.0, 10.0), (0.0, 0.0));
        look.recenter(100.0, 100.0);
        assert_eq!(look.sample(90.0, 120.0), (-10.0, -20.0));
    }
}
