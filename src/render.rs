//! The per-frame pipeline.
//!
//! [`RenderContext::tick`] is the only place a frame is produced. In order it
//! drains input events, applies a resize, moves and turns the camera, clears,
//! draws the mesh group and then the line group, and presents.
//!
//! A drawable that fails to draw is logged and skipped; the rest of the frame
//! still goes out. Failing to activate a program, or to clear or present,
//! is returned as a [`FrameError`].

use std::collections::HashSet;

use cgmath::Matrix4;
use instant::Duration;
use winit::keyboard::KeyCode;

use crate::{
    camera::CameraMovement,
    context::RenderContext,
    error::FrameError,
    gpu::{Gpu, GpuError},
    pipelines::{BoundProgram, MatrixSlot},
    registry::DrawableKind,
};

/// Input the shell forwards to the pipeline, in arrival order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Quit,
    Resize(u32, u32),
    KeyDown(KeyCode),
    KeyUp(KeyCode),
}

/// Input state at the start of a frame.
#[derive(Clone, Debug, Default)]
pub struct InputSnapshot {
    pub pressed: HashSet<KeyCode>,
    /// Pointer position in physical pixels, if it is over the window.
    pub cursor: Option<(f64, f64)>,
}

impl InputSnapshot {
    /// Track held keys.
    pub fn apply(&mut self, event: &InputEvent) {
        match event {
            InputEvent::KeyDown(code) => {
                self.pressed.insert(*code);
            }
            InputEvent::KeyUp(code) => {
                self.pressed.remove(code);
            }
            InputEvent::Quit | InputEvent::Resize(..) => (),
        }
    }

    pub fn is_pressed(&self, code: KeyCode) -> bool {
        self.pressed.contains(&code)
    }
}

/// What happened during one [`RenderContext::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameReport {
    /// Draw calls that reached the device.
    pub draws: usize,
    /// Drawables skipped because their draw failed.
    pub skipped: usize,
    pub quit: bool,
    /// Where the shell should warp the pointer to, if anywhere.
    pub recenter: Option<(f64, f64)>,
}

const MOVEMENT_KEYS: [(KeyCode, CameraMovement); 4] = [
    (KeyCode::KeyW, CameraMovement::Forward),
    (KeyCode::KeyS, CameraMovement::Backward),
    (KeyCode::KeyA, CameraMovement::Left),
    (KeyCode::KeyD, CameraMovement::Right),
];

impl<G: Gpu + 'static> RenderContext<G> {
    /// Produce one frame.
    pub fn tick(
        &mut self,
        input: &InputSnapshot,
        events: impl IntoIterator<Item = InputEvent>,
        dt: Duration,
    ) -> Result<FrameReport, FrameError> {
        let mut report = FrameReport::default();

        for event in events {
            match event {
                InputEvent::Quit | InputEvent::KeyDown(KeyCode::Escape) => report.quit = true,
                InputEvent::Resize(width, height) => self.apply_resize(width, height),
                InputEvent::KeyDown(KeyCode::KeyC) => {
                    let centre = (self.viewport.0 as f64 / 2.0, self.viewport.1 as f64 / 2.0);
                    self.mouse.recenter(centre.0, centre.1);
                    report.recenter = Some(centre);
                }
                InputEvent::KeyDown(_) | InputEvent::KeyUp(_) => (),
            }
        }

        let delta = dt.as_secs_f32();
        for (code, movement) in MOVEMENT_KEYS {
            if input.is_pressed(code) {
                self.camera.process_keyboard(movement, delta);
            }
        }
        // The cursor sample predates a recenter, so it is ignored this frame.
        if report.recenter.is_none() {
            if let Some((x, y)) = input.cursor {
                let (dx, dy) = self.mouse.sample(x, y);
                self.camera.process_mouse_movement(dx, dy);
            }
        }

        self.gpu
            .clear(self.clear_colour)
            .map_err(FrameError::Surface)?;

        let view = self.camera.view_matrix();
        for kind in [DrawableKind::Mesh, DrawableKind::Line] {
            self.draw_group(kind, &view, &mut report)?;
        }

        self.gpu.present().map_err(FrameError::Surface)?;
        Ok(report)
    }

    fn apply_resize(&mut self, width: u32, height: u32) {
        if !self.projection.resize(width, height) {
            log::debug!("ignoring resize to {width}x{height}");
            return;
        }
        self.viewport = (width, height);
        let projection = self.projection.calc_matrix();
        let generation = self.projection.generation();
        // Programs that miss the upload stay stale and are retried when drawn.
        if let Err(e) = self
            .shaders
            .upload_projection_all(&mut self.gpu, &projection, generation)
        {
            log::warn!("could not upload the projection after resize: {e}");
        }
    }

    fn draw_group(
        &mut self,
        kind: DrawableKind,
        view: &Matrix4<f32>,
        report: &mut FrameReport,
    ) -> Result<(), FrameError> {
        let id = self.program_for(kind);
        self.activate(id, view).map_err(|source| FrameError::Activation {
            name: self.shaders.get(id).name().to_string(),
            source,
        })?;

        for handle in self.registry.handles_of(kind) {
            let mut setter = BoundProgram::new(&self.shaders, id);
            match self.registry.bind_and_draw(&mut self.gpu, handle, &mut setter) {
                Ok(()) => report.draws += 1,
                Err(e) => {
                    let name = self.registry.get(handle).map_or("?", |d| d.name());
                    log::warn!("skipping `{name}` this frame: {e}");
                    report.skipped += 1;
                }
            }
        }
        Ok(())
    }

    /// Make `id` current and give it this frame's view and, if it is behind,
    /// the projection.
    fn activate(
        &mut self,
        id: crate::pipelines::ShaderId,
        view: &Matrix4<f32>,
    ) -> Result<(), GpuError> {
        self.shaders.use_program(&mut self.gpu, id)?;
        self.shaders
            .set_matrix(&mut self.gpu, id, MatrixSlot::View, view)?;
        let generation = self.projection.generation();
        if self.shaders.get(id).projection_generation() != Some(generation) {
            let projection = self.projection.calc_matrix();
            self.shaders
                .set_projection(&mut self.gpu, id, &projection, generation)?;
        }
        Ok(())
    }
}
