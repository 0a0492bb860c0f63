/// Terminal front end: input, presentation and the per-frame driver
use crossterm::{
    cursor,
    event::{
        DisableMouseCapture, EnableMouseCapture, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
        PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{self},
};
use nalgebra::Matrix4;
use std::io::{self, stdout, Stdout, Write};
use std::path::Path;
use std::time::Instant;
use thiserror::Error;

use softrast_core::{
    rasterize_scene_banded, Camera, CpuCapability, FrameBuffer, ModelTransform, RasterStats, Scene, SceneError,
    SceneLoader, ViewerConfig,
};

pub mod input;
pub mod presenter;

pub use input::TerminalInput;
pub use presenter::{frame_size, Presenter, TerminalPresenter};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("CPU without {0} instructions, quitting")]
    UnsupportedCpu(&'static str),
    #[error("Usage: {0} <mesh_file>")]
    Usage(String),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("terminal error: {0}")]
    Terminal(#[from] io::Error),
}

/// Everything that must succeed before the first frame: capability check,
/// argument handling and scene ingestion
pub fn startup<I>(cpu: &dyn CpuCapability, mut args: I, loader: &dyn SceneLoader) -> Result<Scene, AppError>
where
    I: Iterator<Item = String>,
{
    if !cpu.supported() {
        return Err(AppError::UnsupportedCpu(cpu.name()));
    }

    let program = args.next().unwrap_or_else(|| "softrast".to_string());
    let mesh = args.next().ok_or(AppError::Usage(program))?;

    log::info!("Loading scene {}", mesh);
    Ok(loader.load(Path::new(&mesh))?)
}

/// Frame buffer plus the presenter it is handed to every frame
pub struct RenderContext<P: Presenter> {
    framebuffer: FrameBuffer,
    presenter: P,
    bands: usize,
}

impl<P: Presenter> RenderContext<P> {
    pub fn new(width: usize, height: usize, presenter: P, bands: usize) -> Self {
        Self {
            framebuffer: FrameBuffer::new(width, height),
            presenter,
            bands,
        }
    }

    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.framebuffer
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Reallocate the buffers for a new output size
    pub fn resize(&mut self, width: usize, height: usize) {
        self.framebuffer = FrameBuffer::new(width, height);
    }

    /// Clear, rasterize every geometry, then present
    pub fn render_frame(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        model: &Matrix4<f32>,
        status: &str,
    ) -> io::Result<RasterStats> {
        self.framebuffer.clear();
        let stats = rasterize_scene_banded(
            &mut self.framebuffer,
            &scene.geometries,
            camera.view_projection_matrix(),
            model,
            self.bands,
        );
        self.presenter.present(&self.framebuffer, status)?;
        Ok(stats)
    }
}

/// Alternate screen, hidden cursor, mouse reporting and, when the terminal
/// supports it, key release reporting
fn enter_screen<W: Write>(out: &mut W, releases_reported: bool) -> io::Result<()> {
    execute!(out, terminal::EnterAlternateScreen, cursor::Hide, EnableMouseCapture)?;
    if releases_reported {
        execute!(
            out,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )?;
    }
    Ok(())
}

/// Undo [`enter_screen`]; every step is attempted even if an earlier one fails
fn leave_screen<W: Write>(out: &mut W, releases_reported: bool) -> io::Result<()> {
    let popped = if releases_reported {
        execute!(out, PopKeyboardEnhancementFlags)
    } else {
        Ok(())
    };
    let restored = execute!(out, DisableMouseCapture, terminal::LeaveAlternateScreen, cursor::Show);
    popped.and(restored)
}

/// Main application struct for terminal rendering
pub struct TerminalApp {
    scene: Scene,
    config: ViewerConfig,
    camera: Camera,
    model: ModelTransform,
    input: TerminalInput,
    context: RenderContext<TerminalPresenter<Stdout>>,
    last_sample: Instant,
    frame_count: u32,
    fps: f32,
    frame_time: f32,
}

impl TerminalApp {
    pub fn new(scene: Scene, config: ViewerConfig) -> Result<Self, AppError> {
        let (columns, rows) = terminal::size()?;
        let (width, height) = frame_size(columns, rows);
        log::info!("Output resolution {}x{}", width, height);

        let releases_reported = terminal::supports_keyboard_enhancement().unwrap_or(false);

        Ok(Self {
            camera: config.camera(width as u32, height as u32),
            model: config.model_transform(),
            input: TerminalInput::new(releases_reported),
            context: RenderContext::new(width, height, TerminalPresenter::new(stdout()), config.bands),
            scene,
            config,
            last_sample: Instant::now(),
            frame_count: 0,
            fps: 0.0,
            frame_time: 0.0,
        })
    }

    pub fn run(&mut self) -> Result<(), AppError> {
        let releases_reported = self.input.releases_reported();
        terminal::enable_raw_mode()?;
        enter_screen(&mut stdout(), releases_reported)?;

        let result = self.main_loop();

        // Cleanup
        if let Err(e) = leave_screen(&mut stdout(), releases_reported) {
            log::warn!("Failed to restore the terminal screen: {}", e);
        }
        terminal::disable_raw_mode()?;

        result
    }

    fn main_loop(&mut self) -> Result<(), AppError> {
        let mut previous = Instant::now();
        // Milliseconds spent on the previous frame
        let mut dt = 0.0;

        loop {
            self.input.poll()?;
            if self.input.quit_requested() {
                break;
            }
            if let Some((columns, rows)) = self.input.take_resize() {
                let (width, height) = frame_size(columns, rows);
                log::debug!("Resized to {}x{}", width, height);
                self.context.resize(width, height);
                self.camera.set_viewport(0, 0, width as u32, height as u32);
            }

            let snapshot = self.input.snapshot(Instant::now());
            self.camera.update(dt, &snapshot);
            self.model.advance(dt, self.config.spin_rate);

            let status = format!(
                "FPS: {:.1} Frame Time: {:.2} ms | WASD move, Space descend, mouse/arrows look, Q quit",
                self.fps, self.frame_time
            );
            let stats = self
                .context
                .render_frame(&self.scene, &self.camera, &self.model.matrix(), &status)?;
            log::trace!("{} triangles, {} culled", stats.triangles, stats.culled);

            let now = Instant::now();
            dt = (now - previous).as_secs_f32() * 1000.0;
            previous = now;
            self.frame_time = dt;

            // Update FPS counter
            self.frame_count += 1;
            let elapsed = now - self.last_sample;
            if elapsed.as_secs() >= 1 {
                self.fps = self.frame_count as f32 / elapsed.as_secs_f32();
                self.frame_count = 0;
                self.last_sample = now;
            }
        }

        Ok(())
    }
}
