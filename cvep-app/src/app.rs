use crate::cli::Args;
use anyhow::{Context, Result, anyhow};
use cvep_core::{StatusMessage, TrialRecord};
use cvep_experiment::{
    InputController, InputSignal, JsonLinesRecorder, LabRecorder, MarkerOutput, MarkerSink,
    Session, SpellerConfig, TickStatus, build_session,
};
use cvep_render::{SkiaRenderer, find_font};
use cvep_timing::{HighPrecisionTimer, Timer};
use pixels::{Pixels, SurfaceTexture};
use std::fs::File;
use std::io::BufWriter;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Fullscreen, Window, WindowId},
};

type SpellerSession = Session<HighPrecisionTimer, Box<dyn MarkerSink>>;

pub struct App {
    config: SpellerConfig,
    font_path: Option<PathBuf>,
    results_path: Option<PathBuf>,

    sink: Option<Box<dyn MarkerSink>>,
    lab_recorder: Option<LabRecorder<TcpStream>>,
    input: InputController,

    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    session: Option<SpellerSession>,
    renderer: Option<SkiaRenderer>,
    render_timer: HighPrecisionTimer,
    refresh_rate: Option<f64>,

    error: Option<anyhow::Error>,
    should_exit: bool,
}

impl App {
    /// Opens the marker sink and, when configured, starts the remote recording
    /// before any window exists.
    pub fn new(config: SpellerConfig, args: &Args) -> Result<Self> {
        let sink = open_sink(&config.recorder.markers)?;
        let lab_recorder = match &config.recorder.remote_control {
            Some(remote) => {
                let mut recorder = LabRecorder::connect(remote)
                    .with_context(|| format!("connecting to LabRecorder at {}", remote.address))?;
                recorder.set_filename(&remote.root, &config.session)?;
                recorder.update()?;
                recorder.start()?;
                info!(address = %remote.address, "LabRecorder recording");
                Some(recorder)
            }
            None => None,
        };

        Ok(Self {
            input: InputController::new(&config.keys),
            config,
            font_path: args.font.clone(),
            results_path: args.results.clone(),
            sink: Some(sink),
            lab_recorder,
            window: None,
            pixels: None,
            session: None,
            renderer: None,
            render_timer: HighPrecisionTimer::new(),
            refresh_rate: None,
            error: None,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!(
            platform = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            continue_keys = ?self.config.keys.continue_keys,
            abort_keys = ?self.config.keys.abort_keys,
            "c-VEP speller starting"
        );

        let result = event_loop.run_app(&mut self);
        let finished = self.finish();
        result?;
        finished?;
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("no monitor available"))?;

        self.refresh_rate = primary_monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let window_attributes = Window::default_attributes()
            .with_title("c-VEP speller")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor.clone()))))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();
        info!(
            width = physical_size.width,
            height = physical_size.height,
            scale_factor = window.scale_factor(),
            refresh_rate = ?self.refresh_rate,
            "display configured"
        );

        let sink = self
            .sink
            .take()
            .ok_or_else(|| anyhow!("marker sink already consumed"))?;
        let session = build_session(
            &self.config,
            self.refresh_rate,
            HighPrecisionTimer::new(),
            sink,
        )?;

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());
        self.pixels = Some(Pixels::new(
            physical_size.width,
            physical_size.height,
            surface_texture,
        )?);

        let font = find_font(self.font_path.as_deref())?;
        if font.is_none() {
            warn!("no font found; keys are drawn without labels");
        }
        let grid = &self.config.grid;
        let status_height =
            (grid.geometry.text_field_height_deg * grid.monitor.pixels_per_degree()) as u32;
        let mut renderer = SkiaRenderer::new(
            physical_size.width,
            physical_size.height,
            session.layout(),
            grid.key_size_px(),
            status_height,
            font,
        )?;
        let instructions = session.instructions();
        info!("{instructions}");
        renderer.set_status_text(StatusMessage::WaitingToStart, &instructions);
        self.renderer = Some(renderer);
        self.session = Some(session);

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);

        Ok(())
    }

    /// One display frame: advance the session, draw what it shows, present.
    fn frame(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let (Some(session), Some(renderer), Some(pixels)) = (
            self.session.as_mut(),
            self.renderer.as_mut(),
            self.pixels.as_mut(),
        ) else {
            return Ok(());
        };

        let status = session.tick(self.input.poll())?;
        match renderer.render_frame(
            session.frame(),
            session.status_message(),
            pixels.frame_mut(),
            &mut self.render_timer,
        ) {
            Ok(stats) => debug!(
                draw_us = stats.draw.as_micros() as u64,
                copy_us = stats.copy.as_micros() as u64,
                dirty = stats.dirty_count,
                "frame drawn"
            ),
            Err(err) => session.abandon_trial(&format!("render failed: {err:#}"))?,
        }
        if let Err(err) = pixels.render() {
            session.abandon_trial(&format!("present failed: {err}"))?;
        }

        match status {
            TickStatus::Finished | TickStatus::Aborted => self.cleanup_and_exit(event_loop),
            TickStatus::Running | TickStatus::Paused => {
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: &Key) {
        let Some(name) = key_name(key) else {
            return;
        };
        if let Some(action) = self.input.on_key(&name) {
            debug!(key = %name, ?action, "key pressed");
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                warn!("failed to resize surface: {e}");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                warn!("failed to resize buffer: {e}");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(new_size.width, new_size.height) {
                warn!("failed to resize renderer: {e:#}");
            }
        }
        info!(width = new_size.width, height = new_size.height, "display resized");
    }

    /// Closing the window mid-session counts as an abort.
    fn handle_close(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(session) = self.session.as_mut().filter(|s| !s.is_terminal()) {
            if let Err(err) = session.tick(InputSignal::abort()) {
                error!("abort on close failed: {err}");
            }
        }
        self.cleanup_and_exit(event_loop);
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.error = Some(err);
        self.cleanup_and_exit(event_loop);
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        self.should_exit = true;
        event_loop.exit();
    }

    /// Runs once after the event loop returns.
    fn finish(&mut self) -> Result<()> {
        if let Some(session) = &self.session {
            let emitter = session.emitter();
            info!(
                trials = session.records().len(),
                runs = session.runs_started(),
                markers = emitter.emitted(),
                dropped = emitter.dropped(),
                status = ?session.status(),
                "session ended"
            );
            let frames = session.timer().calibration_stats();
            info!(
                fps = frames.effective_fps,
                jitter_ms = frames.jitter_ns / 1e6,
                "frame timing"
            );
            if let Some(renderer) = &self.renderer {
                for stage in ["draw", "copy"] {
                    if let Some(stats) = renderer.component_stats(stage) {
                        info!(
                            stage,
                            mean_ms = stats.average_frame_time_ns / 1e6,
                            max_ms = stats.max_frame_time_ns / 1e6,
                            "render stage timing"
                        );
                    }
                }
            }
            if let Some(path) = &self.results_path {
                write_results(path, session.records())?;
                info!(path = %path.display(), "trial records written");
            }
        }
        if let Some(recorder) = self.lab_recorder.as_mut() {
            recorder.stop().context("stopping LabRecorder")?;
        }
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                self.fail(event_loop, e.context("failed to create window and session"));
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.handle_close(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.frame(event_loop) {
                    self.fail(event_loop, e);
                }
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state.is_pressed() && !event.repeat =>
            {
                self.handle_key(&event.logical_key);
            }
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    self.handle_resize(size);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }
}

fn open_sink(output: &MarkerOutput) -> Result<Box<dyn MarkerSink>> {
    Ok(match output {
        MarkerOutput::Stdout => Box::new(JsonLinesRecorder::stdout()),
        MarkerOutput::File { path } => Box::new(
            JsonLinesRecorder::file(path).with_context(|| format!("opening marker file {path}"))?,
        ),
        MarkerOutput::Tcp { address } => Box::new(
            JsonLinesRecorder::tcp(address.as_str())
                .with_context(|| format!("connecting marker stream to {address}"))?,
        ),
        MarkerOutput::Lsl { stream } => lsl_sink(stream)?,
    })
}

#[cfg(feature = "lsl")]
fn lsl_sink(stream: &str) -> Result<Box<dyn MarkerSink>> {
    let outlet = cvep_experiment::LslOutlet::open(stream)
        .with_context(|| format!("opening LSL marker stream {stream}"))?;
    Ok(Box::new(outlet))
}

#[cfg(not(feature = "lsl"))]
fn lsl_sink(stream: &str) -> Result<Box<dyn MarkerSink>> {
    anyhow::bail!("marker stream {stream:?} needs LSL support; rebuild with --features lsl")
}

fn write_results(path: &Path, records: &[TrialRecord]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), records)?;
    Ok(())
}

/// Lower-case key names as matched by [`InputController`].
fn key_name(key: &Key) -> Option<String> {
    match key {
        Key::Named(NamedKey::Escape) => Some("escape".into()),
        Key::Named(NamedKey::Space) => Some("space".into()),
        Key::Named(NamedKey::Enter) => Some("enter".into()),
        Key::Character(text) => Some(text.to_lowercase()),
        _ => None,
    }
}
