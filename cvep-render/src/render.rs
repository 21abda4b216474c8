use ab_glyph::{Font, FontArc, Glyph, PxScale, ScaleFont, point};
use anyhow::{Context, Result, anyhow, bail};
use bytemuck::{cast_slice, cast_slice_mut};
use cvep_cache::{Atom, get_text, intern_text};
use cvep_core::{Layout, StatusMessage, VisualState};
use cvep_timing::{CalibrationStats, HighPrecisionTimer, Timer};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tiny_skia::{Color, Pixmap, Rect};

pub type Rgba = [u8; 4];

const BACKGROUND: Rgba = [0, 0, 0, 255];
const TEXT: Rgba = [128, 128, 128, 255];

/// Fonts tried when none is configured.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

// Key tiles, indexed by `VisualState as usize`.
#[repr(usize)]
#[derive(Debug, Clone, Copy)]
enum CacheIndex {
    KeyOff = 0,
    KeyOn = 1,
    KeyCue = 2,
}

impl CacheIndex {
    const STATIC_COUNT: usize = 3;

    fn color(self) -> Color {
        match self {
            CacheIndex::KeyOff => Color::from_rgba8(0, 0, 0, 255),
            CacheIndex::KeyOn => Color::from_rgba8(255, 255, 255, 255),
            CacheIndex::KeyCue => Color::from_rgba8(0, 160, 0, 255),
        }
    }
}

pub fn load_font(path: &Path) -> Result<FontArc> {
    let bytes = std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
    FontArc::try_from_vec(bytes).map_err(|e| anyhow!("invalid font {}: {e}", path.display()))
}

/// Loads `explicit` if given, otherwise the first usable system font.
pub fn find_font(explicit: Option<&Path>) -> Result<Option<FontArc>> {
    if let Some(path) = explicit {
        return load_font(path).map(Some);
    }
    Ok(FONT_CANDIDATES
        .iter()
        .map(Path::new)
        .filter(|p| p.exists())
        .find_map(|p| load_font(p).ok()))
}

struct TextCache {
    font: FontArc,
    size_px: f32,
    map: HashMap<Atom, Option<Arc<Pixmap>>>,
}

impl TextCache {
    fn new(font: FontArc, size_px: f32) -> Self {
        Self {
            font,
            size_px,
            map: HashMap::new(),
        }
    }

    fn get_or_render(&mut self, atom: Atom) -> Option<Arc<Pixmap>> {
        if let Some(p) = self.map.get(&atom) {
            return p.clone();
        }
        let pm = render_text_pixmap(atom.as_ref(), self.size_px, &self.font, TEXT).map(Arc::new);
        self.map.insert(atom, pm.clone());
        pm
    }
}

/// Rasterizes a single line of text into a tightly cropped, premultiplied
/// pixmap. `None` for text without visible glyphs.
pub fn render_text_pixmap<F: Font>(
    text: &str,
    font_size: f32,
    font: &F,
    color: Rgba,
) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    // Layout with baseline at ascent
    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    if outlines.is_empty() {
        return None;
    }
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for out in &outlines {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;
    let dst: &mut [Rgba] = cast_slice_mut(pm.data_mut());
    let stride = w as usize;

    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i32;
            let iy = (y as f32 + b.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;
            let a = (cov * color[3] as f32 / 255.0).clamp(0.0, 1.0);
            let src = [
                (color[0] as f32 * a) as u8,
                (color[1] as f32 * a) as u8,
                (color[2] as f32 * a) as u8,
                (a * 255.0) as u8,
            ];
            dst[i] = over(src, dst[i]);
        });
    }

    Some(pm)
}

/// Porter-Duff "over" on premultiplied pixels.
#[inline]
fn over(src: Rgba, dst: Rgba) -> Rgba {
    let inv = 255 - src[3] as u32;
    std::array::from_fn(|i| (src[i] as u32 + (dst[i] as u32 * inv + 127) / 255).min(255) as u8)
}

/// Copies `src` centred on `pos`, clipped to the canvas. Returns the touched
/// region.
fn blit_centered(canvas: &mut Pixmap, src: &Pixmap, pos: (f32, f32)) -> Option<Rect> {
    let (w, h) = (src.width() as i32, src.height() as i32);
    let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);
    let x0 = (pos.0 - w as f32 * 0.5).floor() as i32;
    let y0 = (pos.1 - h as f32 * 0.5).floor() as i32;

    let (dst_x, dst_y) = (x0.max(0), y0.max(0));
    let (dst_x1, dst_y1) = ((x0 + w).min(cw), (y0 + h).min(ch));
    if dst_x1 <= dst_x || dst_y1 <= dst_y {
        return None;
    }
    let (src_x, src_y) = ((dst_x - x0) as usize, (dst_y - y0) as usize);
    let copy_w = (dst_x1 - dst_x) as usize;
    let copy_h = (dst_y1 - dst_y) as usize;
    let src_stride = w as usize;
    let dst_stride = cw as usize;

    let src_px: &[Rgba] = cast_slice(src.data());
    let fully_opaque = (0..copy_h).all(|row| {
        let s = (src_y + row) * src_stride + src_x;
        src_px[s..s + copy_w].iter().all(|p| p[3] == 255)
    });

    let dst_px: &mut [Rgba] = cast_slice_mut(canvas.data_mut());
    for row in 0..copy_h {
        let s = (src_y + row) * src_stride + src_x;
        let d = (dst_y as usize + row) * dst_stride + dst_x as usize;
        let src_row = &src_px[s..s + copy_w];
        let dst_row = &mut dst_px[d..d + copy_w];
        if fully_opaque {
            dst_row.copy_from_slice(src_row);
        } else {
            for (dp, sp) in dst_row.iter_mut().zip(src_row) {
                *dp = over(*sp, *dp);
            }
        }
    }

    Rect::from_xywh(dst_x as f32, dst_y as f32, copy_w as f32, copy_h as f32)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
    pub dirty_count: usize,
}

pub trait Renderer {
    fn clear_dirty(&mut self, dirty: &[Rect]);
    fn blit_cached(&mut self, index: usize, pos: (f32, f32));
    fn blit_text_by_intern_id(&mut self, intern_id: usize, pos: (f32, f32));
}

/// Draws one speller frame onto the offscreen canvas.
pub trait GridRenderer: Renderer {
    fn render_grid(&mut self, states: &[VisualState], status: StatusMessage) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
struct KeySlot {
    /// Offset from the screen centre, y up.
    offset: (f32, f32),
    center: (f32, f32),
    label_id: Option<usize>,
}

/// Software renderer for the key grid. Only keys whose visual state changed
/// are redrawn and copied to the frame buffer.
pub struct SkiaRenderer {
    width: u32,
    height: u32,
    status_height: u32,

    tiles: Vec<Pixmap>,
    text_cache: Option<TextCache>,
    keys: Vec<KeySlot>,
    status_ids: Vec<(StatusMessage, usize)>,

    canvas: Pixmap,
    dirty_regions: Vec<Rect>,
    drawn: Vec<Option<VisualState>>,
    drawn_status: Option<StatusMessage>,
    first_frame: bool,

    component_timers: HashMap<&'static str, HighPrecisionTimer>,
    clear_buffer: Vec<u8>,
}

impl SkiaRenderer {
    /// `key_size` and `status_height` are in pixels. Without a font the keys
    /// are drawn unlabelled.
    pub fn new(
        width: u32,
        height: u32,
        layout: &Layout,
        key_size: (u32, u32),
        status_height: u32,
        font: Option<FontArc>,
    ) -> Result<Self> {
        let tiles = (0..CacheIndex::STATIC_COUNT)
            .map(|i| {
                let index = match i {
                    0 => CacheIndex::KeyOff,
                    1 => CacheIndex::KeyOn,
                    _ => CacheIndex::KeyCue,
                };
                let mut pm = Pixmap::new(key_size.0, key_size.1)
                    .ok_or_else(|| anyhow!("invalid key size {key_size:?}"))?;
                pm.fill(index.color());
                Ok(pm)
            })
            .collect::<Result<Vec<_>>>()?;

        let keys = layout
            .symbols()
            .iter()
            .map(|s| {
                let label = s.display_label();
                KeySlot {
                    offset: (s.position.x as f32, s.position.y as f32),
                    center: (0.0, 0.0),
                    label_id: (!label.is_empty()).then(|| intern_text(label)),
                }
            })
            .collect::<Vec<_>>();
        let status_ids = StatusMessage::ALL
            .iter()
            .filter(|m| !m.text().is_empty())
            .map(|m| (*m, intern_text(m.text())))
            .collect();

        let text_size = (key_size.1 as f32 * 0.45).max(12.0);
        let drawn = vec![None; keys.len()];
        let mut renderer = SkiaRenderer {
            width,
            height,
            status_height,
            tiles,
            text_cache: font.map(|f| TextCache::new(f, text_size)),
            keys,
            status_ids,
            canvas: blank_canvas(width, height)?,
            dirty_regions: Vec::with_capacity(64),
            drawn,
            drawn_status: None,
            first_frame: true,
            component_timers: ["draw", "copy"]
                .iter()
                .map(|&k| (k, HighPrecisionTimer::new()))
                .collect(),
            clear_buffer: clear_buffer(width, height),
        };
        renderer.place_keys();
        Ok(renderer)
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) -> Result<()> {
        self.width = new_width;
        self.height = new_height;
        self.canvas = blank_canvas(new_width, new_height)?;
        self.clear_buffer = clear_buffer(new_width, new_height);
        self.place_keys();
        self.first_frame = true;
        Ok(())
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn has_labels(&self) -> bool {
        self.text_cache.is_some()
    }

    /// Timing of the named render stage (`draw` or `copy`).
    pub fn component_stats(&self, name: &str) -> Option<CalibrationStats> {
        self.component_timers.get(name).map(Timer::calibration_stats)
    }

    /// Replaces the text drawn for `message`, e.g. with run instructions.
    pub fn set_status_text(&mut self, message: StatusMessage, text: &str) {
        let id = intern_text(text);
        match self.status_ids.iter_mut().find(|(m, _)| *m == message) {
            Some(entry) => entry.1 = id,
            None => self.status_ids.push((message, id)),
        }
        if self.drawn_status == Some(message) {
            self.drawn_status = None;
        }
    }

    pub fn status_text(&self, message: StatusMessage) -> Option<Atom> {
        self.status_ids
            .iter()
            .find(|(m, _)| *m == message)
            .and_then(|(_, id)| get_text(*id))
    }

    fn place_keys(&mut self) {
        let (cx, cy) = (self.width as f32 / 2.0, self.height as f32 / 2.0);
        for key in &mut self.keys {
            key.center = (cx + key.offset.0, cy - key.offset.1);
        }
    }

    fn status_rect(&self) -> Option<Rect> {
        let h = self.status_height.min(self.height);
        Rect::from_xywh(0.0, 0.0, self.width as f32, h as f32)
    }

    fn clip(&self, rect: Rect) -> Option<(usize, usize, usize, usize)> {
        let x0 = rect.x().floor().max(0.0).min(self.width as f32) as usize;
        let y0 = rect.y().floor().max(0.0).min(self.height as f32) as usize;
        let x1 = (rect.x() + rect.width()).ceil().min(self.width as f32) as usize;
        let y1 = (rect.y() + rect.height()).ceil().min(self.height as f32) as usize;
        (x1 > x0 && y1 > y0).then_some((x0, y0, x1, y1))
    }

    fn copy_dirty_region(&self, dirty: Rect, frame_buffer: &mut [u8]) {
        let Some((x0, y0, x1, y1)) = self.clip(dirty) else {
            return;
        };
        let row_bytes = self.width as usize * 4;
        let canvas_data = self.canvas.data();
        for row in y0..y1 {
            let off = row * row_bytes + x0 * 4;
            let end = row * row_bytes + x1 * 4;
            frame_buffer[off..end].copy_from_slice(&canvas_data[off..end]);
        }
    }

    fn coalesce_dirty(rects: &mut Vec<Rect>) {
        rects.sort_by(|a, b| a.y().total_cmp(&b.y()).then(a.x().total_cmp(&b.x())));
        let mut out: Vec<Rect> = Vec::with_capacity(rects.len());
        for r in rects.drain(..) {
            if let Some(last) = out.last_mut() {
                let same_row =
                    (r.y() - last.y()).abs() < 1.0 && (r.height() - last.height()).abs() < 1.0;
                let touching = r.x() <= last.x() + last.width() + 1.0;
                if same_row && touching {
                    let nx = last.x().min(r.x());
                    let nx2 = (last.x() + last.width()).max(r.x() + r.width());
                    if let Some(merged) = Rect::from_xywh(nx, last.y(), nx2 - nx, last.height()) {
                        *last = merged;
                        continue;
                    }
                }
            }
            out.push(r);
        }
        *rects = out;
    }

    /// Draws `states` (one per key, layout order) and the status line, then
    /// copies the changed regions into `frame_buffer` (RGBA, `width * height`).
    pub fn render_frame(
        &mut self,
        states: &[VisualState],
        status: StatusMessage,
        frame_buffer: &mut [u8],
        timer: &mut HighPrecisionTimer,
    ) -> Result<FrameStats> {
        let expected = self.width as usize * self.height as usize * 4;
        if frame_buffer.len() != expected {
            bail!(
                "frame buffer holds {} bytes, {}x{} needs {}",
                frame_buffer.len(),
                self.width,
                self.height,
                expected
            );
        }
        if self.first_frame {
            self.first_frame = false;
            self.canvas.data_mut().copy_from_slice(&self.clear_buffer);
            frame_buffer.copy_from_slice(&self.clear_buffer);
            self.drawn.fill(None);
            self.drawn_status = None;
        }
        self.dirty_regions.clear();

        let t_draw = {
            let t = timer.now();
            self.render_grid(states, status)?;
            timer.elapsed(t)
        };

        let mut present = std::mem::take(&mut self.dirty_regions);
        SkiaRenderer::coalesce_dirty(&mut present);
        let t_copy = {
            let t = timer.now();
            for rect in &present {
                self.copy_dirty_region(*rect, frame_buffer);
            }
            timer.elapsed(t)
        };
        let dirty_count = present.len();
        self.dirty_regions = present;

        let total = t_draw + t_copy;
        if let Some(t) = self.component_timers.get_mut("draw") {
            t.record_frame(t_draw);
        }
        if let Some(t) = self.component_timers.get_mut("copy") {
            t.record_frame(t_copy);
        }
        timer.record_frame(total);

        Ok(FrameStats {
            draw: t_draw,
            copy: t_copy,
            total,
            dirty_count,
        })
    }
}

fn blank_canvas(width: u32, height: u32) -> Result<Pixmap> {
    let mut canvas =
        Pixmap::new(width, height).ok_or_else(|| anyhow!("invalid canvas size {width}x{height}"))?;
    canvas.fill(Color::from_rgba8(BACKGROUND[0], BACKGROUND[1], BACKGROUND[2], BACKGROUND[3]));
    Ok(canvas)
}

fn clear_buffer(width: u32, height: u32) -> Vec<u8> {
    BACKGROUND
        .iter()
        .copied()
        .cycle()
        .take(width as usize * height as usize * 4)
        .collect()
}

impl Renderer for SkiaRenderer {
    fn clear_dirty(&mut self, dirty: &[Rect]) {
        let stride = self.width as usize * 4;
        for rect in dirty {
            let Some((x0, y0, x1, y1)) = self.clip(*rect) else {
                continue;
            };
            let canvas_data = self.canvas.data_mut();
            for y in y0..y1 {
                let off = y * stride + x0 * 4;
                let end = y * stride + x1 * 4;
                canvas_data[off..end].copy_from_slice(&self.clear_buffer[off..end]);
            }
            self.dirty_regions.push(*rect);
        }
    }

    fn blit_cached(&mut self, index: usize, pos: (f32, f32)) {
        let Some(tile) = self.tiles.get(index) else {
            return;
        };
        if let Some(rect) = blit_centered(&mut self.canvas, tile, pos) {
            self.dirty_regions.push(rect);
        }
    }

    fn blit_text_by_intern_id(&mut self, intern_id: usize, pos: (f32, f32)) {
        let Some(cache) = self.text_cache.as_mut() else {
            return;
        };
        let Some(pm) = get_text(intern_id).and_then(|atom| cache.get_or_render(atom)) else {
            return;
        };
        if let Some(rect) = blit_centered(&mut self.canvas, &pm, pos) {
            self.dirty_regions.push(rect);
        }
    }
}

impl GridRenderer for SkiaRenderer {
    fn render_grid(&mut self, states: &[VisualState], status: StatusMessage) -> Result<()> {
        if states.len() != self.keys.len() {
            bail!(
                "frame has {} key states for {} keys",
                states.len(),
                self.keys.len()
            );
        }
        for (i, &state) in states.iter().enumerate() {
            if self.drawn[i] == Some(state) {
                continue;
            }
            let key = self.keys[i];
            self.blit_cached(state as usize, key.center);
            if let Some(id) = key.label_id {
                self.blit_text_by_intern_id(id, key.center);
            }
            self.drawn[i] = Some(state);
        }

        if self.drawn_status != Some(status) {
            if let Some(field) = self.status_rect() {
                self.clear_dirty(&[field]);
                let id = self
                    .status_ids
                    .iter()
                    .find(|(m, _)| *m == status)
                    .map(|(_, id)| *id);
                if let Some(id) = id {
                    let center = (
                        field.x() + field.width() / 2.0,
                        field.y() + field.height() / 2.0,
                    );
                    self.blit_text_by_intern_id(id, center);
                }
            }
            self.drawn_status = Some(status);
        }
        Ok(())
    }
}
