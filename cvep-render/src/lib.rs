mod render;

pub use render::{
    FrameStats, GridRenderer, Renderer, Rgba, SkiaRenderer, find_font, load_font,
    render_text_pixmap,
};
