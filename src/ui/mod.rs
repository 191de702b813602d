/// iced adapters for the gallery shell
///
/// - Thumbnail grid (grid.rs)
/// - Touch/mouse gesture layer for the lightbox (canvas.rs)

pub mod canvas;
pub mod grid;
