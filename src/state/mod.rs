/// State management module
///
/// This module handles all gallery state, including:
/// - Shared data structures (data.rs)
/// - The local record collection and filtered views (store.rs)
/// - Upload form template and progress (batch.rs)
/// - Multi-item selection and bulk download (selection.rs)
/// - Lightbox state machine and gestures (lightbox.rs)
/// - Guards for results that arrive late (liveness.rs)

pub mod batch;
pub mod data;
pub mod lightbox;
pub mod liveness;
pub mod selection;
pub mod store;
