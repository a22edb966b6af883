//! Civic Chat: an embeddable chat widget and the pipeline that ships it.
//!
//! [`widget`] holds the runtime (configuration layering, consent gating,
//! message flow) behind an injected [`widget::RenderSurface`]. [`build`] turns
//! the browser assets under `assets/` into minified, SRI-pinned files for a CDN.

pub mod build;
pub mod config;
pub mod preview;
pub mod widget;

pub use config::BuildConfig;
