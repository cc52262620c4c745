//! Computational photography effects on RGB8 frames.
//!
//! # Available effects
//!
//! - **Decolorization**: contrast preserving gray conversion and colour boost
//! - **Denoising**: non-local means on the luma and chroma planes
//! - **Non photorealistic rendering**: edge preserving smoothing, detail
//!   enhancement, pencil sketch and stylization, all built on the recursive
//!   domain transform filter
//! - **White balance**: per channel percentile stretching

mod decolor;
pub use decolor::*;

mod denoise;
pub use denoise::*;

mod domain_transform;
pub use domain_transform::*;

mod npr;
pub use npr::*;

mod white_balance;
pub use white_balance::*;
