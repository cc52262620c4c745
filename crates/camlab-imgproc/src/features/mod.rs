//! Feature detection, description and model fitting.
//!
//! # Available tools
//!
//! - **Harris**: corner response and corner selection
//! - **Hough**: standard line transform and gradient circle transform
//! - **Patch descriptors**: normalised intensity patches with mutual matching
//! - **Homography**: normalised DLT and seeded RANSAC

mod harris;
pub use harris::*;

mod hough;
pub use hough::*;

mod descriptor;
pub use descriptor::*;

mod homography;
pub use homography::*;
