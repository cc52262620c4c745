/// Kernel (structuring element) utilities.
pub mod kernel;
pub use kernel::{Kernel, KernelShape};

mod ops;
pub use ops::{dilate, erode, hit_or_miss, morphology_ex, MorphOp};
