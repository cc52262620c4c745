#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use camlab_image as image;

#[doc(inline)]
pub use camlab_imgproc as imgproc;

#[doc(inline)]
pub use camlab_io as io;

#[doc(inline)]
pub use camlab_pipeline as pipeline;

#[doc(inline)]
pub use camlab_qr as qr;
