mod gray;
pub use gray::*;

mod ycrcb;
pub use ycrcb::*;
