mod replay;
mod result;
mod source;

pub use replay::ReplaySource;
pub use result::{Detection, DetectionFrame};
pub use source::DetectionSource;
