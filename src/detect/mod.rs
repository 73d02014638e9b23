mod backend;
mod backends;
mod labels;
mod result;
pub mod yolo;

pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use labels::{coco_label, PERSON_CLASS_ID};
pub use result::{count_class, BoundingBox, Detection};
