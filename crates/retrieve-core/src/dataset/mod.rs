//! Dataset access: locating images, validating and decoding them, and
//! writing augmented training copies.

pub mod augment;
mod decode;
mod discovery;
mod validate;

pub use augment::{AugmentFamily, AugmentReport, Augmenter};
pub use decode::{DecodedImage, ImageDecoder};
pub use discovery::{DatasetLayout, FileDiscovery, ImageSet, LabeledImage, Split};
pub use validate::Validator;
