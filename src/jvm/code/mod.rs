//! Method bodies: instructions, labels, and the metadata that points into code

mod annotations;
mod decode;
mod instructions;
mod label;

pub use annotations::*;
pub use decode::*;
pub use instructions::*;
pub use label::*;
