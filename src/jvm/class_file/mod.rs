mod attribute;
mod binary_format;
mod class;
mod constants;
mod version;

pub use attribute::*;
pub use binary_format::*;
pub use class::*;
pub use constants::*;
pub use version::*;
