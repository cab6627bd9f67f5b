//! Inject a fresh local variable into every method body of a class
//!
//! Each method with code gets one new `int` local, initialized to `-1` before anything else in the
//! method runs. Where that local goes is picked by [`SlotStrategy`]:
//!
//!   * [`SlotStrategy::Prepend`] puts it right after the receiver and parameters. Every other
//!     local moves up to make room, and stack map frames get rewritten to match.
//!
//!   * [`SlotStrategy::Append`] puts it past every slot the method declares, so the original code
//!     is left as is.
//!
//! Rewriting the output again injects another local (and, with `Prepend`, shifts the locals once
//! more).

mod append;
mod classify;
mod controller;
mod driver;
mod prepend;
mod settings;
mod slots;

pub use append::*;
pub use classify::*;
pub use controller::*;
pub use driver::*;
pub use prepend::*;
pub use settings::*;
pub use slots::*;

use crate::jvm::{ClassReader, ClassWriter, Error};

/// Read a class, rewrite every method body in it, and write it back out
///
/// Fails on the first problem, without producing any partial output.
pub fn rewrite_class(bytes: &[u8], settings: &Settings) -> Result<Vec<u8>, Error> {
    let reader = ClassReader::new(bytes)?;
    let class_name = reader.class_name()?;
    log::debug!("Rewriting class {}", class_name);
    let mut controller = ClassRewriteController::new(ClassWriter::new(), settings.clone());
    reader.accept(&mut controller)?;
    controller.into_inner().into_bytes()
}
