//! Rewrite compiled JVM classes so that every method body gets an extra local variable
//!
//! The [`jvm`] module reads and writes class files as streams of events, and the [`rewrite`]
//! module sits between the two, shifting local variable slots and fixing up stack map frames.

pub mod jvm;
pub mod rewrite;
mod util;
