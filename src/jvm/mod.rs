//! Read, transform, and write JVM classes
//!
//! ### Simple example
//!
//! Classes are handled as a stream of events. A [`ClassReader`] turns class file bytes into
//! events, a [`ClassWriter`] turns events back into bytes, and anything implementing
//! [`ClassVisitor`] can sit in between. Here is a class with one static method being put together
//! from events, read back, and inspected:
//!
//! ```
//! use slot_rewriter::jvm::code::{BranchInstruction, Instruction, LocalKind};
//! use slot_rewriter::jvm::*;
//!
//! # fn generate_class() -> Result<(), Error> {
//! let name = BinaryName::from_string(String::from("me/alec/Identity")).unwrap();
//! let mut header = ClassHeader::new(name, &BinaryName::OBJECT)?;
//! let method = MethodHeader::new(
//!     &mut header.constants,
//!     MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
//!     UnqualifiedName::from_string(String::from("identity")).unwrap(),
//!     "(I)I",
//! )?;
//!
//! let mut writer = ClassWriter::new();
//! writer.visit(ClassEvent::Header(header))?;
//! writer.visit(ClassEvent::Method(method))?;
//! for event in vec![
//!     CodeEvent::Start(CodeHeader { max_stack: 1, max_locals: 1 }),
//!     CodeEvent::Instruction(Instruction::Load(LocalKind::Int, 0)),
//!     CodeEvent::Branch(BranchInstruction::IReturn),
//!     CodeEvent::Maxs { max_stack: 1, max_locals: 1 },
//! ] {
//!     writer.visit(ClassEvent::Code(event))?;
//! }
//! writer.visit(ClassEvent::MethodEnd)?;
//! writer.visit(ClassEvent::End)?;
//! let class_bytes: Vec<u8> = writer.into_bytes()?;
//!
//! // Read the class back, recording the events
//! let mut events: Vec<ClassEvent> = vec![];
//! ClassReader::new(&class_bytes)?.accept(&mut events)?;
//! assert!(events.iter().any(|event| matches!(
//!     event,
//!     ClassEvent::Code(CodeEvent::Instruction(Instruction::Load(LocalKind::Int, 0)))
//! )));
//! # Ok(())
//! # }
//! # generate_class().unwrap();
//! ```

mod access_flags;
pub mod class_file;
pub mod code;
mod descriptors;
mod errors;
mod events;
mod frame;
mod names;
mod reader;
mod writer;

pub use access_flags::*;
pub use class_file::{
    ClassConstantIndex, ConstantIndex, FieldRefConstantIndex, InvokeDynamicConstantIndex,
    MethodRefConstantIndex, NameAndTypeConstantIndex, Utf8ConstantIndex,
};
pub use descriptors::*;
pub use errors::*;
pub use events::*;
pub use frame::*;
pub use names::*;
pub use reader::*;
pub use writer::*;
