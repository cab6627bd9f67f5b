//! Structural events describing a class file
//!
//! A class is read as a stream of events: first the header, then fields and methods (a method's
//! body shows up as [`ClassEvent::Code`] events between [`ClassEvent::Method`] and
//! [`ClassEvent::MethodEnd`]), then class attributes, and finally [`ClassEvent::End`]. Every
//! stage of a pipeline (the reader's target, a transformation, the writer) is a [`ClassVisitor`],
//! and stages compose by wrapping the next stage.
//!
//! Inside a method body, all positions are expressed with [`Label`]s. A label event marks the
//! position of the next instruction, and so does a frame event.

use crate::jvm::class_file::{Attribute, ConstantsPool, Field, Version};
use crate::jvm::code::{BranchInstruction, CodeTypeAnnotation, Instruction, Label};
use crate::jvm::{
    BinaryName, ClassAccessFlags, ClassConstantIndex, Error, Frame, MethodAccessFlags,
    MethodDescriptor, Name, ParseDescriptor, UnqualifiedName, Utf8ConstantIndex,
    VerificationType,
};

/// Stack map frame in the event stream: classes are internal names (or array descriptors) and
/// uninitialized values point at the label of their `new` instruction
pub type LabelledFrame = Frame<String, Label>;

/// Verification type as found in a [`LabelledFrame`]
pub type LabelledVerificationType = VerificationType<String, Label>;

/// Receiver of class events
pub trait ClassVisitor {
    fn visit(&mut self, event: ClassEvent) -> Result<(), Error>;
}

/// Recording visitor, mostly useful for tests and debugging
impl ClassVisitor for Vec<ClassEvent> {
    fn visit(&mut self, event: ClassEvent) -> Result<(), Error> {
        self.push(event);
        Ok(())
    }
}

impl<V: ClassVisitor + ?Sized> ClassVisitor for &mut V {
    fn visit(&mut self, event: ClassEvent) -> Result<(), Error> {
        (**self).visit(event)
    }
}

#[derive(Clone, Debug)]
pub enum ClassEvent {
    Header(ClassHeader),

    /// Fields are passed along untouched
    Field(Field),

    /// Start of a method (followed by its code, if it has any, then by `MethodEnd`)
    Method(MethodHeader),
    Code(CodeEvent),
    MethodEnd,

    /// Class level attribute
    Attribute(Attribute),
    End,
}

/// Everything in a class file that comes before the fields
#[derive(Clone, Debug)]
pub struct ClassHeader {
    pub version: Version,

    /// Constant pool of the class being read
    ///
    /// Every constant index in later events points into this pool. Writers start from it and
    /// only ever append to it.
    pub constants: ConstantsPool,
    pub access_flags: ClassAccessFlags,
    pub this_class: ClassConstantIndex,
    pub name: BinaryName,
    pub super_class: ClassConstantIndex,
    pub interfaces: Vec<ClassConstantIndex>,
}

impl ClassHeader {
    /// Header of a fresh public class with an otherwise empty constant pool
    pub fn new(name: BinaryName, super_name: &BinaryName) -> Result<ClassHeader, Error> {
        let mut constants = ConstantsPool::new();
        let this_class = constants.get_class(name.as_str())?;
        let super_class = constants.get_class(super_name.as_str())?;
        Ok(ClassHeader {
            version: Version::JAVA8,
            constants,
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            this_class,
            name,
            super_class,
            interfaces: vec![],
        })
    }
}

/// Declaration of a method
#[derive(Clone, Debug)]
pub struct MethodHeader {
    pub access_flags: MethodAccessFlags,
    pub name: UnqualifiedName,
    pub name_index: Utf8ConstantIndex,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub descriptor_index: Utf8ConstantIndex,

    /// Method attributes, except for `Code` (which is described by the code events)
    pub attributes: Vec<Attribute>,
}

impl MethodHeader {
    /// Declare a method, adding its name and descriptor to the constant pool
    pub fn new(
        constants: &mut ConstantsPool,
        access_flags: MethodAccessFlags,
        name: UnqualifiedName,
        descriptor: &str,
    ) -> Result<MethodHeader, Error> {
        let parsed = MethodDescriptor::parse(descriptor)
            .map_err(|_| Error::MalformedDescriptor(descriptor.to_owned()))?;
        Ok(MethodHeader {
            access_flags,
            name_index: constants.get_utf8(name.as_str())?,
            name,
            descriptor: parsed,
            descriptor_index: constants.get_utf8(descriptor)?,
            attributes: vec![],
        })
    }
}

/// Events inside a method body
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CodeEvent {
    /// Always the first event of a method body
    Start(CodeHeader),

    /// Place a label at the current position
    Label(Label),

    LineNumber { line: u16, start: Label },
    Instruction(Instruction),
    Branch(BranchInstruction<Label>),

    /// Stack map frame at the current position
    Frame(LabelledFrame),

    /// Exception handler covering `[start, end)`, catching anything if `catch_type` is `None`
    TryCatch {
        start: Label,
        end: Label,
        handler: Label,
        catch_type: Option<ClassConstantIndex>,
    },

    LocalVariable(LocalVariable),

    /// Entry of the `LocalVariableTypeTable` (the descriptor is a generic signature)
    LocalVariableType(LocalVariable),
    TypeAnnotation(CodeTypeAnnotation<Label>),

    /// Attribute on `Code` that is not otherwise understood
    Attribute(Attribute),

    /// Always the last event of a method body
    Maxs { max_stack: u16, max_locals: u16 },
}

/// Declared limits of a method body, as they were before any rewriting
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodeHeader {
    pub max_stack: u16,
    pub max_locals: u16,
}

/// Debug information about a local variable live over `[start, end)`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalVariable {
    pub name: Utf8ConstantIndex,
    pub descriptor: Utf8ConstantIndex,
    pub start: Label,
    pub end: Label,
    pub index: u16,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::FieldType;

    #[test]
    fn method_header_interns_names() {
        let name = BinaryName::from_string(String::from("me/Foo")).unwrap();
        let mut header = ClassHeader::new(name, &BinaryName::OBJECT).unwrap();
        let method = MethodHeader::new(
            &mut header.constants,
            MethodAccessFlags::PUBLIC,
            UnqualifiedName::from_string(String::from("run")).unwrap(),
            "(JLjava/lang/String;)I",
        )
        .unwrap();
        assert_eq!(header.constants.utf8(method.name_index).unwrap(), "run");
        assert_eq!(
            header.constants.utf8(method.descriptor_index).unwrap(),
            "(JLjava/lang/String;)I"
        );
        assert_eq!(
            method.descriptor.parameters,
            vec![FieldType::long(), FieldType::object(BinaryName::STRING)]
        );
        assert_eq!(method.descriptor.return_type, Some(FieldType::int()));
    }

    #[test]
    fn malformed_method_descriptor() {
        let mut constants = ConstantsPool::new();
        let result = MethodHeader::new(
            &mut constants,
            MethodAccessFlags::STATIC,
            UnqualifiedName::from_string(String::from("bad")).unwrap(),
            "(Q)V",
        );
        assert!(matches!(result, Err(Error::MalformedDescriptor(_))));
    }

    #[test]
    fn recording_through_a_reference() {
        fn feed(mut visitor: impl ClassVisitor) -> Result<(), Error> {
            visitor.visit(ClassEvent::MethodEnd)?;
            visitor.visit(ClassEvent::End)
        }

        let mut events: Vec<ClassEvent> = vec![];
        feed(&mut events).unwrap();
        assert!(matches!(
            events.as_slice(),
            [ClassEvent::MethodEnd, ClassEvent::End]
        ));
    }
}
