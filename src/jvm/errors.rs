use super::class_file::{ConstantIndex, ConstantPoolOverflow};
use super::code::Label;
use crate::util::Offset;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),

    /// The input bytes are not a well-formed class file
    Decode(DecodeErrorKind),

    ConstantPoolOverflow(ConstantPoolOverflow),

    /// A descriptor in the constant pool could not be parsed
    MalformedDescriptor(String),

    /// Code array is longer than the 65535 bytes allowed by the format
    MethodCodeOverflow(Offset),

    /// A conditional branch target is too far away to be encoded in a signed 16-bit offset
    BranchOffsetOverflow { from: Offset, to: Offset },

    /// A label was referenced but never placed in the code
    UnplacedLabel(Label),

    /// A label was placed twice
    DuplicateLabel(Label),

    /// A particular offset has two frames
    ConflictingFrames(Offset),

    /// A local variable index does not fit in the `u16` used by the format
    LocalsOverflow(u32),

    /// A stack map frame cannot be carried across the slot insertion
    UnsupportedFrame(FrameErrorKind),

    /// An event arrived where the event stream does not allow it (indicates a bug upstream)
    UnexpectedEvent(&'static str),

    /// Failure while rewriting a particular method
    InMethod { method: String, error: Box<Error> },
}

#[derive(Debug)]
pub enum DecodeErrorKind {
    Truncated,
    BadMagic(u32),
    BadConstantTag(u8),
    BadConstantIndex(ConstantIndex),
    WrongConstantType(ConstantIndex, &'static str),
    MalformedUtf8,
    UnknownOpcode(u8),
    BadWideOpcode(u8),
    BadArrayType(u8),
    BadHandleKind(u8),

    /// An offset that does not land on an instruction boundary
    InvalidCodeOffset(usize),

    /// A `tableswitch` or `lookupswitch` at this offset has an impossible number of targets
    MalformedSwitch(usize),

    BadFrameType(u8),
    BadVerificationType(u8),
    BadTypeAnnotationTarget(u8),
    BadElementValueTag(u8),

    /// An attribute body had bytes left over after decoding
    TrailingBytes(&'static str),
}

#[derive(Debug)]
pub enum FrameErrorKind {
    /// A chop frame removes more locals than the previous frame had
    ChopUnderflow { chopped: u8, available: usize },

    /// A two-slot local starts just below the insertion point and would be split by it
    StraddlingLocal { slot: usize },

    /// A compact frame after the first one would change meaning once slots are inserted
    CompactFrameAcrossBoundary,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Decode(DecodeErrorKind::Truncated)
        } else {
            Error::IoError(err)
        }
    }
}

impl From<ConstantPoolOverflow> for Error {
    fn from(overflow: ConstantPoolOverflow) -> Error {
        Error::ConstantPoolOverflow(overflow)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IoError(err) => write!(f, "I/O error: {}", err),
            Error::Decode(kind) => write!(f, "malformed class file: {:?}", kind),
            Error::ConstantPoolOverflow(overflow) => {
                write!(f, "constant pool is full at index {}", overflow.offset)
            }
            Error::MalformedDescriptor(desc) => write!(f, "malformed descriptor '{}'", desc),
            Error::MethodCodeOverflow(len) => write!(f, "method code is too long ({})", len.0),
            Error::BranchOffsetOverflow { from, to } => {
                write!(f, "branch from {} to {} does not fit in 16 bits", from.0, to.0)
            }
            Error::UnplacedLabel(label) => write!(f, "label {:?} was never placed", label),
            Error::DuplicateLabel(label) => write!(f, "label {:?} was placed twice", label),
            Error::ConflictingFrames(offset) => {
                write!(f, "more than one stack map frame at offset {}", offset.0)
            }
            Error::LocalsOverflow(slot) => write!(f, "local variable index {} overflows", slot),
            Error::UnsupportedFrame(kind) => {
                write!(f, "cannot rewrite stack map frame: {:?}", kind)
            }
            Error::UnexpectedEvent(what) => write!(f, "unexpected event: {}", what),
            Error::InMethod { method, error } => write!(f, "in method {}: {}", method, error),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            Error::InMethod { error, .. } => Some(error.as_ref()),
            _ => None,
        }
    }
}
