//! This module contains the AST of JVM bytecode. The representation is slightly different from
//! the usual presentation to make it more convenient to rewrite bytecode. For instance:
//!
//!   - The "wide" instruction doesn't show up at all, but instead gets merged into the
//!     instructions it is allowed to modify
//!
//!   - Instructions that touch local variables get abstracted into one instruction with a field.
//!     This way, remapping local variable slots is one pattern match instead of dozens.
//!
//!   - `goto_w` and `jsr_w` are folded into `goto` and `jsr`. Which encoding gets used is decided
//!     when the code is laid out, since that is the only point at which jump distances are known.
//!

use crate::jvm::class_file::Serialize;
use crate::jvm::{
    BaseType, ClassConstantIndex, ConstantIndex, FieldRefConstantIndex,
    InvokeDynamicConstantIndex, MethodRefConstantIndex,
};
use byteorder::WriteBytesExt;
use std::convert::TryFrom;
use std::io::Result;
use std::ops::Not;

macro_rules! simple_ops {
    ($($name:ident = $opcode:literal,)*) => {
        /// Instructions without any operands (other than those on the stack) and which cannot
        /// branch
        #[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
        pub enum SimpleOp {
            $($name,)*
        }

        impl SimpleOp {
            pub const fn opcode(self) -> u8 {
                match self {
                    $(SimpleOp::$name => $opcode,)*
                }
            }

            pub const fn from_opcode(opcode: u8) -> Option<SimpleOp> {
                match opcode {
                    $($opcode => Some(SimpleOp::$name),)*
                    _ => None,
                }
            }
        }
    };
}

simple_ops! {
    Nop = 0x00,
    AConstNull = 0x01,
    IConstM1 = 0x02,
    IConst0 = 0x03,
    IConst1 = 0x04,
    IConst2 = 0x05,
    IConst3 = 0x06,
    IConst4 = 0x07,
    IConst5 = 0x08,
    LConst0 = 0x09,
    LConst1 = 0x0a,
    FConst0 = 0x0b,
    FConst1 = 0x0c,
    FConst2 = 0x0d,
    DConst0 = 0x0e,
    DConst1 = 0x0f,
    IALoad = 0x2e,
    LALoad = 0x2f,
    FALoad = 0x30,
    DALoad = 0x31,
    AALoad = 0x32,
    BALoad = 0x33,
    CALoad = 0x34,
    SALoad = 0x35,
    IAStore = 0x4f,
    LAStore = 0x50,
    FAStore = 0x51,
    DAStore = 0x52,
    AAStore = 0x53,
    BAStore = 0x54,
    CAStore = 0x55,
    SAStore = 0x56,
    Pop = 0x57,
    Pop2 = 0x58,
    Dup = 0x59,
    DupX1 = 0x5a,
    DupX2 = 0x5b,
    Dup2 = 0x5c,
    Dup2X1 = 0x5d,
    Dup2X2 = 0x5e,
    Swap = 0x5f,
    IAdd = 0x60,
    LAdd = 0x61,
    FAdd = 0x62,
    DAdd = 0x63,
    ISub = 0x64,
    LSub = 0x65,
    FSub = 0x66,
    DSub = 0x67,
    IMul = 0x68,
    LMul = 0x69,
    FMul = 0x6a,
    DMul = 0x6b,
    IDiv = 0x6c,
    LDiv = 0x6d,
    FDiv = 0x6e,
    DDiv = 0x6f,
    IRem = 0x70,
    LRem = 0x71,
    FRem = 0x72,
    DRem = 0x73,
    INeg = 0x74,
    LNeg = 0x75,
    FNeg = 0x76,
    DNeg = 0x77,
    IShl = 0x78,
    LShl = 0x79,
    IShr = 0x7a,
    LShr = 0x7b,
    IUShr = 0x7c,
    LUShr = 0x7d,
    IAnd = 0x7e,
    LAnd = 0x7f,
    IOr = 0x80,
    LOr = 0x81,
    IXor = 0x82,
    LXor = 0x83,
    I2L = 0x85,
    I2F = 0x86,
    I2D = 0x87,
    L2I = 0x88,
    L2F = 0x89,
    L2D = 0x8a,
    F2I = 0x8b,
    F2L = 0x8c,
    F2D = 0x8d,
    D2I = 0x8e,
    D2L = 0x8f,
    D2F = 0x90,
    I2B = 0x91,
    I2C = 0x92,
    I2S = 0x93,
    LCmp = 0x94,
    FCmpL = 0x95,
    FCmpG = 0x96,
    DCmpL = 0x97,
    DCmpG = 0x98,
    ArrayLength = 0xbe,
    MonitorEnter = 0xc2,
    MonitorExit = 0xc3,
}

/// Type of value moved in or out of a local variable
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum LocalKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl LocalKind {
    /// Position in the `iload`, `lload`, `fload`, `dload`, `aload` opcode ordering
    const fn ordinal(self) -> u8 {
        match self {
            LocalKind::Int => 0,
            LocalKind::Long => 1,
            LocalKind::Float => 2,
            LocalKind::Double => 3,
            LocalKind::Reference => 4,
        }
    }

    pub(crate) const fn from_ordinal(ordinal: u8) -> Option<LocalKind> {
        match ordinal {
            0 => Some(LocalKind::Int),
            1 => Some(LocalKind::Long),
            2 => Some(LocalKind::Float),
            3 => Some(LocalKind::Double),
            4 => Some(LocalKind::Reference),
            _ => None,
        }
    }

    pub const fn load_opcode(self) -> u8 {
        0x15 + self.ordinal()
    }

    pub const fn store_opcode(self) -> u8 {
        0x36 + self.ordinal()
    }

    /// Opcode of `<x>load_0` (the next three opcodes are for slots 1-3)
    const fn short_load_opcode(self) -> u8 {
        0x1a + 4 * self.ordinal()
    }

    /// Opcode of `<x>store_0` (the next three opcodes are for slots 1-3)
    const fn short_store_opcode(self) -> u8 {
        0x3b + 4 * self.ordinal()
    }
}

/// Non-branching JVM bytecode instruction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Simple(SimpleOp),
    BiPush(i8),
    SiPush(i16),
    Ldc(ConstantIndex), // covers both `ldc` and `ldc_w`
    Ldc2(ConstantIndex),
    Load(LocalKind, u16), // covers `iload`, `iload_<n>`, and `wide iload` (and other kinds)
    Store(LocalKind, u16), // covers `istore`, `istore_<n>`, and `wide istore` (and other kinds)
    IInc(u16, i16),        // covers `iinc` and `wide iinc`
    Ret(u16),              // covers `ret` and `wide ret`
    GetStatic(FieldRefConstantIndex),
    PutStatic(FieldRefConstantIndex),
    GetField(FieldRefConstantIndex),
    PutField(FieldRefConstantIndex),
    Invoke(InvokeType, MethodRefConstantIndex),
    InvokeDynamic(InvokeDynamicConstantIndex),
    New(ClassConstantIndex),
    NewArray(BaseType),
    ANewArray(ClassConstantIndex),
    CheckCast(ClassConstantIndex),
    InstanceOf(ClassConstantIndex),
    MultiANewArray(ClassConstantIndex, u8),
}

impl Instruction {
    /// Local variable slot read or written by the instruction, if any
    pub fn local_slot(&self) -> Option<u16> {
        match self {
            Instruction::Load(_, slot)
            | Instruction::Store(_, slot)
            | Instruction::IInc(slot, _)
            | Instruction::Ret(slot) => Some(*slot),
            _ => None,
        }
    }

    /// Replace the local variable slot (no-op for instructions without one)
    pub fn map_local_slot<E>(
        self,
        map_slot: impl FnOnce(u16) -> std::result::Result<u16, E>,
    ) -> std::result::Result<Instruction, E> {
        Ok(match self {
            Instruction::Load(kind, slot) => Instruction::Load(kind, map_slot(slot)?),
            Instruction::Store(kind, slot) => Instruction::Store(kind, map_slot(slot)?),
            Instruction::IInc(slot, by) => Instruction::IInc(map_slot(slot)?, by),
            Instruction::Ret(slot) => Instruction::Ret(map_slot(slot)?),
            other => other,
        })
    }

    /// Number of bytes the instruction takes up in the code array
    pub fn width(&self) -> usize {
        match self {
            Instruction::Simple(_) => 1,
            Instruction::Load(_, 0..=3) | Instruction::Store(_, 0..=3) => 1,

            Instruction::BiPush(_)
            | Instruction::NewArray(_)
            | Instruction::Ldc(ConstantIndex(0..=255))
            | Instruction::Load(_, 4..=255)
            | Instruction::Store(_, 4..=255)
            | Instruction::Ret(0..=255) => 2,

            Instruction::SiPush(_)
            | Instruction::Ldc(_)
            | Instruction::Ldc2(_) // always wide, unlike `ldc` vs. `ldc_w`
            | Instruction::IInc(0..=255, -128..=127)
            | Instruction::GetStatic(_)
            | Instruction::PutStatic(_)
            | Instruction::GetField(_)
            | Instruction::PutField(_)
            | Instruction::Invoke(InvokeType::Special, _)
            | Instruction::Invoke(InvokeType::Static, _)
            | Instruction::Invoke(InvokeType::Virtual, _)
            | Instruction::New(_)
            | Instruction::ANewArray(_)
            | Instruction::CheckCast(_)
            | Instruction::InstanceOf(_) => 3,

            Instruction::Load(_, _) | Instruction::Store(_, _) | Instruction::Ret(_) => 4,

            Instruction::MultiANewArray(_, _) => 4,

            Instruction::Invoke(InvokeType::Interface(_), _) | Instruction::InvokeDynamic(_) => 5,

            Instruction::IInc(_, _) => 6,
        }
    }
}

impl Serialize for Instruction {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        /* The load/store instructions follow the same pattern:
         *
         *   - short form (0-3) have special bytes
         *   - normal form (0-255) use `iload` plus a byte operand
         *   - wide form (255-65535) use `wide iload` plus two byte operands
         */
        fn serialize_local<W: WriteBytesExt>(
            idx: u16,
            short_form_start: Option<u8>,
            normal_form: u8,
            writer: &mut W,
        ) -> Result<()> {
            match (u8::try_from(idx), short_form_start) {
                (Ok(n @ 0..=3), Some(short_form_start)) => (short_form_start + n).serialize(writer),
                (Ok(n), _) => {
                    normal_form.serialize(writer)?;
                    n.serialize(writer)
                }
                (Err(_), _) => {
                    0xC4u8.serialize(writer)?;
                    normal_form.serialize(writer)?;
                    idx.serialize(writer)
                }
            }
        }

        match self {
            Instruction::Simple(op) => op.opcode().serialize(writer)?,
            Instruction::BiPush(b) => {
                0x10u8.serialize(writer)?;
                b.serialize(writer)?;
            }
            Instruction::SiPush(s) => {
                0x11u8.serialize(writer)?;
                s.serialize(writer)?;
            }
            Instruction::Ldc(ConstantIndex(idx)) => match u8::try_from(*idx) {
                Ok(b) => {
                    0x12u8.serialize(writer)?;
                    b.serialize(writer)?;
                }
                Err(_) => {
                    0x13u8.serialize(writer)?;
                    idx.serialize(writer)?;
                }
            },
            Instruction::Ldc2(idx) => {
                0x14u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::Load(kind, idx) => serialize_local(
                *idx,
                Some(kind.short_load_opcode()),
                kind.load_opcode(),
                writer,
            )?,
            Instruction::Store(kind, idx) => serialize_local(
                *idx,
                Some(kind.short_store_opcode()),
                kind.store_opcode(),
                writer,
            )?,
            Instruction::Ret(idx) => serialize_local(*idx, None, 0xa9, writer)?,
            Instruction::IInc(idx, diff) => match (u8::try_from(*idx), i8::try_from(*diff)) {
                (Ok(b), Ok(d)) => {
                    0x84u8.serialize(writer)?;
                    b.serialize(writer)?;
                    d.serialize(writer)?;
                }
                _ => {
                    0xc4u8.serialize(writer)?;
                    0x84u8.serialize(writer)?;
                    idx.serialize(writer)?;
                    diff.serialize(writer)?;
                }
            },
            Instruction::GetStatic(idx) => {
                0xb2u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::PutStatic(idx) => {
                0xb3u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::GetField(idx) => {
                0xb4u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::PutField(idx) => {
                0xb5u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::Invoke(InvokeType::Virtual, idx) => {
                0xb6u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::Invoke(InvokeType::Special, idx) => {
                0xb7u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::Invoke(InvokeType::Static, idx) => {
                0xb8u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::Invoke(InvokeType::Interface(cnt), idx) => {
                0xb9u8.serialize(writer)?;
                idx.serialize(writer)?;
                cnt.serialize(writer)?;
                0u8.serialize(writer)?;
            }
            Instruction::InvokeDynamic(idx) => {
                0xbau8.serialize(writer)?;
                idx.serialize(writer)?;
                0u16.serialize(writer)?;
            }
            Instruction::New(idx) => {
                0xbbu8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::NewArray(basetype) => {
                0xbcu8.serialize(writer)?;
                basetype.array_type_code().serialize(writer)?;
            }
            Instruction::ANewArray(idx) => {
                0xbdu8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::CheckCast(idx) => {
                0xc0u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::InstanceOf(idx) => {
                0xc1u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::MultiANewArray(idx, dimensions) => {
                0xc5u8.serialize(writer)?;
                idx.serialize(writer)?;
                dimensions.serialize(writer)?;
            }
        }
        Ok(())
    }
}

/// Branching JVM bytecode instruction
///
/// The type parameter abstracts over the representation of jump targets: labels while the code is
/// being read or rewritten, absolute bytecode offsets right after decoding, and relative offsets
/// when encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BranchInstruction<Lbl> {
    If(OrdComparison, Lbl), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, Lbl), // covers `if_icmpeq`, `if_icmpne`, `if_icmplt`, ... `if_icmple`
    IfACmp(EqComparison, Lbl), // covers `if_acmpeq`, `if_acmpne`
    IfNull(EqComparison, Lbl), // covers `ifnull`, `ifnonnull`
    Goto(Lbl),                 // covers `goto` and `goto_w`
    Jsr(Lbl),                  // covers `jsr` and `jsr_w`
    TableSwitch {
        /// Jump target if the argument is less than `low` or greater than
        /// `low + targets.len()`
        default: Lbl,

        /// Value associated with the first jump target
        low: i32,

        /// Jump targets
        targets: Vec<Lbl>,
    },
    LookupSwitch {
        /// Jump target if there is no corresponding key
        default: Lbl,

        /// Jump targets (sorted so that the keys are ascending)
        targets: Vec<(i32, Lbl)>,
    },
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    AThrow,
}

impl<Lbl> BranchInstruction<Lbl> {
    /// All of the labels the instruction may jump to
    pub fn jump_targets(&self) -> Vec<&Lbl> {
        match self {
            BranchInstruction::If(_, lbl)
            | BranchInstruction::IfICmp(_, lbl)
            | BranchInstruction::IfACmp(_, lbl)
            | BranchInstruction::IfNull(_, lbl)
            | BranchInstruction::Goto(lbl)
            | BranchInstruction::Jsr(lbl) => vec![lbl],
            BranchInstruction::TableSwitch {
                default, targets, ..
            } => std::iter::once(default).chain(targets.iter()).collect(),
            BranchInstruction::LookupSwitch { default, targets } => std::iter::once(default)
                .chain(targets.iter().map(|(_, target)| target))
                .collect(),
            BranchInstruction::IReturn
            | BranchInstruction::LReturn
            | BranchInstruction::FReturn
            | BranchInstruction::DReturn
            | BranchInstruction::AReturn
            | BranchInstruction::Return
            | BranchInstruction::AThrow => vec![],
        }
    }

    /// Is the jump one that has a 32-bit `_w` variant?
    pub fn has_wide_form(&self) -> bool {
        matches!(self, BranchInstruction::Goto(_) | BranchInstruction::Jsr(_))
    }

    pub fn map_labels<Lbl2, E>(
        &self,
        mut map_label: impl FnMut(&Lbl) -> std::result::Result<Lbl2, E>,
    ) -> std::result::Result<BranchInstruction<Lbl2>, E> {
        use BranchInstruction::*;

        Ok(match self {
            If(op, lbl) => If(*op, map_label(lbl)?),
            IfICmp(op, lbl) => IfICmp(*op, map_label(lbl)?),
            IfACmp(op, lbl) => IfACmp(*op, map_label(lbl)?),
            IfNull(op, lbl) => IfNull(*op, map_label(lbl)?),
            Goto(lbl) => Goto(map_label(lbl)?),
            Jsr(lbl) => Jsr(map_label(lbl)?),
            TableSwitch {
                default,
                low,
                targets,
            } => TableSwitch {
                default: map_label(default)?,
                low: *low,
                targets: targets
                    .iter()
                    .map(&mut map_label)
                    .collect::<std::result::Result<_, E>>()?,
            },
            LookupSwitch { default, targets } => LookupSwitch {
                default: map_label(default)?,
                targets: targets
                    .iter()
                    .map(|(key, lbl)| -> std::result::Result<(i32, Lbl2), E> {
                        Ok((*key, map_label(lbl)?))
                    })
                    .collect::<std::result::Result<_, E>>()?,
            },
            IReturn => IReturn,
            LReturn => LReturn,
            FReturn => FReturn,
            DReturn => DReturn,
            AReturn => AReturn,
            Return => Return,
            AThrow => AThrow,
        })
    }

    /// Number of bytes the instruction takes up when it starts at `offset`
    ///
    /// Switches are padded so that their operands start at a multiple of four bytes from the
    /// start of the method. `wide` selects `goto_w`/`jsr_w` and is ignored by other jumps.
    pub fn width_at(&self, offset: usize, wide: bool) -> usize {
        match self {
            BranchInstruction::IReturn
            | BranchInstruction::LReturn
            | BranchInstruction::FReturn
            | BranchInstruction::DReturn
            | BranchInstruction::AReturn
            | BranchInstruction::Return
            | BranchInstruction::AThrow => 1,

            BranchInstruction::Goto(_) | BranchInstruction::Jsr(_) if wide => 5,

            BranchInstruction::Goto(_)
            | BranchInstruction::Jsr(_)
            | BranchInstruction::If(_, _)
            | BranchInstruction::IfICmp(_, _)
            | BranchInstruction::IfACmp(_, _)
            | BranchInstruction::IfNull(_, _) => 3,

            BranchInstruction::TableSwitch { targets, .. } => {
                1 + switch_padding(offset) + 4 * (3 + targets.len())
            }

            BranchInstruction::LookupSwitch { targets, .. } => {
                1 + switch_padding(offset) + 8 * (1 + targets.len())
            }
        }
    }
}

/// Number of padding bytes after a switch opcode at `offset`
pub fn switch_padding(offset: usize) -> usize {
    (4 - (offset + 1) % 4) % 4
}

impl BranchInstruction<i32> {
    /// Encode an instruction whose jump targets have already been made relative to `offset`
    ///
    /// The caller is responsible for checking that non-wide jump offsets fit in 16 bits.
    pub fn encode<W: WriteBytesExt>(
        &self,
        offset: usize,
        wide: bool,
        writer: &mut W,
    ) -> Result<()> {
        fn jump<W: WriteBytesExt>(opcode: u8, target: i32, writer: &mut W) -> Result<()> {
            opcode.serialize(writer)?;
            (target as i16).serialize(writer)
        }

        match self {
            BranchInstruction::If(comp, lbl) => {
                let opcode: u8 = match comp {
                    OrdComparison::EQ => 0x99,
                    OrdComparison::NE => 0x9a,
                    OrdComparison::LT => 0x9b,
                    OrdComparison::GE => 0x9c,
                    OrdComparison::GT => 0x9d,
                    OrdComparison::LE => 0x9e,
                };
                jump(opcode, *lbl, writer)?;
            }
            BranchInstruction::IfICmp(comp, lbl) => {
                let opcode: u8 = match comp {
                    OrdComparison::EQ => 0x9f,
                    OrdComparison::NE => 0xa0,
                    OrdComparison::LT => 0xa1,
                    OrdComparison::GE => 0xa2,
                    OrdComparison::GT => 0xa3,
                    OrdComparison::LE => 0xa4,
                };
                jump(opcode, *lbl, writer)?;
            }
            BranchInstruction::IfACmp(comp, lbl) => {
                let opcode: u8 = match comp {
                    EqComparison::EQ => 0xa5,
                    EqComparison::NE => 0xa6,
                };
                jump(opcode, *lbl, writer)?;
            }
            BranchInstruction::IfNull(comp, lbl) => {
                let opcode: u8 = match comp {
                    EqComparison::EQ => 0xc6,
                    EqComparison::NE => 0xc7,
                };
                jump(opcode, *lbl, writer)?;
            }
            BranchInstruction::Goto(lbl) if wide => {
                0xc8u8.serialize(writer)?;
                lbl.serialize(writer)?;
            }
            BranchInstruction::Jsr(lbl) if wide => {
                0xc9u8.serialize(writer)?;
                lbl.serialize(writer)?;
            }
            BranchInstruction::Goto(lbl) => jump(0xa7, *lbl, writer)?,
            BranchInstruction::Jsr(lbl) => jump(0xa8, *lbl, writer)?,
            BranchInstruction::TableSwitch {
                default,
                low,
                targets,
            } => {
                0xaau8.serialize(writer)?;
                for _ in 0..switch_padding(offset) {
                    0x00u8.serialize(writer)?;
                }
                default.serialize(writer)?;
                low.serialize(writer)?;
                (low + targets.len() as i32 - 1).serialize(writer)?;
                for target in targets {
                    target.serialize(writer)?;
                }
            }
            BranchInstruction::LookupSwitch { default, targets } => {
                0xabu8.serialize(writer)?;
                for _ in 0..switch_padding(offset) {
                    0x00u8.serialize(writer)?;
                }
                default.serialize(writer)?;
                (targets.len() as i32).serialize(writer)?;
                for (key, target) in targets {
                    key.serialize(writer)?;
                    target.serialize(writer)?;
                }
            }
            BranchInstruction::IReturn => 0xacu8.serialize(writer)?,
            BranchInstruction::LReturn => 0xadu8.serialize(writer)?,
            BranchInstruction::FReturn => 0xaeu8.serialize(writer)?,
            BranchInstruction::DReturn => 0xafu8.serialize(writer)?,
            BranchInstruction::AReturn => 0xb0u8.serialize(writer)?,
            BranchInstruction::Return => 0xb1u8.serialize(writer)?,
            BranchInstruction::AThrow => 0xbfu8.serialize(writer)?,
        }
        Ok(())
    }
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    GE,
    GT,
    LE,
    LT,
    NE,
}

impl Not for OrdComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            OrdComparison::EQ => OrdComparison::NE,
            OrdComparison::GE => OrdComparison::LT,
            OrdComparison::GT => OrdComparison::LE,
            OrdComparison::LE => OrdComparison::GT,
            OrdComparison::LT => OrdComparison::GE,
            OrdComparison::NE => OrdComparison::EQ,
        }
    }
}

/// Equality/inequality comparison operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

impl Not for EqComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            EqComparison::EQ => EqComparison::NE,
            EqComparison::NE => EqComparison::EQ,
        }
    }
}

/// Type of method to invoke
///
/// Note: `InvokeDynamic` is kept separate because the constant argument it expects is not to a
/// `Constant::MethodRef`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface(u8), // `count` is of total arguments, where `long`/`double` count for 2
}
