use super::{
    BranchInstruction, EqComparison, Instruction, InvokeType, LocalKind, OrdComparison, SimpleOp,
};
use crate::jvm::class_file::Deserialize;
use crate::jvm::{
    BaseType, ClassConstantIndex, ConstantIndex, DecodeErrorKind, Error, FieldRefConstantIndex,
    InvokeDynamicConstantIndex, MethodRefConstantIndex,
};

/// Instruction decoded from a code array
///
/// Jump targets are absolute offsets into the code array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodedInstruction {
    Plain(Instruction),
    Branch(BranchInstruction<usize>),
}

/// Decode a full code array into instructions, each paired with the offset at which it starts
///
/// Jump targets are checked to land on the start of an instruction.
pub fn decode_code(code: &[u8]) -> Result<Vec<(usize, DecodedInstruction)>, Error> {
    let mut decoder = Decoder { code, offset: 0 };
    let mut instructions = vec![];
    while decoder.offset < code.len() {
        let start = decoder.offset;
        let instruction = decoder.next_instruction()?;
        instructions.push((start, instruction));
    }

    for (_, instruction) in &instructions {
        if let DecodedInstruction::Branch(branch) = instruction {
            for target in branch.jump_targets() {
                check_boundary(&instructions, *target)?;
            }
        }
    }

    Ok(instructions)
}

/// Check that an offset is the start of some instruction
pub fn check_boundary(
    instructions: &[(usize, DecodedInstruction)],
    offset: usize,
) -> Result<(), Error> {
    instructions
        .binary_search_by_key(&offset, |(start, _)| *start)
        .map(|_| ())
        .map_err(|_| Error::Decode(DecodeErrorKind::InvalidCodeOffset(offset)))
}

struct Decoder<'a> {
    code: &'a [u8],
    offset: usize,
}

impl<'a> Decoder<'a> {
    fn read<T: Deserialize>(&mut self) -> Result<T, Error> {
        let mut rest = self.code.get(self.offset..).unwrap_or(&[]);
        let before = rest.len();
        let value = T::deserialize(&mut rest)?;
        self.offset += before - rest.len();
        Ok(value)
    }

    fn target(&self, start: usize, relative: i32) -> Result<usize, Error> {
        let absolute = start as i64 + relative as i64;
        if absolute < 0 || absolute as usize >= self.code.len() {
            return Err(Error::Decode(DecodeErrorKind::InvalidCodeOffset(
                absolute.max(0) as usize,
            )));
        }
        Ok(absolute as usize)
    }

    fn plain(instruction: Instruction) -> DecodedInstruction {
        DecodedInstruction::Plain(instruction)
    }

    fn next_instruction(&mut self) -> Result<DecodedInstruction, Error> {
        let start = self.offset;
        let opcode: u8 = self.read()?;

        if let Some(op) = SimpleOp::from_opcode(opcode) {
            return Ok(Self::plain(Instruction::Simple(op)));
        }

        let decoded = match opcode {
            0x10 => Self::plain(Instruction::BiPush(self.read()?)),
            0x11 => Self::plain(Instruction::SiPush(self.read()?)),
            0x12 => Self::plain(Instruction::Ldc(ConstantIndex(self.read::<u8>()? as u16))),
            0x13 => Self::plain(Instruction::Ldc(self.read()?)),
            0x14 => Self::plain(Instruction::Ldc2(self.read()?)),

            0x15..=0x19 => {
                let kind = local_kind(opcode - 0x15)?;
                Self::plain(Instruction::Load(kind, self.read::<u8>()? as u16))
            }
            0x1a..=0x2d => {
                let kind = local_kind((opcode - 0x1a) / 4)?;
                Self::plain(Instruction::Load(kind, ((opcode - 0x1a) % 4) as u16))
            }
            0x36..=0x3a => {
                let kind = local_kind(opcode - 0x36)?;
                Self::plain(Instruction::Store(kind, self.read::<u8>()? as u16))
            }
            0x3b..=0x4e => {
                let kind = local_kind((opcode - 0x3b) / 4)?;
                Self::plain(Instruction::Store(kind, ((opcode - 0x3b) % 4) as u16))
            }
            0x84 => {
                let slot = self.read::<u8>()? as u16;
                let by = self.read::<i8>()? as i16;
                Self::plain(Instruction::IInc(slot, by))
            }

            0x99..=0x9e => {
                let comparison = ord_comparison(opcode - 0x99);
                let target = self.read_jump(start)?;
                DecodedInstruction::Branch(BranchInstruction::If(comparison, target))
            }
            0x9f..=0xa4 => {
                let comparison = ord_comparison(opcode - 0x9f);
                let target = self.read_jump(start)?;
                DecodedInstruction::Branch(BranchInstruction::IfICmp(comparison, target))
            }
            0xa5 | 0xa6 => {
                let comparison = eq_comparison(opcode == 0xa5);
                let target = self.read_jump(start)?;
                DecodedInstruction::Branch(BranchInstruction::IfACmp(comparison, target))
            }
            0xa7 => DecodedInstruction::Branch(BranchInstruction::Goto(self.read_jump(start)?)),
            0xa8 => DecodedInstruction::Branch(BranchInstruction::Jsr(self.read_jump(start)?)),
            0xa9 => Self::plain(Instruction::Ret(self.read::<u8>()? as u16)),
            0xaa => self.table_switch(start)?,
            0xab => self.lookup_switch(start)?,
            0xac => DecodedInstruction::Branch(BranchInstruction::IReturn),
            0xad => DecodedInstruction::Branch(BranchInstruction::LReturn),
            0xae => DecodedInstruction::Branch(BranchInstruction::FReturn),
            0xaf => DecodedInstruction::Branch(BranchInstruction::DReturn),
            0xb0 => DecodedInstruction::Branch(BranchInstruction::AReturn),
            0xb1 => DecodedInstruction::Branch(BranchInstruction::Return),

            0xb2 => Self::plain(Instruction::GetStatic(self.read::<FieldRefConstantIndex>()?)),
            0xb3 => Self::plain(Instruction::PutStatic(self.read::<FieldRefConstantIndex>()?)),
            0xb4 => Self::plain(Instruction::GetField(self.read::<FieldRefConstantIndex>()?)),
            0xb5 => Self::plain(Instruction::PutField(self.read::<FieldRefConstantIndex>()?)),
            0xb6 => Self::plain(Instruction::Invoke(InvokeType::Virtual, self.read()?)),
            0xb7 => Self::plain(Instruction::Invoke(InvokeType::Special, self.read()?)),
            0xb8 => Self::plain(Instruction::Invoke(InvokeType::Static, self.read()?)),
            0xb9 => {
                let method: MethodRefConstantIndex = self.read()?;
                let count: u8 = self.read()?;
                let _zero: u8 = self.read()?;
                Self::plain(Instruction::Invoke(InvokeType::Interface(count), method))
            }
            0xba => {
                let call_site: InvokeDynamicConstantIndex = self.read()?;
                let _zero: u16 = self.read()?;
                Self::plain(Instruction::InvokeDynamic(call_site))
            }
            0xbb => Self::plain(Instruction::New(self.read()?)),
            0xbc => {
                let code: u8 = self.read()?;
                let base_type = BaseType::from_array_type_code(code)
                    .ok_or(Error::Decode(DecodeErrorKind::BadArrayType(code)))?;
                Self::plain(Instruction::NewArray(base_type))
            }
            0xbd => Self::plain(Instruction::ANewArray(self.read()?)),
            0xbf => DecodedInstruction::Branch(BranchInstruction::AThrow),
            0xc0 => Self::plain(Instruction::CheckCast(self.read()?)),
            0xc1 => Self::plain(Instruction::InstanceOf(self.read()?)),
            0xc4 => self.wide()?,
            0xc5 => {
                let class: ClassConstantIndex = self.read()?;
                let dimensions: u8 = self.read()?;
                Self::plain(Instruction::MultiANewArray(class, dimensions))
            }
            0xc6 | 0xc7 => {
                let comparison = eq_comparison(opcode == 0xc6);
                let target = self.read_jump(start)?;
                DecodedInstruction::Branch(BranchInstruction::IfNull(comparison, target))
            }
            0xc8 => {
                let relative: i32 = self.read()?;
                DecodedInstruction::Branch(BranchInstruction::Goto(self.target(start, relative)?))
            }
            0xc9 => {
                let relative: i32 = self.read()?;
                DecodedInstruction::Branch(BranchInstruction::Jsr(self.target(start, relative)?))
            }

            other => return Err(Error::Decode(DecodeErrorKind::UnknownOpcode(other))),
        };
        Ok(decoded)
    }

    fn read_jump(&mut self, start: usize) -> Result<usize, Error> {
        let relative: i16 = self.read()?;
        self.target(start, relative as i32)
    }

    fn skip_switch_padding(&mut self) -> Result<(), Error> {
        while self.offset % 4 != 0 {
            let _padding: u8 = self.read()?;
        }
        Ok(())
    }

    fn table_switch(&mut self, start: usize) -> Result<DecodedInstruction, Error> {
        self.skip_switch_padding()?;
        let default: i32 = self.read()?;
        let default = self.target(start, default)?;
        let low: i32 = self.read()?;
        let high: i32 = self.read()?;
        if high < low {
            return Err(Error::Decode(DecodeErrorKind::MalformedSwitch(start)));
        }
        let count = (high as i64 - low as i64 + 1) as usize;
        if count > self.code.len() {
            return Err(Error::Decode(DecodeErrorKind::MalformedSwitch(start)));
        }
        let mut targets = Vec::with_capacity(count);
        for _ in 0..count {
            let target: i32 = self.read()?;
            targets.push(self.target(start, target)?);
        }
        Ok(DecodedInstruction::Branch(BranchInstruction::TableSwitch {
            default,
            low,
            targets,
        }))
    }

    fn lookup_switch(&mut self, start: usize) -> Result<DecodedInstruction, Error> {
        self.skip_switch_padding()?;
        let default: i32 = self.read()?;
        let default = self.target(start, default)?;
        let npairs: i32 = self.read()?;
        if npairs < 0 || npairs as usize > self.code.len() {
            return Err(Error::Decode(DecodeErrorKind::MalformedSwitch(start)));
        }
        let mut targets = Vec::with_capacity(npairs as usize);
        for _ in 0..npairs {
            let key: i32 = self.read()?;
            let target: i32 = self.read()?;
            let target = self.target(start, target)?;
            targets.push((key, target));
        }
        Ok(DecodedInstruction::Branch(BranchInstruction::LookupSwitch {
            default,
            targets,
        }))
    }

    /// Instruction following a `wide` prefix
    fn wide(&mut self) -> Result<DecodedInstruction, Error> {
        let opcode: u8 = self.read()?;
        let instruction = match opcode {
            0x15..=0x19 => Instruction::Load(local_kind(opcode - 0x15)?, self.read()?),
            0x36..=0x3a => Instruction::Store(local_kind(opcode - 0x36)?, self.read()?),
            0xa9 => Instruction::Ret(self.read()?),
            0x84 => {
                let slot: u16 = self.read()?;
                let by: i16 = self.read()?;
                Instruction::IInc(slot, by)
            }
            other => return Err(Error::Decode(DecodeErrorKind::BadWideOpcode(other))),
        };
        Ok(DecodedInstruction::Plain(instruction))
    }
}

fn local_kind(ordinal: u8) -> Result<LocalKind, Error> {
    LocalKind::from_ordinal(ordinal).ok_or(Error::Decode(DecodeErrorKind::UnknownOpcode(ordinal)))
}

/// Comparisons in opcode order: `eq`, `ne`, `lt`, `ge`, `gt`, `le`
fn ord_comparison(ordinal: u8) -> OrdComparison {
    match ordinal {
        0 => OrdComparison::EQ,
        1 => OrdComparison::NE,
        2 => OrdComparison::LT,
        3 => OrdComparison::GE,
        4 => OrdComparison::GT,
        _ => OrdComparison::LE,
    }
}

fn eq_comparison(is_eq: bool) -> EqComparison {
    if is_eq {
        EqComparison::EQ
    } else {
        EqComparison::NE
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn straight_line_code() {
        // iconst_m1; istore 4; wide iinc 4 1000; aload_0; invokevirtual #7; return
        let code = [
            0x02, 0x36, 4, 0xc4, 0x84, 0, 4, 0x03, 0xe8, 0x2a, 0xb6, 0, 7, 0xb1,
        ];
        let decoded = decode_code(&code).unwrap();
        assert_eq!(
            decoded,
            vec![
                (0, DecodedInstruction::Plain(Instruction::Simple(SimpleOp::IConstM1))),
                (1, DecodedInstruction::Plain(Instruction::Store(LocalKind::Int, 4))),
                (3, DecodedInstruction::Plain(Instruction::IInc(4, 1000))),
                (9, DecodedInstruction::Plain(Instruction::Load(LocalKind::Reference, 0))),
                (
                    10,
                    DecodedInstruction::Plain(Instruction::Invoke(
                        InvokeType::Virtual,
                        MethodRefConstantIndex(ConstantIndex(7))
                    ))
                ),
                (13, DecodedInstruction::Branch(BranchInstruction::Return)),
            ]
        );
    }

    #[test]
    fn jumps_become_absolute() {
        // 0: iload_1; 1: ifeq +6 (7, which is inside the goto_w); 4: goto_w -4 (0); 9: return
        let code = [0x1b, 0x99, 0, 6, 0xc8, 0xff, 0xff, 0xff, 0xfc, 0xb1];
        assert!(matches!(
            decode_code(&code),
            Err(Error::Decode(DecodeErrorKind::InvalidCodeOffset(7)))
        ));

        // 0: iload_1; 1: ifeq +8 (9); 4: goto_w -4 (0); 9: return
        let code = [0x1b, 0x99, 0, 8, 0xc8, 0xff, 0xff, 0xff, 0xfc, 0xb1];
        let decoded = decode_code(&code).unwrap();
        assert_eq!(
            decoded[1],
            (1, DecodedInstruction::Branch(BranchInstruction::If(OrdComparison::EQ, 9)))
        );
        assert_eq!(
            decoded[2],
            (4, DecodedInstruction::Branch(BranchInstruction::Goto(0)))
        );
    }

    #[test]
    fn switches_are_padded() {
        // 0: iload_0; 1: tableswitch (2 bytes pad) default +23 low 0 high 1 [+23, +23]; 24: return
        let mut code = vec![0x1a, 0xaa, 0, 0];
        for word in [23i32, 0, 1, 23, 23] {
            code.extend_from_slice(&word.to_be_bytes());
        }
        code.push(0xb1);
        let decoded = decode_code(&code).unwrap();
        assert_eq!(
            decoded[1],
            (
                1,
                DecodedInstruction::Branch(BranchInstruction::TableSwitch {
                    default: 24,
                    low: 0,
                    targets: vec![24, 24],
                })
            )
        );
        assert_eq!(decoded[2].0, 24);
    }

    #[test]
    fn rejects_bad_bytes() {
        assert!(matches!(
            decode_code(&[0xca]),
            Err(Error::Decode(DecodeErrorKind::UnknownOpcode(0xca)))
        ));
        assert!(matches!(
            decode_code(&[0xc4, 0x10, 0]),
            Err(Error::Decode(DecodeErrorKind::BadWideOpcode(0x10)))
        ));
        assert!(matches!(
            decode_code(&[0x11, 0]),
            Err(Error::Decode(DecodeErrorKind::Truncated))
        ));
        assert!(matches!(
            decode_code(&[0xbc, 3]),
            Err(Error::Decode(DecodeErrorKind::BadArrayType(3)))
        ));
    }
}
