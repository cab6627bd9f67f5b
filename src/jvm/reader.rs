use crate::jvm::class_file::{
    decode_attribute_info, Attribute, AttributeLike, ClassFile, Code, ConstantsPool, Deserialize,
    LineNumberTable, LocalVariableEntry, LocalVariableTable, LocalVariableTypeTable, Method,
    SerializableVerificationType, StackMapFrame, StackMapTable,
};
use crate::jvm::code::{
    check_boundary, decode_code, read_code_type_annotations, CodeTypeAnnotation,
    DecodedInstruction, Label, LabelGenerator, TypeAnnotationTarget,
    RUNTIME_INVISIBLE_TYPE_ANNOTATIONS, RUNTIME_VISIBLE_TYPE_ANNOTATIONS,
};
use crate::jvm::{
    BinaryName, ClassEvent, ClassHeader, ClassVisitor, CodeEvent, CodeHeader, DecodeErrorKind,
    Error, Frame, LocalVariable, MethodDescriptor, MethodHeader, Name, ParseDescriptor,
    UnqualifiedName, VerificationType,
};
use std::collections::{BTreeMap, BTreeSet};

/// Parses a class file and replays it as events
///
/// The whole class is parsed up front (so structurally broken files are rejected before any
/// event is produced), but method bodies are only decoded as they get visited.
#[derive(Debug)]
pub struct ClassReader {
    class: ClassFile,
}

impl ClassReader {
    pub fn new(bytes: &[u8]) -> Result<ClassReader, Error> {
        Ok(ClassReader {
            class: ClassFile::read(bytes)?,
        })
    }

    /// Internal name of the class
    pub fn class_name(&self) -> Result<&str, Error> {
        self.class.constants.class_name(self.class.this_class)
    }

    /// Send the class, as events, to a visitor
    pub fn accept<V: ClassVisitor>(&self, visitor: &mut V) -> Result<(), Error> {
        let constants = &self.class.constants;
        let name = BinaryName::from_string(self.class_name()?.to_owned())
            .map_err(Error::MalformedDescriptor)?;

        visitor.visit(ClassEvent::Header(ClassHeader {
            version: self.class.version,
            constants: constants.clone(),
            access_flags: self.class.access_flags,
            this_class: self.class.this_class,
            name,
            super_class: self.class.super_class,
            interfaces: self.class.interfaces.clone(),
        }))?;

        for field in &self.class.fields {
            visitor.visit(ClassEvent::Field(field.clone()))?;
        }

        for method in &self.class.methods {
            self.accept_method(method, visitor)?;
        }

        for attribute in &self.class.attributes {
            visitor.visit(ClassEvent::Attribute(attribute.clone()))?;
        }

        visitor.visit(ClassEvent::End)
    }

    fn accept_method<V: ClassVisitor>(
        &self,
        method: &Method,
        visitor: &mut V,
    ) -> Result<(), Error> {
        let constants = &self.class.constants;
        let name = constants.utf8(method.name_index)?;
        let descriptor = constants.utf8(method.descriptor_index)?;

        let mut code = None;
        let mut attributes = vec![];
        for attribute in &method.attributes {
            if code.is_none() && constants.utf8(attribute.name_index)? == Code::NAME {
                code = Some(attribute);
            } else {
                attributes.push(attribute.clone());
            }
        }

        visitor.visit(ClassEvent::Method(MethodHeader {
            access_flags: method.access_flags,
            name: UnqualifiedName::from_string(name.to_owned())
                .map_err(Error::MalformedDescriptor)?,
            name_index: method.name_index,
            descriptor: MethodDescriptor::parse(descriptor)
                .map_err(|_| Error::MalformedDescriptor(descriptor.to_owned()))?,
            descriptor_index: method.descriptor_index,
            attributes,
        }))?;

        if let Some(code) = code {
            log::trace!("Reading code of {}{}", name, descriptor);
            accept_code(constants, code, visitor).map_err(|error| match error {
                Error::InMethod { .. } => error,
                error => Error::InMethod {
                    method: format!("{}{}", name, descriptor),
                    error: Box::new(error),
                },
            })?;
        }

        visitor.visit(ClassEvent::MethodEnd)
    }
}

/// Sub-attributes of `Code`, with every offset still absolute
#[derive(Default)]
struct CodeAttributes {
    frames: Vec<(usize, Frame<String, u16>)>,
    line_numbers: BTreeMap<usize, Vec<u16>>,
    local_variables: Vec<LocalVariableEntry>,
    local_variable_types: Vec<LocalVariableEntry>,
    type_annotations: Vec<CodeTypeAnnotation<u16>>,
    unknown: Vec<Attribute>,
}

impl CodeAttributes {
    fn read(constants: &ConstantsPool, attributes: &[Attribute]) -> Result<CodeAttributes, Error> {
        let mut parsed = CodeAttributes::default();
        for attribute in attributes {
            let info: &[u8] = &attribute.info;
            match constants.utf8(attribute.name_index)? {
                StackMapTable::NAME => {
                    let table = decode_attribute_info(info, StackMapTable::read)?;
                    parsed.read_frames(constants, table)?;
                }
                LineNumberTable::NAME => {
                    let table =
                        decode_attribute_info(info, |r| Ok(LineNumberTable::deserialize(r)?))?;
                    for entry in table.0 {
                        parsed
                            .line_numbers
                            .entry(entry.start_pc.0 as usize)
                            .or_default()
                            .push(entry.line_number);
                    }
                }
                LocalVariableTable::NAME => {
                    let table =
                        decode_attribute_info(info, |r| Ok(LocalVariableTable::deserialize(r)?))?;
                    parsed.local_variables.extend(table.0);
                }
                LocalVariableTypeTable::NAME => {
                    let table = decode_attribute_info(info, |r| {
                        Ok(LocalVariableTypeTable::deserialize(r)?)
                    })?;
                    parsed.local_variable_types.extend(table.0);
                }
                RUNTIME_VISIBLE_TYPE_ANNOTATIONS => parsed
                    .type_annotations
                    .extend(read_code_type_annotations(info, true)?),
                RUNTIME_INVISIBLE_TYPE_ANNOTATIONS => parsed
                    .type_annotations
                    .extend(read_code_type_annotations(info, false)?),
                other => {
                    log::warn!("Copying unknown code attribute '{}' without changes", other);
                    parsed.unknown.push(attribute.clone());
                }
            }
        }
        Ok(parsed)
    }

    /// Turn offset deltas into absolute offsets and resolve class names
    fn read_frames(
        &mut self,
        constants: &ConstantsPool,
        table: StackMapTable,
    ) -> Result<(), Error> {
        let resolve = |verification_type: &SerializableVerificationType| {
            verification_type.map(
                |class| constants.class_name(*class).map(str::to_owned),
                |offset| Ok(*offset),
            )
        };
        let resolve_all = |types: &[SerializableVerificationType]| {
            types.iter().map(resolve).collect::<Result<Vec<_>, Error>>()
        };

        let mut previous: Option<usize> = None;
        for frame in table.0 {
            let delta = frame.offset_delta() as usize;
            let offset = match previous {
                None => delta,
                Some(previous) => previous + delta + 1,
            };
            previous = Some(offset);

            let frame = match frame {
                StackMapFrame::SameLocalsNoStack { .. } => Frame::Same,
                StackMapFrame::SameLocalsOneStack { stack, .. } => {
                    Frame::SameLocals1Stack(resolve(&stack)?)
                }
                StackMapFrame::ChopLocalsNoStack { chopped_k, .. } => Frame::Chop(chopped_k),
                StackMapFrame::AppendLocalsNoStack { locals, .. } => {
                    Frame::Append(resolve_all(&locals)?)
                }
                StackMapFrame::Full { locals, stack, .. } => Frame::Full {
                    locals: resolve_all(&locals)?,
                    stack: resolve_all(&stack)?,
                },
            };
            self.frames.push((offset, frame));
        }
        Ok(())
    }

    /// Every offset that something in these attributes refers to
    fn referenced_offsets(&self, offsets: &mut BTreeSet<usize>) {
        for (offset, frame) in &self.frames {
            offsets.insert(*offset);
            let types: Vec<&VerificationType<String, u16>> = match frame {
                Frame::Same | Frame::Chop(_) => vec![],
                Frame::SameLocals1Stack(stack) => vec![stack],
                Frame::Append(locals) => locals.iter().collect(),
                Frame::Full { locals, stack } => locals.iter().chain(stack).collect(),
            };
            for verification_type in types {
                if let VerificationType::Uninitialized(new_offset) = verification_type {
                    offsets.insert(*new_offset as usize);
                }
            }
        }
        offsets.extend(self.line_numbers.keys().copied());
        for entry in self.local_variables.iter().chain(&self.local_variable_types) {
            let start = entry.start_pc.0 as usize;
            offsets.insert(start);
            offsets.insert(start + entry.length as usize);
        }
        for annotation in &self.type_annotations {
            match &annotation.target {
                TypeAnnotationTarget::LocalVariable { table, .. } => {
                    for range in table {
                        offsets.insert(range.start as usize);
                        offsets.insert(range.end as usize);
                    }
                }
                TypeAnnotationTarget::Catch { .. } => (),
                TypeAnnotationTarget::Offset { offset, .. }
                | TypeAnnotationTarget::TypeArgument { offset, .. } => {
                    offsets.insert(*offset as usize);
                }
            }
        }
    }
}

/// Decode a `Code` attribute and send it along as code events
fn accept_code<V: ClassVisitor>(
    constants: &ConstantsPool,
    code: &Attribute,
    visitor: &mut V,
) -> Result<(), Error> {
    let code = decode_attribute_info(&code.info, |r| Ok(Code::deserialize(r)?))?;
    let code_length = code.code_array.0.len();
    let instructions = decode_code(&code.code_array.0)?;
    let attributes = CodeAttributes::read(constants, &code.attributes)?;

    // Every referenced offset gets a label, handed out in ascending offset order
    let mut offsets = BTreeSet::new();
    for (_, instruction) in &instructions {
        if let DecodedInstruction::Branch(branch) = instruction {
            offsets.extend(branch.jump_targets().into_iter().copied());
        }
    }
    for handler in &code.exception_table {
        offsets.insert(handler.start_pc.0 as usize);
        offsets.insert(handler.end_pc.0 as usize);
        offsets.insert(handler.handler_pc.0 as usize);
    }
    attributes.referenced_offsets(&mut offsets);

    let mut label_generator = LabelGenerator::new();
    let mut labels: BTreeMap<usize, Label> = BTreeMap::new();
    for offset in offsets {
        if offset != code_length {
            check_boundary(&instructions, offset)?;
        }
        labels.insert(offset, label_generator.fresh_label());
    }
    let label = |offset: usize| -> Result<Label, Error> {
        labels
            .get(&offset)
            .copied()
            .ok_or(Error::Decode(DecodeErrorKind::InvalidCodeOffset(offset)))
    };

    visitor.visit(ClassEvent::Code(CodeEvent::Start(CodeHeader {
        max_stack: code.max_stack,
        max_locals: code.max_locals,
    })))?;

    for handler in &code.exception_table {
        visitor.visit(ClassEvent::Code(CodeEvent::TryCatch {
            start: label(handler.start_pc.0 as usize)?,
            end: label(handler.end_pc.0 as usize)?,
            handler: label(handler.handler_pc.0 as usize)?,
            catch_type: if (handler.catch_type.0).0 == 0 {
                None
            } else {
                Some(handler.catch_type)
            },
        }))?;
    }

    let mut frames = attributes.frames.into_iter().peekable();
    for (offset, instruction) in instructions {
        if let Some(start) = labels.get(&offset) {
            visitor.visit(ClassEvent::Code(CodeEvent::Label(*start)))?;
        }
        if let Some(lines) = attributes.line_numbers.get(&offset) {
            for line in lines {
                visitor.visit(ClassEvent::Code(CodeEvent::LineNumber {
                    line: *line,
                    start: label(offset)?,
                }))?;
            }
        }
        while let Some((frame_offset, _)) = frames.peek() {
            if *frame_offset != offset {
                break;
            }
            if let Some((_, frame)) = frames.next() {
                let frame = frame.map(|cls| Ok(cls.clone()), |new| label(*new as usize))?;
                visitor.visit(ClassEvent::Code(CodeEvent::Frame(frame)))?;
            }
        }

        let event = match instruction {
            DecodedInstruction::Plain(instruction) => CodeEvent::Instruction(instruction),
            DecodedInstruction::Branch(branch) => {
                CodeEvent::Branch(branch.map_labels(|target| label(*target))?)
            }
        };
        visitor.visit(ClassEvent::Code(event))?;
    }

    // Frames have to be attached to an instruction
    if let Some((offset, _)) = frames.next() {
        return Err(Error::Decode(DecodeErrorKind::InvalidCodeOffset(offset)));
    }
    if let Some(end) = labels.get(&code_length) {
        visitor.visit(ClassEvent::Code(CodeEvent::Label(*end)))?;
    }

    for entry in &attributes.local_variables {
        let local = local_variable(entry, &label)?;
        visitor.visit(ClassEvent::Code(CodeEvent::LocalVariable(local)))?;
    }
    for entry in &attributes.local_variable_types {
        let local = local_variable(entry, &label)?;
        visitor.visit(ClassEvent::Code(CodeEvent::LocalVariableType(local)))?;
    }
    for annotation in &attributes.type_annotations {
        let annotation = annotation.map_labels(|offset| label(*offset as usize))?;
        visitor.visit(ClassEvent::Code(CodeEvent::TypeAnnotation(annotation)))?;
    }
    for attribute in attributes.unknown {
        visitor.visit(ClassEvent::Code(CodeEvent::Attribute(attribute)))?;
    }

    visitor.visit(ClassEvent::Code(CodeEvent::Maxs {
        max_stack: code.max_stack,
        max_locals: code.max_locals,
    }))
}

fn local_variable(
    entry: &LocalVariableEntry,
    label: impl Fn(usize) -> Result<Label, Error>,
) -> Result<LocalVariable, Error> {
    let start = entry.start_pc.0 as usize;
    Ok(LocalVariable {
        name: entry.name_index,
        descriptor: entry.descriptor_index,
        start: label(start)?,
        end: label(start + entry.length as usize)?,
        index: entry.index,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{
        BytecodeArray, BytecodeIndex, ExceptionHandler, LineNumber, Serialize, Version,
    };
    use crate::jvm::code::{BranchInstruction, Instruction, LocalKind, OrdComparison, SimpleOp};
    use crate::jvm::{
        ClassAccessFlags, ClassConstantIndex, ConstantIndex, MethodAccessFlags, Utf8ConstantIndex,
    };

    fn attribute<A: AttributeLike>(constants: &mut ConstantsPool, body: &A) -> Attribute {
        let mut info = vec![];
        body.serialize(&mut info).unwrap();
        Attribute {
            name_index: constants.get_utf8(A::NAME).unwrap(),
            info,
        }
    }

    /// `static int count(int n)`: loops `n` times with a stack map frame at the loop head
    fn counting_class() -> (Vec<u8>, Utf8ConstantIndex, Utf8ConstantIndex) {
        let mut constants = ConstantsPool::new();
        let this_class = constants.get_class("me/Counter").unwrap();
        let super_class = constants.get_class("java/lang/Object").unwrap();
        let name_index = constants.get_utf8("count").unwrap();
        let descriptor_index = constants.get_utf8("(I)I").unwrap();

        #[rustfmt::skip]
        let code_array = vec![
            0x03,             // 0: iconst_0
            0x3c,             // 1: istore_1
            0x1b,             // 2: iload_1
            0x1a,             // 3: iload_0
            0xa2, 0x00, 0x09, // 4: if_icmpge 13
            0x84, 0x01, 0x01, // 7: iinc 1 1
            0xa7, 0xff, 0xf8, // 10: goto 2
            0x1b,             // 13: iload_1
            0xac,             // 14: ireturn
        ];
        let frames = StackMapTable(vec![
            StackMapFrame::AppendLocalsNoStack {
                offset_delta: 2,
                locals: vec![VerificationType::Integer],
            },
            StackMapFrame::SameLocalsNoStack { offset_delta: 10 },
        ]);
        let lines = LineNumberTable(vec![
            LineNumber {
                start_pc: BytecodeIndex(0),
                line_number: 3,
            },
            LineNumber {
                start_pc: BytecodeIndex(13),
                line_number: 5,
            },
        ]);
        let local_name = constants.get_utf8("i").unwrap();
        let local_descriptor = constants.get_utf8("I").unwrap();
        let locals = LocalVariableTable(vec![LocalVariableEntry {
            start_pc: BytecodeIndex(2),
            length: 13,
            name_index: local_name,
            descriptor_index: local_descriptor,
            index: 1,
        }]);

        let code = Code {
            max_stack: 2,
            max_locals: 2,
            code_array: BytecodeArray(code_array),
            exception_table: vec![ExceptionHandler {
                start_pc: BytecodeIndex(2),
                end_pc: BytecodeIndex(13),
                handler_pc: BytecodeIndex(13),
                catch_type: ClassConstantIndex(ConstantIndex(0)),
            }],
            attributes: vec![
                attribute(&mut constants, &frames),
                attribute(&mut constants, &lines),
                attribute(&mut constants, &locals),
            ],
        };
        let code = attribute(&mut constants, &code);

        let class = ClassFile {
            version: Version::JAVA8,
            constants,
            access_flags: ClassAccessFlags::PUBLIC,
            this_class,
            super_class,
            interfaces: vec![],
            fields: vec![],
            methods: vec![Method {
                access_flags: MethodAccessFlags::STATIC,
                name_index,
                descriptor_index,
                attributes: vec![code],
            }],
            attributes: vec![],
        };
        let mut bytes = vec![];
        class.serialize(&mut bytes).unwrap();
        (bytes, local_name, local_descriptor)
    }

    fn code_events(bytes: &[u8]) -> Vec<CodeEvent> {
        let mut events: Vec<ClassEvent> = vec![];
        ClassReader::new(bytes).unwrap().accept(&mut events).unwrap();
        events
            .into_iter()
            .filter_map(|event| match event {
                ClassEvent::Code(code) => Some(code),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn class_level_events() {
        let mut events: Vec<ClassEvent> = vec![];
        let (bytes, _, _) = counting_class();
        let reader = ClassReader::new(&bytes).unwrap();
        assert_eq!(reader.class_name().unwrap(), "me/Counter");
        reader.accept(&mut events).unwrap();

        assert!(matches!(
            &events[0],
            ClassEvent::Header(header) if header.name.as_str() == "me/Counter"
        ));
        assert!(matches!(
            &events[1],
            ClassEvent::Method(method) if method.name.as_str() == "count"
        ));
        assert!(matches!(events.last(), Some(ClassEvent::End)));
        assert!(matches!(events[events.len() - 2], ClassEvent::MethodEnd));
    }

    #[test]
    fn method_body_events() {
        let (bytes, local_name, local_descriptor) = counting_class();
        let events = code_events(&bytes);

        // Labels in ascending offset order: 0 (line), 2 (loop head), 13 (exit), 15 (end)
        let mut generator = LabelGenerator::new();
        let l0 = generator.fresh_label();
        let l2 = generator.fresh_label();
        let l13 = generator.fresh_label();
        let l15 = generator.fresh_label();

        let expected = vec![
            CodeEvent::Start(CodeHeader {
                max_stack: 2,
                max_locals: 2,
            }),
            CodeEvent::TryCatch {
                start: l2,
                end: l13,
                handler: l13,
                catch_type: None,
            },
            CodeEvent::Label(l0),
            CodeEvent::LineNumber { line: 3, start: l0 },
            CodeEvent::Instruction(Instruction::Simple(SimpleOp::IConst0)),
            CodeEvent::Instruction(Instruction::Store(LocalKind::Int, 1)),
            CodeEvent::Label(l2),
            CodeEvent::Frame(Frame::Append(vec![VerificationType::Integer])),
            CodeEvent::Instruction(Instruction::Load(LocalKind::Int, 1)),
            CodeEvent::Instruction(Instruction::Load(LocalKind::Int, 0)),
            CodeEvent::Branch(BranchInstruction::IfICmp(OrdComparison::GE, l13)),
            CodeEvent::Instruction(Instruction::IInc(1, 1)),
            CodeEvent::Branch(BranchInstruction::Goto(l2)),
            CodeEvent::Label(l13),
            CodeEvent::LineNumber { line: 5, start: l13 },
            CodeEvent::Frame(Frame::Same),
            CodeEvent::Instruction(Instruction::Load(LocalKind::Int, 1)),
            CodeEvent::Branch(BranchInstruction::IReturn),
            CodeEvent::Label(l15),
            CodeEvent::LocalVariable(LocalVariable {
                name: local_name,
                descriptor: local_descriptor,
                start: l2,
                end: l15,
                index: 1,
            }),
            CodeEvent::Maxs {
                max_stack: 2,
                max_locals: 2,
            },
        ];
        assert_eq!(events, expected);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            ClassReader::new(&[0xCA, 0xFE, 0xBA, 0xBE, 0, 0]),
            Err(Error::Decode(DecodeErrorKind::Truncated))
        ));
        assert!(matches!(
            ClassReader::new(&[0, 0, 0, 0]),
            Err(Error::Decode(DecodeErrorKind::BadMagic(0)))
        ));
    }
}
