use crate::jvm::class_file::{
    Attribute, AttributeLike, BytecodeArray, BytecodeIndex, ClassFile, Code, ConstantsPool,
    ExceptionHandler, LineNumber, LineNumberTable, LocalVariableEntry, LocalVariableTable,
    LocalVariableTypeTable, Method, Serialize, StackMapFrame, StackMapTable,
};
use crate::jvm::code::{
    write_code_type_annotations, BranchInstruction, CodeTypeAnnotation, Instruction, Label,
    RUNTIME_INVISIBLE_TYPE_ANNOTATIONS, RUNTIME_VISIBLE_TYPE_ANNOTATIONS,
};
use crate::jvm::{
    ClassConstantIndex, ClassEvent, ClassVisitor, CodeEvent, ConstantIndex, Error, Frame,
    LabelledFrame, LabelledVerificationType, LocalVariable,
};
use crate::util::Offset;
use std::collections::{HashMap, HashSet};

/// Largest code array allowed in a method
const MAX_CODE_LENGTH: usize = 65535;

/// Collects class events and encodes them back into a class file
///
/// The constant pool of the header is kept as is, so constant indices in the events stay valid.
/// New constants (attribute names, classes mentioned in stack map frames) are appended as needed.
#[derive(Debug, Default)]
pub struct ClassWriter {
    class: Option<ClassFile>,
    method: Option<MethodInProgress>,
    finished: bool,
}

#[derive(Debug)]
struct MethodInProgress {
    method: Method,
    code: Option<CodeInProgress>,
}

/// Buffered code events of the current method
///
/// Nothing can be encoded until the method ends, since jumps can go forward.
#[derive(Debug, Default)]
struct CodeInProgress {
    max_stack: u16,
    max_locals: u16,
    items: Vec<CodeItem>,
    try_catches: Vec<(Label, Label, Label, Option<ClassConstantIndex>)>,
    line_numbers: Vec<(u16, Label)>,
    local_variables: Vec<LocalVariable>,
    local_variable_types: Vec<LocalVariable>,
    type_annotations: Vec<CodeTypeAnnotation<Label>>,
    attributes: Vec<Attribute>,
}

/// Positional parts of the method body
#[derive(Debug)]
enum CodeItem {
    Label(Label),
    Frame(LabelledFrame),
    Instruction(Instruction),
    Branch(BranchInstruction<Label>),
}

impl ClassWriter {
    pub fn new() -> ClassWriter {
        ClassWriter::default()
    }

    /// Encoded class file (only available once `End` has been visited)
    pub fn into_bytes(self) -> Result<Vec<u8>, Error> {
        match self.class {
            Some(class) if self.finished => {
                let mut bytes = vec![];
                class.serialize(&mut bytes)?;
                Ok(bytes)
            }
            _ => Err(Error::UnexpectedEvent("class was not finished")),
        }
    }

    fn class_mut(&mut self) -> Result<&mut ClassFile, Error> {
        match (&mut self.class, self.finished) {
            (Some(class), false) => Ok(class),
            _ => Err(Error::UnexpectedEvent("class event outside of a class")),
        }
    }

    fn code_mut(&mut self) -> Result<&mut CodeInProgress, Error> {
        self.method
            .as_mut()
            .and_then(|method| method.code.as_mut())
            .ok_or(Error::UnexpectedEvent("code event outside of a method body"))
    }

    fn visit_code(&mut self, event: CodeEvent) -> Result<(), Error> {
        match event {
            CodeEvent::Start(header) => {
                let method = self
                    .method
                    .as_mut()
                    .ok_or(Error::UnexpectedEvent("code outside of a method"))?;
                if method.code.is_some() {
                    return Err(Error::UnexpectedEvent("method has two bodies"));
                }
                method.code = Some(CodeInProgress {
                    max_stack: header.max_stack,
                    max_locals: header.max_locals,
                    ..CodeInProgress::default()
                });
            }
            other => self.code_mut()?.push(other),
        }
        Ok(())
    }

    fn finish_method(&mut self) -> Result<(), Error> {
        let MethodInProgress { mut method, code } = self
            .method
            .take()
            .ok_or(Error::UnexpectedEvent("method end outside of a method"))?;
        let class = self.class_mut()?;
        if let Some(code) = code {
            let code = code.encode(&mut class.constants)?;
            let mut info = vec![];
            code.serialize(&mut info)?;
            let code_attribute = Attribute {
                name_index: class.constants.get_utf8(Code::NAME)?,
                info,
            };
            method.attributes.insert(0, code_attribute);
        }
        class.methods.push(method);
        Ok(())
    }
}

impl ClassVisitor for ClassWriter {
    fn visit(&mut self, event: ClassEvent) -> Result<(), Error> {
        match event {
            ClassEvent::Header(header) => {
                if self.class.is_some() {
                    return Err(Error::UnexpectedEvent("second class header"));
                }
                self.class = Some(ClassFile {
                    version: header.version,
                    constants: header.constants,
                    access_flags: header.access_flags,
                    this_class: header.this_class,
                    super_class: header.super_class,
                    interfaces: header.interfaces,
                    fields: vec![],
                    methods: vec![],
                    attributes: vec![],
                });
            }
            ClassEvent::Field(field) => self.class_mut()?.fields.push(field),
            ClassEvent::Method(header) => {
                self.class_mut()?;
                if self.method.is_some() {
                    return Err(Error::UnexpectedEvent("method inside a method"));
                }
                self.method = Some(MethodInProgress {
                    method: Method {
                        access_flags: header.access_flags,
                        name_index: header.name_index,
                        descriptor_index: header.descriptor_index,
                        attributes: header.attributes,
                    },
                    code: None,
                });
            }
            ClassEvent::Code(code) => self.visit_code(code)?,
            ClassEvent::MethodEnd => self.finish_method()?,
            ClassEvent::Attribute(attribute) => self.class_mut()?.attributes.push(attribute),
            ClassEvent::End => {
                self.class_mut()?;
                if self.method.is_some() {
                    return Err(Error::UnexpectedEvent("class ended inside a method"));
                }
                self.finished = true;
            }
        }
        Ok(())
    }
}

/// Final positions of every item in the method body
struct Layout {
    /// Start offset of each item (labels and frames take no space)
    offsets: Vec<usize>,

    /// Offset of every placed label
    labels: HashMap<Label, usize>,

    /// Indices of `goto`/`jsr` items that need the 32-bit encoding
    wide_jumps: HashSet<usize>,

    code_length: usize,
}

impl Layout {
    /// Place all items, widening `goto` and `jsr` until every one of them fits
    ///
    /// Widening only ever pushes code further apart, so this terminates.
    fn compute(items: &[CodeItem]) -> Result<Layout, Error> {
        let mut wide_jumps = HashSet::new();
        loop {
            let mut offsets = Vec::with_capacity(items.len());
            let mut labels = HashMap::new();
            let mut offset = 0;
            for (index, item) in items.iter().enumerate() {
                offsets.push(offset);
                match item {
                    CodeItem::Label(label) => {
                        if labels.insert(*label, offset).is_some() {
                            return Err(Error::DuplicateLabel(*label));
                        }
                    }
                    CodeItem::Frame(_) => (),
                    CodeItem::Instruction(instruction) => offset += instruction.width(),
                    CodeItem::Branch(branch) => {
                        offset += branch.width_at(offset, wide_jumps.contains(&index))
                    }
                }
            }

            let layout = Layout {
                offsets,
                labels,
                wide_jumps,
                code_length: offset,
            };

            let mut newly_wide = vec![];
            for (index, item) in items.iter().enumerate() {
                if let CodeItem::Branch(branch) = item {
                    if !branch.has_wide_form() || layout.wide_jumps.contains(&index) {
                        continue;
                    }
                    for target in branch.jump_targets() {
                        let relative = layout.relative(index, *target)?;
                        if i16::try_from(relative).is_err() {
                            newly_wide.push(index);
                        }
                    }
                }
            }

            if newly_wide.is_empty() {
                if layout.code_length > MAX_CODE_LENGTH {
                    return Err(Error::MethodCodeOverflow(Offset(layout.code_length)));
                }
                return Ok(layout);
            }
            log::trace!("Widening {} jumps", newly_wide.len());
            wide_jumps = layout.wide_jumps;
            wide_jumps.extend(newly_wide);
        }
    }

    fn label(&self, label: Label) -> Result<usize, Error> {
        self.labels
            .get(&label)
            .copied()
            .ok_or(Error::UnplacedLabel(label))
    }

    fn label_u16(&self, label: Label) -> Result<u16, Error> {
        let offset = self.label(label)?;
        u16::try_from(offset).map_err(|_| Error::MethodCodeOverflow(Offset(offset)))
    }

    /// Jump distance from the item at `index` to `target`
    fn relative(&self, index: usize, target: Label) -> Result<i64, Error> {
        Ok(self.label(target)? as i64 - self.offsets[index] as i64)
    }
}

impl CodeInProgress {
    fn push(&mut self, event: CodeEvent) {
        match event {
            CodeEvent::Start(_) => (),
            CodeEvent::Label(label) => self.items.push(CodeItem::Label(label)),
            CodeEvent::LineNumber { line, start } => self.line_numbers.push((line, start)),
            CodeEvent::Instruction(instruction) => {
                self.items.push(CodeItem::Instruction(instruction))
            }
            CodeEvent::Branch(branch) => self.items.push(CodeItem::Branch(branch)),
            CodeEvent::Frame(frame) => self.items.push(CodeItem::Frame(frame)),
            CodeEvent::TryCatch {
                start,
                end,
                handler,
                catch_type,
            } => self.try_catches.push((start, end, handler, catch_type)),
            CodeEvent::LocalVariable(local) => self.local_variables.push(local),
            CodeEvent::LocalVariableType(local) => self.local_variable_types.push(local),
            CodeEvent::TypeAnnotation(annotation) => self.type_annotations.push(annotation),
            CodeEvent::Attribute(attribute) => self.attributes.push(attribute),
            CodeEvent::Maxs {
                max_stack,
                max_locals,
            } => {
                self.max_stack = max_stack;
                self.max_locals = max_locals;
            }
        }
    }

    fn encode(self, constants: &mut ConstantsPool) -> Result<Code, Error> {
        let layout = Layout::compute(&self.items)?;

        let mut code_array = Vec::with_capacity(layout.code_length);
        let mut frames = vec![];
        let mut previous_frame: Option<usize> = None;
        for (index, item) in self.items.iter().enumerate() {
            let offset = layout.offsets[index];
            match item {
                CodeItem::Label(_) => (),
                CodeItem::Instruction(instruction) => instruction.serialize(&mut code_array)?,
                CodeItem::Branch(branch) => {
                    let wide = layout.wide_jumps.contains(&index);
                    let relative = branch.map_labels(|target| -> Result<i32, Error> {
                        let relative = layout.relative(index, *target)?;
                        let fits = wide || is_switch(branch) || i16::try_from(relative).is_ok();
                        if !fits {
                            return Err(Error::BranchOffsetOverflow {
                                from: Offset(offset),
                                to: Offset(layout.label(*target)?),
                            });
                        }
                        Ok(relative as i32)
                    })?;
                    relative.encode(offset, wide, &mut code_array)?;
                }
                CodeItem::Frame(frame) => {
                    let offset_delta = match previous_frame {
                        None => offset,
                        Some(previous) if previous == offset => {
                            return Err(Error::ConflictingFrames(Offset(offset)))
                        }
                        Some(previous) => offset - previous - 1,
                    };
                    previous_frame = Some(offset);
                    let offset_delta = u16::try_from(offset_delta)
                        .map_err(|_| Error::MethodCodeOverflow(Offset(offset)))?;
                    frames.push(encode_frame(frame, offset_delta, constants, &layout)?);
                }
            }
        }

        let mut exception_table = vec![];
        for (start, end, handler, catch_type) in &self.try_catches {
            exception_table.push(ExceptionHandler {
                start_pc: BytecodeIndex(layout.label_u16(*start)?),
                end_pc: BytecodeIndex(layout.label_u16(*end)?),
                handler_pc: BytecodeIndex(layout.label_u16(*handler)?),
                catch_type: catch_type.unwrap_or(ClassConstantIndex(ConstantIndex(0))),
            });
        }

        let mut attributes = vec![];
        if !frames.is_empty() {
            attributes.push(make_attribute(constants, &StackMapTable(frames))?);
        }
        if !self.line_numbers.is_empty() {
            let mut lines = vec![];
            for (line, start) in &self.line_numbers {
                lines.push(LineNumber {
                    start_pc: BytecodeIndex(layout.label_u16(*start)?),
                    line_number: *line,
                });
            }
            attributes.push(make_attribute(constants, &LineNumberTable(lines))?);
        }
        if !self.local_variables.is_empty() {
            let entries = local_variable_entries(&self.local_variables, &layout)?;
            attributes.push(make_attribute(constants, &LocalVariableTable(entries))?);
        }
        if !self.local_variable_types.is_empty() {
            let entries = local_variable_entries(&self.local_variable_types, &layout)?;
            attributes.push(make_attribute(constants, &LocalVariableTypeTable(entries))?);
        }
        for (visible, name) in [
            (true, RUNTIME_VISIBLE_TYPE_ANNOTATIONS),
            (false, RUNTIME_INVISIBLE_TYPE_ANNOTATIONS),
        ] {
            let annotations = self
                .type_annotations
                .iter()
                .filter(|annotation| annotation.visible == visible)
                .map(|annotation| annotation.map_labels(|label| layout.label_u16(*label)))
                .collect::<Result<Vec<_>, Error>>()?;
            if !annotations.is_empty() {
                let mut info = vec![];
                write_code_type_annotations(annotations.iter(), &mut info)?;
                attributes.push(Attribute {
                    name_index: constants.get_utf8(name)?,
                    info,
                });
            }
        }
        attributes.extend(self.attributes);

        Ok(Code {
            max_stack: self.max_stack,
            max_locals: self.max_locals,
            code_array: BytecodeArray(code_array),
            exception_table,
            attributes,
        })
    }
}

fn is_switch(branch: &BranchInstruction<Label>) -> bool {
    matches!(
        branch,
        BranchInstruction::TableSwitch { .. } | BranchInstruction::LookupSwitch { .. }
    )
}

fn make_attribute<A: AttributeLike>(
    constants: &mut ConstantsPool,
    attribute: &A,
) -> Result<Attribute, Error> {
    let mut info = vec![];
    attribute.serialize(&mut info)?;
    Ok(Attribute {
        name_index: constants.get_utf8(A::NAME)?,
        info,
    })
}

fn local_variable_entries(
    locals: &[LocalVariable],
    layout: &Layout,
) -> Result<Vec<LocalVariableEntry>, Error> {
    locals
        .iter()
        .map(|local| {
            let start = layout.label_u16(local.start)?;
            let end = layout.label_u16(local.end)?;
            let length = end
                .checked_sub(start)
                .ok_or(Error::UnexpectedEvent("local variable ends before it starts"))?;
            Ok(LocalVariableEntry {
                start_pc: BytecodeIndex(start),
                length,
                name_index: local.name,
                descriptor_index: local.descriptor,
                index: local.index,
            })
        })
        .collect()
}

fn encode_frame(
    frame: &LabelledFrame,
    offset_delta: u16,
    constants: &mut ConstantsPool,
    layout: &Layout,
) -> Result<StackMapFrame, Error> {
    let mut encode_type = |verification_type: &LabelledVerificationType| {
        verification_type.map(
            |class| constants.get_class(class.as_str()).map_err(Error::from),
            |label| layout.label_u16(*label),
        )
    };

    Ok(match frame {
        Frame::Same => StackMapFrame::SameLocalsNoStack { offset_delta },
        Frame::SameLocals1Stack(stack) => StackMapFrame::SameLocalsOneStack {
            offset_delta,
            stack: encode_type(stack)?,
        },
        Frame::Chop(chopped_k @ 1..=3) => StackMapFrame::ChopLocalsNoStack {
            offset_delta,
            chopped_k: *chopped_k,
        },
        Frame::Chop(_) => {
            return Err(Error::UnexpectedEvent("chop frame must remove 1 to 3 locals"));
        }
        Frame::Append(locals) if (1..=3).contains(&locals.len()) => {
            StackMapFrame::AppendLocalsNoStack {
                offset_delta,
                locals: locals.iter().map(&mut encode_type).collect::<Result<_, _>>()?,
            }
        }
        Frame::Append(_) => {
            return Err(Error::UnexpectedEvent("append frame must add 1 to 3 locals"));
        }
        Frame::Full { locals, stack } => StackMapFrame::Full {
            offset_delta,
            locals: locals.iter().map(&mut encode_type).collect::<Result<_, _>>()?,
            stack: stack.iter().map(&mut encode_type).collect::<Result<_, _>>()?,
        },
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{LabelGenerator, LocalKind, OrdComparison, SimpleOp};
    use crate::jvm::{
        BinaryName, ClassHeader, ClassReader, CodeHeader, MethodAccessFlags, MethodHeader, Name,
        UnqualifiedName, VerificationType,
    };

    /// Write a class with a single static method `run()V` made of the given code events
    fn write_method(code: Vec<CodeEvent>) -> Result<Vec<u8>, Error> {
        let name = BinaryName::from_string(String::from("me/Test")).unwrap();
        let mut header = ClassHeader::new(name, &BinaryName::OBJECT)?;
        let method = MethodHeader::new(
            &mut header.constants,
            MethodAccessFlags::STATIC,
            UnqualifiedName::from_string(String::from("run")).unwrap(),
            "()V",
        )?;

        let mut writer = ClassWriter::new();
        writer.visit(ClassEvent::Header(header))?;
        writer.visit(ClassEvent::Method(method))?;
        for event in code {
            writer.visit(ClassEvent::Code(event))?;
        }
        writer.visit(ClassEvent::MethodEnd)?;
        writer.visit(ClassEvent::End)?;
        writer.into_bytes()
    }

    fn read_code(bytes: &[u8]) -> Vec<CodeEvent> {
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

    fn start() -> CodeEvent {
        CodeEvent::Start(CodeHeader {
            max_stack: 1,
            max_locals: 1,
        })
    }

    fn maxs() -> CodeEvent {
        CodeEvent::Maxs {
            max_stack: 1,
            max_locals: 1,
        }
    }

    fn nop() -> CodeEvent {
        CodeEvent::Instruction(Instruction::Simple(SimpleOp::Nop))
    }

    #[test]
    fn long_forward_goto_is_widened() {
        let mut labels = LabelGenerator::new();
        let target = labels.fresh_label();

        let mut code = vec![start(), CodeEvent::Branch(BranchInstruction::Goto(target))];
        code.extend((0..40_000).map(|_| nop()));
        code.push(CodeEvent::Label(target));
        code.push(CodeEvent::Branch(BranchInstruction::Return));
        code.push(maxs());

        let bytes = write_method(code).unwrap();
        let events = read_code(&bytes);
        assert!(events
            .iter()
            .any(|event| matches!(event, CodeEvent::Branch(BranchInstruction::Goto(_)))));
        assert_eq!(
            events
                .iter()
                .filter(|event| matches!(event, CodeEvent::Instruction(_)))
                .count(),
            40_000
        );
    }

    #[test]
    fn long_conditional_jump_overflows() {
        let mut labels = LabelGenerator::new();
        let target = labels.fresh_label();

        let mut code = vec![
            start(),
            CodeEvent::Instruction(Instruction::Simple(SimpleOp::IConst0)),
            CodeEvent::Branch(BranchInstruction::If(OrdComparison::EQ, target)),
        ];
        code.extend((0..40_000).map(|_| nop()));
        code.push(CodeEvent::Label(target));
        code.push(CodeEvent::Branch(BranchInstruction::Return));
        code.push(maxs());

        assert!(matches!(
            write_method(code),
            Err(Error::BranchOffsetOverflow { .. })
        ));
    }

    #[test]
    fn label_errors() {
        let mut labels = LabelGenerator::new();
        let placed = labels.fresh_label();
        let unplaced = labels.fresh_label();

        let code = vec![
            start(),
            CodeEvent::Label(placed),
            CodeEvent::Branch(BranchInstruction::Goto(unplaced)),
            maxs(),
        ];
        assert!(matches!(
            write_method(code),
            Err(Error::UnplacedLabel(label)) if label == unplaced
        ));

        let code = vec![
            start(),
            CodeEvent::Label(placed),
            nop(),
            CodeEvent::Label(placed),
            CodeEvent::Branch(BranchInstruction::Return),
            maxs(),
        ];
        assert!(matches!(
            write_method(code),
            Err(Error::DuplicateLabel(label)) if label == placed
        ));
    }

    #[test]
    fn two_frames_at_one_offset() {
        let code = vec![
            start(),
            nop(),
            CodeEvent::Frame(Frame::Same),
            CodeEvent::Frame(Frame::Same),
            CodeEvent::Branch(BranchInstruction::Return),
            maxs(),
        ];
        assert!(matches!(
            write_method(code),
            Err(Error::ConflictingFrames(Offset(1)))
        ));
    }

    #[test]
    fn code_too_long() {
        let mut code = vec![start()];
        code.extend((0..70_000).map(|_| nop()));
        code.push(CodeEvent::Branch(BranchInstruction::Return));
        code.push(maxs());
        assert!(matches!(
            write_method(code),
            Err(Error::MethodCodeOverflow(Offset(70_001)))
        ));
    }

    #[test]
    fn frames_survive_a_round_trip() {
        let mut labels = LabelGenerator::new();
        let head = labels.fresh_label();
        let exit = labels.fresh_label();

        let frame = Frame::Full {
            locals: vec![
                VerificationType::Long,
                VerificationType::Object(String::from("[Ljava/lang/String;")),
            ],
            stack: vec![],
        };
        let code = vec![
            start(),
            CodeEvent::Instruction(Instruction::Simple(SimpleOp::LConst0)),
            CodeEvent::Instruction(Instruction::Store(LocalKind::Long, 0)),
            CodeEvent::Instruction(Instruction::Simple(SimpleOp::AConstNull)),
            CodeEvent::Instruction(Instruction::Store(LocalKind::Reference, 2)),
            CodeEvent::Label(head),
            CodeEvent::Frame(frame.clone()),
            CodeEvent::Instruction(Instruction::Simple(SimpleOp::IConst0)),
            CodeEvent::Branch(BranchInstruction::If(OrdComparison::NE, exit)),
            CodeEvent::Branch(BranchInstruction::Goto(head)),
            CodeEvent::Label(exit),
            CodeEvent::Frame(Frame::Chop(1)),
            CodeEvent::Branch(BranchInstruction::Return),
            CodeEvent::Maxs {
                max_stack: 2,
                max_locals: 3,
            },
        ];
        let bytes = write_method(code).unwrap();
        let frames: Vec<LabelledFrame> = read_code(&bytes)
            .into_iter()
            .filter_map(|event| match event {
                CodeEvent::Frame(frame) => Some(frame),
                _ => None,
            })
            .collect();
        assert_eq!(frames, vec![frame, Frame::Chop(1)]);
    }

    #[test]
    fn events_outside_of_a_method() {
        let mut writer = ClassWriter::new();
        assert!(matches!(
            writer.visit(ClassEvent::Code(nop())),
            Err(Error::UnexpectedEvent(_))
        ));
        assert!(matches!(
            ClassWriter::new().into_bytes(),
            Err(Error::UnexpectedEvent(_))
        ));
    }
}
