use super::slots::SlotAllocator;
use crate::jvm::code::{
    CodeTypeAnnotation, Instruction, Label, LocalKind, SimpleOp, TypeAnnotationTarget,
};
use crate::jvm::{ClassEvent, ClassVisitor, CodeEvent, Error, FieldType, LocalVariable};

/// Rewrites the code events of one method body
///
/// Right after the start of the code, a fresh `int` local is allocated and initialized to `-1`.
/// Every other event goes through the allocator: slot references get remapped, frames get
/// rewritten, and the declared limits get adjusted for the new local.
pub struct MethodRewriteDriver {
    allocator: Box<dyn SlotAllocator>,

    /// Slot of the injected local, once allocated
    sentinel: Option<u16>,
}

impl MethodRewriteDriver {
    pub fn new(allocator: Box<dyn SlotAllocator>) -> MethodRewriteDriver {
        MethodRewriteDriver {
            allocator,
            sentinel: None,
        }
    }

    /// Slot of the injected local (`None` until the code has started)
    pub fn sentinel_slot(&self) -> Option<u16> {
        self.sentinel
    }

    /// Rewrite one event of the method body, forwarding the result to `next`
    pub fn visit_code(
        &mut self,
        event: CodeEvent,
        next: &mut impl ClassVisitor,
    ) -> Result<(), Error> {
        let event = match event {
            CodeEvent::Start(header) => {
                self.allocator.begin_code(&header)?;
                next.visit(ClassEvent::Code(CodeEvent::Start(header)))?;

                // The injected instructions use the new numbering already
                let slot = self.allocator.allocate(&FieldType::int())?;
                self.sentinel = Some(slot);
                log::trace!("Initializing injected local {}", slot);
                next.visit(ClassEvent::Code(CodeEvent::Instruction(
                    Instruction::Simple(SimpleOp::IConstM1),
                )))?;
                next.visit(ClassEvent::Code(CodeEvent::Instruction(
                    Instruction::Store(LocalKind::Int, slot),
                )))?;
                return Ok(());
            }
            CodeEvent::Instruction(instruction) => CodeEvent::Instruction(
                instruction.map_local_slot(|slot| self.allocator.remap(slot))?,
            ),
            CodeEvent::Frame(frame) => CodeEvent::Frame(self.allocator.rewrite_frame(frame)?),
            CodeEvent::LocalVariable(variable) => {
                CodeEvent::LocalVariable(self.remap_variable(variable)?)
            }
            CodeEvent::LocalVariableType(variable) => {
                CodeEvent::LocalVariableType(self.remap_variable(variable)?)
            }
            CodeEvent::TypeAnnotation(annotation) => {
                CodeEvent::TypeAnnotation(self.remap_annotation(annotation)?)
            }
            CodeEvent::Maxs {
                max_stack,
                max_locals,
            } => CodeEvent::Maxs {
                max_stack: max_stack.max(1),
                max_locals: self.allocator.max_locals(max_locals)?,
            },
            other => other,
        };
        next.visit(ClassEvent::Code(event))
    }

    fn remap_variable(&self, variable: LocalVariable) -> Result<LocalVariable, Error> {
        Ok(LocalVariable {
            index: self.allocator.remap(variable.index)?,
            ..variable
        })
    }

    fn remap_annotation(
        &self,
        mut annotation: CodeTypeAnnotation<Label>,
    ) -> Result<CodeTypeAnnotation<Label>, Error> {
        if let TypeAnnotationTarget::LocalVariable { table, .. } = &mut annotation.target {
            for range in table {
                range.index = self.allocator.remap(range.index)?;
            }
        }
        Ok(annotation)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{BranchInstruction, LabelGenerator, LocalVariableRange};
    use crate::jvm::{
        BinaryName, CodeHeader, ConstantIndex, Frame, MethodAccessFlags, MethodDescriptor, Name,
        ParseDescriptor, UnqualifiedName, Utf8ConstantIndex, VerificationType,
    };
    use crate::rewrite::{AppendAllocator, FramePolicy, MethodContext, PrependRemapper};

    fn prepend_driver(flags: MethodAccessFlags, descriptor: &str) -> MethodRewriteDriver {
        let context = MethodContext {
            access_flags: flags,
            name: UnqualifiedName::from_string(String::from("run")).unwrap(),
            descriptor: MethodDescriptor::parse(descriptor).unwrap(),
            class_name: BinaryName::from_string(String::from("me/Owner")).unwrap(),
        };
        MethodRewriteDriver::new(Box::new(PrependRemapper::new(
            &context,
            FramePolicy::Reconstruct,
        )))
    }

    fn run(driver: &mut MethodRewriteDriver, events: Vec<CodeEvent>) -> Vec<CodeEvent> {
        let mut output: Vec<ClassEvent> = vec![];
        for event in events {
            driver.visit_code(event, &mut output).unwrap();
        }
        output
            .into_iter()
            .map(|event| match event {
                ClassEvent::Code(code) => code,
                other => panic!("unexpected event {:?}", other),
            })
            .collect()
    }

    #[test]
    fn instance_method_with_int_parameter() {
        let mut labels = LabelGenerator::new();
        let start = labels.fresh_label();
        let end = labels.fresh_label();

        let mut driver = prepend_driver(MethodAccessFlags::PUBLIC, "(I)V");
        let output = run(
            &mut driver,
            vec![
                CodeEvent::Start(CodeHeader {
                    max_stack: 0,
                    max_locals: 3,
                }),
                CodeEvent::Label(start),
                CodeEvent::Instruction(Instruction::Load(LocalKind::Int, 1)),
                CodeEvent::Instruction(Instruction::Store(LocalKind::Int, 2)),
                CodeEvent::Instruction(Instruction::IInc(2, 1)),
                CodeEvent::Branch(BranchInstruction::Return),
                CodeEvent::Label(end),
                CodeEvent::LocalVariable(LocalVariable {
                    name: Utf8ConstantIndex(ConstantIndex(10)),
                    descriptor: Utf8ConstantIndex(ConstantIndex(11)),
                    start,
                    end,
                    index: 2,
                }),
                CodeEvent::Maxs {
                    max_stack: 0,
                    max_locals: 3,
                },
            ],
        );
        assert_eq!(driver.sentinel_slot(), Some(2));
        assert_eq!(
            output,
            vec![
                CodeEvent::Start(CodeHeader {
                    max_stack: 0,
                    max_locals: 3,
                }),
                CodeEvent::Instruction(Instruction::Simple(SimpleOp::IConstM1)),
                CodeEvent::Instruction(Instruction::Store(LocalKind::Int, 2)),
                CodeEvent::Label(start),
                CodeEvent::Instruction(Instruction::Load(LocalKind::Int, 1)),
                CodeEvent::Instruction(Instruction::Store(LocalKind::Int, 3)),
                CodeEvent::Instruction(Instruction::IInc(3, 1)),
                CodeEvent::Branch(BranchInstruction::Return),
                CodeEvent::Label(end),
                CodeEvent::LocalVariable(LocalVariable {
                    name: Utf8ConstantIndex(ConstantIndex(10)),
                    descriptor: Utf8ConstantIndex(ConstantIndex(11)),
                    start,
                    end,
                    index: 3,
                }),
                CodeEvent::Maxs {
                    max_stack: 1,
                    max_locals: 4,
                },
            ]
        );
    }

    #[test]
    fn type_annotation_indices_are_remapped() {
        let mut labels = LabelGenerator::new();
        let start = labels.fresh_label();
        let end = labels.fresh_label();
        let annotation = |indices: [u16; 2]| {
            CodeEvent::TypeAnnotation(CodeTypeAnnotation {
                visible: true,
                target: TypeAnnotationTarget::LocalVariable {
                    resource: false,
                    table: indices
                        .iter()
                        .map(|index| LocalVariableRange {
                            start,
                            end,
                            index: *index,
                        })
                        .collect(),
                },
                type_path: vec![],
                annotation: vec![0, 5, 0, 0],
            })
        };

        let mut driver = prepend_driver(MethodAccessFlags::STATIC, "(J)V");
        let output = run(
            &mut driver,
            vec![
                CodeEvent::Start(CodeHeader {
                    max_stack: 2,
                    max_locals: 4,
                }),
                annotation([1, 2]),
            ],
        );
        assert_eq!(output[3], annotation([1, 3]));
    }

    #[test]
    fn frames_go_through_the_allocator() {
        let mut driver = prepend_driver(MethodAccessFlags::STATIC, "(I)V");
        let output = run(
            &mut driver,
            vec![
                CodeEvent::Start(CodeHeader {
                    max_stack: 1,
                    max_locals: 1,
                }),
                CodeEvent::Frame(Frame::Same),
            ],
        );
        assert_eq!(
            output[3],
            CodeEvent::Frame(Frame::Full {
                locals: vec![VerificationType::Integer, VerificationType::Integer],
                stack: vec![],
            })
        );
    }

    #[test]
    fn append_leaves_slots_alone() {
        let mut driver = MethodRewriteDriver::new(Box::new(AppendAllocator::new()));
        let output = run(
            &mut driver,
            vec![
                CodeEvent::Start(CodeHeader {
                    max_stack: 3,
                    max_locals: 2,
                }),
                CodeEvent::Instruction(Instruction::Load(LocalKind::Reference, 1)),
                CodeEvent::Frame(Frame::Chop(1)),
                CodeEvent::Maxs {
                    max_stack: 3,
                    max_locals: 2,
                },
            ],
        );
        assert_eq!(driver.sentinel_slot(), Some(2));
        assert_eq!(
            output[1..],
            [
                CodeEvent::Instruction(Instruction::Simple(SimpleOp::IConstM1)),
                CodeEvent::Instruction(Instruction::Store(LocalKind::Int, 2)),
                CodeEvent::Instruction(Instruction::Load(LocalKind::Reference, 1)),
                CodeEvent::Frame(Frame::Chop(1)),
                CodeEvent::Maxs {
                    max_stack: 3,
                    max_locals: 3,
                },
            ]
        );
    }
}
