use super::slots::{SlotAllocator, SlotCursor};
use crate::jvm::{BinaryName, CodeHeader, Error, FieldType, LabelledFrame};
use crate::util::Width;

/// Put new locals past every slot the original code declares
///
/// Nothing in the original code moves, so slot references and frames are left alone. The new
/// slots are never mentioned in frames, which makes them `Top` for the verifier at every branch
/// target.
#[derive(Debug, Default)]
pub struct AppendAllocator {
    /// Set up once the declared `max_locals` is known
    cursor: Option<SlotCursor>,
}

impl AppendAllocator {
    pub fn new() -> AppendAllocator {
        AppendAllocator { cursor: None }
    }
}

impl SlotAllocator for AppendAllocator {
    fn begin_code(&mut self, header: &CodeHeader) -> Result<(), Error> {
        self.cursor = Some(SlotCursor::starting_at(header.max_locals as usize));
        Ok(())
    }

    fn allocate(&mut self, field_type: &FieldType<BinaryName>) -> Result<u16, Error> {
        match &mut self.cursor {
            Some(cursor) => cursor.allocate(field_type.width()),
            None => Err(Error::UnexpectedEvent("slot allocated before the start of the code")),
        }
    }

    fn remap(&self, slot: u16) -> Result<u16, Error> {
        Ok(slot)
    }

    fn rewrite_frame(&mut self, frame: LabelledFrame) -> Result<LabelledFrame, Error> {
        Ok(frame)
    }

    fn added_width(&self) -> usize {
        self.cursor.as_ref().map_or(0, SlotCursor::added)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::{Frame, VerificationType};

    #[test]
    fn slots_start_at_declared_max_locals() {
        let mut allocator = AppendAllocator::new();
        allocator
            .begin_code(&CodeHeader {
                max_stack: 2,
                max_locals: 5,
            })
            .unwrap();
        assert_eq!(allocator.allocate(&FieldType::int()).unwrap(), 5);
        assert_eq!(allocator.allocate(&FieldType::double()).unwrap(), 6);
        assert_eq!(allocator.allocate(&FieldType::int()).unwrap(), 8);
        assert_eq!(allocator.added_width(), 4);
        assert_eq!(allocator.max_locals(5).unwrap(), 9);
    }

    #[test]
    fn original_code_is_untouched() {
        let mut allocator = AppendAllocator::new();
        allocator
            .begin_code(&CodeHeader {
                max_stack: 0,
                max_locals: 3,
            })
            .unwrap();
        allocator.allocate(&FieldType::long()).unwrap();
        for slot in [0, 1, 2, 3, 100, u16::MAX] {
            assert_eq!(allocator.remap(slot).unwrap(), slot);
        }

        let frame = Frame::Chop(2);
        assert_eq!(allocator.rewrite_frame(frame.clone()).unwrap(), frame);
        let frame = Frame::Append(vec![VerificationType::Integer]);
        assert_eq!(allocator.rewrite_frame(frame.clone()).unwrap(), frame);
    }

    #[test]
    fn allocate_before_start() {
        let mut allocator = AppendAllocator::new();
        assert!(matches!(
            allocator.allocate(&FieldType::int()),
            Err(Error::UnexpectedEvent(_))
        ));
        assert_eq!(allocator.added_width(), 0);
    }

    #[test]
    fn no_room_left() {
        let mut allocator = AppendAllocator::new();
        allocator
            .begin_code(&CodeHeader {
                max_stack: 0,
                max_locals: u16::MAX,
            })
            .unwrap();
        assert!(matches!(
            allocator.allocate(&FieldType::int()),
            Err(Error::LocalsOverflow(65536))
        ));
    }
}
