//! Insert new locals right after the receiver and parameters
//!
//! Every local at or above the boundary (`first`) moves up by the total width of the inserted
//! slots. Instructions and debug tables only need their slot indices shifted, but stack map
//! frames list locals positionally, so the inserted types have to be spliced into them.
//!
//! Compact frames are relative to the previous frame. To splice them, the original locals are
//! tracked across every frame of the method. A compact frame whose effect is entirely above the
//! boundary means the same thing before and after the insertion, so it is forwarded as is. Other
//! compact frames get turned into full frames (or rejected, depending on [`FramePolicy`]).

use super::classify::verification_type;
use super::settings::FramePolicy;
use super::slots::{MethodContext, SlotAllocator, SlotCursor};
use crate::jvm::{
    slot_width, BinaryName, Error, FieldType, Frame, FrameErrorKind, LabelledFrame,
    LabelledVerificationType, VerificationType,
};
use crate::util::Width;

#[derive(Debug)]
pub struct PrependRemapper {
    /// First slot that is not the receiver or a parameter
    first: usize,

    /// Verification types of the receiver and parameters
    implicit_locals: Vec<LabelledVerificationType>,

    /// Verification types of the inserted slots, one entry per allocation
    prepended_locals: Vec<LabelledVerificationType>,

    cursor: SlotCursor,
    frame_policy: FramePolicy,

    /// Locals of the original code as of the last frame seen (`None` before the first frame)
    original_locals: Option<Vec<LabelledVerificationType>>,
}

impl PrependRemapper {
    pub fn new(context: &MethodContext, frame_policy: FramePolicy) -> PrependRemapper {
        let first = context.first_slot();
        PrependRemapper {
            first,
            implicit_locals: context.implicit_locals(),
            prepended_locals: vec![],
            cursor: SlotCursor::starting_at(first),
            frame_policy,
            original_locals: None,
        }
    }

    pub fn first_slot(&self) -> usize {
        self.first
    }

    pub fn prepended_locals(&self) -> &[LabelledVerificationType] {
        &self.prepended_locals
    }

    /// Insert the prepended locals into a list of original locals at slot `first`
    ///
    /// Slots the list does not reach are padded with `Top`.
    fn splice(
        &self,
        locals: &[LabelledVerificationType],
    ) -> Result<Vec<LabelledVerificationType>, Error> {
        let mut spliced = Vec::with_capacity(locals.len() + self.prepended_locals.len());
        let mut slot = 0;
        let mut remaining = locals.iter();
        while slot < self.first {
            match remaining.next() {
                Some(local) => {
                    if slot + local.width() > self.first {
                        return Err(Error::UnsupportedFrame(FrameErrorKind::StraddlingLocal {
                            slot,
                        }));
                    }
                    slot += local.width();
                    spliced.push(local.clone());
                }
                None => {
                    spliced.push(VerificationType::Top);
                    slot += 1;
                }
            }
        }
        spliced.extend(self.prepended_locals.iter().cloned());
        spliced.extend(remaining.cloned());
        Ok(spliced)
    }
}

impl SlotAllocator for PrependRemapper {
    fn allocate(&mut self, field_type: &FieldType<BinaryName>) -> Result<u16, Error> {
        let slot = self.cursor.allocate(field_type.width())?;
        self.prepended_locals.push(verification_type(field_type));
        Ok(slot)
    }

    fn remap(&self, slot: u16) -> Result<u16, Error> {
        if (slot as usize) < self.first {
            return Ok(slot);
        }
        let remapped = slot as usize + self.cursor.added();
        u16::try_from(remapped).map_err(|_| Error::LocalsOverflow(remapped as u32))
    }

    fn rewrite_frame(&mut self, frame: LabelledFrame) -> Result<LabelledFrame, Error> {
        let is_first = self.original_locals.is_none();
        let previous = match self.original_locals.take() {
            Some(locals) => locals,
            None => self.implicit_locals.clone(),
        };

        // Materialize the locals of the original frame
        let (locals, stack) = match &frame {
            Frame::Same => (previous.clone(), vec![]),
            Frame::SameLocals1Stack(stack) => (previous.clone(), vec![stack.clone()]),
            Frame::Chop(chopped) => {
                let chopped = *chopped as usize;
                if chopped > previous.len() {
                    return Err(Error::UnsupportedFrame(FrameErrorKind::ChopUnderflow {
                        chopped: chopped as u8,
                        available: previous.len(),
                    }));
                }
                (previous[..previous.len() - chopped].to_vec(), vec![])
            }
            Frame::Append(added) => {
                let mut locals = previous.clone();
                locals.extend(added.iter().cloned());
                (locals, vec![])
            }
            Frame::Full { locals, stack } => (locals.clone(), stack.clone()),
        };

        let spliced = self.splice(&locals)?;
        let forward = match &frame {
            _ if is_first => false,
            Frame::Full { .. } => false,
            Frame::Same | Frame::SameLocals1Stack(_) => true,
            Frame::Chop(_) | Frame::Append(_) => {
                slot_width(&previous) >= self.first && slot_width(&locals) >= self.first
            }
        };

        let rewritten = if forward {
            frame
        } else {
            if !is_first && !matches!(frame, Frame::Full { .. }) {
                match self.frame_policy {
                    FramePolicy::Reconstruct => {
                        log::trace!("Reconstructing {:?} as a full frame", frame)
                    }
                    FramePolicy::Reject => {
                        return Err(Error::UnsupportedFrame(
                            FrameErrorKind::CompactFrameAcrossBoundary,
                        ))
                    }
                }
            }
            Frame::Full {
                locals: spliced,
                stack,
            }
        };

        self.original_locals = Some(locals);
        Ok(rewritten)
    }

    fn added_width(&self) -> usize {
        self.cursor.added()
    }
}
