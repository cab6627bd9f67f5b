use super::classify::verification_type;
use crate::jvm::{
    BinaryName, CodeHeader, Error, FieldType, LabelledFrame, LabelledVerificationType,
    MethodAccessFlags, MethodDescriptor, MethodHeader, UnqualifiedName, VerificationType,
};

/// Hands out fresh local variable slots
///
/// Slots are issued in increasing order and never reused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotCursor {
    /// Next slot to be handed out
    next: usize,

    /// Total width of everything handed out so far
    added: usize,
}

impl SlotCursor {
    pub fn starting_at(first: usize) -> SlotCursor {
        SlotCursor {
            next: first,
            added: 0,
        }
    }

    /// Reserve `width` consecutive slots, returning the first one
    pub fn allocate(&mut self, width: usize) -> Result<u16, Error> {
        let slot = self.next;
        let end = slot + width;
        if end > u16::MAX as usize {
            return Err(Error::LocalsOverflow(end as u32));
        }
        self.next = end;
        self.added += width;
        Ok(slot as u16)
    }

    pub fn next(&self) -> usize {
        self.next
    }

    pub fn added(&self) -> usize {
        self.added
    }
}

/// Decides where new local variables go and how existing ones move to make room
///
/// One allocator is used for exactly one method body. It sees the code header before any
/// allocation, then every slot reference and every frame of the body in order.
pub trait SlotAllocator {
    /// Called with the declared limits of the method body, before anything else
    fn begin_code(&mut self, _header: &CodeHeader) -> Result<(), Error> {
        Ok(())
    }

    /// Reserve a fresh local variable for a value of the given type
    fn allocate(&mut self, field_type: &FieldType<BinaryName>) -> Result<u16, Error>;

    /// New index of a local variable that the original code refers to as `slot`
    fn remap(&self, slot: u16) -> Result<u16, Error>;

    /// Adjust a stack map frame of the original code
    fn rewrite_frame(&mut self, frame: LabelledFrame) -> Result<LabelledFrame, Error>;

    /// Total width of all the allocated slots
    fn added_width(&self) -> usize;

    /// Adjust the declared `max_locals` of the method body
    fn max_locals(&self, declared: u16) -> Result<u16, Error> {
        let max_locals = declared as usize + self.added_width();
        u16::try_from(max_locals).map_err(|_| Error::LocalsOverflow(max_locals as u32))
    }
}

/// What the rewriter needs to know about the method whose body is being rewritten
#[derive(Clone, Debug)]
pub struct MethodContext {
    pub access_flags: MethodAccessFlags,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,

    /// Class declaring the method (type of the receiver)
    pub class_name: BinaryName,
}

impl MethodContext {
    pub fn new(method: &MethodHeader, class_name: BinaryName) -> MethodContext {
        MethodContext {
            access_flags: method.access_flags,
            name: method.name.clone(),
            descriptor: method.descriptor.clone(),
            class_name,
        }
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_constructor(&self) -> bool {
        self.name == UnqualifiedName::INIT
    }

    /// First slot not implicitly occupied by the receiver or the parameters
    pub fn first_slot(&self) -> usize {
        self.descriptor.parameter_length(!self.is_static())
    }

    /// Locals of the frame the verifier starts from, one entry per value
    pub fn implicit_locals(&self) -> Vec<LabelledVerificationType> {
        let mut locals = Vec::with_capacity(self.descriptor.parameters.len() + 1);
        if !self.is_static() {
            // `java/lang/Object` has no superclass constructor to call
            if self.is_constructor() && self.class_name != BinaryName::OBJECT {
                locals.push(VerificationType::UninitializedThis);
            } else {
                locals.push(VerificationType::Object(self.class_name.to_string()));
            }
        }
        locals.extend(self.descriptor.parameters.iter().map(verification_type));
        locals
    }
}
