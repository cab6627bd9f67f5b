use crate::util::Width;

/// These types are from [this hierarchy][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.10.1.2
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum VerificationType<Cls, U> {
    /// Unusable slot
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,

    /// In the constructor, the `this` parameter starts with this type then turns into an object
    /// type after `<init>` is called
    UninitializedThis,

    /// Object type
    Object(Cls),

    /// State of an object after `new` has been called by `<init>` has not been called
    ///
    ///   - in the event stream, we use a `Label` for `U`, marking the `new` instruction
    ///   - when serializing into a classfile, we use `u16` for `U`, corresponding to the offset of
    ///     the `new` instruction from the start of the method body
    Uninitialized(U),
}

impl<Cls, U> VerificationType<Cls, U> {
    /// Change the representation of class types and uninitialized offsets
    pub fn map<Cls2, U2, E>(
        &self,
        map_class: impl FnOnce(&Cls) -> Result<Cls2, E>,
        map_uninitialized: impl FnOnce(&U) -> Result<U2, E>,
    ) -> Result<VerificationType<Cls2, U2>, E> {
        Ok(match self {
            VerificationType::Top => VerificationType::Top,
            VerificationType::Integer => VerificationType::Integer,
            VerificationType::Float => VerificationType::Float,
            VerificationType::Double => VerificationType::Double,
            VerificationType::Long => VerificationType::Long,
            VerificationType::Null => VerificationType::Null,
            VerificationType::UninitializedThis => VerificationType::UninitializedThis,
            VerificationType::Object(cls) => VerificationType::Object(map_class(cls)?),
            VerificationType::Uninitialized(u) => {
                VerificationType::Uninitialized(map_uninitialized(u)?)
            }
        })
    }
}

impl<Cls, U> Width for VerificationType<Cls, U> {
    fn width(&self) -> usize {
        match self {
            VerificationType::Double | VerificationType::Long => 2,
            _ => 1,
        }
    }
}

/// Stack map frame as it appears in the event stream
///
/// Compact frames are relative to the previous frame in the method (or to the implicit frame
/// derived from the method descriptor, for the first one). Locals are listed one entry per value,
/// so a `long` is a single entry covering two slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame<Cls, U> {
    /// Same locals as the previous frame, empty stack
    Same,

    /// Same locals as the previous frame, one value on the stack
    SameLocals1Stack(VerificationType<Cls, U>),

    /// Previous frame's locals without the last `k` (1 to 3) entries, empty stack
    Chop(u8),

    /// Previous frame's locals plus 1 to 3 extra entries, empty stack
    Append(Vec<VerificationType<Cls, U>>),

    /// Exactly these locals and stack
    Full {
        locals: Vec<VerificationType<Cls, U>>,
        stack: Vec<VerificationType<Cls, U>>,
    },
}

impl<Cls, U> Frame<Cls, U> {
    /// Change the representation of all class types and uninitialized offsets in the frame
    pub fn map<Cls2, U2, E>(
        &self,
        mut map_class: impl FnMut(&Cls) -> Result<Cls2, E>,
        mut map_uninitialized: impl FnMut(&U) -> Result<U2, E>,
    ) -> Result<Frame<Cls2, U2>, E> {
        Ok(match self {
            Frame::Same => Frame::Same,
            Frame::SameLocals1Stack(stack) => {
                Frame::SameLocals1Stack(stack.map(&mut map_class, &mut map_uninitialized)?)
            }
            Frame::Chop(k) => Frame::Chop(*k),
            Frame::Append(locals) => {
                Frame::Append(map_all(locals, &mut map_class, &mut map_uninitialized)?)
            },
            Frame::Full { locals, stack } => Frame::Full {
                locals: map_all(locals, &mut map_class, &mut map_uninitialized)?,
                stack: map_all(stack, &mut map_class, &mut map_uninitialized)?,
            },
        })
    }
}

fn map_all<Cls, U, Cls2, U2, E, F, G>(
    types: &[VerificationType<Cls, U>],
    map_class: &mut F,
    map_uninitialized: &mut G,
) -> Result<Vec<VerificationType<Cls2, U2>>, E>
where
    F: FnMut(&Cls) -> Result<Cls2, E>,
    G: FnMut(&U) -> Result<U2, E>,
{
    types
        .iter()
        .map(|t| t.map(&mut *map_class, &mut *map_uninitialized))
        .collect()
}

/// Total number of slots taken up by a list of verification types
pub fn slot_width<Cls, U>(types: &[VerificationType<Cls, U>]) -> usize {
    types.iter().map(Width::width).sum()
}

#[cfg(test)]
mod test {
    use super::*;

    type VType = VerificationType<String, usize>;

    #[test]
    fn widths() {
        let locals: Vec<VType> = vec![
            VerificationType::Object(String::from("java/lang/String")),
            VerificationType::Long,
            VerificationType::Integer,
            VerificationType::Double,
        ];
        assert_eq!(slot_width(&locals), 6);
        assert_eq!(slot_width::<String, usize>(&[]), 0);
    }

    #[test]
    fn map_frame() {
        let frame: Frame<String, usize> = Frame::Full {
            locals: vec![VerificationType::Object(String::from("A")), VerificationType::Top],
            stack: vec![VerificationType::Uninitialized(7)],
        };
        let mapped = frame
            .map(
                |cls| Ok::<_, ()>(cls.len()),
                |off| Ok::<_, ()>(*off as u16 + 1),
            )
            .unwrap();
        assert_eq!(
            mapped,
            Frame::Full {
                locals: vec![VerificationType::Object(1), VerificationType::Top],
                stack: vec![VerificationType::Uninitialized(8)],
            }
        );
    }
}
