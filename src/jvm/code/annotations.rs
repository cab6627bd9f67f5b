//! Type annotations attached to a `Code` attribute
//!
//! Inside method bodies, type annotations point at bytecode offsets (and, for local variable
//! annotations, at local variable slots). Everything else about them (the type path and the
//! annotation itself) is opaque to the rewriter and gets carried around as raw bytes.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.20

use crate::jvm::class_file::{read_bytes, Deserialize, Serialize};
use crate::jvm::{DecodeErrorKind, Error};
use byteorder::WriteBytesExt;

/// Name of the attribute holding annotations retained at runtime
pub const RUNTIME_VISIBLE_TYPE_ANNOTATIONS: &str = "RuntimeVisibleTypeAnnotations";

/// Name of the attribute holding annotations only present in the class file
pub const RUNTIME_INVISIBLE_TYPE_ANNOTATIONS: &str = "RuntimeInvisibleTypeAnnotations";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeTypeAnnotation<Lbl> {
    /// Is this from `RuntimeVisibleTypeAnnotations` (as opposed to the invisible ones)?
    pub visible: bool,

    pub target: TypeAnnotationTarget<Lbl>,

    /// Encoded `type_path` entries (two bytes per entry, without the leading length)
    pub type_path: Vec<u8>,

    /// Encoded `annotation` structure
    pub annotation: Vec<u8>,
}

/// Part of the method body a type annotation applies to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeAnnotationTarget<Lbl> {
    /// Type in a local variable declaration (`0x40`) or resource variable declaration (`0x41`)
    LocalVariable {
        resource: bool,
        table: Vec<LocalVariableRange<Lbl>>,
    },

    /// Type in an exception parameter declaration (`0x42`)
    Catch { exception_table_index: u16 },

    /// Type in `instanceof`, `new`, or a method reference (`0x43` to `0x46`)
    Offset { target_type: u8, offset: Lbl },

    /// Type argument in a cast, constructor call, or method call (`0x47` to `0x4B`)
    TypeArgument {
        target_type: u8,
        offset: Lbl,
        type_argument_index: u8,
    },
}

/// Live range of the local variable an annotation applies to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalVariableRange<Lbl> {
    pub start: Lbl,
    pub end: Lbl,
    pub index: u16,
}

impl<Lbl> TypeAnnotationTarget<Lbl> {
    pub fn target_type(&self) -> u8 {
        match self {
            TypeAnnotationTarget::LocalVariable { resource, .. } => {
                if *resource {
                    0x41
                } else {
                    0x40
                }
            }
            TypeAnnotationTarget::Catch { .. } => 0x42,
            TypeAnnotationTarget::Offset { target_type, .. }
            | TypeAnnotationTarget::TypeArgument { target_type, .. } => *target_type,
        }
    }

    pub fn map_labels<Lbl2, E>(
        &self,
        mut map_label: impl FnMut(&Lbl) -> Result<Lbl2, E>,
    ) -> Result<TypeAnnotationTarget<Lbl2>, E> {
        Ok(match self {
            TypeAnnotationTarget::LocalVariable { resource, table } => {
                let mut mapped = Vec::with_capacity(table.len());
                for range in table {
                    mapped.push(LocalVariableRange {
                        start: map_label(&range.start)?,
                        end: map_label(&range.end)?,
                        index: range.index,
                    });
                }
                TypeAnnotationTarget::LocalVariable {
                    resource: *resource,
                    table: mapped,
                }
            }
            TypeAnnotationTarget::Catch {
                exception_table_index,
            } => TypeAnnotationTarget::Catch {
                exception_table_index: *exception_table_index,
            },
            TypeAnnotationTarget::Offset {
                target_type,
                offset,
            } => TypeAnnotationTarget::Offset {
                target_type: *target_type,
                offset: map_label(offset)?,
            },
            TypeAnnotationTarget::TypeArgument {
                target_type,
                offset,
                type_argument_index,
            } => TypeAnnotationTarget::TypeArgument {
                target_type: *target_type,
                offset: map_label(offset)?,
                type_argument_index: *type_argument_index,
            },
        })
    }
}

impl<Lbl> CodeTypeAnnotation<Lbl> {
    pub fn map_labels<Lbl2, E>(
        &self,
        map_label: impl FnMut(&Lbl) -> Result<Lbl2, E>,
    ) -> Result<CodeTypeAnnotation<Lbl2>, E> {
        Ok(CodeTypeAnnotation {
            visible: self.visible,
            target: self.target.map_labels(map_label)?,
            type_path: self.type_path.clone(),
            annotation: self.annotation.clone(),
        })
    }
}

/// Decode the body of a `Runtime{Visible,Invisible}TypeAnnotations` attribute on `Code`
///
/// Offsets are left as absolute bytecode offsets. In the local variable table, `end` is the
/// exclusive end offset (`start_pc + length`).
pub fn read_code_type_annotations(
    info: &[u8],
    visible: bool,
) -> Result<Vec<CodeTypeAnnotation<u16>>, Error> {
    let mut reader: &[u8] = info;
    let count = u16::deserialize(&mut reader)?;
    let mut annotations = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let target_type = u8::deserialize(&mut reader)?;
        let target = match target_type {
            0x40 | 0x41 => {
                let table_length = u16::deserialize(&mut reader)?;
                let mut table = Vec::with_capacity(table_length as usize);
                for _ in 0..table_length {
                    let start = u16::deserialize(&mut reader)?;
                    let length = u16::deserialize(&mut reader)?;
                    let index = u16::deserialize(&mut reader)?;
                    let end = start
                        .checked_add(length)
                        .ok_or(Error::Decode(DecodeErrorKind::InvalidCodeOffset(
                            start as usize + length as usize,
                        )))?;
                    table.push(LocalVariableRange { start, end, index });
                }
                TypeAnnotationTarget::LocalVariable {
                    resource: target_type == 0x41,
                    table,
                }
            }
            0x42 => TypeAnnotationTarget::Catch {
                exception_table_index: u16::deserialize(&mut reader)?,
            },
            0x43..=0x46 => TypeAnnotationTarget::Offset {
                target_type,
                offset: u16::deserialize(&mut reader)?,
            },
            0x47..=0x4B => TypeAnnotationTarget::TypeArgument {
                target_type,
                offset: u16::deserialize(&mut reader)?,
                type_argument_index: u8::deserialize(&mut reader)?,
            },
            other => {
                return Err(Error::Decode(DecodeErrorKind::BadTypeAnnotationTarget(
                    other,
                )))
            }
        };

        let path_length = u8::deserialize(&mut reader)? as usize;
        let type_path = read_bytes(&mut reader, 2 * path_length)?;

        let before: &[u8] = reader;
        skip_annotation(&mut reader)?;
        let annotation = before[..before.len() - reader.len()].to_vec();

        annotations.push(CodeTypeAnnotation {
            visible,
            target,
            type_path,
            annotation,
        });
    }

    if !reader.is_empty() {
        let name = if visible {
            RUNTIME_VISIBLE_TYPE_ANNOTATIONS
        } else {
            RUNTIME_INVISIBLE_TYPE_ANNOTATIONS
        };
        return Err(Error::Decode(DecodeErrorKind::TrailingBytes(name)));
    }
    Ok(annotations)
}

/// Encode annotations back into an attribute body (the `visible` field is ignored)
pub fn write_code_type_annotations<'a, W: WriteBytesExt>(
    annotations: impl ExactSizeIterator<Item = &'a CodeTypeAnnotation<u16>>,
    writer: &mut W,
) -> std::io::Result<()> {
    (annotations.len() as u16).serialize(writer)?;
    for annotation in annotations {
        annotation.target.target_type().serialize(writer)?;
        match &annotation.target {
            TypeAnnotationTarget::LocalVariable { table, .. } => {
                (table.len() as u16).serialize(writer)?;
                for range in table {
                    range.start.serialize(writer)?;
                    range.end.wrapping_sub(range.start).serialize(writer)?;
                    range.index.serialize(writer)?;
                }
            }
            TypeAnnotationTarget::Catch {
                exception_table_index,
            } => exception_table_index.serialize(writer)?,
            TypeAnnotationTarget::Offset { offset, .. } => offset.serialize(writer)?,
            TypeAnnotationTarget::TypeArgument {
                offset,
                type_argument_index,
                ..
            } => {
                offset.serialize(writer)?;
                type_argument_index.serialize(writer)?;
            }
        }
        ((annotation.type_path.len() / 2) as u8).serialize(writer)?;
        writer.write_all(&annotation.type_path)?;
        writer.write_all(&annotation.annotation)?;
    }
    Ok(())
}

/// Advance past an `annotation` structure
fn skip_annotation(reader: &mut &[u8]) -> Result<(), Error> {
    let _type_index = u16::deserialize(reader)?;
    let pairs = u16::deserialize(reader)?;
    for _ in 0..pairs {
        let _element_name_index = u16::deserialize(reader)?;
        skip_element_value(reader)?;
    }
    Ok(())
}

/// Advance past an `element_value` structure
fn skip_element_value(reader: &mut &[u8]) -> Result<(), Error> {
    let tag = u8::deserialize(reader)?;
    match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => {
            let _index = u16::deserialize(reader)?;
        }
        b'e' => {
            let _type_name_index = u16::deserialize(reader)?;
            let _const_name_index = u16::deserialize(reader)?;
        }
        b'@' => skip_annotation(reader)?,
        b'[' => {
            let values = u16::deserialize(reader)?;
            for _ in 0..values {
                skip_element_value(reader)?;
            }
        }
        other => return Err(Error::Decode(DecodeErrorKind::BadElementValueTag(other))),
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    /// `@Foo(value = {1, 2}, nested = @Bar)` on a local variable in slot 3 live over `[4, 10)`,
    /// followed by an offset annotation without elements at offset 7
    fn sample() -> Vec<u8> {
        vec![
            0, 2, // two annotations
            0x40, 0, 1, 0, 4, 0, 6, 0, 3, // localvar_target
            1, 3, 0, // type path with one entry
            0, 20, 0, 2, // annotation type #20 with two pairs
            0, 21, b'[', 0, 2, b'I', 0, 22, b'I', 0, 23, // value = {1, 2}
            0, 24, b'@', 0, 25, 0, 0, // nested = @Bar
            0x44, 0, 7, // offset_target
            0, // empty type path
            0, 26, 0, 0, // annotation type #26 without pairs
        ]
    }

    #[test]
    fn decode_targets_and_keep_bodies() {
        let annotations = read_code_type_annotations(&sample(), true).unwrap();
        assert_eq!(annotations.len(), 2);
        assert_eq!(
            annotations[0].target,
            TypeAnnotationTarget::LocalVariable {
                resource: false,
                table: vec![LocalVariableRange {
                    start: 4,
                    end: 10,
                    index: 3
                }],
            }
        );
        assert_eq!(annotations[0].type_path, vec![3, 0]);
        assert_eq!(annotations[0].annotation.len(), 22);
        assert_eq!(
            annotations[1].target,
            TypeAnnotationTarget::Offset {
                target_type: 0x44,
                offset: 7
            }
        );

        let mut bytes = vec![];
        write_code_type_annotations(annotations.iter(), &mut bytes).unwrap();
        assert_eq!(bytes, sample());
    }

    #[test]
    fn rejects_targets_outside_code() {
        let bytes = [0, 1, 0x10, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            read_code_type_annotations(&bytes, false),
            Err(Error::Decode(DecodeErrorKind::BadTypeAnnotationTarget(0x10)))
        ));
    }

    #[test]
    fn rejects_bad_element_values() {
        let bytes = [0, 1, 0x43, 0, 0, 0, 0, 1, 0, 1, 0, 2, b'x', 0, 0];
        assert!(matches!(
            read_code_type_annotations(&bytes, false),
            Err(Error::Decode(DecodeErrorKind::BadElementValueTag(b'x')))
        ));
    }
}
