use crate::jvm::class_file::{Attribute, ConstantsPool, Deserialize, Serialize, Version};
use crate::jvm::{
    ClassAccessFlags, ClassConstantIndex, DecodeErrorKind, Error, FieldAccessFlags,
    MethodAccessFlags, Utf8ConstantIndex,
};
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Representation of the [`class` file format of the JVM][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub version: Version,
    pub constants: ConstantsPool,
    pub access_flags: ClassAccessFlags,
    pub this_class: ClassConstantIndex,

    /// Zero only for `java/lang/Object` and `module-info`
    pub super_class: ClassConstantIndex,
    pub interfaces: Vec<ClassConstantIndex>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Magic header bytes that go at the front of the serialized class file
    const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

    /// Parse a class file from its bytes
    ///
    /// Attributes stay in their raw form: see [`crate::jvm::reader`] for decoding method bodies.
    pub fn read(bytes: &[u8]) -> Result<ClassFile, Error> {
        let mut reader: &[u8] = bytes;

        let magic = u32::deserialize(&mut reader)?;
        if magic.to_be_bytes() != ClassFile::MAGIC {
            return Err(Error::Decode(DecodeErrorKind::BadMagic(magic)));
        }

        let class_file = ClassFile {
            version: Version::deserialize(&mut reader)?,
            constants: ConstantsPool::read(&mut reader)?,
            access_flags: ClassAccessFlags::deserialize(&mut reader)?,
            this_class: ClassConstantIndex::deserialize(&mut reader)?,
            super_class: ClassConstantIndex::deserialize(&mut reader)?,
            interfaces: Vec::deserialize(&mut reader)?,
            fields: Vec::deserialize(&mut reader)?,
            methods: Vec::deserialize(&mut reader)?,
            attributes: Vec::deserialize(&mut reader)?,
        };

        if !reader.is_empty() {
            return Err(Error::Decode(DecodeErrorKind::TrailingBytes("ClassFile")));
        }
        Ok(class_file)
    }
}

impl Serialize for ClassFile {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&ClassFile::MAGIC)?;
        self.version.serialize(writer)?;
        self.constants.serialize(writer)?;
        self.access_flags.serialize(writer)?;
        self.this_class.serialize(writer)?;
        self.super_class.serialize(writer)?;
        self.interfaces.serialize(writer)?;
        self.fields.serialize(writer)?;
        self.methods.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

/// Field declared by a class or interface
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.5
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub access_flags: FieldAccessFlags,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub attributes: Vec<Attribute>,
}

impl Serialize for Field {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.access_flags.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Field {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::io::Result<Self> {
        Ok(Field {
            access_flags: FieldAccessFlags::deserialize(reader)?,
            name_index: Utf8ConstantIndex::deserialize(reader)?,
            descriptor_index: Utf8ConstantIndex::deserialize(reader)?,
            attributes: Vec::deserialize(reader)?,
        })
    }
}

/// Method declared by a class or interface
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.6
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub access_flags: MethodAccessFlags,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub attributes: Vec<Attribute>,
}

impl Serialize for Method {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.access_flags.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Method {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::io::Result<Self> {
        Ok(Method {
            access_flags: MethodAccessFlags::deserialize(reader)?,
            name_index: Utf8ConstantIndex::deserialize(reader)?,
            descriptor_index: Utf8ConstantIndex::deserialize(reader)?,
            attributes: Vec::deserialize(reader)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn minimal_class() -> ClassFile {
        let mut constants = ConstantsPool::new();
        let this_class = constants.get_class("Minimal").unwrap();
        let super_class = constants.get_class("java/lang/Object").unwrap();
        ClassFile {
            version: Version::JAVA8,
            constants,
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            this_class,
            super_class,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            attributes: vec![],
        }
    }

    #[test]
    fn read_what_was_written() {
        let class = minimal_class();
        let mut bytes = vec![];
        class.serialize(&mut bytes).unwrap();
        assert_eq!(&bytes[0..8], &[0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52]);

        let reread = ClassFile::read(&bytes).unwrap();
        assert_eq!(reread.version, Version::JAVA8);
        assert_eq!(reread.constants.class_name(reread.this_class).unwrap(), "Minimal");
        assert_eq!(reread.access_flags, class.access_flags);
    }

    #[test]
    fn reject_bad_input() {
        let mut bytes = vec![];
        minimal_class().serialize(&mut bytes).unwrap();

        let mut bad_magic = bytes.clone();
        bad_magic[0] = 0xCB;
        assert!(matches!(
            ClassFile::read(&bad_magic),
            Err(Error::Decode(DecodeErrorKind::BadMagic(0xCBFE_BABE)))
        ));

        assert!(matches!(
            ClassFile::read(&bytes[..bytes.len() - 1]),
            Err(Error::Decode(DecodeErrorKind::Truncated))
        ));

        let mut trailing = bytes;
        trailing.push(0);
        assert!(matches!(
            ClassFile::read(&trailing),
            Err(Error::Decode(DecodeErrorKind::TrailingBytes(_)))
        ));
    }
}
