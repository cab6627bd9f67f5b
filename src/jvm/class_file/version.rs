use crate::jvm::class_file::{Deserialize, Serialize};
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Class file format version
///
/// Stack map frames are mandatory from [`Version::JAVA7`] onwards, and `jsr`/`ret` are forbidden
/// in any class that has them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

impl Version {
    pub const JAVA6: Version = Version::new(50, 0);
    pub const JAVA7: Version = Version::new(51, 0);
    pub const JAVA8: Version = Version::new(52, 0);
    pub const JAVA11: Version = Version::new(55, 0);
    pub const JAVA17: Version = Version::new(61, 0);

    pub const fn new(major: u16, minor: u16) -> Version {
        Version { major, minor }
    }
}

/// Minor comes first in the binary format
impl Serialize for Version {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.minor.serialize(writer)?;
        self.major.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Version {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::io::Result<Self> {
        let minor = u16::deserialize(reader)?;
        let major = u16::deserialize(reader)?;
        Ok(Version { major, minor })
    }
}
