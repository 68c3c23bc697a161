//! The ten stable opcodes exchanged between client and server (§6).

use crate::error::Error;

/// One of the ten interposed operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Open = 0,
    Close = 1,
    Read = 2,
    Write = 3,
    Lseek = 4,
    Stat = 5,
    Unlink = 6,
    GetDirEntries = 7,
    GetDirTree = 8,
    FreeDirTree = 9,
}

impl Opcode {
    /// The wire value for this opcode.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Opcode::Open),
            1 => Ok(Opcode::Close),
            2 => Ok(Opcode::Read),
            3 => Ok(Opcode::Write),
            4 => Ok(Opcode::Lseek),
            5 => Ok(Opcode::Stat),
            6 => Ok(Opcode::Unlink),
            7 => Ok(Opcode::GetDirEntries),
            8 => Ok(Opcode::GetDirTree),
            9 => Ok(Opcode::FreeDirTree),
            other => Err(Error::UnknownOpcode(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_opcode() {
        let all = [
            Opcode::Open,
            Opcode::Close,
            Opcode::Read,
            Opcode::Write,
            Opcode::Lseek,
            Opcode::Stat,
            Opcode::Unlink,
            Opcode::GetDirEntries,
            Opcode::GetDirTree,
            Opcode::FreeDirTree,
        ];
        for op in all {
            assert_eq!(Opcode::try_from(op.as_u8()).unwrap(), op);
        }
    }

    #[test]
    fn rejects_unknown_opcode() {
        assert!(matches!(Opcode::try_from(200), Err(Error::UnknownOpcode(200))));
    }
}
