//! Bank images: named contiguous byte ranges mapped to CPU address space.
//! Stored kinds hold an actual byte image; unstored kinds only track
//! reserved addresses.

use ember_source::identifier::Identifier;

/// The storage class of a bank, as named by the builtin bank element
/// types (`prgdata`, `constdata`, `chrdata`, `vardata`, `varinitdata`).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BankKind {
    /// Executable ROM.
    Program,
    /// Read-only data in ROM.
    Constant,
    /// Graphics/character ROM.
    Character,
    /// RAM: addresses reserved, no bytes emitted.
    Variable,
    /// RAM with a ROM-stored initialization image.
    InitializedVariable,
}

impl BankKind {
    /// Whether bytes are emitted into an image for this kind.
    pub fn is_stored(self) -> bool {
        !matches!(self, BankKind::Variable)
    }

    /// Whether code/data writes (as opposed to reservations) are legal.
    pub fn is_writable(self) -> bool {
        self.is_stored()
    }

    pub fn describe(self) -> &'static str {
        match self {
            BankKind::Program => "prgdata",
            BankKind::Constant => "constdata",
            BankKind::Character => "chrdata",
            BankKind::Variable => "vardata",
            BankKind::InitializedVariable => "varinitdata",
        }
    }
}

/// Errors from bank operations; callers attach locations and report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankError {
    /// Writing or reserving past `capacity`.
    Overflow { requested: usize, available: usize },
    /// Seeking before the bank's origin or past its end.
    SeekOutsideRange { address: u32 },
    /// Writing into a bank kind that stores no bytes.
    NotStored,
}

/// A named byte image with a capacity, an optional fixed origin, and a
/// current position tracked both relative to the bank start and as an
/// absolute platform address.
#[derive(Debug)]
pub struct Bank {
    name: Identifier,
    kind: BankKind,
    capacity: usize,
    origin: Option<u32>,
    relative_position: u32,
    data: Vec<u8>,
    pad: u8,
}

impl Bank {
    pub fn new(name: Identifier, kind: BankKind, capacity: usize, origin: Option<u32>, pad: u8) -> Self {
        let data = if kind.is_stored() { vec![pad; capacity] } else { Vec::new() };
        Self { name, kind, capacity, origin, relative_position: 0, data, pad }
    }

    pub fn name(&self) -> Identifier {
        self.name
    }

    pub fn kind(&self) -> BankKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn origin(&self) -> Option<u32> {
        self.origin
    }

    pub fn pad(&self) -> u8 {
        self.pad
    }

    pub fn relative_position(&self) -> u32 {
        self.relative_position
    }

    /// The absolute address of the current position, when the origin is
    /// known.
    pub fn absolute_position(&self) -> Option<u32> {
        self.origin.map(|origin| origin + self.relative_position)
    }

    /// The finished byte image for stored banks.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn check_advance(&self, size: usize) -> Result<(), BankError> {
        let available = self.capacity - self.relative_position as usize;
        if size > available {
            return Err(BankError::Overflow { requested: size, available });
        }
        Ok(())
    }

    /// Reserve space for emitted bytes without writing them yet (layout
    /// pass 1).
    pub fn reserve_rom(&mut self, size: usize) -> Result<(), BankError> {
        if !self.kind.is_stored() {
            return Err(BankError::NotStored);
        }
        self.check_advance(size)?;
        self.relative_position += size as u32;
        Ok(())
    }

    /// Reserve addresses in an unstored bank.
    pub fn reserve_ram(&mut self, size: usize) -> Result<(), BankError> {
        self.check_advance(size)?;
        self.relative_position += size as u32;
        Ok(())
    }

    /// Write bytes at the current position and advance (layout pass 2).
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), BankError> {
        if !self.kind.is_stored() {
            return Err(BankError::NotStored);
        }
        self.check_advance(bytes.len())?;
        let start = self.relative_position as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        self.relative_position += bytes.len() as u32;
        Ok(())
    }

    /// Seek to an absolute platform address within this bank.
    pub fn absolute_seek(&mut self, address: u32) -> Result<(), BankError> {
        let origin = match self.origin {
            Some(origin) => origin,
            // First seek in an origin-less bank pins the origin.
            None => {
                self.origin = Some(address);
                address
            }
        };

        if address < origin || (address - origin) as usize > self.capacity {
            return Err(BankError::SeekOutsideRange { address });
        }
        self.relative_position = address - origin;
        Ok(())
    }

    pub fn set_relative_position(&mut self, position: u32) {
        self.relative_position = position.min(self.capacity as u32);
    }

    /// Reset the position for layout pass 2.
    pub fn rewind(&mut self) {
        self.relative_position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom(capacity: usize) -> Bank {
        Bank::new(Identifier::from("rom"), BankKind::Program, capacity, Some(0x8000), 0xFF)
    }

    #[test]
    fn write_fills_image_and_advances() {
        let mut bank = rom(4);
        bank.write(&[0x48, 0x69]).unwrap();
        assert_eq!(bank.relative_position(), 2);
        assert_eq!(bank.absolute_position(), Some(0x8002));
        assert_eq!(bank.data(), &[0x48, 0x69, 0xFF, 0xFF]);
    }

    #[test]
    fn capacity_boundary() {
        let mut bank = rom(4);
        assert!(bank.write(&[0; 4]).is_ok());
        assert_eq!(
            rom(4).write(&[0; 5]),
            Err(BankError::Overflow { requested: 5, available: 4 })
        );
    }

    #[test]
    fn unstored_banks_reserve_but_never_store() {
        let mut ram = Bank::new(Identifier::from("zp"), BankKind::Variable, 0x100, Some(0), 0);
        assert!(ram.reserve_ram(16).is_ok());
        assert_eq!(ram.relative_position(), 16);
        assert_eq!(ram.write(&[1]), Err(BankError::NotStored));
    }

    #[test]
    fn absolute_seek_respects_origin() {
        let mut bank = rom(0x100);
        bank.absolute_seek(0x8040).unwrap();
        assert_eq!(bank.relative_position(), 0x40);
        assert_eq!(
            bank.absolute_seek(0x7FFF),
            Err(BankError::SeekOutsideRange { address: 0x7FFF })
        );
    }

    #[test]
    fn rewind_preserves_data() {
        let mut bank = rom(2);
        bank.write(&[1, 2]).unwrap();
        bank.rewind();
        assert_eq!(bank.relative_position(), 0);
        assert_eq!(bank.data(), &[1, 2]);
    }
}
