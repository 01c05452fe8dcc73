//! Instruction encodings: how a matched table entry turns into bytes.
//! Sizes may depend on captured values (repeat prefixes); writes receive
//! the absolute program counter so PC-relative forms can compute and
//! range-check their displacement.

use crate::instruction::{CaptureLists, InstructionOptions};

/// Failures during byte emission; the layout phase attaches locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// A PC-relative displacement does not fit the encoding's signed range.
    PcRelativeRange { offset: i64, min: i64, max: i64 },
    /// An encoding parameter had no captured integer behind it.
    MissingCapture { parameter: usize },
}

/// The encoding shapes the supported CPU families need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Opcode bytes only.
    Implicit,
    /// Opcode then one unsigned byte operand.
    U8Operand,
    /// Opcode then one byte operand, stored complemented.
    InvertedU8Operand,
    /// Opcode then a little-endian 16-bit operand.
    U16Operand,
    /// Opcode then a little-endian 24-bit operand.
    U24Operand,
    /// Opcode then a signed 8-bit displacement relative to the next
    /// instruction.
    PcRelativeI8Operand,
    /// Opcode then a signed 16-bit displacement relative to the next
    /// instruction.
    PcRelativeI16Operand,
    /// Opcode bytes repeated `count` times, count taken from parameter 0.
    RepeatedImplicit,
    /// Opcode plus byte operand, repeated; value from parameter 0, count
    /// from parameter 1.
    RepeatedU8Operand,
    /// Opcode then two unsigned byte operands.
    U8OperandU8Operand,
}

fn capture_int(
    options: &InstructionOptions,
    captures: &CaptureLists,
    parameter: usize,
) -> Result<i128, EncodeError> {
    options
        .parameter
        .get(parameter)
        .and_then(|index| captures.get(*index))
        .and_then(|list| list.first())
        .and_then(|operand| operand.as_integer())
        .ok_or(EncodeError::MissingCapture { parameter })
}

impl Encoding {
    /// The encoded size in bytes. Depends only on the opcode and captures,
    /// never on addresses, so layout pass 1 can use it.
    pub fn size(
        &self,
        options: &InstructionOptions,
        captures: &CaptureLists,
    ) -> Result<usize, EncodeError> {
        let opcode = options.opcode.len();
        Ok(match self {
            Encoding::Implicit => opcode,
            Encoding::U8Operand | Encoding::InvertedU8Operand | Encoding::PcRelativeI8Operand => {
                opcode + 1
            }
            Encoding::U16Operand | Encoding::PcRelativeI16Operand | Encoding::U8OperandU8Operand => {
                opcode + 2
            }
            Encoding::U24Operand => opcode + 3,
            Encoding::RepeatedImplicit => {
                let count = capture_int(options, captures, 0)? as usize;
                count * opcode
            }
            Encoding::RepeatedU8Operand => {
                let count = capture_int(options, captures, 1)? as usize;
                count * (opcode + 1)
            }
        })
    }

    /// Append the encoded bytes to `buffer`. `pc` is the absolute address
    /// of the instruction's first byte.
    pub fn write(
        &self,
        options: &InstructionOptions,
        captures: &CaptureLists,
        pc: u32,
        buffer: &mut Vec<u8>,
    ) -> Result<(), EncodeError> {
        match self {
            Encoding::Implicit => {
                buffer.extend_from_slice(&options.opcode);
            }
            Encoding::U8Operand => {
                let value = capture_int(options, captures, 0)?;
                buffer.extend_from_slice(&options.opcode);
                buffer.push(value as u8);
            }
            Encoding::InvertedU8Operand => {
                let value = capture_int(options, captures, 0)?;
                buffer.extend_from_slice(&options.opcode);
                buffer.push(value as u8 ^ 0xFF);
            }
            Encoding::U16Operand => {
                let value = capture_int(options, captures, 0)? as u16;
                buffer.extend_from_slice(&options.opcode);
                buffer.extend_from_slice(&value.to_le_bytes());
            }
            Encoding::U24Operand => {
                let value = capture_int(options, captures, 0)? as u32;
                buffer.extend_from_slice(&options.opcode);
                buffer.extend_from_slice(&value.to_le_bytes()[..3]);
            }
            Encoding::PcRelativeI8Operand => {
                let size = self.size(options, captures)? as i64;
                let dest = capture_int(options, captures, 0)? as i64;
                let offset = dest - pc as i64 - size;
                buffer.extend_from_slice(&options.opcode);
                if !(-128..=127).contains(&offset) {
                    buffer.push(0);
                    return Err(EncodeError::PcRelativeRange { offset, min: -128, max: 127 });
                }
                buffer.push(offset as i8 as u8);
            }
            Encoding::PcRelativeI16Operand => {
                let size = self.size(options, captures)? as i64;
                let dest = capture_int(options, captures, 0)? as i64;
                let offset = dest - pc as i64 - size;
                buffer.extend_from_slice(&options.opcode);
                if !(-32768..=32767).contains(&offset) {
                    buffer.extend_from_slice(&[0, 0]);
                    return Err(EncodeError::PcRelativeRange { offset, min: -32768, max: 32767 });
                }
                buffer.extend_from_slice(&(offset as i16).to_le_bytes());
            }
            Encoding::RepeatedImplicit => {
                let count = capture_int(options, captures, 0)? as usize;
                for _ in 0..count {
                    buffer.extend_from_slice(&options.opcode);
                }
            }
            Encoding::RepeatedU8Operand => {
                let value = capture_int(options, captures, 0)?;
                let count = capture_int(options, captures, 1)? as usize;
                for _ in 0..count {
                    buffer.extend_from_slice(&options.opcode);
                    buffer.push(value as u8);
                }
            }
            Encoding::U8OperandU8Operand => {
                let first = capture_int(options, captures, 0)?;
                let second = capture_int(options, captures, 1)?;
                buffer.extend_from_slice(&options.opcode);
                buffer.push(first as u8);
                buffer.push(second as u8);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::operand::InstructionOperand;

    use super::*;

    fn options(opcode: Vec<u8>, parameter: Vec<usize>) -> InstructionOptions {
        InstructionOptions::new(opcode, parameter, vec![])
    }

    fn captured(values: &[i128]) -> CaptureLists {
        values.iter().map(|value| vec![InstructionOperand::integer(*value)]).collect()
    }

    #[test]
    fn u16_operand_is_little_endian() {
        let options = options(vec![0x4C], vec![0]);
        let captures = captured(&[0x8001]);
        let mut buffer = Vec::new();

        Encoding::U16Operand.write(&options, &captures, 0x8000, &mut buffer).unwrap();
        assert_eq!(buffer, vec![0x4C, 0x01, 0x80]);
    }

    #[test]
    fn pc_relative_boundaries() {
        let options = options(vec![0xD0], vec![0]);
        let mut buffer = Vec::new();

        // dest = pc + 2 + 127 is the farthest forward branch.
        let captures = captured(&[0x8000 + 2 + 127]);
        Encoding::PcRelativeI8Operand.write(&options, &captures, 0x8000, &mut buffer).unwrap();
        assert_eq!(buffer, vec![0xD0, 0x7F]);

        buffer.clear();
        let captures = captured(&[0x8000 + 2 - 128]);
        Encoding::PcRelativeI8Operand.write(&options, &captures, 0x8000, &mut buffer).unwrap();
        assert_eq!(buffer, vec![0xD0, 0x80]);

        buffer.clear();
        let captures = captured(&[0x8000 + 2 + 128]);
        let error = Encoding::PcRelativeI8Operand
            .write(&options, &captures, 0x8000, &mut buffer)
            .unwrap_err();
        assert_eq!(error, EncodeError::PcRelativeRange { offset: 128, min: -128, max: 127 });
    }

    #[test]
    fn repeated_size_tracks_count_capture() {
        let options = options(vec![0x0A], vec![0]);
        let captures = captured(&[3]);

        assert_eq!(Encoding::RepeatedImplicit.size(&options, &captures).unwrap(), 3);

        let mut buffer = Vec::new();
        Encoding::RepeatedImplicit.write(&options, &captures, 0, &mut buffer).unwrap();
        assert_eq!(buffer, vec![0x0A, 0x0A, 0x0A]);
    }

    #[test]
    fn inverted_operand_complements() {
        let options = options(vec![0x8D], vec![0]);
        let captures = captured(&[0x0F]);
        let mut buffer = Vec::new();

        Encoding::InvertedU8Operand.write(&options, &captures, 0, &mut buffer).unwrap();
        assert_eq!(buffer, vec![0x8D, 0xF0]);
    }
}
