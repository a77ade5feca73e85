//! Instruction representation and decoding for the Kronos VM.

use crate::error::{VmError, VmResult};
use crate::op_code::{OpCode, OperandLayout};

/// One decoded instruction: its position, opcode and raw operand bytes.
#[derive(Debug, Clone)]
pub struct Instruction {
    /// The position of the instruction in the code buffer.
    pub pointer: usize,

    /// The opcode.
    pub opcode: OpCode,

    /// The operand bytes (big-endian fields).
    pub operand: Vec<u8>,
}

impl Instruction {
    /// Decodes the instruction at `position`.
    ///
    /// Truncated operands are a parse error; the VM treats that as fatal
    /// bytecode corruption.
    pub fn parse(code: &[u8], position: usize) -> VmResult<Self> {
        let byte = *code
            .get(position)
            .ok_or_else(|| VmError::parse(format!("Instruction pointer {position} out of bounds")))?;
        let opcode = OpCode::try_from(byte)?;

        let operand_len = match opcode.operand_layout() {
            OperandLayout::None => 0,
            OperandLayout::Fixed(n) => n,
            OperandLayout::StoreVar => {
                // name_idx: u16, mutable: u8, has_type: u8, [type_idx: u16]
                let flag_pos = position + 4;
                let has_type = *code.get(flag_pos).ok_or_else(|| {
                    VmError::parse("Truncated STORE_VAR operand".to_string())
                })?;
                if has_type != 0 {
                    6
                } else {
                    4
                }
            }
            OperandLayout::DefineFunc => {
                // name_idx: u16, arity: u8, param_idx: u16 × arity,
                // body_start: u16
                let arity_pos = position + 3;
                let arity = *code.get(arity_pos).ok_or_else(|| {
                    VmError::parse("Truncated DEFINE_FUNC operand".to_string())
                })?;
                3 + 2 * usize::from(arity) + 2
            }
        };

        let operand_start = position + 1;
        let operand_end = operand_start + operand_len;
        if operand_end > code.len() {
            return Err(VmError::parse(format!(
                "Operand exceeds code bounds for {:?}: {} + {} > {}",
                opcode,
                operand_start,
                operand_len,
                code.len()
            )));
        }

        Ok(Self {
            pointer: position,
            opcode,
            operand: code[operand_start..operand_end].to_vec(),
        })
    }

    /// Total encoded size, opcode byte included.
    pub fn size(&self) -> usize {
        1 + self.operand.len()
    }

    /// The opcode.
    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// Reads a big-endian `u16` operand field.
    pub fn operand_u16(&self, offset: usize) -> VmResult<u16> {
        match self.operand.get(offset..offset + 2) {
            Some(bytes) => Ok(u16::from_be_bytes([bytes[0], bytes[1]])),
            None => Err(VmError::parse(format!(
                "Missing u16 operand at offset {offset} for {:?}",
                self.opcode
            ))),
        }
    }

    /// Reads a big-endian `i16` operand field (jump offsets).
    pub fn operand_i16(&self, offset: usize) -> VmResult<i16> {
        Ok(self.operand_u16(offset)? as i16)
    }

    /// Reads a `u8` operand field.
    pub fn operand_u8(&self, offset: usize) -> VmResult<u8> {
        self.operand.get(offset).copied().ok_or_else(|| {
            VmError::parse(format!(
                "Missing u8 operand at offset {offset} for {:?}",
                self.opcode
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fixed_operand() {
        let code = [OpCode::LoadConst as u8, 0x01, 0x02, OpCode::Pop as u8];
        let instr = Instruction::parse(&code, 0).unwrap();
        assert_eq!(instr.opcode(), OpCode::LoadConst);
        assert_eq!(instr.size(), 3);
        assert_eq!(instr.operand_u16(0).unwrap(), 0x0102);

        let next = Instruction::parse(&code, 3).unwrap();
        assert_eq!(next.opcode(), OpCode::Pop);
        assert_eq!(next.size(), 1);
    }

    #[test]
    fn test_parse_store_var_with_and_without_type() {
        // Without annotation: 4 operand bytes.
        let code = [OpCode::StoreVar as u8, 0x00, 0x05, 1, 0];
        let instr = Instruction::parse(&code, 0).unwrap();
        assert_eq!(instr.size(), 5);
        assert_eq!(instr.operand_u16(0).unwrap(), 5);
        assert_eq!(instr.operand_u8(2).unwrap(), 1);
        assert_eq!(instr.operand_u8(3).unwrap(), 0);

        // With annotation: 6 operand bytes.
        let code = [OpCode::StoreVar as u8, 0x00, 0x05, 1, 1, 0x00, 0x09];
        let instr = Instruction::parse(&code, 0).unwrap();
        assert_eq!(instr.size(), 7);
        assert_eq!(instr.operand_u16(4).unwrap(), 9);
    }

    #[test]
    fn test_parse_define_func_scales_with_arity() {
        // arity 2: name(2) + arity(1) + params(4) + body_start(2) = 9.
        let code = [
            OpCode::DefineFunc as u8,
            0x00,
            0x01, // name_idx
            2,    // arity
            0x00,
            0x02, // param 0
            0x00,
            0x03, // param 1
            0x00,
            0x20, // body_start
        ];
        let instr = Instruction::parse(&code, 0).unwrap();
        assert_eq!(instr.size(), 10);
        assert_eq!(instr.operand_u8(2).unwrap(), 2);
        assert_eq!(instr.operand_u16(3).unwrap(), 2);
        assert_eq!(instr.operand_u16(5).unwrap(), 3);
        assert_eq!(instr.operand_u16(7).unwrap(), 0x20);
    }

    #[test]
    fn test_truncated_operand_is_parse_error() {
        let code = [OpCode::LoadConst as u8, 0x01];
        assert!(matches!(
            Instruction::parse(&code, 0),
            Err(VmError::Parse { .. })
        ));

        let code = [OpCode::Jump as u8];
        assert!(matches!(
            Instruction::parse(&code, 0),
            Err(VmError::Parse { .. })
        ));
    }

    #[test]
    fn test_negative_jump_offset() {
        let code = [OpCode::Jump as u8, 0xFF, 0xF6]; // -10
        let instr = Instruction::parse(&code, 0).unwrap();
        assert_eq!(instr.operand_i16(0).unwrap(), -10);
    }
}
