//! The AVM1 action encoding (§4.6.1): one byte opcode, and for opcodes
//! `>= 0x80` a little-endian `u16` payload length followed by that many
//! payload bytes. `0x00` (`End`) terminates an action record and carries no
//! payload even though its numeric value is below the threshold.

use crate::error::ParseResult;
use crate::stream::SwfReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    End = 0x00,
    NextFrame = 0x04,
    PrevFrame = 0x05,
    Play = 0x06,
    Stop = 0x07,
    Add = 0x0A,
    Subtract = 0x0B,
    Multiply = 0x0C,
    Divide = 0x0D,
    Equals = 0x0E,
    Less = 0x0F,
    And = 0x10,
    Or = 0x11,
    Not = 0x12,
    StringEquals = 0x13,
    StringLength = 0x14,
    StringExtract = 0x15,
    Pop = 0x17,
    ToInteger = 0x18,
    GetVariable = 0x1C,
    SetVariable = 0x1D,
    SetTarget2 = 0x20,
    StringAdd = 0x21,
    GetProperty = 0x22,
    SetProperty = 0x23,
    CloneSprite = 0x24,
    RemoveSprite = 0x25,
    Trace = 0x26,
    StringLess = 0x29,
    RandomNumber = 0x30,
    GetTime = 0x34,
    DefineLocal = 0x3C,
    GetMember = 0x4E,
    SetMember = 0x4F,
    GotoFrame = 0x81,
    GetUrl = 0x83,
    ConstantPool = 0x88,
    SetTarget = 0x8B,
    GotoLabel = 0x8C,
    Push = 0x96,
    Jump = 0x99,
    GetUrl2 = 0x9A,
    If = 0x9D,
    Call = 0x9E,
    GotoFrame2 = 0x9F,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        use Opcode::*;
        Some(match byte {
            0x00 => End,
            0x04 => NextFrame,
            0x05 => PrevFrame,
            0x06 => Play,
            0x07 => Stop,
            0x0A => Add,
            0x0B => Subtract,
            0x0C => Multiply,
            0x0D => Divide,
            0x0E => Equals,
            0x0F => Less,
            0x10 => And,
            0x11 => Or,
            0x12 => Not,
            0x13 => StringEquals,
            0x14 => StringLength,
            0x15 => StringExtract,
            0x17 => Pop,
            0x18 => ToInteger,
            0x1C => GetVariable,
            0x1D => SetVariable,
            0x20 => SetTarget2,
            0x21 => StringAdd,
            0x22 => GetProperty,
            0x23 => SetProperty,
            0x24 => CloneSprite,
            0x25 => RemoveSprite,
            0x26 => Trace,
            0x29 => StringLess,
            0x30 => RandomNumber,
            0x34 => GetTime,
            0x3C => DefineLocal,
            0x4E => GetMember,
            0x4F => SetMember,
            0x81 => GotoFrame,
            0x83 => GetUrl,
            0x88 => ConstantPool,
            0x8B => SetTarget,
            0x8C => GotoLabel,
            0x96 => Push,
            0x99 => Jump,
            0x9A => GetUrl2,
            0x9D => If,
            0x9E => Call,
            0x9F => GotoFrame2,
            _ => return None,
        })
    }

    /// Whether this opcode's wire form carries a length-prefixed payload.
    /// Per §4.6.1 this is exactly the opcodes whose byte value is `>= 0x80`.
    pub fn has_payload(byte: u8) -> bool {
        byte >= 0x80
    }
}

/// One decoded action record: the raw opcode byte (unrecognized opcodes are
/// skipped by the interpreter, not rejected here) and its payload, empty for
/// opcodes below `0x80`.
pub struct ActionRecord<'a> {
    pub opcode: u8,
    pub payload: SwfReader<'a>,
}

/// Reads a single action record from the front of `reader`. Returns `Ok(None)`
/// once `End` (`0x00`) is consumed, matching the spec's "0x00 terminates"
/// rule.
pub fn read_action<'a>(reader: &mut SwfReader<'a>) -> ParseResult<Option<ActionRecord<'a>>> {
    let opcode = reader.read_u8()?;
    if opcode == Opcode::End as u8 {
        return Ok(None);
    }
    let payload = if Opcode::has_payload(opcode) {
        let len = reader.read_u16()? as usize;
        reader.extract(len)?
    } else {
        SwfReader::new(&[])
    };
    Ok(Some(ActionRecord { opcode, payload }))
}

/// Splits a raw `DoAction` tag body into its action records for repeated
/// execution (e.g. re-entering a frame's action list doesn't re-parse the
/// bytes each time).
pub fn split_actions(data: &[u8]) -> ParseResult<Vec<(u8, Vec<u8>)>> {
    let mut reader = SwfReader::new(data);
    let mut actions = Vec::new();
    while let Some(record) = read_action(&mut reader)? {
        actions.push((record.opcode, record.payload.remaining().to_vec()));
    }
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_terminates_with_no_payload() {
        let data = [0x00];
        let mut r = SwfReader::new(&data);
        assert!(read_action(&mut r).unwrap().is_none());
    }

    #[test]
    fn high_opcode_reads_length_prefixed_payload() {
        // Push (0x96) with a 2-byte payload.
        let data = [0x96, 0x02, 0x00, 0xAA, 0xBB];
        let mut r = SwfReader::new(&data);
        let record = read_action(&mut r).unwrap().unwrap();
        assert_eq!(record.opcode, Opcode::Push as u8);
        assert_eq!(record.payload.remaining(), &[0xAA, 0xBB]);
    }

    #[test]
    fn low_opcode_has_no_payload() {
        let data = [Opcode::Add as u8, 0x00];
        let mut r = SwfReader::new(&data);
        let record = read_action(&mut r).unwrap().unwrap();
        assert_eq!(record.opcode, Opcode::Add as u8);
        assert!(record.payload.is_empty());
        assert!(read_action(&mut r).unwrap().is_none());
    }

    #[test]
    fn split_actions_collects_every_record() {
        let data = [Opcode::Play as u8, Opcode::Stop as u8, 0x00];
        let actions = split_actions(&data).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].0, Opcode::Play as u8);
        assert_eq!(actions[1].0, Opcode::Stop as u8);
    }
}
