//! Transport Instruction codec: the textual (JSON) record carried as a
//! datagram's payload, describing one state transition.
//!
//! The outer record derives `Serialize`/`Deserialize` directly since it's a
//! plain struct. `Opcode` gets a hand-written codec below, because its wire
//! shape is a heterogeneously-typed tagged array (e.g.
//! `["replace", i1, i2, j1, j2, old, new]`) rather than anything `serde`'s
//! enum derive produces on its own.

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::core::diff::Opcode;
use crate::core::error::InstructionError;

/// One Transport Instruction: `(old_num, new_num, ack_num, throwaway_num,
/// diff)`.
///
/// `throwaway_num` is signed: the formula in `Sender::send_message` can
/// legitimately produce a non-positive value (see DESIGN.md).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub old_num: u64,
    pub new_num: u64,
    pub ack_num: u64,
    pub throwaway_num: i64,
    pub diff: Vec<Opcode>,
}

impl Instruction {
    /// Encode as a JSON string, the wire format for an instruction payload.
    pub fn encode(&self) -> Vec<u8> {
        // `Instruction` only contains types that serialize infallibly
        // (no maps with non-string keys, no floats), so this cannot fail.
        serde_json::to_vec(self).expect("Instruction always serializes")
    }

    /// Decode from a JSON payload.
    pub fn decode(data: &[u8]) -> Result<Self, InstructionError> {
        Ok(serde_json::from_slice(data)?)
    }
}

impl Serialize for Opcode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Opcode::Equal { i1, i2, j1, j2 } => {
                let mut seq = serializer.serialize_seq(Some(5))?;
                seq.serialize_element("equal")?;
                seq.serialize_element(i1)?;
                seq.serialize_element(i2)?;
                seq.serialize_element(j1)?;
                seq.serialize_element(j2)?;
                seq.end()
            }
            Opcode::Delete { i1, i2, text } => {
                let mut seq = serializer.serialize_seq(Some(4))?;
                seq.serialize_element("delete")?;
                seq.serialize_element(i1)?;
                seq.serialize_element(i2)?;
                seq.serialize_element(text)?;
                seq.end()
            }
            Opcode::Insert { j1, j2, text } => {
                let mut seq = serializer.serialize_seq(Some(4))?;
                seq.serialize_element("insert")?;
                seq.serialize_element(j1)?;
                seq.serialize_element(j2)?;
                seq.serialize_element(text)?;
                seq.end()
            }
            Opcode::Replace {
                i1,
                i2,
                j1,
                j2,
                old_text,
                new_text,
            } => {
                let mut seq = serializer.serialize_seq(Some(7))?;
                seq.serialize_element("replace")?;
                seq.serialize_element(i1)?;
                seq.serialize_element(i2)?;
                seq.serialize_element(j1)?;
                seq.serialize_element(j2)?;
                seq.serialize_element(old_text)?;
                seq.serialize_element(new_text)?;
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Opcode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(OpcodeVisitor)
    }
}

struct OpcodeVisitor;

impl<'de> Visitor<'de> for OpcodeVisitor {
    type Value = Opcode;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a tagged opcode array")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let tag: String = seq
            .next_element()?
            .ok_or_else(|| de::Error::custom("missing opcode tag"))?;
        let missing = || de::Error::custom("truncated opcode array");
        match tag.as_str() {
            "equal" => Ok(Opcode::Equal {
                i1: seq.next_element()?.ok_or_else(missing)?,
                i2: seq.next_element()?.ok_or_else(missing)?,
                j1: seq.next_element()?.ok_or_else(missing)?,
                j2: seq.next_element()?.ok_or_else(missing)?,
            }),
            "delete" => Ok(Opcode::Delete {
                i1: seq.next_element()?.ok_or_else(missing)?,
                i2: seq.next_element()?.ok_or_else(missing)?,
                text: seq.next_element()?.ok_or_else(missing)?,
            }),
            "insert" => Ok(Opcode::Insert {
                j1: seq.next_element()?.ok_or_else(missing)?,
                j2: seq.next_element()?.ok_or_else(missing)?,
                text: seq.next_element()?.ok_or_else(missing)?,
            }),
            "replace" => Ok(Opcode::Replace {
                i1: seq.next_element()?.ok_or_else(missing)?,
                i2: seq.next_element()?.ok_or_else(missing)?,
                j1: seq.next_element()?.ok_or_else(missing)?,
                j2: seq.next_element()?.ok_or_else(missing)?,
                old_text: seq.next_element()?.ok_or_else(missing)?,
                new_text: seq.next_element()?.ok_or_else(missing)?,
            }),
            other => Err(de::Error::custom(format!("unknown opcode tag: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diff::generate_patch;

    #[test]
    fn instruction_roundtrips_through_json() {
        let diff = generate_patch("", "abc");
        let instr = Instruction {
            old_num: 0,
            new_num: 1,
            ack_num: 0,
            throwaway_num: 0,
            diff,
        };
        let encoded = instr.encode();
        let decoded = Instruction::decode(&encoded).unwrap();
        assert_eq!(decoded, instr);
    }

    #[test]
    fn instruction_is_plain_json() {
        let instr = Instruction {
            old_num: 1,
            new_num: 2,
            ack_num: 1,
            throwaway_num: -1,
            diff: vec![],
        };
        let encoded = String::from_utf8(instr.encode()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["old_num"], 1);
        assert_eq!(value["new_num"], 2);
        assert_eq!(value["throwaway_num"], -1);
        assert!(value["diff"].as_array().unwrap().is_empty());
    }

    #[test]
    fn opcode_array_shape_is_tagged() {
        let op = Opcode::Replace {
            i1: 0,
            i2: 2,
            j1: 0,
            j2: 3,
            old_text: "ab".into(),
            new_text: "xyz".into(),
        };
        let value = serde_json::to_value(&op).unwrap();
        let arr = value.as_array().unwrap();
        assert_eq!(arr[0], "replace");
        assert_eq!(arr.len(), 7);
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        let json = r#"{"old_num":0,"new_num":1,"ack_num":0,"throwaway_num":0,"diff":[["frobnicate",0,1]]}"#;
        assert!(Instruction::decode(json.as_bytes()).is_err());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Instruction::decode(b"not json").is_err());
    }
}
