//! # Predicate Wire Format
//!
//! A predicate is a recursive tagged structure the caller ships as bytes:
//!
//! ```text
//! predicate := AND(1) predicate predicate
//!            | OR(2)  predicate predicate
//!            | UNARY(3) column_offset:u32 op_code:u32 type_tag:u32 operand+
//! ```
//!
//! `UNARY` addresses its column by the column's byte offset inside the row
//! buffer, the one layout fact the registry and its callers share. The
//! operand is encoded like a row column (fixed-width little-endian numerics,
//! length-prefixed Text/Blob); `ClosedBetween` carries two operands of the
//! same type, low then high.
//!
//! Decoded trees are arena-allocated: every node of one request lives in
//! the request's `Bump` and is dropped wholesale with it.
//!
//! `PredicateExpr` is the owned builder producing these encodings: the
//! counterpart callers and tests assemble before handing bytes to the
//! registry.

use crate::encoding::{ByteReader, ByteWriter};
use crate::rows::codec::{read_wire_value, write_wire_value};
use crate::types::{DataType, OwnedValue};
use bumpalo::Bump;
use eyre::{bail, Result};

pub const TAG_AND: u8 = 1;
pub const TAG_OR: u8 = 2;
pub const TAG_UNARY: u8 = 3;

/// Comparison operation carried by a `UNARY` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    ClosedBetween,
    GreaterThan,
    GreaterOrEqualsTo,
    LesserThan,
    LesserOrEqualsTo,
    FuzzySearch,
}

impl CompareOp {
    pub fn code(&self) -> u32 {
        match self {
            CompareOp::Equal => 0,
            CompareOp::ClosedBetween => 1,
            CompareOp::GreaterThan => 2,
            CompareOp::GreaterOrEqualsTo => 3,
            CompareOp::LesserThan => 4,
            CompareOp::LesserOrEqualsTo => 5,
            CompareOp::FuzzySearch => 6,
        }
    }

    pub fn from_code(code: u32) -> Result<CompareOp> {
        Ok(match code {
            0 => CompareOp::Equal,
            1 => CompareOp::ClosedBetween,
            2 => CompareOp::GreaterThan,
            3 => CompareOp::GreaterOrEqualsTo,
            4 => CompareOp::LesserThan,
            5 => CompareOp::LesserOrEqualsTo,
            6 => CompareOp::FuzzySearch,
            other => bail!("unknown operation code {}", other),
        })
    }
}

/// One decoded column comparison.
#[derive(Debug)]
pub struct UnaryPredicate {
    pub offset: u32,
    pub op: CompareOp,
    pub ty: DataType,
    pub operand: OwnedValue,
    /// Upper bound; present only for `ClosedBetween`.
    pub operand_high: Option<OwnedValue>,
}

/// Decoded predicate tree, arena-allocated per request.
#[derive(Debug)]
pub enum Predicate<'b> {
    And(&'b Predicate<'b>, &'b Predicate<'b>),
    Or(&'b Predicate<'b>, &'b Predicate<'b>),
    Unary(UnaryPredicate),
}

/// Decodes one predicate tree out of the reader into the arena.
pub fn decode<'b>(reader: &mut ByteReader<'_>, arena: &'b Bump) -> Result<&'b Predicate<'b>> {
    let tag = reader.read_u8()?;
    match tag {
        TAG_AND | TAG_OR => {
            let left = decode(reader, arena)?;
            let right = decode(reader, arena)?;
            let node = if tag == TAG_AND {
                Predicate::And(left, right)
            } else {
                Predicate::Or(left, right)
            };
            Ok(arena.alloc(node))
        }
        TAG_UNARY => {
            let offset = reader.read_u32()?;
            let op = CompareOp::from_code(reader.read_u32()?)?;
            let ty = DataType::from_tag(reader.read_u32()?)?;
            let operand = read_wire_value(reader, ty)?;
            let operand_high = if op == CompareOp::ClosedBetween {
                Some(read_wire_value(reader, ty)?)
            } else {
                None
            };
            Ok(arena.alloc(Predicate::Unary(UnaryPredicate {
                offset,
                op,
                ty,
                operand,
                operand_high,
            })))
        }
        other => bail!("unknown predicate tag {}", other),
    }
}

/// Owned predicate builder producing the wire encoding.
#[derive(Debug, Clone)]
pub enum PredicateExpr {
    And(Box<PredicateExpr>, Box<PredicateExpr>),
    Or(Box<PredicateExpr>, Box<PredicateExpr>),
    Compare {
        offset: u32,
        op: CompareOp,
        operand: OwnedValue,
        operand_high: Option<OwnedValue>,
    },
}

impl PredicateExpr {
    pub fn and(self, other: PredicateExpr) -> PredicateExpr {
        PredicateExpr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: PredicateExpr) -> PredicateExpr {
        PredicateExpr::Or(Box::new(self), Box::new(other))
    }

    fn compare(offset: u32, op: CompareOp, operand: OwnedValue) -> PredicateExpr {
        PredicateExpr::Compare {
            offset,
            op,
            operand,
            operand_high: None,
        }
    }

    pub fn equal(offset: u32, operand: OwnedValue) -> PredicateExpr {
        Self::compare(offset, CompareOp::Equal, operand)
    }

    pub fn between(offset: u32, low: OwnedValue, high: OwnedValue) -> PredicateExpr {
        PredicateExpr::Compare {
            offset,
            op: CompareOp::ClosedBetween,
            operand: low,
            operand_high: Some(high),
        }
    }

    pub fn greater_than(offset: u32, operand: OwnedValue) -> PredicateExpr {
        Self::compare(offset, CompareOp::GreaterThan, operand)
    }

    pub fn greater_or_equals(offset: u32, operand: OwnedValue) -> PredicateExpr {
        Self::compare(offset, CompareOp::GreaterOrEqualsTo, operand)
    }

    pub fn lesser_than(offset: u32, operand: OwnedValue) -> PredicateExpr {
        Self::compare(offset, CompareOp::LesserThan, operand)
    }

    pub fn lesser_or_equals(offset: u32, operand: OwnedValue) -> PredicateExpr {
        Self::compare(offset, CompareOp::LesserOrEqualsTo, operand)
    }

    pub fn fuzzy(offset: u32, query: impl Into<String>) -> PredicateExpr {
        Self::compare(offset, CompareOp::FuzzySearch, OwnedValue::Text(query.into()))
    }

    pub fn encode(&self, writer: &mut ByteWriter) {
        match self {
            PredicateExpr::And(left, right) => {
                writer.write_u8(TAG_AND);
                left.encode(writer);
                right.encode(writer);
            }
            PredicateExpr::Or(left, right) => {
                writer.write_u8(TAG_OR);
                left.encode(writer);
                right.encode(writer);
            }
            PredicateExpr::Compare {
                offset,
                op,
                operand,
                operand_high,
            } => {
                writer.write_u8(TAG_UNARY);
                writer.write_u32(*offset);
                writer.write_u32(op.code());
                writer.write_u32(operand.data_type().tag());
                write_wire_value(writer, operand);
                if let Some(high) = operand_high {
                    write_wire_value(writer, high);
                }
            }
        }
    }

    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        self.encode(&mut writer);
        writer.into_vec()
    }
}
