//! # Column Codecs
//!
//! One `ColumnCodec` per schema column, the single translation point between
//! a column's three representations:
//!
//! - the fixed-width slot inside a row buffer (surrogate id for Text/Blob),
//! - the wire form (little-endian fixed width, u32-length-prefixed payload),
//! - the logical `OwnedValue`.
//!
//! The codec owns the column's byte offset and side-table slot, so callers
//! never compute layout themselves. Codecs are invoked only under the
//! registry's locks: row-buffer writes are not atomic, and side-table
//! mutations go through the transaction journal of the `VarStore` they are
//! handed.
//!
//! `destroy` must run before a variable-length column's row buffer is
//! released; dropping the row alone would leak its side-table entries.

use crate::encoding::{ByteReader, ByteWriter};
use crate::rows::heap::VarStore;
use crate::rows::row::RowBuilder;
use crate::rows::schema::TableSchema;
use crate::types::{DataType, OwnedValue};
use eyre::{bail, eyre, Result};

#[derive(Debug, Clone)]
pub struct ColumnCodec {
    ty: DataType,
    offset: usize,
    var_slot: Option<usize>,
    hashed: bool,
}

impl ColumnCodec {
    /// Builds one codec per column of the schema.
    pub fn for_schema(schema: &TableSchema) -> Vec<ColumnCodec> {
        (0..schema.column_count())
            .map(|idx| ColumnCodec {
                ty: schema.column(idx).data_type(),
                offset: schema.offset(idx),
                var_slot: schema.var_slot(idx),
                hashed: schema.column(idx).is_hashed(),
            })
            .collect()
    }

    pub fn data_type(&self) -> DataType {
        self.ty
    }

    pub fn is_hashed(&self) -> bool {
        self.hashed
    }

    pub fn is_variable(&self) -> bool {
        self.var_slot.is_some()
    }

    fn slot<'r>(&self, row: &'r [u8]) -> &'r [u8] {
        &row[self.offset..self.offset + self.ty.slot_width()]
    }

    fn slot_mut<'r>(&self, row: &'r mut [u8]) -> &'r mut [u8] {
        &mut row[self.offset..self.offset + self.ty.slot_width()]
    }

    fn surrogate(&self, row: &[u8]) -> u64 {
        u64::from_le_bytes(self.slot(row).try_into().unwrap())
    }

    /// Writes the column's default (zero) value into a fresh row buffer.
    pub fn init_default(&self, row: &mut [u8]) {
        self.slot_mut(row).fill(0);
    }

    /// Decodes one wire column into the row under construction, mirroring
    /// the wire bytes into the hash sink when the column is hashed.
    pub fn decode(
        &self,
        reader: &mut ByteReader<'_>,
        row: &mut RowBuilder,
        vars: &mut VarStore,
    ) -> Result<()> {
        match self.var_slot {
            None => {
                let width = self.ty.slot_width();
                let bytes = reader.read_bytes(width)?;
                self.slot_mut(row.buf_mut()).copy_from_slice(bytes);
                if self.hashed {
                    row.hash_sink().extend_from_slice(bytes);
                }
            }
            Some(slot) => {
                let payload = reader.read_len_prefixed()?;
                if self.ty == DataType::Text {
                    std::str::from_utf8(payload)
                        .map_err(|e| eyre!("invalid utf-8 in Text column: {}", e))?;
                }
                let id = vars.insert(slot, payload);
                self.slot_mut(row.buf_mut()).copy_from_slice(&id.to_le_bytes());
                if self.hashed {
                    let sink = row.hash_sink();
                    sink.extend_from_slice(&(payload.len() as u32).to_le_bytes());
                    sink.extend_from_slice(payload);
                }
            }
        }
        Ok(())
    }

    /// Emits the column's wire form from a sealed row.
    pub fn serialize(&self, row: &[u8], vars: &VarStore, writer: &mut ByteWriter) -> Result<()> {
        match self.var_slot {
            None => writer.write_bytes(self.slot(row)),
            Some(slot) => {
                let bytes = vars.get(slot, self.surrogate(row))?;
                writer.write_len_prefixed(bytes);
            }
        }
        Ok(())
    }

    /// Reads the column's logical value out of a row.
    pub fn read_value(&self, row: &[u8], vars: &VarStore) -> Result<OwnedValue> {
        let slot = self.slot(row);
        Ok(match self.ty {
            DataType::Bool => OwnedValue::Bool(slot[0] != 0),
            DataType::Int2 => OwnedValue::Int2(i16::from_le_bytes(slot.try_into().unwrap())),
            DataType::Int4 => OwnedValue::Int4(i32::from_le_bytes(slot.try_into().unwrap())),
            DataType::Int8 => OwnedValue::Int8(i64::from_le_bytes(slot.try_into().unwrap())),
            DataType::Float4 => OwnedValue::Float4(f32::from_le_bytes(slot.try_into().unwrap())),
            DataType::Float8 => OwnedValue::Float8(f64::from_le_bytes(slot.try_into().unwrap())),
            DataType::Text => {
                let bytes = vars.get(self.var_slot.unwrap(), self.surrogate(row))?;
                OwnedValue::Text(
                    String::from_utf8(bytes.to_vec())
                        .map_err(|e| eyre!("invalid utf-8 in Text column: {}", e))?,
                )
            }
            DataType::Blob => {
                let bytes = vars.get(self.var_slot.unwrap(), self.surrogate(row))?;
                OwnedValue::Blob(bytes.to_vec())
            }
        })
    }

    /// Writes a logical value into the column's slot, replacing any
    /// existing side-table entry.
    pub fn write_value(
        &self,
        row: &mut [u8],
        vars: &mut VarStore,
        value: &OwnedValue,
    ) -> Result<()> {
        if value.data_type() != self.ty {
            bail!(
                "mismatched data type: column is {:?}, value is {:?}",
                self.ty,
                value.data_type()
            );
        }
        match value {
            OwnedValue::Bool(v) => self.slot_mut(row)[0] = *v as u8,
            OwnedValue::Int2(v) => self.slot_mut(row).copy_from_slice(&v.to_le_bytes()),
            OwnedValue::Int4(v) => self.slot_mut(row).copy_from_slice(&v.to_le_bytes()),
            OwnedValue::Int8(v) => self.slot_mut(row).copy_from_slice(&v.to_le_bytes()),
            OwnedValue::Float4(v) => self.slot_mut(row).copy_from_slice(&v.to_le_bytes()),
            OwnedValue::Float8(v) => self.slot_mut(row).copy_from_slice(&v.to_le_bytes()),
            OwnedValue::Text(v) => self.replace_var(row, vars, v.as_bytes())?,
            OwnedValue::Blob(v) => self.replace_var(row, vars, v)?,
        }
        Ok(())
    }

    fn replace_var(&self, row: &mut [u8], vars: &mut VarStore, bytes: &[u8]) -> Result<()> {
        let slot = self.var_slot.unwrap();
        let old = self.surrogate(row);
        if old != 0 {
            vars.release(slot, old)?;
        }
        let id = vars.insert(slot, bytes);
        self.slot_mut(row).copy_from_slice(&id.to_le_bytes());
        Ok(())
    }

    /// Releases the column's side-table entry. Must be called before the
    /// row buffer is released; a no-op for fixed-width columns and for the
    /// null surrogate.
    pub fn destroy(&self, row: &[u8], vars: &mut VarStore) -> Result<()> {
        if let Some(slot) = self.var_slot {
            let id = self.surrogate(row);
            if id != 0 {
                vars.release(slot, id)?;
            }
        }
        Ok(())
    }
}

/// Encodes one logical value in its wire form.
pub fn write_wire_value(writer: &mut ByteWriter, value: &OwnedValue) {
    match value {
        OwnedValue::Bool(v) => writer.write_u8(*v as u8),
        OwnedValue::Int2(v) => writer.write_i16(*v),
        OwnedValue::Int4(v) => writer.write_i32(*v),
        OwnedValue::Int8(v) => writer.write_i64(*v),
        OwnedValue::Float4(v) => writer.write_f32(*v),
        OwnedValue::Float8(v) => writer.write_f64(*v),
        OwnedValue::Text(v) => writer.write_len_prefixed(v.as_bytes()),
        OwnedValue::Blob(v) => writer.write_len_prefixed(v),
    }
}

/// Decodes one logical value of the given type from its wire form.
pub fn read_wire_value(reader: &mut ByteReader<'_>, ty: DataType) -> Result<OwnedValue> {
    Ok(match ty {
        DataType::Bool => OwnedValue::Bool(reader.read_u8()? != 0),
        DataType::Int2 => OwnedValue::Int2(reader.read_i16()?),
        DataType::Int4 => OwnedValue::Int4(reader.read_i32()?),
        DataType::Int8 => OwnedValue::Int8(reader.read_i64()?),
        DataType::Float4 => OwnedValue::Float4(reader.read_f32()?),
        DataType::Float8 => OwnedValue::Float8(reader.read_f64()?),
        DataType::Text => {
            let bytes = reader.read_len_prefixed()?;
            OwnedValue::Text(
                String::from_utf8(bytes.to_vec())
                    .map_err(|e| eyre!("invalid utf-8 in Text operand: {}", e))?,
            )
        }
        DataType::Blob => OwnedValue::Blob(reader.read_len_prefixed()?.to_vec()),
    })
}

/// Encodes a full row in schema order, the form `Table::insert` consumes.
pub fn encode_row(schema: &TableSchema, values: &[OwnedValue], writer: &mut ByteWriter) -> Result<()> {
    if values.len() != schema.column_count() {
        bail!(
            "row has {} values, schema has {} columns",
            values.len(),
            schema.column_count()
        );
    }
    for (idx, value) in values.iter().enumerate() {
        let expected = schema.column(idx).data_type();
        if value.data_type() != expected {
            bail!(
                "mismatched data type for column '{}': expected {:?}, got {:?}",
                schema.column(idx).name(),
                expected,
                value.data_type()
            );
        }
        write_wire_value(writer, value);
    }
    Ok(())
}
