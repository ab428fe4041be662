use super::error::{HeapError, HeapResult};
use crate::catalog::DataType;

/// A typed column value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int64(i64),
    Varchar(String),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int64(_) => DataType::Int64,
            Value::Varchar(_) => DataType::Varchar,
        }
    }
}

/// Encode one field payload.
///
/// INT64 is a fixed 8-byte big-endian integer; VARCHAR is a 1-byte length
/// followed by at most 255 bytes of UTF-8.
fn encode_field(value: &Value, data_type: DataType) -> HeapResult<Vec<u8>> {
    match (value, data_type) {
        (Value::Int64(v), DataType::Int64) => Ok(v.to_be_bytes().to_vec()),
        (Value::Varchar(s), DataType::Varchar) => {
            let utf8 = s.as_bytes();
            if utf8.len() > 255 {
                return Err(HeapError::VarcharTooLong { len: utf8.len() });
            }
            let mut out = Vec::with_capacity(1 + utf8.len());
            out.push(utf8.len() as u8);
            out.extend_from_slice(utf8);
            Ok(out)
        }
        (_, expected) => Err(HeapError::TypeMismatch { expected }),
    }
}

fn decode_field(data: &[u8], data_type: DataType) -> HeapResult<Value> {
    match data_type {
        DataType::Int64 => {
            let bytes: [u8; 8] = data.try_into().map_err(|_| {
                HeapError::BadFieldEncoding(format!("INT64 must be 8 bytes, got {}", data.len()))
            })?;
            Ok(Value::Int64(i64::from_be_bytes(bytes)))
        }
        DataType::Varchar => {
            let (&len, rest) = data.split_first().ok_or_else(|| {
                HeapError::BadFieldEncoding("VARCHAR payload is empty".to_string())
            })?;
            if rest.len() != len as usize {
                return Err(HeapError::BadFieldEncoding(format!(
                    "VARCHAR length mismatch: header {}, bytes {}",
                    len,
                    rest.len()
                )));
            }
            let s = std::str::from_utf8(rest)
                .map_err(|e| HeapError::BadFieldEncoding(format!("invalid UTF-8: {e}")))?;
            Ok(Value::Varchar(s.to_string()))
        }
    }
}

/// Encode a full row: a u16 field count followed by u16-length-prefixed
/// field payloads, all big-endian
pub fn encode_row(values: &[Value], types: &[DataType]) -> HeapResult<Vec<u8>> {
    if values.len() != types.len() {
        return Err(HeapError::ColumnCountMismatch {
            row: values.len(),
            schema: types.len(),
        });
    }

    let mut fields = Vec::with_capacity(values.len());
    let mut total = 2;
    for (value, &data_type) in values.iter().zip(types) {
        let field = encode_field(value, data_type)?;
        total += 2 + field.len();
        fields.push(field);
    }

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&(values.len() as u16).to_be_bytes());
    for field in fields {
        out.extend_from_slice(&(field.len() as u16).to_be_bytes());
        out.extend_from_slice(&field);
    }
    Ok(out)
}

/// Decode a row, validating the stored field count against the schema
pub fn decode_row(row: &[u8], types: &[DataType]) -> HeapResult<Vec<Value>> {
    if row.len() < 2 {
        return Err(HeapError::BadFieldEncoding(
            "row shorter than its field-count header".to_string(),
        ));
    }
    let count = u16::from_be_bytes([row[0], row[1]]) as usize;
    if count != types.len() {
        return Err(HeapError::ColumnCountMismatch {
            row: count,
            schema: types.len(),
        });
    }

    let mut values = Vec::with_capacity(count);
    let mut offset = 2;
    for &data_type in types {
        if offset + 2 > row.len() {
            return Err(HeapError::BadFieldEncoding(
                "row truncated before field length".to_string(),
            ));
        }
        let len = u16::from_be_bytes([row[offset], row[offset + 1]]) as usize;
        offset += 2;
        if offset + len > row.len() {
            return Err(HeapError::BadFieldEncoding(
                "row truncated inside field payload".to_string(),
            ));
        }
        values.push(decode_field(&row[offset..offset + len], data_type)?);
        offset += len;
    }
    Ok(values)
}
