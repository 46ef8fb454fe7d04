//! CSV encoding for tabular artifacts.
//!
//! Tables travel as Arrow `RecordBatch`es inside the pipeline and are stored
//! as CSV with a header row. The schema of every written table is stored
//! beside it as JSON so a read restores the exact column types and
//! nullability. Tables without a stored schema (raw inputs dropped in by
//! hand) have their schema inferred.

use std::io::Cursor;
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Column types a stored table may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Utf8,
    LargeUtf8,
    Date32,
}

impl ColumnType {
    fn from_arrow(data_type: &DataType) -> Option<Self> {
        let column_type = match data_type {
            DataType::Boolean => ColumnType::Boolean,
            DataType::Int8 => ColumnType::Int8,
            DataType::Int16 => ColumnType::Int16,
            DataType::Int32 => ColumnType::Int32,
            DataType::Int64 => ColumnType::Int64,
            DataType::UInt8 => ColumnType::UInt8,
            DataType::UInt16 => ColumnType::UInt16,
            DataType::UInt32 => ColumnType::UInt32,
            DataType::UInt64 => ColumnType::UInt64,
            DataType::Float32 => ColumnType::Float32,
            DataType::Float64 => ColumnType::Float64,
            DataType::Utf8 => ColumnType::Utf8,
            DataType::LargeUtf8 => ColumnType::LargeUtf8,
            DataType::Date32 => ColumnType::Date32,
            _ => return None,
        };
        Some(column_type)
    }

    fn to_arrow(self) -> DataType {
        match self {
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Int8 => DataType::Int8,
            ColumnType::Int16 => DataType::Int16,
            ColumnType::Int32 => DataType::Int32,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::UInt8 => DataType::UInt8,
            ColumnType::UInt16 => DataType::UInt16,
            ColumnType::UInt32 => DataType::UInt32,
            ColumnType::UInt64 => DataType::UInt64,
            ColumnType::Float32 => DataType::Float32,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Utf8 => DataType::Utf8,
            ColumnType::LargeUtf8 => DataType::LargeUtf8,
            ColumnType::Date32 => DataType::Date32,
        }
    }
}

/// One column of a stored schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: ColumnType,
    pub nullable: bool,
}

/// Serializable description of a table schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Describes an Arrow schema.
    ///
    /// Fails with [`StorageError::UnsupportedColumnType`] for nested or
    /// otherwise non-CSV column types.
    pub fn from_arrow(schema: &Schema) -> Result<Self, StorageError> {
        let columns = schema
            .fields()
            .iter()
            .map(|field| {
                let data_type = ColumnType::from_arrow(field.data_type()).ok_or_else(|| {
                    StorageError::UnsupportedColumnType {
                        column: field.name().clone(),
                        data_type: format!("{:?}", field.data_type()),
                    }
                })?;
                Ok(ColumnSpec {
                    name: field.name().clone(),
                    data_type,
                    nullable: field.is_nullable(),
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;
        Ok(Self { columns })
    }

    pub fn to_arrow(&self) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(|c| Field::new(&c.name, c.data_type.to_arrow(), c.nullable))
                .collect::<Vec<_>>(),
        )
    }
}

/// Serializes a table to CSV bytes with a header row.
pub fn encode_csv(batch: &RecordBatch) -> Result<Vec<u8>, StorageError> {
    let mut buf = Vec::new();
    {
        let mut writer = WriterBuilder::new().with_header(true).build(&mut buf);
        writer.write(batch)?;
    }
    Ok(buf)
}

/// Serializes the schema of a table to JSON.
pub fn encode_schema(batch: &RecordBatch) -> Result<Vec<u8>, StorageError> {
    let schema = TableSchema::from_arrow(&batch.schema())?;
    Ok(serde_json::to_vec_pretty(&schema)?)
}

/// Parses a schema written by [`encode_schema`].
pub fn decode_schema(data: &[u8]) -> Result<SchemaRef, StorageError> {
    let schema: TableSchema = serde_json::from_slice(data)?;
    Ok(Arc::new(schema.to_arrow()))
}

/// Parses CSV bytes (with header) into a single table.
///
/// With `schema` the columns are decoded exactly as described; without it
/// the schema is inferred from the data.
pub fn decode_csv(data: &[u8], schema: Option<SchemaRef>) -> Result<RecordBatch, StorageError> {
    let schema = match schema {
        Some(schema) => schema,
        None => {
            let (inferred, _) = Format::default()
                .with_header(true)
                .infer_schema(Cursor::new(data), None)?;
            Arc::new(inferred)
        }
    };

    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .build(Cursor::new(data))?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;

    Ok(concat_batches(&schema, &batches)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{
        Array, ArrayRef, BooleanArray, Float64Array, Int64Array, ListArray, StringArray,
    };
    use arrow::datatypes::Int32Type;

    fn sample_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("sepal length (cm)", DataType::Float64, true),
            Field::new("specie", DataType::Int64, true),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Float64Array::from(vec![5.1, 4.9, 6.3])),
            Arc::new(Int64Array::from(vec![0, 0, 2])),
        ];
        RecordBatch::try_new(schema, columns).unwrap()
    }

    fn roundtrip(batch: &RecordBatch) -> RecordBatch {
        let schema = decode_schema(&encode_schema(batch).unwrap()).unwrap();
        decode_csv(&encode_csv(batch).unwrap(), Some(schema)).unwrap()
    }

    #[test]
    fn test_encode_has_header() {
        let bytes = encode_csv(&sample_batch()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let first_line = text.lines().next().unwrap();
        assert_eq!(first_line, "sepal length (cm),specie");
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_decode_infers_numeric_types() {
        let batch = decode_csv(b"a,b\n1.5,3\n2.5,4\n", None).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(0).data_type(), &DataType::Float64);
        assert_eq!(batch.schema().field(1).data_type(), &DataType::Int64);
    }

    #[test]
    fn test_encode_decode_preserves_table() {
        let batch = sample_batch();
        assert_eq!(roundtrip(&batch), batch);
    }

    #[test]
    fn test_stored_schema_keeps_text_and_nullability() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("x", DataType::Float64, false),
            Field::new("flag", DataType::Boolean, true),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(vec!["007", "010"])),
            Arc::new(Float64Array::from(vec![1.0, 2.5])),
            Arc::new(BooleanArray::from(vec![Some(true), None])),
        ];
        let batch = RecordBatch::try_new(schema, columns).unwrap();

        let back = roundtrip(&batch);

        assert_eq!(back, batch);
        assert_eq!(back.schema().field(0).data_type(), &DataType::Utf8);
        assert!(!back.schema().field(1).is_nullable());
    }

    #[test]
    fn test_nested_columns_are_rejected() {
        let list = ListArray::from_iter_primitive::<Int32Type, _, _>(vec![Some(vec![Some(1)])]);
        let schema = Arc::new(Schema::new(vec![Field::new(
            "tags",
            list.data_type().clone(),
            true,
        )]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(list) as ArrayRef]).unwrap();

        let result = encode_schema(&batch);
        assert!(matches!(
            result,
            Err(StorageError::UnsupportedColumnType { ref column, .. }) if column == "tags"
        ));
    }
}
