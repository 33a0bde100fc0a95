//! Parquet file writer
use crate::decode::DecodedRecord;
use crate::errors::PersistenceError;
use arrow::array::{
    Array, ArrayRef, BooleanArray, Int8Array, Int8Builder, ListBuilder, StringArray, UInt16Array,
    UInt32Array, UInt8Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

/// Schema of a decoded record table; one row per record.
fn create_csi_schema() -> Schema {
    let u8_field = |name: &str| Field::new(name, DataType::UInt8, false);
    let csi_item = DataType::List(Arc::new(Field::new("item", DataType::Int8, true)));

    Schema::new(vec![
        Field::new("timestamp_s", DataType::UInt32, false),
        Field::new("timestamp_us", DataType::UInt32, false),
        u8_field("role"),
        Field::new("device_mac", DataType::Utf8, false),
        Field::new("source_mac", DataType::Utf8, false),
        Field::new("rssi", DataType::Int8, false),
        u8_field("rate"),
        u8_field("sig_mode"),
        u8_field("mcs"),
        u8_field("cwb"),
        u8_field("smoothing"),
        u8_field("not_sounding"),
        u8_field("aggregation"),
        u8_field("stbc"),
        u8_field("fec_coding"),
        u8_field("sgi"),
        Field::new("noise_floor", DataType::Int8, false),
        u8_field("ampdu_cnt"),
        u8_field("channel"),
        u8_field("secondary_channel"),
        Field::new("rx_timestamp", DataType::UInt32, false),
        u8_field("ant"),
        Field::new("sig_len", DataType::UInt16, false),
        u8_field("rx_state"),
        Field::new("first_word_invalid", DataType::Boolean, false),
        Field::new("csi_len", DataType::UInt16, false),
        Field::new("csi_data", csi_item, true),
    ])
}

/// Build one column from a per record accessor.
fn column<T, A>(data: &[&DecodedRecord], f: impl Fn(&DecodedRecord) -> T) -> ArrayRef
where
    A: From<Vec<T>> + Array + 'static,
{
    Arc::new(A::from(data.iter().map(|d| f(d)).collect::<Vec<T>>())) as ArrayRef
}

/// A batch writer to write batches of decoded records to a Parquet file.
pub struct BatchWriter {
    writer: Option<ArrowWriter<File>>,
    schema: Arc<Schema>,
    rows: u64,
}

impl BatchWriter {
    pub fn new(file_path: PathBuf) -> Result<Self, PersistenceError> {
        let file = File::create(&file_path)?;
        let schema = Arc::new(create_csi_schema());
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let writer = ArrowWriter::try_new(file, schema.clone(), Some(props))
            .map_err(|e| PersistenceError::Parquet(e.to_string()))?;
        Ok(Self {
            writer: Some(writer),
            schema,
            rows: 0,
        })
    }

    /// Write a record batch
    fn write(&mut self, batch: RecordBatch) -> Result<(), PersistenceError> {
        if let Some(writer) = &mut self.writer {
            writer
                .write(&batch)
                .map_err(|e| PersistenceError::Parquet(e.to_string()))?;
            self.rows += batch.num_rows() as u64;
            Ok(())
        } else {
            Err(PersistenceError::Parquet(
                "Writer has been finalized".into(),
            ))
        }
    }

    /// Close the file. Returns the number of rows written.
    pub fn finalize(&mut self) -> Result<u64, PersistenceError> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| PersistenceError::Parquet("Writer already finalized".into()))?;
        writer
            .close()
            .map_err(|e| PersistenceError::Parquet(e.to_string()))?;
        Ok(self.rows)
    }

    /// Add a batch of decoded records.
    pub fn add_batch(&mut self, data: &[&DecodedRecord]) -> Result<(), PersistenceError> {
        let mut csi_builder = ListBuilder::new(Int8Builder::new());
        for d in data {
            csi_builder.values().append_slice(&d.csi_data);
            csi_builder.append(true);
        }

        let arrays = vec![
            column::<_, UInt32Array>(data, |d| d.timestamp_s),
            column::<_, UInt32Array>(data, |d| d.timestamp_us),
            column::<_, UInt8Array>(data, |d| d.role),
            column::<_, StringArray>(data, |d| d.device_mac.to_string()),
            column::<_, StringArray>(data, |d| d.source_mac.to_string()),
            column::<_, Int8Array>(data, |d| d.rx_ctrl.rssi),
            column::<_, UInt8Array>(data, |d| d.rx_ctrl.rate),
            column::<_, UInt8Array>(data, |d| d.rx_ctrl.sig_mode),
            column::<_, UInt8Array>(data, |d| d.rx_ctrl.mcs),
            column::<_, UInt8Array>(data, |d| d.rx_ctrl.cwb),
            column::<_, UInt8Array>(data, |d| d.rx_ctrl.smoothing),
            column::<_, UInt8Array>(data, |d| d.rx_ctrl.not_sounding),
            column::<_, UInt8Array>(data, |d| d.rx_ctrl.aggregation),
            column::<_, UInt8Array>(data, |d| d.rx_ctrl.stbc),
            column::<_, UInt8Array>(data, |d| d.rx_ctrl.fec_coding),
            column::<_, UInt8Array>(data, |d| d.rx_ctrl.sgi),
            column::<_, Int8Array>(data, |d| d.rx_ctrl.noise_floor),
            column::<_, UInt8Array>(data, |d| d.rx_ctrl.ampdu_cnt),
            column::<_, UInt8Array>(data, |d| d.rx_ctrl.channel),
            column::<_, UInt8Array>(data, |d| d.rx_ctrl.secondary_channel),
            column::<_, UInt32Array>(data, |d| d.rx_ctrl.timestamp),
            column::<_, UInt8Array>(data, |d| d.rx_ctrl.ant),
            column::<_, UInt16Array>(data, |d| d.rx_ctrl.sig_len),
            column::<_, UInt8Array>(data, |d| d.rx_ctrl.rx_state),
            column::<_, BooleanArray>(data, |d| d.first_word_invalid),
            column::<_, UInt16Array>(data, |d| d.csi_len),
            Arc::new(csi_builder.finish()) as ArrayRef,
        ];

        let batch = RecordBatch::try_new(self.schema.clone(), arrays)
            .map_err(|e| PersistenceError::Parquet(e.to_string()))?;
        self.write(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture_event::{MacAddress, RxControl};
    use parquet::file::reader::{FileReader, SerializedFileReader};

    fn record(timestamp: u32, csi_data: Vec<i8>) -> DecodedRecord {
        DecodedRecord {
            format: 3,
            record_len: 451,
            codec: 1,
            role: 2,
            device_mac: MacAddress([1, 2, 3, 4, 5, 6]),
            timestamp_s: 1_700_000_000,
            timestamp_us: timestamp,
            head_guard: timestamp,
            source_mac: MacAddress([6, 5, 4, 3, 2, 1]),
            rx_ctrl: RxControl {
                timestamp,
                rssi: -40,
                ..Default::default()
            },
            first_word_invalid: false,
            csi_len: csi_data.len() as u16,
            csi_data,
            tail_guard: timestamp,
        }
    }

    #[test]
    fn writes_rows_in_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.parquet");

        let mut writer = BatchWriter::new(path.clone()).unwrap();
        writer
            .add_batch(&[&record(1, vec![1, -2, 3, -4]), &record(2, vec![])])
            .unwrap();
        writer.add_batch(&[&record(3, vec![5; 384])]).unwrap();
        assert_eq!(writer.finalize().unwrap(), 3);
        assert!(writer.finalize().is_err());

        let reader = SerializedFileReader::new(File::open(&path).unwrap()).unwrap();
        let metadata = reader.metadata().file_metadata();
        assert_eq!(metadata.num_rows(), 3);
        assert_eq!(metadata.schema_descr().num_columns(), 27);
    }
}
