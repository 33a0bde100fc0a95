use csiex_lib::{decode_reader, remap_subcarriers, DecodedRecord};
use num_complex::Complex64;
use numpy::PyArray1;
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;

use std::fs::File;
use std::io::BufReader;

/// A decoded CSI record
#[pyclass]
pub struct PyCsiRecord {
    /// Wall clock time of the capture in seconds
    #[pyo3(get)]
    pub timestamp: f64,
    /// Role id of the capturing device
    #[pyo3(get)]
    pub role: u8,
    /// Hardware address of the capturing device
    #[pyo3(get)]
    pub device_mac: String,
    /// Hardware address of the transmitter
    #[pyo3(get)]
    pub source_mac: String,
    #[pyo3(get)]
    pub rssi: i8,
    #[pyo3(get)]
    pub noise_floor: i8,
    #[pyo3(get)]
    pub channel: u8,
    #[pyo3(get)]
    pub secondary_channel: u8,
    #[pyo3(get)]
    pub sig_mode: u8,
    #[pyo3(get)]
    pub cwb: u8,
    #[pyo3(get)]
    pub stbc: u8,
    /// Radio receive timestamp in microseconds
    #[pyo3(get)]
    pub rx_timestamp: u32,
    #[pyo3(get)]
    pub first_word_invalid: bool,
    /// Raw QI samples
    #[pyo3(get)]
    pub csi_data: Py<PyArray1<i8>>,
    record: DecodedRecord,
}

impl PyCsiRecord {
    fn new(py: Python<'_>, record: DecodedRecord) -> Self {
        let rx = &record.rx_ctrl;
        PyCsiRecord {
            timestamp: record.timestamp_s as f64 + record.timestamp_us as f64 * 1e-6,
            role: record.role,
            device_mac: record.device_mac.to_string(),
            source_mac: record.source_mac.to_string(),
            rssi: rx.rssi,
            noise_floor: rx.noise_floor,
            channel: rx.channel,
            secondary_channel: rx.secondary_channel,
            sig_mode: rx.sig_mode,
            cwb: rx.cwb,
            stbc: rx.stbc,
            rx_timestamp: rx.timestamp,
            first_word_invalid: record.first_word_invalid,
            csi_data: PyArray1::from_slice_bound(py, &record.csi_data).unbind(),
            record,
        }
    }
}

type CsiArrays = (
    Py<PyArray1<Complex64>>,
    Py<PyArray1<Complex64>>,
    Py<PyArray1<Complex64>>,
);

#[pymethods]
impl PyCsiRecord {
    /// Channel estimates ordered by subcarrier index.
    ///
    /// Returns the legacy, HT and STBC HT fields as complex arrays. Subcarriers
    /// the packet did not report hold `missing` (NaN by default).
    #[pyo3(signature = (missing=None))]
    pub fn remap(&self, py: Python<'_>, missing: Option<Complex64>) -> PyResult<CsiArrays> {
        let missing = missing.unwrap_or(Complex64::new(f64::NAN, f64::NAN));
        let csi = remap_subcarriers(&self.record, missing)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;

        Ok((
            PyArray1::from_owned_array_bound(py, csi.legacy).unbind(),
            PyArray1::from_owned_array_bound(py, csi.ht).unbind(),
            PyArray1::from_owned_array_bound(py, csi.stbc_ht).unbind(),
        ))
    }

    /// Whether head and tail guard of the record match
    pub fn is_intact(&self) -> bool {
        self.record.is_intact()
    }
}

#[pymodule]
fn csiex<'py>(_py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    /**
     * Decode a single line of a capture log.
     *
     * Returns None for lines that carry no record.
     *
     * # Parameters
     * * `line` - One line of exported text
     */
    #[pyfn(m)]
    fn decode_line(py: Python<'_>, line: &str) -> PyResult<Option<PyCsiRecord>> {
        let record = csiex_lib::decode_line(line)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(record.map(|r| PyCsiRecord::new(py, r)))
    }

    /**
     * Decode all intact records of a capture log.
     *
     * Torn and malformed records are skipped.
     *
     * # Parameters
     * * `path` - Path to the capture log
     */
    #[pyfn(m)]
    fn decode_file(py: Python<'_>, path: &str) -> PyResult<Vec<PyCsiRecord>> {
        let file = File::open(path).map_err(|e| PyIOError::new_err(e.to_string()))?;
        let (records, _) = decode_reader(BufReader::new(file))
            .map_err(|e| PyIOError::new_err(e.to_string()))?;

        Ok(records
            .into_iter()
            .map(|r| PyCsiRecord::new(py, r))
            .collect())
    }

    /**
     * Reorder the channel estimates of a record by subcarrier index.
     *
     * Same as `PyCsiRecord.remap`.
     */
    #[pyfn(m)]
    #[pyo3(signature = (record, missing=None))]
    fn remap(
        py: Python<'_>,
        record: PyRef<'_, PyCsiRecord>,
        missing: Option<Complex64>,
    ) -> PyResult<CsiArrays> {
        record.remap(py, missing)
    }

    m.add_class::<PyCsiRecord>()?;

    Ok(())
}
