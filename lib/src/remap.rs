//! Subcarrier remapping
//!
//! The radio reports channel samples as signed 8 bit QI pairs, legacy LTF,
//! HT-LTF and STBC HT-LTF back to back, each in the radio's own subcarrier
//! order. [`remap_subcarriers`] splits them into three arrays ordered by
//! increasing subcarrier index, so a position refers to the same subcarrier
//! in every record.
//!
//! Without a secondary channel the arrays cover subcarriers -32..=31 (64
//! entries). With one they cover -64..=63 (128 entries), the lower 20MHz
//! half first. Subcarriers the packet did not report hold the `missing`
//! value.
use ndarray::Array1;
use num_complex::Complex64;

use crate::decode::DecodedRecord;
use crate::errors::RemapError;

/// Channel estimate per subcarrier, lowest subcarrier first.
pub type SubcarrierCsi = Array1<Complex64>;

/// Remapped channel estimates of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct RemappedCsi {
    pub legacy: SubcarrierCsi,
    pub ht: SubcarrierCsi,
    pub stbc_ht: SubcarrierCsi,
}

/// IQ values of a record, addressed in radio order.
struct IqSamples {
    values: Vec<Complex64>,
    missing: Complex64,
}

impl IqSamples {
    fn get(&self, index: usize) -> Complex64 {
        self.values.get(index).copied().unwrap_or(self.missing)
    }

    /// Copy `count` samples starting at `source` to consecutive positions
    /// starting at `position`.
    fn copy_run(&self, target: &mut SubcarrierCsi, position: usize, source: usize, count: usize) {
        for i in 0..count {
            target[position + i] = self.get(source + i);
        }
    }
}

/// Convert signed QI byte pairs into complex IQ values.
///
/// When `first_word_invalid` is set the first two values are replaced by
/// `missing`.
pub fn qi_to_iq(
    data: &[i8],
    first_word_invalid: bool,
    missing: Complex64,
) -> Result<Vec<Complex64>, RemapError> {
    if data.len() % 2 != 0 {
        return Err(RemapError::OddLength(data.len()));
    }
    let mut values: Vec<Complex64> = data
        .chunks_exact(2)
        .map(|qi| Complex64::new(qi[1] as f64, qi[0] as f64))
        .collect();
    if first_word_invalid {
        for value in values.iter_mut().take(2) {
            *value = missing;
        }
    }
    Ok(values)
}

/// Reorder the channel samples of `record` by subcarrier index.
pub fn remap_subcarriers(
    record: &DecodedRecord,
    missing: Complex64,
) -> Result<RemappedCsi, RemapError> {
    let rx = &record.rx_ctrl;
    let unsupported = || RemapError::Unsupported {
        secondary_channel: rx.secondary_channel,
        sig_mode: rx.sig_mode,
        cwb: rx.cwb,
        stbc: rx.stbc,
    };

    let iq = IqSamples {
        values: qi_to_iq(&record.csi_data, record.first_word_invalid, missing)?,
        missing,
    };

    let width = match rx.secondary_channel {
        0 => 64,
        1 | 2 => 128,
        _ => return Err(unsupported()),
    };
    let mut legacy = SubcarrierCsi::from_elem(width, missing);
    let mut ht = SubcarrierCsi::from_elem(width, missing);
    let mut stbc_ht = SubcarrierCsi::from_elem(width, missing);

    match (rx.secondary_channel, rx.sig_mode, rx.cwb, rx.stbc) {
        // No secondary channel: each field lists 0..=31 then -32..=-1
        (0, 0, 0, 0) => {
            swap_halves(&iq, &mut legacy, 0);
        }
        (0, 1, 0, 0) => {
            swap_halves(&iq, &mut legacy, 0);
            swap_halves(&iq, &mut ht, 64);
        }
        (0, 1, 0, 1) => {
            swap_halves(&iq, &mut legacy, 0);
            swap_halves(&iq, &mut ht, 64);
            swap_halves(&iq, &mut stbc_ht, 128);
        }

        // Secondary channel below: the primary is the upper half
        (2, 0, 0, 0) => {
            iq.copy_run(&mut legacy, 64, 0, 64);
        }
        (2, 1, 0, 0) => {
            iq.copy_run(&mut legacy, 64, 0, 64);
            iq.copy_run(&mut ht, 64, 64, 64);
        }
        (2, 1, 0, 1) => {
            iq.copy_run(&mut legacy, 64, 0, 64);
            iq.copy_run(&mut ht, 64, 64, 63);
            iq.copy_run(&mut stbc_ht, 64, 127, 63);
        }

        // Secondary channel above: the primary is the lower half
        (1, 0, 0, 0) => {
            iq.copy_run(&mut legacy, 0, 0, 64);
        }
        (1, 1, 0, 0) => {
            iq.copy_run(&mut legacy, 0, 0, 64);
            iq.copy_run(&mut ht, 0, 64, 64);
        }
        (1, 1, 0, 1) => {
            iq.copy_run(&mut legacy, 0, 0, 64);
            iq.copy_run(&mut ht, 2, 64, 62);
            iq.copy_run(&mut stbc_ht, 2, 126, 62);
        }

        // 40MHz HT: the HT fields span both halves
        (1 | 2, 1, 1, 0) => {
            let primary = if rx.secondary_channel == 1 { 0 } else { 64 };
            iq.copy_run(&mut legacy, primary, 0, 64);
            wide_ht(&iq, &mut ht, 64);
        }
        (1 | 2, 1, 1, 1) => {
            let primary = if rx.secondary_channel == 1 { 0 } else { 64 };
            iq.copy_run(&mut legacy, primary, 0, 64);
            wide_ht_stbc(&iq, &mut ht, 64);
            wide_ht_stbc(&iq, &mut stbc_ht, 185);
        }
        _ => return Err(unsupported()),
    }

    Ok(RemappedCsi {
        legacy,
        ht,
        stbc_ht,
    })
}

/// A 20MHz field reported as 0..=31, -32..=-1.
fn swap_halves(iq: &IqSamples, target: &mut SubcarrierCsi, source: usize) {
    iq.copy_run(target, 0, source + 32, 32);
    iq.copy_run(target, 32, source, 32);
}

/// A 40MHz field reported as 0..=63, -64..=-1.
fn wide_ht(iq: &IqSamples, target: &mut SubcarrierCsi, source: usize) {
    iq.copy_run(target, 0, source + 64, 64);
    iq.copy_run(target, 64, source, 64);
}

/// A 40MHz STBC field reported as 0..=60, -60..=-1 (121 values).
fn wide_ht_stbc(iq: &IqSamples, target: &mut SubcarrierCsi, source: usize) {
    iq.copy_run(target, 64, source, 61);
    iq.copy_run(target, 4, source + 61, 60);
}
