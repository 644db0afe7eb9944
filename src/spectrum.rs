//! Spectrum channel selection and snapshot iteration.

use crate::backend::FftSpectrum;

/// Which part of a stereo analysis to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpectrumChannel {
    Left,
    Right,
    /// Per-bin `left + right / 2`
    #[default]
    Stereo,
}

/// Select or combine channels of an analysis result.
///
/// A single-channel result is read as its own right channel.
pub(crate) fn combine(spectrum: &FftSpectrum, channel: SpectrumChannel) -> Vec<f32> {
    let Some(left) = spectrum.spectrum.first() else {
        return Vec::new();
    };
    let right = spectrum.spectrum.get(1).unwrap_or(left);
    let len = spectrum.length.min(left.len()).min(right.len());

    match channel {
        SpectrumChannel::Left => left[..len].to_vec(),
        SpectrumChannel::Right => right[..len].to_vec(),
        SpectrumChannel::Stereo => left[..len]
            .iter()
            .zip(&right[..len])
            .map(|(l, r)| l + r / 2.0)
            .collect(),
    }
}

/// Finite, single-pass iterator over one spectrum snapshot.
///
/// The snapshot is taken when the iterator is created; later engine updates
/// do not affect it.
#[derive(Debug, Clone)]
pub struct SpectrumIter {
    values: std::vec::IntoIter<f32>,
}

impl SpectrumIter {
    pub(crate) fn new(values: Vec<f32>) -> Self {
        Self {
            values: values.into_iter(),
        }
    }

    pub(crate) fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl Iterator for SpectrumIter {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        self.values.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.values.size_hint()
    }
}

impl ExactSizeIterator for SpectrumIter {}

/// Arithmetic mean of the values, 0 when there are none
pub(crate) fn average(values: SpectrumIter) -> f32 {
    let len = values.len();
    if len == 0 {
        return 0.0;
    }
    values.sum::<f32>() / len as f32
}
