//! Sample aggregation and unit formatting for probe readings

use serde::{Deserialize, Serialize};

/// Fewest successful samples a jitter figure is computed from
pub const MIN_JITTER_SAMPLES: usize = 2;

/// Throughputs at or above this are shown in MiB/s
pub const MIB: f64 = 1024.0 * 1024.0;

pub const KIB: f64 = 1024.0;

/// Ordered latency readings, in milliseconds, collected against one target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JitterSample {
    samples: Vec<f64>,
}

impl JitterSample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw readings, dropping anything that is not a finite positive number
    pub fn from_readings<I: IntoIterator<Item = f64>>(readings: I) -> Self {
        let mut sample = Self::new();
        for reading in readings {
            sample.push(reading);
        }
        sample
    }

    /// Record one reading; returns false when it was rejected
    pub fn push(&mut self, reading_ms: f64) -> bool {
        if reading_ms.is_finite() && reading_ms > 0.0 {
            self.samples.push(reading_ms);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Arithmetic mean; `None` without samples
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    /// Sample (n - 1) standard deviation; `None` below `MIN_JITTER_SAMPLES`
    pub fn sample_stdev(&self) -> Option<f64> {
        if self.samples.len() < MIN_JITTER_SAMPLES {
            return None;
        }
        let mean = self.mean()?;
        let variance = self
            .samples
            .iter()
            .map(|x| (x - mean).powi(2))
            .sum::<f64>()
            / (self.samples.len() - 1) as f64;
        Some(variance.sqrt())
    }
}

/// "125 мс"
pub fn format_latency_ms(ms: f64) -> String {
    format!("{:.0} мс", ms)
}

/// KiB/s below 1 MiB/s, MiB/s from there on, two decimals either way
pub fn format_throughput(bytes_per_sec: f64) -> String {
    if bytes_per_sec < MIB {
        format!("{:.2} КБ/с", bytes_per_sec / KIB)
    } else {
        format!("{:.2} МБ/с", bytes_per_sec / MIB)
    }
}

/// Replace locale decimal commas with points
pub fn normalize_decimal(raw: &str) -> String {
    raw.trim().replace(',', ".")
}

/// Parse a tool-reported figure; non-numeric and non-positive readings are `None`
pub fn parse_positive(raw: &str) -> Option<f64> {
    normalize_decimal(raw)
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value > 0.0)
}
