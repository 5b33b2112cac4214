//! Sampling windows: N full-suite cycles reduced into one record.

use std::collections::BTreeMap;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use log::{debug, info};

use crate::bus::pause;
use crate::codec::{altitude_from_pressure, round_to};
use crate::error::EmptyWindowError;
use crate::reading::{AggregatedRecord, DataSource, Field, Reading};

/// Something that can run one read over every active driver.
pub trait ReadCycle {
    /// `None` when no driver produced a field this cycle.
    fn read_cycle(&mut self, delay: &mut dyn DelayNs) -> Option<Reading>;
}

/// Non-empty, chronologically ordered readings of one aggregation cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingWindow {
    readings: Vec<Reading>,
    attempted: usize,
}

impl SamplingWindow {
    pub fn from_readings(readings: Vec<Reading>) -> Result<Self, EmptyWindowError> {
        let attempted = readings.len();
        Self::with_attempts(readings, attempted)
    }

    fn with_attempts(readings: Vec<Reading>, attempted: usize) -> Result<Self, EmptyWindowError> {
        if readings.is_empty() {
            return Err(EmptyWindowError { attempted });
        }
        Ok(Self { readings, attempted })
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Cycles that produced nothing.
    pub fn missed(&self) -> usize {
        self.attempted - self.readings.len()
    }
}

/// Run `sample_count` cycles, sleeping `interval` between them (not after the last).
pub fn collect_window<S: ReadCycle + ?Sized>(
    suite: &mut S,
    sample_count: usize,
    interval: Duration,
    delay: &mut dyn DelayNs,
) -> Result<SamplingWindow, EmptyWindowError> {
    info!("Collecting {} readings, {:?} apart", sample_count, interval);
    let mut readings = Vec::with_capacity(sample_count);
    for i in 0..sample_count {
        match suite.read_cycle(delay) {
            Some(reading) => {
                debug!("  reading {}/{}: {} fields", i + 1, sample_count, reading.len());
                readings.push(reading);
            }
            None => debug!("  reading {}/{}: no data", i + 1, sample_count),
        }
        if i + 1 < sample_count {
            pause(delay, interval);
        }
    }

    let window = SamplingWindow::with_attempts(readings, sample_count)?;
    info!(
        "Window complete: {} valid readings, {} missed",
        window.len(),
        window.missed()
    );
    Ok(window)
}

/// Mean (2 decimals) for continuous fields, last value for categorical ones,
/// altitude re-derived from the reduced pressure.
pub fn reduce(window: &SamplingWindow, sea_level_hpa: f64) -> AggregatedRecord {
    let mut columns: BTreeMap<Field, Vec<f64>> = BTreeMap::new();
    for reading in &window.readings {
        for (field, value) in reading.iter() {
            columns.entry(field).or_default().push(value);
        }
    }
    columns.remove(&Field::Altitude);

    let mut values: BTreeMap<Field, f64> = columns
        .into_iter()
        .filter_map(|(field, samples)| {
            let reduced = if field.is_categorical() {
                *samples.last()?
            } else {
                round_to(samples.iter().sum::<f64>() / samples.len() as f64, 2)
            };
            Some((field, reduced))
        })
        .collect();

    if let Some(pressure) = values.get(&Field::Pressure).copied() {
        values.insert(Field::Altitude, altitude_from_pressure(pressure, sea_level_hpa));
    }

    // The window is non-empty by construction.
    let reading_count = window.readings.last().map_or(0, Reading::sequence);
    AggregatedRecord::new(values, window.len(), reading_count, DataSource::Windowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SEA_LEVEL_HPA;
    use crate::reading::TemperatureSource;
    use std::collections::VecDeque;

    struct Scripted {
        cycles: VecDeque<Option<Reading>>,
    }

    impl ReadCycle for Scripted {
        fn read_cycle(&mut self, _delay: &mut dyn DelayNs) -> Option<Reading> {
            self.cycles.pop_front().flatten()
        }
    }

    #[derive(Default)]
    struct Elapsed(u64);

    impl DelayNs for Elapsed {
        fn delay_ns(&mut self, ns: u32) {
            self.0 += u64::from(ns);
        }
    }

    fn window(pairs: &[&[(Field, f64)]]) -> SamplingWindow {
        let readings = pairs
            .iter()
            .enumerate()
            .map(|(i, p)| Reading::from_pairs(p, i as u64))
            .collect();
        SamplingWindow::from_readings(readings).unwrap()
    }

    #[test]
    fn continuous_fields_are_averaged() {
        use Field::*;
        let w = window(&[
            &[(Temperature, 20.0), (Humidity, 40.0)],
            &[(Temperature, 22.0), (Humidity, 42.0)],
            &[(Temperature, 24.0), (Humidity, 44.0)],
        ]);
        let record = reduce(&w, SEA_LEVEL_HPA);
        assert_eq!(record.get(Temperature), Some(22.0));
        assert_eq!(record.get(Humidity), Some(42.0));
        assert_eq!(record.samples_count, 3);
        assert_eq!(record.reading_count, 2);
        assert_eq!(record.data_source, DataSource::Windowed);
    }

    #[test]
    fn mean_is_rounded_to_two_decimals() {
        let w = window(&[
            &[(Field::Tvoc, 10.0)],
            &[(Field::Tvoc, 10.0)],
            &[(Field::Tvoc, 11.0)],
        ]);
        assert_eq!(reduce(&w, SEA_LEVEL_HPA).get(Field::Tvoc), Some(10.33));
    }

    #[test]
    fn categorical_fields_take_last_value() {
        let w = window(&[&[(Field::Aqi, 1.0)], &[(Field::Aqi, 1.0)], &[(Field::Aqi, 3.0)]]);
        assert_eq!(reduce(&w, SEA_LEVEL_HPA).get(Field::Aqi), Some(3.0));
    }

    #[test]
    fn categorical_last_value_skips_readings_without_the_field() {
        let w = window(&[
            &[(Field::TemperatureSource, 1.0), (Field::Mq2Status, 2.0)],
            &[(Field::TemperatureSource, 0.0), (Field::Mq2Status, 0.0)],
            &[(Field::Mq2Status, 1.0)],
        ]);
        let record = reduce(&w, SEA_LEVEL_HPA);
        assert_eq!(record.temperature_source(), Some(TemperatureSource::Aht21));
        assert_eq!(record.get(Field::Mq2Status), Some(1.0));
    }

    #[test]
    fn altitude_comes_from_reduced_pressure() {
        use Field::*;
        // Per-reading altitudes are deliberately wrong; they must be ignored.
        let w = window(&[
            &[(Pressure, 1000.0), (Altitude, 1.0)],
            &[(Pressure, 1010.0), (Altitude, 2.0)],
        ]);
        let record = reduce(&w, SEA_LEVEL_HPA);
        assert_eq!(record.get(Pressure), Some(1005.0));
        assert_eq!(
            record.get(Altitude),
            Some(altitude_from_pressure(1005.0, SEA_LEVEL_HPA))
        );
    }

    #[test]
    fn no_pressure_means_no_altitude() {
        let w = window(&[&[(Field::Altitude, 12.0), (Field::Humidity, 50.0)]]);
        let record = reduce(&w, SEA_LEVEL_HPA);
        assert!(!record.contains(Field::Altitude));
        assert!(!record.contains(Field::Pressure));
    }

    #[test]
    fn sleeps_between_cycles_only() {
        let mut suite = Scripted {
            cycles: (0..3)
                .map(|i| Some(Reading::from_pairs(&[(Field::Humidity, 50.0)], i)))
                .collect(),
        };
        let mut delay = Elapsed::default();
        let w = collect_window(&mut suite, 3, Duration::from_secs(1), &mut delay).unwrap();
        assert_eq!(w.len(), 3);
        assert_eq!(delay.0, 2_000_000_000);
    }

    #[test]
    fn missed_cycles_are_dropped() {
        let mut suite = Scripted {
            cycles: VecDeque::from(vec![
                None,
                Some(Reading::from_pairs(&[(Field::Humidity, 50.0)], 0)),
                None,
            ]),
        };
        let w = collect_window(&mut suite, 3, Duration::ZERO, &mut Elapsed::default()).unwrap();
        assert_eq!(w.len(), 1);
        assert_eq!(w.missed(), 2);
    }

    #[test]
    fn all_missed_is_an_empty_window() {
        let mut suite = Scripted {
            cycles: VecDeque::from(vec![None, None, None]),
        };
        assert_eq!(
            collect_window(&mut suite, 3, Duration::ZERO, &mut Elapsed::default()),
            Err(EmptyWindowError { attempted: 3 })
        );
        assert_eq!(
            SamplingWindow::from_readings(Vec::new()),
            Err(EmptyWindowError { attempted: 0 })
        );
    }
}
