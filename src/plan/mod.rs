//! Tuning plan construction
//!
//! Turns an ordered list of `BandPlan`s into the flat sequence of
//! `TuningPoint`s the sequencer walks: band by band, ascending within a band.

pub mod grid;

pub use grid::{band_tuning_frequencies, first_segment_center, tuning_frequencies};

use crate::domain::{BandPlan, TrainerError, TrainerResult, TuningPoint};

/// An ordered run: the bands (for per-band settings) and every point to visit.
#[derive(Debug, Clone, Default)]
pub struct TuningPlan {
    bands: Vec<BandPlan>,
    points: Vec<TuningPoint>,
}

impl TuningPlan {
    /// Build a plan in the order the bands are given.
    pub fn build(bands: Vec<BandPlan>) -> TrainerResult<Self> {
        let mut points = Vec::new();
        for band in &bands {
            for frequency in band_tuning_frequencies(band)? {
                points.push(TuningPoint {
                    band: band.label.clone(),
                    frequency,
                });
            }
        }
        if points.is_empty() {
            return Err(TrainerError::Config(
                "No tuning segments computed. Check band configuration.".into(),
            ));
        }
        Ok(Self { bands, points })
    }

    pub fn points(&self) -> &[TuningPoint] {
        &self.points
    }

    pub fn bands(&self) -> &[BandPlan] {
        &self.bands
    }

    pub fn band(&self, label: &str) -> Option<&BandPlan> {
        self.bands.iter().find(|b| b.label == label)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Multi-line human summary of one band, for `--info`.
pub fn describe_band(band: &BandPlan) -> TrainerResult<String> {
    let points = band_tuning_frequencies(band)?;
    let list: Vec<String> = points.iter().map(|p| p.mhz_text()).collect();
    Ok(format!(
        "=== Band: {} ===\n\
         Segment size: {:.1} kHz\n\
         Band start: {} MHz\n\
         Band end: {} MHz\n\
         Band width: {:.1} kHz\n\
         Number of tuning points: {}\n\
         Tuning frequencies (MHz):\n  {}",
        band.label,
        band.segment_size_hz as f64 / 1_000.0,
        band.band_start.mhz_text(),
        band.band_end.mhz_text(),
        band.width_hz() as f64 / 1_000.0,
        points.len(),
        list.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Frequency;

    fn sixty() -> BandPlan {
        BandPlan::new(
            "60m",
            Frequency::khz(5351.5),
            Frequency::khz(5366.5),
            9_000,
            Frequency::khz(5359.0),
        )
        .unwrap()
    }

    fn forty() -> BandPlan {
        BandPlan::new(
            "40m",
            Frequency::khz(7000.0),
            Frequency::khz(7200.0),
            25_000,
            Frequency::khz(7012.5),
        )
        .unwrap()
        .with_drive_power(15)
    }

    #[test]
    fn plan_keeps_band_order_and_ascending_points() {
        let plan = TuningPlan::build(vec![forty(), sixty()]).unwrap();
        assert_eq!(plan.len(), 8 + 3);
        assert!(plan.points()[..8].iter().all(|p| p.band == "40m"));
        assert!(plan.points()[8..].iter().all(|p| p.band == "60m"));
        for pair in plan.points()[..8].windows(2) {
            assert!(pair[0].frequency < pair[1].frequency);
        }
    }

    #[test]
    fn band_lookup_exposes_drive_override() {
        let plan = TuningPlan::build(vec![forty(), sixty()]).unwrap();
        assert_eq!(plan.band("40m").unwrap().drive_power_watts, Some(15));
        assert_eq!(plan.band("60m").unwrap().drive_power_watts, None);
        assert!(plan.band("20m").is_none());
    }

    #[test]
    fn empty_band_list_is_a_config_error() {
        assert!(matches!(
            TuningPlan::build(Vec::new()),
            Err(TrainerError::Config(_))
        ));
    }

    #[test]
    fn describe_lists_points() {
        let text = describe_band(&sixty()).unwrap();
        assert!(text.contains("Number of tuning points: 3"));
        assert!(text.contains("5.353000, 5.359000, 5.365000"));
    }
}
