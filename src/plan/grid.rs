//! Segment grid math
//!
//! The RF2K-S stores one tuner setting per fixed-width frequency segment.
//! Segment centers sit on an infinite arithmetic grid
//! `center = reference + k * segment_size`. Given a band, we pick every
//! center whose whole segment lies inside the band, then add a single
//! filler point in the middle of any leftover gap at either band edge so
//! that partial coverage still gets tuned.
//!
//! Everything is integer Hz. Pure functions, no I/O.

use crate::domain::{BandPlan, Frequency, TrainerError, TrainerResult};

/// `ceil(a / b)` for `b > 0`, correct for negative `a`.
fn div_ceil(a: i64, b: i64) -> i64 {
    -((-a).div_euclid(b))
}

/// First grid center whose segment *start* (`center - segment/2`) is at or
/// after `band_start`.
pub fn first_segment_center(
    band_start: Frequency,
    segment_size_hz: u64,
    reference_center: Frequency,
) -> TrainerResult<Frequency> {
    if segment_size_hz == 0 {
        return Err(TrainerError::Config("segment size must be > 0".into()));
    }
    let step = segment_size_hz as i64;
    let half = step / 2;
    let bs = band_start.as_hz() as i64;
    let c0 = reference_center.as_hz() as i64;

    let k = div_ceil(bs + half - c0, step);
    let center = c0 + k * step;
    Ok(Frequency::hz(center.max(0) as u64))
}

/// Ordered tuning centers that cover `[band_start, band_end]`.
///
/// - Full segments that fit entirely inside the band, spaced `segment_size_hz`.
/// - One filler at the midpoint of a leading or trailing gap, if any.
/// - If no full segment fits: two fillers, split at the left edge of the
///   nearest would-be segment; or one point at the band midpoint if that
///   edge does not fall strictly inside the band.
pub fn tuning_frequencies(
    band_start: Frequency,
    band_end: Frequency,
    segment_size_hz: u64,
    reference_center: Frequency,
) -> TrainerResult<Vec<Frequency>> {
    if band_end <= band_start {
        return Err(TrainerError::Config(format!(
            "band end {band_end} must be above band start {band_start}"
        )));
    }
    let first = first_segment_center(band_start, segment_size_hz, reference_center)?;

    let bs = band_start.as_hz() as i64;
    let be = band_end.as_hz() as i64;
    let step = segment_size_hz as i64;
    let half = step / 2;
    let first_c = first.as_hz() as i64;
    let first_left = first_c - half;

    let mut points: Vec<i64> = Vec::new();
    let mut c = first_c;
    while c - half >= bs && c + half <= be {
        points.push(c);
        c += step;
    }

    if points.is_empty() {
        let junction = first_left.min(be).max(bs);
        if junction <= bs || junction >= be {
            return Ok(vec![Frequency::hz(((bs + be) / 2) as u64)]);
        }
        let lead = bs + (junction - bs) / 2;
        let trail = be - (be - junction) / 2;
        return Ok(vec![Frequency::hz(lead as u64), Frequency::hz(trail as u64)]);
    }

    if first_left > bs {
        points.insert(0, bs + (first_left - bs) / 2);
    }

    // points is non-empty here
    let last_right = points[points.len() - 1] + half;
    if last_right < be {
        points.push(be - (be - last_right) / 2);
    }

    Ok(points.into_iter().map(|hz| Frequency::hz(hz as u64)).collect())
}

/// Convenience wrapper for a whole band plan.
pub fn band_tuning_frequencies(band: &BandPlan) -> TrainerResult<Vec<Frequency>> {
    tuning_frequencies(
        band.band_start,
        band.band_end,
        band.segment_size_hz,
        band.grid_reference_center,
    )
}
