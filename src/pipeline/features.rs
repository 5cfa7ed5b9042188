use std::f64::consts::TAU;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::types::WeatherSample;

/// Engineered scalar features derived from one joined row. Weather-dependent
/// fields stay `None` when the nearest-weather join failed.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineeredFeatures {
    pub hour: u32,
    pub dayofweek: u32, // Monday = 0
    pub month: u32,
    pub dayofyear: u32,
    pub temp_range: Option<f64>,
    pub heat_index: Option<f64>,
    pub is_peak: f64,
    pub is_weekend: f64,
    pub dist_center: f64,
    pub hour_sin: f64,
    pub hour_cos: f64,
    pub month_sin: f64,
    pub month_cos: f64,
    pub season: &'static str,
}

/// Derive the full engineered feature set for one row. Pure and stateless;
/// the serving-side reconstructor goes through the same scalar helpers so
/// training and inference cannot drift apart.
pub fn engineer(
    timestamp: NaiveDateTime,
    lat: f64,
    lon: f64,
    weather: Option<&WeatherSample>,
    center: (f64, f64),
) -> EngineeredFeatures {
    let hour = timestamp.hour();
    let dayofweek = timestamp.weekday().num_days_from_monday();
    let month = timestamp.month();
    let (hour_sin, hour_cos) = cyclical(f64::from(hour), 24.0);
    let (month_sin, month_cos) = cyclical(f64::from(month), 12.0);

    EngineeredFeatures {
        hour,
        dayofweek,
        month,
        dayofyear: timestamp.ordinal(),
        temp_range: weather.map(|w| temp_range(w.temp, w.tmin)),
        heat_index: weather.map(|w| heat_index(w.temp, w.tavg)),
        is_peak: is_peak(hour),
        is_weekend: is_weekend(dayofweek),
        dist_center: dist_center(lat, lon, center),
        hour_sin,
        hour_cos,
        month_sin,
        month_cos,
        season: season_for_month(month),
    }
}

#[inline]
pub fn temp_range(temp: f64, tmin: f64) -> f64 {
    temp - tmin
}

/// Linear approximation, not the meteorological heat index.
#[inline]
pub fn heat_index(temp: f64, tavg: f64) -> f64 {
    temp + 0.5 * tavg
}

#[inline]
pub fn is_peak(hour: u32) -> f64 {
    if (10..=17).contains(&hour) { 1.0 } else { 0.0 }
}

/// `dayofweek` uses Monday = 0, so 5 and 6 are Saturday and Sunday.
#[inline]
pub fn is_weekend(dayofweek: u32) -> f64 {
    if dayofweek >= 5 { 1.0 } else { 0.0 }
}

/// Planar Euclidean distance from the configured city center, in degrees.
#[inline]
pub fn dist_center(lat: f64, lon: f64, center: (f64, f64)) -> f64 {
    (lat - center.0).hypot(lon - center.1)
}

/// sin/cos encoding of a periodic value.
#[inline]
pub fn cyclical(value: f64, period: f64) -> (f64, f64) {
    let angle = TAU * value / period;
    (angle.sin(), angle.cos())
}

pub fn season_for_month(month: u32) -> &'static str {
    match month {
        12 | 1 | 2 => "winter",
        3..=5 => "spring",
        6..=8 => "summer",
        _ => "autumn",
    }
}

#[inline]
pub fn green_urban_ratio(vegetation_cover: f64, urban_density: f64) -> f64 {
    vegetation_cover / (urban_density + 0.1)
}

#[inline]
pub fn water_availability(water_bodies: f64, vegetation_cover: f64) -> f64 {
    water_bodies + vegetation_cover
}

/// Stable string-to-code mapping for a categorical column.
///
/// Codes are first-seen positions over the training reference data. The
/// encoder is persisted inside the model bundle so serving resolves the
/// exact codes training used, no matter what order serving sees values in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    classes: Vec<String>,
}

impl CategoryEncoder {
    /// Extend the mapping with unseen values, in iteration order.
    pub fn fit<'a>(&mut self, values: impl IntoIterator<Item = &'a str>) {
        for value in values {
            if !self.classes.iter().any(|c| c == value) {
                self.classes.push(value.to_string());
            }
        }
    }

    /// The integer code for `value`, or `None` for an unseen category.
    pub fn encode(&self, value: &str) -> Option<i64> {
        self.classes.iter().position(|c| c == value).map(|p| p as i64)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// Per-column means learned on the training split, reused verbatim on test
/// and serving data (never recomputed downstream).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanImputer {
    means: Vec<(String, f64)>,
}

impl MeanImputer {
    /// Record the NaN-skipping mean of one named column. Columns with no
    /// finite values fall back to 0.0.
    pub fn fit_column(&mut self, name: &str, values: &[f64]) {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        let mean = if finite.is_empty() {
            0.0
        } else {
            finite.iter().sum::<f64>() / finite.len() as f64
        };
        match self.means.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = mean,
            None => self.means.push((name.to_string(), mean)),
        }
    }

    pub fn mean_for(&self, name: &str) -> Option<f64> {
        self.means.iter().find(|(n, _)| n == name).map(|(_, m)| *m)
    }

    /// Replace NaNs in `values` with the stored mean for `name`.
    pub fn transform_column(&self, name: &str, values: &mut [f64]) {
        let Some(mean) = self.mean_for(name) else { return };
        for v in values.iter_mut() {
            if !v.is_finite() {
                *v = mean;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::time::parse_timestamp;

    #[test]
    fn engineered_values_match_formulas() {
        let ts = parse_timestamp("2022-06-01T14:00").unwrap(); // a Wednesday in June
        let weather = WeatherSample { temp: 39.0, tavg: 30.0, tmin: 26.0, prcp: 0.0 };
        let e = engineer(ts, 12.97, 77.59, Some(&weather), (12.9716, 77.5946));

        assert_eq!(e.hour, 14);
        assert_eq!(e.dayofweek, 2);
        assert_eq!(e.month, 6);
        assert_eq!(e.temp_range, Some(13.0));
        assert_eq!(e.heat_index, Some(54.0));
        assert_eq!(e.is_peak, 1.0);
        assert_eq!(e.is_weekend, 0.0);
        assert_eq!(e.season, "summer");
        assert!((e.dist_center - ((12.97f64 - 12.9716).hypot(77.59 - 77.5946))).abs() < 1e-12);
        assert!((e.hour_sin - (TAU * 14.0 / 24.0).sin()).abs() < 1e-12);
        assert!((e.month_cos - (TAU * 6.0 / 12.0).cos()).abs() < 1e-12);
    }

    #[test]
    fn weekend_and_season_boundaries() {
        assert_eq!(is_weekend(4), 0.0); // Friday
        assert_eq!(is_weekend(5), 1.0); // Saturday
        assert_eq!(season_for_month(12), "winter");
        assert_eq!(season_for_month(2), "winter");
        assert_eq!(season_for_month(3), "spring");
        assert_eq!(season_for_month(9), "autumn");
        assert_eq!(is_peak(9), 0.0);
        assert_eq!(is_peak(10), 1.0);
        assert_eq!(is_peak(17), 1.0);
        assert_eq!(is_peak(18), 0.0);
    }

    #[test]
    fn encoder_codes_are_stable_across_orderings() {
        let mut encoder = CategoryEncoder::default();
        encoder.fit(["urban", "vegetation", "water"]);

        // Serving sees values in a different order; codes must not change.
        assert_eq!(encoder.encode("water"), Some(2));
        assert_eq!(encoder.encode("urban"), Some(0));
        assert_eq!(encoder.encode("urban"), Some(0));
        assert_eq!(encoder.encode("desert"), None);

        // Refitting with already-seen values is a no-op.
        encoder.fit(["water", "urban"]);
        assert_eq!(encoder.encode("vegetation"), Some(1));
        assert_eq!(encoder.len(), 3);
    }

    #[test]
    fn encoder_round_trips_through_serde() {
        let mut encoder = CategoryEncoder::default();
        encoder.fit(["summer", "winter"]);
        let json = serde_json::to_string(&encoder).unwrap();
        let back: CategoryEncoder = serde_json::from_str(&json).unwrap();
        assert_eq!(back.encode("winter"), Some(1));
    }

    #[test]
    fn imputer_uses_training_means_only() {
        let mut imputer = MeanImputer::default();
        imputer.fit_column("temp", &[30.0, f64::NAN, 34.0]);
        assert_eq!(imputer.mean_for("temp"), Some(32.0));

        let mut test_column = [f64::NAN, 100.0];
        imputer.transform_column("temp", &mut test_column);
        // The NaN gets the *training* mean, not the test mean.
        assert_eq!(test_column, [32.0, 100.0]);
    }
}
