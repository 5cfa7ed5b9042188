use geo::{point, BoundingRect, Intersects, Rect};
use rstar::{RTree, RTreeObject, AABB};

use crate::types::{IncidentRecord, LandcoverPolygon, WeatherRecord};

/// A weather grid point in the R-tree, tagged with its input index.
#[derive(Debug, Clone)]
struct GridPoint {
    idx: usize,
    loc: [f64; 2], // (lat, lon) plane; planar approximation, not great-circle
}

impl RTreeObject for GridPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.loc)
    }
}

impl rstar::PointDistance for GridPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.loc[0] - point[0];
        let dy = self.loc[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Nearest-point index over weather observation locations.
#[derive(Debug)]
pub struct WeatherIndex {
    tree: RTree<GridPoint>,
}

/// A resolved nearest-weather match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestMatch {
    pub weather_idx: usize,
    pub distance: f64,
}

impl WeatherIndex {
    pub fn new(weather: &[WeatherRecord]) -> Self {
        let tree = RTree::bulk_load(
            weather
                .iter()
                .enumerate()
                .map(|(idx, w)| GridPoint { idx, loc: [w.lat, w.lon] })
                .collect(),
        );
        Self { tree }
    }

    /// Nearest weather point by planar Euclidean distance, or `None` when the
    /// best candidate lies beyond `cutoff`.
    ///
    /// Ties resolve to the lowest input index, so the join is deterministic
    /// regardless of R-tree iteration order.
    pub fn nearest(&self, lat: f64, lon: f64, cutoff: Option<f64>) -> Option<NearestMatch> {
        let query = [lat, lon];
        let mut best: Option<(f64, usize)> = None;
        for (cand, d2) in self.tree.nearest_neighbor_iter_with_distance_2(&query) {
            match best {
                None => best = Some((d2, cand.idx)),
                Some((best_d2, best_idx)) => {
                    if d2 > best_d2 {
                        break; // iterator is distance-ordered; no closer ties remain
                    }
                    if cand.idx < best_idx {
                        best = Some((d2, cand.idx));
                    }
                }
            }
        }
        let (d2, idx) = best?;
        let distance = d2.sqrt();
        if cutoff.is_some_and(|c| distance > c) {
            return None;
        }
        Some(NearestMatch { weather_idx: idx, distance })
    }
}

/// Bounding box of one land-cover polygon, tagged with its input index.
#[derive(Debug, Clone)]
struct PolyBBox {
    idx: usize,
    bbox: Rect<f64>,
}

impl RTreeObject for PolyBBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

/// Containment index over the land-cover polygons.
#[derive(Debug)]
pub struct LandcoverIndex {
    polygons: Vec<LandcoverPolygon>,
    tree: RTree<PolyBBox>,
}

impl LandcoverIndex {
    /// Build the index; polygons with a degenerate (empty) geometry are
    /// unreachable and silently skipped.
    pub fn new(polygons: Vec<LandcoverPolygon>) -> Self {
        let tree = RTree::bulk_load(
            polygons
                .iter()
                .enumerate()
                .filter_map(|(idx, p)| {
                    p.geometry.bounding_rect().map(|bbox| PolyBBox { idx, bbox })
                })
                .collect(),
        );
        Self { polygons, tree }
    }

    #[inline]
    pub fn polygons(&self) -> &[LandcoverPolygon] {
        &self.polygons
    }

    /// Index of the polygon covering (lat, lon), or `None`.
    ///
    /// Overlapping polygons are not aggregated: the polygon with the lowest
    /// input index wins, as an explicit contract.
    pub fn locate(&self, lat: f64, lon: f64) -> Option<usize> {
        let pt = point!(x: lon, y: lat); // geometry plane is (x=lon, y=lat)
        let env = AABB::from_point([lon, lat]);
        self.tree
            .locate_in_envelope_intersecting(&env)
            .map(|bb| bb.idx)
            .filter(|&idx| self.polygons[idx].geometry.intersects(&pt))
            .min()
    }
}

/// Nearest-weather join: one optional match per incident, in incident order.
/// Inputs are untouched; the result is a new collection.
pub fn join_nearest_weather(
    incidents: &[IncidentRecord],
    weather: &[WeatherRecord],
    cutoff: Option<f64>,
) -> Vec<Option<NearestMatch>> {
    if weather.is_empty() {
        return vec![None; incidents.len()];
    }
    let index = WeatherIndex::new(weather);
    incidents
        .iter()
        .map(|inc| index.nearest(inc.lat, inc.lon, cutoff))
        .collect()
}

/// Containment join: one optional polygon index per incident, in incident order.
pub fn join_landcover(
    incidents: &[IncidentRecord],
    index: &LandcoverIndex,
) -> Vec<Option<usize>> {
    incidents
        .iter()
        .map(|inc| index.locate(inc.lat, inc.lon))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use geo::{polygon, MultiPolygon};

    fn weather_at(lat: f64, lon: f64) -> WeatherRecord {
        WeatherRecord {
            timestamp: NaiveDate::from_ymd_opt(2022, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            lat,
            lon,
            temp: 35.0,
            tavg: 30.0,
            tmin: 25.0,
            prcp: 0.0,
        }
    }

    fn incident_at(lat: f64, lon: f64) -> IncidentRecord {
        IncidentRecord {
            timestamp: NaiveDate::from_ymd_opt(2022, 6, 1).unwrap().and_hms_opt(14, 0, 0).unwrap(),
            lat,
            lon,
            incident_type: "heat_stroke".into(),
            severity: 3,
        }
    }

    fn square(lat0: f64, lon0: f64, lat1: f64, lon1: f64, ty: &str) -> LandcoverPolygon {
        LandcoverPolygon {
            geometry: MultiPolygon(vec![polygon![
                (x: lon0, y: lat0),
                (x: lon1, y: lat0),
                (x: lon1, y: lat1),
                (x: lon0, y: lat1),
                (x: lon0, y: lat0),
            ]]),
            landcover_type: ty.into(),
            urban_density: 0.5,
            vegetation_cover: 0.3,
            water_bodies: 0.1,
        }
    }

    #[test]
    fn nearest_picks_minimum_distance() {
        let weather = vec![weather_at(12.0, 77.0), weather_at(13.0, 78.0)];
        let matches = join_nearest_weather(&[incident_at(12.9, 77.9)], &weather, None);
        assert_eq!(matches[0].unwrap().weather_idx, 1);
    }

    #[test]
    fn cutoff_rejects_distant_matches() {
        let weather = vec![weather_at(12.0, 77.0)];
        let matches = join_nearest_weather(&[incident_at(13.0, 78.0)], &weather, Some(0.05));
        assert!(matches[0].is_none());

        let close = join_nearest_weather(&[incident_at(12.01, 77.01)], &weather, Some(0.05));
        assert!(close[0].is_some());
    }

    #[test]
    fn equidistant_tie_breaks_to_lowest_index_deterministically() {
        // Two stations mirrored around the query point.
        let weather = vec![weather_at(12.0, 77.0), weather_at(12.0, 78.0)];
        let incident = incident_at(12.0, 77.5);
        for _ in 0..10 {
            let matches = join_nearest_weather(&[incident.clone()], &weather, None);
            assert_eq!(matches[0].unwrap().weather_idx, 0);
        }
    }

    #[test]
    fn join_twice_is_identical() {
        let weather: Vec<_> = (0..20)
            .map(|i| weather_at(12.0 + f64::from(i) * 0.01, 77.0 + f64::from(i % 5) * 0.02))
            .collect();
        let incidents: Vec<_> = (0..15)
            .map(|i| incident_at(12.05 + f64::from(i) * 0.013, 77.03 + f64::from(i) * 0.007))
            .collect();
        let a = join_nearest_weather(&incidents, &weather, Some(0.5));
        let b = join_nearest_weather(&incidents, &weather, Some(0.5));
        assert_eq!(a, b);
    }

    #[test]
    fn landcover_zero_matches_is_none() {
        let index = LandcoverIndex::new(vec![square(12.9, 77.5, 13.1, 77.7, "urban")]);
        assert_eq!(index.locate(20.0, 20.0), None);
    }

    #[test]
    fn overlapping_polygons_pick_first_in_input_order() {
        let index = LandcoverIndex::new(vec![
            square(12.0, 77.0, 14.0, 79.0, "vegetation"),
            square(12.5, 77.2, 13.5, 78.0, "urban"),
        ]);
        // Point inside both; the earlier polygon wins.
        assert_eq!(index.locate(12.97, 77.59), Some(0));

        let reversed = LandcoverIndex::new(vec![
            square(12.5, 77.2, 13.5, 78.0, "urban"),
            square(12.0, 77.0, 14.0, 79.0, "vegetation"),
        ]);
        assert_eq!(reversed.locate(12.97, 77.59), Some(0));
    }

    #[test]
    fn joins_do_not_mutate_inputs() {
        let weather = vec![weather_at(12.0, 77.0)];
        let incidents = vec![incident_at(12.01, 77.01)];
        let weather_before = weather.clone();
        let incidents_before = incidents.clone();
        let _ = join_nearest_weather(&incidents, &weather, None);
        assert_eq!(weather, weather_before);
        assert_eq!(incidents, incidents_before);
    }
}
