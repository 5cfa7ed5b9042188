//! HTTP handlers for the risk-prediction API.

use actix_web::{web, HttpResponse};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::bundle::Observation;
use crate::serve::error::ApiError;
use crate::serve::AppState;

/// `POST /predict` request body. Rolling fields are optional; when omitted
/// the current reading stands in for its own recent history.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionRequest {
    pub lat: f64,
    pub lon: f64,
    /// Calendar date, `%Y-%m-%d`.
    pub date: String,
    /// Hour of day, 0-23.
    pub hour: u32,
    pub temp: f64,
    pub tavg: f64,
    pub tmin: f64,
    pub prcp: f64,
    #[serde(default)]
    pub temp_roll3: Option<f64>,
    #[serde(default)]
    pub temp_roll7: Option<f64>,
    #[serde(default)]
    pub tavg_roll3: Option<f64>,
    #[serde(default)]
    pub tavg_roll7: Option<f64>,
    #[serde(default)]
    pub tmin_roll3: Option<f64>,
}

impl PredictionRequest {
    /// Validate ranges and build the observation to score.
    pub fn to_observation(&self) -> Result<Observation, ApiError> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(ApiError::BadRequest(format!("lat out of range: {}", self.lat)));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(ApiError::BadRequest(format!("lon out of range: {}", self.lon)));
        }
        if self.hour > 23 {
            return Err(ApiError::BadRequest(format!("hour out of range: {}", self.hour)));
        }
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|_| ApiError::BadRequest(format!("invalid date (want YYYY-MM-DD): {}", self.date)))?;
        let timestamp = date
            .and_hms_opt(self.hour, 0, 0)
            .ok_or_else(|| ApiError::BadRequest(format!("invalid hour: {}", self.hour)))?;

        Ok(Observation {
            timestamp,
            lat: self.lat,
            lon: self.lon,
            temp: self.temp,
            tavg: self.tavg,
            tmin: self.tmin,
            prcp: self.prcp,
            temp_roll3: self.temp_roll3,
            temp_roll7: self.temp_roll7,
            tavg_roll3: self.tavg_roll3,
            tavg_roll7: self.tavg_roll7,
            tmin_roll3: self.tmin_roll3,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub risk_score: f64,
    pub risk_level: &'static str,
    pub threshold: f64,
    pub features_used: usize,
}

/// `POST /predict`
pub async fn predict(
    state: web::Data<AppState>,
    body: web::Json<PredictionRequest>,
) -> Result<HttpResponse, ApiError> {
    let observation = body.to_observation()?;
    let bundle = state.current().ok_or(ApiError::ModelUnavailable)?;
    let prediction = bundle
        .predict(&observation)
        .map_err(|e| ApiError::Prediction(e.to_string()))?;

    Ok(HttpResponse::Ok().json(PredictionResponse {
        risk_score: prediction.risk_score,
        risk_level: prediction.risk_level.as_str(),
        threshold: prediction.threshold,
        features_used: bundle.feature_names.len(),
    }))
}

/// `GET /health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model_loaded": state.current().is_some(),
    }))
}

/// `GET /model-info`
pub async fn model_info(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let bundle = state.current().ok_or(ApiError::ModelUnavailable)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "model_name": bundle.model_name,
        "threshold": bundle.threshold,
        "feature_names": bundle.feature_names,
        "trained_at": bundle.trained_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
    })))
}

/// `POST /reload`
///
/// Re-reads the bundle from disk and swaps it in atomically. In-flight
/// requests keep scoring against the bundle they already hold.
pub async fn reload(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let bundle = state.reload().map_err(|e| ApiError::Reload(e.to_string()))?;
    log::info!("Reloaded {} bundle from {}", bundle.model_name, state.bundle_path().display());
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "reloaded",
        "model_name": bundle.model_name,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PredictionRequest {
        PredictionRequest {
            lat: 12.97,
            lon: 77.59,
            date: "2022-06-01".into(),
            hour: 14,
            temp: 39.0,
            tavg: 30.0,
            tmin: 26.0,
            prcp: 0.0,
            temp_roll3: None,
            temp_roll7: None,
            tavg_roll3: None,
            tavg_roll7: None,
            tmin_roll3: None,
        }
    }

    #[test]
    fn valid_request_becomes_an_observation() {
        let obs = request().to_observation().unwrap();
        assert_eq!(obs.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(), "2022-06-01T14:00:00");
        assert_eq!(obs.temp, 39.0);
        assert_eq!(obs.temp_roll3, None);
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        let mut bad = request();
        bad.lat = 91.0;
        assert!(matches!(bad.to_observation(), Err(ApiError::BadRequest(_))));

        let mut bad = request();
        bad.lon = -181.0;
        assert!(matches!(bad.to_observation(), Err(ApiError::BadRequest(_))));

        let mut bad = request();
        bad.hour = 24;
        assert!(matches!(bad.to_observation(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn malformed_date_is_rejected() {
        let mut bad = request();
        bad.date = "01-06-2022".into();
        let err = bad.to_observation().unwrap_err();
        assert!(err.to_string().contains("YYYY-MM-DD"));
    }

    #[test]
    fn rolls_deserialize_as_optional() {
        let body = r#"{"lat":12.97,"lon":77.59,"date":"2022-06-01","hour":14,
                       "temp":39.0,"tavg":30.0,"tmin":26.0,"prcp":0.0,"temp_roll3":37.0}"#;
        let req: PredictionRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.temp_roll3, Some(37.0));
        assert_eq!(req.tmin_roll3, None);
    }
}
