use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::Result;

/// Where segment aggregates, raw passes and reports live in the store.
///
/// Path templates use `{cityId}` and `{date}` placeholders. Loaded from a
/// JSON file; every field is optional and falls back to the default layout:
/// ```json
/// {
///   "segmentPaths": ["cities/{cityId}/normalizedSegments/{date}/segments"],
///   "telemetryCollection": "vehiclePasses",
///   "reportPath": "cities/{cityId}/stabilityReports/{date}"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreLayout {
    /// Known segment collection shapes, newest first.
    pub segment_paths: Vec<String>,
    pub telemetry_collection: String,
    pub report_path: String,
    pub pass_fields: PassFieldNames,
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self {
            segment_paths: vec![
                "cities/{cityId}/normalizedSegments/{date}/segments".into(),
                "normalizedSegments/{cityId}/dates/{date}/segments".into(),
                "normalizedSegments/{cityId}_{date}/segments".into(),
            ],
            telemetry_collection: "vehiclePasses".into(),
            report_path: "cities/{cityId}/stabilityReports/{date}".into(),
            pass_fields: PassFieldNames::default(),
        }
    }
}

impl StoreLayout {
    /// Loads a layout from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Candidate segment collection paths for a city and date, in probe order.
    pub fn segment_paths_for(&self, city_id: &str, date: NaiveDate) -> Vec<String> {
        self.segment_paths
            .iter()
            .map(|template| render(template, city_id, date))
            .collect()
    }

    pub fn report_path_for(&self, city_id: &str, date: NaiveDate) -> String {
        render(&self.report_path, city_id, date)
    }
}

fn render(template: &str, city_id: &str, date: NaiveDate) -> String {
    template
        .replace("{cityId}", city_id)
        .replace("{date}", &date.format("%Y-%m-%d").to_string())
}

/// Field names on raw pass records, each list tried in order.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PassFieldNames {
    pub city: String,
    pub segment: Vec<String>,
    pub vehicle: Vec<String>,
    /// Numeric epoch-millis field used for server-side time filtering.
    pub numeric_timestamp: String,
    /// Structured timestamp field used when the numeric query is rejected.
    pub structured_timestamp: String,
    /// Event time candidates, numeric fields first.
    pub timestamp: Vec<String>,
    pub energy: Vec<String>,
    pub sample_count: Vec<String>,
}

impl Default for PassFieldNames {
    fn default() -> Self {
        Self {
            city: "cityId".into(),
            segment: vec!["h3".into(), "h3Index".into(), "segmentId".into()],
            vehicle: vec!["vehicleHash".into(), "vehicleId".into(), "deviceHash".into()],
            numeric_timestamp: "startTs".into(),
            structured_timestamp: "startedAt".into(),
            timestamp: vec![
                "startTs".into(),
                "startTimeMs".into(),
                "startedAt".into(),
                "timestamp".into(),
                "createdAt".into(),
            ],
            energy: vec!["roughnessEnergySum".into()],
            sample_count: vec!["sampleCount".into()],
        }
    }
}
