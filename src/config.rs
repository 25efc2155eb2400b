//! Run configuration for one report.
//!
//! Everything time-dependent is resolved by the caller and passed in here,
//! so the pipeline never reads the clock or the environment itself.

use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::error::{Result, StabilityError};

pub const DEFAULT_TOP_N: usize = 50;
pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;
/// Distance between the report date and the compare date.
pub const COMPARE_OFFSET_DAYS: u64 = 7;

/// A validated request for one city and date.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    pub city_id: String,
    pub date: NaiveDate,
    pub top_n: usize,
    pub lookback_days: u32,
    /// Stamped on the report as `generatedAt`.
    pub generated_at: DateTime<Utc>,
}

impl ReportRequest {
    /// Validates raw inputs. `date` of `None` means the UTC date of `now`.
    pub fn new(
        city_id: Option<&str>,
        date: Option<&str>,
        top_n: usize,
        lookback_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let city_id = city_id
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| StabilityError::Configuration("--cityId is required".into()))?;

        let date = match date {
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
                StabilityError::Configuration(format!("--date '{raw}' is not YYYY-MM-DD: {e}"))
            })?,
            None => now.date_naive(),
        };

        if top_n == 0 {
            return Err(StabilityError::Configuration("--topN must be at least 1".into()));
        }
        if lookback_days == 0 {
            return Err(StabilityError::Configuration(
                "--lookbackDays must be at least 1".into(),
            ));
        }

        Ok(Self {
            city_id: city_id.to_string(),
            date,
            top_n,
            lookback_days,
            generated_at: now,
        })
    }

    pub fn compare_date(&self) -> NaiveDate {
        self.date
            .checked_sub_days(Days::new(COMPARE_OFFSET_DAYS))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Start of the telemetry window: midnight UTC of the report date minus
    /// the lookback, in epoch millis.
    pub fn cutoff_ms(&self) -> i64 {
        let start = self
            .date
            .checked_sub_days(Days::new(u64::from(self.lookback_days)))
            .unwrap_or(NaiveDate::MIN);
        start
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis())
            .unwrap_or(i64::MIN)
    }
}
