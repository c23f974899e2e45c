//! Client for the Historic Service Performance API. The service reports
//! how often trains on a route met each lateness tolerance over a date
//! range; the delay predictor trains on these numbers.

use std::sync::Arc;
use std::{env, error, fmt};

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Deserializer};
use serde_json::json;

pub const HSP_API_URL: &str = "https://hsp-prod.rockshore.net/api/v1";
pub const SERVICE_METRICS_URL: &str =
    "https://hsp-prod.rockshore.net/api/v1/serviceMetrics";

#[derive(Debug, Clone)]
pub enum ApiError {
    RequestError(Arc<reqwest::Error>),
    InvalidResponse {
        status_code: reqwest::StatusCode,
        response: Option<String>,
    },
}

impl error::Error for ApiError {}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::RequestError(e) => write!(f, "HTTP request error: {}", e),
            ApiError::InvalidResponse {
                status_code,
                response,
            } => match response {
                Some(text) => {
                    write!(f, "Invalid Response ({}): {}", status_code, text)
                }
                None => write!(f, "Invalid Response ({})", status_code),
            },
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::RequestError(Arc::new(e))
    }
}

#[derive(Debug, Clone)]
pub struct HspCredentials {
    pub username: String,
    pub password: String,
}

impl HspCredentials {
    pub fn from_env() -> Option<Self> {
        Some(Self {
            username: env::var("HSP_USERNAME").ok()?,
            password: env::var("HSP_PASSWORD").ok()?,
        })
    }
}

/// The service buckets days into weekdays, Saturdays and Sundays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HspDays {
    Weekday,
    Saturday,
    Sunday,
}

impl HspDays {
    pub fn from_date(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Sat => HspDays::Saturday,
            Weekday::Sun => HspDays::Sunday,
            _ => HspDays::Weekday,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HspDays::Weekday => "WEEKDAY",
            HspDays::Saturday => "SATURDAY",
            HspDays::Sunday => "SUNDAY",
        }
    }
}

/// A `serviceMetrics` query. Times default to the whole day; tolerances
/// are fixed to the 0/5/10/30 minute thresholds the predictor uses.
#[derive(Debug, Clone)]
pub struct ServiceMetricsRequest {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub days: HspDays,
    pub from_time: NaiveTime,
    pub to_time: NaiveTime,
    pub toc_filter: Option<Vec<String>>,
}

impl ServiceMetricsRequest {
    pub fn new(from_date: NaiveDate, to_date: NaiveDate, days: HspDays) -> Self {
        Self {
            from_date,
            to_date,
            days,
            from_time: NaiveTime::MIN,
            to_time: NaiveTime::from_hms_opt(23, 59, 0)
                .unwrap_or(NaiveTime::MIN),
            toc_filter: None,
        }
    }

    fn body(&self, from_crs: &str, to_crs: &str) -> serde_json::Value {
        let mut body = json!({
            "from_loc": from_crs,
            "to_loc": to_crs,
            "from_time": self.from_time.format("%H%M").to_string(),
            "to_time": self.to_time.format("%H%M").to_string(),
            "from_date": self.from_date.format("%Y-%m-%d").to_string(),
            "to_date": self.to_date.format("%Y-%m-%d").to_string(),
            "days": self.days.as_str(),
            "tolerance": ["0", "5", "10", "30"],
        });
        if let Some(toc_filter) = &self.toc_filter {
            body["toc_filter"] = json!(toc_filter);
        }
        body
    }
}

// The API encodes most numbers as JSON strings.
fn int_from_string<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;

    impl serde::de::Visitor<'_> for Visitor {
        type Value = i32;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "an integer or a string holding one")
        }

        fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<i32, E> {
            value.trim().parse().map_err(serde::de::Error::custom)
        }

        fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<i32, E> {
            Ok(value as i32)
        }

        fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<i32, E> {
            Ok(value as i32)
        }
    }

    deserializer.deserialize_any(Visitor)
}

#[derive(Debug, Clone, Deserialize)]
pub struct HspAttributes {
    pub origin_location: String,
    pub destination_location: String,
    pub gbtt_ptd: String,
    pub gbtt_pta: String,
    pub toc_code: String,
    #[serde(deserialize_with = "int_from_string")]
    pub matched_services: i32,
    #[serde(default)]
    pub rids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HspMetric {
    #[serde(deserialize_with = "int_from_string")]
    pub tolerance_value: i32,
    #[serde(deserialize_with = "int_from_string")]
    pub num_not_tolerance: i32,
    #[serde(deserialize_with = "int_from_string")]
    pub num_tolerance: i32,
    #[serde(deserialize_with = "int_from_string")]
    pub percent_tolerance: i32,
    pub global_tolerance: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HspService {
    #[serde(rename = "serviceAttributesMetrics")]
    pub attributes: HspAttributes,
    #[serde(rename = "Metrics", default)]
    pub metrics: Vec<HspMetric>,
}

impl HspService {
    /// The largest breached tolerance in minutes, or `None` when every
    /// matched service ran inside the loosest tolerance.
    pub fn time_late(&self) -> Option<i32> {
        let metric = self
            .metrics
            .iter()
            .max_by_key(|metric| metric.tolerance_value)?;
        if metric.num_not_tolerance == 0 {
            None
        } else {
            Some(metric.tolerance_value)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServiceMetricsResponse {
    #[serde(rename = "Services", default)]
    services: Vec<HspService>,
}

pub struct HspClient {
    http: reqwest::Client,
    credentials: HspCredentials,
}

impl HspClient {
    pub fn new(credentials: HspCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
        }
    }

    /// Performance statistics for services between two stations.
    pub async fn service_metrics(
        &self,
        from_crs: &str,
        to_crs: &str,
        request: &ServiceMetricsRequest,
    ) -> Result<Vec<HspService>, ApiError> {
        log::debug!("querying service metrics {} -> {}", from_crs, to_crs);
        let response = self
            .http
            .post(SERVICE_METRICS_URL)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .json(&request.body(from_crs, to_crs))
            .send()
            .await?;

        let status_code = response.status();
        if !status_code.is_success() {
            return Err(ApiError::InvalidResponse {
                status_code,
                response: response.text().await.ok(),
            });
        }

        let metrics: ServiceMetricsResponse = response.json().await?;
        Ok(metrics.services)
    }
}
