use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Delay estimation lives outside this crate. Implementations typically
/// sit on top of the historic service performance statistics; the planner
/// only cares about "how late, if at all".
#[async_trait]
pub trait DelayPredictor {
    /// Expected delay in minutes for a leg, or `None` for on time.
    async fn predict_delay(
        &self,
        from_crs: &str,
        to_crs: &str,
        date: NaiveDate,
        departure: NaiveTime,
    ) -> Option<u32>;
}

/// Weather lookup collaborator, used to decorate journey reports.
#[async_trait]
pub trait WeatherProvider {
    /// A short human-readable forecast for a station at a point in time.
    async fn weather_at(&self, crs: &str, at: NaiveDateTime) -> Option<String>;
}
