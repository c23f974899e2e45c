use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use database::data_model::{Incident, IncidentAffectedOperator, Station};
use database::{Record, Table};
use serde::Deserialize;

use crate::chunker::{ChunkSender, RecordChunker};
use crate::progress::Progress;
use crate::{Feed, FeedTasks, IngestError};

// Knowledgebase namespaces, for reference; the deserialiser matches on
// local element names.
//   incidents: http://nationalrail.co.uk/xml/incident
//   stations:  http://nationalrail.co.uk/xml/station

#[derive(Debug, Deserialize)]
struct IncidentsDocument {
    #[serde(rename = "PtIncident", default)]
    incidents: Vec<PtIncident>,
}

#[derive(Debug, Deserialize)]
struct PtIncident {
    #[serde(rename = "IncidentNumber")]
    incident_number: Option<String>,
    #[serde(rename = "CreationTime")]
    creation_time: Option<String>,
    #[serde(rename = "Planned", default)]
    planned: bool,
    #[serde(rename = "Summary")]
    summary: Option<String>,
    #[serde(rename = "Description")]
    description: Option<String>,
    #[serde(rename = "ClearedIncident", default)]
    cleared_incident: bool,
    #[serde(rename = "Affects")]
    affects: Option<Affects>,
}

#[derive(Debug, Deserialize)]
struct Affects {
    #[serde(rename = "Operators", default)]
    operators: Operators,
    #[serde(rename = "RoutesAffected")]
    routes_affected: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Operators {
    #[serde(rename = "AffectedOperator", default)]
    operators: Vec<AffectedOperator>,
}

#[derive(Debug, Deserialize)]
struct AffectedOperator {
    #[serde(rename = "OperatorRef")]
    operator_ref: Option<String>,
    #[serde(rename = "OperatorName")]
    operator_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StationsDocument {
    #[serde(rename = "Station", default)]
    stations: Vec<StationElement>,
}

#[derive(Debug, Deserialize)]
struct StationElement {
    #[serde(rename = "CrsCode")]
    crs_code: Option<String>,
    #[serde(rename = "Name")]
    name: Option<String>,
}

/// Creation times arrive as ISO datetimes with fractional seconds and an
/// optional zone suffix; both are dropped.
fn parse_kb_datetime(text: &str) -> Result<NaiveDateTime, IngestError> {
    let trimmed = text.trim_end_matches('Z');
    let without_fraction = trimmed.split('.').next().unwrap_or(trimmed);
    NaiveDateTime::parse_from_str(without_fraction, "%Y-%m-%dT%H:%M:%S").map_err(|_| {
        IngestError::Malformed(format!("invalid incident creation time '{}'", text))
    })
}

fn records_for_incidents(
    text: &str,
    chunks: ChunkSender,
    progress: Progress,
) -> Result<(), IngestError> {
    let document: IncidentsDocument = serde_xml_rs::from_str(text)?;
    let incident_count = document.incidents.len() as u64;
    let mut incidents_done = 0u64;
    let mut last_report = Instant::now();
    progress.report("Incidents", 0, incident_count);

    let mut chunker = RecordChunker::new(chunks);
    for incident in document.incidents {
        let Some(incident_number) = incident.incident_number else {
            continue;
        };
        let affects = incident.affects.ok_or_else(|| {
            IngestError::Malformed(format!(
                "incident {} has no affects element",
                incident_number
            ))
        })?;
        let creation_time =
            parse_kb_datetime(incident.creation_time.as_deref().unwrap_or(""))?;

        chunker.put(Record::Incident(Incident {
            incident_number: incident_number.clone(),
            creation_time,
            planned: incident.planned,
            summary: incident.summary.unwrap_or_default(),
            description: incident.description.unwrap_or_default(),
            cleared_incident: incident.cleared_incident,
            route_affected: affects.routes_affected.unwrap_or_default(),
        }))?;

        for operator in affects.operators.operators {
            chunker.put(Record::IncidentAffectedOperator(IncidentAffectedOperator {
                incident_number: incident_number.clone(),
                operator_toc: operator.operator_ref.unwrap_or_default(),
                operator_name: operator.operator_name.unwrap_or_default(),
            }))?;
        }

        incidents_done += 1;
        if last_report.elapsed() >= Duration::from_secs(1) {
            progress.report("Incidents", incidents_done, incident_count);
            last_report = Instant::now();
        }
    }
    progress.report("Incidents", incident_count, incident_count);
    chunker.finish()
}

fn records_for_stations(
    text: &str,
    chunks: ChunkSender,
    progress: Progress,
) -> Result<(), IngestError> {
    let document: StationsDocument = serde_xml_rs::from_str(text)?;
    let station_count = document.stations.len() as u64;
    let mut stations_done = 0u64;
    let mut last_report = Instant::now();
    progress.report("Stations", 0, station_count);

    let mut chunker = RecordChunker::new(chunks);
    for station in document.stations {
        chunker.put(Record::Station(Station {
            crs_code: station.crs_code.unwrap_or_default(),
            name: station.name.unwrap_or_default(),
        }))?;

        stations_done += 1;
        if last_report.elapsed() >= Duration::from_secs(1) {
            progress.report("Stations", stations_done, station_count);
            last_report = Instant::now();
        }
    }
    progress.report("Stations", station_count, station_count);
    chunker.finish()
}

/// Live service incidents. Short expiry: these change minute to minute.
pub struct IncidentsFeed;

#[async_trait]
impl Feed for IncidentsFeed {
    fn api_url(&self) -> &'static str {
        "5.0/incidents"
    }

    fn file_name(&self) -> &'static str {
        "INCIDENTS.XML"
    }

    fn expiry_length(&self) -> u64 {
        60 * 5
    }

    fn owned_tables(&self) -> &'static [Table] {
        &[Table::Incident, Table::IncidentAffectedOperator]
    }

    async fn emit_records(
        &self,
        tasks: &mut FeedTasks<'_>,
        work_dir: &Path,
        chunks: &ChunkSender,
        progress: &Progress,
    ) -> Result<(), IngestError> {
        let text = tokio::fs::read_to_string(work_dir.join(self.file_name())).await?;
        let chunks = chunks.clone();
        let progress = progress.clone();
        tasks.spawn_blocking(move || records_for_incidents(&text, chunks, progress));
        Ok(())
    }
}

/// Station display names.
pub struct StationsFeed;

#[async_trait]
impl Feed for StationsFeed {
    fn api_url(&self) -> &'static str {
        "4.0/stations"
    }

    fn file_name(&self) -> &'static str {
        "STATIONS.XML"
    }

    fn expiry_length(&self) -> u64 {
        60 * 60 * 24
    }

    fn owned_tables(&self) -> &'static [Table] {
        &[Table::Station]
    }

    async fn emit_records(
        &self,
        tasks: &mut FeedTasks<'_>,
        work_dir: &Path,
        chunks: &ChunkSender,
        progress: &Progress,
    ) -> Result<(), IngestError> {
        let text = tokio::fs::read_to_string(work_dir.join(self.file_name())).await?;
        let chunks = chunks.clone();
        let progress = progress.clone();
        tasks.spawn_blocking(move || records_for_stations(&text, chunks, progress));
        Ok(())
    }
}
