use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use database::{queries, Store};
use feeds::{open_database, IngestConfig};

// The refresh guard is process-wide, so the ingest tests take turns.
static INGEST_LOCK: Mutex<()> = Mutex::new(());

fn padded_line(fields: &[(usize, &str)]) -> String {
    let mut buffer = vec![b' '; 132];
    for (start, text) in fields {
        buffer[*start..*start + text.len()].copy_from_slice(text.as_bytes());
    }
    String::from_utf8(buffer).expect("fields are ascii")
}

fn loc_file() -> String {
    [
        padded_line(&[
            (0, "RL"),
            (2, "7054590"),
            (9, "31129999"),
            (17, "01012020"),
            (36, "0258"),
            (56, "BTN"),
        ]),
        padded_line(&[
            (0, "RL"),
            (2, "7054600"),
            (9, "31129999"),
            (17, "01012020"),
            (36, "0260"),
            (56, "PRP"),
        ]),
        // Expired entries never reach the store.
        padded_line(&[
            (0, "RL"),
            (2, "7054610"),
            (9, "31122020"),
            (17, "01012020"),
            (36, "0262"),
            (56, "HOV"),
        ]),
    ]
    .join("\n")
}

fn ffl_file() -> String {
    [
        padded_line(&[
            (0, "RF"),
            (2, "0258"),
            (6, "0260"),
            (19, "S"),
            (20, "31129999"),
            (28, "01012020"),
            (36, "SN "),
            (42, "0012345"),
        ]),
        padded_line(&[(0, "RT"), (2, "0012345"), (9, "SDS"), (12, "00000550")]),
        padded_line(&[(0, "RT"), (2, "0012345"), (9, "SDR"), (12, "00000900")]),
    ]
    .join("\n")
}

fn fsc_file() -> String {
    padded_line(&[
        (0, "F"),
        (1, "CL99"),
        (5, "0258"),
        (9, "31129999"),
        (17, "01012020"),
    ])
}

fn tty_file() -> String {
    let ticket = |code: &str, tkt_type: &str| {
        padded_line(&[
            (0, "R"),
            (1, code),
            (4, "31129999"),
            (12, "01012020"),
            (28, "STANDARD TICKET"),
            (43, "2"),
            (44, tkt_type),
            (45, "S"),
            (54, "001"),
            (57, "001"),
            (60, "001"),
            (63, "000"),
            (66, "001"),
            (69, "000"),
            (72, "N"),
            (73, "N"),
            (74, "N"),
            (75, "00"),
            (98, "N"),
            (99, code),
            (103, "00"),
            (105, "0"),
            (106, "N"),
            (107, "N"),
            (108, "001"),
            (111, "01"),
        ])
    };
    [ticket("SDS", "S"), ticket("SDR", "R")].join("\n")
}

fn mca_file() -> String {
    [
        padded_line(&[(0, "TI"), (2, "BRGHTN"), (53, "BTN"), (56, "BRIGHTON")]),
        padded_line(&[(0, "TI"), (2, "PRSTNPK"), (53, "PRP"), (56, "PRESTON PARK")]),
        padded_line(&[(0, "TI"), (2, "LNDNBDG"), (53, "LBG"), (56, "LONDON BRIDGE")]),
        padded_line(&[
            (0, "BS"),
            (2, "N"),
            (3, "C10000"),
            (9, "200101"),
            (15, "291231"),
            (21, "1111111"),
            (28, "Y"),
        ]),
        padded_line(&[(0, "BX"), (11, "SN"), (14, "SN123400")]),
        padded_line(&[(0, "LO"), (2, "BRGHTN"), (10, "1000"), (15, "1000"), (19, "1")]),
        padded_line(&[
            (0, "LI"),
            (2, "PRSTNPK"),
            (10, "1005"),
            (15, "1006"),
            (25, "1005"),
            (29, "1006"),
            (33, "2"),
        ]),
        // Passed without stopping: no row may appear for this location.
        padded_line(&[(0, "LI"), (2, "HOVE"), (20, "1010")]),
        padded_line(&[(0, "LT"), (2, "LNDNBDG"), (10, "1030"), (15, "1030"), (19, "3")]),
    ]
    .join("\n")
}

const INCIDENTS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Incidents xmlns="http://nationalrail.co.uk/xml/incident">
  <PtIncident>
    <CreationTime>2022-01-01T10:30:00.000Z</CreationTime>
    <IncidentNumber>INC001</IncidentNumber>
    <Planned>false</Planned>
    <Summary>Disruption between Brighton and Preston Park</Summary>
    <Description>Expect delays.</Description>
    <Affects>
      <Operators>
        <AffectedOperator>
          <OperatorRef>SN</OperatorRef>
          <OperatorName>Southern</OperatorName>
        </AffectedOperator>
      </Operators>
      <RoutesAffected>Brighton and Preston Park</RoutesAffected>
    </Affects>
    <ClearedIncident>false</ClearedIncident>
  </PtIncident>
</Incidents>"#;

const STATIONS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<StationList xmlns="http://nationalrail.co.uk/xml/station">
  <Station><CrsCode>BTN</CrsCode><Name>Brighton</Name></Station>
  <Station><CrsCode>PRP</CrsCode><Name>Preston Park</Name></Station>
</StationList>"#;

fn write_zip(path: &Path, files: &[(&str, String)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, content) in files {
        zip.start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn write_storage(storage: &Path, mca: String) {
    write_zip(
        &storage.join("FARES.ZIP"),
        &[
            ("RJFAF499.LOC", loc_file()),
            ("RJFAF499.FFL", ffl_file()),
            ("RJFAF499.FSC", fsc_file()),
            ("RJFAF499.TTY", tty_file()),
        ],
    );
    write_zip(&storage.join("TIMETABLE.ZIP"), &[("RJTTF293.MCA", mca)]);
    std::fs::write(storage.join("INCIDENTS.XML"), INCIDENTS_XML).unwrap();
    std::fs::write(storage.join("STATIONS.XML"), STATIONS_XML).unwrap();
}

async fn count(store: &Store, table: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(store.pool())
        .await
        .unwrap();
    count
}

#[tokio::test]
async fn ingest_populates_and_expiry_drives_refresh() {
    let _guard = INGEST_LOCK.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let storage = dir.path().join("storage");
    std::fs::create_dir_all(&storage).unwrap();
    write_storage(&storage, mca_file());

    let config = IngestConfig::local_storage(
        dir.path().join("knowledge.db"),
        storage.clone(),
    );

    let store = open_database(&config).await.unwrap();

    assert_eq!(count(&store, "location_record").await, 2);
    assert_eq!(count(&store, "station_cluster").await, 1);
    assert_eq!(count(&store, "flow_record").await, 1);
    assert_eq!(count(&store, "fare_record").await, 2);
    assert_eq!(count(&store, "ticket_type").await, 2);
    assert_eq!(count(&store, "train_timetable").await, 1);
    assert_eq!(count(&store, "tiploc").await, 3);
    assert_eq!(count(&store, "incidents").await, 1);
    assert_eq!(count(&store, "incident_affected_operators").await, 1);
    assert_eq!(count(&store, "station").await, 2);

    // The passed-through location gets no stop row; the link precompute
    // only joins consecutive stop pairs.
    assert_eq!(count(&store, "timetable_location").await, 3);
    let locations: Vec<(String, i64)> = sqlx::query_as(
        "SELECT location, train_route_index FROM timetable_location
            ORDER BY train_route_index",
    )
    .fetch_all(store.pool())
    .await
    .unwrap();
    assert_eq!(
        locations,
        vec![
            ("BRGHTN".to_owned(), 0),
            ("PRSTNPK".to_owned(), 1),
            ("LNDNBDG".to_owned(), 2),
        ]
    );
    assert_eq!(count(&store, "timetable_link").await, 2);

    for api_url in ["2.0/fares", "3.0/timetable", "5.0/incidents", "4.0/stations"] {
        assert!(queries::expiry::expiry_for(store.pool(), api_url)
            .await
            .unwrap()
            .is_some());
    }

    // While every feed is fresh a reopen must not touch the tables.
    store.wipe(database::Table::Station).await.unwrap();
    drop(store);
    let store = open_database(&config).await.unwrap();
    assert_eq!(count(&store, "station").await, 0);

    // Zeroing one feed's expiry refreshes that feed alone on reopen.
    queries::expiry::set_expiry(store.pool(), "5.0/incidents", 0)
        .await
        .unwrap();
    store.wipe(database::Table::Incident).await.unwrap();
    drop(store);
    let store = open_database(&config).await.unwrap();
    assert_eq!(count(&store, "incidents").await, 1);
    assert_eq!(count(&store, "station").await, 0);
}

#[tokio::test]
async fn malformed_feed_fails_loud_and_keeps_others() {
    let _guard = INGEST_LOCK.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let storage = dir.path().join("storage");
    std::fs::create_dir_all(&storage).unwrap();
    // A truncated BS record violates the column layout.
    write_storage(&storage, "BS N".to_owned());

    let database_path = dir.path().join("knowledge.db");
    let config = IngestConfig::local_storage(database_path.clone(), storage);

    let result = open_database(&config).await;
    assert!(result.is_err());

    // The crashed feed keeps no expiry and will retry on the next open;
    // the healthy feeds completed and were stamped.
    let store = Store::open(&database_path).await.unwrap();
    assert!(queries::expiry::expiry_for(store.pool(), "3.0/timetable")
        .await
        .unwrap()
        .is_none());
    assert!(queries::expiry::expiry_for(store.pool(), "5.0/incidents")
        .await
        .unwrap()
        .is_some());
    assert!(count(&store, "incidents").await > 0);
    assert_eq!(count(&store, "station").await, 2);
}
