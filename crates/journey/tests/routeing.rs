use chrono::{NaiveDate, NaiveTime};
use database::data_model::{
    LocationType, Record, RecordSet, TimetableLink, TimetableLocation, Tiploc,
    TrainTimetable,
};
use database::Store;
use journey::routeing::{
    filter_best_journeys, find_best_journeys, find_journeys_from_crs, plan_journeys,
    search_paths,
};

fn train(uid: &str) -> TrainTimetable {
    TrainTimetable {
        train_uid: uid.to_owned(),
        date_runs_from: 20220101,
        date_runs_to: 20291231,
        monday: true,
        tuesday: true,
        wednesday: true,
        thursday: true,
        friday: true,
        saturday: true,
        sunday: true,
        bank_holiday_running: true,
        rsid: format!("{uid}00"),
        toc: "SN".to_owned(),
    }
}

fn stop(
    uid: &str,
    index: i32,
    location: &str,
    location_type: LocationType,
    arrival: Option<i32>,
    departure: Option<i32>,
) -> TimetableLocation {
    let public = |encoded: Option<i32>| {
        encoded.and_then(|value| {
            NaiveTime::from_hms_opt((value / 100) as u32, (value % 100) as u32, 0)
        })
    };
    TimetableLocation {
        train_uid: uid.to_owned(),
        train_route_index: index,
        location_type,
        location: location.to_owned(),
        scheduled_arrival_time: arrival,
        scheduled_departure_time: departure,
        public_arrival: public(arrival),
        public_departure: public(departure),
        platform: String::new(),
        line: String::new(),
        path: String::new(),
        activity: String::new(),
        engineering_allowance: String::new(),
        pathing_allowance: String::new(),
        performance_allowance: String::new(),
    }
}

fn link(from: &str, to: &str) -> Record {
    Record::TimetableLink(TimetableLink {
        from_location: from.to_owned(),
        to_location: to.to_owned(),
    })
}

fn tiploc(code: &str, crs: &str) -> Record {
    Record::Tiploc(Tiploc {
        tiploc_code: code.to_owned(),
        crs_code: crs.to_owned(),
        description: code.to_owned(),
    })
}

async fn diamond_store() -> Store {
    let store = Store::open_in_memory().await.unwrap();
    let mut records = RecordSet::new();
    for record in [
        link("A", "B"),
        link("A", "C"),
        link("B", "D"),
        link("C", "D"),
    ] {
        records.push(record);
    }
    store.insert_records(records).await.unwrap();
    store
}

#[tokio::test]
async fn diamond_graph_yields_both_routes() {
    let store = diamond_store().await;

    let paths = search_paths(&store, 2, "A", "D").await.unwrap();
    let routes: Vec<Vec<String>> =
        paths.iter().flat_map(|path| path.routes()).collect();

    let expected = |names: [&str; 3]| {
        names.into_iter().map(str::to_owned).collect::<Vec<_>>()
    };
    assert!(routes.contains(&expected(["A", "B", "D"])));
    assert!(routes.contains(&expected(["A", "C", "D"])));
}

#[tokio::test]
async fn enumerated_routes_never_revisit_a_location() {
    let store = diamond_store().await;

    let paths = search_paths(&store, 4, "A", "D").await.unwrap();
    for path in &paths {
        for route in path.routes() {
            let unique: std::collections::HashSet<&String> = route.iter().collect();
            assert_eq!(unique.len(), route.len(), "cycle in {route:?}");
        }
    }
}

async fn two_leg_store() -> Store {
    let store = Store::open_in_memory().await.unwrap();
    let mut records = RecordSet::new();
    for record in [
        tiploc("A", "AAA"),
        tiploc("B", "BBB"),
        tiploc("C", "CCC"),
        link("A", "B"),
        link("B", "C"),
    ] {
        records.push(record);
    }
    for uid in ["T1", "T2", "T3"] {
        records.push(Record::TrainTimetable(train(uid)));
    }
    // T1 runs the first leg; T2 is the first connection that actually
    // waits for it; T3 leaves too early to board.
    for record in [
        stop("T1", 0, "A", LocationType::Origin, None, Some(1000)),
        stop("T1", 1, "B", LocationType::Terminating, Some(1030), None),
        stop("T2", 0, "B", LocationType::Origin, None, Some(1100)),
        stop("T2", 1, "C", LocationType::Terminating, Some(1130), None),
        stop("T3", 0, "B", LocationType::Origin, None, Some(1015)),
        stop("T3", 1, "C", LocationType::Terminating, Some(1045), None),
    ] {
        records.push(Record::TimetableLocation(record));
    }
    store.insert_records(records).await.unwrap();
    store
}

fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 4).unwrap()
}

#[tokio::test]
async fn journeys_connect_in_departure_order() {
    let store = two_leg_store().await;

    let results = find_journeys_from_crs(&store, "AAA", "CCC", tuesday())
        .await
        .unwrap();
    assert_eq!(results.len(), 1);

    let (route, journeys) = &results[0];
    assert_eq!(route.len(), 2);
    assert_eq!(journeys.len(), 1);

    let journey = &journeys[0];
    assert_eq!(journey[0].train.train_uid, "T1");
    // T3 leaves B before T1 arrives, so T2 is the earliest usable
    // connection.
    assert_eq!(journey[1].train.train_uid, "T2");
    for pair in journey.windows(2) {
        let arrival = pair[0].end.scheduled_arrival_time.unwrap();
        let departure = pair[1].start.scheduled_departure_time.unwrap();
        assert!(departure > arrival);
    }
}

#[tokio::test]
async fn unknown_station_gives_an_empty_result() {
    let store = two_leg_store().await;
    let results = find_journeys_from_crs(&store, "AAA", "ZZZ", tuesday())
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn out_of_validity_dates_give_no_journeys() {
    let store = two_leg_store().await;
    let results =
        find_journeys_from_crs(&store, "AAA", "CCC", NaiveDate::from_ymd_opt(2019, 1, 1).unwrap())
            .await
            .unwrap();
    let journeys: usize = results.iter().map(|(_, journeys)| journeys.len()).sum();
    assert_eq!(journeys, 0);
}

#[tokio::test]
async fn requested_departure_time_is_honoured_with_next_day_fallback() {
    let store = two_leg_store().await;

    let morning = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
    let journeys = find_best_journeys(&store, "AAA", "CCC", tuesday(), morning)
        .await
        .unwrap();
    assert!(!journeys.is_empty());

    // After the last departure of the day nothing fits...
    let late = NaiveTime::from_hms_opt(10, 30, 0).unwrap();
    let journeys = find_best_journeys(&store, "AAA", "CCC", tuesday(), late)
        .await
        .unwrap();
    assert!(journeys.is_empty());

    // ...so the planner retries from midnight next day.
    let journeys = plan_journeys(&store, "AAA", "CCC", tuesday(), late)
        .await
        .unwrap();
    assert!(!journeys.is_empty());
}

#[test]
fn pareto_filter_keeps_the_tightest_journey_per_arrival() {
    // Two one-leg journeys arriving together at 1130; the 1100 departure
    // is the tighter one. A third journey arrives later and survives.
    let route = vec![journey::TrainRouteSegment {
        path: vec!["B".to_owned(), "C".to_owned()],
        start_location: "B".to_owned(),
        stop_location: "C".to_owned(),
    }];
    let leg = |uid: &str, dep: i32, arr: i32| {
        vec![journey::JourneySegment {
            train: train(uid),
            start: stop(uid, 0, "B", LocationType::Origin, None, Some(dep)),
            end: stop(uid, 1, "C", LocationType::Terminating, Some(arr), None),
        }]
    };
    let input = vec![(
        route.clone(),
        vec![leg("T2", 1100, 1130), leg("T4", 1030, 1130), leg("T5", 1140, 1210)],
    )];

    let best = filter_best_journeys(input);
    assert_eq!(best.len(), 1);
    let (_, journeys) = &best[0];
    assert_eq!(journeys.len(), 2);

    let mut arrivals = std::collections::HashSet::new();
    for journey in journeys {
        let arrival = journey.last().unwrap().end.scheduled_arrival_time.unwrap();
        assert!(arrivals.insert(arrival), "duplicate arrival kept");
    }
    // The 1130 arrival kept the latest departure.
    let at_1130 = journeys
        .iter()
        .find(|j| j.last().unwrap().end.scheduled_arrival_time == Some(1130))
        .unwrap();
    assert_eq!(
        at_1130.first().unwrap().start.scheduled_departure_time,
        Some(1100)
    );
}
