use database::data_model::{
    FareRecord, FlowRecord, LocationRecord, Record, RecordSet, StationCluster,
    TicketType,
};
use database::Store;
use journey::tickets::{summarise_tickets, ticket_prices, TicketFor};

fn location(crs: &str, ncl: &str) -> Record {
    Record::Location(LocationRecord {
        crs_code: crs.to_owned(),
        ncl_code: ncl.to_owned(),
        uic_code: format!("70{ncl}0"),
    })
}

fn flow(flow_id: i32, origin: &str, destination: &str, direction: &str) -> Record {
    Record::Flow(FlowRecord {
        flow_id,
        origin_code: origin.to_owned(),
        destination_code: destination.to_owned(),
        direction: direction.to_owned(),
        toc: "SN".to_owned(),
        start_date: 20200101,
        end_date: 29991231,
    })
}

fn fare(flow_id: i32, ticket_code: &str, pence: i32) -> Record {
    Record::Fare(FareRecord {
        flow_id,
        ticket_code: ticket_code.to_owned(),
        fare: pence,
    })
}

fn ticket(code: &str, tkt_type: &str) -> Record {
    Record::TicketType(TicketType {
        ticket_code: code.to_owned(),
        description: "STANDARD TICKET".to_owned(),
        tkt_class: 2,
        tkt_type: tkt_type.to_owned(),
        tkt_group: "S".to_owned(),
        max_passengers: 1,
        min_passengers: 1,
        max_adults: 1,
        min_adults: 0,
        max_children: 1,
        min_children: 0,
        restricted_by_date: false,
        restricted_by_train: false,
        restricted_by_area: false,
        validity_code: "00".to_owned(),
        reservation_required: "N".to_owned(),
        capri_code: String::new(),
        uts_code: String::new(),
        time_restriction: 0,
        free_pass_lul: false,
        package_mkr: "N".to_owned(),
        fare_multiplier: 1,
        discount_category: "01".to_owned(),
    })
}

fn cluster(cluster_id: &str, nlc: &str) -> Record {
    Record::StationCluster(StationCluster {
        cluster_id: cluster_id.to_owned(),
        location_nlc: nlc.to_owned(),
    })
}

#[tokio::test]
async fn direct_flow_prices_and_summary() {
    let store = Store::open_in_memory().await.unwrap();
    let mut records = RecordSet::new();
    for record in [
        location("BTN", "0258"),
        location("PRP", "0260"),
        flow(12345, "0258", "0260", "S"),
        fare(12345, "SDS", 550),
        fare(12345, "SDR", 900),
        ticket("SDS", "S"),
        ticket("SDR", "R"),
    ] {
        records.push(record);
    }
    store.insert_records(records).await.unwrap();

    let prices = ticket_prices(&store, "BTN", "PRP").await.unwrap();
    assert_eq!(prices.len(), 2);

    let summary = summarise_tickets(&prices, TicketFor::Adult);
    let (single, _) = summary.cheapest_single.unwrap();
    let (ret, _) = summary.cheapest_return.unwrap();
    assert_eq!(single, 550);
    assert_eq!(ret, 900);
    assert!(single <= ret);
}

#[tokio::test]
async fn unknown_crs_gives_an_empty_price_list() {
    let store = Store::open_in_memory().await.unwrap();
    let prices = ticket_prices(&store, "BTN", "PRP").await.unwrap();
    assert!(prices.is_empty());
}

#[tokio::test]
async fn cluster_internal_reversed_flow_is_the_fallback() {
    let store = Store::open_in_memory().await.unwrap();
    let mut records = RecordSet::new();
    for record in [
        // Two public stations with no direct flow between them.
        location("FFF", "1111"),
        location("TTT", "3333"),
        // The destination shares a cluster with a zonal NLC that has no
        // CRS of its own.
        cluster("CL99", "3333"),
        cluster("CL99", "8888"),
        // The only price is on the reversed flow out of the zone.
        flow(777, "8888", "1111", "R"),
        fare(777, "SDS", 425),
        ticket("SDS", "S"),
    ] {
        records.push(record);
    }
    store.insert_records(records).await.unwrap();

    let prices = ticket_prices(&store, "FFF", "TTT").await.unwrap();
    assert_eq!(prices.len(), 1);
    let (pence, ticket) = &prices[0];
    assert_eq!(*pence, 425);
    assert_eq!(ticket.ticket_code, "SDS");
}
