use chrono::Local;
use database::queries;
use journey::tickets::{summarise_tickets, ticket_prices, TicketFor};
use journey::{incidents, plan_journeys};

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = feeds::IngestConfig::from_env()
        .expect("expected ingest configuration in env.");
    let store = feeds::open_database(&config)
        .await
        .expect("could not open the knowledge store.");

    let now = Local::now();
    let journeys = plan_journeys(&store, "BTN", "PRP", now.date_naive(), now.time())
        .await
        .unwrap();
    let Some((_, journey)) = journeys.first() else {
        println!("no route from BTN to PRP found");
        return;
    };

    let station_names = queries::incidents::tiplocs_to_station_names(store.pool())
        .await
        .unwrap();
    fn display<'a>(station_names: &'a std::collections::HashMap<String, String>, tiploc: &'a String) -> &'a str {
        station_names.get(tiploc).unwrap_or(tiploc).as_str()
    }
    for segment in journey {
        println!(
            "{} {:04} -> {} {:04} ({})",
            display(&station_names, &segment.start.location),
            segment.start.scheduled_departure_time.unwrap_or(0),
            display(&station_names, &segment.end.location),
            segment.end.scheduled_arrival_time.unwrap_or(0),
            segment.train.toc,
        );
    }

    let prices = ticket_prices(&store, "BTN", "PRP").await.unwrap();
    let summary = summarise_tickets(&prices, TicketFor::Adult);
    if let Some((pence, ticket)) = summary.cheapest_single {
        println!("single: £{}.{:02} ({})", pence / 100, pence % 100, ticket.description);
    }
    if let Some((pence, ticket)) = summary.cheapest_return {
        println!("return: £{}.{:02} ({})", pence / 100, pence % 100, ticket.description);
    }

    let affected = incidents::find_incidents(&store, &journeys).await.unwrap();
    for incident in affected {
        println!("incident: {}", incident.summary);
    }
}
