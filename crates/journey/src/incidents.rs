use std::collections::{HashMap, HashSet};

use database::data_model::Incident;
use database::{queries, Result, Store};

use crate::routeing::{Journey, TrainRoute};

/// Splits a "routes affected" sentence into (from, to) TIPLOC lists. The
/// pivot is the first " and "; anything from " also " on is a separate
/// clause and ignored. Returns `None` when the text has no pivot, which
/// callers treat as "no restriction".
pub fn parse_incident_routes(
    name_location_map: &HashMap<String, String>,
    route_text: &str,
) -> Option<(Vec<String>, Vec<String>)> {
    let and_index = route_text.find(" and ")?;
    let truncated = match route_text.find(" also ") {
        Some(also_index) => &route_text[..also_index],
        None => route_text,
    };

    let mut from_locations = Vec::new();
    let mut to_locations = Vec::new();
    for (name, tiploc) in name_location_map {
        let Some(index) = truncated.find(name.as_str()) else {
            continue;
        };
        if index < and_index {
            from_locations.push(tiploc.clone());
        } else if index > and_index {
            to_locations.push(tiploc.clone());
        }
    }
    Some((from_locations, to_locations))
}

/// Incidents that plausibly affect the given journeys: reported against a
/// leg's operator, with an affected span touching that leg's path on both
/// sides. De-duplicated by incident number.
pub async fn find_incidents(
    store: &Store,
    routes_and_journeys: &[(TrainRoute, Journey)],
) -> Result<Vec<Incident>> {
    let name_location_map =
        queries::incidents::station_names_to_tiplocs(store.pool()).await?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut found = Vec::new();
    for (route, journey) in routes_and_journeys {
        for (route_segment, journey_segment) in route.iter().zip(journey.iter()) {
            let incidents = queries::incidents::incidents_for_toc(
                store.pool(),
                &journey_segment.train.toc,
            )
            .await?;

            for incident in incidents {
                let Some((from_locations, to_locations)) = parse_incident_routes(
                    &name_location_map,
                    &incident.route_affected,
                ) else {
                    continue;
                };
                let path = &route_segment.path;
                if !from_locations.iter().any(|location| path.contains(location)) {
                    continue;
                }
                if !to_locations.iter().any(|location| path.contains(location)) {
                    continue;
                }
                if seen.insert(incident.incident_number.clone()) {
                    found.push(incident);
                }
            }
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station_map() -> HashMap<String, String> {
        [
            ("Brighton", "BRGHTN"),
            ("Preston Park", "PRSTNPK"),
            ("London Bridge", "LNDNBDG"),
        ]
        .into_iter()
        .map(|(name, tiploc)| (name.to_owned(), tiploc.to_owned()))
        .collect()
    }

    #[test]
    fn splits_on_the_first_and_truncates_at_also() {
        let (from, to) = parse_incident_routes(
            &station_map(),
            "Brighton and Preston Park also London Bridge",
        )
        .unwrap();
        assert_eq!(from, vec!["BRGHTN".to_owned()]);
        assert_eq!(to, vec!["PRSTNPK".to_owned()]);
    }

    #[test]
    fn text_without_a_pivot_is_no_restriction() {
        assert!(parse_incident_routes(&station_map(), "Brighton only").is_none());
    }

    #[test]
    fn unknown_station_names_are_ignored() {
        let (from, to) = parse_incident_routes(
            &station_map(),
            "Hove and Preston Park",
        )
        .unwrap();
        assert!(from.is_empty());
        assert_eq!(to, vec!["PRSTNPK".to_owned()]);
    }
}
