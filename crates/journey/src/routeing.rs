use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{NaiveDate, NaiveTime};
use database::data_model::{TimetableLocation, TrainTimetable};
use database::{queries, Result, Store};

/// An ordered list of TIPLOCs from origin to destination.
pub type LocationRoute = Vec<String>;
/// The tuple of route locations a group of services all stop at, in order.
pub type TrainPath = Vec<String>;

/// One leg of an abstract route: which train path to ride and between
/// which of its stops. Not yet bound to a service instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrainRouteSegment {
    pub path: TrainPath,
    pub start_location: String,
    pub stop_location: String,
}

pub type TrainRoute = Vec<TrainRouteSegment>;

/// One concrete train ride between two stops of a scheduled service.
#[derive(Debug, Clone)]
pub struct JourneySegment {
    pub train: TrainTimetable,
    pub start: TimetableLocation,
    pub end: TimetableLocation,
}

pub type Journey = Vec<JourneySegment>;
pub type RouteAndJourneys = (TrainRoute, Vec<Journey>);

/// A walk through the station graph. When two walks meet at a node in the
/// same search layer their histories merge as sibling sub-paths, so the
/// forest compresses alternatives instead of fanning out exponentially.
#[derive(Debug, Clone, Default)]
pub struct Path {
    stations: Vec<String>,
    sub_paths: Vec<Path>,
    locations: HashSet<String>,
    sub_path_locations: Vec<HashSet<String>>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    fn extend(&self, location: &str) -> Path {
        let mut next = self.clone();
        next.stations.push(location.to_owned());
        next.locations.insert(location.to_owned());
        next
    }

    fn merge(self, other: Path) -> Path {
        let mut merged = Path::new();
        for mut side in [self, other] {
            merged
                .sub_path_locations
                .push(std::mem::take(&mut side.locations));
            merged
                .sub_path_locations
                .append(&mut side.sub_path_locations);
            // A side with an empty trunk is itself just a fork point;
            // its alternatives flatten into this one.
            if side.stations.is_empty() {
                merged.sub_paths.append(&mut side.sub_paths);
            } else {
                merged.sub_paths.push(side);
            }
        }
        merged
    }

    fn has_been_to(&self, location: &str) -> bool {
        self.locations.contains(location)
            || self
                .sub_path_locations
                .iter()
                .any(|visited| visited.contains(location))
    }

    /// How many distinct routes [`Path::routes`] would enumerate.
    pub fn route_count(&self) -> usize {
        if self.sub_paths.is_empty() {
            1
        } else {
            self.sub_paths.iter().map(Path::route_count).sum()
        }
    }

    pub fn all_locations(&self) -> HashSet<String> {
        let mut all = self.locations.clone();
        for visited in &self.sub_path_locations {
            all.extend(visited.iter().cloned());
        }
        all
    }

    /// Flattens the forest into ordered origin-to-destination routes.
    pub fn routes(&self) -> Vec<LocationRoute> {
        if self.sub_paths.is_empty() {
            return vec![self.stations.clone()];
        }
        let mut routes = Vec::new();
        for sub_path in &self.sub_paths {
            for mut route in sub_path.routes() {
                route.extend(self.stations.iter().cloned());
                routes.push(route);
            }
        }
        routes
    }
}

/// Layered BFS over the precomputed adjacency. Each depth is one IN-list
/// query for the frontier's outgoing edges. Stops once `n` enumerable
/// routes have been found or the depth limit is hit.
pub async fn search_paths(
    store: &Store,
    n: usize,
    from_loc: &str,
    to_loc: &str,
) -> Result<Vec<Path>> {
    let mut found_paths = Vec::new();
    let mut found_route_count = 0;
    let mut paths: HashMap<String, Path> =
        HashMap::from([(from_loc.to_owned(), Path::new())]);
    let mut depth = 0;

    while found_route_count < n {
        let frontier: Vec<String> = paths.keys().cloned().collect();
        if frontier.is_empty() {
            break;
        }

        let mut next_paths: HashMap<String, Path> = HashMap::new();
        for link in queries::timetable::links_from(store.pool(), &frontier).await? {
            let Some(path) = paths.get(&link.from_location) else {
                continue;
            };
            if path.has_been_to(&link.to_location) {
                continue;
            }

            let mut new_path = path.extend(&link.from_location);
            if let Some(existing) = next_paths.remove(&link.to_location) {
                new_path = new_path.merge(existing);
            }
            next_paths.insert(link.to_location, new_path);
        }
        paths = next_paths;

        if let Some(path) = paths.remove(to_loc) {
            let path = path.extend(to_loc);
            found_route_count += path.route_count();
            found_paths.push(path);
        }

        depth += 1;
        if depth >= 400 {
            break;
        }
    }

    Ok(found_paths)
}

/// Groups the day's stops per service and keeps, for each service, the
/// stop sequence that increases both in `train_route_index` and in route
/// position. Services with fewer than two usable stops are dropped.
fn stops_by_train(
    stops: Vec<TimetableLocation>,
    route: &[String],
) -> Vec<Vec<TimetableLocation>> {
    let index_lookup: HashMap<&str, usize> = route
        .iter()
        .enumerate()
        .map(|(index, location)| (location.as_str(), index))
        .collect();

    let mut by_uid: BTreeMap<String, Vec<TimetableLocation>> = BTreeMap::new();
    for stop in stops {
        by_uid.entry(stop.train_uid.clone()).or_default().push(stop);
    }

    let mut trains = Vec::new();
    for (_uid, mut train_stops) in by_uid {
        train_stops.sort_by_key(|stop| stop.train_route_index);
        let mut kept: Vec<TimetableLocation> = Vec::new();
        for stop in train_stops {
            let Some(&position) = index_lookup.get(stop.location.as_str()) else {
                continue;
            };
            let fits = match kept.last() {
                Some(last) => position > index_lookup[last.location.as_str()],
                None => true,
            };
            if fits {
                kept.push(stop);
            }
        }
        if kept.len() > 1 {
            trains.push(kept);
        }
    }
    trains
}

/// Buckets services by the tuple of route locations they stop at.
fn trains_by_path(
    trains: Vec<Vec<TimetableLocation>>,
) -> BTreeMap<TrainPath, Vec<Vec<TimetableLocation>>> {
    let mut by_path: BTreeMap<TrainPath, Vec<Vec<TimetableLocation>>> =
        BTreeMap::new();
    for stops in trains {
        let path: TrainPath = stops.iter().map(|stop| stop.location.clone()).collect();
        by_path.entry(path).or_default().push(stops);
    }
    by_path
}

/// Depth-limited DFS for a sequence of train paths walking the route from
/// `start` to its final location with at most three changes.
fn search_train_route(
    start: &str,
    train_paths: &[TrainPath],
    route: &[String],
    position: &HashMap<&str, usize>,
    current: &TrainRoute,
) -> Option<TrainRoute> {
    if current.len() > 3 {
        return None;
    }
    let destination = route.last()?;

    for path in train_paths {
        if !path.iter().any(|location| location == start) {
            continue;
        }

        if path.iter().any(|location| location == destination) {
            let mut found = current.clone();
            found.push(TrainRouteSegment {
                path: path.clone(),
                start_location: start.to_owned(),
                stop_location: destination.clone(),
            });
            return Some(found);
        }

        for stop in path {
            let (Some(&stop_position), Some(&start_position)) =
                (position.get(stop.as_str()), position.get(start))
            else {
                continue;
            };
            if stop_position <= start_position {
                continue;
            }

            let mut next = current.clone();
            next.push(TrainRouteSegment {
                path: path.clone(),
                start_location: start.to_owned(),
                stop_location: stop.clone(),
            });
            if let Some(found) =
                search_train_route(stop, train_paths, route, position, &next)
            {
                return Some(found);
            }
        }
    }
    None
}

/// Instantiates concrete journeys for one abstract train route. The first
/// leg tries every service on its path; every later leg takes the
/// earliest service departing the connection after the previous arrival.
async fn find_journeys(
    store: &Store,
    trains: &BTreeMap<TrainPath, Vec<Vec<TimetableLocation>>>,
    train_route: &TrainRoute,
) -> Result<Vec<Journey>> {
    let Some(first_segment) = train_route.first() else {
        return Ok(Vec::new());
    };
    let Some(start_trains) = trains.get(&first_segment.path) else {
        return Ok(Vec::new());
    };

    let mut journeys = Vec::new();
    for start_train in start_trains {
        let Some(first_start) = start_train
            .iter()
            .find(|stop| stop.location == first_segment.start_location)
        else {
            continue;
        };
        let Some(first_stop) = start_train
            .iter()
            .find(|stop| stop.location == first_segment.stop_location)
        else {
            continue;
        };
        let Some(train) =
            queries::timetable::train_timetable(store.pool(), &first_start.train_uid)
                .await?
        else {
            continue;
        };

        let mut journey: Journey = vec![JourneySegment {
            train,
            start: first_start.clone(),
            end: first_stop.clone(),
        }];
        let mut complete = true;

        for segment in &train_route[1..] {
            let Some(connection) =
                connecting_segment(store, trains, segment, &journey).await?
            else {
                complete = false;
                break;
            };
            journey.push(connection);
        }

        if complete {
            journeys.push(journey);
        }
    }
    Ok(journeys)
}

/// The earliest service on the segment's path that leaves the previous
/// leg's arrival stop after that leg arrives.
async fn connecting_segment(
    store: &Store,
    trains: &BTreeMap<TrainPath, Vec<Vec<TimetableLocation>>>,
    segment: &TrainRouteSegment,
    journey: &Journey,
) -> Result<Option<JourneySegment>> {
    let Some(last) = journey.last() else {
        return Ok(None);
    };
    let Some(previous_arrival) = last.end.scheduled_arrival_time else {
        return Ok(None);
    };
    let previous_location = last.end.location.as_str();

    let mut best: Option<(&TimetableLocation, &Vec<TimetableLocation>)> = None;
    for train_stops in trains.get(&segment.path).into_iter().flatten() {
        for stop in train_stops {
            if stop.location != previous_location {
                continue;
            }
            let Some(departure) = stop.scheduled_departure_time else {
                continue;
            };
            if departure <= previous_arrival {
                continue;
            }
            let earlier = match best {
                Some((best_stop, _)) => {
                    Some(departure) < best_stop.scheduled_departure_time
                }
                None => true,
            };
            if earlier {
                best = Some((stop, train_stops));
            }
        }
    }

    let Some((start, train_stops)) = best else {
        return Ok(None);
    };
    let Some(end) = train_stops
        .iter()
        .find(|stop| stop.location == segment.stop_location)
    else {
        return Ok(None);
    };
    let Some(train) =
        queries::timetable::train_timetable(store.pool(), &start.train_uid).await?
    else {
        return Ok(None);
    };
    Ok(Some(JourneySegment {
        train,
        start: start.clone(),
        end: end.clone(),
    }))
}

async fn find_journeys_for_route(
    store: &Store,
    route: &[String],
    all_stops: &[TimetableLocation],
) -> Result<Option<RouteAndJourneys>> {
    let in_route: Vec<TimetableLocation> = all_stops
        .iter()
        .filter(|stop| route.contains(&stop.location))
        .cloned()
        .collect();
    let trains = trains_by_path(stops_by_train(in_route, route));
    let train_paths: Vec<TrainPath> = trains.keys().cloned().collect();

    let Some(start) = route.first() else {
        return Ok(None);
    };
    let position: HashMap<&str, usize> = route
        .iter()
        .enumerate()
        .map(|(index, location)| (location.as_str(), index))
        .collect();
    let Some(train_route) =
        search_train_route(start, &train_paths, route, &position, &Vec::new())
    else {
        return Ok(None);
    };

    let journeys = find_journeys(store, &trains, &train_route).await?;
    Ok(Some((train_route, journeys)))
}

/// Builds journeys for every route enumerable from the given paths, using
/// one stop query across all their locations.
pub async fn find_journeys_for_paths(
    store: &Store,
    date: NaiveDate,
    paths: &[Path],
) -> Result<Vec<RouteAndJourneys>> {
    let mut all_locations: HashSet<String> = HashSet::new();
    for path in paths {
        all_locations.extend(path.all_locations());
    }
    let locations: Vec<String> = all_locations.into_iter().collect();
    let all_stops =
        queries::timetable::stops_at_locations(store.pool(), &locations, date).await?;

    let mut results = Vec::new();
    for path in paths {
        for route in path.routes() {
            if let Some(found) =
                find_journeys_for_route(store, &route, &all_stops).await?
            {
                results.push(found);
            }
        }
    }
    Ok(results)
}

/// Candidate journeys between two stations on a date. Unresolvable CRS
/// codes give an empty result, not an error.
pub async fn find_journeys_from_crs(
    store: &Store,
    from_crs: &str,
    to_crs: &str,
    date: NaiveDate,
) -> Result<Vec<RouteAndJourneys>> {
    let crs = [from_crs.to_owned(), to_crs.to_owned()];
    let tiploc_map = queries::timetable::crs_to_tiploc(store.pool(), &crs).await?;
    let (Some(from_loc), Some(to_loc)) =
        (tiploc_map.get(from_crs), tiploc_map.get(to_crs))
    else {
        log::info!("no known station for {} or {}", from_crs, to_crs);
        return Ok(Vec::new());
    };

    let paths = search_paths(store, 4, from_loc, to_loc).await?;
    find_journeys_for_paths(store, date, &paths).await
}

/// Pareto filter: one journey per distinct arrival time, the one leaving
/// latest, regrouped by route.
pub fn filter_best_journeys(
    routes_and_journeys: Vec<RouteAndJourneys>,
) -> Vec<RouteAndJourneys> {
    let mut by_arrival: BTreeMap<i32, Vec<(TrainRoute, Journey)>> = BTreeMap::new();
    for (route, journeys) in routes_and_journeys {
        for journey in journeys {
            let Some(arrival) = journey
                .last()
                .and_then(|segment| segment.end.scheduled_arrival_time)
            else {
                continue;
            };
            by_arrival.entry(arrival).or_default().push((route.clone(), journey));
        }
    }

    let mut grouped: Vec<RouteAndJourneys> = Vec::new();
    for (_arrival, candidates) in by_arrival {
        let Some((route, journey)) = candidates.into_iter().max_by_key(|(_, journey)| {
            journey
                .first()
                .and_then(|segment| segment.start.scheduled_departure_time)
        }) else {
            continue;
        };
        match grouped.iter().position(|(existing, _)| *existing == route) {
            Some(index) => grouped[index].1.push(journey),
            None => grouped.push((route, vec![journey])),
        }
    }
    grouped
}

/// Sort key used for display: arrival, unless the journey wraps past
/// midnight, in which case the departure keeps it in day order.
fn order_key(journey: &Journey) -> NaiveTime {
    let departure = journey
        .first()
        .and_then(|segment| segment.start.public_departure);
    let arrival = journey.last().and_then(|segment| segment.end.public_arrival);
    match (departure, arrival) {
        (Some(departure), Some(arrival)) if arrival < departure => departure,
        (_, Some(arrival)) => arrival,
        (Some(departure), None) => departure,
        (None, None) => NaiveTime::MIN,
    }
}

/// The filtered journeys leaving at or after the requested time, best
/// first.
pub async fn find_best_journeys(
    store: &Store,
    from_crs: &str,
    to_crs: &str,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<Vec<(TrainRoute, Journey)>> {
    let journeys = find_journeys_from_crs(store, from_crs, to_crs, date).await?;
    let best = filter_best_journeys(journeys);

    let mut route_journeys: Vec<(TrainRoute, Journey)> = best
        .into_iter()
        .flat_map(|(route, journeys)| {
            journeys
                .into_iter()
                .map(move |journey| (route.clone(), journey))
        })
        .filter(|(_, journey)| {
            journey
                .first()
                .and_then(|segment| segment.start.public_departure)
                .map_or(false, |departure| departure >= time)
        })
        .collect();
    route_journeys.sort_by_key(|(_, journey)| order_key(journey));
    Ok(route_journeys)
}

/// [`find_best_journeys`], retrying from the start of the next day before
/// giving up. An empty result means no route.
pub async fn plan_journeys(
    store: &Store,
    from_crs: &str,
    to_crs: &str,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<Vec<(TrainRoute, Journey)>> {
    let journeys = find_best_journeys(store, from_crs, to_crs, date, time).await?;
    if !journeys.is_empty() {
        return Ok(journeys);
    }
    let Some(next_day) = date.succ_opt() else {
        return Ok(Vec::new());
    };
    find_best_journeys(store, from_crs, to_crs, next_day, NaiveTime::MIN).await
}
