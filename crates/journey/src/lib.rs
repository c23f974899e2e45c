pub mod delays;
pub mod incidents;
pub mod routeing;
pub mod tickets;

pub use routeing::{
    find_best_journeys, find_journeys_from_crs, plan_journeys, Journey,
    JourneySegment, Path, TrainPath, TrainRoute, TrainRouteSegment,
};
pub use tickets::{ticket_prices, TicketFor, TicketSummary};
