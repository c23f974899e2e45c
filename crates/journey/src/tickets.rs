use database::data_model::TicketType;
use database::{queries, Result, Store};

/// Every priced ticket between two stations. The direct flow lookup comes
/// first; only when it finds nothing do the cluster-internal fallbacks
/// run, including the reversed-direction form.
pub async fn ticket_prices(
    store: &Store,
    from_crs: &str,
    to_crs: &str,
) -> Result<Vec<(i32, TicketType)>> {
    let crs = [from_crs.to_owned(), to_crs.to_owned()];
    let cluster_sets = queries::fares::cluster_sets_for_crs(store.pool(), &crs).await?;
    let (Some(from_set), Some(to_set)) =
        (cluster_sets.get(from_crs), cluster_sets.get(to_crs))
    else {
        log::info!("no fares location for {} or {}", from_crs, to_crs);
        return Ok(Vec::new());
    };

    let direct = queries::fares::direct_tickets(
        store.pool(),
        &from_set.all(),
        &to_set.all(),
    )
    .await?;
    if !direct.is_empty() {
        return Ok(direct);
    }

    let mut internal = queries::fares::internal_tickets(
        store.pool(),
        &from_set.ncl,
        &to_set.all(),
    )
    .await?;
    internal.extend(
        queries::fares::internal_tickets_reversed(
            store.pool(),
            &from_set.ncl,
            &to_set.all(),
        )
        .await?,
    );
    Ok(internal)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketFor {
    Adult,
    Child,
}

/// Whether a ticket belongs in the end-user summary: standard group,
/// undiscounted, and valid for the requested passenger type.
pub fn ticket_matches(ticket: &TicketType, ticket_for: TicketFor) -> bool {
    if ticket.tkt_group != "S" {
        return false;
    }
    if ticket.discount_category != "01" {
        return false;
    }
    match ticket_for {
        TicketFor::Adult => ticket.max_adults > 0,
        TicketFor::Child => ticket.max_children > 0,
    }
}

#[derive(Debug, Clone, Default)]
pub struct TicketSummary {
    pub cheapest_single: Option<(i32, TicketType)>,
    pub cheapest_return: Option<(i32, TicketType)>,
}

/// Picks the cheapest single and return out of a price list for the
/// requested passenger type.
pub fn summarise_tickets(
    prices: &[(i32, TicketType)],
    ticket_for: TicketFor,
) -> TicketSummary {
    let mut sorted: Vec<&(i32, TicketType)> = prices.iter().collect();
    sorted.sort_by_key(|(fare, _)| *fare);

    let pick = |tkt_type: &str| {
        sorted
            .iter()
            .find(|(_, ticket)| {
                ticket.tkt_type == tkt_type && ticket_matches(ticket, ticket_for)
            })
            .map(|found| (*found).clone())
    };

    TicketSummary {
        cheapest_single: pick("S"),
        cheapest_return: pick("R"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(
        code: &str,
        tkt_type: &str,
        tkt_group: &str,
        discount: &str,
        max_adults: i32,
        max_children: i32,
    ) -> TicketType {
        TicketType {
            ticket_code: code.to_owned(),
            description: String::new(),
            tkt_class: 2,
            tkt_type: tkt_type.to_owned(),
            tkt_group: tkt_group.to_owned(),
            max_passengers: 1,
            min_passengers: 1,
            max_adults,
            min_adults: 0,
            max_children,
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
            discount_category: discount.to_owned(),
        }
    }

    #[test]
    fn selection_filters_group_discount_and_passenger_type() {
        let adult_single = ticket("SDS", "S", "S", "01", 1, 0);
        let child_single = ticket("CDS", "S", "S", "01", 0, 1);
        let promo_single = ticket("PDS", "S", "P", "01", 1, 1);
        let railcard_single = ticket("RDS", "S", "S", "15", 1, 1);

        assert!(ticket_matches(&adult_single, TicketFor::Adult));
        assert!(!ticket_matches(&adult_single, TicketFor::Child));
        assert!(ticket_matches(&child_single, TicketFor::Child));
        assert!(!ticket_matches(&promo_single, TicketFor::Adult));
        assert!(!ticket_matches(&railcard_single, TicketFor::Adult));
    }

    #[test]
    fn summary_takes_the_cheapest_of_each_kind() {
        let prices = vec![
            (900, ticket("SDR", "R", "S", "01", 1, 0)),
            (550, ticket("SDS", "S", "S", "01", 1, 0)),
            (700, ticket("SOS", "S", "S", "01", 1, 0)),
            // Cheaper but wrong group: never summarised.
            (100, ticket("PDS", "S", "P", "01", 1, 0)),
        ];

        let summary = summarise_tickets(&prices, TicketFor::Adult);
        let (single_fare, single) = summary.cheapest_single.unwrap();
        assert_eq!(single_fare, 550);
        assert_eq!(single.ticket_code, "SDS");
        let (return_fare, _) = summary.cheapest_return.unwrap();
        assert_eq!(return_fare, 900);
        assert!(single_fare <= return_fare);
    }
}
