use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use abstutil::skip_fail;
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::xml::{extract, get_path, Query};
use crate::{EdgeID, NetworkPaths};

/// The edges a vehicle traverses, starting with the edge it departs from.
pub type Route = Vec<EdgeID>;

/// For every starting edge, the distinct routes departing from it, each with its probability of
/// being chosen. The probabilities of one starting edge sum to 1.
pub type RouteTable = BTreeMap<EdgeID, Vec<(Route, f64)>>;

/// Reads the routes of every vehicle in `{network_id}.rou.xml`. Vehicles sharing a route count
/// once, and all routes from the same starting edge are equally likely. A network without a route
/// file has no routes.
pub fn get_routes(paths: &NetworkPaths, network_id: &str) -> Result<RouteTable> {
    routes_from_file(get_path(paths, network_id, "rou"))
}

/// Like `get_routes`, for a specific route file.
pub fn routes_from_file<P: AsRef<Path>>(path: P) -> Result<RouteTable> {
    let query = Query::new("vehicle/route").key("edges");
    let mut unique: BTreeSet<Route> = BTreeSet::new();
    for element in extract(path, &query)? {
        // A route without edges comes back as its attributes; there's nothing to drive there.
        let edges = skip_fail!(element.into_key());
        let route: Route = edges.split_whitespace().map(EdgeID::from).collect();
        if !route.is_empty() {
            unique.insert(route);
        }
    }

    let mut grouped: BTreeMap<EdgeID, Vec<Route>> = BTreeMap::new();
    for route in unique {
        grouped.entry(route[0].clone()).or_default().push(route);
    }

    Ok(grouped
        .into_iter()
        .map(|(start, routes)| {
            let probability = 1.0 / (routes.len() as f64);
            (
                start,
                routes.into_iter().map(|r| (r, probability)).collect(),
            )
        })
        .collect())
}

/// A stream of vehicles entering the network at one edge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub name: String,
    pub edge: EdgeID,
    pub vehicle_type: String,
    /// Chance of emitting a vehicle every second
    pub probability: f64,
    pub depart_lane: String,
    pub depart_speed: String,
    /// Seconds
    pub begin: f64,
    pub end: f64,
}

impl Flow {
    /// The demand used when nothing else is specified: random arrivals of the `human` vehicle
    /// type at every starting edge, stopping before the horizon so the network can drain.
    pub fn default_for(edge: EdgeID, horizon: usize) -> Flow {
        Flow {
            name: format!("flow_{}", edge),
            edge,
            vehicle_type: "human".to_string(),
            probability: 0.2,
            depart_lane: "best".to_string(),
            depart_speed: "random".to_string(),
            begin: 1.0,
            end: 0.9 * (horizon as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_paths() -> NetworkPaths {
        NetworkPaths::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("test_data/networks"))
    }

    #[test]
    fn probabilities_sum_to_one() {
        let routes = get_routes(&test_paths(), "intersection").unwrap();
        assert_eq!(routes.len(), 4);
        for (start, choices) in &routes {
            let total: f64 = choices.iter().map(|(_, p)| p).sum();
            assert!((total - 1.0).abs() < 1e-9, "{} sums to {}", start, total);
            assert!(choices.iter().all(|(r, _)| &r[0] == start));
        }
    }

    #[test]
    fn duplicates_count_once() {
        let routes = get_routes(&test_paths(), "intersection").unwrap();
        // Two vehicles share "-238059324 -309265401"
        let west = &routes[&EdgeID::from("-238059324")];
        assert_eq!(west.len(), 2);
        assert_eq!(west[0].1, 0.5);

        let south = &routes[&EdgeID::from("383432312")];
        assert_eq!(south.len(), 3);
        assert!((south[0].1 - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(
            south[0].0,
            vec![EdgeID::from("383432312"), EdgeID::from("-309265401")]
        );
    }

    #[test]
    fn no_route_file() {
        assert!(get_routes(&test_paths(), "no_lights").unwrap().is_empty());
    }

    #[test]
    fn default_flow() {
        let flow = Flow::default_for(EdgeID::from("309265401"), 360);
        assert_eq!(flow.name, "flow_309265401");
        assert_eq!(flow.end, 324.0);
        assert_eq!(flow.probability, 0.2);
    }
}
