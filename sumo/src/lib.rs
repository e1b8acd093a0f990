//! This crate reads networks and routes of the [SUMO](https://www.eclipse.org/sumo/) traffic
//! simulator and derives what a traffic-signal controller needs to know about them: the incoming
//! approaches of every signalized junction, the signal states of its default program, and the
//! non-conflicting movement phases those states encode.
//!
//! Everything here is a read-only view of the XML files. A missing optional file yields empty
//! results rather than an error, so a network without a route file still loads.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use self::network::{horizon_from_route_path, Network};
pub use self::paths::NetworkPaths;
pub use self::raw::{Connection, Edge, Node, SignalPhase, TrafficLightProgram};
pub use self::routes::{get_routes, routes_from_file, Flow, Route, RouteTable};
pub use self::signals::{assign_states, derive_phases, phase_durations, Phases};
pub use self::xml::{extract, get_generic_element, get_path, Element, Query, Record};

mod network;
mod paths;
mod raw;
mod routes;
mod signals;
pub mod xml;

/// A junction, see https://sumo.dlr.de/docs/Networks/SUMO_Road_Networks.html#junctions_and_right-of-way
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeID(pub String);

/// A directed edge between two junctions.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeID(pub String);

impl fmt::Display for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeID {
    fn from(x: &str) -> NodeID {
        NodeID(x.to_string())
    }
}

impl From<&str> for EdgeID {
    fn from(x: &str) -> EdgeID {
        EdgeID(x.to_string())
    }
}
