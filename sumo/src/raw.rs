//! Typed views of the records scraped from a `.net.xml` file. See
//! https://sumo.dlr.de/docs/Networks/SUMO_Road_Networks.html for the meaning of the attributes.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::xml::{get_generic_element, Query, Record};
use crate::{EdgeID, NetworkPaths, NodeID};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeID,
    /// `traffic_light` marks a signalized junction
    pub node_type: String,
    pub x: f64,
    pub y: f64,
}

impl Node {
    pub fn is_traffic_light(&self) -> bool {
        self.node_type == "traffic_light"
    }
}

/// A normal edge. Lane attributes are collapsed: the speed and length are the maximum over all
/// lanes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeID,
    pub from: NodeID,
    pub to: NodeID,
    pub length: f64,
    pub speed: f64,
    pub num_lanes: usize,
    pub edge_type: Option<String>,
    pub priority: Option<isize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub from: EdgeID,
    pub to: EdgeID,
    pub from_lane: usize,
    pub to_lane: usize,
    /// The position of the bit controlling this connection in the state strings of `tl`'s
    /// programs
    pub link_index: Option<usize>,
    /// The traffic light controlling this connection
    pub tl: Option<NodeID>,
    pub dir: Option<String>,
}

/// One entry of a program. The state has one signal per link index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalPhase {
    pub state: String,
    /// Whole seconds; fractions are truncated.
    pub duration: usize,
}

/// A `tlLogic`: one of possibly many programs for the same junction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrafficLightProgram {
    pub id: NodeID,
    /// `static`, `actuated`, `delay_based`...
    pub tls_type: String,
    /// As written in the file. SUMO numbers programs from 0.
    pub program_id: String,
    pub offset: f64,
    pub phases: Vec<SignalPhase>,
}

impl TrafficLightProgram {
    /// Programs are numbered from 1 here, so `programID="0"` is program 1. Named programs have no
    /// number.
    pub fn number(&self) -> Option<usize> {
        self.program_id.parse::<usize>().ok().map(|x| x + 1)
    }

    /// The default program: static, and the first one.
    pub fn is_canonical(&self) -> bool {
        self.tls_type == "static" && self.number() == Some(1)
    }
}

pub fn load_nodes(paths: &NetworkPaths, network_id: &str) -> Result<Vec<Node>> {
    let mut nodes = Vec::new();
    for record in records(paths, network_id, &Query::new("junction"))? {
        nodes.push(Node {
            id: NodeID(required(&record, "id")?.to_string()),
            node_type: record.get("type").unwrap_or("priority").to_string(),
            x: parse_or(&record, "x", 0.0)?,
            y: parse_or(&record, "y", 0.0)?,
        });
    }
    Ok(nodes)
}

/// Internal edges are skipped.
pub fn load_edges(paths: &NetworkPaths, network_id: &str) -> Result<Vec<Edge>> {
    let mut edges = Vec::new();
    let query = Query::new("edge").ignore("function").child_key("lane");
    for record in records(paths, network_id, &query)? {
        let id = required(&record, "id")?;
        let lanes = record.children("lane");
        if lanes.is_empty() {
            bail!("Edge {} has no lanes", id);
        }
        let mut speed: f64 = 0.0;
        let mut length: f64 = 0.0;
        for lane in lanes {
            speed = speed.max(parse_lane(lane, "speed", id)?);
            length = length.max(parse_lane(lane, "length", id)?);
        }
        edges.push(Edge {
            id: EdgeID(id.to_string()),
            from: NodeID(required(&record, "from")?.to_string()),
            to: NodeID(required(&record, "to")?.to_string()),
            length,
            speed,
            num_lanes: lanes.len(),
            edge_type: record.get("type").map(|x| x.to_string()),
            priority: parse_opt(&record, "priority")?,
        });
    }
    Ok(edges)
}

pub fn load_connections(paths: &NetworkPaths, network_id: &str) -> Result<Vec<Connection>> {
    let mut connections = Vec::new();
    for record in records(paths, network_id, &Query::new("connection"))? {
        connections.push(Connection {
            from: EdgeID(required(&record, "from")?.to_string()),
            to: EdgeID(required(&record, "to")?.to_string()),
            from_lane: parse_or(&record, "fromLane", 0)?,
            to_lane: parse_or(&record, "toLane", 0)?,
            link_index: parse_opt(&record, "linkIndex")?,
            tl: record.get("tl").map(NodeID::from),
            dir: record.get("dir").map(|x| x.to_string()),
        });
    }
    Ok(connections)
}

pub fn load_types(paths: &NetworkPaths, network_id: &str) -> Result<Vec<Record>> {
    records(paths, network_id, &Query::new("type"))
}

pub fn load_logic(paths: &NetworkPaths, network_id: &str) -> Result<Vec<TrafficLightProgram>> {
    let mut programs = Vec::new();
    let query = Query::new("tlLogic").child_key("phase");
    for record in records(paths, network_id, &query)? {
        let id = required(&record, "id")?;
        let mut phases = Vec::new();
        for phase in record.children("phase") {
            let state = match phase.get("state") {
                Some(x) => x.to_string(),
                None => bail!("A phase of {} has no state", id),
            };
            let duration = match phase.get("duration").map(|x| x.parse::<f64>()) {
                Some(Ok(x)) if x >= 0.0 => x.trunc() as usize,
                _ => bail!("Phase {} of {} has a bad duration", state, id),
            };
            phases.push(SignalPhase { state, duration });
        }
        programs.push(TrafficLightProgram {
            id: NodeID(id.to_string()),
            tls_type: record.get("type").unwrap_or("static").to_string(),
            program_id: record.get("programID").unwrap_or("0").to_string(),
            offset: parse_or(&record, "offset", 0.0)?,
            phases,
        });
    }
    Ok(programs)
}

fn records(paths: &NetworkPaths, network_id: &str, query: &Query) -> Result<Vec<Record>> {
    // No key is requested, so every element comes back as a record
    Ok(get_generic_element(paths, network_id, query)?
        .into_iter()
        .filter_map(|e| e.into_attributes())
        .collect())
}

fn required<'a>(record: &'a Record, attribute: &str) -> Result<&'a str> {
    match record.get(attribute) {
        Some(x) => Ok(x),
        None => bail!("Missing {} in {:?}", attribute, record.attributes),
    }
}

fn parse_opt<T: std::str::FromStr>(record: &Record, attribute: &str) -> Result<Option<T>> {
    match record.get(attribute) {
        Some(x) => match x.parse::<T>() {
            Ok(value) => Ok(Some(value)),
            Err(_) => bail!("Bad {}={} in {:?}", attribute, x, record.attributes),
        },
        None => Ok(None),
    }
}

fn parse_or<T: std::str::FromStr>(record: &Record, attribute: &str, default: T) -> Result<T> {
    Ok(parse_opt(record, attribute)?.unwrap_or(default))
}

fn parse_lane(lane: &BTreeMap<String, String>, attribute: &str, edge: &str) -> Result<f64> {
    match lane.get(attribute).map(|x| x.parse::<f64>()) {
        Some(Ok(x)) => Ok(x),
        _ => bail!("A lane of edge {} has a missing or bad {}", edge, attribute),
    }
}
