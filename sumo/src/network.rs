use std::collections::BTreeMap;
use std::path::Path;

use abstutil::Timer;
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;

use crate::raw::{self, Connection, Edge, Node, TrafficLightProgram};
use crate::routes::{get_routes, routes_from_file, Flow, RouteTable};
use crate::signals::{self, Phases};
use crate::xml::Record;
use crate::{EdgeID, NetworkPaths, NodeID};

static NO_PHASES: Phases = BTreeMap::new();

/// A SUMO network, along with its routes and traffic light programs. Everything is read once when
/// the network is loaded; the views derived for traffic signal control are computed on first use
/// and cached afterwards.
///
/// Queries about a junction without a traffic light just return nothing.
pub struct Network {
    network_id: String,
    horizon: Option<usize>,

    nodes: Vec<Node>,
    edges: Vec<Edge>,
    connections: Vec<Connection>,
    types: Vec<Record>,
    routes: RouteTable,
    programs: Vec<TrafficLightProgram>,

    tls_ids: OnceCell<Vec<NodeID>>,
    approaches: OnceCell<BTreeMap<NodeID, Vec<EdgeID>>>,
    states: OnceCell<BTreeMap<NodeID, Vec<String>>>,
    durations: OnceCell<BTreeMap<NodeID, Vec<usize>>>,
    phases: OnceCell<BTreeMap<NodeID, Phases>>,
}

impl Network {
    /// Reads `{network_id}.net.xml` and `{network_id}.rou.xml`.
    pub fn new(paths: &NetworkPaths, network_id: &str) -> Result<Network> {
        let mut timer = Timer::new(format!("load network {}", network_id));
        let routes = get_routes(paths, network_id)?;
        Network::load_with_routes(paths, network_id, routes, None, &mut timer)
    }

    /// Reads `{network_id}.net.xml`, with routes from a specific file. Route files generated for
    /// experiments are named `{network_id}.{...}.{horizon}.{label}.rou.xml`, so the horizon is
    /// recovered from the name.
    pub fn load<P: AsRef<Path>>(
        paths: &NetworkPaths,
        network_id: &str,
        route_path: P,
    ) -> Result<Network> {
        let route_path = route_path.as_ref();
        let horizon = horizon_from_route_path(route_path)?;
        let mut timer = Timer::new(format!("load network {}", network_id));
        let routes = routes_from_file(route_path)?;
        Network::load_with_routes(paths, network_id, routes, Some(horizon), &mut timer)
    }

    fn load_with_routes(
        paths: &NetworkPaths,
        network_id: &str,
        routes: RouteTable,
        horizon: Option<usize>,
        timer: &mut Timer,
    ) -> Result<Network> {
        timer.start("read network");
        let nodes = raw::load_nodes(paths, network_id)?;
        let edges = raw::load_edges(paths, network_id)?;
        let connections = raw::load_connections(paths, network_id)?;
        let types = raw::load_types(paths, network_id)?;
        let programs = raw::load_logic(paths, network_id)?;
        timer.stop("read network");

        if nodes.is_empty() {
            timer.warn(format!(
                "{} has no junctions; is {} the right place?",
                network_id,
                paths.network_dir(network_id).display()
            ));
        }

        let network = Network::from_parts(network_id, nodes, edges, connections, programs, routes)
            .with_types(types)
            .with_horizon(horizon);
        for problem in network.check_link_indices() {
            timer.warn(problem);
        }
        timer.note(format!(
            "{} has {} junctions, {} edges, {} traffic lights, and routes from {} edges",
            network_id,
            network.nodes.len(),
            network.edges.len(),
            network.tls_ids().len(),
            network.routes.len()
        ));
        Ok(network)
    }

    /// Assembles a network from records that were already read.
    pub fn from_parts(
        network_id: &str,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        connections: Vec<Connection>,
        programs: Vec<TrafficLightProgram>,
        routes: RouteTable,
    ) -> Network {
        Network {
            network_id: network_id.to_string(),
            horizon: None,
            nodes,
            edges,
            connections,
            types: Vec::new(),
            routes,
            programs,
            tls_ids: OnceCell::new(),
            approaches: OnceCell::new(),
            states: OnceCell::new(),
            durations: OnceCell::new(),
            phases: OnceCell::new(),
        }
    }

    pub fn with_types(mut self, types: Vec<Record>) -> Network {
        self.types = types;
        self
    }

    pub fn with_horizon(mut self, horizon: Option<usize>) -> Network {
        self.horizon = horizon;
        self
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    /// Only known when loaded from an experiment's route file.
    pub fn horizon(&self) -> Option<usize> {
        self.horizon
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn types(&self) -> &[Record] {
        &self.types
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn programs(&self) -> &[TrafficLightProgram] {
        &self.programs
    }

    /// The edges where vehicles start their routes, sorted.
    pub fn edges_distribution(&self) -> Vec<EdgeID> {
        self.routes.keys().cloned().collect()
    }

    /// One flow of the default demand for every starting edge.
    pub fn inflows(&self, horizon: usize) -> Vec<Flow> {
        self.routes
            .keys()
            .map(|edge| Flow::default_for(edge.clone(), horizon))
            .collect()
    }

    /// Junctions controlled by a traffic light, in the order they appear in the network.
    pub fn tls_ids(&self) -> &[NodeID] {
        self.tls_ids.get_or_init(|| {
            self.nodes
                .iter()
                .filter(|n| n.is_traffic_light())
                .map(|n| n.id.clone())
                .collect()
        })
    }

    /// The incoming approaches of a traffic light: edges on which vehicles enter the junction.
    pub fn approaches(&self, node: &NodeID) -> &[EdgeID] {
        lookup(self.approaches_map(), node)
    }

    pub fn approaches_map(&self) -> &BTreeMap<NodeID, Vec<EdgeID>> {
        self.approaches.get_or_init(|| {
            self.tls_ids()
                .iter()
                .map(|id| {
                    let incoming = self
                        .edges
                        .iter()
                        .filter(|e| &e.to == id)
                        .map(|e| e.id.clone())
                        .collect();
                    (id.clone(), incoming)
                })
                .collect()
        })
    }

    /// The signal states of the traffic light's default program, in order. Empty if there's no
    /// static program 1.
    pub fn states(&self, node: &NodeID) -> &[String] {
        lookup(self.states_map(), node)
    }

    pub fn states_map(&self) -> &BTreeMap<NodeID, Vec<String>> {
        self.states.get_or_init(|| {
            self.tls_ids()
                .iter()
                .map(|id| {
                    let states = self
                        .default_program(id)
                        .map(|p| p.phases.iter().map(|ph| ph.state.clone()).collect())
                        .unwrap_or_default();
                    (id.clone(), states)
                })
                .collect()
        })
    }

    /// Seconds spent in each state of the default program, in the same order as `states`. These
    /// don't line up with `phases`; see `phase_durations` for that.
    pub fn durations(&self, node: &NodeID) -> &[usize] {
        lookup(self.durations_map(), node)
    }

    pub fn durations_map(&self) -> &BTreeMap<NodeID, Vec<usize>> {
        self.durations.get_or_init(|| {
            self.tls_ids()
                .iter()
                .map(|id| {
                    let durations = self
                        .default_program(id)
                        .map(|p| p.phases.iter().map(|ph| ph.duration).collect())
                        .unwrap_or_default();
                    (id.clone(), durations)
                })
                .collect()
        })
    }

    /// Non-conflicting movement patterns of a traffic light, keyed by phase index.
    ///
    /// ```ignore
    /// network.phases(&NodeID::from("247123161"))
    /// // {0: ["-238059324", "383432312"], 1: ["-238059328", "309265401"]}
    /// ```
    pub fn phases(&self, node: &NodeID) -> &Phases {
        self.phases_map().get(node).unwrap_or(&NO_PHASES)
    }

    pub fn phases_map(&self) -> &BTreeMap<NodeID, Phases> {
        self.phases.get_or_init(|| {
            self.tls_ids()
                .iter()
                .map(|id| {
                    let phases = signals::derive_phases(self.states(id), &self.links(id));
                    (id.clone(), phases)
                })
                .collect()
        })
    }

    /// Seconds per cycle spent in each phase, including the clearance states following it.
    pub fn phase_durations(&self, node: &NodeID) -> BTreeMap<usize, usize> {
        signals::phase_durations(self.states(node), self.durations(node), &self.links(node))
    }

    /// Signal position to the approach it controls, for connections through this traffic light.
    fn links(&self, node: &NodeID) -> BTreeMap<usize, EdgeID> {
        self.connections
            .iter()
            .filter(|c| c.tl.as_ref() == Some(node))
            .filter_map(|c| c.link_index.map(|idx| (idx, c.from.clone())))
            .collect()
    }

    fn default_program(&self, node: &NodeID) -> Option<&TrafficLightProgram> {
        self.programs
            .iter()
            .find(|p| &p.id == node && p.is_canonical())
    }

    /// Describes every connection whose signal doesn't exist in the default program.
    fn check_link_indices(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for id in self.tls_ids() {
            for (idx, edge) in self.links(id) {
                if let Some(state) = self.states(id).iter().find(|s| idx >= s.len()) {
                    problems.push(format!(
                        "{} controls {} with link {}, but state {} is too short",
                        id, edge, idx, state
                    ));
                }
            }
        }
        problems
    }
}

fn lookup<'a, T>(map: &'a BTreeMap<NodeID, Vec<T>>, node: &NodeID) -> &'a [T] {
    map.get(node).map(|x| x.as_slice()).unwrap_or(&[])
}

/// `grid.0.360.train.rou.xml` has a horizon of 360.
pub fn horizon_from_route_path(path: &Path) -> Result<usize> {
    let name = path
        .file_name()
        .map(|x| x.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() < 4 {
        bail!("Can't find the horizon in route file name {}", name);
    }
    parts[parts.len() - 4]
        .parse::<usize>()
        .with_context(|| format!("Can't find the horizon in route file name {}", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_paths() -> NetworkPaths {
        NetworkPaths::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("test_data/networks"))
    }

    fn edges(raw: &[&str]) -> Vec<EdgeID> {
        raw.iter().map(|x| EdgeID::from(*x)).collect()
    }

    #[test]
    fn intersection() {
        let network = Network::new(&test_paths(), "intersection").unwrap();
        let tl = NodeID::from("247123161");
        assert_eq!(network.tls_ids(), &[tl.clone()]);
        assert_eq!(
            network.approaches(&tl),
            edges(&["-238059324", "-238059328", "309265401", "383432312"]).as_slice()
        );
        assert_eq!(
            network.states(&tl),
            &["GGrrrGGrrr", "yyrrryyrrr", "rrGGGrrGGG", "rryyyrryyy"]
        );
        assert_eq!(network.durations(&tl), &[39, 6, 39, 6]);

        let phases = network.phases(&tl);
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[&0], edges(&["-238059324", "383432312"]));
        assert_eq!(phases[&1], edges(&["-238059328", "309265401"]));
        assert_eq!(
            network.phase_durations(&tl).into_iter().collect::<Vec<_>>(),
            vec![(0, 45), (1, 45)]
        );
    }

    #[test]
    fn phases_are_made_of_approaches() {
        let network = Network::new(&test_paths(), "intersection").unwrap();
        for id in network.tls_ids() {
            let phases = network.phases(id);
            assert!(phases.len() <= network.states(id).len());
            for (idx, (phase_idx, approaches)) in phases.iter().enumerate() {
                assert_eq!(idx, *phase_idx);
                assert!(!approaches.is_empty());
                assert!(approaches.iter().all(|e| network.approaches(id).contains(e)));
            }
        }
    }

    #[test]
    fn cached_views_are_stable() {
        let network = Network::new(&test_paths(), "intersection").unwrap();
        let tl = NodeID::from("247123161");
        let first = network.approaches(&tl).as_ptr();
        let second = network.approaches(&tl).as_ptr();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_junctions_are_empty() {
        let network = Network::new(&test_paths(), "intersection").unwrap();
        let west = NodeID::from("west");
        assert!(network.approaches(&west).is_empty());
        assert!(network.states(&west).is_empty());
        assert!(network.durations(&west).is_empty());
        assert!(network.phases(&west).is_empty());
        assert!(network.phase_durations(&west).is_empty());
    }

    #[test]
    fn without_traffic_lights() {
        let network = Network::new(&test_paths(), "no_lights").unwrap();
        assert!(network.tls_ids().is_empty());
        assert!(network.phases_map().is_empty());
        assert!(network.routes().is_empty());
        assert_eq!(network.edges().len(), 2);
    }

    #[test]
    fn missing_default_program() {
        let mut network = Network::new(&test_paths(), "intersection").unwrap();
        network.programs.retain(|p| !p.is_canonical());
        let network = Network::from_parts(
            "intersection",
            network.nodes,
            network.edges,
            network.connections,
            network.programs,
            network.routes,
        );
        let tl = NodeID::from("247123161");
        assert!(network.states(&tl).is_empty());
        assert!(network.durations(&tl).is_empty());
        assert!(network.phases(&tl).is_empty());
        assert_eq!(network.approaches(&tl).len(), 4);
    }

    #[test]
    fn load_experiment_routes() {
        let paths = test_paths();
        let network = Network::load(
            &paths,
            "intersection",
            paths.file("intersection", "0.360.train.rou"),
        )
        .unwrap();
        assert_eq!(network.horizon(), Some(360));
        assert_eq!(network.edges_distribution().len(), 4);

        let flows = network.inflows(360);
        assert_eq!(flows.len(), 4);
        assert!(flows.iter().all(|f| f.end == 324.0));
    }

    #[test]
    fn horizons() {
        assert_eq!(
            horizon_from_route_path(Path::new("a/grid.3.900.eval.rou.xml")).unwrap(),
            900
        );
        assert!(horizon_from_route_path(Path::new("grid.rou.xml")).is_err());
        assert!(horizon_from_route_path(Path::new("grid.x.y.rou.xml")).is_err());
    }
}
