//! Derives movement phases from the signal states of a traffic light program.
//!
//! A phase is a set of non-conflicting movements, expressed as the incoming approaches that have a
//! green light. Yellow and all-red clearance states between two greens don't give any approach
//! the right of way, so they don't make phases of their own; usually a program with N states has
//! N / 2 phases.
//!
//! See Wei et al., 2019, http://arxiv.org/abs/1904.08117

use std::collections::{BTreeMap, BTreeSet};

use crate::EdgeID;

/// Phase index to the sorted approaches with a green light during that phase. Indices are dense,
/// starting at 0, in the order of the states producing them.
pub type Phases = BTreeMap<usize, Vec<EdgeID>>;

/// For every state, the index of the phase it belongs to. `links` maps a position in the state
/// string to the approach that signal controls.
///
/// - A state with no green (`G` or `g`) signals belongs to no phase.
/// - A state showing yellow whose green approaches are exactly those of the previous phase is the
///   tail end of that phase, so it's folded into it.
/// - Any other state with some green signal starts the next phase.
///
/// Link indices past the end of a state are ignored.
pub fn assign_states(states: &[String], links: &BTreeMap<usize, EdgeID>) -> Vec<Option<usize>> {
    scan(states, links).0
}

pub fn derive_phases(states: &[String], links: &BTreeMap<usize, EdgeID>) -> Phases {
    scan(states, links).1
}

/// How long each phase lasts in a full cycle of the program. A phase owns the states folded into
/// it and the clearance states after it, up to the next phase. The program repeats, so clearance
/// states before the first phase belong to the last one.
pub fn phase_durations(
    states: &[String],
    durations: &[usize],
    links: &BTreeMap<usize, EdgeID>,
) -> BTreeMap<usize, usize> {
    let assignment = assign_states(states, links);
    let mut results = BTreeMap::new();
    let first = match assignment.iter().position(|x| x.is_some()) {
        Some(idx) => idx,
        None => {
            return results;
        }
    };

    let n = assignment.len().min(durations.len());
    let mut current = 0;
    for offset in 0..n {
        let i = (first + offset) % n;
        if let Some(phase) = assignment[i] {
            current = phase;
        }
        *results.entry(current).or_insert(0) += durations[i];
    }
    results
}

fn scan(states: &[String], links: &BTreeMap<usize, EdgeID>) -> (Vec<Option<usize>>, Phases) {
    let mut assignment = Vec::new();
    let mut phases = Phases::new();
    let mut last: Option<(usize, BTreeSet<&EdgeID>)> = None;

    for state in states {
        let green = green_approaches(state, links);
        if green.is_empty() {
            assignment.push(None);
            continue;
        }

        let folded = match last {
            Some((idx, ref prev)) if *prev == green && state.contains('y') => Some(idx),
            _ => None,
        };
        let idx = match folded {
            Some(idx) => idx,
            None => {
                let idx = phases.len();
                phases.insert(idx, green.iter().map(|e| (*e).clone()).collect());
                last = Some((idx, green));
                idx
            }
        };
        assignment.push(Some(idx));
    }
    (assignment, phases)
}

fn green_approaches<'a>(state: &str, links: &'a BTreeMap<usize, EdgeID>) -> BTreeSet<&'a EdgeID> {
    let bits = state.as_bytes();
    links
        .iter()
        .filter(|(idx, _)| matches!(bits.get(**idx), Some(b'G') | Some(b'g')))
        .map(|(_, edge)| edge)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|x| x.to_string()).collect()
    }

    // Two lanes from the west, three from the north, two from the south, three from the east
    fn links() -> BTreeMap<usize, EdgeID> {
        let mut links = BTreeMap::new();
        for (idx, edge) in [
            "-238059324",
            "-238059324",
            "-238059328",
            "-238059328",
            "-238059328",
            "383432312",
            "383432312",
            "309265401",
            "309265401",
            "309265401",
        ]
        .iter()
        .enumerate()
        {
            links.insert(idx, EdgeID::from(*edge));
        }
        links
    }

    fn edges(raw: &[&str]) -> Vec<EdgeID> {
        raw.iter().map(|x| EdgeID::from(*x)).collect()
    }

    #[test]
    fn yellow_states_dont_make_phases() {
        let states = states(&["GGrrrGGrrr", "yyrrryyrrr", "rrGGGrrGGG", "rryyyrryyy"]);
        let phases = derive_phases(&states, &links());
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[&0], edges(&["-238059324", "383432312"]));
        assert_eq!(phases[&1], edges(&["-238059328", "309265401"]));
        assert_eq!(
            assign_states(&states, &links()),
            vec![Some(0), None, Some(1), None]
        );
        assert_eq!(
            phase_durations(&states, &[39, 6, 39, 6], &links()),
            vec![(0, 45), (1, 45)].into_iter().collect::<BTreeMap<usize, usize>>()
        );
    }

    #[test]
    fn lowercase_green_counts() {
        let states = states(&["gGrrrrrrrr", "rrrrrrrrrr"]);
        let phases = derive_phases(&states, &links());
        assert_eq!(phases.len(), 1);
        assert_eq!(phases[&0], edges(&["-238059324"]));
    }

    #[test]
    fn yellow_tail_with_lingering_green_is_folded() {
        // The west approach keeps a green on one lane while its other lane turns yellow.
        let states = states(&["GGrrrrrrrr", "Gyrrrrrrrr", "rrGGGrrrrr", "rryyyrrrrr"]);
        let phases = derive_phases(&states, &links());
        assert_eq!(phases.len(), 2);
        assert_eq!(
            assign_states(&states, &links()),
            vec![Some(0), Some(0), Some(1), None]
        );
        assert_eq!(
            phase_durations(&states, &[30, 4, 20, 4], &links()),
            vec![(0, 34), (1, 24)].into_iter().collect::<BTreeMap<usize, usize>>()
        );
    }

    #[test]
    fn leading_clearance_wraps_around() {
        let states = states(&["rrrrrrrrrr", "GGrrrrrrrr", "rrGGGrrrrr"]);
        assert_eq!(
            phase_durations(&states, &[2, 10, 20], &links()),
            vec![(0, 10), (1, 22)].into_iter().collect::<BTreeMap<usize, usize>>()
        );
    }

    #[test]
    fn repeated_greens_get_their_own_phase_without_yellow() {
        let states = states(&["GGrrrrrrrr", "GGrrrrrrrr"]);
        assert_eq!(derive_phases(&states, &links()).len(), 2);
    }

    #[test]
    fn short_states_and_no_states() {
        // Link indices past the end are ignored.
        let states = states(&["GG"]);
        assert_eq!(derive_phases(&states, &links())[&0], edges(&["-238059324"]));
        assert!(derive_phases(&[], &links()).is_empty());
        assert!(phase_durations(&[], &[], &links()).is_empty());
    }
}
