//! Cycle detection for the fixture dependency graph.

use indexmap::IndexMap;
use std::collections::HashMap;

use super::FixtureDef;

/// Tracks the visitation state of a node during cycle detection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum VisitState {
    Visiting,
    Visited,
}

pub(crate) struct CycleDetectionReport {
    pub(crate) cycle: Option<Vec<String>>,
    pub(crate) missing_dependencies: Vec<(String, String)>,
}

/// Walk every declared fixture and report the first cycle plus every
/// dependency that names an undeclared fixture.
pub(crate) fn analyse(fixtures: &IndexMap<String, FixtureDef>) -> CycleDetectionReport {
    let mut detector = CycleDetector::new(fixtures);
    let mut cycle = None;
    for name in fixtures.keys() {
        if detector.is_visited(name) {
            continue;
        }
        if let Some(found) = detector.visit(name) {
            cycle = Some(found);
            break;
        }
    }
    CycleDetectionReport {
        cycle,
        missing_dependencies: detector.missing_dependencies,
    }
}

struct CycleDetector<'a> {
    fixtures: &'a IndexMap<String, FixtureDef>,
    stack: Vec<&'a str>,
    states: HashMap<&'a str, VisitState>,
    missing_dependencies: Vec<(String, String)>,
}

impl<'a> CycleDetector<'a> {
    fn new(fixtures: &'a IndexMap<String, FixtureDef>) -> Self {
        Self {
            fixtures,
            stack: Vec::new(),
            states: HashMap::new(),
            missing_dependencies: Vec::new(),
        }
    }

    fn is_visited(&self, node: &str) -> bool {
        matches!(self.states.get(node), Some(VisitState::Visited))
    }

    fn visit(&mut self, node: &'a str) -> Option<Vec<String>> {
        match self.states.get(node) {
            Some(VisitState::Visited) => return None,
            Some(VisitState::Visiting) => {
                let idx = self
                    .stack
                    .iter()
                    .position(|n| *n == node)
                    .unwrap_or_else(|| {
                        debug_assert!(false, "visiting node must be on the stack");
                        0
                    });
                let mut cycle: Vec<String> = self
                    .stack
                    .iter()
                    .skip(idx)
                    .map(|n| (*n).to_owned())
                    .collect();
                cycle.push(node.to_owned());
                return Some(canonicalize_cycle(cycle));
            }
            None => {
                self.states.insert(node, VisitState::Visiting);
            }
        }

        self.stack.push(node);

        let fixtures = self.fixtures;
        if let Some(def) = fixtures.get(node) {
            for dep in &def.dependencies {
                let Some((dep_name, _)) = fixtures.get_key_value(dep.as_str()) else {
                    tracing::debug!(
                        missing = %dep,
                        dependent = %node,
                        "fixture dependency is not declared",
                    );
                    self.missing_dependencies
                        .push((node.to_owned(), dep.clone()));
                    continue;
                };

                if let Some(cycle) = self.visit(dep_name.as_str()) {
                    return Some(cycle);
                }
            }
        }

        self.stack.pop();
        self.states.insert(node, VisitState::Visited);
        None
    }
}

/// Rotate a closed cycle so it starts at its smallest name.
///
/// The first and last entries stay equal, so `[c, a, b, c]` becomes
/// `[a, b, c, a]`.
pub(crate) fn canonicalize_cycle(mut cycle: Vec<String>) -> Vec<String> {
    if cycle.len() < 2 {
        return cycle;
    }
    let len = cycle.len() - 1;
    let start = cycle
        .iter()
        .take(len)
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map_or(0, |(idx, _)| idx);
    let (prefix, suffix) = cycle.split_at_mut(len);
    prefix.rotate_left(start);
    if let (Some(first), Some(slot)) = (prefix.first().cloned(), suffix.first_mut()) {
        slot.clone_from(&first);
    }
    cycle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{FixtureRegistry, Scope};

    fn registry(edges: &[(&str, &[&str])]) -> FixtureRegistry {
        let mut registry = FixtureRegistry::new();
        for (name, deps) in edges {
            registry
                .declare(*name, Scope::Scenario, deps, |_| Ok(()))
                .expect("declare");
        }
        registry
    }

    #[test]
    fn detects_self_dependency() {
        let registry = registry(&[("a", &["a"])]);
        let report = analyse(registry.definitions());
        assert_eq!(report.cycle, Some(vec!["a".to_owned(), "a".to_owned()]));
    }

    #[test]
    fn detects_two_node_cycle_in_canonical_order() {
        let registry = registry(&[("b", &["a"]), ("a", &["b"])]);
        let report = analyse(registry.definitions());
        assert_eq!(
            report.cycle,
            Some(vec!["a".to_owned(), "b".to_owned(), "a".to_owned()])
        );
    }

    #[test]
    fn acyclic_graph_has_no_cycle() {
        let registry = registry(&[("a", &["b", "c"]), ("b", &["c"]), ("c", &[])]);
        let report = analyse(registry.definitions());
        assert!(report.cycle.is_none());
        assert!(report.missing_dependencies.is_empty());
    }

    #[test]
    fn records_missing_dependencies() {
        let registry = registry(&[("a", &["ghost"])]);
        let report = analyse(registry.definitions());
        assert_eq!(
            report.missing_dependencies,
            vec![("a".to_owned(), "ghost".to_owned())]
        );
    }

    #[test]
    fn canonicalize_cycle_rotates_smallest_node() {
        let cycle = ["c", "a", "b", "c"].map(str::to_owned).to_vec();
        let expected = ["a", "b", "c", "a"].map(str::to_owned).to_vec();
        assert_eq!(canonicalize_cycle(cycle), expected);
    }
}
