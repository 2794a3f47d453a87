//! Shortest paths from the initial world to violating worlds.

use crate::explorer::Kripke;
use crate::world::WorldId;
use std::collections::{HashMap, HashSet, VecDeque};

/// A sequence of world ids starting at the initial world.
pub type Path = Vec<WorldId>;

/// Which violating worlds get a counterexample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CounterexampleMode {
    /// Violating worlds reachable without passing through another violating
    /// world, each through one shortest path.
    #[default]
    FirstReached,
    /// Every reachable violating world, each through one shortest path that
    /// may pass through other violating worlds.
    AllShortest,
}

impl Kripke {
    /// Counterexamples in the given mode, in breadth-first discovery order.
    pub fn counterexamples(&self, mode: CounterexampleMode) -> Vec<Path> {
        match mode {
            CounterexampleMode::FirstReached => self.find_paths_to_violations(),
            CounterexampleMode::AllShortest => self.find_all_shortest_counterexamples(),
        }
    }

    /// Breadth-first search over the explored graph with one shared visited
    /// set. A violating world ends its path and is not expanded further.
    pub fn find_paths_to_violations(&self) -> Vec<Path> {
        let mut paths = Vec::new();
        let mut visited: HashSet<WorldId> = HashSet::new();
        let mut queue: VecDeque<Path> = VecDeque::from([vec![self.initial().id()]]);

        while let Some(path) = queue.pop_front() {
            let Some(&current) = path.last() else {
                continue;
            };
            if !visited.insert(current) {
                continue;
            }

            if self.world(&current).is_some_and(|w| w.violates_invariant()) {
                paths.push(path);
                continue;
            }

            for next in self.successors(&current) {
                if !visited.contains(next) {
                    let mut extended = Vec::with_capacity(path.len() + 1);
                    extended.extend_from_slice(&path);
                    extended.push(*next);
                    queue.push_back(extended);
                }
            }
        }

        paths
    }

    /// One shortest path to every reachable violating world.
    ///
    /// A single breadth-first tree over the whole graph, violating worlds
    /// included, with parent links; each path is read back from the tree.
    pub fn find_all_shortest_counterexamples(&self) -> Vec<Path> {
        let root = self.initial().id();
        let mut parent: HashMap<WorldId, Option<WorldId>> = HashMap::from([(root, None)]);
        let mut queue = VecDeque::from([root]);
        let mut targets = Vec::new();

        while let Some(current) = queue.pop_front() {
            if self.world(&current).is_some_and(|w| w.violates_invariant()) {
                targets.push(current);
            }
            for next in self.successors(&current) {
                if !parent.contains_key(next) {
                    parent.insert(*next, Some(current));
                    queue.push_back(*next);
                }
            }
        }

        targets
            .into_iter()
            .map(|target| {
                let mut path = vec![target];
                let mut cursor = target;
                while let Some(Some(prev)) = parent.get(&cursor) {
                    path.push(*prev);
                    cursor = *prev;
                }
                path.reverse();
                path
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariant::invariant;
    use crate::world::World;
    use actorcheck_model::{Event, MachineSpec, StateMachine};

    fn state_is(w: &World, state: &str) -> bool {
        w.env().machine("m").is_some_and(|m| m.state().is(state))
    }

    /// A -> B -> C -> D along a chain of self-sent events.
    fn chain(bad: &'static [&'static str]) -> Kripke {
        let spec = MachineSpec::builder("M", "A")
            .on_effect("A", "Entry", |env, id, _| {
                env.send(id, Event::new("Next"))?;
                env.goto(id, "B")
            })
            .on_effect("B", "Next", |env, id, _| {
                env.send(id, Event::new("Next"))?;
                env.goto(id, "C")
            })
            .on_effect("C", "Next", |env, id, _| env.goto(id, "D"))
            .build();
        let mut kripke = Kripke::new(
            vec![StateMachine::new("m", spec)],
            vec![invariant("good state", move |w: &World| {
                !bad.iter().any(|s| state_is(w, s))
            })],
        )
        .unwrap();
        kripke.solve().unwrap();
        kripke
    }

    fn states_along(kripke: &Kripke, path: &Path) -> Vec<String> {
        path.iter()
            .map(|id| {
                let w = kripke.world(id).unwrap();
                w.env().machine("m").unwrap().state().name().to_string()
            })
            .collect()
    }

    #[test]
    fn test_no_violations_no_paths() {
        let kripke = chain(&[]);
        assert!(kripke.find_paths_to_violations().is_empty());
        assert!(kripke.find_all_shortest_counterexamples().is_empty());
    }

    #[test]
    fn test_first_reached_stops_at_violation() {
        let kripke = chain(&["B", "D"]);
        let paths = kripke.find_paths_to_violations();
        assert_eq!(paths.len(), 1);
        assert_eq!(states_along(&kripke, &paths[0]), vec!["A", "B"]);
    }

    #[test]
    fn test_all_shortest_expands_through_violations() {
        // D is only reachable behind the violating B.
        let kripke = chain(&["B", "D"]);
        let paths = kripke.counterexamples(CounterexampleMode::AllShortest);
        assert_eq!(paths.len(), 2);
        assert_eq!(states_along(&kripke, &paths[0]), vec!["A", "B"]);
        assert_eq!(states_along(&kripke, &paths[1]), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_violating_initial_world() {
        let kripke = chain(&["A"]);
        let paths = kripke.find_paths_to_violations();
        assert_eq!(paths, vec![vec![kripke.initial().id()]]);
    }

    #[test]
    fn test_paths_are_shortest() {
        // Diamond of two independent machines: (B, A) violates after one step
        // and (B, B) after two, reached first through (B, A).
        let spec = MachineSpec::builder("M", "A")
            .on_effect("A", "Entry", |env, id, _| env.goto(id, "B"))
            .build();
        let mut kripke = Kripke::new(
            vec![
                StateMachine::new("x", spec.clone()),
                StateMachine::new("y", spec),
            ],
            vec![invariant("x not B", |w: &World| {
                !w.env().machine("x").is_some_and(|m| m.state().is("B"))
            })],
        )
        .unwrap();
        kripke.solve().unwrap();

        // (B, B) is also reachable through the non-violating (A, B).
        let first = kripke.find_paths_to_violations();
        let lengths: Vec<usize> = first.iter().map(Vec::len).collect();
        assert_eq!(lengths, vec![2, 3]);

        let all = kripke.find_all_shortest_counterexamples();
        let lengths: Vec<usize> = all.iter().map(Vec::len).collect();
        assert_eq!(lengths, vec![2, 3]);
        assert_eq!(all[0], first[0]);
    }
}
