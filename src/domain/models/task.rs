//! Task and task-graph domain models.
//!
//! A task is one declared unit of work parsed out of a project's task list.
//! Tasks form a DAG through their `depends` edges; the graph is resolved
//! once per run into a topological order and a set of parallel phases.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// The default role assigned to a task when `@role(...)` is absent.
pub const DEFAULT_ROLE: &str = "builder";

/// A single declared unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub done: bool,
    pub depends: Vec<String>,
    pub role: String,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            done: false,
            depends: Vec::new(),
            role: DEFAULT_ROLE.to_string(),
        }
    }
}

/// A resolved task dependency graph.
///
/// `order` is a valid topological permutation of `tasks`: every dependency
/// of every task appears earlier in `order` than the task itself, for every
/// id reachable without crossing a cycle. Ids that could not be ordered
/// because they sit on or behind a cycle are reported separately by
/// [`TaskGraph::unreachable`] rather than silently dropped.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    pub tasks: HashMap<String, Task>,
    pub order: Vec<String>,
    unreachable: Vec<String>,
}

impl TaskGraph {
    /// Build a graph from an already-parsed task list, computing the
    /// topological order via Kahn's algorithm. Ties are broken by the
    /// tasks' original insertion order. If the graph contains a cycle, the
    /// returned graph's `order` holds the longest acyclic prefix and the
    /// remaining ids are reported by [`TaskGraph::unreachable`].
    #[must_use]
    pub fn new(tasks: Vec<Task>) -> Self {
        let insertion_order: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        let mut by_id: HashMap<String, Task> = HashMap::new();
        for task in tasks {
            by_id.insert(task.id.clone(), task);
        }

        let mut in_degree: HashMap<String, usize> = HashMap::new();
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for (id, task) in &by_id {
            let deps_in_graph = task.depends.iter().filter(|d| by_id.contains_key(*d)).count();
            in_degree.insert(id.clone(), deps_in_graph);
            for dep in &task.depends {
                if by_id.contains_key(dep) {
                    dependents.entry(dep.clone()).or_default().push(id.clone());
                }
            }
        }

        // Kahn's algorithm, ready queue processed in insertion order.
        let mut queue: VecDeque<String> = VecDeque::new();
        for id in &insertion_order {
            if in_degree.get(id).copied().unwrap_or(0) == 0 {
                queue.push_back(id.clone());
            }
        }

        let mut order = Vec::with_capacity(by_id.len());
        let mut visited: HashSet<String> = HashSet::new();
        while let Some(id) = queue.pop_front() {
            if !visited.insert(id.clone()) {
                continue;
            }
            order.push(id.clone());
            if let Some(deps) = dependents.get(&id) {
                // Preserve insertion order among newly-ready dependents.
                let mut newly_ready: Vec<String> = Vec::new();
                for dependent in deps {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            newly_ready.push(dependent.clone());
                        }
                    }
                }
                for id in insertion_order.iter().filter(|i| newly_ready.contains(i)) {
                    queue.push_back(id.clone());
                }
            }
        }

        let unreachable: Vec<String> = insertion_order
            .iter()
            .filter(|id| !visited.contains(*id))
            .cloned()
            .collect();

        Self { tasks: by_id, order, unreachable }
    }

    /// Ids that could not be placed in `order` because they participate in
    /// or depend (transitively) on a dependency cycle.
    #[must_use]
    pub fn unreachable(&self) -> &[String] {
        &self.unreachable
    }

    #[must_use]
    pub fn has_cycle(&self) -> bool {
        !self.unreachable.is_empty()
    }

    /// Every not-done task whose dependencies are all done, in topological
    /// order.
    #[must_use]
    pub fn ready_tasks(&self) -> Vec<&Task> {
        self.order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .filter(|task| {
                !task.done && task.depends.iter().all(|dep| self.tasks.get(dep).is_some_and(|d| d.done))
            })
            .collect()
    }

    /// Group not-yet-done tasks into successive maximal antichains: group
    /// `i+1` consists of every not-yet-ready task that becomes ready once
    /// every task in groups `0..=i` is treated as done. An empty trailing
    /// group (returned when remaining tasks exist but none become ready)
    /// signals unsatisfiable dependencies — typically a cycle, or a
    /// dependency on an id absent from the graph.
    #[must_use]
    pub fn parallel_groups(&self) -> Vec<Vec<String>> {
        let mut done: HashSet<String> = self
            .tasks
            .values()
            .filter(|t| t.done)
            .map(|t| t.id.clone())
            .collect();
        let mut remaining: Vec<String> = self
            .order
            .iter()
            .filter(|id| !done.contains(*id))
            .cloned()
            .collect();

        let mut groups = Vec::new();
        while !remaining.is_empty() {
            let (ready, not_ready): (Vec<String>, Vec<String>) = remaining.into_iter().partition(|id| {
                self.tasks
                    .get(id)
                    .is_some_and(|t| t.depends.iter().all(|d| done.contains(d)))
            });

            if ready.is_empty() {
                // Unsatisfiable: emit the empty group and stop so callers can
                // detect the stall instead of looping forever.
                groups.push(Vec::new());
                break;
            }

            for id in &ready {
                done.insert(id.clone());
            }
            groups.push(ready);
            remaining = not_ready;
        }

        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, depends: &[&str]) -> Task {
        let mut t = Task::new(id, id);
        t.depends = depends.iter().map(|s| (*s).to_string()).collect();
        t
    }

    #[test]
    fn topological_order_respects_dependencies() {
        let tasks = vec![
            task("c", &["a", "b"]),
            task("a", &[]),
            task("b", &["a"]),
        ];
        let graph = TaskGraph::new(tasks);
        assert!(!graph.has_cycle());
        let pos = |id: &str| graph.order.iter().position(|x| x == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
    }

    #[test]
    fn cycle_leaves_longest_acyclic_prefix_and_reports_unreachable() {
        let tasks = vec![task("x", &["y"]), task("y", &["x"]), task("z", &[])];
        let graph = TaskGraph::new(tasks);
        assert!(graph.has_cycle());
        assert_eq!(graph.order, vec!["z".to_string()]);
        let mut unreachable = graph.unreachable().to_vec();
        unreachable.sort();
        assert_eq!(unreachable, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn ready_tasks_only_not_done_with_satisfied_deps() {
        let mut a = task("a", &[]);
        a.done = true;
        let b = task("b", &["a"]);
        let c = task("c", &["b"]);
        let graph = TaskGraph::new(vec![a, b, c]);
        let ready: Vec<&str> = graph.ready_tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ready, vec!["b"]);
    }

    #[test]
    fn parallel_groups_concatenation_equals_not_done_tasks() {
        let tasks = vec![
            task("a", &[]),
            task("b", &[]),
            task("c", &["a", "b"]),
            task("d", &["c"]),
        ];
        let graph = TaskGraph::new(tasks);
        let groups = graph.parallel_groups();
        assert_eq!(groups[0].iter().collect::<HashSet<_>>(), HashSet::from([&"a".to_string(), &"b".to_string()]));
        assert_eq!(groups[1], vec!["c".to_string()]);
        assert_eq!(groups[2], vec!["d".to_string()]);

        let all: HashSet<String> = groups.iter().flatten().cloned().collect();
        let expected: HashSet<String> = graph.tasks.keys().cloned().collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn parallel_groups_reports_unsatisfiable_dependency_as_empty_final_group() {
        let tasks = vec![task("a", &["missing"])];
        let graph = TaskGraph::new(tasks);
        let groups = graph.parallel_groups();
        assert_eq!(groups.last(), Some(&Vec::new()));
    }
}
