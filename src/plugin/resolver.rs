//! Dependency resolution and load ordering.
//!
//! Load order is a topological sort of the dependency graph, bucketed by
//! [`Priority`](crate::abi::Priority): every ready `First` module is placed
//! before any ready `Default`, and `Default` before `Later`. A dependency
//! edge always overrides the buckets (a dependency loads strictly before
//! its dependent) and ties inside a bucket keep discovery order.

use crate::abi::{DependencyKind, PluginDescriptor};
use crate::error::Error;
use daggy::{Dag, NodeIndex, Walker};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Outcome of resolving a set of discovered descriptors.
#[derive(Debug)]
pub struct Resolution {
    /// Indices into the input slice, in load order.
    pub order: Vec<usize>,
    /// Indices that cannot load, with the reason. Sorted by index.
    pub failed: Vec<(usize, Error)>,
}

impl Resolution {
    /// Whether a discovery index survived resolution.
    pub fn is_ordered(&self, index: usize) -> bool {
        self.order.contains(&index)
    }
}

/// Compute the load order for `descriptors` (in discovery order).
///
/// A `Required` dependency on an absent or failed module fails the
/// dependent, transitively. An `Optional` dependency never blocks loading;
/// when present it only constrains ordering. A cycle through required edges
/// fails every module on it; an optional edge that would close a cycle is
/// dropped.
pub fn resolve_load_order(descriptors: &[PluginDescriptor]) -> Resolution {
    let mut failed: HashMap<usize, Error> = HashMap::new();

    // Name -> first discovery index; later duplicates fail outright.
    let mut by_name: HashMap<&str, usize> = HashMap::new();
    for (idx, desc) in descriptors.iter().enumerate() {
        if by_name.contains_key(desc.name.as_str()) {
            failed.insert(idx, Error::DuplicateModule(desc.name.clone()));
        } else {
            by_name.insert(desc.name.as_str(), idx);
        }
    }

    // Alternate failure propagation and required-edge cycle detection until
    // the healthy set is stable; every pass removes at least one module.
    let mut dag;
    let mut nodes: HashMap<usize, NodeIndex>;
    loop {
        propagate_required_failures(descriptors, &by_name, &mut failed);

        dag = Dag::<usize, DependencyKind>::new();
        nodes = HashMap::new();
        for idx in 0..descriptors.len() {
            if !failed.contains_key(&idx) {
                nodes.insert(idx, dag.add_node(idx));
            }
        }

        let mut cycle_failed = false;
        'modules: for (idx, desc) in descriptors.iter().enumerate() {
            if failed.contains_key(&idx) {
                continue;
            }
            for dep in &desc.dependencies {
                if dep.kind != DependencyKind::Required {
                    continue;
                }
                let dep_idx = by_name[dep.name.as_str()];
                if dag
                    .add_edge(nodes[&dep_idx], nodes[&idx], dep.kind)
                    .is_err()
                {
                    failed.insert(idx, Error::CyclicDependency(desc.name.clone()));
                    cycle_failed = true;
                    continue 'modules;
                }
            }
        }

        if !cycle_failed {
            break;
        }
    }

    // Optional dependencies order-before when present; one that would close
    // a cycle is dropped rather than blocking anything.
    for (idx, desc) in descriptors.iter().enumerate() {
        let Some(&node) = nodes.get(&idx) else {
            continue;
        };
        for dep in &desc.dependencies {
            if dep.kind != DependencyKind::Optional {
                continue;
            }
            let Some(dep_node) = by_name
                .get(dep.name.as_str())
                .and_then(|dep_idx| nodes.get(dep_idx))
            else {
                continue;
            };
            if dag.add_edge(*dep_node, node, dep.kind).is_err() {
                tracing::warn!(
                    module = %desc.name,
                    dependency = %dep.name,
                    "optional dependency would form a cycle; ignoring for ordering"
                );
            }
        }
    }

    // Kahn's algorithm; the ready set is a priority queue keyed by
    // (bucket, discovery index), which yields bucket order globally and
    // stable order within a bucket.
    let mut indegree: HashMap<usize, usize> = nodes
        .iter()
        .map(|(&idx, &node)| (idx, dag.parents(node).iter(&dag).count()))
        .collect();

    let mut ready = BinaryHeap::new();
    for (&idx, &degree) in &indegree {
        if degree == 0 {
            ready.push(Reverse((descriptors[idx].priority, idx)));
        }
    }

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse((_, idx))) = ready.pop() {
        order.push(idx);
        let children: Vec<NodeIndex> = dag.children(nodes[&idx]).iter(&dag).map(|(_, n)| n).collect();
        for child in children {
            let child_idx = *dag.node_weight(child).expect("child node exists");
            let degree = indegree.get_mut(&child_idx).unwrap();
            *degree -= 1;
            if *degree == 0 {
                ready.push(Reverse((descriptors[child_idx].priority, child_idx)));
            }
        }
    }

    let mut failed: Vec<(usize, Error)> = failed.into_iter().collect();
    failed.sort_by_key(|(idx, _)| *idx);
    Resolution { order, failed }
}

/// Fail every module whose required dependencies are absent or failed,
/// until no more failures appear.
fn propagate_required_failures(
    descriptors: &[PluginDescriptor],
    by_name: &HashMap<&str, usize>,
    failed: &mut HashMap<usize, Error>,
) {
    loop {
        let mut changed = false;
        for (idx, desc) in descriptors.iter().enumerate() {
            if failed.contains_key(&idx) {
                continue;
            }
            for dep in &desc.dependencies {
                if dep.kind != DependencyKind::Required {
                    continue;
                }
                match by_name.get(dep.name.as_str()) {
                    None => {
                        failed.insert(
                            idx,
                            Error::MissingDependency {
                                module: desc.name.clone(),
                                dependency: dep.name.clone(),
                            },
                        );
                        changed = true;
                        break;
                    }
                    Some(dep_idx) if failed.contains_key(dep_idx) => {
                        failed.insert(
                            idx,
                            Error::DependencyFailed {
                                module: desc.name.clone(),
                                dependency: dep.name.clone(),
                            },
                        );
                        changed = true;
                        break;
                    }
                    Some(_) => {}
                }
            }
        }
        if !changed {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{Dependency, Priority};

    fn desc(name: &str) -> PluginDescriptor {
        PluginDescriptor::new(name, "1.0.0")
    }

    fn names(resolution: &Resolution, descriptors: &[PluginDescriptor]) -> Vec<String> {
        resolution
            .order
            .iter()
            .map(|&i| descriptors[i].name.clone())
            .collect()
    }

    #[test]
    fn test_stable_order_within_bucket() {
        let descriptors = vec![desc("a"), desc("b"), desc("c")];
        let resolution = resolve_load_order(&descriptors);
        assert_eq!(names(&resolution, &descriptors), ["a", "b", "c"]);
        assert!(resolution.failed.is_empty());
    }

    #[test]
    fn test_priority_buckets() {
        let descriptors = vec![
            desc("late").with_priority(Priority::Later),
            desc("mid"),
            desc("early").with_priority(Priority::First),
        ];
        let resolution = resolve_load_order(&descriptors);
        assert_eq!(names(&resolution, &descriptors), ["early", "mid", "late"]);
    }

    #[test]
    fn test_dependency_overrides_bucket() {
        // "first" (First) requires "base" (Later): base must precede it,
        // while the unrelated "other" (First) keeps its bucket position.
        let descriptors = vec![
            desc("other").with_priority(Priority::First),
            desc("first")
                .with_priority(Priority::First)
                .with_dependency(Dependency::required("base")),
            desc("base").with_priority(Priority::Later),
        ];
        let resolution = resolve_load_order(&descriptors);
        assert_eq!(names(&resolution, &descriptors), ["other", "base", "first"]);
    }

    #[test]
    fn test_first_dependency_of_later_module() {
        // A (Later) depends on B (First): B loads before A anyway, and
        // before unrelated First modules only by its discovery position.
        let descriptors = vec![
            desc("b").with_priority(Priority::First),
            desc("z").with_priority(Priority::First),
            desc("a")
                .with_priority(Priority::Later)
                .with_dependency(Dependency::required("b")),
        ];
        let resolution = resolve_load_order(&descriptors);
        assert_eq!(names(&resolution, &descriptors), ["b", "z", "a"]);
    }

    #[test]
    fn test_missing_required_dependency_fails() {
        let descriptors = vec![desc("lonely").with_dependency(Dependency::required("ghost"))];
        let resolution = resolve_load_order(&descriptors);
        assert!(resolution.order.is_empty());
        assert!(matches!(
            resolution.failed.as_slice(),
            [(0, Error::MissingDependency { .. })]
        ));
    }

    #[test]
    fn test_missing_optional_dependency_loads() {
        let descriptors = vec![desc("easygoing").with_dependency(Dependency::optional("ghost"))];
        let resolution = resolve_load_order(&descriptors);
        assert_eq!(resolution.order, vec![0]);
        assert!(resolution.failed.is_empty());
    }

    #[test]
    fn test_optional_dependency_orders_when_present() {
        let descriptors = vec![
            desc("user").with_dependency(Dependency::optional("lib")),
            desc("lib"),
        ];
        let resolution = resolve_load_order(&descriptors);
        assert_eq!(names(&resolution, &descriptors), ["lib", "user"]);
    }

    #[test]
    fn test_transitive_required_failure() {
        let descriptors = vec![
            desc("top").with_dependency(Dependency::required("mid")),
            desc("mid").with_dependency(Dependency::required("ghost")),
            desc("bystander"),
        ];
        let resolution = resolve_load_order(&descriptors);
        assert_eq!(names(&resolution, &descriptors), ["bystander"]);
        assert_eq!(resolution.failed.len(), 2);
        assert!(matches!(resolution.failed[0], (0, Error::DependencyFailed { .. })));
        assert!(matches!(resolution.failed[1], (1, Error::MissingDependency { .. })));
    }

    #[test]
    fn test_optional_dependency_on_failed_module_loads() {
        let descriptors = vec![
            desc("broken").with_dependency(Dependency::required("ghost")),
            desc("tolerant").with_dependency(Dependency::optional("broken")),
        ];
        let resolution = resolve_load_order(&descriptors);
        assert_eq!(names(&resolution, &descriptors), ["tolerant"]);
    }

    #[test]
    fn test_required_cycle_fails_all_members() {
        let descriptors = vec![
            desc("a").with_dependency(Dependency::required("b")),
            desc("b").with_dependency(Dependency::required("a")),
            desc("c"),
        ];
        let resolution = resolve_load_order(&descriptors);
        assert_eq!(names(&resolution, &descriptors), ["c"]);
        assert_eq!(resolution.failed.len(), 2);
        for (_, err) in &resolution.failed {
            assert!(matches!(
                err,
                Error::CyclicDependency(_) | Error::DependencyFailed { .. }
            ));
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let descriptors = vec![desc("narcissus").with_dependency(Dependency::required("narcissus"))];
        let resolution = resolve_load_order(&descriptors);
        assert!(resolution.order.is_empty());
        assert!(matches!(
            resolution.failed.as_slice(),
            [(0, Error::CyclicDependency(_))]
        ));
    }

    #[test]
    fn test_duplicate_name_fails_later_discovery() {
        let descriptors = vec![desc("twin"), desc("twin")];
        let resolution = resolve_load_order(&descriptors);
        assert_eq!(resolution.order, vec![0]);
        assert!(matches!(
            resolution.failed.as_slice(),
            [(1, Error::DuplicateModule(_))]
        ));
    }

    #[test]
    fn test_diamond_dependencies() {
        let descriptors = vec![
            desc("app")
                .with_dependency(Dependency::required("left"))
                .with_dependency(Dependency::required("right")),
            desc("left").with_dependency(Dependency::required("base")),
            desc("right").with_dependency(Dependency::required("base")),
            desc("base"),
        ];
        let resolution = resolve_load_order(&descriptors);
        assert_eq!(names(&resolution, &descriptors), ["base", "left", "right", "app"]);
    }
}
