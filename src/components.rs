/// Connected components of the full match adjacency
///
/// Traversal is an explicit-stack depth first search that visits nodes in the
/// same preorder a recursive walk would, so group membership and member order
/// only depend on the insertion order of the adjacency map.
use indexmap::IndexMap;
use std::collections::HashSet;

/// Partition the nodes of `adjacency` into connected groups
///
/// Groups are numbered by position in the returned vector. Each group starts
/// at the first still-unvisited key in map order. Neighbours that are not
/// themselves keys of the map are never visited.
pub fn connected_components<'a>(adjacency: &IndexMap<&'a str, Vec<&'a str>>) -> Vec<Vec<&'a str>> {
    let mut unvisited: HashSet<&str> = adjacency.keys().copied().collect();
    let mut groups = Vec::new();

    for &start in adjacency.keys() {
        if !unvisited.remove(start) {
            continue;
        }
        let mut group = vec![start];
        // (node, index of the next neighbour to look at)
        let mut stack: Vec<(&str, usize)> = vec![(start, 0)];

        while let Some(frame) = stack.last_mut() {
            let neighbours = adjacency.get(frame.0).map(Vec::as_slice).unwrap_or(&[]);
            if frame.1 >= neighbours.len() {
                stack.pop();
                continue;
            }
            let child = neighbours[frame.1];
            frame.1 += 1;

            if unvisited.remove(child) {
                group.push(child);
                stack.push((child, 0));
            }
        }
        groups.push(group);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjacency<'a>(edges: &[(&'a str, &'a str)]) -> IndexMap<&'a str, Vec<&'a str>> {
        let mut adj: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for &(a, b) in edges {
            adj.entry(b).or_default().push(a);
            adj.entry(a).or_default().push(b);
        }
        adj
    }

    #[test]
    fn test_two_components() {
        let adj = adjacency(&[("chr1", "ctgA"), ("chr1", "ctgB"), ("chr2", "ctgC")]);
        let groups = connected_components(&adj);
        assert_eq!(groups, vec![vec!["ctgA", "chr1", "ctgB"], vec!["ctgC", "chr2"]]);
    }

    #[test]
    fn test_preorder_matches_recursive_walk() {
        // a - b - d, a - c; recursion from a visits b, d, then c
        let mut adj: IndexMap<&str, Vec<&str>> = IndexMap::new();
        adj.insert("a", vec!["b", "c"]);
        adj.insert("b", vec!["a", "d"]);
        adj.insert("c", vec!["a"]);
        adj.insert("d", vec!["b"]);
        assert_eq!(connected_components(&adj), vec![vec!["a", "b", "d", "c"]]);
    }

    #[test]
    fn test_cycles_terminate() {
        let adj = adjacency(&[("a", "b"), ("b", "c"), ("c", "a"), ("a", "a")]);
        let groups = connected_components(&adj);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 3);
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let names: Vec<String> = (0..200_000).map(|i| format!("s{i}")).collect();
        let mut adj: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for w in names.windows(2) {
            adj.entry(w[0].as_str()).or_default().push(w[1].as_str());
            adj.entry(w[1].as_str()).or_default().push(w[0].as_str());
        }
        let groups = connected_components(&adj);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), names.len());
    }

    #[test]
    fn test_empty() {
        let adj: IndexMap<&str, Vec<&str>> = IndexMap::new();
        assert!(connected_components(&adj).is_empty());
    }
}
