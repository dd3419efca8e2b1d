/// Property-based tests for the filtering and graph invariants
///
/// Uses proptest to check statements that must hold for every input, not
/// just the hand-picked fixtures of the unit tests.
use indexmap::IndexMap;
use lastqc::components::connected_components;
use lastqc::graph::{Cardinality, MatchGraph, TieBreak};
use lastqc::hit::{parse_blocks, HitRecord, ParseOptions};
use lastqc::metrics::{MetricCalculator, Qual};
use lastqc::overlap::{filter_overlaps, OverlapConfig};
use lastqc::repeats::{padded_overlap, IntervalIndex};
use proptest::prelude::*;
use std::collections::HashMap;

const SEQ2: u64 = 100_000;

fn hit(score: i64, name1: &str, name2: &str, start2: u64, len: u64, reverse: bool) -> HitRecord {
    let strand = if reverse { '-' } else { '+' };
    let line = format!(
        "{score}\t{name1}\t0\t{len}\t+\t1000000\t{name2}\t{start2}\t{len}\t{strand}\t{SEQ2}\t{len}"
    );
    HitRecord::parse_line(&line, 1, &ParseOptions::default()).unwrap()
}

/// Property: hits whose normalized side-2 intervals are disjoint never demote each other
#[test]
fn prop_disjoint_intervals_never_demote() {
    proptest!(|(
        start_a in 0u64..40_000,
        len_a in 1u64..10_000,
        gap in 0u64..10_000,
        len_b in 1u64..10_000,
        score_a in 0i64..10_000,
        score_b in 0i64..10_000,
        same_name1 in any::<bool>(),
        reverse in any::<bool>()
    )| {
        let start_b = start_a + len_a + gap;
        let name1_b = if same_name1 { "chr1" } else { "chr2" };
        // On the reverse strand both intervals mirror, which keeps them disjoint
        let hits = vec![
            hit(score_a, "chr1", "ctgA", start_a, len_a, reverse),
            hit(score_b, name1_b, "ctgA", start_b, len_b, reverse),
        ];
        let outcome = filter_overlaps(&hits, &OverlapConfig::default());
        prop_assert_eq!(outcome.quals, vec![Qual::Kept, Qual::Kept]);
    });
}

/// Property: on the same name1, a contained lower scoring hit is redundant,
/// and the containing hit is never demoted by it
#[test]
fn prop_containment_demotes_only_the_inner_hit() {
    proptest!(|(
        outer_start in 0u64..40_000,
        outer_len in 2u64..20_000,
        inner_offset_frac in 0.0f64..1.0,
        inner_len_frac in 0.0f64..1.0,
        inner_score in 0i64..10_000,
        bonus in 1i64..10_000
    )| {
        let inner_len = ((outer_len as f64 * inner_len_frac) as u64).max(1);
        let inner_start = outer_start + ((outer_len - inner_len) as f64 * inner_offset_frac) as u64;
        let hits = vec![
            hit(inner_score + bonus, "chr1", "ctgA", outer_start, outer_len, false),
            hit(inner_score, "chr1", "ctgA", inner_start, inner_len, false),
        ];
        let outcome = filter_overlaps(&hits, &OverlapConfig::default());
        prop_assert_eq!(outcome.quals, vec![Qual::Kept, Qual::Redundant]);
    });
}

fn edge_strategy() -> impl Strategy<Value = Vec<(u8, u8)>> {
    prop::collection::vec((0u8..8, 0u8..8), 1..30)
}

fn edge_hits(edges: &[(u8, u8)]) -> Vec<HitRecord> {
    edges
        .iter()
        .enumerate()
        .map(|(i, &(a, b))| {
            hit(
                100 + i as i64,
                &format!("chr{a}"),
                &format!("ctg{b}"),
                0,
                100,
                false,
            )
        })
        .collect()
}

/// Property: a unique hit's two sequences only ever matched each other
#[test]
fn prop_unique_classification_is_symmetric() {
    proptest!(|(edges in edge_strategy())| {
        let hits = edge_hits(&edges);
        let graph = MatchGraph::build(&hits, TieBreak::FirstSeen);
        for (h, class) in hits.iter().zip(graph.classify_all(&hits)) {
            if class == Cardinality::Unique {
                let p1 = graph.partners(&h.name1).unwrap();
                let p2 = graph.partners(&h.name2).unwrap();
                prop_assert_eq!(p1.len(), 1);
                prop_assert_eq!(p2.len(), 1);
                prop_assert!(p1.contains(&h.name2));
                prop_assert!(p2.contains(&h.name1));
            }
        }
    });
}

/// Property: components partition the names and no edge crosses two groups
#[test]
fn prop_components_partition_the_graph() {
    proptest!(|(edges in edge_strategy())| {
        let hits = edge_hits(&edges);
        let graph = MatchGraph::build(&hits, TieBreak::FirstSeen);
        let adjacency = graph.adjacency();
        let groups = connected_components(&adjacency);

        let mut group_of: HashMap<&str, usize> = HashMap::new();
        for (g, members) in groups.iter().enumerate() {
            for &name in members {
                prop_assert!(group_of.insert(name, g).is_none(), "{} in two groups", name);
            }
        }
        prop_assert_eq!(group_of.len(), graph.len());

        for (name, neighbours) in &adjacency {
            for n in neighbours {
                prop_assert_eq!(group_of[name], group_of[n]);
            }
        }
    });
}

/// Property: components do not depend on traversal depth
#[test]
fn prop_components_match_union_of_edges() {
    proptest!(|(edges in prop::collection::vec((0u8..20, 0u8..20), 1..40))| {
        let mut adjacency: IndexMap<String, Vec<String>> = IndexMap::new();
        for &(a, b) in &edges {
            adjacency.entry(format!("n{a}")).or_default().push(format!("n{b}"));
            adjacency.entry(format!("n{b}")).or_default().push(format!("n{a}"));
        }
        let borrowed: IndexMap<&str, Vec<&str>> = adjacency
            .iter()
            .map(|(k, v)| (k.as_str(), v.iter().map(String::as_str).collect()))
            .collect();
        let groups = connected_components(&borrowed);

        // Naive label propagation until stable
        let mut label: HashMap<&str, usize> = borrowed.keys().enumerate().map(|(i, &k)| (k, i)).collect();
        loop {
            let mut changed = false;
            for (&a, ns) in &borrowed {
                for &b in ns {
                    let m = label[a].min(label[b]);
                    if label[a] != m || label[b] != m {
                        label.insert(a, m);
                        label.insert(b, m);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        let mut distinct: Vec<usize> = label.values().copied().collect();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(groups.len(), distinct.len());
        for group in &groups {
            let first = label[group[0]];
            for name in group {
                prop_assert_eq!(label[name], first);
            }
        }
    });
}

/// Property: every recorded overlap is counted on both segments
#[test]
fn prop_repeat_counts_are_symmetric() {
    proptest!(|(
        segments in prop::collection::vec((0u64..5_000, 1u64..2_000), 1..25),
        margin in 0u64..200
    )| {
        let mut index = IntervalIndex::default();
        for &(start, len) in &segments {
            index.insert(start, start + len, margin);
        }
        let stored = index.segments();
        for (i, seg) in stored.iter().enumerate() {
            let expected = stored
                .iter()
                .enumerate()
                .filter(|&(j, other)| j != i && padded_overlap((other.start, other.end), (seg.start, seg.end), margin))
                .count() as u32;
            prop_assert_eq!(seg.overlaps, expected);
        }
    });
}

/// Property: identity always lands in [0, 100]
#[test]
fn prop_identity_is_bounded() {
    proptest!(|(
        score in -10_000i64..100_000,
        runs in prop::collection::vec(1u64..500, 1..6),
        gaps in prop::collection::vec((0u64..50, 0u64..50), 0..5)
    )| {
        let mut parts: Vec<String> = Vec::new();
        for (i, run) in runs.iter().enumerate() {
            parts.push(run.to_string());
            if let Some(&(a, b)) = gaps.get(i) {
                parts.push(format!("{a}:{b}"));
            }
        }
        let blocks = parse_blocks(&parts.join(",")).unwrap();
        let pct = MetricCalculator::default().identity_pct(score, &blocks);
        prop_assert!((0.0..=100.0).contains(&pct), "identity {} out of range", pct);
    });
}
