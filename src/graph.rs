/// Best-match graph over the sequences named in a hit stream
///
/// Every sequence, whichever column it appears in, gets one node. A node keeps
/// its single best scoring partner, the set of every partner it was ever
/// aligned to, and the reverse links of the best-match edges pointing at it.
use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};

use crate::error::HitError;
use crate::hit::{HitRecord, Side};

/// How equal scores are resolved when choosing a best partner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    #[default]
    FirstSeen,
    LastSeen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestPartner {
    pub score: i64,
    pub partner: String,
    /// Column this node occupied in the hit that set the best partner
    pub side: Side,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeqNode {
    pub best: Option<BestPartner>,
    pub all_partners: IndexSet<String>,
    /// Names whose best partner is this node, in node order
    pub links: Vec<String>,
}

/// Match cardinality of a single hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// Both sequences only ever matched each other
    Unique,
    /// The given side matched several sequences, none of which matched anything else
    OneToMany(Side),
    ManyToMany,
}

/// One row of the best-match report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestMatchRow {
    pub name1: String,
    pub score: i64,
    pub name2: String,
    /// Best score recorded for `name2`
    pub score2: i64,
    /// Best partner recorded for `name2`
    pub oname1: String,
}

impl BestMatchRow {
    /// The partner's best match points back at this row's sequence
    pub fn is_reciprocal(&self) -> bool {
        self.oname1 == self.name1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BestMatchReport {
    pub rows: Vec<BestMatchRow>,
    pub missing: Vec<HitError>,
}

#[derive(Debug, Clone, Default)]
pub struct MatchGraph {
    nodes: IndexMap<String, SeqNode>,
}

impl MatchGraph {
    /// Build the graph in one pass, then derive the reverse links
    pub fn build(hits: &[HitRecord], tie: TieBreak) -> Self {
        let mut graph = MatchGraph::default();
        for hit in hits {
            graph.observe(&hit.name2, &hit.name1, hit.score, Side::Two, tie);
            graph.observe(&hit.name1, &hit.name2, hit.score, Side::One, tie);
        }
        graph.link();
        debug!("Match graph: {} sequences", graph.nodes.len());
        graph
    }

    fn observe(&mut self, name: &str, partner: &str, score: i64, side: Side, tie: TieBreak) {
        let node = self.nodes.entry(name.to_string()).or_default();
        let replace = match &node.best {
            None => true,
            Some(best) => match tie {
                TieBreak::FirstSeen => score > best.score,
                TieBreak::LastSeen => score >= best.score,
            },
        };
        if replace {
            node.best = Some(BestPartner {
                score,
                partner: partner.to_string(),
                side,
            });
        }
        node.all_partners.insert(partner.to_string());
    }

    fn link(&mut self) {
        let edges: Vec<(String, String)> = self
            .nodes
            .iter()
            .filter_map(|(name, node)| {
                node.best
                    .as_ref()
                    .map(|best| (best.partner.clone(), name.clone()))
            })
            .collect();
        for (target, source) in edges {
            if let Some(node) = self.nodes.get_mut(&target) {
                node.links.push(source);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, name: &str) -> Option<&SeqNode> {
        self.nodes.get(name)
    }

    /// Sequence names in first-seen order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn partners(&self, name: &str) -> Option<&IndexSet<String>> {
        self.nodes.get(name).map(|n| &n.all_partners)
    }

    /// Full adjacency, every partner regardless of score
    pub fn adjacency(&self) -> IndexMap<&str, Vec<&str>> {
        self.nodes
            .iter()
            .map(|(name, node)| {
                (
                    name.as_str(),
                    node.all_partners.iter().map(|p| p.as_str()).collect(),
                )
            })
            .collect()
    }

    /// For every side-1 best edge, pair it with the partner's own best edge
    pub fn best_match_report(&self) -> BestMatchReport {
        let mut report = BestMatchReport::default();
        for (name, node) in &self.nodes {
            let Some(best) = &node.best else { continue };
            if best.side != Side::One {
                continue;
            }
            let back = self
                .nodes
                .get(&best.partner)
                .and_then(|p| p.best.as_ref())
                .filter(|pb| pb.side == Side::Two);
            match back {
                Some(pb) => report.rows.push(BestMatchRow {
                    name1: name.clone(),
                    score: best.score,
                    name2: best.partner.clone(),
                    score2: pb.score,
                    oname1: pb.partner.clone(),
                }),
                None => {
                    let e = HitError::MissingPartner {
                        name: name.clone(),
                        partner: best.partner.clone(),
                    };
                    warn!("{e}");
                    report.missing.push(e);
                }
            }
        }
        report
    }

    /// Classify a hit from the partner sets of both of its sequences
    pub fn classify(&self, hit: &HitRecord) -> Cardinality {
        let (Some(p1), Some(p2)) = (self.partners(&hit.name1), self.partners(&hit.name2)) else {
            return Cardinality::ManyToMany;
        };

        if p1.len() == 1 && p2.len() == 1 && p1.contains(&hit.name2) {
            return Cardinality::Unique;
        }
        if p1.len() > 1 && p2.len() > 1 {
            return Cardinality::ManyToMany;
        }

        let (side, fanned) = if p1.len() > 1 {
            (Side::One, p1)
        } else if p2.len() > 1 {
            (Side::Two, p2)
        } else {
            return Cardinality::ManyToMany;
        };

        let spread = fanned
            .iter()
            .any(|other| self.partners(other).is_some_and(|p| p.len() > 1));
        if spread {
            Cardinality::ManyToMany
        } else {
            Cardinality::OneToMany(side)
        }
    }

    pub fn classify_all(&self, hits: &[HitRecord]) -> Vec<Cardinality> {
        hits.iter().map(|h| self.classify(h)).collect()
    }
}
