//! Sentence similarity graph and rank propagation
//!
//! Nodes are sentences, edge weights are bag-of-words cosine similarities.
//! Propagation is a pure function from one rank vector to the next, so the
//! convergence loop only compares consecutive vectors.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be",
        "been", "but", "by", "can", "could", "did", "do", "does", "for", "from", "get", "got",
        "had", "has", "have", "he", "her", "here", "him", "his", "how", "i", "if", "in", "into",
        "is", "it", "its", "just", "me", "my", "no", "not", "now", "of", "oh", "ok", "okay",
        "on", "or", "our", "out", "she", "so", "that", "the", "their", "them", "then", "there",
        "they", "this", "to", "up", "us", "was", "we", "well", "were", "what", "when", "where",
        "who", "why", "will", "with", "would", "yeah", "yes", "you", "your",
    ]
    .into_iter()
    .collect()
});

/// Sparse term-frequency vector sorted by term id
type TermVector = Vec<(usize, f64)>;

/// Undirected weighted sentence graph
#[derive(Debug, Clone)]
pub struct SentenceGraph {
    /// Neighbors of each node with edge weight
    adjacency: Vec<Vec<(usize, f64)>>,
    /// Sum of edge weights leaving each node
    out_weight: Vec<f64>,
}

/// Result of rank propagation
#[derive(Debug, Clone)]
pub struct RankOutcome {
    pub ranks: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

impl SentenceGraph {
    /// Build the graph, omitting edges lighter than `similarity_threshold`
    pub fn build(sentences: &[String], similarity_threshold: f64) -> Self {
        let vectors = term_vectors(sentences);
        let norms: Vec<f64> = vectors
            .iter()
            .map(|v| v.iter().map(|(_, tf)| tf * tf).sum::<f64>().sqrt())
            .collect();

        let n = sentences.len();
        let mut adjacency = vec![Vec::new(); n];
        for i in 0..n {
            if norms[i] == 0.0 {
                continue;
            }
            for j in (i + 1)..n {
                if norms[j] == 0.0 {
                    continue;
                }
                let weight = sparse_dot(&vectors[i], &vectors[j]) / (norms[i] * norms[j]);
                if weight > 0.0 && weight >= similarity_threshold {
                    adjacency[i].push((j, weight));
                    adjacency[j].push((i, weight));
                }
            }
        }

        let out_weight = adjacency
            .iter()
            .map(|edges| edges.iter().map(|(_, w)| w).sum())
            .collect();

        Self {
            adjacency,
            out_weight,
        }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// One propagation sweep: `(1 - d) + d * Σ w(i,j) * rank[j] / out(j)`
    pub fn propagate(&self, ranks: &[f64], damping: f64) -> Vec<f64> {
        self.adjacency
            .iter()
            .map(|edges| {
                let inflow: f64 = edges
                    .iter()
                    .filter(|(j, _)| self.out_weight[*j] > 0.0)
                    .map(|(j, w)| w * ranks[*j] / self.out_weight[*j])
                    .sum();
                (1.0 - damping) + damping * inflow
            })
            .collect()
    }

    /// Iterate from all-ones until the largest per-node change drops below
    /// `convergence_threshold` or `max_iterations` sweeps have run
    pub fn rank(&self, damping: f64, convergence_threshold: f64, max_iterations: usize) -> RankOutcome {
        let mut ranks = vec![1.0; self.node_count()];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < max_iterations {
            let next = self.propagate(&ranks, damping);
            iterations += 1;

            let delta = ranks
                .iter()
                .zip(next.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            ranks = next;

            if delta < convergence_threshold {
                converged = true;
                break;
            }
        }

        RankOutcome {
            ranks,
            iterations,
            converged,
        }
    }
}

/// Lowercased content words of a sentence
pub fn tokenize(sentence: &str) -> impl Iterator<Item = String> + '_ {
    sentence
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| w.chars().count() > 1 && !STOPWORDS.contains(w.as_str()))
}

fn term_vectors(sentences: &[String]) -> Vec<TermVector> {
    let mut vocabulary: HashMap<String, usize> = HashMap::new();

    sentences
        .iter()
        .map(|sentence| {
            let mut counts: HashMap<usize, f64> = HashMap::new();
            for word in tokenize(sentence) {
                let next_id = vocabulary.len();
                let id = *vocabulary.entry(word).or_insert(next_id);
                *counts.entry(id).or_insert(0.0) += 1.0;
            }
            let mut vector: TermVector = counts.into_iter().collect();
            vector.sort_unstable_by_key(|(id, _)| *id);
            vector
        })
        .collect()
}

fn sparse_dot(a: &TermVector, b: &TermVector) -> f64 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn stopwords_and_case_are_ignored() {
        let words: Vec<String> = tokenize("The Captain and THE captain's ship!").collect();
        assert_eq!(words, vec!["captain", "captain's", "ship"]);
    }

    #[test]
    fn threshold_prunes_weak_edges() {
        let s = sentences(&[
            "reactor core breach detected",
            "reactor core temperature rising",
            "lunch menu features soup",
        ]);
        let graph = SentenceGraph::build(&s, 0.1);
        assert_eq!(graph.edge_count(), 1);

        let strict = SentenceGraph::build(&s, 0.9);
        assert_eq!(strict.edge_count(), 0);
    }

    #[test]
    fn isolated_nodes_settle_at_one_minus_damping() {
        let s = sentences(&["alpha beta gamma", "delta epsilon zeta"]);
        let graph = SentenceGraph::build(&s, 0.1);
        let outcome = graph.rank(0.85, 1e-6, 100);
        assert!(outcome.converged);
        for r in outcome.ranks {
            assert!((r - 0.15).abs() < 1e-9);
        }
    }

    #[test]
    fn propagate_is_pure() {
        let s = sentences(&["red ship sails", "red ship sinks", "blue ship sails"]);
        let graph = SentenceGraph::build(&s, 0.0);
        let ranks = vec![1.0; 3];
        let a = graph.propagate(&ranks, 0.85);
        let b = graph.propagate(&ranks, 0.85);
        assert_eq!(a, b);
        assert_eq!(ranks, vec![1.0; 3]);
    }

    #[test]
    fn central_sentence_ranks_highest() {
        let s = sentences(&[
            "detective finds evidence warehouse",
            "detective questions suspect warehouse",
            "evidence points suspect detective",
            "weather nice today",
        ]);
        let graph = SentenceGraph::build(&s, 0.1);
        let outcome = graph.rank(0.85, 1e-4, 100);
        let top = outcome
            .ranks
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_ne!(top, 3);
        assert!(outcome.ranks[3] < outcome.ranks[0]);
    }

    #[test]
    fn max_iterations_caps_sweeps() {
        let s = sentences(&["red ship sails", "red ship sinks", "blue ship sails"]);
        let graph = SentenceGraph::build(&s, 0.0);
        let outcome = graph.rank(0.85, 0.0, 3);
        assert_eq!(outcome.iterations, 3);
        assert!(!outcome.converged);
    }
}
