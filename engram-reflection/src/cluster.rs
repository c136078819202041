//! Greedy clustering by sector and token-count cosine.
//!
//! Memories cluster only with peers in the same primary sector whose
//! term-frequency vectors are close. Greedy single-pass: the first
//! unassigned memory anchors a cluster and absorbs everything similar
//! enough. No density estimation, no iteration to convergence.

use std::collections::HashMap;

use engram_core::models::MemoryRecord;

/// Indices into the input slice, one vec per cluster.
pub fn greedy_cluster(memories: &[MemoryRecord], min_similarity: f64) -> Vec<Vec<usize>> {
    let tf: Vec<HashMap<String, f64>> = memories
        .iter()
        .map(|m| term_frequencies(&m.content))
        .collect();

    let mut assigned = vec![false; memories.len()];
    let mut clusters = Vec::new();

    for anchor in 0..memories.len() {
        if assigned[anchor] {
            continue;
        }
        assigned[anchor] = true;
        let mut cluster = vec![anchor];

        for candidate in (anchor + 1)..memories.len() {
            if assigned[candidate] {
                continue;
            }
            if memories[candidate].primary_sector != memories[anchor].primary_sector {
                continue;
            }
            if sparse_cosine(&tf[anchor], &tf[candidate]) >= min_similarity {
                assigned[candidate] = true;
                cluster.push(candidate);
            }
        }
        clusters.push(cluster);
    }
    clusters
}

/// Token-count vector of a text.
pub fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut tf = HashMap::new();
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
    {
        *tf.entry(token.to_string()).or_insert(0.0) += 1.0;
    }
    tf
}

/// Cosine over sparse token-count maps.
pub fn sparse_cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .filter_map(|(term, x)| b.get(term).map(|y| x * y))
        .sum();
    let na: f64 = a.values().map(|x| x * x).sum::<f64>().sqrt();
    let nb: f64 = b.values().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_core::sector::Sector;

    fn mem(content: &str, sector: Sector) -> MemoryRecord {
        let mut m = MemoryRecord::new(content, Some("alice".into()));
        m.primary_sector = sector;
        m
    }

    #[test]
    fn near_duplicates_cluster_together() {
        let memories = vec![
            mem("standup notes monday deploy blocked", Sector::Episodic),
            mem("standup notes monday deploy blocked again", Sector::Episodic),
            mem("grocery list bananas coffee", Sector::Episodic),
        ];
        let clusters = greedy_cluster(&memories, 0.8);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0], vec![0, 1]);
        assert_eq!(clusters[1], vec![2]);
    }

    #[test]
    fn different_sectors_never_cluster() {
        let memories = vec![
            mem("identical words here", Sector::Episodic),
            mem("identical words here", Sector::Emotional),
        ];
        let clusters = greedy_cluster(&memories, 0.8);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn sparse_cosine_basics() {
        let a = term_frequencies("apple banana apple");
        let b = term_frequencies("apple banana apple");
        assert!((sparse_cosine(&a, &b) - 1.0).abs() < 1e-9);

        let c = term_frequencies("completely unrelated words");
        assert_eq!(sparse_cosine(&a, &c), 0.0);
        assert_eq!(sparse_cosine(&a, &HashMap::new()), 0.0);
    }
}
