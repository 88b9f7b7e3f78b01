//! Representative name selection.

use strsim::levenshtein;

/// Picks at most `limit` names that span the variation in the set.
///
/// The first pick is the centroid: the name with the smallest summed edit
/// distance to all others. Every further pick maximizes the summed edit
/// distance to the names already picked, so spelling variants far from the
/// current selection are preferred over near-duplicates.
pub fn pick_names(names: &[String], limit: usize) -> Vec<String> {
    if names.len() <= 1 || limit == 0 {
        return names.iter().take(limit).cloned().collect();
    }

    let mut remaining: Vec<&String> = names.iter().collect();
    let centroid_idx = centroid(&remaining);
    let mut picked: Vec<String> = vec![remaining.remove(centroid_idx).clone()];

    while picked.len() < limit && !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_sum = 0usize;
        for (idx, candidate) in remaining.iter().enumerate() {
            let sum: usize = picked.iter().map(|p| levenshtein(candidate, p)).sum();
            if sum > best_sum {
                best_sum = sum;
                best_idx = idx;
            }
        }
        picked.push(remaining.remove(best_idx).clone());
    }
    picked
}

/// Index of the name most similar to the whole set.
fn centroid(names: &[&String]) -> usize {
    let mut best_idx = 0;
    let mut best_sum = usize::MAX;
    for (idx, name) in names.iter().enumerate() {
        let sum: usize = names
            .iter()
            .enumerate()
            .filter(|(other_idx, _)| *other_idx != idx)
            .map(|(_, other)| levenshtein(name, other))
            .sum();
        if sum < best_sum {
            best_sum = sum;
            best_idx = idx;
        }
    }
    best_idx
}
