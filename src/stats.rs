use std::collections::HashMap;

/// Percentile ranks in [0, 1], ascending by value.
///
/// Tied values share the average position of their group. A single entry
/// ranks 1.0, an empty input yields an empty map.
pub fn percentile_ranks<'a>(values: &[(&'a str, f64)]) -> HashMap<&'a str, f64> {
    let mut ranks = HashMap::with_capacity(values.len());
    if values.is_empty() {
        return ranks;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.1.total_cmp(&b.1));

    let n = sorted.len();
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && sorted[j + 1].1 == sorted[i].1 {
            j += 1;
        }

        let avg_rank = (i + j) as f64 / 2.0;
        let pct = if n == 1 { 1.0 } else { avg_rank / (n - 1) as f64 };
        for (id, _) in &sorted[i..=j] {
            ranks.insert(*id, pct);
        }
        i = j + 1;
    }

    ranks
}

/// Mean of the values, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().sum();
    Some(sum / values.len() as f64)
}

/// Median of the values, `None` for an empty slice
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
