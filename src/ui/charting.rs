/// Points `(attempt number, score)` for the score history chart, oldest first
pub fn score_points(scores: &[u8]) -> Vec<(f64, f64)> {
    scores
        .iter()
        .enumerate()
        .map(|(i, &s)| ((i + 1) as f64, f64::from(s)))
        .collect()
}

/// X bound (attempt count) for the score history chart; never below 1
pub fn compute_x_bound(scores: &[u8]) -> f64 {
    (scores.len() as f64).max(1.0)
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}
