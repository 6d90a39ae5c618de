//! Small closed-form statistics shared by the adaptive timeout and the
//! expression proposers. A full solver is overkill for a straight line.

/// Mean of a sample; `None` for an empty one.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Least-squares line `y = slope * x + intercept` over paired samples.
///
/// Returns `None` for fewer than two points or a degenerate (constant-x)
/// sample, where the slope is undefined.
pub fn least_squares_line(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let sum_xx: f64 = points.iter().map(|(x, _)| x * x).sum();
    let sum_xy: f64 = points.iter().map(|(x, y)| x * y).sum();

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator.abs() < f64::EPSILON {
        return None;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;
    Some((slope, intercept))
}

/// Least-squares line over equally spaced x-coordinates `0, 1, .., n-1`.
pub fn least_squares_over_index(values: &[f64]) -> Option<(f64, f64)> {
    let points: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .map(|(i, &y)| (i as f64, y))
        .collect();
    least_squares_line(&points)
}
