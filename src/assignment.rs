use munkres::{solve_assignment, Position, WeightMatrix};
use ndarray::prelude::*;

/// Value used for the padding cells that make the matrix square. Every
/// complete assignment uses the same number of padding cells, so any constant
/// keeps the optimum.
const PADDING_COST: f32 = 100000.0;

/// Real costs are clamped to this before solving, keeping munkres arithmetic finite.
const MAX_COST: f32 = 1.0e9;

/// Minimum total cost one-to-one matching between the rows (tracks) and
/// columns (detections) of `costs`. Returns `min(rows, cols)` distinct
/// `(row, col)` pairs. Pairs are not filtered by any threshold.
pub fn solve(costs: ArrayView2<'_, f32>) -> Vec<(usize, usize)> {
    let (rows, cols) = costs.dim();

    if rows == 0 || cols == 0 {
        return Vec::new();
    }

    let n = rows.max(cols);
    let mut mat = WeightMatrix::from_fn(n, |(r, c)| {
        if r < rows && c < cols {
            sanitize(costs[(r, c)])
        } else {
            PADDING_COST
        }
    });

    match solve_assignment(&mut mat) {
        Ok(positions) => {
            let mut pairs: Vec<_> = positions
                .into_iter()
                .filter(|Position { row, column }| *row < rows && *column < cols)
                .map(|Position { row, column }| (row, column))
                .collect();

            pairs.sort_unstable();
            pairs
        }
        // only disallowed weights make munkres fail, and `sanitize` rules
        // those out
        Err(_) => {
            tracing::warn!("assignment of {}x{} matrix could not be solved", rows, cols);

            Vec::new()
        }
    }
}

#[inline]
fn sanitize(cost: f32) -> f32 {
    if cost.is_nan() {
        MAX_COST
    } else {
        cost.clamp(0.0, MAX_COST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total(costs: &Array2<f32>, pairs: &[(usize, usize)]) -> f32 {
        pairs.iter().map(|&(r, c)| costs[(r, c)]).sum()
    }

    fn assert_bijection(pairs: &[(usize, usize)]) {
        let mut rows: Vec<_> = pairs.iter().map(|p| p.0).collect();
        let mut cols: Vec<_> = pairs.iter().map(|p| p.1).collect();
        rows.sort_unstable();
        rows.dedup();
        cols.sort_unstable();
        cols.dedup();
        assert_eq!(rows.len(), pairs.len());
        assert_eq!(cols.len(), pairs.len());
    }

    #[test]
    fn empty_matrix_has_no_pairs() {
        assert!(solve(Array2::<f32>::zeros((0, 3)).view()).is_empty());
        assert!(solve(Array2::<f32>::zeros((2, 0)).view()).is_empty());
    }

    #[test]
    fn square_optimum_beats_greedy() {
        // greedy takes (0, 0) = 1 and is left with (1, 1) = 10
        let costs = array![[1.0f32, 2.0], [2.0, 10.0]];
        let pairs = solve(costs.view());

        assert_eq!(pairs, vec![(0, 1), (1, 0)]);
        assert_eq!(total(&costs, &pairs), 4.0);
    }

    #[test]
    fn more_detections_than_tracks() {
        let costs = array![[0.9f32, 0.1, 0.5], [0.2, 0.3, 0.8]];
        let pairs = solve(costs.view());

        assert_eq!(pairs.len(), 2);
        assert_bijection(&pairs);
        assert_eq!(pairs, vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn more_tracks_than_detections() {
        let costs = array![[0.7f32], [0.1], [0.4]];
        assert_eq!(solve(costs.view()), vec![(1, 0)]);
    }

    #[test]
    fn non_finite_costs_are_tolerated() {
        let costs = array![[f32::INFINITY, 1.0], [0.5, f32::NAN]];
        let pairs = solve(costs.view());

        assert_eq!(pairs, vec![(0, 1), (1, 0)]);
    }
}
