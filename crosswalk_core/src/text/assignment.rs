//! Rectangular maximum-weight bipartite assignment.
//!
//! Solves the linear assignment problem over a dense weight matrix using the
//! Hungarian algorithm in its potentials formulation. Exactly
//! `min(rows, cols)` pairs are produced and the total weight is maximal, so
//! no two rows ever compete for the same best column — the guarantee the
//! similarity matching relies on instead of greedy nearest-neighbor picking.

/// Return the optimal one-to-one pairing `(row, col)` maximizing total
/// weight, sorted by row index. Empty input yields an empty pairing.
pub fn max_weight_assignment(weights: &[Vec<f64>]) -> Vec<(usize, usize)> {
    if weights.is_empty() || weights[0].is_empty() {
        return Vec::new();
    }

    let rows = weights.len();
    let cols = weights[0].len();

    // The solver requires rows <= cols; transpose and swap back otherwise.
    if rows > cols {
        let transposed: Vec<Vec<f64>> = (0..cols)
            .map(|c| (0..rows).map(|r| weights[r][c]).collect())
            .collect();
        let mut pairs: Vec<(usize, usize)> = solve_min(&negate(&transposed))
            .into_iter()
            .map(|(r, c)| (c, r))
            .collect();
        pairs.sort_unstable();
        return pairs;
    }

    solve_min(&negate(weights))
}

fn negate(weights: &[Vec<f64>]) -> Vec<Vec<f64>> {
    weights
        .iter()
        .map(|row| row.iter().map(|w| -w).collect())
        .collect()
}

/// Minimum-cost assignment for an `n x m` matrix with `n <= m`, 1-indexed
/// potentials over rows (`u`) and columns (`v`).
fn solve_min(cost: &[Vec<f64>]) -> Vec<(usize, usize)> {
    let n = cost.len();
    let m = cost[0].len();
    debug_assert!(n <= m);

    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; m + 1];
    // p[j]: row currently assigned to column j (0 = unassigned)
    let mut p = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;
            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let cur = cost[i0 - 1][j - 1] - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            for j in 0..=m {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        // Unwind the augmenting path.
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut pairs: Vec<(usize, usize)> = (1..=m)
        .filter(|&j| p[j] != 0)
        .map(|j| (p[j] - 1, j - 1))
        .collect();
    pairs.sort_unstable();
    pairs
}
