//! Ridge-regularized linear regression on standardized features

/// Fitted linear model
#[derive(Debug, Clone)]
pub struct RidgeRegression {
    means: Vec<f64>,
    scales: Vec<f64>,
    weights: Vec<f64>,
    intercept: f64,
}

impl RidgeRegression {
    /// Fit on rows `x` against targets `y` with penalty `lambda`
    ///
    /// Constant columns get zero weight. Returns `None` for empty, ragged or
    /// non-finite input, or if the normal equations cannot be solved.
    pub fn fit(x: &[Vec<f64>], y: &[f64], lambda: f64) -> Option<Self> {
        let n = x.len();
        if n == 0 || n != y.len() {
            return None;
        }
        let p = x[0].len();
        if x.iter().any(|row| row.len() != p)
            || x.iter().flatten().chain(y).any(|v| !v.is_finite())
        {
            return None;
        }

        let nf = n as f64;
        let means: Vec<f64> = (0..p)
            .map(|j| x.iter().map(|row| row[j]).sum::<f64>() / nf)
            .collect();
        let scales: Vec<f64> = (0..p)
            .map(|j| {
                let var = x.iter().map(|row| (row[j] - means[j]).powi(2)).sum::<f64>() / nf;
                let sd = var.sqrt();
                if sd > 1e-12 { sd } else { 0.0 }
            })
            .collect();

        let z: Vec<Vec<f64>> = x
            .iter()
            .map(|row| standardize(row, &means, &scales))
            .collect();
        let y_mean = y.iter().sum::<f64>() / nf;

        // (ZᵀZ + λI) w = Zᵀ(y - ȳ)
        let mut a = vec![vec![0.0; p]; p];
        let mut b = vec![0.0; p];
        for (row, target) in z.iter().zip(y) {
            let centered = target - y_mean;
            for i in 0..p {
                b[i] += row[i] * centered;
                for j in 0..p {
                    a[i][j] += row[i] * row[j];
                }
            }
        }
        for (i, row) in a.iter_mut().enumerate() {
            row[i] += lambda;
        }

        let weights = solve(a, b)?;

        Some(Self {
            means,
            scales,
            weights,
            intercept: y_mean,
        })
    }

    /// Predict the target for one feature row
    pub fn predict(&self, row: &[f64]) -> f64 {
        standardize(row, &self.means, &self.scales)
            .iter()
            .zip(&self.weights)
            .map(|(z, w)| z * w)
            .sum::<f64>()
            + self.intercept
    }
}

fn standardize(row: &[f64], means: &[f64], scales: &[f64]) -> Vec<f64> {
    row.iter()
        .zip(means.iter().zip(scales))
        .map(|(v, (m, s))| if *s == 0.0 { 0.0 } else { (v - m) / s })
        .collect()
}

/// Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}
