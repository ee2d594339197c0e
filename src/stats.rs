//! Statistical building blocks shared by the pipeline stages.
//!
//! Matrices are row-major `&[Vec<f64>]` with one row per observation and one
//! column per instrument. Conventions follow the common Python stack:
//!
//! - returns are simple daily returns,
//! - mean historical return is compounded and annualized,
//! - sample covariance uses `n - 1` and is scaled by the frequency.

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Sample covariance (`n - 1` denominator) of two equal-length series.
pub fn sample_covariance(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n != y.len() || n < 2 {
        return f64::NAN;
    }
    let mean_x = mean(x);
    let mean_y = mean(y);
    x.iter()
        .zip(y)
        .map(|(a, b)| (a - mean_x) * (b - mean_y))
        .sum::<f64>()
        / (n - 1) as f64
}

pub fn sample_variance(x: &[f64]) -> f64 {
    sample_covariance(x, x)
}

/// Pearson correlation coefficient between two slices.
///
/// NaN when either series is constant or the lengths differ.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    if n < 2.0 || x.len() != y.len() {
        return f64::NAN;
    }

    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0_f64;
    let mut var_x = 0.0_f64;
    let mut var_y = 0.0_f64;

    for i in 0..x.len() {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }

    cov / (var_x * var_y).sqrt()
}

/// Compounded annualized return of one return series.
///
/// `prod(1 + r) ^ (frequency / n) - 1`.
pub fn mean_historical_return(returns: &[f64], frequency: f64) -> f64 {
    if returns.is_empty() {
        return f64::NAN;
    }
    let growth = returns.iter().fold(1.0_f64, |acc, r| acc * (1.0 + r));
    growth.powf(frequency / returns.len() as f64) - 1.0
}

// ---------------------------------------------------------------------------
// Matrices
// ---------------------------------------------------------------------------

/// Transpose row-major observations into one vector per column.
pub fn columns(matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let rows = matrix.len();
    let cols = matrix.first().map_or(0, Vec::len);
    let mut out = vec![vec![0.0; rows]; cols];

    for (i, row) in matrix.iter().enumerate() {
        for (j, v) in row.iter().enumerate() {
            out[j][i] = *v;
        }
    }

    out
}

/// Annualized mean historical return per column.
pub fn expected_returns(returns: &[Vec<f64>], frequency: f64) -> Vec<f64> {
    columns(returns)
        .iter()
        .map(|col| mean_historical_return(col, frequency))
        .collect()
}

/// Annualized sample covariance matrix of the columns.
pub fn sample_cov(returns: &[Vec<f64>], frequency: f64) -> Vec<Vec<f64>> {
    let rows = returns.len();
    let cols = returns.first().map_or(0, Vec::len);
    let mut cov = vec![vec![0.0; cols]; cols];
    if rows < 2 {
        return cov;
    }

    let means: Vec<f64> = columns(returns).iter().map(|c| mean(c)).collect();

    for row in returns {
        for i in 0..cols {
            let di = row[i] - means[i];
            for j in i..cols {
                cov[i][j] += di * (row[j] - means[j]);
            }
        }
    }

    let scale = frequency / (rows as f64 - 1.0);
    for i in 0..cols {
        for j in i..cols {
            let v = cov[i][j] * scale;
            cov[i][j] = v;
            cov[j][i] = v;
        }
    }

    cov
}

/// Pearson correlation between every pair of columns.
pub fn correlation_matrix(matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let cols = columns(matrix);
    let n = cols.len();
    let mut corr = vec![vec![0.0; n]; n];
    for i in 0..n {
        corr[i][i] = pearson(&cols[i], &cols[i]);
        for j in (i + 1)..n {
            let c = pearson(&cols[i], &cols[j]);
            corr[i][j] = c;
            corr[j][i] = c;
        }
    }
    corr
}

pub fn mat_vec_mul(matrix: &[Vec<f64>], vec: &[f64]) -> Vec<f64> {
    matrix
        .iter()
        .map(|row| row.iter().zip(vec).map(|(a, b)| a * b).sum::<f64>())
        .collect()
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// `w' Σ w`.
pub fn quadratic_form(matrix: &[Vec<f64>], w: &[f64]) -> f64 {
    dot(w, &mat_vec_mul(matrix, w))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
