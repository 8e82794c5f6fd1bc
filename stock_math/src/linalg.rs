//! Small dense matrices
//!
//! Only what the regression solver needs: construction, products and a
//! pivoted Gauss-Jordan inverse. Matrices here are a handful of rows wide,
//! so everything is stored row-major in a flat `Vec<f64>`.

use crate::{MathError, Result};
use serde::Serialize;

/// Pivots smaller than this (relative to the largest entry) count as zero.
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Row-major dense matrix
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Create a matrix filled with zeros
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Create an identity matrix of size `n`
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.data[i * n + i] = 1.0;
        }
        m
    }

    /// Create a diagonal matrix from the given entries
    pub fn diagonal(entries: &[f64]) -> Self {
        let n = entries.len();
        let mut m = Self::zeros(n, n);
        for (i, &v) in entries.iter().enumerate() {
            m.data[i * n + i] = v;
        }
        m
    }

    /// Build a matrix from rows of equal length
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != cols) {
            return Err(MathError::InvalidInput(
                "All matrix rows must have the same length".to_string(),
            ));
        }

        Ok(Self {
            rows: rows.len(),
            cols,
            data: rows.iter().flatten().copied().collect(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Entry at (`row`, `col`)
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    /// Borrow one row
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Matrix-vector product
    pub fn mul_vec(&self, v: &[f64]) -> Result<Vec<f64>> {
        if v.len() != self.cols {
            return Err(MathError::InvalidInput(format!(
                "Vector length ({}) doesn't match matrix columns ({})",
                v.len(),
                self.cols
            )));
        }

        Ok((0..self.rows)
            .map(|r| self.row(r).iter().zip(v).map(|(a, b)| a * b).sum())
            .collect())
    }

    /// Quadratic form `vᵀ M v`
    pub fn quadratic_form(&self, v: &[f64]) -> Result<f64> {
        let mv = self.mul_vec(v)?;
        if mv.len() != v.len() {
            return Err(MathError::InvalidInput(
                "Quadratic form needs a square matrix".to_string(),
            ));
        }
        Ok(v.iter().zip(&mv).map(|(a, b)| a * b).sum())
    }

    /// Multiply every entry by `factor`
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|v| v * factor).collect(),
        }
    }

    /// Invert a square matrix with partial pivoting.
    ///
    /// The matrix is equilibrated by its diagonal before elimination, so
    /// normal equations built from columns of very different magnitude
    /// (an intercept next to a time axis in minutes) stay well conditioned.
    pub fn inverse(&self) -> Result<Self> {
        if !self.is_square() {
            return Err(MathError::InvalidInput(format!(
                "Cannot invert a {}x{} matrix",
                self.rows, self.cols
            )));
        }
        let n = self.rows;
        if n == 0 {
            return Ok(self.clone());
        }

        let scaling: Vec<f64> = (0..n)
            .map(|i| {
                let d = self.get(i, i).abs();
                if d > 0.0 && d.is_finite() {
                    1.0 / d.sqrt()
                } else {
                    1.0
                }
            })
            .collect();

        let mut a: Vec<f64> = (0..n * n)
            .map(|k| self.data[k] * scaling[k / n] * scaling[k % n])
            .collect();
        let mut inv = Self::identity(n).data;

        let largest = a.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        if largest == 0.0 || !largest.is_finite() {
            return Err(MathError::SingularMatrix);
        }

        for col in 0..n {
            let mut pivot_row = col;
            for r in col + 1..n {
                if a[r * n + col].abs() > a[pivot_row * n + col].abs() {
                    pivot_row = r;
                }
            }

            if a[pivot_row * n + col].abs() <= SINGULAR_TOLERANCE * largest {
                return Err(MathError::SingularMatrix);
            }

            if pivot_row != col {
                for k in 0..n {
                    a.swap(col * n + k, pivot_row * n + k);
                    inv.swap(col * n + k, pivot_row * n + k);
                }
            }

            let pivot = a[col * n + col];
            for k in 0..n {
                a[col * n + k] /= pivot;
                inv[col * n + k] /= pivot;
            }

            for r in 0..n {
                if r == col {
                    continue;
                }
                let factor = a[r * n + col];
                if factor == 0.0 {
                    continue;
                }
                for k in 0..n {
                    a[r * n + k] -= factor * a[col * n + k];
                    inv[r * n + k] -= factor * inv[col * n + k];
                }
            }
        }

        // Undo the equilibration: A⁻¹ = D (DAD)⁻¹ D
        let data = (0..n * n)
            .map(|k| inv[k] * scaling[k / n] * scaling[k % n])
            .collect();

        Ok(Self {
            rows: n,
            cols: n,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_of_2x2() {
        let m = Matrix::from_rows(&[vec![4.0, 7.0], vec![2.0, 6.0]]).unwrap();
        let inv = m.inverse().unwrap();

        assert!((inv.get(0, 0) - 0.6).abs() < 1e-12);
        assert!((inv.get(0, 1) + 0.7).abs() < 1e-12);
        assert!((inv.get(1, 0) + 0.2).abs() < 1e-12);
        assert!((inv.get(1, 1) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_inverse_needs_pivoting() {
        let m = Matrix::from_rows(&[
            vec![0.0, 1.0, 0.0],
            vec![1.0, 0.0, 0.0],
            vec![0.0, 0.0, 2.0],
        ])
        .unwrap();
        let inv = m.inverse().unwrap();

        let product = inv.mul_vec(&m.mul_vec(&[1.0, 2.0, 3.0]).unwrap()).unwrap();
        for (got, want) in product.iter().zip([1.0, 2.0, 3.0]) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn test_singular_matrix() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![2.0, 4.0]]).unwrap();
        assert_eq!(m.inverse(), Err(MathError::SingularMatrix));
    }

    #[test]
    fn test_badly_scaled_normal_equations() {
        // Intercept column next to a time axis measured in minutes
        let m = Matrix::from_rows(&[vec![1.0, 7200.0], vec![7200.0, 69_120_000.0]]).unwrap();
        let inv = m.inverse().unwrap();
        let identity = [
            inv.mul_vec(&[m.get(0, 0), m.get(1, 0)]).unwrap(),
            inv.mul_vec(&[m.get(0, 1), m.get(1, 1)]).unwrap(),
        ];

        assert!((identity[0][0] - 1.0).abs() < 1e-9);
        assert!(identity[0][1].abs() < 1e-9);
        assert!(identity[1][0].abs() < 1e-9);
        assert!((identity[1][1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_quadratic_form() {
        let m = Matrix::diagonal(&[2.0, 3.0]);
        assert_eq!(m.quadratic_form(&[1.0, 2.0]).unwrap(), 14.0);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        assert!(Matrix::from_rows(&[vec![1.0], vec![1.0, 2.0]]).is_err());
    }
}
