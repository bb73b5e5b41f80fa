//! PBQP代价向量与代价矩阵
//!
//! 代价都是有限精度浮点数, INF 表示不合法的选择.
//! 任何和 INF 相加的结果仍然是 INF, 有限值相加的结果会被截断在
//! [f32::MIN, f32::MAX] 之内, 所以不会出现 -INF 或者 NaN.

use std::ops::{Index, IndexMut};

pub type PBQPNum = f32;

pub const INF: PBQPNum = PBQPNum::INFINITY;

/// 代价加法
#[inline]
pub fn add_cost(a: PBQPNum, b: PBQPNum) -> PBQPNum {
    if a == INF || b == INF {
        return INF;
    }
    let sum = a + b;
    if sum == INF {
        PBQPNum::MAX
    } else if sum == -INF {
        PBQPNum::MIN
    } else {
        sum
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Vector {
    data: Vec<PBQPNum>,
}

impl Vector {
    pub fn new(len: usize, fill: PBQPNum) -> Vector {
        Vector {
            data: vec![fill; len],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 最小元素的下标,相等时取下标小的
    pub fn min_index(&self) -> usize {
        assert!(!self.data.is_empty(), "min_index of empty cost vector");
        let mut out = 0;
        for (i, v) in self.data.iter().enumerate() {
            if *v < self.data[out] {
                out = i;
            }
        }
        out
    }

    pub fn add_assign(&mut self, other: &Vector) {
        assert_eq!(self.len(), other.len(), "cost vector length mismatch");
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a = add_cost(*a, *b);
        }
    }

    pub fn is_all_inf(&self) -> bool {
        self.data.iter().all(|v| *v == INF)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PBQPNum> {
        self.data.iter()
    }
}

impl From<Vec<PBQPNum>> for Vector {
    fn from(data: Vec<PBQPNum>) -> Self {
        Vector { data }
    }
}

impl Index<usize> for Vector {
    type Output = PBQPNum;
    fn index(&self, index: usize) -> &PBQPNum {
        &self.data[index]
    }
}

impl IndexMut<usize> for Vector {
    fn index_mut(&mut self, index: usize) -> &mut PBQPNum {
        &mut self.data[index]
    }
}

/// 行优先存储的代价矩阵
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<PBQPNum>,
}

impl Matrix {
    pub fn new(rows: usize, cols: usize, fill: PBQPNum) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![fill; rows * cols],
        }
    }

    pub fn from_rows(rows: Vec<Vec<PBQPNum>>) -> Matrix {
        let n_rows = rows.len();
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for row in rows {
            assert_eq!(row.len(), n_cols, "ragged cost matrix");
            data.extend(row);
        }
        Matrix {
            rows: n_rows,
            cols: n_cols,
            data,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> PBQPNum {
        assert!(row < self.rows && col < self.cols, "matrix index out of range");
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, v: PBQPNum) {
        assert!(row < self.rows && col < self.cols, "matrix index out of range");
        self.data[row * self.cols + col] = v;
    }

    pub fn row(&self, row: usize) -> Vector {
        Vector::from(self.data[row * self.cols..(row + 1) * self.cols].to_vec())
    }

    pub fn col(&self, col: usize) -> Vector {
        Vector::from((0..self.rows).map(|r| self.get(r, col)).collect::<Vec<PBQPNum>>())
    }

    pub fn transpose(&self) -> Matrix {
        let mut out = Matrix::new(self.cols, self.rows, 0.0);
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.set(c, r, self.get(r, c));
            }
        }
        out
    }

    pub fn add_assign(&mut self, other: &Matrix) {
        assert!(
            self.rows == other.rows && self.cols == other.cols,
            "cost matrix shape mismatch: {}x{} vs {}x{}",
            self.rows,
            self.cols,
            other.rows,
            other.cols
        );
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a = add_cost(*a, *b);
        }
    }

    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|v| *v == 0.0)
    }
}
