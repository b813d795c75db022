use num::Num;
use serde::{Deserialize, Serialize};

/// Sparse vector that never stores zero elements.
/// Ids and values are kept as two parallel arrays (SoA).
///
/// Invariants:
/// - `inds` is strictly ascending (no duplicate ids)
/// - no stored value equals zero
/// - `inds.len() == vals.len()`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVec<N>
where
    N: Num + Copy,
{
    inds: Vec<u32>,
    vals: Vec<N>,
}

impl<N> Default for SparseVec<N>
where
    N: Num + Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<N> SparseVec<N>
where
    N: Num + Copy,
{
    #[inline]
    pub fn new() -> Self {
        SparseVec {
            inds: Vec::new(),
            vals: Vec::new(),
        }
    }

    /// Build from parallel id/value arrays in any order.
    /// Duplicate ids are summed, zero results are dropped; surplus entries of
    /// the longer array are ignored.
    pub fn from_unsorted(inds: Vec<u32>, vals: Vec<N>) -> Self {
        Self::from_pairs(inds.into_iter().zip(vals))
    }

    /// Build from `(id, value)` pairs in any order.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u32, N)>,
    {
        let mut pairs: Vec<(u32, N)> = pairs.into_iter().collect();
        // stable, so duplicates are summed in input order
        pairs.sort_by_key(|&(idx, _)| idx);

        let mut out = SparseVec {
            inds: Vec::with_capacity(pairs.len()),
            vals: Vec::with_capacity(pairs.len()),
        };
        for (idx, val) in pairs {
            match out.inds.last() {
                Some(&last) if last == idx => {
                    if let Some(acc) = out.vals.last_mut() {
                        *acc = *acc + val;
                    }
                }
                _ => {
                    out.inds.push(idx);
                    out.vals.push(val);
                }
            }
        }
        out.retain_non_zero();
        out
    }

    fn retain_non_zero(&mut self) {
        let zero = N::zero();
        let mut keep = 0;
        for i in 0..self.inds.len() {
            if self.vals[i] != zero {
                self.inds[keep] = self.inds[i];
                self.vals[keep] = self.vals[i];
                keep += 1;
            }
        }
        self.inds.truncate(keep);
        self.vals.truncate(keep);
    }

    /// number of stored (non-zero) entries
    #[inline]
    pub fn nnz(&self) -> usize {
        self.inds.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inds.is_empty()
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.inds
    }

    #[inline]
    pub fn values(&self) -> &[N] {
        &self.vals
    }

    /// Value at `index`, zero when absent.
    #[inline]
    pub fn get(&self, index: u32) -> N {
        match self.inds.binary_search(&index) {
            Ok(pos) => self.vals[pos],
            Err(_) => N::zero(),
        }
    }

    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (u32, N)> + '_ {
        self.inds.iter().copied().zip(self.vals.iter().copied())
    }

    /// Largest stored id, if any.
    #[inline]
    pub fn max_index(&self) -> Option<u32> {
        self.inds.last().copied()
    }

    /// Map every stored value, dropping entries that map to zero.
    pub fn map_values<M, F>(&self, mut f: F) -> SparseVec<M>
    where
        M: Num + Copy,
        F: FnMut(u32, N) -> M,
    {
        let mut out = SparseVec {
            inds: Vec::with_capacity(self.nnz()),
            vals: Vec::with_capacity(self.nnz()),
        };
        for (idx, val) in self.iter() {
            let mapped = f(idx, val);
            if mapped != M::zero() {
                out.inds.push(idx);
                out.vals.push(mapped);
            }
        }
        out
    }
}

impl<N> SparseVec<N>
where
    N: Num + Copy + Into<f64>,
{
    pub fn norm_l2(&self) -> f64 {
        self.vals
            .iter()
            .map(|&v| {
                let v: f64 = v.into();
                v * v
            })
            .sum::<f64>()
            .sqrt()
    }

}
