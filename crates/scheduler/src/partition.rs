// partition.rs
// 分块器：计算 n 个任务分给 k 个 worker 时的分块边界，并按边界切分序列。
// 纯函数，无状态、无IO。
use crate::error::{Error, Result};
use std::ops::Range;

/// 计算分块边界，返回长度为 n_chunks + 1 的下标序列，首项为 0，末项为 n_items。
///
/// 前 `n_items % n_chunks` 个块各多分一个任务，其余块大小为 `n_items / n_chunks`，
/// 因此任意两块大小之差不超过 1。块数多于任务数时，多出的空块排在末尾。
///
/// ```
/// use scheduler::partition::boundaries;
/// assert_eq!(boundaries(10, 3).unwrap(), vec![0, 4, 7, 10]);
/// assert_eq!(boundaries(10, 4).unwrap(), vec![0, 3, 6, 8, 10]);
/// ```
pub fn boundaries(n_items: usize, n_chunks: usize) -> Result<Vec<usize>> {
    if n_chunks == 0 {
        return Err(Error::ConfigError("分块数必须大于等于 1".to_string()));
    }
    let base = n_items / n_chunks;
    let remainder = n_items % n_chunks;

    let mut bounds = Vec::with_capacity(n_chunks + 1);
    bounds.push(0);
    let mut acc = 0;
    for chunk in 0..n_chunks {
        acc += if chunk < remainder { base + 1 } else { base };
        bounds.push(acc);
    }
    Ok(bounds)
}

/// 以 [start, end) 区间形式返回每个块
pub fn chunk_ranges(n_items: usize, n_chunks: usize) -> Result<Vec<Range<usize>>> {
    let bounds = boundaries(n_items, n_chunks)?;
    Ok(bounds.windows(2).map(|w| w[0]..w[1]).collect())
}

/// 按固定块大小 ceil(len / n_chunks) 切分切片，最后一块可能更短。
///
/// 非空块数不超过 n_chunks，拼接结果与输入完全一致。
///
/// ```
/// use scheduler::partition::split;
/// let items: Vec<i32> = (1..=10).collect();
/// assert_eq!(split(&items, 3).unwrap(), vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8], vec![9, 10]]);
/// ```
pub fn split<T: Clone>(items: &[T], n_chunks: usize) -> Result<Vec<Vec<T>>> {
    if n_chunks == 0 {
        return Err(Error::ConfigError("分块数必须大于等于 1".to_string()));
    }
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let chunk_size = (items.len() + n_chunks - 1) / n_chunks; // 向上取整
    Ok(items.chunks(chunk_size).map(<[T]>::to_vec).collect())
}

/// 按 [`boundaries`] 把序列按所有权切分成 n_chunks 个块（可能含空块），不复制元素
pub fn split_owned<T>(items: Vec<T>, n_chunks: usize) -> Result<Vec<Vec<T>>> {
    let ranges = chunk_ranges(items.len(), n_chunks)?;
    let mut iter = items.into_iter();
    Ok(ranges
        .iter()
        .map(|range| iter.by_ref().take(range.len()).collect())
        .collect())
}
