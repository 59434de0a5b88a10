//! 连续性判定与默认步长推导。
//!
//! # 判定规则（What）
//! - 任一维长度为 0 的缓冲不含元素，视为同时行优先、列优先连续；
//! - 长度为 1 的维度不参与步长比对：该维上从不发生跨步，任意步长都不会留下空洞；
//! - 其余维度自内向外（行优先为最后一维起，列优先为第一维起）要求步长恰好等于
//!   “元素大小 × 已遍历维度长度之积”。

use alloc::vec::Vec;

/// 默认步长推导所依据的内存顺序。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MemoryOrder {
    /// 最后一维变化最快（C 序）。
    #[default]
    RowMajor,
    /// 第一维变化最快（Fortran 序）。
    ColumnMajor,
}

/// 判断 `shape`/`strides` 是否构成行优先连续布局。
pub fn is_row_major(shape: &[usize], strides: &[isize], item_size: usize) -> bool {
    dense_in_order(shape.iter().zip(strides).rev(), shape, item_size)
}

/// 判断 `shape`/`strides` 是否构成列优先连续布局。
pub fn is_column_major(shape: &[usize], strides: &[isize], item_size: usize) -> bool {
    dense_in_order(shape.iter().zip(strides), shape, item_size)
}

fn dense_in_order<'a>(
    axes: impl Iterator<Item = (&'a usize, &'a isize)>,
    shape: &[usize],
    item_size: usize,
) -> bool {
    if shape.contains(&0) {
        return true;
    }
    let Ok(mut expected) = isize::try_from(item_size) else {
        return false;
    };
    for (&extent, &stride) in axes {
        if extent == 1 {
            continue;
        }
        if stride != expected {
            return false;
        }
        let Some(next) = isize::try_from(extent)
            .ok()
            .and_then(|extent| expected.checked_mul(extent))
        else {
            return false;
        };
        expected = next;
    }
    true
}

/// 计算行优先紧凑布局的字节步长；溢出时返回 `None`。
pub fn row_major_strides(shape: &[usize], item_size: usize) -> Option<Vec<isize>> {
    let mut strides = alloc::vec![0isize; shape.len()];
    let mut step = isize::try_from(item_size).ok()?;
    for (slot, &extent) in strides.iter_mut().zip(shape).rev() {
        *slot = step;
        step = step.checked_mul(isize::try_from(extent.max(1)).ok()?)?;
    }
    Some(strides)
}

/// 计算列优先紧凑布局的字节步长；溢出时返回 `None`。
pub fn column_major_strides(shape: &[usize], item_size: usize) -> Option<Vec<isize>> {
    let mut strides = alloc::vec![0isize; shape.len()];
    let mut step = isize::try_from(item_size).ok()?;
    for (slot, &extent) in strides.iter_mut().zip(shape) {
        *slot = step;
        step = step.checked_mul(isize::try_from(extent.max(1)).ok()?)?;
    }
    Some(strides)
}
