use alloc::{boxed::Box, sync::Arc, vec::Vec};
use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;
use spark_view_core::{Result, StridedSource, ViewError};

/// 某一时刻源缓冲的形状与步长。
///
/// # 契约说明（What）
/// - 形状与步长是两段各自独立分配的序列，长度都等于维度数；
/// - 快照一经创建不再修改；布局变化时由 [`ViewCache`] 生成新快照替换旧快照，
///   旧快照在最后一个持有它的视图释放后才被回收。
#[derive(Debug, PartialEq, Eq)]
pub struct LayoutSnapshot {
    shape: Box<[usize]>,
    strides: Box<[isize]>,
}

impl LayoutSnapshot {
    /// 从源缓冲读取当前形状与步长。
    ///
    /// 两段序列都通过 `try_reserve_exact` 申请，分配失败返回 [`ViewError::AllocationFailure`]。
    pub fn capture<S: StridedSource + ?Sized>(source: &S) -> Result<Self> {
        let ndim = source.dimension_count();
        let mut shape = Vec::new();
        let mut strides = Vec::new();
        shape
            .try_reserve_exact(ndim)
            .and_then(|()| strides.try_reserve_exact(ndim))
            .map_err(|_| ViewError::AllocationFailure { ndim })?;
        for axis in 0..ndim {
            shape.push(source.extent_of(axis));
            strides.push(source.stride_of(axis));
        }
        Ok(Self {
            shape: shape.into_boxed_slice(),
            strides: strides.into_boxed_slice(),
        })
    }

    /// 维度数。
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// 各维长度。
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// 各维字节步长。
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// 判断快照是否仍与源缓冲的当前布局一致。
    pub fn matches<S: StridedSource + ?Sized>(&self, source: &S) -> bool {
        self.ndim() == source.dimension_count()
            && (0..self.ndim()).all(|axis| {
                self.shape[axis] == source.extent_of(axis)
                    && self.strides[axis] == source.stride_of(axis)
            })
    }
}

/// `ViewCache` 为单个源缓冲保存最近一次计算的布局快照。
///
/// # 设计背景（Why）
/// - 消费者往往对同一缓冲反复请求视图；若每次都重新复制形状与步长，
///   热路径上会产生与维度数成正比的分配；
/// - 缓存使“布局未变”的重复导出退化为一次比较加一次引用计数递增。
///
/// # 逻辑解析（How）
/// - 槽位为 `spin::Mutex<Option<Arc<LayoutSnapshot>>>`；
/// - `refresh` 逐维比较维度数、长度与步长：全部一致时返回同一个 `Arc`（指针相等），
///   否则先在锁外捕获新快照，成功后再替换槽位；
/// - 旧快照由持有它的视图继续引用，`Arc` 计数归零时自然释放，不会出现悬垂切片。
///
/// # 契约说明（What）
/// - **后置条件**：`refresh` 成功返回的快照与源缓冲当前布局一致；
/// - **失败语义**：分配失败时返回 [`ViewError::AllocationFailure`]，槽位保持原状；
/// - 统计计数仅用于观测，采用 `Relaxed` 顺序。
#[derive(Default)]
pub struct ViewCache {
    current: Mutex<Option<Arc<LayoutSnapshot>>>,
    snapshots_built: AtomicU64,
    hits: AtomicU64,
}

/// [`ViewCache`] 的统计快照。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewCacheStats {
    /// 累计创建的快照数。
    pub snapshots_built: u64,
    /// 累计命中次数。
    pub hits: u64,
}

impl ViewCache {
    /// 创建空缓存。
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回与源缓冲当前布局一致的快照，必要时重建。
    pub fn refresh<S: StridedSource + ?Sized>(&self, source: &S) -> Result<Arc<LayoutSnapshot>> {
        if let Some(cached) = self.current.lock().as_ref() {
            if cached.matches(source) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(cached));
            }
        }

        let snapshot = Arc::new(LayoutSnapshot::capture(source)?);
        tracing::debug!(
            ndim = snapshot.ndim(),
            shape = ?snapshot.shape(),
            strides = ?snapshot.strides(),
            "layout snapshot rebuilt"
        );
        *self.current.lock() = Some(Arc::clone(&snapshot));
        self.snapshots_built.fetch_add(1, Ordering::Relaxed);
        Ok(snapshot)
    }

    /// 当前缓存的快照（若有），不与源缓冲比较。
    pub fn current(&self) -> Option<Arc<LayoutSnapshot>> {
        self.current.lock().clone()
    }

    /// 丢弃缓存的快照，返回被丢弃的值。
    pub fn clear(&self) -> Option<Arc<LayoutSnapshot>> {
        self.current.lock().take()
    }

    /// 读取统计快照。
    pub fn stats(&self) -> ViewCacheStats {
        ViewCacheStats {
            snapshots_built: self.snapshots_built.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
        }
    }
}

impl core::fmt::Debug for ViewCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ViewCache")
            .field("current", &self.current())
            .field("stats", &self.stats())
            .finish()
    }
}
