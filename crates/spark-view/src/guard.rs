use alloc::sync::Arc;
use core::{
    fmt,
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
};

use spark_view_core::{Result, ViewError};

use crate::state::Exportable;

/// `LifetimeGuard` 记录某个源缓冲上尚未释放的视图数量。
///
/// # 设计背景（Why）
/// - 视图只持有裸指针，若源缓冲在视图存活期间被销毁，消费者将读到已释放的内存；
/// - 视图通过 `Arc` 固定源缓冲的存活，同时维护一个显式的未释放视图计数，
///   供销毁前检查与观测。
///
/// # 逻辑解析（How）
/// - [`acquire`](Self::acquire) 克隆源缓冲的 `Arc` 并递增计数，返回 [`ViewPin`]；
/// - `ViewPin` 在 `Drop` 中递减计数，保证每次获取恰好对应一次释放；
/// - 守卫随源缓冲一同销毁，若此时计数非零说明宿主存在引用计数错误，直接 panic。
///
/// # 契约说明（What）
/// - **前置条件**：计数只能通过 `ViewPin` 增减，宿主不得手动篡改；
/// - **后置条件**：`outstanding()` 等于当前存活的 `ViewPin` 数量；
/// - **风险提示**：计数使用 `AcqRel`，保证释放视图前的读写对随后的销毁检查可见。
pub struct LifetimeGuard {
    outstanding: AtomicUsize,
    total_acquired: AtomicU64,
}

impl LifetimeGuard {
    /// 创建计数为零的守卫。
    pub const fn new() -> Self {
        Self {
            outstanding: AtomicUsize::new(0),
            total_acquired: AtomicU64::new(0),
        }
    }

    /// 为源缓冲登记一个新视图，返回固定其存活的令牌。
    pub fn acquire<S: Exportable + ?Sized>(source: &Arc<S>) -> ViewPin<S> {
        let guard = source.export_state().guard();
        guard.outstanding.fetch_add(1, Ordering::AcqRel);
        guard.total_acquired.fetch_add(1, Ordering::Relaxed);
        ViewPin {
            source: Arc::clone(source),
        }
    }

    /// 当前未释放的视图数。
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// 累计登记过的视图数。
    pub fn total_acquired(&self) -> u64 {
        self.total_acquired.load(Ordering::Relaxed)
    }

    /// 确认没有未释放的视图，否则返回 [`ViewError::BufferInUse`]。
    pub fn ensure_idle(&self) -> Result<()> {
        match self.outstanding() {
            0 => Ok(()),
            outstanding => Err(ViewError::BufferInUse { outstanding }),
        }
    }

    fn release(&self) {
        let previous = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| {
                Some(prev.saturating_sub(1))
            })
            .unwrap_or_default();
        debug_assert!(previous > 0, "LifetimeGuard 释放次数多于获取次数");
    }
}

impl Default for LifetimeGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LifetimeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeGuard")
            .field("outstanding", &self.outstanding())
            .field("total_acquired", &self.total_acquired())
            .finish()
    }
}

impl Drop for LifetimeGuard {
    fn drop(&mut self) {
        let outstanding = *self.outstanding.get_mut();
        if outstanding != 0 {
            // 视图仍指向即将释放的内存，继续运行只会留下悬垂指针。
            panic!("source buffer destroyed with {outstanding} outstanding view(s)");
        }
    }
}

/// `ViewPin` 是视图对源缓冲的固定令牌：持有期间源缓冲不会被销毁。
///
/// 令牌不可克隆；每个令牌在 `Drop` 时恰好释放一次计数。
pub struct ViewPin<S: Exportable + ?Sized> {
    source: Arc<S>,
}

impl<S: Exportable + ?Sized> ViewPin<S> {
    /// 被固定的源缓冲。
    pub fn source(&self) -> &Arc<S> {
        &self.source
    }
}

impl<S: Exportable + ?Sized> Drop for ViewPin<S> {
    fn drop(&mut self) {
        self.source.export_state().guard().release();
    }
}

impl<S: Exportable + ?Sized> fmt::Debug for ViewPin<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewPin")
            .field("outstanding", &self.source.export_state().guard().outstanding())
            .finish()
    }
}
