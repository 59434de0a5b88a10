use spark_view_core::StridedSource;

use crate::{cache::ViewCache, guard::LifetimeGuard};

/// `ExportState` 是源缓冲为支持视图导出而携带的全部附属状态。
///
/// # 设计背景（Why）
/// - 形状缓存与未释放视图计数都属于“某一个源缓冲”，其生命周期必须与源缓冲严格一致：
///   源缓冲销毁时一并释放，且只释放一次；
/// - 将二者打包为一个字段，宿主只需在自身结构中嵌入 `ExportState` 并实现 [`Exportable`]。
///
/// # 契约说明（What）
/// - 宿主销毁时随之销毁；此时若仍有未释放视图，[`LifetimeGuard`] 的 `Drop` 会 panic；
/// - 格式串不在此处：它属于元素描述符，与任何单个缓冲的生命周期无关。
#[derive(Debug, Default)]
pub struct ExportState {
    cache: ViewCache,
    guard: LifetimeGuard,
}

impl ExportState {
    /// 创建空的导出状态。
    pub fn new() -> Self {
        Self::default()
    }

    /// 布局快照缓存。
    pub fn cache(&self) -> &ViewCache {
        &self.cache
    }

    /// 视图计数守卫。
    pub fn guard(&self) -> &LifetimeGuard {
        &self.guard
    }
}

/// 可被导出为视图的源缓冲：在 [`StridedSource`] 之上提供自身的 [`ExportState`]。
pub trait Exportable: StridedSource {
    /// 返回该缓冲独占的导出状态。
    fn export_state(&self) -> &ExportState;
}
