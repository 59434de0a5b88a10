use alloc::sync::Arc;
use core::fmt;

use spark_view_core::{Contiguity, CoreError, ExportFlags, Result, StridedSource, ViewError};

use crate::{
    cache::LayoutSnapshot,
    config::ExportConfig,
    format::FormatEncoder,
    guard::{LifetimeGuard, ViewPin},
    state::Exportable,
};

/// `BufferExporter` 负责把源缓冲导出为 [`ViewRecord`]。
///
/// # 设计背景（Why）
/// - 消费者通过能力标志声明自己能处理的布局，导出方必须在产生任何副作用之前
///   判定请求能否满足；
/// - 校验、格式串、形状快照与生命周期登记分属不同组件，导出器只负责按固定顺序编排。
///
/// # 逻辑解析（How）
/// 1. 按 行优先 → 列优先 → 任一连续 → 可写 → 维度上限 的顺序校验，首个失败即返回；
/// 2. 请求格式串时调用 [`FormatEncoder::encode`]，结果缓存在元素描述符上；
/// 3. 请求形状/步长时由源缓冲自己的 `ViewCache` 提供快照；否则要求源缓冲是单一内存段，
///    视图以零维形式报告；
/// 4. 全部成功后才登记生命周期，任何失败都不会留下未配对的计数。
///
/// # 契约说明（What）
/// - **前置条件**：同一缓冲上的导出与布局修改由调用方串行化；
/// - **后置条件**：成功返回的视图在释放前固定源缓冲的存活；
/// - **失败语义**：失败时源缓冲的计数不变，已缓存的格式串与快照保持有效。
#[derive(Clone, Debug, Default)]
pub struct BufferExporter {
    config: ExportConfig,
}

impl BufferExporter {
    /// 以给定配置创建导出器。
    ///
    /// # 错误
    /// - 配置未通过 [`ExportConfig::validate`] 时返回 `config.invalid`。
    pub fn new(config: ExportConfig) -> core::result::Result<Self, CoreError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 当前配置。
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// 按能力标志导出视图。
    pub fn export<S: Exportable + ?Sized>(
        &self,
        source: &Arc<S>,
        flags: ExportFlags,
    ) -> Result<ViewRecord<S>> {
        let buffer: &S = source;
        self.validate(buffer, flags)?;

        let format = if flags.contains(ExportFlags::REQUIRE_FORMAT) {
            Some(FormatEncoder::encode(buffer.element_descriptor())?)
        } else {
            None
        };

        let layout = if flags.contains(ExportFlags::REQUIRE_SHAPE_STRIDES) {
            Some(buffer.export_state().cache().refresh(buffer)?)
        } else {
            require_single_segment(buffer)?;
            None
        };

        let view = ViewRecord {
            buf: buffer.base_pointer(),
            len: buffer.byte_length(),
            item_size: buffer.item_size(),
            readonly: buffer.is_read_only(),
            single_segment: buffer.is_single_segment(),
            format,
            layout,
            pin: LifetimeGuard::acquire(source),
        };
        tracing::trace!(
            flags = ?flags,
            len = view.len,
            ndim = view.ndim(),
            outstanding = buffer.export_state().guard().outstanding(),
            "view exported"
        );
        Ok(view)
    }

    /// 释放视图；等价于直接丢弃它。
    pub fn release<S: Exportable + ?Sized>(&self, view: ViewRecord<S>) {
        view.release();
    }

    fn validate<S: StridedSource + ?Sized>(&self, buffer: &S, flags: ExportFlags) -> Result<()> {
        if flags.contains(ExportFlags::REQUIRE_ROW_MAJOR) && !buffer.is_row_major_contiguous() {
            return Err(ViewError::NotContiguous {
                required: Contiguity::RowMajor,
            });
        }
        if flags.contains(ExportFlags::REQUIRE_COLUMN_MAJOR)
            && !buffer.is_column_major_contiguous()
        {
            return Err(ViewError::NotContiguous {
                required: Contiguity::ColumnMajor,
            });
        }
        if flags.contains(ExportFlags::REQUIRE_ANY_CONTIGUOUS) && !buffer.is_single_segment() {
            return Err(ViewError::NotContiguous {
                required: Contiguity::Any,
            });
        }
        if flags.contains(ExportFlags::REQUIRE_WRITABLE) && buffer.is_read_only() {
            return Err(ViewError::NotWritable);
        }
        let ndim = buffer.dimension_count();
        if ndim > self.config.max_ndim {
            return Err(ViewError::TooManyDimensions {
                ndim,
                max: self.config.max_ndim,
            });
        }
        Ok(())
    }
}

/// 未请求步长时的连续性要求：源缓冲必须是单一内存段。
pub(crate) fn require_single_segment<S: StridedSource + ?Sized>(buffer: &S) -> Result<()> {
    if buffer.is_single_segment() {
        Ok(())
    } else {
        Err(ViewError::NotContiguous {
            required: Contiguity::SingleSegment,
        })
    }
}

/// `ViewRecord` 是交给消费者的视图句柄。
///
/// # 契约说明（What）
/// - 指针借用自源缓冲，视图从不拥有内存；
/// - 持有 [`ViewPin`]，在视图释放（或被丢弃）前源缓冲不会被销毁；
/// - 格式串缺省时消费者应按无符号字节（`B`）解读；
/// - 未请求形状/步长时视图为零维，`shape()` 与 `strides()` 返回空切片。
pub struct ViewRecord<S: Exportable + ?Sized> {
    buf: *mut u8,
    len: usize,
    item_size: usize,
    readonly: bool,
    single_segment: bool,
    format: Option<Arc<str>>,
    layout: Option<Arc<LayoutSnapshot>>,
    pin: ViewPin<S>,
}

impl<S: Exportable + ?Sized> ViewRecord<S> {
    /// 缓冲起始地址。
    pub fn as_ptr(&self) -> *const u8 {
        self.buf
    }

    /// 可写视图的起始地址；只读视图返回 `None`。
    pub fn as_mut_ptr(&self) -> Option<*mut u8> {
        (!self.readonly).then_some(self.buf)
    }

    /// 元素数据总字节数。
    pub fn len(&self) -> usize {
        self.len
    }

    /// 视图是否不含任何元素字节。
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 单个元素的字节数。
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// 视图是否只读；只读视图不提供可写指针。
    pub fn is_read_only(&self) -> bool {
        self.readonly
    }

    /// 格式串（若已请求）。
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// 维度数；零维视图返回 0。
    pub fn ndim(&self) -> usize {
        self.layout.as_deref().map_or(0, LayoutSnapshot::ndim)
    }

    /// 各维长度；零维视图返回空切片。
    pub fn shape(&self) -> &[usize] {
        self.layout.as_deref().map_or(&[][..], LayoutSnapshot::shape)
    }

    /// 各维字节步长，与 [`shape`](Self::shape) 一一对应。
    pub fn strides(&self) -> &[isize] {
        self.layout.as_deref().map_or(&[][..], LayoutSnapshot::strides)
    }

    /// 视图引用的布局快照；与缓存共享同一个 `Arc`。
    pub fn snapshot(&self) -> Option<&Arc<LayoutSnapshot>> {
        self.layout.as_ref()
    }

    /// 被固定的源缓冲。
    pub fn source(&self) -> &Arc<S> {
        self.pin.source()
    }

    /// 以字节切片访问单一内存段的视图。
    ///
    /// 带步长空洞的视图，以及源缓冲报告空指针但长度非零的视图返回 `None`。
    pub fn as_bytes(&self) -> Option<&[u8]> {
        if !self.single_segment {
            return None;
        }
        if self.len == 0 {
            return Some(&[]);
        }
        if self.buf.is_null() {
            return None;
        }
        // SAFETY: `pin` 固定了源缓冲；`StridedSource` 是 unsafe trait，实现方保证单一内存段
        // 且指针非空时 `[buf, buf + len)` 在源缓冲存活期间可读。`buf`、`len` 与
        // `single_segment` 取自同一次导出。
        #[allow(unsafe_code)]
        let bytes = unsafe { core::slice::from_raw_parts(self.buf, self.len) };
        Some(bytes)
    }

    /// 释放视图，源缓冲的未释放计数恰好减一。
    pub fn release(self) {
        drop(self);
    }
}

impl<S: Exportable + ?Sized> fmt::Debug for ViewRecord<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewRecord")
            .field("buf", &self.buf)
            .field("len", &self.len)
            .field("item_size", &self.item_size)
            .field("readonly", &self.readonly)
            .field("format", &self.format)
            .field("shape", &self.shape())
            .field("strides", &self.strides())
            .finish()
    }
}
