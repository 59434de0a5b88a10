//! 旧式单段访问接口。
//!
//! 这些函数早于能力标志式导出存在，只能描述“整块连续内存”。它们不包含独立逻辑，
//! 全部转调导出器的单段连续性检查；新代码应使用 [`BufferExporter`](crate::BufferExporter)。

use spark_view_core::{CoreError, StridedSource, ViewError};

use crate::exporter::require_single_segment;

/// 返回 `(段数, 总字节数)`：单一内存段时为 `(1, len)`，否则为 `(0, 0)`。
#[deprecated(since = "0.1.0", note = "使用 BufferExporter::export 获取视图")]
pub fn segment_count<S: StridedSource + ?Sized>(source: &S) -> (usize, usize) {
    match require_single_segment(source) {
        Ok(()) => (1, source.byte_length()),
        Err(_) => (0, 0),
    }
}

/// 返回第 `segment` 段的只读起点与长度。
///
/// # 错误
/// - `segment != 0`：`view.segment_out_of_range`；
/// - 源缓冲不是单一内存段：`view.not_contiguous`。
#[deprecated(since = "0.1.0", note = "使用 BufferExporter::export 获取视图")]
pub fn read_segment<S: StridedSource + ?Sized>(
    source: &S,
    segment: usize,
) -> Result<(*const u8, usize), CoreError> {
    checked_segment(source, segment)?;
    Ok((source.base_pointer().cast_const(), source.byte_length()))
}

/// 返回第 `segment` 段的可写起点与长度。
///
/// # 错误
/// - 源缓冲只读：`view.not_writable`；
/// - 其余与 [`read_segment`] 相同。
#[deprecated(since = "0.1.0", note = "使用 BufferExporter::export 并请求 REQUIRE_WRITABLE")]
pub fn write_segment<S: StridedSource + ?Sized>(
    source: &S,
    segment: usize,
) -> Result<(*mut u8, usize), CoreError> {
    if source.is_read_only() {
        return Err(ViewError::NotWritable.into());
    }
    checked_segment(source, segment)?;
    Ok((source.base_pointer(), source.byte_length()))
}

fn checked_segment<S: StridedSource + ?Sized>(source: &S, segment: usize) -> Result<(), CoreError> {
    if segment != 0 {
        return Err(ViewError::SegmentOutOfRange { segment }.into());
    }
    require_single_segment(source)?;
    Ok(())
}
