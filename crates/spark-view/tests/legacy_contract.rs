//! `legacy_contract` 集成测试：旧式单段访问接口与导出器的单段判定保持一致。
#![allow(deprecated)]

use std::sync::Arc;

use bytes::BytesMut;
use spark_view::{
    BufferExporter, NdBuffer,
    legacy::{read_segment, segment_count, write_segment},
};
use spark_view_core::{
    ByteOrder, ElementDescriptor, ElementKind, ExportFlags, MemoryOrder, StridedSource, codes,
};

fn float32() -> Arc<ElementDescriptor> {
    Arc::new(ElementDescriptor::scalar(ElementKind::Float, ByteOrder::Little).expect("f32"))
}

/// 连续数组只有一段，起点与长度与视图一致。
#[test]
fn contiguous_buffer_has_one_segment() {
    let buffer = Arc::new(
        NdBuffer::zeroed(float32(), &[3, 4], MemoryOrder::ColumnMajor).expect("列优先数组"),
    );
    assert_eq!(segment_count(&*buffer), (1, 48));

    let (ptr, len) = read_segment(&*buffer, 0).expect("第 0 段");
    let view = BufferExporter::default()
        .export(&buffer, ExportFlags::SIMPLE)
        .expect("单段导出");
    assert_eq!(ptr, view.as_ptr());
    assert_eq!(len, view.len());

    let (ptr, _) = write_segment(&*buffer, 0).expect("可写");
    assert_eq!(ptr.cast_const(), view.as_ptr());
}

/// 带空洞的数组报告零段，读写都返回不连续错误。
#[test]
fn strided_buffer_has_no_segment() {
    let buffer = NdBuffer::from_parts(float32(), BytesMut::zeroed(32), 0, vec![4], vec![8])
        .expect("隔元素切片");
    assert!(!buffer.is_single_segment());
    assert_eq!(segment_count(&buffer), (0, 0));
    assert_eq!(
        read_segment(&buffer, 0).expect_err("不连续").code(),
        codes::VIEW_NOT_CONTIGUOUS
    );
    assert_eq!(
        write_segment(&buffer, 0).expect_err("不连续").code(),
        codes::VIEW_NOT_CONTIGUOUS
    );
}

/// 段号只能为 0；只读数组的写访问优先报告不可写。
#[test]
fn segment_index_and_writability_are_checked() {
    let buffer = NdBuffer::zeroed(float32(), &[2], MemoryOrder::RowMajor).expect("分配");
    assert_eq!(
        read_segment(&buffer, 1).expect_err("段号越界").code(),
        codes::VIEW_SEGMENT_OUT_OF_RANGE
    );
    buffer.set_writable(false);
    assert_eq!(
        write_segment(&buffer, 1).expect_err("只读").code(),
        codes::VIEW_NOT_WRITABLE
    );
    read_segment(&buffer, 0).expect("只读数组仍可读");
}
