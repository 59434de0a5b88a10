//! `export_contract` 集成测试：聚焦 `BufferExporter` 的能力标志与视图组装契约。
//!
//! # 测试总览（Why）
//! - 校验 行优先 → 列优先 → 任一连续 → 可写 的校验顺序与错误类型；
//! - 确认布局不变时视图共享同一快照，布局变化后得到新快照且旧视图不受影响；
//! - 以 `NdBuffer` 作为真实宿主，观察视图指针、长度与字节内容。

use std::sync::Arc;

use bytes::BytesMut;
use spark_view::{BufferExporter, ExportConfig, Exportable, NdBuffer};
use spark_view_core::{
    ByteOrder, Contiguity, CoreError, ElementDescriptor, ElementKind, ExportFlags, MemoryOrder,
    StridedSource, ViewError, codes,
};

fn int32() -> Arc<ElementDescriptor> {
    Arc::new(ElementDescriptor::scalar(ElementKind::Int, ByteOrder::Little).expect("int32 描述符"))
}

fn row_major_2x3() -> Arc<NdBuffer> {
    Arc::new(NdBuffer::zeroed(int32(), &[2, 3], MemoryOrder::RowMajor).expect("分配 2x3 数组"))
}

/// 行优先 2x3 数组满足行优先要求，交换步长后不再满足。
#[test]
fn row_major_requirement_follows_strides() {
    let buffer = row_major_2x3();
    let exporter = BufferExporter::default();
    let view = exporter
        .export(&buffer, ExportFlags::REQUIRE_ROW_MAJOR | ExportFlags::STRIDED)
        .expect("行优先布局");
    assert_eq!(view.shape(), &[2, 3]);
    assert_eq!(view.strides(), &[12, 4]);
    assert_eq!(view.len(), 24);
    assert_eq!(view.item_size(), 4);
    drop(view);

    let transposed = Arc::new(
        NdBuffer::from_parts(int32(), BytesMut::zeroed(24), 0, vec![2, 3], vec![4, 8])
            .expect("列优先布局"),
    );
    let err = exporter
        .export(&transposed, ExportFlags::REQUIRE_ROW_MAJOR)
        .expect_err("列优先数组不满足行优先要求");
    assert_eq!(
        err,
        ViewError::NotContiguous {
            required: Contiguity::RowMajor
        }
    );
    exporter
        .export(&transposed, ExportFlags::REQUIRE_COLUMN_MAJOR)
        .expect("满足列优先要求");
}

/// 带空洞的切片布局无法满足任一连续要求。
#[test]
fn gapped_layout_fails_any_contiguous() {
    let sliced = Arc::new(
        NdBuffer::from_parts(int32(), BytesMut::zeroed(48), 0, vec![2, 3], vec![24, 4])
            .expect("隔行切片"),
    );
    let err = BufferExporter::default()
        .export(&sliced, ExportFlags::REQUIRE_ANY_CONTIGUOUS)
        .expect_err("存在行间空洞");
    assert_eq!(
        err,
        ViewError::NotContiguous {
            required: Contiguity::Any
        }
    );
}

/// 布局未变时两次导出共享同一快照；修改形状后的导出得到新快照，旧视图保持原值。
#[test]
fn snapshot_is_shared_until_layout_changes() {
    let buffer = row_major_2x3();
    let exporter = BufferExporter::default();
    let first = exporter.export(&buffer, ExportFlags::STRIDED).expect("首次导出");
    let second = exporter.export(&buffer, ExportFlags::STRIDED).expect("再次导出");
    assert!(Arc::ptr_eq(
        first.snapshot().expect("请求了步长"),
        second.snapshot().expect("请求了步长")
    ));

    buffer.set_layout(vec![3, 2], vec![8, 4]).expect("原地重塑");
    let third = exporter.export(&buffer, ExportFlags::STRIDED).expect("重塑后导出");
    assert!(!Arc::ptr_eq(
        first.snapshot().expect("请求了步长"),
        third.snapshot().expect("请求了步长")
    ));
    assert_eq!(first.shape(), &[2, 3]);
    assert_eq!(third.shape(), &[3, 2]);
    assert_eq!(third.as_ptr(), first.as_ptr());

    let stats = buffer.export_state().cache().stats();
    assert_eq!(stats.snapshots_built, 2);
    assert_eq!(stats.hits, 1);
}

/// 只读数组拒绝可写请求，但允许只读导出。
#[test]
fn read_only_buffer_rejects_writable_request() {
    let buffer = row_major_2x3();
    buffer.set_writable(false);
    let exporter = BufferExporter::default();
    assert_eq!(
        exporter
            .export(&buffer, ExportFlags::FULL)
            .expect_err("只读数组"),
        ViewError::NotWritable
    );
    let view = exporter
        .export(&buffer, ExportFlags::RECORDS)
        .expect("只读导出");
    assert!(view.is_read_only());
    assert!(view.as_mut_ptr().is_none());
}

/// 连续数组在未请求步长时以零维视图导出，字节内容可直接读取。
#[test]
fn single_segment_without_strides_is_zero_dimensional() {
    let mut storage = BytesMut::zeroed(8);
    storage[..4].copy_from_slice(&7i32.to_le_bytes());
    storage[4..].copy_from_slice(&(-1i32).to_le_bytes());
    let buffer = Arc::new(
        NdBuffer::from_parts(int32(), storage, 0, vec![2], vec![4]).expect("一维连续"),
    );

    let view = BufferExporter::default()
        .export(&buffer, ExportFlags::SIMPLE)
        .expect("简单导出");
    assert_eq!(view.ndim(), 0);
    assert!(view.shape().is_empty());
    assert!(view.strides().is_empty());
    assert!(view.format().is_none());
    assert!(view.snapshot().is_none());
    let bytes = view.as_bytes().expect("单一内存段");
    assert_eq!(&bytes[..4], &7i32.to_le_bytes());
    assert_eq!(&bytes[4..], &(-1i32).to_le_bytes());
    assert!(buffer.export_state().cache().current().is_none());
}

/// 可写视图的写入对宿主可见。
#[test]
fn writable_view_writes_through_to_buffer() {
    let buffer = Arc::new(NdBuffer::zeroed(int32(), &[4], MemoryOrder::RowMajor).expect("分配"));
    let exporter = BufferExporter::default();
    let writer = exporter
        .export(&buffer, ExportFlags::REQUIRE_WRITABLE)
        .expect("可写导出");
    let ptr = writer.as_mut_ptr().expect("可写视图");
    // SAFETY: 视图固定了数组，4 字节写入位于首元素内，且没有其他引用同时访问这段内存。
    unsafe { ptr.write(0x2a) };
    drop(writer);

    let reader = exporter.export(&buffer, ExportFlags::SIMPLE).expect("只读导出");
    assert_eq!(reader.as_bytes().expect("连续")[0], 0x2a);
}

/// 请求格式串时导出描述符的编码结果。
#[test]
fn format_request_exposes_descriptor_encoding() {
    let record = Arc::new(
        ElementDescriptor::record()
            .field("id", 0, int32())
            .field(
                "score",
                8,
                Arc::new(
                    ElementDescriptor::scalar(ElementKind::Double, ByteOrder::Big)
                        .expect("double"),
                ),
            )
            .build()
            .expect("记录"),
    );
    let buffer = Arc::new(NdBuffer::zeroed(record, &[3], MemoryOrder::RowMajor).expect("记录数组"));
    let view = BufferExporter::default()
        .export(&buffer, ExportFlags::RECORDS)
        .expect("记录导出");
    assert_eq!(view.format(), Some("T{<i:id:xxxx>d:score:}"));
    assert_eq!(view.item_size(), 16);
    assert_eq!(view.strides(), &[16]);
}

/// 维度上限来自配置，超限错误可转换为稳定错误码。
#[test]
fn dimension_limit_maps_to_stable_code() {
    let buffer = Arc::new(
        NdBuffer::zeroed(int32(), &[1, 1, 1], MemoryOrder::RowMajor).expect("三维数组"),
    );
    let exporter = BufferExporter::new(ExportConfig { max_ndim: 2 }).expect("合法配置");
    let err: CoreError = exporter
        .export(&buffer, ExportFlags::STRIDED)
        .expect_err("超过维度上限")
        .into();
    assert_eq!(err.code(), codes::VIEW_TOO_MANY_DIMENSIONS);
    assert_eq!(buffer.export_state().guard().outstanding(), 0);
}

/// 视图报告的字节长度与宿主一致。
#[test]
fn view_length_matches_source() {
    let buffer = Arc::new(
        NdBuffer::zeroed(int32(), &[5, 0, 2], MemoryOrder::ColumnMajor).expect("空数组"),
    );
    let view = BufferExporter::default()
        .export(&buffer, ExportFlags::REQUIRE_ROW_MAJOR)
        .expect("含零维的数组视为连续");
    assert_eq!(view.len(), buffer.byte_length());
    assert!(view.is_empty());
    assert_eq!(view.as_bytes(), Some(&[][..]));
}

/// 反转布局后，长度与连续性取自同一份布局：不连续的视图不提供字节切片。
#[test]
fn reversed_layout_reports_consistent_view() {
    let buffer = Arc::new(
        NdBuffer::from_parts(int32(), BytesMut::zeroed(16), 12, vec![1], vec![4])
            .expect("末尾单元素"),
    );
    let exporter = BufferExporter::default();
    let view = exporter.export(&buffer, ExportFlags::SIMPLE).expect("单元素连续");
    assert_eq!(view.as_bytes().map(<[u8]>::len), Some(4));

    buffer.set_layout(vec![4], vec![-4]).expect("反向遍历整块存储");
    assert_eq!(
        exporter.export(&buffer, ExportFlags::SIMPLE).expect_err("负步长不连续"),
        ViewError::NotContiguous {
            required: Contiguity::SingleSegment
        }
    );
    let reversed = exporter.export(&buffer, ExportFlags::STRIDED).expect("请求步长");
    assert_eq!(reversed.len(), 16);
    assert!(reversed.as_bytes().is_none());
    assert_eq!(view.as_bytes().map(<[u8]>::len), Some(4));
}

/// 数组可以整体移交给另一个线程，在那里导出视图。
#[test]
fn buffer_moves_to_another_thread() {
    let buffer = NdBuffer::zeroed(int32(), &[2, 2], MemoryOrder::RowMajor).expect("分配");
    let len = std::thread::spawn(move || {
        let buffer = Arc::new(buffer);
        let view = BufferExporter::default()
            .export(&buffer, ExportFlags::SIMPLE)
            .expect("连续数组");
        view.len()
    })
    .join()
    .expect("线程正常结束");
    assert_eq!(len, 16);
}
