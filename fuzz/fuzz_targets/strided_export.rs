#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use spark_view::{BufferExporter, Exportable, NdBuffer};
use spark_view_core::{ByteOrder, ElementDescriptor, ElementKind, ExportFlags, StridedSource};

/// Fuzz 输入：任意布局的数组与一串导出/重塑操作。
///
/// - **Why**：布局校验、快照缓存与生命周期计数在重塑与导出交错时最容易失配；
/// - **What**：验证越界布局一律被拒绝，每个成功视图的形状与导出瞬间一致，
///   所有视图丢弃后未释放计数归零。
#[derive(Debug, Arbitrary)]
struct Case {
    storage: u8,
    offset: u8,
    layout: Vec<(u8, i8)>,
    ops: Vec<Op>,
}

#[derive(Debug, Arbitrary)]
enum Op {
    Export(u32),
    Reshape(Vec<(u8, i8)>),
    DropOldest,
    ToggleWritable,
}

fn split(layout: &[(u8, i8)]) -> (Vec<usize>, Vec<isize>) {
    layout
        .iter()
        .take(6)
        .map(|&(extent, stride)| (usize::from(extent % 8), isize::from(stride)))
        .unzip()
}

fuzz_target!(|case: Case| {
    let descriptor =
        Arc::new(ElementDescriptor::scalar(ElementKind::Short, ByteOrder::Little).expect("i16"));
    let (shape, strides) = split(&case.layout);
    let Ok(buffer) = NdBuffer::from_parts(
        descriptor,
        BytesMut::zeroed(usize::from(case.storage)),
        usize::from(case.offset),
        shape,
        strides,
    ) else {
        return;
    };
    let buffer = Arc::new(buffer);
    let exporter = BufferExporter::default();
    let mut views = Vec::new();
    let mut writable = true;

    for op in case.ops.iter().take(64) {
        match op {
            Op::Export(bits) => {
                let flags = ExportFlags::from_bits_truncate(*bits);
                if let Ok(view) = exporter.export(&buffer, flags) {
                    if flags.contains(ExportFlags::REQUIRE_SHAPE_STRIDES) {
                        assert_eq!(view.shape(), buffer.shape().as_slice());
                    } else {
                        assert!(buffer.is_single_segment());
                        assert_eq!(view.ndim(), 0);
                    }
                    assert_eq!(view.len(), buffer.byte_length());
                    views.push(view);
                }
            }
            Op::Reshape(layout) => {
                let (shape, strides) = split(layout);
                let _ = buffer.set_layout(shape, strides);
            }
            Op::DropOldest => {
                if !views.is_empty() {
                    views.remove(0);
                }
            }
            Op::ToggleWritable => {
                writable = !writable;
                buffer.set_writable(writable);
            }
        }
        assert_eq!(buffer.export_state().guard().outstanding(), views.len());
    }

    drop(views);
    buffer.export_state().guard().ensure_idle().expect("所有视图已释放");
});
