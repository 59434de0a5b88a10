//! 格式串编码性质验证
//!
//! # 测试总览（Why）
//! - 标量编码只由字节序前缀与固定类型码组成，二者分别可由描述符推出；
//! - 记录内填充字符数恰好等于字段偏移与前一字段末尾之差；
//! - 编码结果幂等：重复调用返回同一缓存实例；
//! - 含子数组形状的描述符无论位于何处都无法编码。
//!
//! # 结构说明（How）
//! - `scalar_kind()` 生成位于格式语法内的固定宽度类型；
//! - `record_layout()` 生成字段宽度与字段间空洞，由此推出偏移与期望格式串。

use std::sync::Arc;

use proptest::prelude::*;
use spark_view::{FormatEncoder, type_code};
use spark_view_core::{ByteOrder, ElementDescriptor, ElementKind, ViewError};

fn scalar_kind() -> impl Strategy<Value = ElementKind> {
    prop::sample::select(vec![
        ElementKind::Byte,
        ElementKind::UByte,
        ElementKind::Short,
        ElementKind::UShort,
        ElementKind::Int,
        ElementKind::UInt,
        ElementKind::Long,
        ElementKind::ULong,
        ElementKind::LongLong,
        ElementKind::ULongLong,
        ElementKind::Float,
        ElementKind::Double,
        ElementKind::LongDouble,
        ElementKind::ComplexFloat,
        ElementKind::ComplexDouble,
        ElementKind::ComplexLongDouble,
        ElementKind::Object,
    ])
}

fn byte_order() -> impl Strategy<Value = ByteOrder> {
    prop::sample::select(vec![
        ByteOrder::Little,
        ByteOrder::Big,
        ByteOrder::Native,
        ByteOrder::NotApplicable,
    ])
}

/// 每个字段：（字节串宽度，字段前的空洞字节数）。
fn record_layout() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((1usize..12, 0usize..6), 1..6)
}

proptest! {
    /// 标量格式串 = 可选字节序前缀 + 类型码。
    #[test]
    fn scalar_encoding_is_prefix_plus_code(kind in scalar_kind(), order in byte_order()) {
        let descriptor = ElementDescriptor::scalar(kind, order).expect("固定宽度类型");
        let encoded = FormatEncoder::encode(&descriptor).expect("语法内类型");
        let mut expected = String::new();
        if let Some(marker) = descriptor.byte_order().marker() {
            expected.push(marker);
        }
        expected.push_str(type_code(kind).expect("存在类型码"));
        prop_assert_eq!(&*encoded, expected.as_str());
    }

    /// 填充字符数等于字段偏移减去游标。
    #[test]
    fn padding_matches_offset_gaps(layout in record_layout()) {
        let mut builder = ElementDescriptor::record();
        let mut expected = String::from("T{");
        let mut cursor = 0usize;
        for (index, (width, gap)) in layout.iter().copied().enumerate() {
            let name = format!("f{index}");
            let offset = cursor + gap;
            let field = Arc::new(ElementDescriptor::bytes(width));
            builder = builder.field(name.clone(), offset, field);
            expected.push_str(&"x".repeat(gap));
            expected.push_str(&format!("{width}s:{name}:"));
            cursor = offset + width;
        }
        expected.push('}');
        let record = builder.build().expect("偏移递增且不重叠");
        prop_assert_eq!(FormatEncoder::encode_uncached(&record).expect("可编码"), expected);
    }

    /// 重复编码返回同一缓存实例，内容与无缓存计算一致。
    #[test]
    fn encoding_is_idempotent(kind in scalar_kind(), order in byte_order()) {
        let descriptor = ElementDescriptor::scalar(kind, order).expect("固定宽度类型");
        let first = FormatEncoder::encode(&descriptor).expect("首次");
        let second = FormatEncoder::encode(&descriptor).expect("再次");
        prop_assert!(Arc::ptr_eq(&first, &second));
        prop_assert_eq!(&*first, FormatEncoder::encode_uncached(&descriptor).expect("无缓存"));
    }

    /// 子数组字段位于任意位置都会使整个编码失败，且不发布缓存。
    #[test]
    fn subarray_anywhere_is_unsupported(
        kind in scalar_kind(),
        extents in prop::collection::vec(1usize..4, 1..3),
        position in 0usize..3,
    ) {
        let base = Arc::new(ElementDescriptor::scalar(kind, ByteOrder::Little).expect("基元素"));
        let sub = Arc::new(
            ElementDescriptor::subarray(Arc::clone(&base), extents).expect("子数组"),
        );
        let mut builder = ElementDescriptor::record();
        let mut offset = 0usize;
        for index in 0..3 {
            let field = if index == position { Arc::clone(&sub) } else { Arc::clone(&base) };
            let size = field.size();
            builder = builder.field(format!("f{index}"), offset, field);
            offset += size;
        }
        let record = builder.build().expect("记录");
        prop_assert_eq!(FormatEncoder::encode(&record), Err(ViewError::UnsupportedLayout));
        prop_assert!(record.cached_format().is_none());
    }
}
