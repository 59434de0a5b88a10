#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use spark_view::FormatEncoder;
use spark_view_core::{ByteOrder, ElementDescriptor, ElementKind};

/// Fuzz 输入：一棵任意嵌套的元素描述符。
///
/// - **Why**：格式串与外部消费者按位约定，嵌套记录、填充与字段名组合最容易出错；
/// - **How**：叶子覆盖所有类型标签与字节序，记录字段的偏移由“空洞”累加得出，保证构建合法；
/// - **What**：验证编码不会 panic，缓存结果与无缓存计算一致，成功输出的括号成对出现。
#[derive(Debug, Arbitrary)]
enum Node {
    Scalar { kind: u8, order: u8 },
    Bytes(u8),
    Unicode { len: u8, order: u8 },
    SubArray { kind: u8, extent: u8 },
    Record(Vec<(String, u8, Node)>),
}

const KINDS: [ElementKind; 20] = [
    ElementKind::Bool,
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
    ElementKind::Half,
    ElementKind::Float,
    ElementKind::Double,
    ElementKind::LongDouble,
    ElementKind::ComplexFloat,
    ElementKind::ComplexDouble,
    ElementKind::ComplexLongDouble,
    ElementKind::Object,
    ElementKind::DateTime,
];

const ORDERS: [ByteOrder; 4] = [
    ByteOrder::Little,
    ByteOrder::Big,
    ByteOrder::Native,
    ByteOrder::NotApplicable,
];

fn build(node: &Node, depth: usize) -> Option<ElementDescriptor> {
    let kind_of = |raw: u8| KINDS[usize::from(raw) % KINDS.len()];
    let order_of = |raw: u8| ORDERS[usize::from(raw) % ORDERS.len()];
    match node {
        Node::Scalar { kind, order } => {
            ElementDescriptor::scalar(kind_of(*kind), order_of(*order)).ok()
        }
        Node::Bytes(len) => Some(ElementDescriptor::bytes(usize::from(*len))),
        Node::Unicode { len, order } => {
            Some(ElementDescriptor::unicode(usize::from(*len), order_of(*order)))
        }
        Node::SubArray { kind, extent } => {
            let base = Arc::new(ElementDescriptor::scalar(kind_of(*kind), ByteOrder::Little).ok()?);
            ElementDescriptor::subarray(base, vec![usize::from(*extent % 4) + 1]).ok()
        }
        Node::Record(fields) => {
            if depth > 4 {
                return None;
            }
            let mut builder = ElementDescriptor::record();
            let mut cursor = 0usize;
            for (name, gap, child) in fields.iter().take(8) {
                let child = Arc::new(build(child, depth + 1)?);
                let offset = cursor + usize::from(*gap % 16);
                cursor = offset + child.size();
                builder = builder.field(name.clone(), offset, child);
            }
            builder.build().ok()
        }
    }
}

fuzz_target!(|node: Node| {
    let Some(descriptor) = build(&node, 0) else {
        return;
    };
    let uncached = FormatEncoder::encode_uncached(&descriptor);
    let cached = FormatEncoder::encode(&descriptor);
    match (&uncached, &cached) {
        (Ok(plain), Ok(memo)) => {
            assert_eq!(plain.as_str(), &**memo);
            assert!(descriptor.cached_format().is_some());
            let opens = plain.matches("T{").count();
            let closes = plain.matches('}').count();
            assert_eq!(opens, closes, "记录括号必须成对: {plain}");
        }
        (Err(left), Err(right)) => {
            assert_eq!(left, right);
            assert!(descriptor.cached_format().is_none());
        }
        _ => panic!("缓存与无缓存编码结果不一致: {uncached:?} vs {cached:?}"),
    }
});
