use alloc::{
    string::{String, ToString},
    sync::Arc,
};

use spark_view_core::{ElementDescriptor, ElementKind, Result, ViewError};

/// 记录字段名两侧的保留分隔符。
pub const FIELD_NAME_SEPARATOR: char = ':';

/// 宽字符串的字符单元字节数（UCS-4）。
pub const WIDE_CHAR_UNIT: usize = 4;

/// 记录内部用于补齐字段间空洞的填充字符，每个字符代表一个字节。
pub const PADDING_MARKER: char = 'x';

/// `FormatEncoder` 将元素描述符翻译为紧凑的格式串。
///
/// # 设计背景（Why）
/// - 消费者只拿到原始字节与格式串，格式串必须完整表达字节序、标量类型、
///   定长串长度以及嵌套记录的字段与填充；
/// - 格式串语法与外部消费者按位约定，任何偏差都会导致对方误读内存。
///
/// # 逻辑解析（How）
/// - 前序递归：记录类型输出 `T{`，逐字段输出“填充 + 子编码 + `:名称:`”，最后输出 `}`；
/// - 标量输出可选字节序前缀与类型码；定长字节串为 `<N>s`，宽字符串为 `<N/4>w`；
/// - 每层记录维护自己的游标，字段偏移相对于该记录起点。
///
/// # 契约说明（What）
/// - [`encode`](Self::encode) 结果缓存在描述符上：同一实例只计算一次，之后返回同一个 `Arc<str>`；
/// - 失败时不发布任何缓存，也不产生部分结果；
/// - 字段名按 UTF-8 原样输出，名称中出现 `:` 或 NUL 时返回 [`ViewError::InvalidFieldName`]。
#[derive(Clone, Copy, Debug, Default)]
pub struct FormatEncoder;

impl FormatEncoder {
    /// 返回描述符的格式串，必要时计算并缓存。
    ///
    /// # 示例（Examples）
    /// ```rust
    /// use std::sync::Arc;
    /// use spark_view::FormatEncoder;
    /// use spark_view_core::{ByteOrder, ElementDescriptor, ElementKind};
    ///
    /// let ubyte = Arc::new(ElementDescriptor::scalar(ElementKind::UByte, ByteOrder::NotApplicable).unwrap());
    /// let double = Arc::new(ElementDescriptor::scalar(ElementKind::Double, ByteOrder::NotApplicable).unwrap());
    /// let record = ElementDescriptor::record()
    ///     .field("a", 0, ubyte)
    ///     .field("b", 8, double)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(&*FormatEncoder::encode(&record).unwrap(), "T{B:a:xxxxxxxd:b:}");
    /// assert_eq!(record.size(), 16);
    /// ```
    pub fn encode(descriptor: &ElementDescriptor) -> Result<Arc<str>> {
        descriptor
            .format_or_try_init(Self::encode_uncached)
            .cloned()
    }

    /// 计算格式串但不读写缓存。
    pub fn encode_uncached(descriptor: &ElementDescriptor) -> Result<String> {
        let mut out = String::new();
        write_descriptor(descriptor, &mut out)?;
        Ok(out)
    }
}

fn write_descriptor(descriptor: &ElementDescriptor, out: &mut String) -> Result<()> {
    if descriptor.has_subarray_shape() {
        return Err(ViewError::UnsupportedLayout);
    }
    if descriptor.is_record() {
        write_record(descriptor, out)
    } else {
        write_scalar(descriptor, out)
    }
}

fn write_record(descriptor: &ElementDescriptor, out: &mut String) -> Result<()> {
    out.push_str("T{");
    let mut cursor = 0usize;
    for field in descriptor.fields() {
        let offset = field.offset();
        if cursor < offset {
            out.extend(core::iter::repeat_n(PADDING_MARKER, offset - cursor));
            cursor = offset;
        }
        cursor += field.descriptor().size();

        write_descriptor(field.descriptor(), out)?;
        write_field_name(field.name(), out)?;
    }
    out.push('}');
    Ok(())
}

fn write_field_name(name: &str, out: &mut String) -> Result<()> {
    if name.contains(FIELD_NAME_SEPARATOR) {
        return Err(ViewError::InvalidFieldName {
            name: name.to_string(),
            reason: "':' is not an allowed character in buffer field names",
        });
    }
    if name.contains('\0') {
        return Err(ViewError::InvalidFieldName {
            name: name.to_string(),
            reason: "NUL is not an allowed character in buffer field names",
        });
    }
    out.push(FIELD_NAME_SEPARATOR);
    out.push_str(name);
    out.push(FIELD_NAME_SEPARATOR);
    Ok(())
}

fn write_scalar(descriptor: &ElementDescriptor, out: &mut String) -> Result<()> {
    let kind = descriptor.kind();
    // 类型判定先于任何输出，失败时 `out` 不含本元素的前缀。
    let code = match kind {
        ElementKind::Bytes => {
            push_byte_order(descriptor, out);
            out.push_str(&descriptor.size().to_string());
            out.push('s');
            return Ok(());
        }
        ElementKind::Unicode => {
            let size = descriptor.size();
            if size % WIDE_CHAR_UNIT != 0 {
                return Err(ViewError::InvalidWidth {
                    size,
                    unit: WIDE_CHAR_UNIT,
                });
            }
            push_byte_order(descriptor, out);
            out.push_str(&(size / WIDE_CHAR_UNIT).to_string());
            out.push('w');
            return Ok(());
        }
        other => type_code(other).ok_or(ViewError::UnknownElementType { kind: other })?,
    };
    push_byte_order(descriptor, out);
    out.push_str(code);
    Ok(())
}

fn push_byte_order(descriptor: &ElementDescriptor, out: &mut String) {
    if let Some(marker) = descriptor.byte_order().marker() {
        out.push(marker);
    }
}

/// 固定类型码表；不在语法中的类型返回 `None`。
pub fn type_code(kind: ElementKind) -> Option<&'static str> {
    let code = match kind {
        ElementKind::Byte => "b",
        ElementKind::UByte => "B",
        ElementKind::Short => "h",
        ElementKind::UShort => "H",
        ElementKind::Int => "i",
        ElementKind::UInt => "I",
        ElementKind::Long => "l",
        ElementKind::ULong => "L",
        ElementKind::LongLong => "q",
        ElementKind::ULongLong => "Q",
        ElementKind::Float => "f",
        ElementKind::Double => "d",
        ElementKind::LongDouble => "g",
        ElementKind::ComplexFloat => "Zf",
        ElementKind::ComplexDouble => "Zd",
        ElementKind::ComplexLongDouble => "Zg",
        ElementKind::Object => "O",
        ElementKind::Bool
        | ElementKind::Half
        | ElementKind::DateTime
        | ElementKind::Void
        | ElementKind::Record
        | ElementKind::Bytes
        | ElementKind::Unicode => return None,
    };
    Some(code)
}
