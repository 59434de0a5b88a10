use alloc::{format, string::String, sync::Arc, vec::Vec};
use core::{ffi, fmt, mem};

use spin::Once;

use crate::error::{Result, ViewError};

/// 元素字节序。
///
/// # 契约说明（What）
/// - `Little`/`Big`/`Native` 对应格式串前缀 `<`、`>`、`=`；
/// - `NotApplicable` 不输出前缀：既用于单字节等与字节序无关的类型，也是未显式声明字节序时的默认值；
/// - 与字节序无关的类型在构造时被强制归一为 `NotApplicable`，调用方传入的值会被忽略。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// 小端。
    Little,
    /// 大端。
    Big,
    /// 显式声明为宿主字节序。
    Native,
    /// 无字节序（默认）。
    #[default]
    NotApplicable,
}

impl ByteOrder {
    /// 返回格式串中使用的前缀字符。
    pub const fn marker(self) -> Option<char> {
        match self {
            ByteOrder::Little => Some('<'),
            ByteOrder::Big => Some('>'),
            ByteOrder::Native => Some('='),
            ByteOrder::NotApplicable => None,
        }
    }
}

/// 元素类型标签，命名沿用 C 语言的标量类型。
///
/// `Bool`、`Half`、`DateTime` 与不带字段的 `Void` 有确定的字节布局，
/// 但不在格式串语法之内，编码时返回 [`ViewError::UnknownElementType`]。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Bool,
    Byte,
    UByte,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Half,
    Float,
    Double,
    LongDouble,
    ComplexFloat,
    ComplexDouble,
    ComplexLongDouble,
    /// 定长字节串，大小由描述符给出。
    Bytes,
    /// 定长宽字符串（UCS-4），大小由描述符给出。
    Unicode,
    /// 对象引用（指针宽度）。
    Object,
    DateTime,
    /// 无结构的不透明字节块。
    Void,
    /// 带命名字段的记录类型。
    Record,
}

/// 宿主 C ABI 中 `long double` 的存储宽度。
///
/// MSVC、Apple aarch64 与 32 位 ARM 把它等同于 `double`；32 位 x86 的 SysV ABI
/// 按 4 字节对齐存放 80 位扩展精度；其余平台（x86_64、aarch64 Linux 等）为 16 字节。
#[cfg(any(
    target_env = "msvc",
    all(target_arch = "aarch64", target_vendor = "apple"),
    target_arch = "arm"
))]
const LONG_DOUBLE_SIZE: usize = 8;
#[cfg(all(target_arch = "x86", not(target_env = "msvc")))]
const LONG_DOUBLE_SIZE: usize = 12;
#[cfg(not(any(
    target_env = "msvc",
    all(target_arch = "aarch64", target_vendor = "apple"),
    target_arch = "arm",
    target_arch = "x86"
)))]
const LONG_DOUBLE_SIZE: usize = 16;

impl ElementKind {
    /// 返回固定宽度类型在宿主平台上的字节大小；变长类型返回 `None`。
    pub const fn native_size(self) -> Option<usize> {
        let size = match self {
            ElementKind::Bool | ElementKind::Byte | ElementKind::UByte => 1,
            ElementKind::Short | ElementKind::UShort | ElementKind::Half => 2,
            ElementKind::Int | ElementKind::UInt | ElementKind::Float => 4,
            ElementKind::Long | ElementKind::ULong => mem::size_of::<ffi::c_long>(),
            ElementKind::LongLong | ElementKind::ULongLong => mem::size_of::<ffi::c_longlong>(),
            ElementKind::Double | ElementKind::DateTime => 8,
            ElementKind::LongDouble => LONG_DOUBLE_SIZE,
            ElementKind::ComplexFloat => 8,
            ElementKind::ComplexDouble => 16,
            ElementKind::ComplexLongDouble => 2 * LONG_DOUBLE_SIZE,
            ElementKind::Object => mem::size_of::<usize>(),
            ElementKind::Bytes | ElementKind::Unicode | ElementKind::Void | ElementKind::Record => {
                return None;
            }
        };
        Some(size)
    }

    /// 字节序对该类型是否无意义。
    pub const fn is_order_irrelevant(self) -> bool {
        matches!(
            self,
            ElementKind::Bool
                | ElementKind::Byte
                | ElementKind::UByte
                | ElementKind::Bytes
                | ElementKind::Object
                | ElementKind::Void
                | ElementKind::Record
        )
    }
}

/// 子数组形状：字段本身是一个定长小数组。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubArrayShape {
    base: Arc<ElementDescriptor>,
    shape: Vec<usize>,
}

impl SubArrayShape {
    /// 子数组元素的描述符。
    pub fn base(&self) -> &Arc<ElementDescriptor> {
        &self.base
    }

    /// 子数组各维长度。
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }
}

/// 记录类型中的一个命名字段。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordField {
    name: String,
    offset: usize,
    descriptor: Arc<ElementDescriptor>,
}

impl RecordField {
    /// 字段名。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 相对记录起点的字节偏移。
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 字段元素描述符。
    pub fn descriptor(&self) -> &Arc<ElementDescriptor> {
        &self.descriptor
    }

    /// 字段末尾（不含）的偏移。
    pub fn end(&self) -> usize {
        self.offset + self.descriptor.size()
    }
}

/// `ElementDescriptor` 描述一个元素的类型、字节序、大小与（记录类型的）字段布局。
///
/// # 设计背景（Why）
/// - 视图消费者只能看到原始字节，必须借助描述符生成的格式串才能解释每个元素；
/// - 同一描述符通常被大量缓冲共享，因此格式串缓存在描述符上，计算一次后所有共享者复用。
///
/// # 逻辑解析（How）
/// - 标量、定长串、对象引用通过各自的构造函数创建，字节序在构造时归一；
/// - 记录类型经 [`RecordBuilder`] 构建，`build` 时校验字段偏移升序、互不重叠且总大小足够；
/// - `format` 槽位是一个 `spin::Once`：首次成功计算后发布为不可变的 `Arc<str>`，此后只读。
///
/// # 契约说明（What）
/// - 描述符一经发布（放入 `Arc` 共享）即视为不可变；本类型不提供任何修改字段或大小的 API；
/// - **后置条件**：[`format_or_try_init`](Self::format_or_try_init) 对同一实例至多成功执行一次初始化闭包。
pub struct ElementDescriptor {
    kind: ElementKind,
    byte_order: ByteOrder,
    size: usize,
    fields: Vec<RecordField>,
    subarray: Option<SubArrayShape>,
    format: Once<Arc<str>>,
}

impl ElementDescriptor {
    /// 创建固定宽度标量描述符。
    ///
    /// # 错误
    /// - `kind` 不是固定宽度类型（如 `Bytes`、`Record`）时返回 [`ViewError::InvalidDescriptor`]。
    pub fn scalar(kind: ElementKind, byte_order: ByteOrder) -> Result<Self> {
        let size = kind.native_size().ok_or_else(|| {
            ViewError::invalid_descriptor(format!("{kind:?} has no fixed native size"))
        })?;
        Ok(Self::raw(kind, byte_order, size))
    }

    /// 创建 `len` 字节的定长字节串描述符。
    pub fn bytes(len: usize) -> Self {
        Self::raw(ElementKind::Bytes, ByteOrder::NotApplicable, len)
    }

    /// 创建占 `byte_len` 字节的宽字符串描述符。
    ///
    /// 构造时不校验 `byte_len` 是否为宽字符单元的整数倍，该检查属于格式串编码。
    pub fn unicode(byte_len: usize, byte_order: ByteOrder) -> Self {
        Self::raw(ElementKind::Unicode, byte_order, byte_len)
    }

    /// 创建对象引用描述符。
    pub fn object() -> Self {
        Self::raw(
            ElementKind::Object,
            ByteOrder::NotApplicable,
            mem::size_of::<usize>(),
        )
    }

    /// 创建 `len` 字节的不透明字节块描述符。
    pub fn opaque(len: usize) -> Self {
        Self::raw(ElementKind::Void, ByteOrder::NotApplicable, len)
    }

    /// 创建子数组描述符：`base` 元素按 `shape` 排成的定长小数组。
    pub fn subarray(base: Arc<ElementDescriptor>, shape: Vec<usize>) -> Result<Self> {
        let count = shape
            .iter()
            .try_fold(1usize, |acc, &extent| acc.checked_mul(extent))
            .and_then(|count| count.checked_mul(base.size()))
            .ok_or_else(|| ViewError::invalid_descriptor("sub-array size overflows usize"))?;
        let mut descriptor = Self::raw(ElementKind::Void, ByteOrder::NotApplicable, count);
        descriptor.subarray = Some(SubArrayShape { base, shape });
        Ok(descriptor)
    }

    /// 开始构建记录类型。
    pub fn record() -> RecordBuilder {
        RecordBuilder::default()
    }

    fn raw(kind: ElementKind, byte_order: ByteOrder, size: usize) -> Self {
        let byte_order = if kind.is_order_irrelevant() || size <= 1 {
            ByteOrder::NotApplicable
        } else {
            byte_order
        };
        Self {
            kind,
            byte_order,
            size,
            fields: Vec::new(),
            subarray: None,
            format: Once::new(),
        }
    }

    /// 类型标签。
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// 字节序。
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// 元素字节大小。
    pub fn size(&self) -> usize {
        self.size
    }

    /// 是否为记录类型。
    pub fn is_record(&self) -> bool {
        self.kind == ElementKind::Record
    }

    /// 是否声明了子数组形状。
    pub fn has_subarray_shape(&self) -> bool {
        self.subarray.is_some()
    }

    /// 子数组形状（若有）。
    pub fn subarray_shape(&self) -> Option<&SubArrayShape> {
        self.subarray.as_ref()
    }

    /// 记录字段，按偏移升序；非记录类型为空。
    pub fn fields(&self) -> &[RecordField] {
        &self.fields
    }

    /// 已缓存的格式串（若已计算）。
    pub fn cached_format(&self) -> Option<&Arc<str>> {
        self.format.get()
    }

    /// 读取或初始化格式串缓存。
    ///
    /// # 执行逻辑（How）
    /// 1. 槽位已发布时直接返回缓存值，不调用 `init`；
    /// 2. 否则调用 `init` 计算；失败时原样返回错误，槽位保持为空；
    /// 3. 成功时发布结果。若并发调用方抢先发布，则返回先发布的值，本次结果被丢弃，
    ///    保证所有调用方观察到同一个 `Arc<str>`。
    pub fn format_or_try_init<E>(
        &self,
        init: impl FnOnce(&Self) -> core::result::Result<String, E>,
    ) -> core::result::Result<&Arc<str>, E> {
        if let Some(format) = self.format.get() {
            return Ok(format);
        }
        let computed: Arc<str> = Arc::from(init(self)?);
        Ok(self.format.call_once(|| computed))
    }
}

impl fmt::Debug for ElementDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementDescriptor")
            .field("kind", &self.kind)
            .field("byte_order", &self.byte_order)
            .field("size", &self.size)
            .field("fields", &self.fields)
            .field("subarray", &self.subarray)
            .finish_non_exhaustive()
    }
}

impl PartialEq for ElementDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.byte_order == other.byte_order
            && self.size == other.size
            && self.fields == other.fields
            && self.subarray == other.subarray
    }
}

impl Eq for ElementDescriptor {}

/// 记录类型构建器。
///
/// # 契约说明（What）
/// - 字段需按偏移升序追加；`build` 时校验，违例返回 [`ViewError::InvalidDescriptor`]；
/// - 未调用 [`size`](Self::size) 时，记录总大小取最后一个字段的末尾偏移；
/// - 显式给出的总大小必须覆盖最后一个字段，超出部分视为尾部填充。
#[derive(Default)]
pub struct RecordBuilder {
    fields: Vec<RecordField>,
    size: Option<usize>,
}

impl RecordBuilder {
    /// 追加一个字段。
    pub fn field(
        mut self,
        name: impl Into<String>,
        offset: usize,
        descriptor: Arc<ElementDescriptor>,
    ) -> Self {
        self.fields.push(RecordField {
            name: name.into(),
            offset,
            descriptor,
        });
        self
    }

    /// 指定记录总大小（含尾部填充）。
    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// 校验布局不变量并生成描述符。
    pub fn build(self) -> Result<ElementDescriptor> {
        let mut cursor = 0usize;
        for (index, field) in self.fields.iter().enumerate() {
            if field.offset < cursor {
                return Err(ViewError::invalid_descriptor(format!(
                    "field `{}` at offset {} overlaps or precedes the previous field ending at {}",
                    field.name, field.offset, cursor
                )));
            }
            if self.fields[..index].iter().any(|prev| prev.name == field.name) {
                return Err(ViewError::invalid_descriptor(format!(
                    "duplicate field name `{}`",
                    field.name
                )));
            }
            cursor = field
                .offset
                .checked_add(field.descriptor.size())
                .ok_or_else(|| ViewError::invalid_descriptor("record size overflows usize"))?;
        }
        let size = match self.size {
            Some(size) if size < cursor => {
                return Err(ViewError::invalid_descriptor(format!(
                    "record size {size} is smaller than its last field end {cursor}"
                )));
            }
            Some(size) => size,
            None => cursor,
        };
        let mut descriptor =
            ElementDescriptor::raw(ElementKind::Record, ByteOrder::NotApplicable, size);
        descriptor.fields = self.fields;
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn double() -> Arc<ElementDescriptor> {
        let descriptor =
            ElementDescriptor::scalar(ElementKind::Double, ByteOrder::Little).expect("double");
        Arc::new(descriptor)
    }

    #[test]
    fn single_byte_types_drop_byte_order() {
        let byte = ElementDescriptor::scalar(ElementKind::UByte, ByteOrder::Big).expect("ubyte");
        assert_eq!(byte.byte_order(), ByteOrder::NotApplicable);
        let bytes = ElementDescriptor::bytes(4);
        assert_eq!(bytes.byte_order(), ByteOrder::NotApplicable);
    }

    #[test]
    fn record_size_defaults_to_last_field_end() {
        let record = ElementDescriptor::record()
            .field("a", 0, double())
            .field("b", 8, double())
            .build()
            .expect("合法记录");
        assert!(record.is_record());
        assert_eq!(record.size(), 16);
        assert_eq!(record.fields()[1].end(), 16);
    }

    #[test]
    fn overlapping_fields_are_rejected() {
        let err = ElementDescriptor::record()
            .field("a", 0, double())
            .field("b", 4, double())
            .build()
            .expect_err("重叠字段必须被拒绝");
        assert_eq!(err.code(), crate::codes::VIEW_INVALID_DESCRIPTOR);
    }

    #[test]
    fn undersized_record_is_rejected() {
        let err = ElementDescriptor::record()
            .field("a", 0, double())
            .size(4)
            .build()
            .expect_err("总大小不足必须被拒绝");
        assert!(matches!(err, ViewError::InvalidDescriptor { .. }));
    }

    #[test]
    fn long_double_width_follows_host_abi() {
        let long_double = ElementKind::LongDouble.native_size().expect("定宽");
        assert_eq!(long_double, LONG_DOUBLE_SIZE);
        assert_eq!(
            ElementKind::ComplexLongDouble.native_size(),
            Some(2 * long_double)
        );
        let descriptor = ElementDescriptor::scalar(ElementKind::LongDouble, ByteOrder::Native)
            .expect("long double");
        assert_eq!(descriptor.size(), long_double);
        if cfg!(all(target_arch = "x86_64", target_os = "linux")) {
            assert_eq!(long_double, 16);
        }
        if cfg!(all(target_arch = "aarch64", target_vendor = "apple")) {
            assert_eq!(long_double, 8);
        }
    }

    #[test]
    fn variable_width_kinds_have_no_scalar_constructor() {
        assert!(ElementDescriptor::scalar(ElementKind::Bytes, ByteOrder::NotApplicable).is_err());
        assert!(ElementDescriptor::scalar(ElementKind::Record, ByteOrder::NotApplicable).is_err());
    }

    #[test]
    fn failed_init_leaves_slot_empty() {
        let descriptor = ElementDescriptor::bytes(3);
        let failed: core::result::Result<&Arc<str>, &str> =
            descriptor.format_or_try_init(|_| Err("boom"));
        assert!(failed.is_err());
        assert!(descriptor.cached_format().is_none());

        let first = descriptor
            .format_or_try_init::<()>(|_| Ok(String::from("3s")))
            .expect("初始化成功")
            .clone();
        let second = descriptor
            .format_or_try_init::<()>(|_| panic!("已缓存时不得再次计算"))
            .expect("命中缓存");
        assert!(Arc::ptr_eq(&first, second));
    }

    #[test]
    fn subarray_size_is_product_of_shape() {
        let sub = ElementDescriptor::subarray(double(), alloc::vec![2, 3]).expect("子数组");
        assert!(sub.has_subarray_shape());
        assert_eq!(sub.size(), 48);
        assert_eq!(sub.subarray_shape().map(SubArrayShape::shape), Some(&[2usize, 3][..]));
    }
}
