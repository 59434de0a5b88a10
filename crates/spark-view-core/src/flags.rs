use core::{fmt, ops};

/// `ExportFlags` 描述消费者在请求视图时声明的能力集合。
///
/// # 设计背景（Why）
/// - 消费者对视图的要求各不相同：有的只需要一段连续字节，有的需要形状与步长逐元素遍历，
///   有的还需要格式串解释元素类型；
/// - 以位集合表达这些要求，导出器即可按固定顺序逐项校验，且各项要求彼此正交。
///
/// # 契约说明（What）
/// - 空集合即 [`ExportFlags::SIMPLE`]：只要求一段连续内存，不返回形状、步长与格式串；
/// - 组合常量 [`STRIDED`](Self::STRIDED)、[`RECORDS`](Self::RECORDS)、[`FULL`](Self::FULL)
///   覆盖常见的请求形态；
/// - 位值只在进程内使用，不承诺与任何外部 ABI 的数值兼容。
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ExportFlags(u32);

impl ExportFlags {
    /// 只要求一段连续内存。
    pub const SIMPLE: Self = Self(0);
    /// 要求严格行优先（C 序）连续。
    pub const REQUIRE_ROW_MAJOR: Self = Self(1 << 0);
    /// 要求严格列优先（Fortran 序）连续。
    pub const REQUIRE_COLUMN_MAJOR: Self = Self(1 << 1);
    /// 要求行优先或列优先之一成立，即整体为单一内存段。
    pub const REQUIRE_ANY_CONTIGUOUS: Self = Self(1 << 2);
    /// 要求可写访问。
    pub const REQUIRE_WRITABLE: Self = Self(1 << 3);
    /// 要求返回元素格式串。
    pub const REQUIRE_FORMAT: Self = Self(1 << 4);
    /// 要求返回形状与步长。
    pub const REQUIRE_SHAPE_STRIDES: Self = Self(1 << 5);

    /// 形状 + 步长。
    pub const STRIDED: Self = Self::REQUIRE_SHAPE_STRIDES;
    /// 形状 + 步长 + 格式串，只读。
    pub const RECORDS: Self = Self(Self::STRIDED.0 | Self::REQUIRE_FORMAT.0);
    /// 形状 + 步长 + 格式串 + 可写。
    pub const FULL: Self = Self(Self::RECORDS.0 | Self::REQUIRE_WRITABLE.0);

    const ALL: u32 = (1 << 6) - 1;

    /// 由原始位值构造；未定义的位被丢弃。
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::ALL)
    }

    /// 返回原始位值。
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// 判断是否包含 `other` 的全部位。
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// 判断是否为空集合。
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// 返回并集。
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl ops::BitOr for ExportFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl ops::BitOrAssign for ExportFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ExportFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(ExportFlags, &str); 6] = [
            (ExportFlags::REQUIRE_ROW_MAJOR, "REQUIRE_ROW_MAJOR"),
            (ExportFlags::REQUIRE_COLUMN_MAJOR, "REQUIRE_COLUMN_MAJOR"),
            (ExportFlags::REQUIRE_ANY_CONTIGUOUS, "REQUIRE_ANY_CONTIGUOUS"),
            (ExportFlags::REQUIRE_WRITABLE, "REQUIRE_WRITABLE"),
            (ExportFlags::REQUIRE_FORMAT, "REQUIRE_FORMAT"),
            (ExportFlags::REQUIRE_SHAPE_STRIDES, "REQUIRE_SHAPE_STRIDES"),
        ];
        if self.is_empty() {
            return f.write_str("SIMPLE");
        }
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// 连续性种类，出现在 [`ViewError::NotContiguous`](crate::ViewError::NotContiguous) 中，
/// 指明哪一项要求未被满足。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Contiguity {
    /// 行优先（C 序）。
    RowMajor,
    /// 列优先（Fortran 序）。
    ColumnMajor,
    /// 行优先或列优先之一。
    Any,
    /// 单一内存段（未请求步长时的隐含要求）。
    SingleSegment,
}

impl fmt::Display for Contiguity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Contiguity::RowMajor => "row-major",
            Contiguity::ColumnMajor => "column-major",
            Contiguity::Any => "row-major or column-major",
            Contiguity::SingleSegment => "single-segment",
        })
    }
}
