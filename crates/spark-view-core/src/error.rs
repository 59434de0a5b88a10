use alloc::{borrow::Cow, boxed::Box, string::String, string::ToString};
use core::{error::Error as StdError, fmt};

use thiserror::Error;

use crate::{descriptor::ElementKind, flags::Contiguity};

/// 视图导出相关的稳定错误码。
///
/// # 设计背景（Why）
/// - 导出失败会跨越 FFI 或宿主语言边界呈现给消费者，错误码需要保持稳定，
///   便于日志检索与告警聚合；
/// - 命名遵循 `<领域>.<语义>` 约定，与框架其余错误码保持同一风格。
pub mod codes {
    /// 元素类型内嵌子数组形状，无法用格式串语法表达。
    pub const VIEW_UNSUPPORTED_LAYOUT: &str = "view.unsupported_layout";
    /// 记录字段名包含保留分隔符或无法编码。
    pub const VIEW_INVALID_FIELD_NAME: &str = "view.invalid_field_name";
    /// 宽字符串字节长度不是宽字符单元的整数倍。
    pub const VIEW_INVALID_WIDTH: &str = "view.invalid_width";
    /// 元素类型不在格式串语法覆盖范围内。
    pub const VIEW_UNKNOWN_ELEMENT_TYPE: &str = "view.unknown_element_type";
    /// 源缓冲不满足请求的连续性。
    pub const VIEW_NOT_CONTIGUOUS: &str = "view.not_contiguous";
    /// 请求写访问但源缓冲只读。
    pub const VIEW_NOT_WRITABLE: &str = "view.not_writable";
    /// 形状缓存扩容失败。
    pub const VIEW_ALLOCATION_FAILURE: &str = "view.allocation_failure";
    /// 源缓冲仍有未释放的视图。
    pub const VIEW_BUFFER_IN_USE: &str = "view.buffer_in_use";
    /// 访问了不存在的内存段。
    pub const VIEW_SEGMENT_OUT_OF_RANGE: &str = "view.segment_out_of_range";
    /// 维度数超过导出上限。
    pub const VIEW_TOO_MANY_DIMENSIONS: &str = "view.too_many_dimensions";
    /// 元素描述符违反记录布局不变量。
    pub const VIEW_INVALID_DESCRIPTOR: &str = "view.invalid_descriptor";
    /// 源缓冲的形状/步长越出其内存范围。
    pub const VIEW_INVALID_LAYOUT: &str = "view.invalid_layout";
    /// 导出配置非法。
    pub const CONFIG_INVALID: &str = "config.invalid";
}

/// `ViewError` 汇总格式串编码与视图导出路径上的全部失败。
///
/// # 教案式说明
/// - **意图 (Why)**：编码器与导出器的失败都是结构性的（布局、权限、类型），
///   重试不会改变结果，因此统一以同步错误返回给调用方；
/// - **契约 (What)**：
///   - 所有变体均 `Send + Sync + 'static`，可跨线程传播；
///   - [`ViewError::code`] 返回 [`codes`] 中的稳定错误码；
///   - 通过 `From<ViewError> for CoreError` 转换为框架统一错误；
/// - **设计权衡 (Trade-offs)**：字段名、详情以 `String` 保存，失败路径上的少量分配换取可读的排障信息。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum ViewError {
    /// 元素描述符（或其字段）声明了子数组形状。
    #[error("data types with sub-arrays cannot be exported as buffers")]
    UnsupportedLayout,

    /// 字段名包含保留字符。
    #[error("invalid buffer field name `{name}`: {reason}")]
    InvalidFieldName { name: String, reason: &'static str },

    /// 宽字符串的字节长度无法被宽字符单元整除。
    #[error("wide string of {size} bytes is not a multiple of the {unit}-byte character unit")]
    InvalidWidth { size: usize, unit: usize },

    /// 元素类型不在格式串语法中。
    #[error("unknown element type {kind:?}")]
    UnknownElementType { kind: ElementKind },

    /// 连续性校验失败。
    #[error("buffer is not {required} contiguous")]
    NotContiguous { required: Contiguity },

    /// 请求写访问但缓冲只读。
    #[error("buffer cannot be accessed as a writable buffer")]
    NotWritable,

    /// 形状/步长快照的分配失败。
    #[error("failed to allocate layout snapshot for {ndim} dimensions")]
    AllocationFailure { ndim: usize },

    /// 仍有视图引用源缓冲。
    #[error("buffer still has {outstanding} outstanding view(s)")]
    BufferInUse { outstanding: usize },

    /// 旧式分段访问请求了不存在的段。
    #[error("accessing non-existing buffer segment {segment}")]
    SegmentOutOfRange { segment: usize },

    /// 维度数超过配置上限。
    #[error("buffer has {ndim} dimensions, export limit is {max}")]
    TooManyDimensions { ndim: usize, max: usize },

    /// 元素描述符本身非法。
    #[error("invalid element descriptor: {detail}")]
    InvalidDescriptor { detail: String },

    /// 源缓冲的形状/步长与其内存不符。
    #[error("invalid buffer layout: {detail}")]
    InvalidLayout { detail: String },
}

impl ViewError {
    /// 返回与变体一一对应的稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            ViewError::UnsupportedLayout => codes::VIEW_UNSUPPORTED_LAYOUT,
            ViewError::InvalidFieldName { .. } => codes::VIEW_INVALID_FIELD_NAME,
            ViewError::InvalidWidth { .. } => codes::VIEW_INVALID_WIDTH,
            ViewError::UnknownElementType { .. } => codes::VIEW_UNKNOWN_ELEMENT_TYPE,
            ViewError::NotContiguous { .. } => codes::VIEW_NOT_CONTIGUOUS,
            ViewError::NotWritable => codes::VIEW_NOT_WRITABLE,
            ViewError::AllocationFailure { .. } => codes::VIEW_ALLOCATION_FAILURE,
            ViewError::BufferInUse { .. } => codes::VIEW_BUFFER_IN_USE,
            ViewError::SegmentOutOfRange { .. } => codes::VIEW_SEGMENT_OUT_OF_RANGE,
            ViewError::TooManyDimensions { .. } => codes::VIEW_TOO_MANY_DIMENSIONS,
            ViewError::InvalidDescriptor { .. } => codes::VIEW_INVALID_DESCRIPTOR,
            ViewError::InvalidLayout { .. } => codes::VIEW_INVALID_LAYOUT,
        }
    }

    /// 便捷构造：描述符非法。
    pub fn invalid_descriptor(detail: impl Into<String>) -> Self {
        ViewError::InvalidDescriptor {
            detail: detail.into(),
        }
    }

    /// 便捷构造：布局非法。
    pub fn invalid_layout(detail: impl Into<String>) -> Self {
        ViewError::InvalidLayout {
            detail: detail.into(),
        }
    }
}

/// `CoreError` 是跨层共享的稳定错误形态：错误码 + 消息 + 可选底层原因。
///
/// # 设计背景（Why）
/// - 旧式分段访问、配置加载等外围入口需要与宿主的通用错误通道对接，
///   这类调用方只关心稳定错误码与可读消息；
/// - 领域错误 [`ViewError`] 通过 `From` 无损地折叠到此形态，`code()` 保持一致。
///
/// # 契约说明（What）
/// - `code`：`<领域>.<语义>` 形式的 `'static` 字符串；
/// - `message`：面向排障人员的描述，不含敏感信息；
/// - `cause`：可选底层原因，经 [`StdError::source`] 暴露。
#[derive(Debug)]
pub struct CoreError {
    code: &'static str,
    message: Cow<'static, str>,
    cause: Option<ErrorCause>,
}

/// `ErrorCause` 封装底层原因，保持 `Send + Sync` 以方便跨线程传递。
pub type ErrorCause = Box<dyn StdError + Send + Sync + 'static>;

/// 视图导出路径的统一返回值别名，默认错误类型为 [`ViewError`]。
pub type Result<T, E = ViewError> = core::result::Result<T, E>;

impl CoreError {
    /// 构造核心错误。
    ///
    /// # 示例（Examples）
    /// ```rust
    /// use spark_view_core::{CoreError, codes};
    ///
    /// let err = CoreError::new(codes::VIEW_NOT_WRITABLE, "只读缓冲");
    /// assert_eq!(err.code(), codes::VIEW_NOT_WRITABLE);
    /// assert!(err.cause().is_none());
    /// ```
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// 附带底层原因并返回新的核心错误。
    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// 获取稳定错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 获取描述。
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 获取底层原因。
    pub fn cause(&self) -> Option<&ErrorCause> {
        self.cause.as_ref()
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl StdError for CoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_ref()
            .map(|boxed| boxed.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<ViewError> for CoreError {
    fn from(err: ViewError) -> Self {
        CoreError::new(err.code(), err.to_string()).with_cause(err)
    }
}
