#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]

//! `spark-view` 将带步长的类型化内存块导出为零拷贝视图。
//!
//! # 模块定位（Why）
//! - 外部消费者（数值库、图像库、序列化器）需要直接读写数组内存而不复制；
//!   它们只能理解“起始地址 + 长度 + 格式串 + 形状/步长”这一组描述；
//! - `spark-view-core` 只定义契约，本 crate 负责把契约落地为可运行的导出流程。
//!
//! # 设计概要（How）
//! - [`format`]：`FormatEncoder` 把元素描述符翻译为紧凑格式串，并缓存在描述符上；
//! - [`cache`]：`ViewCache` 为每个源缓冲维护布局快照，布局不变时复用同一个 `Arc`；
//! - [`guard`]：`LifetimeGuard` 统计未释放视图，`ViewPin` 在视图存活期间固定源缓冲；
//! - [`exporter`]：`BufferExporter` 按能力标志校验请求并组装 `ViewRecord`；
//! - [`ndbuffer`]：基于 `bytes::BytesMut` 的参考宿主 `NdBuffer`；
//! - [`config`]：可从 TOML 读取的 `ExportConfig`；
//! - [`legacy`]：已弃用的单段访问接口。
//!
//! # 命名约定（Consistency）
//! - 错误统一使用 `spark-view-core` 的 `ViewError`，需要稳定错误码时转换为 `CoreError`。

extern crate alloc;

pub mod cache;
pub mod config;
pub mod exporter;
pub mod format;
pub mod guard;
pub mod legacy;
pub mod ndbuffer;
pub mod state;

pub use cache::{LayoutSnapshot, ViewCache, ViewCacheStats};
pub use config::{DIMENSION_LIMIT, ExportConfig, MAX_DIMENSIONS};
pub use exporter::{BufferExporter, ViewRecord};
pub use format::{FIELD_NAME_SEPARATOR, FormatEncoder, PADDING_MARKER, WIDE_CHAR_UNIT, type_code};
pub use guard::{LifetimeGuard, ViewPin};
pub use ndbuffer::NdBuffer;
pub use state::{ExportState, Exportable};
