#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![doc = "spark-view-core: 零拷贝视图导出的核心契约。"]
#![doc = ""]
#![doc = "本 crate 只定义“导出方需要知道什么”：元素描述符、源缓冲接口、请求能力标志与稳定错误码；"]
#![doc = "格式串编码、形状缓存、生命周期守卫等具体实现位于 `spark-view`。"]

//! # 模块定位（Why）
//! - 视图导出涉及两个外部协作方：持有内存的源缓冲，以及描述元素字节布局的类型描述符。
//!   将二者的契约独立成 crate，使宿主数组实现只需依赖轻量接口即可接入导出流程。
//!
//! # 结构概览（How）
//! - [`descriptor`]：`ElementDescriptor`、`ByteOrder`、`ElementKind` 以及记录类型构建器；
//! - [`source`]：`StridedSource` trait，列出导出流程对源缓冲的全部读取需求；
//! - [`layout`]：行优先/列优先连续性判定与步长推导；
//! - [`flags`]：`ExportFlags` 能力标志集合；
//! - [`error`]：`ViewError` 领域错误、`CoreError` 稳定错误与 [`codes`] 错误码。

extern crate alloc;

pub mod descriptor;
pub mod error;
pub mod flags;
pub mod layout;
pub mod source;

pub use descriptor::{
    ByteOrder, ElementDescriptor, ElementKind, RecordBuilder, RecordField, SubArrayShape,
};
pub use error::{CoreError, ErrorCause, Result, ViewError, codes};
pub use flags::{Contiguity, ExportFlags};
pub use layout::{
    MemoryOrder, column_major_strides, is_column_major, is_row_major, row_major_strides,
};
pub use source::StridedSource;
