use alloc::sync::Arc;

use crate::descriptor::ElementDescriptor;

/// `StridedSource` 定义导出流程对源缓冲的全部读取需求。
///
/// # 设计背景（Why）
/// - 数组对象的存储分配、生命周期与类型注册都不属于导出核心；
///   导出器只需在请求发生的瞬间读取布局元数据与内存起点；
/// - 把这些读取收敛为一个 trait，宿主数组（或测试替身）实现它即可接入导出流程。
///
/// # 契约说明（What）
/// - `base_pointer`：首元素地址；只要源缓冲存活，该地址保持不变；
/// - `byte_length`：`item_size × ∏extent`，即元素数据的总字节数（不含步长空洞）；
/// - `extent_of`/`stride_of`：`axis < dimension_count()`，越界调用属于调用方错误；
/// - 连续性查询必须与当前形状/步长一致，实现可选择缓存判定结果；
/// - **前置条件**：同一缓冲上的导出与布局修改由调用方串行化，本 trait 不提供同步保证。
///
/// # Safety
/// 导出的视图会据此构造 `&[u8]`，实现方必须保证：
/// - 只要 `is_single_segment()` 为真且 `base_pointer()` 非空，
///   `[base_pointer(), base_pointer() + byte_length())` 在源缓冲存活期间可读，
///   且不与任何 `&mut` 访问重叠；
/// - 数据不可访问时返回空指针，而不是悬垂地址；
/// - 两次布局修改之间，各查询返回的形状、步长、长度与连续性判定彼此一致。
///   若布局可在 `&self` 上修改，实现类型不得是 `Sync`，否则另一线程的修改会
///   打破这一点。
#[allow(unsafe_code)]
pub unsafe trait StridedSource {
    /// 首元素地址。
    fn base_pointer(&self) -> *mut u8;

    /// 元素数据总字节数。
    fn byte_length(&self) -> usize;

    /// 单个元素的字节数。
    fn item_size(&self) -> usize;

    /// 是否只读。
    fn is_read_only(&self) -> bool;

    /// 维度数。
    fn dimension_count(&self) -> usize;

    /// 第 `axis` 维的长度。
    fn extent_of(&self, axis: usize) -> usize;

    /// 第 `axis` 维的字节步长，可为负。
    fn stride_of(&self, axis: usize) -> isize;

    /// 是否行优先连续。
    fn is_row_major_contiguous(&self) -> bool;

    /// 是否列优先连续。
    fn is_column_major_contiguous(&self) -> bool;

    /// 是否为单一内存段：行优先或列优先之一成立。
    fn is_single_segment(&self) -> bool {
        self.is_row_major_contiguous() || self.is_column_major_contiguous()
    }

    /// 元素描述符；多个缓冲可共享同一实例。
    fn element_descriptor(&self) -> &Arc<ElementDescriptor>;
}
