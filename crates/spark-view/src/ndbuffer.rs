use alloc::{sync::Arc, vec::Vec};
use core::{
    cell::{Cell, RefCell},
    fmt,
};

use bytes::BytesMut;
use spark_view_core::{
    ElementDescriptor, MemoryOrder, Result, StridedSource, ViewError, column_major_strides,
    is_column_major, is_row_major, row_major_strides,
};
use crate::state::{ExportState, Exportable};

/// 形状、步长以及据此推导出的连续性判定。
#[derive(Debug)]
struct ArrayLayout {
    shape: Vec<usize>,
    strides: Vec<isize>,
    row_major: bool,
    column_major: bool,
}

impl ArrayLayout {
    fn new(shape: Vec<usize>, strides: Vec<isize>, item_size: usize) -> Self {
        let row_major = is_row_major(&shape, &strides, item_size);
        let column_major = is_column_major(&shape, &strides, item_size);
        Self {
            shape,
            strides,
            row_major,
            column_major,
        }
    }
}

/// `NdBuffer` 是基于 `BytesMut` 的带步长多维数组，用作导出流程的参考宿主。
///
/// # 设计背景（Why）
/// - 导出核心只依赖 [`StridedSource`] 与 [`Exportable`]，但完整链路需要一个真实持有内存、
///   能修改布局、能检查未释放视图的宿主；
/// - 内存只在构造时分配一次，之后修改形状或步长只替换元数据，已导出视图的指针始终有效。
///
/// # 逻辑解析（How）
/// - `storage` 持有整块分配，`base` 为首元素地址（`storage` 起点加 `byte_offset`）；
/// - 形状与步长位于 `RefCell` 中，修改时整体替换并重算连续性判定；
/// - 每次设置布局都校验所有可达元素落在 `storage` 范围内，越界返回
///   [`ViewError::InvalidLayout`]。
///
/// # 契约说明（What）
/// - **线程**：类型是 `Send` 但不是 `Sync`。布局可在 `&self` 上修改，若允许跨线程共享，
///   一次导出可能读到两份不同布局拼出的长度与连续性；需要共享时由调用方外加锁；
/// - **销毁**：[`destroy`](Self::destroy) 在存在未释放视图时拒绝销毁；每个视图各持有一个 `Arc`，
///   视图存活期间数组不会被隐式丢弃。
///
/// # 风险与取舍（Trade-offs）
/// - 视图可经由裸指针写入 `storage`，本类型不对元素数据做任何同步，写入协调属于消费者职责。
///
/// 跨线程共享同一个数组无法通过编译：
///
/// ```compile_fail
/// fn shared<T: Sync>() {}
/// shared::<spark_view::NdBuffer>();
/// ```
pub struct NdBuffer {
    storage: BytesMut,
    base: *mut u8,
    byte_offset: usize,
    descriptor: Arc<ElementDescriptor>,
    layout: RefCell<ArrayLayout>,
    writable: Cell<bool>,
    exports: ExportState,
}

impl NdBuffer {
    /// 按给定形状与内存顺序分配全零、连续且可写的数组。
    pub fn zeroed(
        descriptor: Arc<ElementDescriptor>,
        shape: &[usize],
        order: MemoryOrder,
    ) -> Result<Self> {
        let item_size = descriptor.size();
        let strides = match order {
            MemoryOrder::RowMajor => row_major_strides(shape, item_size),
            MemoryOrder::ColumnMajor => column_major_strides(shape, item_size),
        }
        .ok_or_else(|| ViewError::invalid_layout("strides overflow isize"))?;
        let len = element_bytes(shape, item_size)?;
        Self::from_parts(descriptor, BytesMut::zeroed(len), 0, shape.to_vec(), strides)
    }

    /// 用既有存储与任意布局构造数组。
    ///
    /// # 错误
    /// - 形状与步长长度不一致，或任一可达元素超出 `storage`：[`ViewError::InvalidLayout`]。
    pub fn from_parts(
        descriptor: Arc<ElementDescriptor>,
        mut storage: BytesMut,
        byte_offset: usize,
        shape: Vec<usize>,
        strides: Vec<isize>,
    ) -> Result<Self> {
        let item_size = descriptor.size();
        check_bounds(storage.len(), byte_offset, item_size, &shape, &strides)?;
        let base = storage.as_mut_ptr().wrapping_add(byte_offset);
        Ok(Self {
            storage,
            base,
            byte_offset,
            descriptor,
            layout: RefCell::new(ArrayLayout::new(shape, strides, item_size)),
            writable: Cell::new(true),
            exports: ExportState::new(),
        })
    }

    /// 替换形状与步长；只修改元数据，底层内存不移动。
    ///
    /// 已导出的视图继续引用旧快照，下一次请求步长的导出会得到新快照。
    pub fn set_layout(&self, shape: Vec<usize>, strides: Vec<isize>) -> Result<()> {
        let item_size = self.item_size();
        check_bounds(
            self.storage.len(),
            self.byte_offset,
            item_size,
            &shape,
            &strides,
        )?;
        self.layout.replace(ArrayLayout::new(shape, strides, item_size));
        Ok(())
    }

    /// 切换可写标志。
    pub fn set_writable(&self, writable: bool) {
        self.writable.set(writable);
    }

    /// 元素描述符。
    pub fn descriptor(&self) -> &Arc<ElementDescriptor> {
        &self.descriptor
    }

    /// 首元素相对于存储起点的字节偏移。
    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    /// 当前形状的副本。
    pub fn shape(&self) -> Vec<usize> {
        self.layout.borrow().shape.clone()
    }

    /// 当前步长的副本。
    pub fn strides(&self) -> Vec<isize> {
        self.layout.borrow().strides.clone()
    }

    /// 销毁数组。
    ///
    /// 仍有未释放视图或其他句柄时拒绝销毁，并原样交还句柄。
    pub fn destroy(self: Arc<Self>) -> core::result::Result<(), Arc<Self>> {
        if let Err(err) = self.exports.guard().ensure_idle() {
            tracing::warn!(error = %err, "refusing to destroy buffer with outstanding views");
            return Err(self);
        }
        Arc::try_unwrap(self).map(drop)
    }
}

// SAFETY: `base` 指向 `storage` 内部，`check_bounds` 保证当前布局的所有可达元素落在
// `storage` 中，单一内存段时即覆盖 `[base, base + byte_length())`；`storage` 构造后
// 从不重新分配。布局只在 `set_layout` 中整体替换，且类型不是 `Sync`，同一次导出内的
// 各项查询读到的是同一份布局。
#[allow(unsafe_code)]
unsafe impl StridedSource for NdBuffer {
    fn base_pointer(&self) -> *mut u8 {
        self.base
    }

    fn byte_length(&self) -> usize {
        let layout = self.layout.borrow();
        layout.shape.iter().product::<usize>() * self.item_size()
    }

    fn item_size(&self) -> usize {
        self.descriptor.size()
    }

    fn is_read_only(&self) -> bool {
        !self.writable.get()
    }

    fn dimension_count(&self) -> usize {
        self.layout.borrow().shape.len()
    }

    fn extent_of(&self, axis: usize) -> usize {
        self.layout.borrow().shape[axis]
    }

    fn stride_of(&self, axis: usize) -> isize {
        self.layout.borrow().strides[axis]
    }

    fn is_row_major_contiguous(&self) -> bool {
        self.layout.borrow().row_major
    }

    fn is_column_major_contiguous(&self) -> bool {
        self.layout.borrow().column_major
    }

    fn element_descriptor(&self) -> &Arc<ElementDescriptor> {
        &self.descriptor
    }
}

impl Exportable for NdBuffer {
    fn export_state(&self) -> &ExportState {
        &self.exports
    }
}

impl fmt::Debug for NdBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = self.layout.borrow();
        f.debug_struct("NdBuffer")
            .field("descriptor", &self.descriptor)
            .field("byte_offset", &self.byte_offset)
            .field("shape", &layout.shape)
            .field("strides", &layout.strides)
            .field("writable", &!self.is_read_only())
            .field("exports", &self.exports)
            .finish()
    }
}

// SAFETY: `base` 指向 `storage` 自身持有的分配，随 `storage` 一起转移所有权，
// `storage` 构造后从不重新分配或移动。刻意不实现 `Sync`。
#[allow(unsafe_code)]
unsafe impl Send for NdBuffer {}

fn element_bytes(shape: &[usize], item_size: usize) -> Result<usize> {
    shape
        .iter()
        .try_fold(item_size, |acc, &extent| acc.checked_mul(extent))
        .ok_or_else(|| ViewError::invalid_layout("array size overflows usize"))
}

/// 校验所有可达元素都位于 `[0, storage_len)` 内。
fn check_bounds(
    storage_len: usize,
    byte_offset: usize,
    item_size: usize,
    shape: &[usize],
    strides: &[isize],
) -> Result<()> {
    if shape.len() != strides.len() {
        return Err(ViewError::invalid_layout(alloc::format!(
            "shape has {} dimensions but strides has {}",
            shape.len(),
            strides.len()
        )));
    }
    element_bytes(shape, item_size)?;
    if byte_offset > storage_len {
        return Err(ViewError::invalid_layout("byte offset lies past the storage end"));
    }
    if shape.contains(&0) {
        return Ok(());
    }

    let overflow = || ViewError::invalid_layout("stride span overflows isize");
    let (mut low, mut high) = (0isize, 0isize);
    for (&extent, &stride) in shape.iter().zip(strides) {
        let last = isize::try_from(extent - 1).map_err(|_| overflow())?;
        let span = stride.checked_mul(last).ok_or_else(overflow)?;
        if span < 0 {
            low = low.checked_add(span).ok_or_else(overflow)?;
        } else {
            high = high.checked_add(span).ok_or_else(overflow)?;
        }
    }

    let offset = isize::try_from(byte_offset).map_err(|_| overflow())?;
    let first = offset.checked_add(low).ok_or_else(overflow)?;
    let item = isize::try_from(item_size).map_err(|_| overflow())?;
    let end = offset
        .checked_add(high)
        .and_then(|last| last.checked_add(item))
        .ok_or_else(overflow)?;
    if first < 0 || usize::try_from(end).map_or(true, |end| end > storage_len) {
        return Err(ViewError::invalid_layout(alloc::format!(
            "elements span bytes [{first}, {end}) outside storage of {storage_len} bytes"
        )));
    }
    Ok(())
}
