//! Vulkan `pNext` 扩展链的拼装与遍历

use std::ffi::c_void;
use std::ptr;

use ash::vk;

/// 在已有链条的尾部依次追加节点
///
/// 链条成员必须在发起查询之前确定：一次 `vkGetPhysicalDevice*2`
/// 会填充链上的所有节点。
pub struct NextChainBuilder {
    tail: *mut vk::BaseOutStructure<'static>,
}

impl NextChainBuilder {
    /// 从 `head` 出发走到当前的链尾
    ///
    /// # Safety
    /// `head` 必须是以 `s_type` / `p_next` 开头的 Vulkan 结构体，链上所有节点都有效
    pub unsafe fn new<T>(head: &mut T) -> Self {
        let head = (head as *mut T).cast::<vk::BaseOutStructure<'static>>();
        let tail = unsafe { chain_iter_mut(head).last() }.unwrap_or(head);
        Self { tail }
    }

    /// # Safety
    /// `node` 必须是以 `s_type` / `p_next` 开头的 Vulkan 结构体，且在链条被使用期间不能移动或销毁
    pub unsafe fn push<T>(&mut self, node: &mut T) {
        let node = (node as *mut T).cast::<vk::BaseOutStructure<'static>>();
        unsafe {
            (*node).p_next = ptr::null_mut();
            (*self.tail).p_next = node;
        }
        self.tail = node;
    }
}

/// 从 `head` 开始（包含 head）遍历整条链
///
/// # Safety
/// 链上的每个节点都必须有效
pub unsafe fn chain_iter_mut(
    head: *mut vk::BaseOutStructure<'static>,
) -> impl Iterator<Item = *mut vk::BaseOutStructure<'static>> {
    let mut current = head;
    std::iter::from_fn(move || {
        if current.is_null() {
            return None;
        }
        let node = current;
        current = unsafe { (*node).p_next };
        Some(node)
    })
}

/// 在 `p_next` 链上按 `s_type` 查找节点
///
/// # Safety
/// 链上的每个节点都必须有效，且 `s_type` 对应的真实类型就是 `T`
pub unsafe fn find_in_chain<'a, T>(p_next: *const c_void, s_type: vk::StructureType) -> Option<&'a T> {
    unsafe { chain_iter_mut(p_next as *mut vk::BaseOutStructure<'static>) }
        .find(|&node| unsafe { (*node).s_type } == s_type)
        .map(|node| unsafe { &*(node as *const T) })
}

/// 同 [`find_in_chain`]，返回可变引用，用于填充查询结果
///
/// # Safety
/// 同 [`find_in_chain`]
pub unsafe fn find_in_chain_mut<'a, T>(p_next: *mut c_void, s_type: vk::StructureType) -> Option<&'a mut T> {
    unsafe { chain_iter_mut(p_next as *mut vk::BaseOutStructure<'static>) }
        .find(|&node| unsafe { (*node).s_type } == s_type)
        .map(|node| unsafe { &mut *(node as *mut T) })
}
