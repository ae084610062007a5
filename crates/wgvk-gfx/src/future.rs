//! 完成协议
//!
//! 所有请求都在调用线程上同步完成：成功发起的请求在返回之前就已经调用了回调，
//! 并返回 [`Future::IMMEDIATE`]。

/// 不透明的 64 位完成令牌
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Future {
    pub id: u64,
}

impl Future {
    /// 请求没有发起，例如回调为空
    pub const INVALID: Self = Self { id: 0 };
    /// 请求在发起时已经完成
    pub const IMMEDIATE: Self = Self { id: u64::MAX };

    #[inline]
    pub fn is_invalid(self) -> bool {
        self == Self::INVALID
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FutureWaitInfo {
    pub future: Future,
    pub completed: bool,
}

/// 把所有 `IMMEDIATE` 令牌标记为已完成
///
/// 不存在真正挂起的请求，`timeout` 没有意义；至少有一个令牌完成时返回 true。
pub fn wait_any(infos: &mut [FutureWaitInfo], _timeout_ns: u64) -> bool {
    let mut any = false;
    for info in infos.iter_mut() {
        if info.future == Future::IMMEDIATE {
            info.completed = true;
            any = true;
        }
    }
    any
}
