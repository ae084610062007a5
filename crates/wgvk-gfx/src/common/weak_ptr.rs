use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::common::ref_counted::RefPtr;

/// owner 与所有观察者共享的存活标记
struct LivenessFlag {
    alive: AtomicBool,
}

/// 不持有所有权的观察
///
/// 只在 [`WeakPtr::is_valid`] 返回 true 时才能解引用。
pub struct WeakPtr<T> {
    flag: Option<RefPtr<LivenessFlag>>,
    ptr: *const T,
}

unsafe impl<T: Sync> Send for WeakPtr<T> {}
unsafe impl<T: Sync> Sync for WeakPtr<T> {}

impl<T> WeakPtr<T> {
    /// 永远无效的观察
    pub fn null() -> Self {
        Self {
            flag: None,
            ptr: std::ptr::null(),
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.flag.as_ref().is_some_and(|flag| flag.alive.load(Ordering::Acquire))
    }

    /// 存活时返回引用
    #[inline]
    pub fn upgrade(&self) -> Option<&T> {
        if self.is_valid() { Some(unsafe { &*self.ptr }) } else { None }
    }

    /// # Safety
    /// 调用前必须确认 [`WeakPtr::is_valid`]，并保证 owner 在引用使用期间不会被销毁
    #[inline]
    pub unsafe fn get(&self) -> &T {
        debug_assert!(self.is_valid(), "dereferencing an invalidated WeakPtr");
        unsafe { &*self.ptr }
    }
}

impl<T> Clone for WeakPtr<T> {
    fn clone(&self) -> Self {
        Self {
            flag: self.flag.clone(),
            ptr: self.ptr,
        }
    }
}

impl<T> Default for WeakPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> fmt::Debug for WeakPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakPtr").field("ptr", &self.ptr).field("valid", &self.is_valid()).finish()
    }
}

/// 由 owner 持有，负责分发 [`WeakPtr`] 并在 teardown 时让它们全部失效
///
/// owner 必须位于稳定的地址上（例如 `RefPtr` 内部），
/// 否则分发出去的指针会在 owner 移动后悬空。
pub struct WeakPtrFactory<T> {
    flag: RefPtr<LivenessFlag>,
    _marker: std::marker::PhantomData<*const T>,
}

unsafe impl<T: Sync> Send for WeakPtrFactory<T> {}
unsafe impl<T: Sync> Sync for WeakPtrFactory<T> {}

impl<T> WeakPtrFactory<T> {
    pub fn new() -> Self {
        Self {
            flag: RefPtr::new(LivenessFlag {
                alive: AtomicBool::new(true),
            }),
            _marker: std::marker::PhantomData,
        }
    }

    /// 为 `owner` 生成一个观察；失效之后生成的观察同样无效
    pub fn get_weak_ptr(&self, owner: &T) -> WeakPtr<T> {
        WeakPtr {
            flag: Some(self.flag.clone()),
            ptr: owner as *const T,
        }
    }

    pub fn invalidate_weak_ptrs(&self) {
        self.flag.alive.store(false, Ordering::Release);
    }

    #[inline]
    pub fn has_weak_ptrs(&self) -> bool {
        RefPtr::ref_count(&self.flag) > 1
    }
}

impl<T> Default for WeakPtrFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for WeakPtrFactory<T> {
    fn drop(&mut self) {
        self.invalidate_weak_ptrs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Owner {
        value: u32,
        weak_factory: WeakPtrFactory<Owner>,
    }

    impl Owner {
        fn new(value: u32) -> RefPtr<Self> {
            RefPtr::new(Self {
                value,
                weak_factory: WeakPtrFactory::new(),
            })
        }
    }

    #[test]
    fn observation_expires_with_owner() {
        let owner = Owner::new(7);
        let weak = owner.weak_factory.get_weak_ptr(&owner);
        assert!(weak.is_valid());
        assert_eq!(weak.upgrade().map(|o| o.value), Some(7));
        assert!(owner.weak_factory.has_weak_ptrs());

        drop(owner);
        assert!(!weak.is_valid());
        assert!(weak.upgrade().is_none());
        // 之后一直保持无效
        let copy = weak.clone();
        assert!(!copy.is_valid());
    }

    #[test]
    fn explicit_invalidate_before_drop() {
        let owner = Owner::new(1);
        let weak = owner.weak_factory.get_weak_ptr(&owner);
        owner.weak_factory.invalidate_weak_ptrs();
        assert!(!weak.is_valid());

        let late = owner.weak_factory.get_weak_ptr(&owner);
        assert!(!late.is_valid());
    }

    #[test]
    fn null_is_never_valid() {
        let weak: WeakPtr<Owner> = WeakPtr::default();
        assert!(!weak.is_valid());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn observed_from_another_thread() {
        let owner = Owner::new(3);
        let weak = owner.weak_factory.get_weak_ptr(&owner);
        let seen = std::thread::spawn(move || weak.is_valid()).join().unwrap();
        assert!(seen);
    }
}
