use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering, fence};

/// 带引用计数的堆上对象
///
/// `value` 必须是第一个字段：对外句柄就是指向 `value` 的指针，
/// 与指向整个 `RefCounted` 的指针数值相同。
#[repr(C)]
pub struct RefCounted<T> {
    value: T,
    count: AtomicU64,
}

/// 线程安全的强引用
///
/// 与 `Arc` 的区别在于计数可以被 C ABI 直接操作（`AddRef` / `Release`），
/// 句柄就是裸指针。
///
/// # 计数约定
/// 对象创建时计数为 1，由创建者持有；跨越 ABI 边界时直接转移这一份引用
/// （[`RefPtr::into_raw`]），不会额外增加计数。
pub struct RefPtr<T> {
    ptr: NonNull<RefCounted<T>>,
    _marker: PhantomData<RefCounted<T>>,
}

unsafe impl<T: Send + Sync> Send for RefPtr<T> {}
unsafe impl<T: Send + Sync> Sync for RefPtr<T> {}

// 构造与销毁
impl<T> RefPtr<T> {
    pub fn new(value: T) -> Self {
        let boxed = Box::new(RefCounted {
            value,
            count: AtomicU64::new(1),
        });
        Self {
            ptr: NonNull::from(Box::leak(boxed)),
            _marker: PhantomData,
        }
    }

    /// 把这一份引用交给外部，返回对外句柄
    #[inline]
    pub fn into_raw(self) -> *const T {
        let ptr = self.ptr.as_ptr() as *const T;
        std::mem::forget(self);
        ptr
    }

    /// 从外部句柄收回一份引用，不改变计数
    ///
    /// # Safety
    /// `ptr` 必须来自 [`RefPtr::into_raw`]，且调用者确实持有这一份引用
    #[inline]
    pub unsafe fn from_raw(ptr: *const T) -> Self {
        Self {
            ptr: unsafe { NonNull::new_unchecked(ptr as *mut RefCounted<T>) },
            _marker: PhantomData,
        }
    }

    /// 借用一个仍然存活的对象，并增加一份引用
    ///
    /// # Safety
    /// `value` 必须位于某个 `RefPtr` 管理的分配之内
    #[inline]
    pub unsafe fn clone_from_ref(value: &T) -> Self {
        let this = Self {
            ptr: NonNull::from(value).cast::<RefCounted<T>>(),
            _marker: PhantomData,
        };
        this.inner().count.fetch_add(1, Ordering::Relaxed);
        this
    }

    /// 对外句柄的 `AddRef`
    ///
    /// # Safety
    /// `ptr` 必须是存活对象的句柄
    #[inline]
    pub unsafe fn add_ref_raw(ptr: *const T) {
        let inner = unsafe { &*(ptr as *const RefCounted<T>) };
        inner.count.fetch_add(1, Ordering::Relaxed);
    }

    /// 对外句柄的 `Release`，返回对象是否因此被销毁
    ///
    /// # Safety
    /// `ptr` 必须是存活对象的句柄，并且调用者持有一份引用
    #[inline]
    pub unsafe fn release_raw(ptr: *const T) -> bool {
        unsafe { Self::release_inner(NonNull::new_unchecked(ptr as *mut RefCounted<T>)) }
    }

    unsafe fn release_inner(ptr: NonNull<RefCounted<T>>) -> bool {
        let inner = unsafe { ptr.as_ref() };
        if inner.count.fetch_sub(1, Ordering::Release) != 1 {
            return false;
        }

        // 与其他线程的 Release 建立 happens-before，确保析构看到它们的写入
        fence(Ordering::Acquire);
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        true
    }
}

// getters
impl<T> RefPtr<T> {
    #[inline]
    fn inner(&self) -> &RefCounted<T> {
        unsafe { self.ptr.as_ref() }
    }

    /// 当前计数，只用于调试与测试
    #[inline]
    pub fn ref_count(this: &Self) -> u64 {
        this.inner().count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn as_ptr(this: &Self) -> *const T {
        this.ptr.as_ptr() as *const T
    }

    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        a.ptr == b.ptr
    }
}

impl<T> Clone for RefPtr<T> {
    #[inline]
    fn clone(&self) -> Self {
        self.inner().count.fetch_add(1, Ordering::Relaxed);
        Self {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<T> Drop for RefPtr<T> {
    #[inline]
    fn drop(&mut self) {
        unsafe {
            Self::release_inner(self.ptr);
        }
    }
}

impl<T> Deref for RefPtr<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.inner().value
    }
}

impl<T: fmt::Debug> fmt::Debug for RefPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    struct DropCounter(Arc<AtomicUsize>);
    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn starts_self_owned() {
        let drops = Arc::new(AtomicUsize::new(0));
        let ptr = RefPtr::new(DropCounter(drops.clone()));
        assert_eq!(RefPtr::ref_count(&ptr), 1);
        drop(ptr);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn raw_round_trip_keeps_count() {
        let drops = Arc::new(AtomicUsize::new(0));
        let raw = RefPtr::new(DropCounter(drops.clone())).into_raw();
        unsafe {
            RefPtr::add_ref_raw(raw);
            assert!(!RefPtr::release_raw(raw));
            let ptr = RefPtr::from_raw(raw);
            assert_eq!(RefPtr::ref_count(&ptr), 1);
            let again = RefPtr::clone_from_ref(&*ptr);
            assert_eq!(RefPtr::ref_count(&again), 2);
            drop(again);
            assert_eq!(drops.load(Ordering::SeqCst), 0);
            assert!(RefPtr::release_raw(RefPtr::into_raw(ptr)));
        }
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_add_ref_release_destroys_once() {
        const THREADS: usize = 8;
        const ROUNDS: usize = 10_000;

        let drops = Arc::new(AtomicUsize::new(0));
        let ptr = RefPtr::new(DropCounter(drops.clone()));

        let handles = (0..THREADS)
            .map(|_| {
                let local = ptr.clone();
                std::thread::spawn(move || {
                    for _ in 0..ROUNDS {
                        let raw = RefPtr::as_ptr(&local);
                        unsafe {
                            RefPtr::add_ref_raw(raw);
                            assert!(!RefPtr::release_raw(raw));
                        }
                        let extra = local.clone();
                        drop(extra);
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert_eq!(RefPtr::ref_count(&ptr), 1);
        drop(ptr);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn last_release_from_another_thread() {
        let drops = Arc::new(AtomicUsize::new(0));
        let ptr = RefPtr::new(DropCounter(drops.clone()));
        let other = ptr.clone();
        drop(ptr);
        std::thread::spawn(move || drop(other)).join().unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
