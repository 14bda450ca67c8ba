use std::sync::atomic::{AtomicBool, Ordering};

/// A minimal spin mutex for the writer install path.
///
/// Writers only ever hold this for a pointer swap plus a counter increment,
/// so spinning is cheaper than parking. Readers never touch it.
///
/// 写入者安装路径使用的最小自旋互斥锁。
/// 写入者持有它的时间只有一次指针交换加一次计数器自增，
/// 因此自旋比挂起线程更便宜。读取者永远不会接触它。
pub(crate) struct SpinLock {
    locked: AtomicBool,
}

impl SpinLock {
    pub(crate) const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Run `f` while holding the lock. The lock is released even if `f`
    /// panics.
    ///
    /// 持有锁的同时运行 `f`。即使 `f` panic，锁也会被释放。
    pub(crate) fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            std::hint::spin_loop();
        }

        let _unlock = Unlock(self);
        f()
    }
}

struct Unlock<'a>(&'a SpinLock);

impl Drop for Unlock<'_> {
    fn drop(&mut self) {
        self.0.locked.store(false, Ordering::Release);
    }
}
