use std::marker::PhantomData;
use std::ops::Deref;
use std::rc::Rc;

use crate::slot::CacheSlot;

/// RAII pin over one thread's snapshot of a source.
///
/// While any guard for a source is alive on a thread, every further
/// [`load`](crate::Store::load) on that source from the same thread reuses
/// the pinned snapshot, even if writers have published newer payloads in the
/// meantime. That is the snapshot-isolation contract: reads nested inside an
/// outer guard are mutually coherent.
///
/// Guards are for stack use only. They are `!Send` and `!Sync`, bound to the
/// lifetime of the reader they came from, and the reference returned by
/// [`Deref`] cannot outlive the guard. Copying the raw pointer out of the
/// scope is not a supported use.
///
/// 对某线程在某数据源上的快照的 RAII 钉定。
/// 只要线程上还有该数据源的守卫存活，同线程后续的
/// [`load`](crate::Store::load) 都会复用被钉定的快照，
/// 即使写入者在此期间发布了更新的载荷。
/// 这就是快照隔离契约：嵌套在外层守卫内的读取彼此一致。
///
/// 守卫只应在栈上使用。它是 `!Send` 且 `!Sync` 的，
/// 生命周期绑定到产生它的读取者，[`Deref`] 返回的引用不能比守卫活得更久。
/// 把裸指针拷贝出作用域不是被支持的用法。
#[must_use]
pub struct Guard<'a, T> {
    slot: Rc<CacheSlot<T>>,
    _scope: PhantomData<&'a ()>,
}

impl<'a, T> Guard<'a, T> {
    /// Pin `slot` by bumping its in-thread nesting depth.
    /// 通过增加线程内嵌套深度来钉定 `slot`。
    pub(crate) fn attach(slot: Rc<CacheSlot<T>>) -> Self {
        slot.set_ref_count(slot.ref_count() + 1);
        Guard {
            slot,
            _scope: PhantomData,
        }
    }

    /// `false` iff the pinned payload is absent.
    /// 当且仅当被钉定的载荷缺失时为 `false`。
    #[inline]
    pub fn is_present(&self) -> bool {
        !self.slot.raw_ptr().is_null()
    }

    /// Checked access to the pinned payload.
    ///
    /// Deliberately not named `get`: the guard derefs to `T`, and a method
    /// named `get` would shadow `T`'s own (`HashMap::get` and friends).
    ///
    /// 对被钉定载荷的受检访问。
    /// 刻意不命名为 `get`：守卫会解引用为 `T`，
    /// 名为 `get` 的方法会遮蔽 `T` 自己的同名方法（如 `HashMap::get`）。
    #[inline]
    pub fn payload(&self) -> Option<&T> {
        let ptr = self.slot.raw_ptr();
        if ptr.is_null() {
            return None;
        }
        // SAFETY: `ptr` points into the payload owned by the slot's handle.
        // The handle is only replaced or dropped while the slot's ref count
        // is zero, and this guard holds the count above zero; the returned
        // reference is bound to `&self`, so it cannot outlive the guard.
        Some(unsafe { &*ptr })
    }

    /// The version the pinned snapshot was produced from.
    /// 被钉定快照所来自的版本号。
    #[inline]
    pub fn version(&self) -> u64 {
        self.slot.version()
    }

    /// In-thread nesting depth of the underlying slot.
    /// 底层槽位在本线程内的嵌套深度。
    #[inline]
    pub fn ref_count(&self) -> u64 {
        self.slot.ref_count()
    }

    /// Mark the slot for eviction when the outermost guard in the current
    /// nesting is destroyed. The next load after eviction takes the slow
    /// path and re-acquires from the source.
    ///
    /// 标记槽位在当前嵌套的最外层守卫析构时被驱逐。
    /// 驱逐之后的下一次加载会走慢路径并重新向数据源获取。
    #[inline]
    pub fn schedule_release(&self) {
        self.slot.set_release_scheduled(true);
    }

    /// Cancel a scheduled eviction.
    /// 取消已安排的驱逐。
    #[inline]
    pub fn retain(&self) {
        self.slot.set_release_scheduled(false);
    }

    /// Whether eviction is scheduled for the underlying slot.
    /// 底层槽位是否已被安排驱逐。
    #[inline]
    pub fn release_scheduled(&self) -> bool {
        self.slot.release_scheduled()
    }
}

impl<'a, T> Deref for Guard<'a, T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the pinned payload is absent; use [`Guard::payload`] or
    /// [`Guard::is_present`] when absence is an expected state.
    ///
    /// 若被钉定的载荷缺失则 panic；
    /// 当缺失是预期状态时请使用 [`Guard::payload`] 或 [`Guard::is_present`]。
    #[inline]
    fn deref(&self) -> &T {
        self.payload()
            .expect("dereferenced a guard whose pinned payload is absent")
    }
}

impl<'a, T> Drop for Guard<'a, T> {
    fn drop(&mut self) {
        let ref_count = self.slot.ref_count();

        assert!(
            ref_count > 0,
            "BUG: dropping a guard over a slot with a zero ref count. \
             This indicates incorrect API usage or a library bug."
        );

        self.slot.set_ref_count(ref_count - 1);

        if ref_count == 1 && self.slot.release_scheduled() {
            // Dropped after the slot state is settled, in case the payload
            // destructor re-enters this slot.
            let _evicted = self.slot.evict();
        }
    }
}

impl<'a, T: std::fmt::Debug> std::fmt::Debug for Guard<'a, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard")
            .field("version", &self.version())
            .field("payload", &self.payload())
            .finish()
    }
}
