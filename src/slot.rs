use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use crate::source::{Payload, SourceId};

/// Per-(thread, source) scratch area backing the read fast path.
///
/// Whenever `ref_count > 0`, `raw_ptr` points into the object owned by
/// `handle` (or is null for an absent payload) and `handle` is not replaced
/// or dropped. The slot is strictly private to its owning thread; nothing
/// here needs cross-thread ordering.
///
/// 支撑读取快路径的、每个（线程，数据源）组合一份的暂存区。
/// 只要 `ref_count > 0`，`raw_ptr` 就指向 `handle` 拥有的对象
/// （载荷缺失时为空指针），且 `handle` 不会被替换或 drop。
/// 槽位严格归属其所有线程私有，这里的任何字段都不需要跨线程排序。
pub(crate) struct CacheSlot<T> {
    initialized: Cell<bool>,
    version: Cell<u64>,
    raw_ptr: Cell<*const T>,
    ref_count: Cell<u64>,
    release_scheduled: Cell<bool>,
    handle: RefCell<Payload<T>>,
}

impl<T> CacheSlot<T> {
    fn new() -> Self {
        Self {
            initialized: Cell::new(false),
            version: Cell::new(0),
            raw_ptr: Cell::new(std::ptr::null()),
            ref_count: Cell::new(0),
            release_scheduled: Cell::new(false),
            handle: RefCell::new(None),
        }
    }

    #[inline]
    pub(crate) fn initialized(&self) -> bool {
        self.initialized.get()
    }

    #[inline]
    pub(crate) fn version(&self) -> u64 {
        self.version.get()
    }

    #[inline]
    pub(crate) fn raw_ptr(&self) -> *const T {
        self.raw_ptr.get()
    }

    #[inline]
    pub(crate) fn ref_count(&self) -> u64 {
        self.ref_count.get()
    }

    #[inline]
    pub(crate) fn set_ref_count(&self, count: u64) {
        self.ref_count.set(count);
    }

    #[inline]
    pub(crate) fn release_scheduled(&self) -> bool {
        self.release_scheduled.get()
    }

    #[inline]
    pub(crate) fn set_release_scheduled(&self, scheduled: bool) {
        self.release_scheduled.set(scheduled);
    }

    /// Install a fresh `(version, payload)` pair and return the previous
    /// handle. The slot is fully consistent before the previous handle is
    /// released, so a payload destructor re-entering this slot sees the new
    /// state.
    ///
    /// 安装新的 `(版本, 载荷)` 对并返回之前的句柄。
    /// 在释放旧句柄之前槽位已完全一致，
    /// 因此载荷析构中重入此槽位的代码看到的是新状态。
    pub(crate) fn install(&self, version: u64, payload: Payload<T>) -> Payload<T> {
        let raw = payload
            .as_ref()
            .map_or(std::ptr::null(), |handle| Arc::as_ptr(handle));
        let previous = self.handle.replace(payload);
        self.raw_ptr.set(raw);
        self.version.set(version);
        self.initialized.set(true);
        previous
    }

    /// Evict the slot: empty the handle, null the pointer, roll the version
    /// back by one so the next load is forced onto the slow path, and clear
    /// the release flag. Returns the evicted handle for the caller to drop
    /// once the slot state is settled.
    ///
    /// 驱逐槽位：清空句柄、置空指针、把版本号回退一，
    /// 迫使下一次加载走慢路径，并清除释放标记。
    /// 返回被驱逐的句柄，待槽位状态落定后由调用者 drop。
    pub(crate) fn evict(&self) -> Payload<T> {
        let evicted = self.handle.replace(None);
        self.raw_ptr.set(std::ptr::null());
        self.version.set(self.version.get().wrapping_sub(1));
        self.release_scheduled.set(false);
        evicted
    }

    pub(crate) fn state(&self) -> SlotState {
        SlotState {
            initialized: self.initialized.get(),
            version: self.version.get(),
            ref_count: self.ref_count.get(),
            release_scheduled: self.release_scheduled.get(),
            holds_payload: self.handle.borrow().is_some(),
        }
    }
}

/// A point-in-time view of the calling thread's cache slot for one source.
///
/// This is diagnostic surface: tests and callers tuning
/// [`load_with_tls_release`](crate::Store::load_with_tls_release) use it to
/// observe eviction and nesting, and it never exposes the payload itself.
///
/// 调用线程针对某个数据源的缓存槽位在某一时刻的视图。
/// 这是诊断接口：测试以及调优
/// [`load_with_tls_release`](crate::Store::load_with_tls_release)
/// 的调用者用它观察驱逐与嵌套情况，它从不暴露载荷本身。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotState {
    pub initialized: bool,
    pub version: u64,
    pub ref_count: u64,
    pub release_scheduled: bool,
    pub holds_payload: bool,
}

thread_local! {
    /// One table per thread, keyed by source serial. Entries are dropped
    /// when the thread exits (running each slot's destructor, which drops
    /// any held handle) or when the reader for that source is dropped on
    /// this thread, whichever comes first.
    ///
    /// 每个线程一张表，以数据源序列号为键。
    /// 表项在线程退出时被销毁（运行槽位析构，进而 drop 其持有的句柄），
    /// 或在该数据源的读取者于本线程被 drop 时移除，两者取先。
    static SLOTS: RefCell<HashMap<SourceId, Rc<dyn Any>>> = RefCell::new(HashMap::new());
}

/// Resolve (lazily creating) the calling thread's slot for `id`.
/// 解析（必要时惰性创建）调用线程上 `id` 对应的槽位。
pub(crate) fn slot_for<T: 'static>(id: SourceId) -> Rc<CacheSlot<T>> {
    SLOTS.with(|slots| {
        let mut slots = slots.borrow_mut();
        let slot = slots
            .entry(id)
            .or_insert_with(|| Rc::new(CacheSlot::<T>::new()) as Rc<dyn Any>);
        Rc::clone(slot)
            .downcast::<CacheSlot<T>>()
            .unwrap_or_else(|_| {
                unreachable!("BUG: cache slot type confusion; source serials never collide")
            })
    })
}

/// Remove the calling thread's slot for `id`, dropping its handle here.
/// Other threads' slots for the same source stay until those threads exit;
/// with serial identities they can never be revived by a later source.
///
/// 移除调用线程上 `id` 对应的槽位，并在此处 drop 其句柄。
/// 其他线程上同一数据源的槽位会保留到各自线程退出；
/// 由于身份是序列号，它们不可能被之后的数据源复活。
pub(crate) fn drop_local_slot(id: SourceId) {
    // try_with: the reader may itself be dropped from a TLS destructor
    // after this thread's table is already gone.
    let _ = SLOTS.try_with(|slots| {
        if let Ok(mut slots) = slots.try_borrow_mut() {
            slots.remove(&id);
        }
    });
}
