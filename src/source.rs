use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;

use crate::reclaimer::Reclaimer;
use crate::spin::SpinLock;

/// A refcounted handle to an immutable payload.
///
/// `None` models an intentionally absent payload; it is a valid state of a
/// source, distinct from any error. The payload itself is never mutated by
/// this crate, only dropped.
///
/// 指向不可变载荷的引用计数句柄。
/// `None` 表示载荷被有意置空，这是数据源的一个合法状态，而不是错误。
/// 本 crate 从不修改载荷本身，只负责 drop 它。
pub type Payload<T> = Option<Arc<T>>;

/// Process-wide serial for source identities.
/// 数据源身份的进程级序列号。
static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a [`Source`], minted from a process-wide counter at
/// construction. Unlike an address it can never be reused by a later
/// allocation, so per-thread cache slots keyed by it can never be inherited
/// by an unrelated source.
///
/// [`Source`] 的稳定身份，在构造时从进程级计数器铸造。
/// 与地址不同，它永远不会被后来的分配复用，
/// 因此以它为键的线程本地缓存槽位不可能被无关的数据源继承。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SourceId(u64);

impl SourceId {
    fn mint() -> Self {
        SourceId(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The authoritative slot: the globally visible payload plus its monotonic
/// version, replaceable without blocking readers.
///
/// Readers observe `(version, payload)` lock-free with acquire loads.
/// Writers serialize among themselves on a spin mutex; a displaced payload
/// handle is forwarded to the attached [`Reclaimer`], if any, so its
/// destructor runs off the update path.
///
/// **Thread Safety**: `Source` is `Send + Sync`; any thread may read, any
/// thread may write.
///
/// 权威槽位：全局可见的载荷及其单调版本号，可在不阻塞读取者的情况下被替换。
/// 读取者通过 acquire 加载无锁地观察 `(版本, 载荷)` 对。
/// 写入者之间通过自旋互斥锁串行化；被替换下来的载荷句柄会被转交给
/// 附加的 [`Reclaimer`]（如果有），使其析构离开更新路径。
pub struct Source<T: Send + Sync + 'static> {
    id: SourceId,
    current: ArcSwapOption<T>,
    version: AtomicU64,
    update_lock: SpinLock,
    reclaimer: Weak<Reclaimer>,
}

impl<T: Send + Sync + 'static> Source<T> {
    /// Create a source holding `initial`, with no reclaimer attached.
    /// Displaced payloads are then dropped wherever the last handle dies.
    ///
    /// 创建一个持有 `initial` 的数据源，不附加回收器。
    /// 被替换下来的载荷将在最后一个句柄消亡的线程上被 drop。
    pub fn new(initial: Payload<T>) -> Self {
        Self::build(initial, Weak::new())
    }

    /// Create a source whose displaced payloads are handed to `reclaimer`.
    ///
    /// The source keeps only a weak reference; keeping the reclaimer alive
    /// is the caller's concern (a [`Store`](crate::Store) does this).
    ///
    /// 创建一个数据源，其被替换的载荷交由 `reclaimer` 处理。
    /// 数据源只保留弱引用；让回收器存活是调用者的责任
    /// （[`Store`](crate::Store) 会代为持有）。
    pub fn with_reclaimer(initial: Payload<T>, reclaimer: &Arc<Reclaimer>) -> Self {
        Self::build(initial, Arc::downgrade(reclaimer))
    }

    fn build(initial: Payload<T>, reclaimer: Weak<Reclaimer>) -> Self {
        Self {
            id: SourceId::mint(),
            current: ArcSwapOption::new(initial),
            version: AtomicU64::new(0),
            update_lock: SpinLock::new(),
            reclaimer,
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> SourceId {
        self.id
    }

    #[inline]
    pub(crate) fn reclaimer(&self) -> Option<Arc<Reclaimer>> {
        self.reclaimer.upgrade()
    }

    /// The current version. Starts at 0 and increases by one on every
    /// accepted update; it is the system's only cross-thread ordering
    /// witness.
    ///
    /// 当前版本号。从 0 开始，每次被接受的更新加一；
    /// 它是系统中唯一的跨线程顺序见证。
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Atomically observe the version, then the payload.
    ///
    /// The payload is published before the version is incremented, so the
    /// returned payload always corresponds to the returned version or a
    /// newer one.
    ///
    /// 原子地先观察版本号，再观察载荷。
    /// 载荷先于版本号自增而发布，因此返回的载荷
    /// 总是对应返回的版本或更新的版本。
    pub fn load_current(&self) -> (u64, Payload<T>) {
        let version = self.version.load(Ordering::Acquire);
        let payload = self.current.load_full();
        (version, payload)
    }

    /// Observe the version; if it still equals `known_version`, return
    /// `None` without touching the payload — the caller already holds an
    /// equivalent handle. Otherwise return the fresh pair.
    ///
    /// This is what lets the read fast path skip the payload acquisition
    /// entirely.
    ///
    /// 观察版本号；若仍等于 `known_version`，则不触碰载荷直接返回
    /// `None` —— 调用者手中已有等价的句柄。否则返回新的版本与载荷。
    /// 这正是读取快路径得以完全跳过载荷获取的机制。
    pub fn load_if_newer(&self, known_version: u64) -> Option<(u64, Payload<T>)> {
        let version = self.version.load(Ordering::Acquire);
        if version == known_version {
            return None;
        }

        Some((version, self.current.load_full()))
    }

    /// Install `payload` as the current value and bump the version.
    ///
    /// Writers serialize on the update lock; readers are never blocked. The
    /// displaced handle is forwarded to the reclaimer after the lock is
    /// released, so a slow retirement never extends the writers' critical
    /// section.
    ///
    /// 将 `payload` 安装为当前值并递增版本号。
    /// 写入者在更新锁上串行化；读取者永远不会被阻塞。
    /// 被替换的句柄在释放锁之后才转交回收器，
    /// 因此缓慢的退休操作不会拉长写入者的临界区。
    pub fn update(&self, payload: Payload<T>) {
        let displaced = self.update_lock.with(|| {
            let displaced = self.current.swap(payload);
            self.version.fetch_add(1, Ordering::Release);
            displaced
        });

        if let Some(displaced) = displaced {
            if let Some(reclaimer) = self.reclaimer.upgrade() {
                reclaimer.retire(displaced);
            }
        }
    }
}

impl<T: Send + Sync + 'static> Drop for Source<T> {
    /// On teardown the final payload is handed to the reclaimer, if one is
    /// still alive, so that its destructor runs on the reclaimer's thread
    /// rather than whichever thread drops the source.
    ///
    /// 数据源析构时，若回收器仍然存活，最后的载荷会被转交给它，
    /// 使其析构运行在回收线程上，而不是恰好 drop 数据源的那个线程。
    fn drop(&mut self) {
        if let Some(reclaimer) = self.reclaimer.upgrade() {
            if let Some(last) = self.current.swap(None) {
                reclaimer.retire(last);
            }
        }
    }
}

impl<T: Send + Sync + 'static> std::fmt::Debug for Source<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("id", &self.id)
            .field("version", &self.version())
            .finish()
    }
}
