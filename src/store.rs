use std::sync::Arc;

use crate::guard::Guard;
use crate::reader::Reader;
use crate::reclaimer::Reclaimer;
use crate::slot::SlotState;
use crate::source::{Payload, Source};

/// The façade binding a [`Source`], a [`Reader`] and an optionally shared
/// [`Reclaimer`] behind `load`/`update`.
///
/// A store is `Send + Sync`; clone-free sharing through a reference (or an
/// `Arc` when ownership must move) is the intended pattern. Reads are
/// lock-free and, when the thread's cached version is current, skip the
/// atomic payload acquisition entirely.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::thread;
/// use rcu_store::Store;
///
/// #[derive(Debug, PartialEq, Eq)]
/// struct Limits {
///     max_sessions: u32,
/// }
///
/// let store = Store::with_value(Limits { max_sessions: 64 });
///
/// thread::scope(|scope| {
///     scope.spawn(|| {
///         let limits = store.load();
///         assert!(limits.max_sessions >= 64);
///     });
///
///     scope.spawn(|| {
///         store.update_value(Limits { max_sessions: 128 });
///     });
/// });
/// ```
///
/// 将 [`Source`]、[`Reader`] 与可选共享的 [`Reclaimer`]
/// 绑定在 `load`/`update` 之后的门面。
/// store 是 `Send + Sync` 的；通过引用（或需要转移所有权时通过 `Arc`）
/// 免克隆地共享是预期的用法。
/// 读取是无锁的，当线程缓存的版本仍为最新时，完全跳过原子载荷获取。
pub struct Store<T: Send + Sync + 'static> {
    // Teardown order is load-bearing: the reader releases this thread's
    // slot, then the last source handle forwards the final payload, and
    // only then may the reclaimer handle go away.
    reader: Reader<T>,
    source: Arc<Source<T>>,
    reclaimer: Option<Arc<Reclaimer>>,
}

impl<T: Send + Sync + 'static> Store<T> {
    /// A store over `initial` with no reclaimer: displaced payloads are
    /// destroyed wherever their last handle is dropped.
    ///
    /// 持有 `initial`、不带回收器的 store：
    /// 被替换的载荷在其最后一个句柄被 drop 的线程上销毁。
    pub fn new(initial: Payload<T>) -> Self {
        let source = Arc::new(Source::new(initial));
        Self {
            reader: Reader::new(Arc::clone(&source)),
            source,
            reclaimer: None,
        }
    }

    /// Convenience over [`new`](Self::new): wraps `initial` in an `Arc`.
    /// [`new`](Self::new) 的便捷形式：把 `initial` 包进 `Arc`。
    pub fn with_value(initial: T) -> Self {
        Self::new(Some(Arc::new(initial)))
    }

    /// A store whose displaced payloads are handed to `reclaimer`, so their
    /// destructors run on the reclaimer's worker thread rather than on a
    /// reader or writer.
    ///
    /// 一个将被替换载荷交给 `reclaimer` 的 store，
    /// 使其析构运行在回收器的工作线程上，而非某个读取者或写入者线程。
    pub fn with_reclaimer(initial: Payload<T>, reclaimer: Arc<Reclaimer>) -> Self {
        let source = Arc::new(Source::with_reclaimer(initial, &reclaimer));
        Self {
            reader: Reader::new(Arc::clone(&source)),
            source,
            reclaimer: Some(reclaimer),
        }
    }

    /// Pin and return the calling thread's snapshot. See
    /// [`Reader::load`] for the fast/slow/nested path split.
    ///
    /// 钉定并返回调用线程的快照。
    /// 快路径/慢路径/嵌套路径的区分见 [`Reader::load`]。
    #[inline]
    pub fn load(&self) -> Guard<'_, T> {
        self.reader.load()
    }

    /// Like [`load`](Self::load), and additionally evicts this thread's
    /// cache slot when the outermost guard of the nesting unwinds. Use on
    /// short-lived worker threads so they do not pin an old payload handle
    /// until thread exit.
    ///
    /// 与 [`load`](Self::load) 相同，并额外在嵌套最外层守卫退出时
    /// 驱逐本线程的缓存槽位。供短命工作线程使用，
    /// 以免它们把旧载荷句柄一直钉到线程退出。
    #[inline]
    pub fn load_with_tls_release(&self) -> Guard<'_, T> {
        self.reader.load_with_tls_release()
    }

    /// Install a new payload; `None` installs the absent payload. Readers
    /// holding guards keep their snapshots until their scopes end.
    ///
    /// 安装新载荷；`None` 表示安装缺失载荷。
    /// 持有守卫的读取者在作用域结束前保持其快照不变。
    #[inline]
    pub fn update(&self, payload: Payload<T>) {
        self.source.update(payload);
    }

    /// Convenience over [`update`](Self::update): wraps `value` in an
    /// `Arc`.
    /// [`update`](Self::update) 的便捷形式：把 `value` 包进 `Arc`。
    #[inline]
    pub fn update_value(&self, value: T) {
        self.update(Some(Arc::new(value)));
    }

    /// The source's current version.
    /// 数据源的当前版本号。
    #[inline]
    pub fn version(&self) -> u64 {
        self.source.version()
    }

    /// Snapshot of the calling thread's cache slot for this store.
    /// 调用线程上此 store 缓存槽位的状态快照。
    #[inline]
    pub fn slot_state(&self) -> SlotState {
        self.reader.slot_state()
    }

    /// The attached reclaimer, if any.
    /// 附加的回收器（如果有）。
    #[inline]
    pub fn reclaimer(&self) -> Option<&Arc<Reclaimer>> {
        self.reclaimer.as_ref()
    }
}

impl<T: Send + Sync + 'static> std::fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("source", &self.source)
            .field("reclaimer_attached", &self.reclaimer.is_some())
            .finish()
    }
}
