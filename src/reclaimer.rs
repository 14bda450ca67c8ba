use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use antidote::{Condvar, Mutex};

/// Default interval between sweeps of the retained set.
/// 保留集合两次扫描之间的默认间隔。
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(10);

/// A retired payload handle, type-erased for the retained set.
/// 被退休的载荷句柄，为保留集合做了类型擦除。
struct Retired {
    handle: Arc<dyn Any + Send + Sync>,
}

impl Retired {
    /// Allocation identity, used to coalesce duplicate retirements.
    /// 分配身份，用于合并重复的退休。
    #[inline]
    fn key(&self) -> *const () {
        Arc::as_ptr(&self.handle) as *const ()
    }

    /// Whether the reclaimer's own reference is the last one.
    /// 回收器自身的引用是否已是最后一个。
    #[inline]
    fn is_unique(&self) -> bool {
        Arc::strong_count(&self.handle) == 1
    }
}

struct Retained {
    handles: Vec<Retired>,
    /// Set by `retire` and by shutdown; the worker's wake predicate.
    /// 由 `retire` 与停机设置；工作线程的唤醒谓词。
    signalled: bool,
}

struct Shared {
    retained: Mutex<Retained>,
    wake: Condvar,
    stop: AtomicBool,
    scan_interval: Duration,
}

/// Builder for a [`Reclaimer`].
///
/// # Example
/// ```
/// use std::time::Duration;
/// use rcu_store::Reclaimer;
///
/// let reclaimer = Reclaimer::builder()
///     .scan_interval(Duration::from_millis(1))
///     .wait_until_started(true)
///     .build();
/// ```
///
/// [`Reclaimer`] 的构建器。
pub struct ReclaimerBuilder {
    wait_until_started: bool,
    scan_interval: Duration,
}

impl ReclaimerBuilder {
    #[inline]
    pub fn new() -> Self {
        Self {
            wait_until_started: true,
            scan_interval: DEFAULT_SCAN_INTERVAL,
        }
    }

    /// Whether `build` blocks until the worker thread is observably
    /// running. Default: `true`.
    ///
    /// `build` 是否阻塞到工作线程可观察地运行为止。默认：`true`。
    #[inline]
    pub fn wait_until_started(mut self, wait: bool) -> Self {
        self.wait_until_started = wait;
        self
    }

    /// How long the worker sleeps between sweeps when not notified.
    /// `Duration::ZERO` selects strict notification-driven mode: the worker
    /// wakes only on `retire` and on shutdown. Default: 10 ms.
    ///
    /// 未被通知时工作线程两次扫描之间的休眠时长。
    /// `Duration::ZERO` 选择严格的通知驱动模式：
    /// 工作线程只在 `retire` 和停机时醒来。默认：10 毫秒。
    #[inline]
    pub fn scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Spawn the worker and return the reclaimer.
    /// 启动工作线程并返回回收器。
    pub fn build(self) -> Reclaimer {
        let shared = Arc::new(Shared {
            retained: Mutex::new(Retained {
                handles: Vec::new(),
                signalled: false,
            }),
            wake: Condvar::new(),
            stop: AtomicBool::new(false),
            scan_interval: self.scan_interval,
        });

        let started = Arc::new((Mutex::new(false), Condvar::new()));

        let worker_shared = Arc::clone(&shared);
        let worker_started = Arc::clone(&started);
        let worker = thread::Builder::new()
            .name("rcu-reclaimer".into())
            .spawn(move || {
                {
                    let (flag, ready) = &*worker_started;
                    *flag.lock() = true;
                    ready.notify_all();
                }
                worker_loop(&worker_shared);
            })
            .expect("failed to spawn the reclaimer worker thread");

        if self.wait_until_started {
            let (flag, ready) = &*started;
            let mut running = flag.lock();
            while !*running {
                running = ready.wait(running);
            }
        }

        Reclaimer {
            shared,
            worker: Some(worker),
        }
    }
}

impl Default for ReclaimerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Background owner of retired payload handles.
///
/// A retired handle stays in the retained set until the worker observes that
/// its reference count has fallen to one — meaning only the reclaimer itself
/// still holds the payload — and then drops it on the worker thread, outside
/// the set's mutex. Retiring the same handle twice coalesces to one entry.
///
/// Reclamation is best-effort, not deterministic garbage collection: there
/// is no upper bound on how long a retired payload stays alive, only the
/// promise of eventual destruction in the absence of external retention. On
/// shutdown the worker makes a final sweep; payloads still referenced
/// elsewhere simply live on under those references.
///
/// One reclaimer can serve any number of sources; share it through an
/// [`Arc`].
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use rcu_store::{Reclaimer, Store};
///
/// let reclaimer = Arc::new(Reclaimer::new());
/// let store = Store::with_reclaimer(Some(Arc::new(1u32)), Arc::clone(&reclaimer));
/// store.update_value(2);
/// ```
///
/// 被退休载荷句柄的后台所有者。
/// 退休句柄保留在集合中，直到工作线程观察到其引用计数降为一
/// —— 即只剩回收器自身持有该载荷 —— 然后在工作线程上、
/// 集合互斥锁之外将其 drop。重复退休同一句柄会被合并为一个表项。
/// 回收是尽力而为的，不是确定性垃圾回收：
/// 退休载荷的存活时长没有上界，只承诺在无外部持有时最终销毁。
/// 停机时工作线程做最后一次清扫；仍被外部引用的载荷在那些引用下继续存活。
/// 一个回收器可服务任意多个数据源；通过 [`Arc`] 共享即可。
pub struct Reclaimer {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Reclaimer {
    /// A reclaimer with the default scan interval, started and observable
    /// as running before this returns.
    ///
    /// 使用默认扫描间隔的回收器，在返回之前已启动且可观察为运行中。
    #[inline]
    pub fn new() -> Self {
        Self::builder().build()
    }

    #[inline]
    pub fn builder() -> ReclaimerBuilder {
        ReclaimerBuilder::new()
    }

    /// Hand `handle` to the reclaimer. Idempotent: retiring a handle that
    /// is already retained has no effect beyond waking the worker.
    ///
    /// 将 `handle` 交给回收器。幂等：退休一个已在保留集合中的句柄
    /// 除了唤醒工作线程之外没有任何效果。
    pub fn retire<T: Send + Sync + 'static>(&self, handle: Arc<T>) {
        let retired = Retired { handle };

        let duplicate;
        {
            let mut retained = self.shared.retained.lock();
            if retained
                .handles
                .iter()
                .any(|existing| existing.key() == retired.key())
            {
                duplicate = Some(retired);
            } else {
                retained.handles.push(retired);
                duplicate = None;
            }
            retained.signalled = true;
        }
        self.shared.wake.notify_one();

        // A coalesced duplicate is released outside the mutex; the set
        // still holds a reference, so this can never run the payload
        // destructor.
        drop(duplicate);
    }

    /// Identifier of the worker thread, for callers that assert *where*
    /// payload destructors run.
    ///
    /// 工作线程的标识，供需要断言载荷析构*在哪里*运行的调用者使用。
    pub fn thread_id(&self) -> ThreadId {
        // `worker` is only taken in `drop`.
        self.worker
            .as_ref()
            .expect("BUG: reclaimer worker already joined")
            .thread()
            .id()
    }

    /// Number of handles currently in the retained set.
    /// 当前保留集合中的句柄数量。
    pub fn retained_count(&self) -> usize {
        self.shared.retained.lock().handles.len()
    }
}

impl Default for Reclaimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Reclaimer {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.retained.lock().signalled = true;
        self.shared.wake.notify_all();

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(shared: &Shared) {
    // Handles swept out of the set are dropped from this buffer, outside
    // the mutex, so payload destructors never run under the reclaimer's
    // lock.
    let mut due: Vec<Retired> = Vec::new();

    loop {
        {
            let mut retained = shared.retained.lock();

            if shared.scan_interval.is_zero() {
                while !retained.signalled && !shared.stop.load(Ordering::Acquire) {
                    retained = shared.wake.wait(retained);
                }
            } else if !retained.signalled && !shared.stop.load(Ordering::Acquire) {
                let (woken, _) = shared.wake.wait_timeout(retained, shared.scan_interval);
                retained = woken;
            }
            retained.signalled = false;

            let mut index = 0;
            while index < retained.handles.len() {
                if retained.handles[index].is_unique() {
                    due.push(retained.handles.swap_remove(index));
                } else {
                    index += 1;
                }
            }
        }

        due.clear();

        if shared.stop.load(Ordering::Acquire) {
            break;
        }
    }

    // Final sweep: release everything still retained. A handle whose count
    // is one dies here, on this thread; one still referenced elsewhere
    // merely loses the reclaimer's reference and lives on.
    let leftovers = std::mem::take(&mut shared.retained.lock().handles);
    drop(leftovers);
}
