use std::sync::Arc;

use crate::guard::Guard;
use crate::slot::{self, SlotState};
use crate::source::Source;

/// The read side of a source: builds guards through the calling thread's
/// cache slot.
///
/// A reader may be shared freely across threads; each thread resolves its
/// own slot. Three load paths exist:
///
/// - **initialization** (first touch by this thread): unconditionally
///   acquire `(version, payload)` from the source;
/// - **refresh** (no guard alive, slot initialized): ask the source only for
///   the version; acquire the payload just when the version moved, retiring
///   the displaced slot handle to the reclaimer so its destruction leaves
///   the read path;
/// - **nested** (a guard is alive): reuse the pinned snapshot verbatim and
///   never consult the source. This is what keeps every read inside a scope
///   on one version.
///
/// 数据源的读取端：通过调用线程的缓存槽位构建守卫。
/// 读取者可以在线程间自由共享；每个线程解析自己的槽位。共有三条加载路径：
/// - **初始化**（本线程首次接触）：无条件向数据源获取 `(版本, 载荷)`；
/// - **刷新**（无守卫存活、槽位已初始化）：只向数据源询问版本号；
///   仅当版本号变动时才获取载荷，并把被替换的槽位句柄退休给回收器，
///   使其析构离开读取路径；
/// - **嵌套**（有守卫存活）：原样复用被钉定的快照，完全不访问数据源。
///   这正是同一作用域内所有读取停留在同一版本上的原因。
pub struct Reader<T: Send + Sync + 'static> {
    source: Arc<Source<T>>,
}

impl<T: Send + Sync + 'static> Reader<T> {
    pub fn new(source: Arc<Source<T>>) -> Self {
        Self { source }
    }

    /// Pin the current snapshot (or the already pinned one when nested) and
    /// return a guard over it.
    ///
    /// 钉定当前快照（嵌套时钉定已有快照）并返回其守卫。
    pub fn load(&self) -> Guard<'_, T> {
        self.load_inner(false)
    }

    /// Like [`load`](Self::load), but additionally schedules this thread's
    /// slot for eviction when the outermost guard of the nesting unwinds.
    /// Meant for short-lived worker threads that would otherwise pin an old
    /// handle until thread exit.
    ///
    /// 与 [`load`](Self::load) 相同，但额外安排本线程的槽位
    /// 在嵌套最外层守卫退出时被驱逐。
    /// 适用于短命的工作线程，否则它们会把旧句柄一直钉到线程退出。
    pub fn load_with_tls_release(&self) -> Guard<'_, T> {
        self.load_inner(true)
    }

    fn load_inner(&self, schedule_release: bool) -> Guard<'_, T> {
        let slot = slot::slot_for::<T>(self.source.id());

        if slot.ref_count() == 0 {
            if !slot.initialized() {
                let (version, payload) = self.source.load_current();
                slot.install(version, payload);
            } else if let Some((version, payload)) = self.source.load_if_newer(slot.version()) {
                let displaced = slot.install(version, payload);
                if let Some(displaced) = displaced {
                    match self.source.reclaimer() {
                        Some(reclaimer) => reclaimer.retire(displaced),
                        // No reclaimer: the handle drops here; if it is the
                        // last one, the payload destructor runs on this
                        // reader's thread.
                        None => drop(displaced),
                    }
                }
            }
        }

        if schedule_release {
            slot.set_release_scheduled(true);
        }

        Guard::attach(slot)
    }

    /// Snapshot of the calling thread's cache slot for this source.
    /// 调用线程上此数据源缓存槽位的状态快照。
    pub fn slot_state(&self) -> SlotState {
        slot::slot_for::<T>(self.source.id()).state()
    }
}

impl<T: Send + Sync + 'static> Drop for Reader<T> {
    fn drop(&mut self) {
        slot::drop_local_slot(self.source.id());
    }
}
