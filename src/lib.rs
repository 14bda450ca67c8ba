//! A versioned, thread-local, snapshot-isolated RCU value store for data
//! that is read far more often than it is replaced.
//!
//! One logical slot holds an immutable payload behind a refcounted handle.
//! Readers take scoped, lock-free [`Guard`]s over the current payload;
//! writers atomically install replacements without ever blocking readers.
//! The read fast path is a thread-local version check: when the calling
//! thread's cached version still matches the source's, the guard is built
//! over the cached pointer with no atomic payload acquisition at all.
//!
//! Within one thread, every load nested inside an outer guard observes the
//! same payload the outer guard saw, no matter how many updates land in
//! between — snapshot isolation, per thread and per source. Coherent reads
//! across several sources go through a [`GuardPack`], which composes guards
//! left-to-right and tears them down strictly in reverse.
//!
//! Displaced payloads can be handed to a [`Reclaimer`], a background worker
//! that owns retired handles until their reference count falls to one and
//! then runs their destructors on its own thread, off the read and write
//! paths.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use std::thread;
//!
//! use rcu_store::{Reclaimer, Store};
//!
//! let reclaimer = Arc::new(Reclaimer::new());
//! let routes = Store::with_reclaimer(
//!     Some(Arc::new(HashMap::from([("10.0.0.1", "edge-a")]))),
//!     Arc::clone(&reclaimer),
//! );
//!
//! thread::scope(|scope| {
//!     scope.spawn(|| {
//!         let table = routes.load();
//!         // Every lookup in this scope sees one coherent table, even
//!         // while the writer below replaces it.
//!         let node = table.get(&"10.0.0.1").copied();
//!         assert!(node == Some("edge-a") || node == Some("edge-b"));
//!     });
//!
//!     scope.spawn(|| {
//!         routes.update_value(HashMap::from([("10.0.0.1", "edge-b")]));
//!     });
//! });
//! ```
//!
//! 一个版本化、线程本地、快照隔离的 RCU 值存储，
//! 面向读远多于写的共享数据。
//! 读取者获得作用域化的无锁守卫；写入者原子地安装新载荷，从不阻塞读取者。
//! 同一线程内嵌套的读取始终看到同一版本；
//! 跨多个数据源的一致读取通过 [`GuardPack`] 完成；
//! 被替换的载荷可交由 [`Reclaimer`] 在后台线程销毁。

mod guard;
mod pack;
mod reader;
mod reclaimer;
mod slot;
mod source;
mod spin;
mod store;

pub use self::guard::Guard;
pub use self::pack::{GuardPack, Pack, PackElement};
pub use self::reader::Reader;
pub use self::reclaimer::{Reclaimer, ReclaimerBuilder, DEFAULT_SCAN_INTERVAL};
pub use self::slot::SlotState;
pub use self::source::{Payload, Source};
pub use self::store::Store;

#[cfg(test)]
mod tests;
