/// 回收器测试模块
/// 测试退休幂等性、销毁所在线程、停机语义与扫描模式

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::Duration;

use super::eventually;
use crate::{Reclaimer, Store};

/// 析构时记录线程与计数的载荷
struct Recorder {
    drops: Arc<AtomicUsize>,
    dropped_on: Arc<Mutex<Vec<ThreadId>>>,
}

impl Recorder {
    fn new(drops: &Arc<AtomicUsize>, dropped_on: &Arc<Mutex<Vec<ThreadId>>>) -> Self {
        Self {
            drops: Arc::clone(drops),
            dropped_on: Arc::clone(dropped_on),
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
        self.dropped_on
            .lock()
            .unwrap()
            .push(std::thread::current().id());
    }
}

/// 测试1: 被替换载荷的析构运行在回收线程上
#[test]
fn test_destruction_runs_on_reclaimer_thread() {
    let drops = Arc::new(AtomicUsize::new(0));
    let dropped_on = Arc::new(Mutex::new(Vec::new()));

    let reclaimer = Arc::new(
        Reclaimer::builder()
            .scan_interval(Duration::from_millis(1))
            .build(),
    );
    let worker = reclaimer.thread_id();

    let store = Store::with_reclaimer(
        Some(Arc::new(Recorder::new(&drops, &dropped_on))),
        Arc::clone(&reclaimer),
    );

    // 替换五次：初始载荷与前四个替换者陆续退休
    for _ in 0..5 {
        store.update_value(Recorder::new(&drops, &dropped_on));
    }

    assert!(eventually(|| drops.load(Ordering::SeqCst) == 5));
    for id in dropped_on.lock().unwrap().iter() {
        assert_eq!(*id, worker);
    }

    // 最后一个载荷的销毁系于 store 的析构
    drop(store);
    drop(reclaimer);
    assert_eq!(drops.load(Ordering::SeqCst), 6);
    for id in dropped_on.lock().unwrap().iter() {
        assert_eq!(*id, worker);
    }
}

/// 测试2: 重复退休同一句柄被合并为一个表项，载荷只销毁一次
#[test]
fn test_retire_is_idempotent() {
    let drops = Arc::new(AtomicUsize::new(0));
    let dropped_on = Arc::new(Mutex::new(Vec::new()));
    let reclaimer = Reclaimer::builder()
        .scan_interval(Duration::from_millis(1))
        .build();

    let handle = Arc::new(Recorder::new(&drops, &dropped_on));
    for _ in 0..3 {
        reclaimer.retire(Arc::clone(&handle));
    }
    assert_eq!(reclaimer.retained_count(), 1);

    // 外部引用仍在，载荷不被销毁
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(handle);
    assert!(eventually(|| drops.load(Ordering::SeqCst) == 1));
    assert_eq!(reclaimer.retained_count(), 0);
}

/// 测试3: 外部引用阻止销毁，释放后回收恢复
#[test]
fn test_external_reference_defers_destruction() {
    let drops = Arc::new(AtomicUsize::new(0));
    let dropped_on = Arc::new(Mutex::new(Vec::new()));
    let reclaimer = Arc::new(
        Reclaimer::builder()
            .scan_interval(Duration::from_millis(1))
            .build(),
    );

    let store = Store::with_reclaimer(
        Some(Arc::new(Recorder::new(&drops, &dropped_on))),
        Arc::clone(&reclaimer),
    );

    // 守卫（经由槽位）保持着对初始载荷的引用
    let pinned = store.load();
    store.update_value(Recorder::new(&drops, &dropped_on));

    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    assert_eq!(reclaimer.retained_count(), 1);

    drop(pinned);
    // 守卫消失后槽位仍持有句柄；刷新槽位后句柄只剩回收器一份
    let _fresh = store.load();
    assert!(eventually(|| drops.load(Ordering::SeqCst) == 1));
    assert_eq!(dropped_on.lock().unwrap()[0], reclaimer.thread_id());
}

/// 测试4: 严格通知驱动模式（扫描间隔为零）
#[test]
fn test_notification_driven_mode() {
    let drops = Arc::new(AtomicUsize::new(0));
    let dropped_on = Arc::new(Mutex::new(Vec::new()));
    let reclaimer = Reclaimer::builder()
        .scan_interval(Duration::ZERO)
        .build();

    let handle = Arc::new(Recorder::new(&drops, &dropped_on));
    reclaimer.retire(handle);

    // 没有周期扫描；退休通知本身必须唤醒工作线程
    assert!(eventually(|| drops.load(Ordering::SeqCst) == 1));
    assert_eq!(dropped_on.lock().unwrap()[0], reclaimer.thread_id());
}

/// 测试5: 停机时仍被外部引用的载荷不被强制销毁
#[test]
fn test_shutdown_with_outstanding_reference() {
    let drops = Arc::new(AtomicUsize::new(0));
    let dropped_on = Arc::new(Mutex::new(Vec::new()));
    let reclaimer = Reclaimer::new();

    let handle = Arc::new(Recorder::new(&drops, &dropped_on));
    reclaimer.retire(Arc::clone(&handle));

    drop(reclaimer);
    // 回收器已停机；载荷在外部引用下继续存活
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(handle);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

/// 测试6: 一个回收器服务多个 store
#[test]
fn test_reclaimer_shared_by_stores() {
    let drops = Arc::new(AtomicUsize::new(0));
    let dropped_on = Arc::new(Mutex::new(Vec::new()));
    let reclaimer = Arc::new(
        Reclaimer::builder()
            .scan_interval(Duration::from_millis(1))
            .build(),
    );

    let left = Store::with_reclaimer(
        Some(Arc::new(Recorder::new(&drops, &dropped_on))),
        Arc::clone(&reclaimer),
    );
    let right = Store::with_reclaimer(
        Some(Arc::new(Recorder::new(&drops, &dropped_on))),
        Arc::clone(&reclaimer),
    );

    left.update_value(Recorder::new(&drops, &dropped_on));
    right.update_value(Recorder::new(&drops, &dropped_on));

    assert!(eventually(|| drops.load(Ordering::SeqCst) == 2));

    let worker = reclaimer.thread_id();
    for id in dropped_on.lock().unwrap().iter() {
        assert_eq!(*id, worker);
    }
}

/// 测试7: 不等待启动的构建路径
#[test]
fn test_build_without_waiting_for_startup() {
    let drops = Arc::new(AtomicUsize::new(0));
    let dropped_on = Arc::new(Mutex::new(Vec::new()));
    let reclaimer = Reclaimer::builder()
        .wait_until_started(false)
        .scan_interval(Duration::from_millis(1))
        .build();

    // 工作线程的标识立即可用，退休照常工作
    let _worker = reclaimer.thread_id();
    reclaimer.retire(Arc::new(Recorder::new(&drops, &dropped_on)));

    assert!(eventually(|| drops.load(Ordering::SeqCst) == 1));
}
