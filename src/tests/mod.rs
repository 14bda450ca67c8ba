mod reclaimer_tests;

use std::time::{Duration, Instant};

/// Poll `condition` for up to two seconds, returning whether it became
/// true. Used wherever a test waits on the reclaimer worker.
///
/// 轮询 `condition` 最多两秒，返回其是否变为真。
/// 凡是需要等待回收工作线程的测试都使用它。
pub(crate) fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
