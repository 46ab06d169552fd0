//! SysTick 割り込みを使った非同期ディレイ
//!
//! `request_delay(n)` は SysTick を 1 tick 分だけセットしてすぐに戻る。
//! 割り込みのたびに [`DelayController::on_expiry`] が残り回数を減らし、
//! 0 になるまで SysTick をセットし直す。0 になったら完了フラグを立てる。
//!
//! 残り回数と完了フラグはそれぞれ独立したアトミック変数で、
//! メインからのポーリングで中途半端な値が見えることはない。
//! 同時に待てる要求は 1 つだけで、カウント中に次の要求を出すと
//! 残り回数は上書きされて最初から数え直しになる。

use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::timer::TimerPeripheral;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayState {
    Idle,
    CountingDown,
    Complete,
}

pub struct DelayController<T> {
    timer: T,
    remaining: AtomicU32,
    complete: AtomicBool,
}

impl<T: TimerPeripheral> DelayController<T> {
    pub const fn new(timer: T) -> Self {
        Self {
            timer,
            remaining: AtomicU32::new(0),
            complete: AtomicBool::new(false),
        }
    }

    /// `ticks` tick 待つ要求を出す（ブロックしない）
    ///
    /// 0 のときは何もしない。完了フラグもそのまま。
    pub fn request_delay(&self, ticks: u32) {
        if ticks == 0 {
            return;
        }
        // 前の要求の満了が割り込んでこないよう、先に止めて保留も捨てる
        self.timer.disable();
        self.timer.clear_pending();
        self.remaining.store(ticks, Ordering::Release);
        self.complete.store(false, Ordering::Release);
        self.timer.arm_one_tick();
    }

    pub fn is_delay_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// 完了していなければ `WouldBlock`
    pub fn poll(&self) -> nb::Result<(), Infallible> {
        if self.is_delay_complete() {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// 完了するまで待つ
    ///
    /// SysTick 例外が登録されていないと永久に戻らない。
    pub fn wait(&self) {
        match nb::block!(self.poll()) {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    /// SysTick 例外から呼ぶ
    pub fn on_expiry(&self) {
        // COUNTFLAG が立っていなければ、今のカウントの満了ではない
        // （request_delay で捨てた保留など）。タイマはそのままにしておく
        if !self.timer.has_wrapped() {
            return;
        }
        // 放っておくと再度発火するので止める
        self.timer.disable();

        // 減らしてから、減らした後の値で判定する
        let left = match self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(prev) => prev - 1,
            // カウント中でなければ無視
            Err(_) => return,
        };

        if left != 0 {
            self.timer.arm_one_tick();
        } else {
            self.complete.store(true, Ordering::Release);
        }
    }

    /// カウントを止めて Idle に戻す（完了フラグは立てない）
    pub fn cancel(&self) {
        self.timer.disable();
        self.timer.clear_pending();
        self.remaining.store(0, Ordering::Release);
        self.complete.store(false, Ordering::Release);
    }

    pub fn remaining_ticks(&self) -> u32 {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn state(&self) -> DelayState {
        if self.is_delay_complete() {
            DelayState::Complete
        } else if self.remaining_ticks() != 0 {
            DelayState::CountingDown
        } else {
            DelayState::Idle
        }
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn free(self) -> T {
        self.timer.disable();
        self.timer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedSysTick;
    use proptest::prelude::*;

    // 割り込みが有効なときだけハンドラを呼ぶ
    fn fire(timer: &SimulatedSysTick, delay: &DelayController<&SimulatedSysTick>) {
        assert!(timer.expire(), "expiry without an armed interrupt");
        assert!(timer.take_pending());
        delay.on_expiry();
    }

    #[test]
    fn test_new_controller_is_idle() {
        let timer = SimulatedSysTick::new();
        let delay = DelayController::new(&timer);
        assert_eq!(delay.state(), DelayState::Idle);
        assert!(!delay.is_delay_complete());
        assert_eq!(timer.arm_count(), 0);
    }

    #[test]
    fn test_single_tick_delay() {
        let timer = SimulatedSysTick::new();
        let delay = DelayController::new(&timer);

        delay.request_delay(1);
        assert_eq!(delay.state(), DelayState::CountingDown);
        assert_eq!(timer.arm_count(), 1);

        fire(&timer, &delay);
        assert!(delay.is_delay_complete());
        assert_eq!(delay.state(), DelayState::Complete);
        assert_eq!(timer.arm_count(), 1);
        assert!(!timer.is_enabled());
    }

    #[test]
    fn test_zero_request_is_noop() {
        let timer = SimulatedSysTick::new();
        let delay = DelayController::new(&timer);

        delay.request_delay(0);
        assert_eq!(timer.arm_count(), 0);
        assert!(!delay.is_delay_complete());
        assert_eq!(delay.state(), DelayState::Idle);

        // 完了後の 0 要求でもフラグは立ったまま
        delay.request_delay(2);
        fire(&timer, &delay);
        fire(&timer, &delay);
        assert!(delay.is_delay_complete());
        delay.request_delay(0);
        assert!(delay.is_delay_complete());
        assert_eq!(timer.arm_count(), 2);
    }

    #[test]
    fn test_restart_discards_remaining_ticks() {
        let timer = SimulatedSysTick::new();
        let delay = DelayController::new(&timer);

        delay.request_delay(5);
        fire(&timer, &delay);
        fire(&timer, &delay);
        assert_eq!(delay.remaining_ticks(), 3);

        delay.request_delay(3);
        assert_eq!(delay.remaining_ticks(), 3);
        fire(&timer, &delay);
        fire(&timer, &delay);
        assert!(!delay.is_delay_complete());
        fire(&timer, &delay);
        assert!(delay.is_delay_complete());
    }

    #[test]
    fn test_restart_drops_pending_expiry_of_previous_request() {
        let timer = SimulatedSysTick::new();
        let delay = DelayController::new(&timer);

        delay.request_delay(5);
        fire(&timer, &delay);
        // 前の要求の満了が保留されたまま次の要求を出す
        assert!(timer.expire());
        delay.request_delay(1);
        assert!(!timer.is_pending());
        assert!(timer.is_enabled());

        // 捨てたはずの例外が遅れて届いても、新しい要求の tick は減らない
        delay.on_expiry();
        assert!(!delay.is_delay_complete());
        assert_eq!(delay.remaining_ticks(), 1);
        assert!(timer.is_enabled());

        fire(&timer, &delay);
        assert!(delay.is_delay_complete());
    }

    #[test]
    fn test_restart_from_complete_drops_stale_expiry() {
        let timer = SimulatedSysTick::new();
        let delay = DelayController::new(&timer);

        delay.request_delay(1);
        fire(&timer, &delay);
        assert!(delay.is_delay_complete());

        delay.request_delay(1);
        delay.on_expiry();
        assert_eq!(delay.state(), DelayState::CountingDown);
        assert_eq!(timer.arm_count(), 2);
    }

    #[test]
    fn test_free_returns_disabled_timer() {
        let timer = SimulatedSysTick::new();
        let delay = DelayController::new(&timer);

        delay.request_delay(3);
        assert!(delay.timer().is_enabled());
        let timer = delay.free();
        assert!(!timer.is_enabled());
    }

    #[test]
    fn test_restart_after_completion_clears_flag() {
        let timer = SimulatedSysTick::new();
        let delay = DelayController::new(&timer);

        delay.request_delay(1);
        fire(&timer, &delay);
        assert!(delay.is_delay_complete());

        delay.request_delay(2);
        assert!(!delay.is_delay_complete());
        assert_eq!(delay.state(), DelayState::CountingDown);
    }

    #[test]
    fn test_spurious_expiry_is_ignored() {
        let timer = SimulatedSysTick::new();
        let delay = DelayController::new(&timer);

        delay.on_expiry();
        assert_eq!(delay.state(), DelayState::Idle);
        assert_eq!(timer.arm_count(), 0);

        delay.request_delay(1);
        fire(&timer, &delay);
        delay.on_expiry();
        assert_eq!(delay.state(), DelayState::Complete);
        assert_eq!(delay.remaining_ticks(), 0);
        assert_eq!(timer.arm_count(), 1);
    }

    #[test]
    fn test_cancel_stops_countdown() {
        let timer = SimulatedSysTick::new();
        let delay = DelayController::new(&timer);

        delay.request_delay(10);
        fire(&timer, &delay);
        delay.cancel();

        assert_eq!(delay.state(), DelayState::Idle);
        assert!(!delay.is_delay_complete());
        assert!(!timer.is_enabled());
        assert_eq!(delay.poll(), Err(nb::Error::WouldBlock));
    }

    #[test]
    fn test_poll_and_wait_after_completion() {
        let timer = SimulatedSysTick::new();
        let delay = DelayController::new(&timer);

        delay.request_delay(1);
        assert_eq!(delay.poll(), Err(nb::Error::WouldBlock));
        fire(&timer, &delay);
        assert_eq!(delay.poll(), Ok(()));
        delay.wait();
    }

    #[test]
    fn test_delay_driven_by_simulated_cycles() {
        let timer = SimulatedSysTick::new();
        let delay = DelayController::new(&timer);

        delay.request_delay(3);
        // 1 tick = 168 クロック
        let cycles_per_tick = crate::Calibration::MICROSECOND.cycles();
        timer.run(cycles_per_tick * 3 - 1, || delay.on_expiry());
        assert!(!delay.is_delay_complete());
        timer.run(1, || delay.on_expiry());
        assert!(delay.is_delay_complete());
        // 完了後はカウンタが止まっているので何も起きない
        timer.run(cycles_per_tick * 2, || delay.on_expiry());
        assert_eq!(timer.expiry_count(), 3);
    }

    #[test]
    fn test_concurrent_polls_never_see_torn_counter() {
        const TICKS: u32 = 20_000;
        let timer = SimulatedSysTick::new();
        let delay = DelayController::new(&timer);
        delay.request_delay(TICKS);

        std::thread::scope(|s| {
            // 割り込み側
            s.spawn(|| {
                for _ in 0..TICKS {
                    timer.expire();
                    timer.take_pending();
                    delay.on_expiry();
                }
            });

            // メイン側
            s.spawn(|| {
                let mut last = TICKS;
                loop {
                    let complete = delay.is_delay_complete();
                    let now = delay.remaining_ticks();
                    assert!(now <= last, "remaining ticks went up: {} -> {}", last, now);
                    last = now;
                    if complete {
                        assert_eq!(now, 0);
                        break;
                    }
                    std::hint::spin_loop();
                }
            });
        });

        assert!(delay.is_delay_complete());
        assert_eq!(timer.arm_count(), TICKS);
    }

    proptest! {
        #[test]
        fn test_n_expiries_complete_n_ticks(n in 1u32..500) {
            let timer = SimulatedSysTick::new();
            let delay = DelayController::new(&timer);
            delay.request_delay(n);

            for _ in 0..n - 1 {
                fire(&timer, &delay);
            }
            prop_assert!(!delay.is_delay_complete());
            prop_assert_eq!(delay.remaining_ticks(), 1);

            fire(&timer, &delay);
            prop_assert!(delay.is_delay_complete());
        }

        #[test]
        fn test_rearm_once_per_expiry_except_last(n in 1u32..300) {
            let timer = SimulatedSysTick::new();
            let delay = DelayController::new(&timer);
            delay.request_delay(n);
            prop_assert_eq!(timer.arm_count(), 1);

            for i in 1..=n {
                let before = timer.arm_count();
                fire(&timer, &delay);
                let rearmed = timer.arm_count() - before;
                if i == n {
                    prop_assert_eq!(rearmed, 0);
                } else {
                    prop_assert_eq!(rearmed, 1);
                }
            }
            prop_assert_eq!(timer.arm_count(), n);
        }

        #[test]
        fn test_polling_after_completion_is_stable(n in 1u32..50, polls in 1usize..100) {
            let timer = SimulatedSysTick::new();
            let delay = DelayController::new(&timer);
            delay.request_delay(n);
            for _ in 0..n {
                fire(&timer, &delay);
            }
            let arms = timer.arm_count();
            for _ in 0..polls {
                prop_assert!(delay.is_delay_complete());
            }
            prop_assert_eq!(timer.arm_count(), arms);
            prop_assert_eq!(delay.state(), DelayState::Complete);
        }

        #[test]
        fn test_restart_counts_only_new_request(first in 2u32..50, done in 1u32..50, second in 1u32..50) {
            let done = done.min(first - 1);
            let timer = SimulatedSysTick::new();
            let delay = DelayController::new(&timer);

            delay.request_delay(first);
            for _ in 0..done {
                fire(&timer, &delay);
            }
            delay.request_delay(second);
            for _ in 0..second - 1 {
                fire(&timer, &delay);
            }
            prop_assert!(!delay.is_delay_complete());
            fire(&timer, &delay);
            prop_assert!(delay.is_delay_complete());
        }
    }
}
