//! 割り込みを使わないブロッキングディレイ
//!
//! 250ns 分 SysTick をセットし、COUNTFLAG が立つまで待つのを繰り返す。
//! 待っている間は SysTick を占有するので、[`DelayController`] と
//! 同じ SysTick を共有してはいけない。
//!
//! [`DelayController`]: crate::delay::DelayController

use embedded_hal::blocking::delay::{DelayMs, DelayUs};

use crate::clock::Calibration;
use crate::timer::{ArmMode, TimerPeripheral};

pub struct BlockingDelay<T> {
    timer: T,
}

impl<T: TimerPeripheral> BlockingDelay<T> {
    pub fn new(timer: T) -> Self {
        Self { timer }
    }

    pub fn delay_250ns(&mut self) {
        self.timer.arm(Calibration::QUARTER_MICROSECOND, ArmMode::Polled);
        // カウントが 0 になると CTRL の COUNTFLAG が立つ
        while !self.timer.has_wrapped() {}
        self.timer.disable();
    }

    pub fn delay_micro(&mut self, us: u32) {
        for _ in 0..scale_for_simulator(us) {
            self.delay_250ns();
            self.delay_250ns();
            self.delay_250ns();
            self.delay_250ns();
        }
    }

    pub fn free(self) -> T {
        self.timer
    }
}

// シミュレータではソフトウェア側のオーバーヘッドが大きいので縮める
#[cfg(feature = "simulator")]
fn scale_for_simulator(us: u32) -> u32 {
    us / 1000 + 1
}

#[cfg(not(feature = "simulator"))]
fn scale_for_simulator(us: u32) -> u32 {
    us
}

impl<T: TimerPeripheral> DelayUs<u32> for BlockingDelay<T> {
    fn delay_us(&mut self, us: u32) {
        self.delay_micro(us);
    }
}

impl<T: TimerPeripheral> DelayMs<u32> for BlockingDelay<T> {
    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.delay_micro(1_000);
        }
    }
}
