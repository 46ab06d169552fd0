//! SysTick の抽象化
//!
//! 割り込みハンドラとメインの両方から触るため、メソッドは全て `&self`。
//! 再入の保護はしないので、同時に 2 つのコンテキストから arm しないこと。

use cortex_m::peripheral::{SCB, SYST};

use crate::clock::Calibration;
use crate::registers::{
    STK_CTRL_CLKSOURCE, STK_CTRL_COUNTFLAG, STK_CTRL_ENABLE, STK_CTRL_TICKINT,
};

/// カウント開始時の動作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmMode {
    /// 0 になったら SysTick 例外を発生させる（CTRL = 7）
    Interrupt,
    /// COUNTFLAG をポーリングする（CTRL = 5）
    Polled,
}

impl ArmMode {
    pub const fn ctrl_bits(self) -> u32 {
        match self {
            ArmMode::Interrupt => STK_CTRL_ENABLE | STK_CTRL_TICKINT | STK_CTRL_CLKSOURCE,
            ArmMode::Polled => STK_CTRL_ENABLE | STK_CTRL_CLKSOURCE,
        }
    }
}

pub trait TimerPeripheral {
    /// 停止 -> LOAD 書き込み -> VAL クリア -> CTRL 書き込み の順でカウントを開始する
    fn arm(&self, calibration: Calibration, mode: ArmMode);

    fn disable(&self);

    /// 前回の読み出し以降にカウントが 0 になったか（読むとクリアされる）
    fn has_wrapped(&self) -> bool;

    /// 保留中の SysTick 例外と COUNTFLAG を捨てる（停止中に呼ぶこと）
    fn clear_pending(&self);

    /// 1µs 分を割り込みありでセットする
    fn arm_one_tick(&self) {
        self.arm(Calibration::MICROSECOND, ArmMode::Interrupt);
    }
}

impl<T: TimerPeripheral + ?Sized> TimerPeripheral for &T {
    fn arm(&self, calibration: Calibration, mode: ArmMode) {
        (**self).arm(calibration, mode)
    }

    fn disable(&self) {
        (**self).disable()
    }

    fn has_wrapped(&self) -> bool {
        (**self).has_wrapped()
    }

    fn clear_pending(&self) {
        (**self).clear_pending()
    }

    fn arm_one_tick(&self) {
        (**self).arm_one_tick()
    }
}

/// 実機の SysTick
///
/// `SYST` を所有することで、他から SysTick を触られないようにする。
pub struct SysTickTimer {
    syst: SYST,
}

impl SysTickTimer {
    pub fn new(syst: SYST) -> Self {
        let timer = Self { syst };
        timer.disable();
        timer
    }
}

impl TimerPeripheral for SysTickTimer {
    fn arm(&self, calibration: Calibration, mode: ArmMode) {
        // RegisterBlock への書き込みは &self でできる（volatile write）
        unsafe {
            self.syst.csr.write(0);
            self.syst.rvr.write(calibration.reload());
            // VAL へは何を書いても 0 になり、COUNTFLAG もクリアされる
            self.syst.cvr.write(0);
            self.syst.csr.write(mode.ctrl_bits());
        }
    }

    fn disable(&self) {
        unsafe { self.syst.csr.write(0) }
    }

    fn has_wrapped(&self) -> bool {
        self.syst.csr.read() & STK_CTRL_COUNTFLAG != 0
    }

    fn clear_pending(&self) {
        // VAL を書いても ICSR の PENDSTSET は落ちない
        SCB::clear_pendst();
        // CTRL を読むと COUNTFLAG がクリアされる
        let _ = self.syst.csr.read();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctrl_bits() {
        assert_eq!(ArmMode::Interrupt.ctrl_bits(), 7);
        assert_eq!(ArmMode::Polled.ctrl_bits(), 5);
    }
}
