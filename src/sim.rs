//! レジスタレベルの SysTick シミュレーション（テスト用）
//!
//! CTRL / LOAD / VAL / CALIB を持ち、`tick()` 1 回で 1 クロック進む。
//! 実機と同じく VAL が 0 の状態から有効にすると、次のクロックで
//! LOAD の値を読み込み、そこから 0 まで数えたところで満了する。
//! つまり 1 周期は LOAD + 1 クロック。

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::clock::Calibration;
use crate::registers::{
    STK_CALIB_OFFSET, STK_CTRL_COUNTFLAG, STK_CTRL_ENABLE, STK_CTRL_OFFSET, STK_CTRL_TICKINT,
    STK_LOAD_MAX, STK_LOAD_OFFSET, STK_VAL_OFFSET,
};
use crate::timer::{ArmMode, TimerPeripheral};

// CTRL の書き込み可能ビット
const CTRL_WRITABLE: u32 = 0x7;
// NOREF=0, SKEW=1, TENMS=0
const CALIB_RESET: u32 = 0x4000_0000;

#[derive(Debug)]
pub struct SimulatedSysTick {
    csr: AtomicU32,
    rvr: AtomicU32,
    cvr: AtomicU32,
    calib: AtomicU32,
    free_running: AtomicBool,
    // ICSR の PENDSTSET 相当
    pending: AtomicBool,
    arms: AtomicU32,
    expiries: AtomicU32,
    cycles: AtomicU32,
}

impl SimulatedSysTick {
    pub fn new() -> Self {
        Self {
            csr: AtomicU32::new(0),
            rvr: AtomicU32::new(0),
            cvr: AtomicU32::new(0),
            calib: AtomicU32::new(CALIB_RESET),
            free_running: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            arms: AtomicU32::new(0),
            expiries: AtomicU32::new(0),
            cycles: AtomicU32::new(0),
        }
    }

    /// CTRL をポーリングするたびに 1 クロック進むモード（ブロッキングディレイ用）
    pub fn free_running() -> Self {
        let timer = Self::new();
        timer.free_running.store(true, Ordering::Relaxed);
        timer
    }

    pub fn read_reg(&self, offset: usize) -> u32 {
        match offset {
            STK_CTRL_OFFSET => self.csr.fetch_and(!STK_CTRL_COUNTFLAG, Ordering::AcqRel),
            STK_LOAD_OFFSET => self.rvr.load(Ordering::Acquire),
            STK_VAL_OFFSET => self.cvr.load(Ordering::Acquire),
            STK_CALIB_OFFSET => self.calib.load(Ordering::Acquire),
            _ => 0,
        }
    }

    pub fn write_reg(&self, offset: usize, value: u32) {
        match offset {
            STK_CTRL_OFFSET => {
                let value = value & CTRL_WRITABLE;
                if value & STK_CTRL_ENABLE != 0 {
                    self.arms.fetch_add(1, Ordering::AcqRel);
                }
                let flag = self.csr.load(Ordering::Acquire) & STK_CTRL_COUNTFLAG;
                self.csr.store(value | flag, Ordering::Release);
            }
            STK_LOAD_OFFSET => self.rvr.store(value & STK_LOAD_MAX, Ordering::Release),
            STK_VAL_OFFSET => {
                // 書き込み値に関わらず 0 になる
                self.cvr.store(0, Ordering::Release);
                self.csr.fetch_and(!STK_CTRL_COUNTFLAG, Ordering::AcqRel);
            }
            _ => {}
        }
    }

    /// 1 クロック進める。割り込みが発生すれば true
    pub fn tick(&self) -> bool {
        let csr = self.csr.load(Ordering::Acquire);
        if csr & STK_CTRL_ENABLE == 0 {
            return false;
        }
        self.cycles.fetch_add(1, Ordering::Relaxed);

        let cvr = self.cvr.load(Ordering::Acquire);
        if cvr == 0 {
            self.cvr.store(self.rvr.load(Ordering::Acquire), Ordering::Release);
            return false;
        }
        let cvr = cvr - 1;
        self.cvr.store(cvr, Ordering::Release);
        if cvr != 0 {
            return false;
        }
        self.raise(csr)
    }

    // COUNTFLAG を立て、TICKINT なら例外を保留にする
    fn raise(&self, csr: u32) -> bool {
        self.csr.fetch_or(STK_CTRL_COUNTFLAG, Ordering::AcqRel);
        self.expiries.fetch_add(1, Ordering::Relaxed);
        let irq = csr & STK_CTRL_TICKINT != 0;
        if irq {
            self.pending.store(true, Ordering::Release);
        }
        irq
    }

    /// `cycles` クロック進め、割り込みのたびに `on_expiry` を呼ぶ
    pub fn run(&self, cycles: u32, mut on_expiry: impl FnMut()) {
        for _ in 0..cycles {
            // 保留中の例外はすぐに受け付けられる
            if self.tick() && self.take_pending() {
                on_expiry();
            }
        }
    }

    /// 残りクロックを飛ばしてすぐに満了させる。割り込みが発生すれば true
    ///
    /// 例外は保留のまま残るので、ハンドラは呼び出し側が実行する。
    pub fn expire(&self) -> bool {
        let csr = self.csr.load(Ordering::Acquire);
        if csr & STK_CTRL_ENABLE == 0 {
            return false;
        }
        self.cvr.store(0, Ordering::Release);
        self.raise(csr)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// 例外の受け付け（保留を落とす）。保留されていれば true
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_enabled(&self) -> bool {
        self.csr.load(Ordering::Acquire) & STK_CTRL_ENABLE != 0
    }

    /// CTRL に ENABLE を書き込んだ回数
    pub fn arm_count(&self) -> u32 {
        self.arms.load(Ordering::Acquire)
    }

    pub fn expiry_count(&self) -> u32 {
        self.expiries.load(Ordering::Acquire)
    }

    /// 有効だった間に進んだクロック数
    pub fn cycle_count(&self) -> u32 {
        self.cycles.load(Ordering::Relaxed)
    }
}

impl Default for SimulatedSysTick {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerPeripheral for SimulatedSysTick {
    fn arm(&self, calibration: Calibration, mode: ArmMode) {
        self.write_reg(STK_CTRL_OFFSET, 0);
        self.write_reg(STK_LOAD_OFFSET, calibration.reload());
        self.write_reg(STK_VAL_OFFSET, 0);
        self.write_reg(STK_CTRL_OFFSET, mode.ctrl_bits());
    }

    fn disable(&self) {
        self.write_reg(STK_CTRL_OFFSET, 0);
    }

    fn has_wrapped(&self) -> bool {
        if self.free_running.load(Ordering::Relaxed) {
            self.tick();
        }
        self.read_reg(STK_CTRL_OFFSET) & STK_CTRL_COUNTFLAG != 0
    }

    fn clear_pending(&self) {
        self.pending.store(false, Ordering::Release);
        self.csr.fetch_and(!STK_CTRL_COUNTFLAG, Ordering::AcqRel);
    }
}
