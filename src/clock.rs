//! コアクロックと SysTick の較正値
//!
//! SysTick の周期は (LOAD + 1) クロックなので、1 tick あたりの
//! リロード値は `clock_hz / rate_hz - 1` になる。

use crate::error::{Error, Result};
use crate::registers::STK_LOAD_MAX;

/// MD407 のシステムクロック（HSE 8MHz -> PLL -> 168MHz）
pub const CORE_CLOCK_HZ: u32 = 168_000_000;

/// 1 tick 分の LOAD レジスタ値
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    reload: u32,
}

impl Calibration {
    /// 168MHz で 1µs（LOAD = 167）
    pub const MICROSECOND: Calibration = match Calibration::from_rate(CORE_CLOCK_HZ, 1_000_000) {
        Ok(c) => c,
        Err(_) => panic!("invalid microsecond calibration"),
    };

    /// 168MHz で 250ns（LOAD = 41）
    pub const QUARTER_MICROSECOND: Calibration =
        match Calibration::from_rate(CORE_CLOCK_HZ, 4_000_000) {
            Ok(c) => c,
            Err(_) => panic!("invalid quarter microsecond calibration"),
        };

    /// `clock_hz` で動く SysTick が `rate_hz` 回/秒 満了するリロード値を求める
    pub const fn from_rate(clock_hz: u32, rate_hz: u32) -> Result<Self> {
        if rate_hz == 0 {
            return Err(Error::ZeroRate);
        }
        let cycles = clock_hz / rate_hz;
        if cycles <= 1 {
            return Err(Error::RateTooHigh);
        }
        let reload = cycles - 1;
        if reload > STK_LOAD_MAX {
            return Err(Error::ReloadOverflow);
        }
        Ok(Calibration { reload })
    }

    pub const fn reload(&self) -> u32 {
        self.reload
    }

    /// 1 tick に掛かるクロック数
    pub const fn cycles(&self) -> u32 {
        self.reload + 1
    }
}
