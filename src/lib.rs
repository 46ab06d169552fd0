//! MD407 (STM32F407) 向け SysTick 遅延サービス
//!
//! SysTick 割り込みで 1 tick（既定では 1 µs）ずつ数える非同期ディレイと、
//! COUNTFLAG をポーリングするブロッキングディレイを提供する。
//! レジスタアドレスの早見表は [`registers`] にまとめてある。

#![cfg_attr(not(test), no_std)]

pub mod blocking;
pub mod clock;
pub mod delay;
pub mod error;
pub mod registers;
pub mod timer;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use blocking::BlockingDelay;
pub use clock::{Calibration, CORE_CLOCK_HZ};
pub use delay::{DelayController, DelayState};
pub use error::{Error, Result};
pub use timer::{ArmMode, SysTickTimer, TimerPeripheral};
