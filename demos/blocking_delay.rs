// COUNTFLAG ポーリングによるブロッキングディレイで PD0 を 1 秒ごとに反転
// GPIO 設定は PAC で直接レジスタを書く

#![no_std]
#![no_main]

// pick a panicking behavior
use panic_halt as _; // you can put a breakpoint on `rust_begin_unwind` to catch panics

use cortex_m_rt::entry;

use cortex_m_semihosting::hprintln;

// このデバイスクレートをuseすることで、割り込みベクタテーブルのシンボル定義が自動登録される。
use stm32f4::stm32f407;

use embedded_hal::blocking::delay::DelayMs;

use md407_systick::{BlockingDelay, SysTickTimer};

// クロックの初期設定を実施
// SYSCLK: HSE(8MHz) -> PLL -> 168MHz
fn config_clock(peripheral: &stm32f407::Peripherals) {
    // HSE ON
    peripheral.RCC.cr.modify(|_, w| w.hseon().on());
    // HSE の準備完了待ち
    while peripheral.RCC.cr.read().hserdy().is_not_ready() {}

    // PLL の ソースクロックをHSEとする
    peripheral.RCC.pllcfgr.modify(|_, w| w.pllsrc().hse());
    // PLL へ入るクロックを 1MHz に分周
    peripheral
        .RCC
        .pllcfgr
        .modify(|_, w| unsafe { w.pllm().bits(8) });
    // 336MHz に逓倍
    peripheral
        .RCC
        .pllcfgr
        .modify(|_, w| unsafe { w.plln().bits(336) });
    // 336 / 2 = 168MHz
    peripheral.RCC.pllcfgr.modify(|_, w| w.pllp().div2());

    // PLL ON
    peripheral.RCC.cr.modify(|_, w| w.pllon().on());
    // PLL の準備完了待ち
    while peripheral.RCC.cr.read().pllrdy().is_not_ready() {}

    // フラッシュの読み出し遅延設定（168MHzだと5WS）
    peripheral.FLASH.acr.modify(|_, w| w.latency().ws5());

    // APB1 は最大 42MHz、APB2 は最大 84MHz
    peripheral.RCC.cfgr.modify(|_, w| w.ppre1().div4());
    peripheral.RCC.cfgr.modify(|_, w| w.ppre2().div2());

    // PLLPをシステムクロックとして使う設定
    peripheral.RCC.cfgr.modify(|_, w| w.sw().pll());
    while !peripheral.RCC.cfgr.read().sws().is_pll() {}
}

#[entry]
fn main() -> ! {
    let peripheral = stm32f407::Peripherals::take().unwrap();

    config_clock(&peripheral);

    // 各機能へのクロック入力設定
    peripheral.RCC.ahb1enr.modify(|_, w| w.gpioden().enabled());

    // PD0 を出力に
    peripheral.GPIOD.odr.modify(|_, w| w.odr0().low());
    peripheral.GPIOD.moder.modify(|_, w| w.moder0().output());

    let core_peripheral = cortex_m::Peripherals::take().unwrap();
    let mut delay = BlockingDelay::new(SysTickTimer::new(core_peripheral.SYST));

    loop {
        delay.delay_ms(1_000);
        if peripheral.GPIOD.odr.read().odr0().is_high() {
            peripheral.GPIOD.odr.modify(|_, w| w.odr0().low());
        } else {
            peripheral.GPIOD.odr.modify(|_, w| w.odr0().high());
            hprintln!("PD0 is High").unwrap();
        }
    }
}
