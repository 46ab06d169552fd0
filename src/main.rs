// SysTick 割り込みを使った非同期ディレイで PD0 を 0.5 秒ごとに反転
// 待っている間もメインループは回り続ける

#![no_std]
#![no_main]

// pick a panicking behavior
use panic_halt as _; // you can put a breakpoint on `rust_begin_unwind` to catch panics

use core::cell::RefCell;

use cortex_m::interrupt::Mutex;

// cortex-m コア向けのスタートアップ処理を提供
// SysTick はコア例外なので #[interrupt] ではなく #[exception] で登録する
use cortex_m_rt::{entry, exception};

use cortex_m_semihosting::hprintln;

use stm32f4xx_hal as hal;

use hal::{pac, prelude::*};

use md407_systick::{DelayController, SysTickTimer, CORE_CLOCK_HZ};

// 1 tick = 1µs
const BLINK_TICKS: u32 = 500_000;

// グローバル変数(メインと SysTick 例外の両方から使うため)
static DELAY: Mutex<RefCell<Option<DelayController<SysTickTimer>>>> =
    Mutex::new(RefCell::new(None));

fn with_delay<R>(f: impl FnOnce(&DelayController<SysTickTimer>) -> R) -> R {
    cortex_m::interrupt::free(|cs| {
        let delay = DELAY.borrow(cs).borrow();
        match delay.as_ref() {
            Some(delay) => f(delay),
            None => panic!("not initialized DELAY"),
        }
    })
}

#[entry]
fn main() -> ! {
    let peripheral = pac::Peripherals::take().unwrap();

    // MD407 の水晶は 8MHz、PLL で 168MHz まで上げる
    let rcc = peripheral.RCC.constrain();
    let clocks = rcc
        .cfgr
        .use_hse(8.MHz())
        .sysclk(168.MHz())
        .pclk1(42.MHz())
        .pclk2(84.MHz())
        .freeze();

    // 較正値は 168MHz 前提
    if clocks.sysclk().raw() != CORE_CLOCK_HZ {
        hprintln!("unexpected SYSCLK: {} Hz", clocks.sysclk().raw()).unwrap();
    }

    // GPIOD は周辺機器用のポート
    let gpiod = peripheral.GPIOD.split();
    let mut pin = gpiod.pd0.into_push_pull_output();

    let core_peripheral = cortex_m::Peripherals::take().unwrap();
    let timer = SysTickTimer::new(core_peripheral.SYST);

    // DelayController を グローバル変数にmove(以降は SysTick 例外からも見える)
    cortex_m::interrupt::free(|cs| {
        DELAY
            .borrow(cs)
            .replace(Some(DelayController::new(timer)))
    });

    let mut count: u32 = 0;
    loop {
        with_delay(|delay| delay.request_delay(BLINK_TICKS));

        // 完了フラグをポーリング（割り込みを止める時間が短くなるよう 1 回ずつ）
        while !with_delay(|delay| delay.is_delay_complete()) {}

        pin.toggle();
        count = count.wrapping_add(1);
        hprintln!("delay #{} complete", count).unwrap();
    }
}

#[exception]
fn SysTick() {
    cortex_m::interrupt::free(|cs| {
        if let Some(delay) = DELAY.borrow(cs).borrow().as_ref() {
            delay.on_expiry();
        }
    });
}
