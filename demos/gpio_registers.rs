// アドレスを直接書き込んで GPIO を使う（早見表のアドレスをそのまま使う例）
// PD0-7 を出力、PE0-7 を入力にして、入力をそのまま出力へ写す

#![no_std]
#![no_main]

// pick a panicking behavior
use panic_halt as _; // you can put a breakpoint on `rust_begin_unwind` to catch panics

use core::ptr::{read_volatile, write_volatile};

use cortex_m_rt::entry;

use cortex_m_semihosting::hprintln;

use stm32f4::stm32f407;

use md407_systick::registers::{GpioPort, GpioRegister};

#[entry]
fn main() -> ! {
    // GPIO へのクロック供給だけは PAC で行う
    let peripheral = stm32f407::Peripherals::take().unwrap();
    peripheral
        .RCC
        .ahb1enr
        .modify(|_, w| w.gpioden().enabled().gpioeen().enabled());

    let d = GpioPort::D;
    let e = GpioPort::E;

    unsafe {
        // 出力ピン: MODER=01, push-pull, 高速
        let moder = d.register(GpioRegister::Moder) as *mut u32;
        write_volatile(moder, (read_volatile(moder) & 0xFFFF_0000) | 0x0000_5555);
        let otyper = d.register(GpioRegister::Otyper) as *mut u16;
        write_volatile(otyper, read_volatile(otyper) & 0xFF00);
        let ospeedr = d.register(GpioRegister::Ospeedr) as *mut u16;
        write_volatile(ospeedr, 0xFFFF);

        // 入力ピン: MODER=00, プルダウン
        let moder = e.register(GpioRegister::Moder) as *mut u32;
        write_volatile(moder, read_volatile(moder) & 0xFFFF_0000);
        let pupdr = e.register(GpioRegister::Pupdr) as *mut u16;
        write_volatile(pupdr, 0xAAAA);
    }

    hprintln!("mirroring PE0-7 to PD0-7").unwrap();

    let idr = e.idr_low() as *const u8;
    let odr = d.odr_low() as *mut u8;
    loop {
        // 下位バイトだけ読み書きするので上位のピンには影響しない
        unsafe { write_volatile(odr, read_volatile(idr)) };
    }
}
