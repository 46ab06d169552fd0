//! MD407 のレジスタアドレス早見表
//!
//! GPIO は D と E が周辺機器（ディスプレイ、キーパッド等）に使われる。
//! レジスタのオフセットはどのポートでも同じで、ベースアドレスだけが変わる。

// ====== GPIO ======

pub const GPIO_A: usize = 0x4002_0000;
pub const GPIO_B: usize = 0x4002_0400;
pub const GPIO_C: usize = 0x4002_0800;
pub const GPIO_D: usize = 0x4002_0C00;
pub const GPIO_E: usize = 0x4002_1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioPort {
    A,
    B,
    C,
    D,
    E,
}

impl GpioPort {
    pub const fn base(self) -> usize {
        match self {
            GpioPort::A => GPIO_A,
            GpioPort::B => GPIO_B,
            GpioPort::C => GPIO_C,
            GpioPort::D => GPIO_D,
            GpioPort::E => GPIO_E,
        }
    }

    pub const fn register(self, reg: GpioRegister) -> usize {
        self.base() + reg.offset()
    }

    /// IDR の下位バイト（ピン 0-7）
    pub const fn idr_low(self) -> usize {
        self.register(GpioRegister::Idr)
    }

    /// IDR の上位バイト（ピン 8-15）
    pub const fn idr_high(self) -> usize {
        self.register(GpioRegister::Idr) + 1
    }

    pub const fn odr_low(self) -> usize {
        self.register(GpioRegister::Odr)
    }

    pub const fn odr_high(self) -> usize {
        self.register(GpioRegister::Odr) + 1
    }
}

/// アクセス幅（ビット）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    HalfWord,
    Word,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioRegister {
    /// 2bit/ピン: 00=入力, 01=出力, 10=オルタネート, 11=アナログ
    Moder,
    /// 1bit/ピン: 0=push-pull, 1=open drain
    Otyper,
    /// 2bit/ピン: 00=最低速 .. 11=最高速
    Ospeedr,
    /// 2bit/ピン: 00=フローティング, 01=プルアップ, 10=プルダウン
    Pupdr,
    Idr,
    Odr,
    Bsrr,
    Lckr,
    Afrl,
    Afrh,
}

impl GpioRegister {
    pub const fn offset(self) -> usize {
        match self {
            GpioRegister::Moder => 0x00,
            GpioRegister::Otyper => 0x04,
            GpioRegister::Ospeedr => 0x08,
            GpioRegister::Pupdr => 0x0C,
            GpioRegister::Idr => 0x10,
            GpioRegister::Odr => 0x14,
            GpioRegister::Bsrr => 0x18,
            GpioRegister::Lckr => 0x1C,
            GpioRegister::Afrl => 0x20,
            GpioRegister::Afrh => 0x24,
        }
    }

    /// 早見表で使っているアクセス幅
    pub const fn width(self) -> Width {
        match self {
            GpioRegister::Moder
            | GpioRegister::Bsrr
            | GpioRegister::Afrl
            | GpioRegister::Afrh => Width::Word,
            _ => Width::HalfWord,
        }
    }
}

// ====== SysTick ======

pub const STK: usize = 0xE000_E010;
pub const STK_CTRL: usize = STK;
pub const STK_LOAD: usize = STK + 0x04;
pub const STK_VAL: usize = STK + 0x08;
pub const STK_CALIB: usize = STK + 0x0C;

// ブロック先頭からのオフセット
pub const STK_CTRL_OFFSET: usize = STK_CTRL - STK;
pub const STK_LOAD_OFFSET: usize = STK_LOAD - STK;
pub const STK_VAL_OFFSET: usize = STK_VAL - STK;
pub const STK_CALIB_OFFSET: usize = STK_CALIB - STK;

pub const STK_CTRL_ENABLE: u32 = 1 << 0;
pub const STK_CTRL_TICKINT: u32 = 1 << 1;
/// 1=プロセッサクロック, 0=AHB/8
pub const STK_CTRL_CLKSOURCE: u32 = 1 << 2;
/// 前回読み出し以降にカウントが 0 になった
pub const STK_CTRL_COUNTFLAG: u32 = 1 << 16;

/// LOAD は 24bit
pub const STK_LOAD_MAX: u32 = 0x00FF_FFFF;

// ====== 割り込みベクタ ======

pub const SCB_VTOR: usize = 0xE000_ED08;

/// 書き込み可能な RAM 上に置き直したベクタテーブルの先頭
/// 使う前に SCB_VTOR へこのアドレスを書き込むこと
pub const IRQH_BASE: usize = 0x2001_C000;
pub const IRQH_STK_OFFSET: usize = 0x3C;
pub const IRQH_STK: usize = IRQH_BASE + IRQH_STK_OFFSET;
