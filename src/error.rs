//! エラー型

use core::fmt;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// tick の周波数に 0 が指定された
    ZeroRate,
    /// tick の周波数がコアクロック以上（リロード値が 0 になる）
    RateTooHigh,
    /// リロード値が 24bit の LOAD レジスタに収まらない
    ReloadOverflow,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ZeroRate => write!(f, "tick rate must be non-zero"),
            Error::RateTooHigh => write!(f, "tick rate must be below the core clock"),
            Error::ReloadOverflow => write!(f, "reload value does not fit in 24 bits"),
        }
    }
}
