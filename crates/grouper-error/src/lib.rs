use std::borrow::Cow;
use std::collections::TryReserveError;
use std::fmt::{self, Display, Formatter};
use std::ops::Deref;
use std::sync::LazyLock;
use std::env;

enum ErrorStrategy {
    Panic,
    WithBacktrace,
    Normal,
}

static ERROR_STRATEGY: LazyLock<ErrorStrategy> = LazyLock::new(|| {
    if env::var("GROUPER_PANIC_ON_ERR").as_deref() == Ok("1") {
        ErrorStrategy::Panic
    } else if env::var("GROUPER_BACKTRACE_IN_ERR").as_deref() == Ok("1") {
        ErrorStrategy::WithBacktrace
    } else {
        ErrorStrategy::Normal
    }
});

#[derive(Debug)]
pub struct ErrString(Cow<'static, str>);

impl ErrString {
    pub const fn new_static(s: &'static str) -> Self {
        Self(Cow::Borrowed(s))
    }
}

impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    fn from(msg: T) -> Self {
        match &*ERROR_STRATEGY {
            ErrorStrategy::Panic => panic!("{}", msg.into()),
            ErrorStrategy::WithBacktrace => ErrString(Cow::Owned(format!(
                "{}\n\nRust backtrace:\n{}",
                msg.into(),
                std::backtrace::Backtrace::force_capture()
            ))),
            ErrorStrategy::Normal => ErrString(msg.into()),
        }
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrouperError {
    #[error("out of memory: {0}")]
    OutOfMemory(ErrString),
    #[error("no data: {0}")]
    NoData(ErrString),
    #[error("{0}")]
    SchemaMismatch(ErrString),
    #[error("invariant violation: {0}")]
    InvariantViolation(ErrString),
    #[error("{0}")]
    ComputeError(ErrString),
}

impl GrouperError {
    /// Small-integer code domain surfaced to host environments.
    /// Zero is reserved for success.
    pub fn code(&self) -> i32 {
        use GrouperError::*;
        match self {
            OutOfMemory(_) => 1,
            NoData(_) => 2,
            SchemaMismatch(_) => 3,
            InvariantViolation(_) => 4,
            ComputeError(_) => 5,
        }
    }
}

impl From<TryReserveError> for GrouperError {
    fn from(value: TryReserveError) -> Self {
        GrouperError::OutOfMemory(format!("allocation refused: {value}").into())
    }
}

pub type GrouperResult<T> = Result<T, GrouperError>;

#[inline]
#[cold]
#[must_use]
pub fn to_compute_err(err: impl Display) -> GrouperError {
    GrouperError::ComputeError(err.to_string().into())
}

#[macro_export]
macro_rules! grouper_err {
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use(
            $crate::GrouperError::$variant(format!($fmt, $($arg),*).into())
        )
    };
    ($variant:ident: $err:expr $(,)?) => {
        $crate::__private::must_use(
            $crate::GrouperError::$variant($err.into())
        )
    };
}

#[macro_export]
macro_rules! grouper_bail {
    ($($tt:tt)+) => {
        return Err($crate::grouper_err!($($tt)+))
    };
}

#[macro_export]
macro_rules! grouper_ensure {
    ($cond:expr, $($tt:tt)+) => {
        if !$cond {
            $crate::grouper_bail!($($tt)+);
        }
    };
}

// Not public, referenced by macros only.
#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    #[inline]
    #[cold]
    #[must_use]
    pub fn must_use(error: crate::GrouperError) -> crate::GrouperError {
        error
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_codes_distinct() {
        let errs = [
            grouper_err!(OutOfMemory: "x"),
            grouper_err!(NoData: "x"),
            grouper_err!(SchemaMismatch: "x"),
            grouper_err!(InvariantViolation: "x"),
            grouper_err!(ComputeError: "x"),
        ];
        let mut codes: Vec<i32> = errs.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errs.len());
        assert!(codes.iter().all(|&c| c != 0));
    }

    #[test]
    fn test_try_reserve_maps_to_oom() {
        let mut v: Vec<u64> = Vec::new();
        let err = v.try_reserve(usize::MAX).unwrap_err();
        let err: GrouperError = err.into();
        assert_eq!(err.code(), 1);
    }
}
