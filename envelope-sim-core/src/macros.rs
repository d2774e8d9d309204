#[macro_export]
/// Generates a String similar to output of `dbg` but without printing
macro_rules! format_dbg {
    ($dbg_expr:expr) => {
        format!(
            "[{}:{}] {}: {:?}",
            file!(),
            line!(),
            stringify!($dbg_expr),
            $dbg_expr
        )
    };
    () => {
        format!("[{}:{}]", file!(), line!())
    };
}

/// `log::debug!` when the `logging` feature is enabled, nothing otherwise.
/// Arguments are still type checked without the feature.
macro_rules! sim_debug {
    ($($arg:tt)+) => {
        #[cfg(feature = "logging")]
        log::debug!($($arg)+);
        #[cfg(not(feature = "logging"))]
        if false {
            let _ = format!($($arg)+);
        }
    };
}

/// `log::warn!` when the `logging` feature is enabled, nothing otherwise.
macro_rules! sim_warn {
    ($($arg:tt)+) => {
        #[cfg(feature = "logging")]
        log::warn!($($arg)+);
        #[cfg(not(feature = "logging"))]
        if false {
            let _ = format!($($arg)+);
        }
    };
}

