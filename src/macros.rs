//! Macros for error/warning printing

/// Expand to an error message
#[macro_export]
macro_rules! sbs_error {
    ($($err:tt)*) => ({
        use colored::Colorize;
        eprintln!("{}: {}", "[sbsmode error]".red().bold(), format!($($err)*));
    })
}

/// Expand to an info message
#[macro_export]
macro_rules! sbs_info {
    ($($err:tt)*) => ({
        use colored::Colorize;
        eprintln!("{}: {}", "[sbsmode info]".purple().bold(), format!($($err)*));
    })
}
