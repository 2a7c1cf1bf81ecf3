/// Logs a formatted message only when debug mode is enabled.
///
/// Works with anything that has a `debug_mode: bool` field, normally
/// `LiveMapSettings`.
#[macro_export]
macro_rules! debug_log {
    ($settings:expr, $($arg:tt)*) => {
        if $settings.debug_mode {
            bevy::prelude::info!($($arg)*);
        }
    };
}
