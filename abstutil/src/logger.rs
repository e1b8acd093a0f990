/// Intercept messages using the `log` crate and print them to STDERR. The filter defaults to
/// `info`, but can be overridden with `RUST_LOG`.
///
/// Calling this more than once is harmless; only the first call installs the logger.
pub fn setup() {
    use env_logger::{Builder, Env};
    let _ = Builder::from_env(Env::default().default_filter_or("info")).try_init();
}
