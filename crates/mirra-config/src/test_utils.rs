/// Runs `f` with the given variables set (`Some`) or unset (`None`),
/// restoring the previous environment afterwards.
///
/// Callers must be `#[serial]`: the process environment is global.
pub fn with_env<F, T>(vars: &[(&str, Option<&str>)], f: F) -> T
where
    F: FnOnce() -> T,
{
    let saved: Vec<_> = vars
        .iter()
        .map(|(key, _)| (*key, std::env::var(key).ok()))
        .collect();

    for (key, value) in vars {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }

    let out = f();

    for (key, value) in saved {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }

    out
}
