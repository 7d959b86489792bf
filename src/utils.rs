//! # Utility Functions Module
//!
//! Helpers for building external command lines.

/// Converts any iterable of string-like items to `Vec<String>`.
///
/// Keeps argument lists for external tools free of `.to_string()` noise:
///
/// ```rust
/// use karuku::utils::to_string_vec;
///
/// let file = "/tmp/shot.png";
/// let args = to_string_vec(["--force", "--ext", ".png", file]);
/// assert_eq!(args.len(), 4);
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Builds an argument vector from mixed expressions.
///
/// ```rust
/// use karuku::args;
///
/// let speed = 3;
/// let args = args!["--speed", speed, "--force"];
/// assert_eq!(args, vec!["--speed", "3", "--force"]);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        $crate::utils::to_string_vec([$($item.to_string()),*])
    };
}
