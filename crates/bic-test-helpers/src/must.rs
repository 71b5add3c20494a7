//! Unwrap helpers with good error messages.
//!
//! Test code in this workspace is held to the same no-`unwrap` lints as
//! library code. These helpers take the place of `unwrap()` and `expect()`,
//! and `#[track_caller]` keeps the panic location at the call site.

use std::fmt::Debug;

/// Unwrap a `Result`, panicking with the error value on `Err`.
///
/// ```rust
/// use bic_test_helpers::must;
///
/// let result: Result<u16, &str> = Ok(16);
/// assert_eq!(must(result), 16);
/// ```
///
/// # Panics
///
/// Panics if the result is `Err`.
#[track_caller]
pub fn must<T, E: Debug>(result: Result<T, E>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => panic!("must: unexpected Err: {e:?}"),
    }
}

/// # Panics
///
/// Panics with `msg` if the option is `None`.
#[track_caller]
pub fn must_some<T>(option: Option<T>, msg: &str) -> T {
    match option {
        Some(v) => v,
        None => panic!("must_some: {msg}"),
    }
}

/// Unwrap a `Result`, naming what was being attempted on failure.
///
/// # Panics
///
/// Panics if the result is `Err`, with the context and error value.
#[track_caller]
pub fn must_with<T, E: Debug>(result: Result<T, E>, context: &str) -> T {
    match result {
        Ok(v) => v,
        Err(e) => panic!("must_with: {context}: {e:?}"),
    }
}

/// Unwrap an `Err`, panicking if the result unexpectedly succeeded.
///
/// # Panics
///
/// Panics if the result is `Ok`.
#[track_caller]
pub fn must_err<T: Debug, E>(result: Result<T, E>) -> E {
    match result {
        Ok(v) => panic!("must_err: expected Err, got Ok({v:?})"),
        Err(e) => e,
    }
}

#[cfg(feature = "mock")]
mod async_helpers {
    use super::*;
    use std::future::Future;

    /// Async version of [`must`].
    ///
    /// ```rust,ignore
    /// let report = must_async(probe.get_component_version(ComponentId(1))).await;
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the future resolves to `Err`.
    #[track_caller]
    pub async fn must_async<F, T, E>(future: F) -> T
    where
        F: Future<Output = Result<T, E>>,
        E: Debug,
    {
        match future.await {
            Ok(v) => v,
            Err(e) => panic!("must_async: unexpected Err: {e:?}"),
        }
    }
}

#[cfg(feature = "mock")]
pub use async_helpers::must_async;
