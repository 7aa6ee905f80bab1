//! Panic guards for the FFI boundary.
//!
//! Unwinding must never cross an `extern "C"` function.

/// Wraps an FFI body returning [`VspError`](super::types::VspError); a panic
/// becomes `VspError::Unspecified`.
macro_rules! ffi_guard {
    ($($body:tt)*) => {{
        use std::panic;
        use std::panic::AssertUnwindSafe;

        match panic::catch_unwind(AssertUnwindSafe(move || { $($body)* })) {
            Ok(result) => result,
            Err(_) => $crate::ffi::types::VspError::Unspecified,
        }
    }};
}

/// Wraps an FFI body returning a pointer; a panic becomes a null pointer.
macro_rules! ffi_guard_ptr {
    ($($body:tt)*) => {{
        use std::panic;
        use std::panic::AssertUnwindSafe;
        use std::ptr;

        match panic::catch_unwind(AssertUnwindSafe(move || { $($body)* })) {
            Ok(result) => result,
            Err(_) => ptr::null_mut(),
        }
    }};
}

pub(crate) use ffi_guard;
pub(crate) use ffi_guard_ptr;

#[cfg(test)]
mod tests {
    use crate::ffi::types::VspError;

    #[test]
    fn ffi_guard_maps_panic_to_unspecified() {
        let ok: VspError = ffi_guard! { VspError::None };
        assert_eq!(ok, VspError::None);
        let result: VspError = ffi_guard! {
            panic!("boom");
        };
        assert_eq!(result, VspError::Unspecified);
    }

    #[test]
    fn ffi_guard_ptr_maps_panic_to_null() {
        let ptr: *mut u8 = ffi_guard_ptr! {
            panic!("boom");
        };
        assert!(ptr.is_null());
    }
}
