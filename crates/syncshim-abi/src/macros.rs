//! Helper macros for ABI function generation.
//!
//! Provides the `shim_fn!` macro that generates `#[unsafe(no_mangle)] pub unsafe extern "C" fn`
//! wrappers for entry points returning a result code.

/// Generate an ABI entry point that returns a result code.
///
/// # Usage
///
/// ```ignore
/// shim_fn! {
///     /// Doc comment for the function.
///     fn shim_thing(arg1: Type1, arg2: Type2) -> c_int {
///         // implementation body; `return` yields the code early
///     }
/// }
/// ```
///
/// The body runs inside a closure so an early `return` still passes through
/// the outcome counters in [`crate::counters`].
macro_rules! shim_fn {
    (
        $(#[$meta:meta])*
        fn $name:ident( $($arg:ident : $argty:ty),* $(,)? ) -> c_int
        $body:block
    ) => {
        $(#[$meta])*
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $name( $($arg : $argty),* ) -> ::std::ffi::c_int {
            #[allow(unused_unsafe, clippy::redundant_closure_call)]
            let code: ::std::ffi::c_int = (|| unsafe { $body })();
            $crate::counters::record(code);
            code
        }
    };
}
