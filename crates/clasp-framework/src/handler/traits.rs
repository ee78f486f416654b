//! Parameter-injected functions.
//!
//! [`FromCtxFn`] is implemented for every async function whose parameters
//! all implement [`FromContext`]. Calling it extracts each parameter from the
//! context first; if any extraction fails the function is never invoked and
//! the extraction error is returned instead.
//!
//! ```rust,ignore
//! async fn simple() {}
//!
//! async fn echo(event: BoxedEvent) -> String {
//!     event.message().map(|m| m.extract_plain_text()).unwrap_or_default()
//! }
//!
//! async fn greet(name: Match<String>, bot: BoxedBot) -> Option<String> {
//!     name.result.map(|n| format!("hello, {n}"))
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{self, BoxFuture};

use crate::context::ClaspContext;
use crate::error::ExtractResult;
use crate::extractor::FromContext;

/// A function that can be called with parameters pulled from a
/// [`ClaspContext`].
///
/// `R` is the function's output, `T` the tuple of its parameter types. The
/// tuple only exists to keep the blanket impls for different arities apart.
pub trait FromCtxFn<R, T>: Clone + Send + Sync + 'static {
    /// Extracts every parameter and runs the function.
    fn call(&self, ctx: Arc<ClaspContext>) -> BoxFuture<'static, ExtractResult<R>>;
}

macro_rules! impl_from_ctx_fn {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_variables)]
        impl<F, Fut, R, $($ty,)*> FromCtxFn<R, ($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: Send + 'static,
            $( $ty: FromContext + Send + 'static, )*
        {
            fn call(&self, ctx: Arc<ClaspContext>) -> BoxFuture<'static, ExtractResult<R>> {
                $(
                    let $ty = match $ty::from_context(&ctx) {
                        Ok(value) => value,
                        Err(e) => return future::ready(Err(e)).boxed(),
                    };
                )*

                let fut = (self)($($ty,)*);
                async move { Ok(fut.await) }.boxed()
            }
        }
    };
}

// Generate implementations for 0-16 parameters
impl_from_ctx_fn!();
impl_from_ctx_fn!(T1);
impl_from_ctx_fn!(T1, T2);
impl_from_ctx_fn!(T1, T2, T3);
impl_from_ctx_fn!(T1, T2, T3, T4);
impl_from_ctx_fn!(T1, T2, T3, T4, T5);
impl_from_ctx_fn!(T1, T2, T3, T4, T5, T6);
impl_from_ctx_fn!(T1, T2, T3, T4, T5, T6, T7);
impl_from_ctx_fn!(T1, T2, T3, T4, T5, T6, T7, T8);
impl_from_ctx_fn!(T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_from_ctx_fn!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_from_ctx_fn!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_from_ctx_fn!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);
impl_from_ctx_fn!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13);
impl_from_ctx_fn!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14);
impl_from_ctx_fn!(
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15
);
impl_from_ctx_fn!(
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15, T16
);
