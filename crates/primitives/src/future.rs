use std::future::Future;
use std::pin::Pin;

/// Boxed future handed across threads to a dispatcher.
pub type BoxFutureStatic<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;
