use std::future::Future;
use std::pin::Pin;

/// Boxed future for dyn-compatible collaborator traits.
///
/// Not `Send`: the synchronization engine runs on a single-threaded host.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;
