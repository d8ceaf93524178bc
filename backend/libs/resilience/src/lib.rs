/// Resilience helpers shared by backend services
///
/// Currently provides a bounded retry loop with exponential backoff and jitter,
/// used for optimistic-concurrency commits that may collide with concurrent writers.
///
/// # Example
///
/// ```rust,no_run
/// use resilience::{retry_if, RetryConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let result = retry_if(
///         RetryConfig::default(),
///         |err: &String| err.as_str() == "stale",
///         || async { Ok::<_, String>(()) },
///     )
///     .await;
///     assert!(result.is_ok());
/// }
/// ```
pub mod retry;

pub use retry::{retry_if, RetryConfig, RetryError};
