// Panic isolation for admitted jobs
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Run a job future, turning a panic into `Err(message)`
///
/// A panicking job must still release its admission slot, so the unwind is
/// stopped here instead of tearing down the spawned task.
pub(crate) async fn catch_job_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|payload| panic_message(payload.as_ref()))
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_value_passes_through() {
        let result = catch_job_panic(async { 42 }).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_str_panic_is_captured() {
        let result: Result<(), String> = catch_job_panic(async { panic!("agent crashed") }).await;
        assert_eq!(result, Err("agent crashed".to_string()));
    }

    #[tokio::test]
    async fn test_formatted_panic_is_captured() {
        let code = 7;
        let result: Result<(), String> =
            catch_job_panic(async move { panic!("exit {}", code) }).await;
        assert_eq!(result, Err("exit 7".to_string()));
    }

    #[test]
    fn test_unknown_payload() {
        let payload: Box<dyn Any + Send> = Box::new(5u8);
        assert_eq!(panic_message(payload.as_ref()), "Unknown panic");
    }
}
