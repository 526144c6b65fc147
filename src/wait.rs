use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::surface::{ElementRef, FormSurface};

/// Poll `condition` every `interval` until it returns `true` or `timeout`
/// elapses. The condition is always checked at least once.
pub async fn until<F, Fut>(timeout: Duration, interval: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    loop {
        if condition().await {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}

/// Poll `probe` until two consecutive reads return the same `Some` value.
pub async fn until_settled<T, F, Fut>(timeout: Duration, interval: Duration, mut probe: F) -> bool
where
    T: PartialEq,
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let start = Instant::now();
    let mut last = None;
    loop {
        let current = probe().await;
        if current.is_some() && current == last {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        last = current;
        tokio::time::sleep(interval).await;
    }
}

/// Wait until the element's layout box stops moving. A detached element
/// never settles.
pub async fn until_stable(
    surface: &dyn FormSurface,
    element: &ElementRef,
    timeout: Duration,
    interval: Duration,
) -> bool {
    until_settled(timeout, interval, || async move {
        surface.bounding_box(element).await.ok().flatten()
    })
    .await
}
