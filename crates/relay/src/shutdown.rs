use tokio::sync::watch;

/// Resolve once the stop flag reads `true` or its sender is gone.
///
/// Returns `()` so callers can use it as a `select!` branch without holding a
/// watch borrow across later awaits.
pub(crate) async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}
