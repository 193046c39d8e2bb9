use std::future::Future;

use tracing::debug;

/// Applies `apply` to `state` right away, then awaits `remote`. If the remote
/// call fails, `state` is restored to its snapshot and the error returned.
pub async fn apply_optimistic<T, O, F>(
    state: &mut T,
    apply: impl FnOnce(&mut T),
    remote: F,
) -> anyhow::Result<O>
where
    T: Clone,
    F: Future<Output = anyhow::Result<O>>,
{
    let snapshot = state.clone();
    apply(state);
    match remote.await {
        Ok(confirmed) => Ok(confirmed),
        Err(error) => {
            debug!(%error, "remote update failed; restoring snapshot");
            *state = snapshot;
            Err(error)
        }
    }
}
