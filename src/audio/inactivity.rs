use std::{sync::Weak, time::Duration};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::player::Player;

/// Revisa cada `poll` si el reproductor lleva más de `timeout` inactivo.
///
/// On an idle disconnect the player asks the registry to drop it and the
/// monitor exits; it also exits when the player is gone or `shutdown` fires.
pub(crate) async fn watch(
    player: Weak<Player>,
    poll: Duration,
    timeout: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = time::interval_at(Instant::now() + poll, poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(player) = player.upgrade() else {
            break;
        };

        if player.disconnect_if_idle(timeout).await {
            player.request_eviction();
            break;
        }
    }

    debug!("Monitor de inactividad detenido");
}
