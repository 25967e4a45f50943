use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use log::{debug, error, info, warn};
use tokio::time::timeout;

use crate::config::RouterConfig;
use crate::router::Router;
use crate::session::{Received, SessionError, Sessions};
use crate::utils::format_elapsed_time;

/// Connect to every configured neighbor and route messages until a neighbor
/// closes its channel or `shutdown` is set.
///
/// A closed channel ends the router normally (after withdrawing that
/// neighbor's routes); a transport error ends it with the error.
pub async fn serve(config: RouterConfig, shutdown: Arc<AtomicBool>) -> Result<(), SessionError> {
    let mut sessions = Sessions::connect(&config)?;
    let mut router = Router::new(config.asn, &config.neighbors);
    info!(
        "Router AS{} started with {} neighbors",
        config.asn,
        config.neighbors.len()
    );

    let started = Instant::now();
    let result = run(&mut router, &mut sessions, config.poll_interval, &shutdown).await;
    if let Err(err) = &result {
        error!("{}", err);
    }

    info!(
        "Router stopped after {} with {} routes",
        format_elapsed_time(started.elapsed()),
        router.rib().len()
    );
    for (neighbor, counts) in sessions.counts() {
        debug!("{}: {}", neighbor, counts);
    }
    result
}

/// Event loop: wait for the next read from any neighbor (up to
/// `poll_interval`), fully process it, then send every resulting message
/// before reading again.
pub async fn run(
    router: &mut Router,
    sessions: &mut Sessions,
    poll_interval: Duration,
    shutdown: &AtomicBool,
) -> Result<(), SessionError> {
    let mut inbound = sessions.inbound();
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Stopping router...");
            return Ok(());
        }
        let (neighbor, received) = match timeout(poll_interval, inbound.next()).await {
            Ok(Some(read)) => read,
            Ok(None) => {
                info!("No neighbor channels left");
                return Ok(());
            }
            Err(_) => continue,
        };
        let outbound = match received? {
            Received::Message(message) => {
                sessions.mark_received(neighbor, false);
                debug!("Received {} from {}", message, neighbor);
                router.handle(neighbor, message)
            }
            Received::Malformed { src, reason } => {
                sessions.mark_received(neighbor, true);
                warn!("Malformed message from {}: {}", neighbor, reason);
                router.handle_malformed(neighbor, src)
            }
            Received::Closed => {
                info!("Neighbor {} closed its channel", neighbor);
                router.neighbor_down(neighbor);
                return Ok(());
            }
        };
        for message in outbound {
            sessions.send(message).await?;
        }
    }
}
