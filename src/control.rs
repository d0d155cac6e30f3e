//! Thermal control core: policy, calibration, and the tick loop.

pub mod calibration;
pub mod driver;
pub mod policy;
pub mod profile;

use std::time::Duration;

use tokio::sync::watch;

/// Sleep for `duration` unless a shutdown is requested first.
/// Returns `true` when woken by shutdown.
pub async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }

    let sleep = tokio::time::sleep(duration);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            changed = shutdown.changed() => match changed {
                Ok(()) if *shutdown.borrow() => return true,
                Ok(()) => continue,
                // Sender gone: nobody can request shutdown any more
                Err(_) => {
                    (&mut sleep).await;
                    return false;
                }
            },
        }
    }
}
