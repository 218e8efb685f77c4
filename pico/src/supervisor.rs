//! Liveness supervision. Both execution contexts stamp a heartbeat at their
//! loop heads and at checkpoints inside slow operations; this task feeds the
//! hardware watchdog only while both heartbeats are fresh. A context that
//! stops stamping therefore escalates to a hard reset, while a network task
//! that *returns* (deliberate bail-out on a wedged session) is respawned
//! here with its transient state discarded.

use core::sync::atomic::{AtomicU32, Ordering};

use defmt::{info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_rp::Peri;
use embassy_rp::peripherals::WATCHDOG;
use embassy_rp::watchdog::Watchdog;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Instant, Timer};
use pixelclock_core::age_ms;
use pixelclock_core::state::SharedState;

/// Hardware watchdog period. The RP2350 counter tops out near 8.3 s, so
/// heartbeat freshness is sized well inside it.
const WATCHDOG_PERIOD: Duration = Duration::from_millis(8_000);
/// A heartbeat older than this marks its context as stalled.
const HEARTBEAT_FRESH_MS: u32 = 3_000;
/// Cadence of the feed loop.
const FEED_INTERVAL: Duration = Duration::from_secs(1);
/// Every n-th feed tick also checks for an exited network task.
const RESPAWN_EVERY_TICKS: u32 = 5;

pub fn now_ms() -> u32 {
    Instant::now().as_millis() as u32
}

/// Per-context liveness stamps, shared across both cores.
pub struct TaskHealth {
    render_ms: AtomicU32,
    net_ms: AtomicU32,
}

impl TaskHealth {
    pub const fn new() -> Self {
        Self {
            render_ms: AtomicU32::new(0),
            net_ms: AtomicU32::new(0),
        }
    }

    pub fn stamp_render(&self) {
        self.render_ms.store(now_ms(), Ordering::Relaxed);
    }

    pub fn stamp_net(&self) {
        self.net_ms.store(now_ms(), Ordering::Relaxed);
    }

    pub fn render_age(&self, now: u32) -> u32 {
        age_ms(now, self.render_ms.load(Ordering::Relaxed))
    }

    pub fn net_age(&self, now: u32) -> u32 {
        age_ms(now, self.net_ms.load(Ordering::Relaxed))
    }
}

#[embassy_executor::task]
pub async fn supervisor_task(
    watchdog: Peri<'static, WATCHDOG>,
    health: &'static TaskHealth,
    state: &'static Mutex<CriticalSectionRawMutex, SharedState>,
    spawner: Spawner,
) -> ! {
    let mut watchdog = Watchdog::new(watchdog);
    watchdog.start(WATCHDOG_PERIOD);
    info!("watchdog armed at {} ms", WATCHDOG_PERIOD.as_millis());

    // first instance; it parks on the resource handoff until bring-up is done
    unwrap!(spawner.spawn(crate::net::net_task(state, health)));

    let mut tick: u32 = 0;
    loop {
        Timer::after(FEED_INTERVAL).await;
        let now = now_ms();
        let render_age = health.render_age(now);
        let net_age = health.net_age(now);
        if render_age < HEARTBEAT_FRESH_MS && net_age < HEARTBEAT_FRESH_MS {
            watchdog.feed();
        } else {
            // withheld on purpose: a stalled context must end in a reset
            warn!(
                "heartbeat stale (render {} ms, net {} ms); watchdog not fed",
                render_age, net_age
            );
        }

        tick = tick.wrapping_add(1);
        if tick % RESPAWN_EVERY_TICKS == 0 {
            // spawn succeeds only while no instance is running; a live task
            // makes this a no-op
            if spawner.spawn(crate::net::net_task(state, health)).is_ok() {
                warn!("network task was down; respawned");
            }
        }
    }
}
