//! CYW43 WiFi bring-up and link maintenance. The radio talks over a PIO SPI
//! like every other Pico W firmware; on top of it runs the embassy-net stack
//! with DHCP. Join attempts are bounded and stamp the network heartbeat
//! while they wait, so a slow association cannot look like a hang.

use cyw43::{Control, JoinOptions, PowerManagementMode};
use cyw43_pio::{PioSpi, RM2_CLOCK_DIVIDER};
use defmt::{info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_net::{Config, Stack, StackResources};
use embassy_rp::Peri;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{DMA_CH1, PIN_23, PIN_24, PIN_25, PIN_29, PIO1};
use embassy_rp::pio::Pio;
use embassy_time::{Duration, Timer, with_timeout};
use static_cell::StaticCell;

use crate::config;
use crate::supervisor::TaskHealth;

/// Total budget for one link bring-up attempt; abandoned until the next
/// supervisor cycle on timeout.
const JOIN_BUDGET: Duration = Duration::from_secs(5);
const DHCP_BUDGET: Duration = Duration::from_secs(5);
/// Heartbeat cadence while waiting on the radio.
const JOIN_POLL: Duration = Duration::from_millis(250);

pub struct WifiPeripherals {
    pub pwr: Peri<'static, PIN_23>,
    pub cs: Peri<'static, PIN_25>,
    pub dio: Peri<'static, PIN_24>,
    pub clk: Peri<'static, PIN_29>,
    pub pio: Peri<'static, PIO1>,
    pub dma: Peri<'static, DMA_CH1>,
}

/// The network-facing handles the supervisor loop works with.
pub struct Network {
    pub stack: Stack<'static>,
    pub control: Control<'static>,
}

#[embassy_executor::task]
async fn cyw43_task(
    runner: cyw43::Runner<'static, Output<'static>, PioSpi<'static, PIO1, 0, DMA_CH1>>,
) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, cyw43::NetDriver<'static>>) -> ! {
    runner.run().await
}

pub async fn init(spawner: Spawner, p: WifiPeripherals, health: &'static TaskHealth) -> Network {
    // IMPORTANT
    //
    // Download and make sure these files from https://github.com/embassy-rs/embassy/tree/main/cyw43-firmware
    // are available in `./pico/cyw43-firmware`.
    //
    // IMPORTANT
    let fw = include_bytes!("../cyw43-firmware/43439A0.bin");
    let clm = include_bytes!("../cyw43-firmware/43439A0_clm.bin");

    let pwr = Output::new(p.pwr, Level::Low);
    let cs = Output::new(p.cs, Level::High);
    let mut pio = Pio::new(p.pio, crate::Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        RM2_CLOCK_DIVIDER,
        pio.irq0,
        cs,
        p.dio,
        p.clk,
        p.dma,
    );

    static STATE: StaticCell<cyw43::State> = StaticCell::new();
    let state = STATE.init(cyw43::State::new());
    let (net_device, mut control, runner) = cyw43::new(state, pwr, spi, fw).await;
    unwrap!(spawner.spawn(cyw43_task(runner)));
    health.stamp_net();

    control.init(clm).await;
    control
        .set_power_management(PowerManagementMode::PowerSave)
        .await;
    health.stamp_net();

    static RESOURCES: StaticCell<StackResources<6>> = StaticCell::new();
    let (stack, runner) = embassy_net::new(
        net_device,
        Config::dhcpv4(Default::default()),
        RESOURCES.init(StackResources::new()),
        config::NET_SEED,
    );
    unwrap!(spawner.spawn(net_task(runner)));

    info!("wifi initialized");
    Network { stack, control }
}

/// One bounded attempt to get the link and DHCP lease up. Returns whether
/// the stack is usable afterwards.
pub async fn bring_link_up(net: &mut Network, health: &'static TaskHealth) -> bool {
    if net.stack.is_config_up() {
        return true;
    }

    info!("joining `{}`", config::WIFI_SSID);
    let join = with_timeout(JOIN_BUDGET, async {
        let attempt = net
            .control
            .join(config::WIFI_SSID, JoinOptions::new(config::WIFI_PASSWORD.as_bytes()));
        match select(attempt, heartbeat_while_waiting(health)).await {
            Either::First(result) => result,
            Either::Second(never) => match never {},
        }
    })
    .await;

    match join {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            warn!("join failed with status {}", err.status);
            return false;
        }
        Err(_) => {
            warn!("join timed out; retrying next cycle");
            return false;
        }
    }

    let dhcp = with_timeout(DHCP_BUDGET, async {
        match select(net.stack.wait_config_up(), heartbeat_while_waiting(health)).await {
            Either::First(()) => (),
            Either::Second(never) => match never {},
        }
    })
    .await;

    match dhcp {
        Ok(()) => {
            if let Some(cfg) = net.stack.config_v4() {
                info!("link up, address {}", cfg.address);
            }
            true
        }
        Err(_) => {
            warn!("no DHCP lease inside the budget");
            false
        }
    }
}

async fn heartbeat_while_waiting(health: &'static TaskHealth) -> core::convert::Infallible {
    loop {
        Timer::after(JOIN_POLL).await;
        health.stamp_net();
    }
}
