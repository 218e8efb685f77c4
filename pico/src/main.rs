//! pixelclock firmware entry point. Core 1 runs the render context (frame
//! loop, page scheduler, LED output); core 0 runs the network context (WiFi,
//! broker, weather, status) and the supervisor that feeds the hardware
//! watchdog. The two contexts share exactly one thing: the state mutex.

#![no_std]
#![no_main]

mod config;
mod leds;
mod net;
mod render;
mod supervisor;
mod wifi;

use defmt::unwrap;
use embassy_executor::Executor;
use embassy_rp::adc::InterruptHandler as AdcInterruptHandler;
use embassy_rp::bind_interrupts;
use embassy_rp::block::ImageDef;
use embassy_rp::multicore::{Stack, spawn_core1};
use embassy_rp::peripherals::{PIO0, PIO1};
use embassy_rp::pio::InterruptHandler as PioInterruptHandler;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use pixelclock_core::state::SharedState;

use crate::render::MatrixPeripherals;
use crate::supervisor::TaskHealth;
use crate::wifi::WifiPeripherals;

#[unsafe(link_section = ".start_block")]
#[used]
pub static IMAGE_DEF: ImageDef = ImageDef::secure_exe();

bind_interrupts!(pub struct Irqs {
    PIO0_IRQ_0 => PioInterruptHandler<PIO0>;
    PIO1_IRQ_0 => PioInterruptHandler<PIO1>;
    ADC_IRQ_FIFO => AdcInterruptHandler;
});

/// The single lock in front of the shared state store. Every mutation path
/// in either context goes through it.
pub type SharedStateMutex = Mutex<CriticalSectionRawMutex, SharedState>;

static CORE1_STACK: StaticCell<Stack<8192>> = StaticCell::new();
static EXECUTOR0: StaticCell<Executor> = StaticCell::new();
static EXECUTOR1: StaticCell<Executor> = StaticCell::new();
static STATE: StaticCell<SharedStateMutex> = StaticCell::new();
static HEALTH: TaskHealth = TaskHealth::new();

#[cortex_m_rt::entry]
fn main() -> ! {
    let p = embassy_rp::init(Default::default());

    let state: &'static SharedStateMutex = STATE.init(Mutex::new(SharedState::default()));

    let matrix = MatrixPeripherals {
        pio: p.PIO0,
        dma: p.DMA_CH0,
        data_pin: p.PIN_16,
        adc: p.ADC,
        ambient_pin: p.PIN_26,
    };
    let radio = WifiPeripherals {
        pwr: p.PIN_23,
        cs: p.PIN_25,
        dio: p.PIN_24,
        clk: p.PIN_29,
        pio: p.PIO1,
        dma: p.DMA_CH1,
    };

    spawn_core1(
        p.CORE1,
        CORE1_STACK.init_with(Stack::new),
        move || {
            let executor1 = EXECUTOR1.init(Executor::new());
            executor1.run(|spawner| {
                unwrap!(spawner.spawn(render::render_task(state, &HEALTH, matrix)));
            });
        },
    );

    let executor0 = EXECUTOR0.init(Executor::new());
    executor0.run(move |spawner| {
        unwrap!(spawner.spawn(net::bringup_task(spawner, radio, &HEALTH)));
        unwrap!(spawner.spawn(supervisor::supervisor_task(
            p.WATCHDOG, &HEALTH, state, spawner,
        )));
    });
}
