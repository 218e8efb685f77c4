//! The render context: a tight loop on its own core that wakes every
//! millisecond, does frame work at most every 33 ms and samples the ambient
//! light sensor at most once a second. Each frame takes the state lock with
//! a short bound; a contended lock skips the frame instead of stalling the
//! strip.

use defmt::{debug, info};
use embassy_rp::Peri;
use embassy_rp::adc::{self, Adc};
use embassy_rp::gpio::Pull;
use embassy_rp::peripherals::{ADC, DMA_CH0, PIN_16, PIN_26, PIO0};
use embassy_rp::pio::Pio;
use embassy_time::{Duration, Instant, Timer, with_timeout};
use embedded_graphics::prelude::RgbColor;
use smart_leds::RGB8;

use pixelclock_core::PIXELS;
use pixelclock_core::buffer::scale_pixel;
use pixelclock_core::render::Renderer;
use pixelclock_core::scheduler;

use crate::SharedStateMutex;
use crate::config;
use crate::leds::Ws2812;
use crate::supervisor::{TaskHealth, now_ms};

/// Frame gate: ~30 fps.
const FRAME_INTERVAL: Duration = Duration::from_millis(33);
/// Ambient sensor cadence.
const AMBIENT_INTERVAL: Duration = Duration::from_secs(1);
/// How long a frame may wait on the state lock before being skipped.
const LOCK_BUDGET: Duration = Duration::from_millis(10);

pub struct MatrixPeripherals {
    pub pio: Peri<'static, PIO0>,
    pub dma: Peri<'static, DMA_CH0>,
    pub data_pin: Peri<'static, PIN_16>,
    pub adc: Peri<'static, ADC>,
    pub ambient_pin: Peri<'static, PIN_26>,
}

#[embassy_executor::task]
pub async fn render_task(
    state: &'static SharedStateMutex,
    health: &'static TaskHealth,
    p: MatrixPeripherals,
) -> ! {
    let Pio {
        mut common, sm0, ..
    } = Pio::new(p.pio, crate::Irqs);
    let mut strip: Ws2812<'_, PIO0, 0, PIXELS> =
        Ws2812::new(&mut common, sm0, p.dma, p.data_pin);

    let mut adc = Adc::new(p.adc, crate::Irqs, adc::Config::default());
    let mut ambient = adc::Channel::new_pin(p.ambient_pin, Pull::None);

    let mut renderer = Renderer::new();
    let mut leds = [RGB8::default(); PIXELS];
    let mut last_frame = Instant::MIN;
    let mut last_ambient = Instant::MIN;

    info!("render context up");
    loop {
        health.stamp_render();
        Timer::after_millis(1).await;

        let now = Instant::now();
        if now - last_frame < FRAME_INTERVAL {
            continue;
        }
        last_frame = now;

        let ambient_sample = if now - last_ambient >= AMBIENT_INTERVAL {
            last_ambient = now;
            adc.read(&mut ambient).await.ok()
        } else {
            None
        };

        let tick_ms = now_ms();
        let frame = match with_timeout(LOCK_BUDGET, state.lock()).await {
            Ok(mut guard) => {
                scheduler::tick(&mut guard, config::PAGES, tick_ms);
                if ambient_sample.is_some() {
                    guard.brightness.last_ambient_read_ms = tick_ms;
                }
                let produced = renderer.compose(&mut guard, ambient_sample, tick_ms);
                produced.then_some(guard.brightness.current_value)
            }
            Err(_) => {
                debug!("state lock contended; frame skipped");
                None
            }
        };

        if let Some(brightness) = frame {
            for (led, px) in leds.iter_mut().zip(renderer.buffer.strip()) {
                let scaled = scale_pixel(*px, brightness);
                *led = RGB8::new(scaled.r(), scaled.g(), scaled.b());
            }
            strip.write(&leds).await;
        }
    }
}
