//! WS2812 output: one PIO state machine clocks the 256-pixel serpentine
//! strip while a DMA channel feeds it pre-packed GRB words.

use embassy_rp::Peri;
use embassy_rp::clocks::clk_sys_freq;
use embassy_rp::dma::{AnyChannel, Channel};
use embassy_rp::pio::{
    Common, Config, FifoJoin, Instance, PioPin, ShiftConfig, ShiftDirection, StateMachine,
};
use embassy_time::Timer;
use fixed::types::U24F8;
use smart_leds::RGB8;

pub struct Ws2812<'d, P: Instance, const S: usize, const N: usize> {
    dma: Peri<'d, AnyChannel>,
    sm: StateMachine<'d, P, S>,
}

impl<'d, P: Instance, const S: usize, const N: usize> Ws2812<'d, P, S, N> {
    pub fn new(
        pio: &mut Common<'d, P>,
        mut sm: StateMachine<'d, P, S>,
        dma: Peri<'d, impl Channel>,
        pin: Peri<'d, impl PioPin>,
    ) -> Self {
        // WS2812 bit timing, in PIO cycles
        const T1: u8 = 2;
        const T2: u8 = 5;
        const T3: u8 = 3;
        const CYCLES_PER_BIT: u32 = (T1 + T2 + T3) as u32;

        let side_set = pio::SideSet::new(false, 1, false);
        let mut a: pio::Assembler<32> = pio::Assembler::new_with_side_set(side_set);
        let mut wrap_target = a.label();
        let mut wrap_source = a.label();
        let mut do_zero = a.label();
        a.set_with_side_set(pio::SetDestination::PINDIRS, 1, 0);
        a.bind(&mut wrap_target);
        a.out_with_delay_and_side_set(pio::OutDestination::X, 1, T3 - 1, 0);
        a.jmp_with_delay_and_side_set(pio::JmpCondition::XIsZero, &mut do_zero, T1 - 1, 1);
        a.bind(&mut wrap_source);
        a.nop_with_delay_and_side_set(T2 - 1, 1);
        a.bind(&mut do_zero);
        a.nop_with_delay_and_side_set(T2 - 1, 0);
        let prg = a.assemble_with_wrap(wrap_source, wrap_target);

        let mut cfg = Config::default();
        let out_pin = pio.make_pio_pin(pin);
        cfg.set_out_pins(&[&out_pin]);
        cfg.set_set_pins(&[&out_pin]);
        cfg.use_program(&pio.load_program(&prg), &[&out_pin]);

        // clock math in kHz to stay inside the fixed-point range
        let clock_freq = U24F8::from_num(clk_sys_freq() / 1000);
        let ws2812_freq = U24F8::from_num(800);
        let bit_freq = ws2812_freq * CYCLES_PER_BIT;
        cfg.clock_divider = clock_freq / bit_freq;

        cfg.fifo_join = FifoJoin::TxOnly;
        cfg.shift_out = ShiftConfig {
            auto_fill: true,
            threshold: 24,
            direction: ShiftDirection::Left,
        };

        sm.set_config(&cfg);
        sm.set_enable(true);

        Self {
            dma: dma.into(),
            sm,
        }
    }

    pub async fn write(&mut self, colors: &[RGB8; N]) {
        let mut words = [0u32; N];
        for (word, c) in words.iter_mut().zip(colors) {
            *word = (u32::from(c.g) << 24) | (u32::from(c.r) << 16) | (u32::from(c.b) << 8);
        }
        self.sm
            .tx()
            .dma_push(self.dma.reborrow(), &words, false)
            .await;
        // latch: the strip needs the line idle before the next frame
        Timer::after_micros(60).await;
    }
}
