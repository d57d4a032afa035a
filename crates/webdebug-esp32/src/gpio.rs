//! GPIO and PWM through the ESP-IDF GPIO and LEDC drivers.
//!
//! Pins are chosen at runtime by clients, so this module talks to the
//! drivers by pin number instead of through typed `esp-idf-hal` pins.

use esp_idf_svc::sys;
use log::{debug, info};
use webdebug_core::{GpioBank, HardwareError};

use crate::esp_reason;

const LEDC_CHANNELS: usize = 8;
const LEDC_TIMERS: usize = 4;

/// 8-bit duty resolution, 50% duty.
const PWM_DUTY: u32 = 128;

/// LEDC channel routed to a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PwmChannel {
    pin: u8,
    timer: usize,
}

/// Where a new PWM output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Assignment {
    channel: usize,
    timer: usize,
    /// The timer was idle and must be programmed with the new frequency.
    new_timer: bool,
}

/// Bookkeeping of the low-speed LEDC channels and timers.
///
/// Each PWM pin owns one channel (preferably `pin % 8`). Pins running at the
/// same frequency share a timer, so at most four distinct frequencies run at
/// once.
#[derive(Debug, Default)]
struct LedcSlots {
    channels: [Option<PwmChannel>; LEDC_CHANNELS],
    timer_freq: [u32; LEDC_TIMERS],
}

impl LedcSlots {
    fn channel_of(&self, pin: u8) -> Option<usize> {
        self.channels
            .iter()
            .position(|c| matches!(c, Some(c) if c.pin == pin))
    }

    fn timer_in_use(&self, timer: usize) -> bool {
        self.channels.iter().flatten().any(|c| c.timer == timer)
    }

    fn assign(&mut self, pin: u8, frequency_hz: u32) -> Result<Assignment, &'static str> {
        let shared = (0..LEDC_TIMERS)
            .find(|&t| self.timer_in_use(t) && self.timer_freq[t] == frequency_hz);
        let (timer, new_timer) = match shared {
            Some(t) => (t, false),
            None => (
                (0..LEDC_TIMERS)
                    .find(|&t| !self.timer_in_use(t))
                    .ok_or("no free LEDC timer")?,
                true,
            ),
        };

        let preferred = usize::from(pin) % LEDC_CHANNELS;
        let channel = if self.channels[preferred].is_none() {
            preferred
        } else {
            self.channels
                .iter()
                .position(Option::is_none)
                .ok_or("no free LEDC channel")?
        };

        self.channels[channel] = Some(PwmChannel { pin, timer });
        self.timer_freq[timer] = frequency_hz;
        Ok(Assignment {
            channel,
            timer,
            new_timer,
        })
    }

    fn free(&mut self, channel: usize) {
        self.channels[channel] = None;
    }
}

/// Direct GPIO access for the registered pins.
#[derive(Debug, Default)]
pub struct EspGpio {
    slots: LedcSlots,
}

impl EspGpio {
    pub fn new() -> Self {
        Self::default()
    }

    fn configure(pin: u8, output: bool) -> Result<(), HardwareError> {
        let conf = sys::gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: if output {
                sys::gpio_mode_t_GPIO_MODE_OUTPUT
            } else {
                sys::gpio_mode_t_GPIO_MODE_INPUT
            },
            pull_up_en: sys::gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: sys::gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: sys::gpio_int_type_t_GPIO_INTR_DISABLE,
            ..Default::default()
        };
        sys::esp!(unsafe { sys::gpio_config(&conf) }).map_err(|e| HardwareError::Configure {
            pin,
            reason: e.to_string(),
        })
    }

    /// Stop the channel owned by `pin`, if any. Other pins keep running.
    fn release(&mut self, pin: u8) -> Result<(), HardwareError> {
        let Some(channel) = self.slots.channel_of(pin) else {
            return Ok(());
        };
        let ret = unsafe {
            sys::ledc_stop(
                sys::ledc_mode_t_LEDC_LOW_SPEED_MODE,
                channel as sys::ledc_channel_t,
                0,
            )
        };
        if ret != sys::ESP_OK {
            return Err(HardwareError::Configure {
                pin,
                reason: esp_reason(ret),
            });
        }
        self.slots.free(channel);
        debug!("PWM stopped on GPIO{} (channel {})", pin, channel);
        Ok(())
    }

    fn program(pin: u8, frequency_hz: u32, slot: Assignment) -> Result<(), HardwareError> {
        let configure_err = |e: sys::EspError| HardwareError::Configure {
            pin,
            reason: e.to_string(),
        };

        if slot.new_timer {
            let timer_conf = sys::ledc_timer_config_t {
                speed_mode: sys::ledc_mode_t_LEDC_LOW_SPEED_MODE,
                timer_num: slot.timer as sys::ledc_timer_t,
                duty_resolution: sys::ledc_timer_bit_t_LEDC_TIMER_8_BIT,
                freq_hz: frequency_hz,
                clk_cfg: sys::soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
                ..Default::default()
            };
            sys::esp!(unsafe { sys::ledc_timer_config(&timer_conf) }).map_err(configure_err)?;
        }

        let channel_conf = sys::ledc_channel_config_t {
            speed_mode: sys::ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: slot.channel as sys::ledc_channel_t,
            timer_sel: slot.timer as sys::ledc_timer_t,
            intr_type: sys::ledc_intr_type_t_LEDC_INTR_DISABLE,
            gpio_num: i32::from(pin),
            duty: PWM_DUTY,
            hpoint: 0,
            ..Default::default()
        };
        sys::esp!(unsafe { sys::ledc_channel_config(&channel_conf) }).map_err(configure_err)
    }
}

impl GpioBank for EspGpio {
    fn set_direction(&mut self, pin: u8, output: bool) -> Result<(), HardwareError> {
        self.release(pin)?;
        Self::configure(pin, output)
    }

    fn read_level(&mut self, pin: u8) -> Result<bool, HardwareError> {
        Ok(unsafe { sys::gpio_get_level(pin as sys::gpio_num_t) } != 0)
    }

    fn write_level(&mut self, pin: u8, high: bool) -> Result<(), HardwareError> {
        let ret = unsafe { sys::gpio_set_level(pin as sys::gpio_num_t, u32::from(high)) };
        if ret != sys::ESP_OK {
            return Err(HardwareError::Write {
                pin,
                reason: esp_reason(ret),
            });
        }
        Ok(())
    }

    fn start_pwm(&mut self, pin: u8, frequency_hz: u32) -> Result<(), HardwareError> {
        self.release(pin)?;
        if frequency_hz == 0 {
            return Self::configure(pin, true);
        }

        let slot = self
            .slots
            .assign(pin, frequency_hz)
            .map_err(|reason| HardwareError::Configure {
                pin,
                reason: reason.to_string(),
            })?;
        if let Err(e) = Self::program(pin, frequency_hz, slot) {
            self.slots.free(slot.channel);
            return Err(e);
        }

        info!(
            "PWM started on GPIO{} at {}Hz (channel {}, timer {})",
            pin, frequency_hz, slot.channel, slot.timer
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_pin_gets_its_own_channel() {
        let mut slots = LedcSlots::default();

        let a = slots.assign(18, 1000).unwrap();
        let b = slots.assign(19, 2000).unwrap();
        assert_eq!((a.channel, b.channel), (2, 3));
        assert_ne!(a.timer, b.timer);
        assert_eq!(slots.channel_of(18), Some(2));
        assert_eq!(slots.channel_of(19), Some(3));
    }

    #[test]
    fn test_same_frequency_shares_timer() {
        let mut slots = LedcSlots::default();

        let a = slots.assign(18, 1000).unwrap();
        let b = slots.assign(19, 1000).unwrap();
        assert_eq!(a.timer, b.timer);
        assert!(a.new_timer);
        assert!(!b.new_timer);
    }

    #[test]
    fn test_channel_collision_falls_back_to_free_channel() {
        let mut slots = LedcSlots::default();

        // 2 and 18 both prefer channel 2.
        assert_eq!(slots.assign(18, 1000).unwrap().channel, 2);
        assert_eq!(slots.assign(2, 1000).unwrap().channel, 0);
        assert_eq!(slots.channel_of(18), Some(2));
    }

    #[test]
    fn test_freeing_one_pin_keeps_others() {
        let mut slots = LedcSlots::default();
        slots.assign(18, 1000).unwrap();
        let b = slots.assign(19, 2000).unwrap();

        slots.free(b.channel);
        assert_eq!(slots.channel_of(19), None);
        assert_eq!(slots.channel_of(18), Some(2));
        assert!(!slots.timer_in_use(b.timer));
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let mut slots = LedcSlots::default();
        for (pin, freq) in [(0, 100), (2, 200), (4, 300), (5, 400)] {
            slots.assign(pin, freq).unwrap();
        }
        assert_eq!(slots.assign(12, 500), Err("no free LEDC timer"));

        for pin in [13, 14, 15, 16] {
            slots.assign(pin, 100).unwrap();
        }
        assert_eq!(slots.assign(17, 100), Err("no free LEDC channel"));
    }
}
