use rand::Rng;

use crate::ocean::utils::{clamp, lerp, TWO_PI};

pub const NUM_OCTAVES: usize = 12;
pub const SMALLEST_WL_POW_2: f32 = -2.0;
pub const MIN_POWER_LOG: f32 = -6.0;
pub const MAX_POWER_LOG: f32 = 5.0;

/// Wind speed the authored power table corresponds to, in m/s.
pub const REFERENCE_WIND_SPEED: f32 = 10.0;

/// Power per octave plus the shaping controls applied to generated waves.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveSpectrum {
  pub power_log: [f32; NUM_OCTAVES],
  pub power_disabled: [bool; NUM_OCTAVES],
  pub chop_scales: [f32; NUM_OCTAVES],
  pub gravity_scales: [f32; NUM_OCTAVES],
  pub wave_direction_variance_deg: f32,
  pub gravity_scale: f32,
  pub chop: f32,
  pub multiplier: f32,
  pub small_wavelength_multiplier: f32,
}

impl Default for WaveSpectrum {
  fn default() -> Self {
    Self {
      power_log: [
        -6.0, -4.0088496, -3.4452133, -2.6996124, -2.615044, -1.2080691, -0.53905386, 0.27448857, 0.53627354,
        1.0282621, 1.4403292, -6.0,
      ],
      power_disabled: [false; NUM_OCTAVES],
      chop_scales: [1.0; NUM_OCTAVES],
      gravity_scales: [1.0; NUM_OCTAVES],
      wave_direction_variance_deg: 90.0,
      gravity_scale: 1.0,
      chop: 1.6,
      multiplier: 1.0,
      small_wavelength_multiplier: 1.0,
    }
  }
}

/// Smallest wavelength of an octave.
pub fn small_wavelength(octave: f32) -> f32 {
  2f32.powf(SMALLEST_WL_POW_2 + octave)
}

pub fn octave_index(wavelength: f32) -> usize {
  let wl_pow2 = clamp(
    wavelength.log2(),
    SMALLEST_WL_POW_2,
    SMALLEST_WL_POW_2 + NUM_OCTAVES as f32 - 1.0,
  );
  ((wl_pow2 - SMALLEST_WL_POW_2) as usize).min(NUM_OCTAVES - 1)
}

/// Phase speed of a deep water wave.
pub fn compute_wave_speed(wavelength: f32, gravity: f32) -> f32 {
  let k = TWO_PI / wavelength;
  (gravity / k).sqrt()
}

impl WaveSpectrum {
  /// A spectrum with every octave at minimum power except `octave`.
  pub fn single_octave(octave: usize, power_log: f32) -> Self {
    let mut spectrum = WaveSpectrum::default();
    for i in 0..NUM_OCTAVES {
      spectrum.power_log[i] = MIN_POWER_LOG;
      spectrum.power_disabled[i] = i != octave;
    }
    spectrum.power_log[octave] = clamp(power_log, MIN_POWER_LOG, MAX_POWER_LOG);
    spectrum
  }

  /// Amplitude of a component at `wavelength`, scaled by the random draw `rand0`.
  pub fn amplitude(&self, wavelength: f32, components_per_octave: f32, wind_speed: f32, gravity: f32, rand0: f32) -> f32 {
    if wavelength <= 0.0 || wind_speed <= 0.0 || components_per_octave <= 0.0 {
      return 0.0;
    }

    // stronger wind moves energy towards longer waves
    let wind_ratio = REFERENCE_WIND_SPEED / wind_speed;
    let wavelength = wavelength * wind_ratio * wind_ratio;

    let wl_pow2 = clamp(
      wavelength.log2(),
      SMALLEST_WL_POW_2,
      SMALLEST_WL_POW_2 + NUM_OCTAVES as f32 - 1.0,
    );
    let index = ((wl_pow2 - SMALLEST_WL_POW_2) as usize).min(NUM_OCTAVES - 1);

    let this_power = if self.power_disabled[index] {
      MIN_POWER_LOG
    } else {
      self.power_log[index]
    };
    let next_index = index + 1;
    let has_next = next_index < NUM_OCTAVES;
    let next_power = if has_next && !self.power_disabled[next_index] {
      self.power_log[next_index]
    } else {
      MIN_POWER_LOG
    };

    let wl_lo = 2f32.powf(wl_pow2.floor());
    let omega_lo = (TWO_PI / wl_lo) * compute_wave_speed(wl_lo, gravity);
    let wl_hi = 2.0 * wl_lo;
    let omega_hi = (TWO_PI / wl_hi) * compute_wave_speed(wl_hi, gravity);

    let domega = (omega_lo - omega_hi) / components_per_octave;

    let alpha = clamp((wavelength - wl_lo) / wl_lo, 0.0, 1.0);
    let power = if has_next {
      lerp(this_power, next_power, alpha)
    } else {
      this_power
    };

    let a_2 = 2.0 * 10f32.powf(power) * domega;
    a_2.sqrt() * rand0 * self.multiplier
  }

  /// Stratified samples of wavelength and direction angle, wavelengths ascending.
  pub fn generate_wave_data<R: Rng>(&self, components_per_octave: usize, rng: &mut R) -> (Vec<f32>, Vec<f32>) {
    let total = NUM_OCTAVES * components_per_octave;
    let mut wavelengths = Vec::with_capacity(total);
    let mut angles_deg = Vec::with_capacity(total);

    let mut min_wavelength = 2f32.powf(SMALLEST_WL_POW_2);
    let inv_components = 1.0 / components_per_octave as f32;

    for _octave in 0..NUM_OCTAVES {
      for i in 0..components_per_octave {
        let min_wavelength_i = min_wavelength + inv_components * min_wavelength * i as f32;
        let max_wavelength_i = (min_wavelength_i + inv_components * min_wavelength).min(2.0 * min_wavelength);
        wavelengths.push(lerp(min_wavelength_i, max_wavelength_i, rng.gen::<f32>()));

        let rnd = (i as f32 + rng.gen::<f32>()) * inv_components;
        angles_deg.push((2.0 * rnd - 1.0) * self.wave_direction_variance_deg);
      }

      min_wavelength *= 2.0;
    }

    (wavelengths, angles_deg)
  }

  pub fn apply_phillips(&mut self, wind_speed: f32, gravity: f32) {
    for octave in 0..NUM_OCTAVES {
      let wl = small_wavelength(octave as f32) * self.small_wavelength_multiplier * 1.5;
      let power = phillips(wind_speed, gravity, wl);
      self.power_log[octave] = Self::store_power(power);
    }
  }

  pub fn apply_pierson_moskowitz(&mut self, wind_speed: f32, gravity: f32) {
    for octave in 0..NUM_OCTAVES {
      let wl = small_wavelength(octave as f32) * self.small_wavelength_multiplier * 9.0;
      let power = pierson_moskowitz(gravity, wind_speed, wl);
      self.power_log[octave] = Self::store_power(power);
    }
  }

  pub fn apply_jonswap(&mut self, wind_speed: f32, fetch: f32, gravity: f32) {
    for octave in 0..NUM_OCTAVES {
      let wl = small_wavelength(octave as f32) * self.small_wavelength_multiplier * 9.0;
      let power = jonswap(gravity, wind_speed, wl, fetch);
      self.power_log[octave] = Self::store_power(power);
    }
  }

  // power is stored on a log scale, zero maps to the minimum
  fn store_power(power: f32) -> f32 {
    if power.is_nan() || power <= 10f32.powf(MIN_POWER_LOG) {
      return MIN_POWER_LOG;
    }
    clamp(power.log10(), MIN_POWER_LOG, MAX_POWER_LOG)
  }
}

const PHILLIPS_CONSTANT: f32 = 0.0081;

fn phillips(wind_speed: f32, gravity: f32, wavelength: f32) -> f32 {
  // wind along +x, waves along the wind
  let k = TWO_PI / wavelength;
  let k2 = k * k;
  let l = wind_speed * wind_speed / gravity;
  if l <= 0.0 {
    return 0.0;
  }
  PHILLIPS_CONSTANT * k2 * (-1.0 / (k2 * l * l)).exp() / (k2 * k2)
}

fn phil_spectrum(gravity: f32, alpha: f32, wavelength: f32) -> f32 {
  let k = TWO_PI / wavelength;
  let frequency = (gravity * k).sqrt();
  alpha * gravity * gravity / frequency.powi(5)
}

fn pierson_moskowitz_with_peak(gravity: f32, frequency_peak: f32, alpha: f32, wavelength: f32) -> f32 {
  let k = TWO_PI / wavelength;
  let frequency = (gravity * k).sqrt();
  phil_spectrum(gravity, alpha, wavelength) * (-(frequency_peak / frequency).powi(4) * 5.0 / 4.0).exp()
}

fn pierson_moskowitz(gravity: f32, wind_speed: f32, wavelength: f32) -> f32 {
  if wind_speed <= 0.0 {
    return 0.0;
  }
  let frequency_peak = 0.855 * gravity / wind_speed;
  pierson_moskowitz_with_peak(gravity, frequency_peak, PHILLIPS_CONSTANT, wavelength)
}

fn jonswap(gravity: f32, wind_speed: f32, wavelength: f32, fetch: f32) -> f32 {
  if wind_speed <= 0.0 || fetch <= 0.0 {
    return 0.0;
  }
  let alpha = 0.076 * (wind_speed * wind_speed / (fetch * gravity)).powf(0.22);

  let k = TWO_PI / wavelength;
  let frequency = (gravity * k).sqrt();
  let frequency_peak = 22.0 * (gravity * gravity / (wind_speed * fetch)).powf(1.0 / 3.0);
  let sigma: f32 = if frequency <= frequency_peak { 0.07 } else { 0.09 };
  let r = (-(frequency - frequency_peak).powi(2) / (2.0 * sigma * sigma * frequency_peak * frequency_peak)).exp();
  let gamma: f32 = 3.3;

  pierson_moskowitz_with_peak(gravity, frequency_peak, alpha, wavelength) * gamma.powf(r)
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  #[test]
  fn generated_wavelengths_ascend_within_octaves() {
    let spectrum = WaveSpectrum::default();
    let mut rng = StdRng::seed_from_u64(7);
    let (wavelengths, angles) = spectrum.generate_wave_data(8, &mut rng);

    assert_eq!(wavelengths.len(), NUM_OCTAVES * 8);
    assert!(wavelengths.windows(2).all(|w| w[0] <= w[1]));
    assert!(wavelengths[0] >= 0.25);
    assert!(*wavelengths.last().unwrap() <= 2f32.powf(SMALLEST_WL_POW_2 + NUM_OCTAVES as f32));
    assert!(angles.iter().all(|a| a.abs() <= 90.0));
  }

  #[test]
  fn minimum_power_gives_sub_epsilon_amplitudes() {
    let spectrum = WaveSpectrum::single_octave(4, MIN_POWER_LOG);
    for octave in 0..NUM_OCTAVES {
      let wl = small_wavelength(octave as f32) * 1.5;
      assert_eq!(spectrum.amplitude(wl, 8.0, 0.0, 9.81, 1.0), 0.0);
    }
  }

  #[test]
  fn amplitude_follows_power() {
    let spectrum = WaveSpectrum::single_octave(6, 1.0);
    // octave 6 spans [16, 32)
    let loud = spectrum.amplitude(16.0, 8.0, REFERENCE_WIND_SPEED, 9.81, 1.0);
    let quiet = spectrum.amplitude(2.0, 8.0, REFERENCE_WIND_SPEED, 9.81, 1.0);
    assert!(loud > 0.1);
    assert!(quiet < 0.01);
    assert_eq!(spectrum.amplitude(16.0, 8.0, REFERENCE_WIND_SPEED, 9.81, 0.0), 0.0);
  }

  #[test]
  fn presets_stay_in_range() {
    let mut spectrum = WaveSpectrum::default();
    spectrum.apply_jonswap(12.0, 500000.0, 9.81);
    assert!(spectrum.power_log.iter().all(|p| (MIN_POWER_LOG..=MAX_POWER_LOG).contains(p)));
    spectrum.apply_pierson_moskowitz(12.0, 9.81);
    assert!(spectrum.power_log.iter().all(|p| (MIN_POWER_LOG..=MAX_POWER_LOG).contains(p)));
    spectrum.apply_phillips(0.0, 9.81);
    assert!(spectrum.power_log.iter().all(|p| *p == MIN_POWER_LOG));
  }

  #[test]
  fn octave_index_clamps() {
    assert_eq!(octave_index(0.01), 0);
    assert_eq!(octave_index(0.3), 0);
    assert_eq!(octave_index(1.0), 2);
    assert_eq!(octave_index(1.0e6), NUM_OCTAVES - 1);
  }
}
