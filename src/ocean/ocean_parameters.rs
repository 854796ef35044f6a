/// Hard ceiling on the number of cascades, matching downstream array sizing.
pub const MAX_LOD_COUNT: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineStrategy {
  /// Combine into an auxiliary buffer then copy back into the array slot.
  PingPong,
  /// Read the coarser slot of the same array while writing the finer one.
  Direct,
}

#[derive(Debug, Clone, Copy)]
pub struct OceanParameters {
  pub lod_count: usize,
  pub lod_resolution: u32,
  pub min_texels_per_wave: f32,
  /// The smallest scale the ocean can be, -1 for unbounded.
  pub min_scale: f32,
  /// The largest scale the ocean can be, -1 for unbounded.
  pub max_scale: f32,
  pub sea_level: f32,
  pub gravity: f32,
  pub drop_detail_height_based_on_waves: bool,
  pub combine_strategy: CombineStrategy,
}

impl Default for OceanParameters {
  fn default() -> OceanParameters {
    OceanParameters {
      lod_count: 7,
      lod_resolution: 256,
      min_texels_per_wave: 3.0,
      min_scale: 8.0,
      max_scale: 256.0,
      sea_level: 0.0,
      gravity: 9.81,
      drop_detail_height_based_on_waves: false,
      combine_strategy: CombineStrategy::PingPong,
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub struct WaveParameters {
  pub components_per_octave: usize,
  pub wind_speed: f32,
  pub wind_speed_locked: bool,
  pub wind_direction_deg: f32,
  pub random_seed: u64,
  /// When false the spectrum is resampled every frame.
  pub spectrum_fixed_at_runtime: bool,
  /// Amplitude of the counter-travelling wave relative to the forward one.
  pub reverse_wave_weight: f32,
  /// Texels per side of each periodic wave tile.
  pub wave_resolution: u32,
}

impl Default for WaveParameters {
  fn default() -> WaveParameters {
    WaveParameters {
      components_per_octave: 8,
      wind_speed: 10.0,
      wind_speed_locked: false,
      wind_direction_deg: 0.0,
      random_seed: 0,
      spectrum_fixed_at_runtime: true,
      reverse_wave_weight: 0.5,
      wave_resolution: 128,
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub struct FoamParameters {
  pub foam_fade_rate: f32,
  pub wave_foam_strength: f32,
  pub wave_foam_coverage: f32,
  pub shoreline_foam_max_depth: f32,
  pub shoreline_foam_strength: f32,
}

impl Default for FoamParameters {
  fn default() -> FoamParameters {
    FoamParameters {
      foam_fade_rate: 0.8,
      wave_foam_strength: 1.0,
      wave_foam_coverage: 0.8,
      shoreline_foam_max_depth: 0.65,
      shoreline_foam_strength: 2.0,
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub struct DynamicWaveParameters {
  pub simulation_frequency: f32,
  pub damping: f32,
  pub courant_number: f32,
  pub horiz_displace: f32,
  pub displace_clamp: f32,
  pub gravity_multiplier: f32,
  /// Cascades with a finer texel width than this are not simulated.
  pub min_grid_size: f32,
  /// Cascades with a coarser texel width are not simulated, 0 for no limit.
  pub max_grid_size: f32,
}

impl Default for DynamicWaveParameters {
  fn default() -> DynamicWaveParameters {
    DynamicWaveParameters {
      simulation_frequency: 60.0,
      damping: 0.05,
      courant_number: 0.7,
      horiz_displace: 3.0,
      displace_clamp: 0.3,
      gravity_multiplier: 1.0,
      min_grid_size: 0.0,
      max_grid_size: 0.0,
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub struct FlowParameters {
  pub flow_period: f32,
}

impl Default for FlowParameters {
  fn default() -> FlowParameters {
    FlowParameters { flow_period: 1.0 }
  }
}
