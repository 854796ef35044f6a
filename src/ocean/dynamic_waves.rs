use cgmath::Vector2;

use crate::ocean::cascade::RenderData;
use crate::ocean::channel::{sample_world, ChannelFormat, ChannelKind};
use crate::ocean::ocean_parameters::DynamicWaveParameters;
use crate::ocean::persistent_sim::{SimInputs, SimKernel, SourceData, StepContext, SubstepPolicy, MAX_SIM_STEPS};
use crate::ocean::utils::TWO_PI;

/// Ripple propagation as a damped wave equation, one height field per cascade.
pub struct DynamicWavesKernel {
  params: DynamicWaveParameters,
  gravity: f32,
  min_texels_per_wave: f32,
  stable: Vec<bool>,
  active: Vec<bool>,
}

impl DynamicWavesKernel {
  pub fn new(params: DynamicWaveParameters, gravity: f32, min_texels_per_wave: f32, lod_count: usize) -> Self {
    Self {
      params,
      gravity,
      min_texels_per_wave,
      stable: vec![true; lod_count],
      active: vec![false; lod_count],
    }
  }

  pub fn parameters(&self) -> &DynamicWaveParameters {
    &self.params
  }

  pub fn set_parameters(&mut self, params: DynamicWaveParameters) {
    self.params = params;
  }

  /// Wave speed at the smallest wavelength a cascade resolves.
  pub fn wave_speed(&self, texel_width: f32) -> f32 {
    let min_wavelength = texel_width * self.min_texels_per_wave;
    (self.gravity * self.params.gravity_multiplier * min_wavelength / TWO_PI).sqrt()
  }

  fn grid_in_range(&self, texel_width: f32) -> bool {
    texel_width >= self.params.min_grid_size
      && (texel_width <= self.params.max_grid_size || self.params.max_grid_size == 0.0)
  }
}

impl SimKernel for DynamicWavesKernel {
  fn name(&self) -> &'static str {
    "update_dyn_waves"
  }

  fn format(&self) -> ChannelFormat {
    ChannelKind::DynamicWaves.format()
  }

  fn substep_policy(&self) -> SubstepPolicy {
    SubstepPolicy::FixedFrequency {
      frequency: self.params.simulation_frequency,
      max_substeps: MAX_SIM_STEPS,
    }
  }

  fn step(&mut self, ctx: &StepContext, source: &SourceData<'_>, inputs: &SimInputs<'_>, target: &mut [f32]) {
    let rd = ctx.render_data;
    let tw = rd.texel_width;
    let res = rd.texture_res;
    let dt = ctx.dt;

    let c = self.wave_speed(tw);
    let courant = c * dt / tw;
    self.stable[ctx.lod] = courant <= self.params.courant_number;
    if !self.stable[ctx.lod] || !self.grid_in_range(tw) {
      target.iter_mut().for_each(|v| *v = 0.0);
      return;
    }

    let damping = 1.0 - self.params.damping;
    let dt_ratio = if ctx.dt_prev > 0.0 { dt / ctx.dt_prev } else { 1.0 };
    let c2_dt2 = c * c * dt * dt;
    let depth = inputs.depth.map(|d| d.slice(ctx.lod));

    let height = |p: Vector2<f32>| source.sample(p, 2)[0];

    for (i, out) in target.chunks_mut(2).enumerate() {
      let world = rd.texel_to_world(i as u32 % res, i as u32 / res);

      // dry land holds no water
      if let Some(depth) = depth {
        if sample_world(depth, &rd, 1, world)[0] <= 0.0 {
          out[0] = 0.0;
          out[1] = 0.0;
          continue;
        }
      }

      let state = source.sample(world, 2);
      let h = state[0];
      let h_prev = state[1];

      let laplacian = (height(world + Vector2::new(tw, 0.0))
        + height(world - Vector2::new(tw, 0.0))
        + height(world + Vector2::new(0.0, tw))
        + height(world - Vector2::new(0.0, tw))
        - 4.0 * h)
        / (tw * tw);

      out[0] = h + damping * (h - h_prev) * dt_ratio + c2_dt2 * laplacian;
      out[1] = h;
    }
  }

  fn post_step(&mut self, lod: usize, render_data: &RenderData) {
    self.active[lod] = self.stable[lod] && self.grid_in_range(render_data.texel_width);
  }

  fn is_active(&self, lod: usize) -> bool {
    self.active.get(lod).copied().unwrap_or(false)
  }
}
