use cgmath::Vector2;

use crate::ocean::cascade::RenderData;
use crate::ocean::channel::{sample_bilinear, sample_world, ChannelFormat, ChannelKind};
use crate::ocean::ocean_parameters::FoamParameters;
use crate::ocean::persistent_sim::{SimInputs, SimKernel, SourceData, StepContext, SubstepPolicy};
use crate::ocean::utils::saturate;

/// Fades foam and deposits new foam where waves fold over or reach the shore.
pub struct FoamKernel {
  params: FoamParameters,
}

impl FoamKernel {
  pub fn new(params: FoamParameters) -> Self {
    Self { params }
  }

  pub fn parameters(&self) -> &FoamParameters {
    &self.params
  }

  pub fn set_parameters(&mut self, params: FoamParameters) {
    self.params = params;
  }
}

/// Jacobian determinant of the horizontal displacement, 1 for an undisturbed surface.
fn displacement_jacobian(data: &[f32], render_data: &RenderData, world: Vector2<f32>) -> f32 {
  let tw = render_data.texel_width;
  let sample = |p: Vector2<f32>| {
    let coord = render_data.world_to_texel(p);
    sample_bilinear(data, render_data.texture_res, 4, coord)
  };

  let right = sample(world + Vector2::new(tw, 0.0));
  let left = sample(world - Vector2::new(tw, 0.0));
  let up = sample(world + Vector2::new(0.0, tw));
  let down = sample(world - Vector2::new(0.0, tw));

  let inv = 1.0 / (2.0 * tw);
  let dx_dx = (right[0] - left[0]) * inv;
  let dz_dx = (right[2] - left[2]) * inv;
  let dx_dz = (up[0] - down[0]) * inv;
  let dz_dz = (up[2] - down[2]) * inv;

  (1.0 + dx_dx) * (1.0 + dz_dz) - dx_dz * dz_dx
}

impl SimKernel for FoamKernel {
  fn name(&self) -> &'static str {
    "update_foam"
  }

  fn format(&self) -> ChannelFormat {
    ChannelKind::Foam.format()
  }

  fn substep_policy(&self) -> SubstepPolicy {
    SubstepPolicy::FrameLocked
  }

  fn step(&mut self, ctx: &StepContext, source: &SourceData<'_>, inputs: &SimInputs<'_>, target: &mut [f32]) {
    let p = &self.params;
    let rd = ctx.render_data;
    let res = rd.texture_res;
    let dt = ctx.dt;

    // last frame's combined displacement still sits on last frame's grid
    let displacement = inputs.displacement.and_then(|d| {
      let drd = *inputs.level_set.render_data_prev(ctx.lod);
      if drd.texture_res == 0 {
        None
      } else {
        Some((d.slice(ctx.lod), drd))
      }
    });
    let depth = inputs.depth.map(|d| d.slice(ctx.lod));

    for (i, out) in target.iter_mut().enumerate() {
      let world = rd.texel_to_world(i as u32 % res, i as u32 / res);

      let mut foam = (source.sample(world, 1)[0] - p.foam_fade_rate * dt).max(0.0);

      if let Some((data, drd)) = displacement.as_ref() {
        let jacobian = displacement_jacobian(data, drd, world);
        foam += p.wave_foam_strength * (p.wave_foam_coverage - jacobian).max(0.0) * dt;
      }

      if let Some(depth) = depth {
        let d = sample_world(depth, &rd, 1, world)[0];
        if p.shoreline_foam_max_depth > 0.0 && d < p.shoreline_foam_max_depth {
          foam += p.shoreline_foam_strength * saturate(1.0 - d / p.shoreline_foam_max_depth) * dt;
        }
      }

      *out = foam;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ocean::cascade_level_set::CascadeLevelSet;
  use crate::ocean::channel::{CascadeArray, DEEP_WATER_DEPTH};
  use crate::ocean::ocean_parameters::OceanParameters;
  use crate::ocean::utils::approx_eq;
  use crate::ocean::viewpoint::ViewerScale;

  fn level_set() -> CascadeLevelSet {
    let params = OceanParameters {
      lod_count: 2,
      lod_resolution: 8,
      ..Default::default()
    };
    let mut ls = CascadeLevelSet::new(&params).unwrap();
    let scale = ViewerScale {
      scale: 8.0,
      altitude_alpha: 0.0,
    };
    ls.update(1, Vector2::new(0.0, 0.0), scale, &params);
    ls
  }

  fn ctx(ls: &CascadeLevelSet, dt: f32) -> StepContext {
    StepContext {
      lod: 0,
      substep: 0,
      dt,
      dt_prev: dt,
      render_data: *ls.render_data(0),
    }
  }

  #[test]
  fn foam_fades_linearly_and_never_goes_negative() {
    let ls = level_set();
    let data = vec![1.0; 64];
    let source = SourceData::Slice {
      index: 0,
      data: &data,
      render_data: *ls.render_data(0),
    };
    let inputs = SimInputs {
      level_set: &ls,
      displacement: None,
      depth: None,
    };
    let mut kernel = FoamKernel::new(FoamParameters::default());
    let mut target = vec![0.0; 64];

    kernel.step(&ctx(&ls, 0.5), &source, &inputs, &mut target);
    assert!(target.iter().all(|v| approx_eq(*v, 0.6, 1e-6)));

    kernel.step(&ctx(&ls, 5.0), &source, &inputs, &mut target);
    assert!(target.iter().all(|v| *v == 0.0));
  }

  #[test]
  fn flat_water_makes_no_whitecaps() {
    let ls = level_set();
    let displacement = CascadeArray::new(2, 8, 4);
    let inputs = SimInputs {
      level_set: &ls,
      displacement: Some(&displacement),
      depth: None,
    };
    let source = SourceData::ParamsOnly {
      render_data: *ls.render_data(0),
    };
    let mut kernel = FoamKernel::new(FoamParameters::default());
    let mut target = vec![1.0; 64];
    kernel.step(&ctx(&ls, 0.1), &source, &inputs, &mut target);
    assert!(target.iter().all(|v| *v == 0.0));
  }

  #[test]
  fn converging_displacement_deposits_foam() {
    let ls = level_set();
    let rd = *ls.render_data(0);
    let mut displacement = CascadeArray::new(2, 8, 4);
    // x displacement pulls the surface towards the center, compressing it
    for (i, texel) in displacement.slice_mut(0).chunks_mut(4).enumerate() {
      let world = rd.texel_to_world(i as u32 % 8, i as u32 / 8);
      texel[0] = -0.5 * world.x;
    }
    let inputs = SimInputs {
      level_set: &ls,
      displacement: Some(&displacement),
      depth: None,
    };
    let source = SourceData::ParamsOnly { render_data: rd };
    let mut kernel = FoamKernel::new(FoamParameters::default());
    let mut target = vec![0.0; 64];
    kernel.step(&ctx(&ls, 0.1), &source, &inputs, &mut target);

    // J = 0.5 in the interior, so foam = (0.8 - 0.5) * 0.1
    let center = (4 * 8 + 4) as usize;
    assert!(approx_eq(target[center], 0.03, 1e-4));
  }

  #[test]
  fn shallow_water_generates_shoreline_foam() {
    let ls = level_set();
    let mut depth = CascadeArray::new(2, 8, 1);
    depth.fill(DEEP_WATER_DEPTH);
    depth.slice_mut(0)[0] = 0.0;
    let inputs = SimInputs {
      level_set: &ls,
      displacement: None,
      depth: Some(&depth),
    };
    let source = SourceData::ParamsOnly {
      render_data: *ls.render_data(0),
    };
    let mut kernel = FoamKernel::new(FoamParameters::default());
    let mut target = vec![0.0; 64];
    kernel.step(&ctx(&ls, 0.1), &source, &inputs, &mut target);

    assert!(approx_eq(target[0], 2.0 * 0.1, 1e-6));
    assert_eq!(target[63], 0.0);
  }
}
