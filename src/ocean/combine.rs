use cgmath::Vector2;

use crate::ocean::backend::{FrameRecorder, ResourceRef};
use crate::ocean::cascade::RenderData;
use crate::ocean::cascade_level_set::CascadeLevelSet;
use crate::ocean::channel::{sample_bilinear, sample_world, CascadeArray};
use crate::ocean::ocean_parameters::{CombineStrategy, DynamicWaveParameters};
use crate::ocean::utils::clamp;

pub const DISPLACEMENT: &str = "animated_waves";
pub const LOD_INPUTS: &str = "animated_waves_inputs";
const AUX: &str = "combine_aux";

/// Dynamic wave heights folded into the displacement where the cascade is active.
pub struct DynamicWavesFold<'a> {
  pub data: &'a CascadeArray,
  pub active: Vec<bool>,
  pub params: DynamicWaveParameters,
}

/// Flow field used to advect each cascade's own wave input.
pub struct FlowFold<'a> {
  pub data: &'a CascadeArray,
  pub period: f32,
  pub time: f32,
}

impl<'a> FlowFold<'a> {
  /// Offsets and weights of the two advection phases.
  fn phases(&self) -> [(f32, f32); 2] {
    let t0 = (self.time / self.period).fract();
    let t1 = (self.time / self.period + 0.5).fract();
    let w0 = 1.0 - (2.0 * t0 - 1.0).abs();
    [(t0 * self.period, w0), (t1 * self.period, 1.0 - w0)]
  }
}

pub struct CombineSources<'a> {
  pub level_set: &'a CascadeLevelSet,
  pub lod_inputs: &'a CascadeArray,
  pub dynamic_waves: Option<DynamicWavesFold<'a>>,
  pub flow: Option<FlowFold<'a>>,
}

/// Weight of a cascade's own waves, fading out the last cascade while the scale can still shrink.
pub fn own_weight(level_set: &CascadeLevelSet, lod: usize) -> f32 {
  if lod + 1 == level_set.lod_count() && level_set.scale_could_decrease() {
    return level_set.altitude_alpha();
  }
  1.0
}

fn own_waves(sources: &CombineSources<'_>, lod: usize, rd: &RenderData, world: Vector2<f32>, index: usize) -> [f32; 4] {
  let inputs = sources.lod_inputs.slice(lod);

  match sources.flow.as_ref() {
    Some(flow) => {
      let f = sample_world(flow.data.slice(lod), rd, 2, world);
      let velocity = Vector2::new(f[0], f[1]);
      let mut out = [0.0; 4];
      for (offset, weight) in flow.phases().iter() {
        let coord = rd.world_to_texel(world - velocity * *offset);
        let s = sample_bilinear(inputs, rd.texture_res, 4, coord);
        for c in 0..4 {
          out[c] += s[c] * weight;
        }
      }
      out
    }
    None => {
      let mut out = [0.0; 4];
      out.copy_from_slice(&inputs[index * 4..index * 4 + 4]);
      out
    }
  }
}

fn fold_dynamic_waves(fold: &DynamicWavesFold<'_>, lod: usize, rd: &RenderData, x: u32, y: u32, out: &mut [f32]) {
  let res = rd.texture_res;
  let data = fold.data.slice(lod);
  let h = |x: u32, y: u32| data[((y * res + x) as usize) * 2];

  let tw = rd.texel_width;
  let grad_x = (h((x + 1).min(res - 1), y) - h(x.saturating_sub(1), y)) / (2.0 * tw);
  let grad_z = (h(x, (y + 1).min(res - 1)) - h(x, y.saturating_sub(1))) / (2.0 * tw);

  let limit = fold.params.displace_clamp * tw;
  out[0] += clamp(-fold.params.horiz_displace * grad_x, -limit, limit);
  out[1] += h(x, y);
  out[2] += clamp(-fold.params.horiz_displace * grad_z, -limit, limit);
}

/// Writes the combined displacement of `lod` into `out`. `coarser` is the already combined
/// cascade above it.
pub fn combine_lod(sources: &CombineSources<'_>, lod: usize, coarser: Option<&[f32]>, out: &mut [f32]) {
  let level_set = sources.level_set;
  let rd = *level_set.render_data(lod);
  let res = rd.texture_res;
  let weight = own_weight(level_set, lod);
  let coarser_rd = if lod + 1 < level_set.lod_count() {
    Some(*level_set.render_data(lod + 1))
  } else {
    None
  };
  let fold = sources
    .dynamic_waves
    .as_ref()
    .filter(|f| f.active.get(lod).copied().unwrap_or(false));

  for (i, texel) in out.chunks_mut(4).enumerate() {
    let x = i as u32 % res;
    let y = i as u32 / res;
    let world = rd.texel_to_world(x, y);

    let own = own_waves(sources, lod, &rd, world, i);
    for c in 0..4 {
      texel[c] = own[c] * weight;
    }

    if let (Some(data), Some(crd)) = (coarser, coarser_rd.as_ref()) {
      let s = sample_world(data, crd, 4, world);
      for c in 0..4 {
        texel[c] += s[c];
      }
    }

    if let Some(fold) = fold {
      fold_dynamic_waves(fold, lod, &rd, x, y, texel);
    }
  }
}

/// Combines every cascade from largest to smallest into `target`.
pub fn combine_cascades(
  strategy: CombineStrategy,
  sources: &CombineSources<'_>,
  target: &mut CascadeArray,
  aux: &mut Vec<f32>,
  recorder: &mut FrameRecorder,
) {
  let lod_count = sources.level_set.lod_count();
  let res = target.resolution();

  for lod in (0..lod_count).rev() {
    let mut reads = vec![ResourceRef::slice(LOD_INPUTS, lod)];
    if lod + 1 < lod_count {
      reads.push(ResourceRef::slice(DISPLACEMENT, lod + 1));
    }

    match strategy {
      CombineStrategy::PingPong => {
        aux.resize(target.slice(lod).len(), 0.0);
        let coarser = if lod + 1 < lod_count {
          Some(target.slice(lod + 1))
        } else {
          None
        };
        combine_lod(sources, lod, coarser, aux);
        recorder.dispatch("combine", reads, vec![ResourceRef::whole(AUX)], res);

        target.slice_mut(lod).copy_from_slice(aux);
        recorder.dispatch(
          "copy",
          vec![ResourceRef::whole(AUX)],
          vec![ResourceRef::slice(DISPLACEMENT, lod)],
          res,
        );
      }
      CombineStrategy::Direct => {
        let (slice, coarser) = target.slice_and_coarser(lod);
        combine_lod(sources, lod, coarser, slice);
        recorder.dispatch("combine", reads, vec![ResourceRef::slice(DISPLACEMENT, lod)], res);
      }
    }
  }
}
