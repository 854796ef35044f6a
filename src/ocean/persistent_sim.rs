use cgmath::Vector2;

use crate::ocean::backend::{FrameRecorder, ResourceRef};
use crate::ocean::cascade::RenderData;
use crate::ocean::cascade_level_set::CascadeLevelSet;
use crate::ocean::channel::{sample_world, CascadeArray, ChannelBuffer, ChannelFormat, ChannelKind, ChannelState};
use crate::ocean::error::Result;
use crate::ocean::input_registry::{DrawTarget, InputRegistry};

/// Upper bound on substeps per frame.
pub const MAX_SIM_STEPS: u32 = 4;
pub const INITIAL_SUBSTEP_DT: f32 = 1.0 / 60.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubstepPolicy {
  /// Whole substeps of `1 / frequency`, leftover time carries to the next frame.
  FixedFrequency { frequency: f32, max_substeps: u32 },
  /// A single step of the frame's own dt.
  FrameLocked,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubstepPlan {
  pub count: u32,
  pub dt: f32,
  pub leftover: f32,
  /// Time discarded because the substep cap was hit.
  pub dropped: f32,
}

impl SubstepPolicy {
  pub fn plan(&self, elapsed: f32) -> SubstepPlan {
    match *self {
      SubstepPolicy::FixedFrequency {
        frequency,
        max_substeps,
      } => {
        if frequency <= 0.0 || elapsed <= 0.0 {
          return SubstepPlan {
            count: 0,
            dt: 0.0,
            leftover: elapsed.max(0.0),
            dropped: 0.0,
          };
        }

        let substep_dt = 1.0 / frequency;
        let wanted = (elapsed * frequency).floor() as u32;
        if wanted > max_substeps {
          let count = max_substeps;
          return SubstepPlan {
            count,
            dt: substep_dt,
            leftover: 0.0,
            dropped: elapsed - count as f32 * substep_dt,
          };
        }

        SubstepPlan {
          count: wanted,
          dt: if wanted > 0 { substep_dt } else { 0.0 },
          leftover: elapsed - wanted as f32 * substep_dt,
          dropped: 0.0,
        }
      }
      SubstepPolicy::FrameLocked => SubstepPlan {
        count: if elapsed > 0.0 { 1 } else { 0 },
        dt: elapsed.max(0.0),
        leftover: 0.0,
        dropped: 0.0,
      },
    }
  }
}

/// What a kernel reads for one cascade in one substep.
pub enum SourceData<'a> {
  Slice {
    index: usize,
    data: &'a [f32],
    render_data: RenderData,
  },
  /// No valid source slot, only grid metrics. Samples read zero.
  ParamsOnly { render_data: RenderData },
}

impl<'a> SourceData<'a> {
  pub fn render_data(&self) -> &RenderData {
    match self {
      SourceData::Slice { render_data, .. } => render_data,
      SourceData::ParamsOnly { render_data } => render_data,
    }
  }

  pub fn index(&self) -> Option<usize> {
    match self {
      SourceData::Slice { index, .. } => Some(*index),
      SourceData::ParamsOnly { .. } => None,
    }
  }

  pub fn sample(&self, world: Vector2<f32>, components: usize) -> [f32; 4] {
    match self {
      SourceData::Slice { data, render_data, .. } => sample_world(data, render_data, components, world),
      SourceData::ParamsOnly { .. } => [0.0; 4],
    }
  }
}

/// Other channels a simulation may read.
pub struct SimInputs<'a> {
  pub level_set: &'a CascadeLevelSet,
  /// Combined displacement of the previous frame, laid out on the previous render data.
  pub displacement: Option<&'a CascadeArray>,
  pub depth: Option<&'a CascadeArray>,
}

#[derive(Debug, Clone, Copy)]
pub struct StepContext {
  pub lod: usize,
  pub substep: u32,
  pub dt: f32,
  pub dt_prev: f32,
  pub render_data: RenderData,
}

pub trait SimKernel {
  fn name(&self) -> &'static str;

  fn format(&self) -> ChannelFormat;

  fn substep_policy(&self) -> SubstepPolicy;

  /// Prepares the kernel. An error disables the channel.
  fn load(&mut self) -> Result<()> {
    Ok(())
  }

  fn step(&mut self, ctx: &StepContext, source: &SourceData<'_>, inputs: &SimInputs<'_>, target: &mut [f32]);

  fn post_step(&mut self, _lod: usize, _render_data: &RenderData) {}

  fn is_active(&self, _lod: usize) -> bool {
    true
  }
}

/// Drives a stateful channel through fixed substeps with double buffered storage.
pub struct PersistentSimStepper<K: SimKernel> {
  kind: ChannelKind,
  kernel: K,
  state: ChannelState,
  buffer: Option<ChannelBuffer>,
  registry: InputRegistry,

  lod_count: usize,
  resolution: u32,
  time_to_simulate: f32,
  previous_substep_dt: f32,
  sim_time: f32,
}

impl<K: SimKernel> PersistentSimStepper<K> {
  pub fn new(kind: ChannelKind, kernel: K, lod_count: usize, resolution: u32) -> Self {
    Self {
      kind,
      kernel,
      state: ChannelState::Uninitialized,
      buffer: None,
      registry: InputRegistry::new(),
      lod_count,
      resolution,
      time_to_simulate: 0.0,
      previous_substep_dt: INITIAL_SUBSTEP_DT,
      sim_time: 0.0,
    }
  }

  pub fn set_enabled(&mut self, enabled: bool) {
    if !enabled {
      self.state = ChannelState::Disabled;
      self.buffer = None;
      return;
    }
    if self.state == ChannelState::Active {
      return;
    }

    match self.kernel.load() {
      Ok(()) => {
        self.buffer = Some(ChannelBuffer::new(self.kind, self.lod_count, self.resolution));
        self.state = ChannelState::Active;
        self.time_to_simulate = 0.0;
        self.previous_substep_dt = INITIAL_SUBSTEP_DT;
      }
      Err(error) => {
        log::warn!("{} disabled: {}", self.kind.name(), error);
        self.buffer = None;
        self.state = ChannelState::Disabled;
      }
    }
  }

  pub fn state(&self) -> ChannelState {
    self.state
  }

  pub fn kernel(&self) -> &K {
    &self.kernel
  }

  pub fn kernel_mut(&mut self) -> &mut K {
    &mut self.kernel
  }

  pub fn registry(&self) -> &InputRegistry {
    &self.registry
  }

  pub fn registry_mut(&mut self) -> &mut InputRegistry {
    &mut self.registry
  }

  pub fn previous_substep_dt(&self) -> f32 {
    self.previous_substep_dt
  }

  pub fn time_to_simulate(&self) -> f32 {
    self.time_to_simulate
  }

  /// Latest state, `None` unless the channel is active.
  pub fn current(&self) -> Option<&CascadeArray> {
    match self.state {
      ChannelState::Active => self.buffer.as_ref().map(|b| b.current()),
      _ => None,
    }
  }

  pub fn data(&self, lod: usize) -> Option<&[f32]> {
    self.current().map(|c| c.slice(lod))
  }

  pub fn is_lod_active(&self, lod: usize) -> bool {
    self.state == ChannelState::Active && self.kernel.is_active(lod)
  }

  /// Runs this frame's substeps and returns how many ran.
  pub fn update(&mut self, frame_dt: f32, inputs: &SimInputs<'_>, recorder: &mut FrameRecorder) -> u32 {
    if self.state != ChannelState::Active {
      return 0;
    }
    let buffer = match self.buffer.as_mut() {
      Some(buffer) => buffer,
      None => return 0,
    };

    let policy = self.kernel.substep_policy();
    let elapsed = match policy {
      SubstepPolicy::FixedFrequency { .. } => self.time_to_simulate + frame_dt,
      SubstepPolicy::FrameLocked => frame_dt,
    };
    let plan = policy.plan(elapsed);
    self.time_to_simulate = plan.leftover;
    if plan.dropped > 0.0 {
      log::debug!(
        "{}: substep cap of {} reached, dropped {:.4}s",
        self.kind.name(),
        plan.count,
        plan.dropped
      );
    }

    let level_set = inputs.level_set;
    let exponent = level_set.scale_change_exponent();
    let components = buffer.format().components;
    let name = self.kind.name();
    let lod_count = self.lod_count as i32;

    for substep in 0..plan.count {
      buffer.swap();
      recorder.marker("swap", vec![ResourceRef::whole(name)]);

      let (source, target) = match buffer.source_and_target() {
        Some(pair) => pair,
        None => break,
      };

      for lod in (0..self.lod_count).rev() {
        // the scale change is absorbed by the first substep
        let source_index = lod as i32 + if substep == 0 { exponent } else { 0 };
        let source_data = if source_index >= 0 && source_index < lod_count {
          let index = source_index as usize;
          let render_data = if substep == 0 {
            *level_set.render_data_prev(index)
          } else {
            *level_set.render_data(index)
          };
          SourceData::Slice {
            index,
            data: source.slice(index),
            render_data,
          }
        } else {
          SourceData::ParamsOnly {
            render_data: *level_set.render_data(lod),
          }
        };

        let render_data = *level_set.render_data(lod);
        let ctx = StepContext {
          lod,
          substep,
          dt: plan.dt,
          dt_prev: self.previous_substep_dt,
          render_data,
        };
        self.kernel.step(&ctx, &source_data, inputs, target.slice_mut(lod));

        let mut draw_target = DrawTarget {
          lod,
          render_data,
          components,
          time: self.sim_time,
          data: target.slice_mut(lod),
        };
        self.registry.draw_all(&mut draw_target);

        let reads = match source_data.index() {
          Some(index) => vec![ResourceRef::slice(name, index)],
          None => Vec::new(),
        };
        recorder.dispatch(self.kernel.name(), reads, vec![ResourceRef::slice(name, lod)], self.resolution);
      }

      self.previous_substep_dt = plan.dt;
      self.sim_time += plan.dt;
    }

    for lod in 0..self.lod_count {
      self.kernel.post_step(lod, level_set.render_data(lod));
    }

    plan.count
  }
}
