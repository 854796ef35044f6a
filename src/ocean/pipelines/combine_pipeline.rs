use crate::ocean::cascade_level_set::CascadeLevelSet;
use crate::ocean::channel::{CascadeArray, ChannelKind, ChannelState};
use crate::ocean::channel_store::ChannelStore;
use crate::ocean::combine::own_weight;
use crate::ocean::error::Result;
use crate::ocean::ocean_parameters::MAX_LOD_COUNT;
use crate::ocean::pipelines::{CascadeTextures, GpuContext};
use crate::ocean::utils::compute_work_group_count;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Parameters {
  lod: u32,
  lod_count: u32,
  resolution: u32,
  _padding: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct LodData {
  pos_snapped: [f32; 2],
  texel_width: f32,
  weight: f32,
}

/// Combines the displacement cascades in place, reading the coarser slice of the same texture.
///
/// Only the lod inputs are combined. The dynamic waves and flow folds run on the CPU path, so the
/// result matches `combine_cascades` only while [`CombinePipeline::covers`] holds.
pub struct CombinePipeline {
  resolution: u32,
  lod_count: u32,

  pub lod_inputs: CascadeTextures,
  pub displacement: CascadeTextures,

  lod_data_buffer: wgpu::Buffer,
  textures_bind_group: wgpu::BindGroup,
  lod_data_bind_group: wgpu::BindGroup,
  pipeline: wgpu::ComputePipeline,
}

impl CombinePipeline {
  pub fn init(device: &wgpu::Device, resolution: u32, lod_count: u32) -> Self {
    let lod_inputs = CascadeTextures::init(device, "Lod inputs", resolution, lod_count);
    let displacement = CascadeTextures::init(device, "Displacement cascades", resolution, lod_count);

    let textures_bind_group_layout =
      device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Combine - texture bind group layout"),
        entries: &[
          // lod_inputs
          wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
              view_dimension: wgpu::TextureViewDimension::D2Array,
              format: wgpu::TextureFormat::Rgba32Float,
              access: wgpu::StorageTextureAccess::ReadOnly,
            },
            count: None,
          },
          // displacement
          wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
              view_dimension: wgpu::TextureViewDimension::D2Array,
              format: wgpu::TextureFormat::Rgba32Float,
              access: wgpu::StorageTextureAccess::ReadWrite,
            },
            count: None,
          },
        ],
      });

    let lod_data_bind_group_layout =
      device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Combine - lod data bind group layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
          binding: 0,
          visibility: wgpu::ShaderStages::COMPUTE,
          ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
          },
          count: None,
        }],
      });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
      label: Some("Combine cascades pipeline layout"),
      bind_group_layouts: &[&textures_bind_group_layout, &lod_data_bind_group_layout],
      push_constant_ranges: &[wgpu::PushConstantRange {
        stages: wgpu::ShaderStages::COMPUTE,
        range: 0..std::mem::size_of::<Parameters>() as u32,
      }],
    });

    let shader = device.create_shader_module(&wgpu::ShaderModuleDescriptor {
      label: Some("Combine cascades shader"),
      source: wgpu::ShaderSource::Wgsl(include_str!("./shaders/combine_cascades.wgsl").into()),
    });

    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
      label: Some("Combine cascades pipeline"),
      layout: Some(&pipeline_layout),
      module: &shader,
      entry_point: "combine",
    });

    let lod_data_buffer = device.create_buffer(&wgpu::BufferDescriptor {
      label: Some("Lod data buffer"),
      size: (std::mem::size_of::<LodData>() * MAX_LOD_COUNT) as u64,
      usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
      mapped_at_creation: false,
    });

    let textures_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
      label: Some("Combine cascades bind group"),
      layout: &textures_bind_group_layout,
      entries: &[
        wgpu::BindGroupEntry {
          binding: 0,
          resource: wgpu::BindingResource::TextureView(&lod_inputs.create_view()),
        },
        wgpu::BindGroupEntry {
          binding: 1,
          resource: wgpu::BindingResource::TextureView(&displacement.create_view()),
        },
      ],
    });

    let lod_data_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
      label: Some("Combine lod data bind group"),
      layout: &lod_data_bind_group_layout,
      entries: &[wgpu::BindGroupEntry {
        binding: 0,
        resource: lod_data_buffer.as_entire_binding(),
      }],
    });

    Self {
      resolution,
      lod_count,
      lod_inputs,
      displacement,
      lod_data_buffer,
      textures_bind_group,
      lod_data_bind_group,
      pipeline,
    }
  }

  /// True when none of the channels folded into the combine are active.
  pub fn covers(channels: &ChannelStore) -> bool {
    [ChannelKind::DynamicWaves, ChannelKind::Flow]
      .iter()
      .all(|kind| channels.state(*kind) != ChannelState::Active)
  }

  pub fn update_lod_data(&self, queue: &wgpu::Queue, level_set: &CascadeLevelSet) {
    let mut lods = [LodData {
      pos_snapped: [0.0, 0.0],
      texel_width: 0.0,
      weight: 0.0,
    }; MAX_LOD_COUNT];

    for (lod, data) in lods.iter_mut().enumerate().take(level_set.lod_count()) {
      let rd = level_set.render_data(lod);
      *data = LodData {
        pos_snapped: [rd.pos_snapped.x, rd.pos_snapped.y],
        texel_width: rd.texel_width,
        weight: own_weight(level_set, lod),
      };
    }

    queue.write_buffer(&self.lod_data_buffer, 0, bytemuck::cast_slice(&lods));
  }

  /// One pass per cascade, largest first, so each pass sees the finished coarser slice.
  pub fn dispatch(&self, encoder: &mut wgpu::CommandEncoder) {
    let (dispatch_width, dispatch_height) =
      compute_work_group_count((self.resolution, self.resolution), (8, 8));

    for lod in (0..self.lod_count).rev() {
      let params = Parameters {
        lod,
        lod_count: self.lod_count,
        resolution: self.resolution,
        _padding: 0,
      };

      let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some("Combine cascade"),
      });
      compute_pass.set_pipeline(&self.pipeline);
      compute_pass.set_bind_group(0, &self.textures_bind_group, &[]);
      compute_pass.set_bind_group(1, &self.lod_data_bind_group, &[]);
      compute_pass.set_push_constants(0, bytemuck::cast_slice(&[params]));
      compute_pass.dispatch(dispatch_width, dispatch_height, 1);
    }
  }

  /// Uploads the lod inputs, combines them and reads the displacement back.
  pub fn run(&self, gpu: &GpuContext, level_set: &CascadeLevelSet, lod_inputs: &CascadeArray) -> Result<CascadeArray> {
    self.lod_inputs.upload(&gpu.queue, lod_inputs)?;
    self.update_lod_data(&gpu.queue, level_set);

    let mut encoder = gpu
      .device
      .create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Combine encoder"),
      });
    self.dispatch(&mut encoder);
    gpu.queue.submit(Some(encoder.finish()));

    self.displacement.read_back(gpu)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ocean::ocean_parameters::{DynamicWaveParameters, FoamParameters, OceanParameters};

  #[test]
  fn folded_channels_fall_outside_the_gpu_combine() {
    let params = OceanParameters {
      lod_count: 2,
      lod_resolution: 8,
      ..Default::default()
    };
    let mut channels = ChannelStore::new(&params, DynamicWaveParameters::default(), FoamParameters::default());
    channels.set_enabled(ChannelKind::Foam, true);
    channels.set_enabled(ChannelKind::SeaFloorDepth, true);
    assert!(CombinePipeline::covers(&channels));

    channels.set_enabled(ChannelKind::DynamicWaves, true);
    assert!(!CombinePipeline::covers(&channels));
    channels.set_enabled(ChannelKind::DynamicWaves, false);

    channels.set_enabled(ChannelKind::Flow, true);
    assert!(!CombinePipeline::covers(&channels));
  }
}
