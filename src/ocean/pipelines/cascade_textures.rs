use crate::ocean::channel::CascadeArray;
use crate::ocean::error::{OceanError, Result};
use crate::ocean::pipelines::GpuContext;

const TEXEL_SIZE: u32 = 16;

/// A cascade array mirrored in an Rgba32Float 2D array texture, one layer per cascade.
pub struct CascadeTextures {
  pub texture: wgpu::Texture,
  resolution: u32,
  layers: u32,
}

impl CascadeTextures {
  pub fn init(device: &wgpu::Device, label: &str, resolution: u32, layers: u32) -> Self {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
      label: Some(label),
      size: wgpu::Extent3d {
        width: resolution,
        height: resolution,
        depth_or_array_layers: layers,
      },
      mip_level_count: 1,
      sample_count: 1,
      dimension: wgpu::TextureDimension::D2,
      format: wgpu::TextureFormat::Rgba32Float,
      usage: wgpu::TextureUsages::STORAGE_BINDING
        | wgpu::TextureUsages::COPY_SRC
        | wgpu::TextureUsages::COPY_DST,
    });

    Self {
      texture,
      resolution,
      layers,
    }
  }

  pub fn resolution(&self) -> u32 {
    self.resolution
  }

  pub fn layers(&self) -> u32 {
    self.layers
  }

  pub fn create_view(&self) -> wgpu::TextureView {
    self.texture.create_view(&wgpu::TextureViewDescriptor {
      dimension: Some(wgpu::TextureViewDimension::D2Array),
      ..Default::default()
    })
  }

  pub fn upload(&self, queue: &wgpu::Queue, array: &CascadeArray) -> Result<()> {
    if array.components() != 4 || array.resolution() != self.resolution || array.count() as u32 != self.layers {
      return Err(OceanError::Gpu(format!(
        "cascade array {}x{}x{} does not fit texture {}x{}x{}",
        array.resolution(),
        array.count(),
        array.components(),
        self.resolution,
        self.layers,
        4
      )));
    }

    for layer in 0..self.layers {
      queue.write_texture(
        wgpu::ImageCopyTexture {
          texture: &self.texture,
          mip_level: 0,
          origin: wgpu::Origin3d {
            x: 0,
            y: 0,
            z: layer,
          },
          aspect: wgpu::TextureAspect::All,
        },
        bytemuck::cast_slice(array.slice(layer as usize)),
        wgpu::ImageDataLayout {
          offset: 0,
          bytes_per_row: std::num::NonZeroU32::new(TEXEL_SIZE * self.resolution),
          rows_per_image: std::num::NonZeroU32::new(self.resolution),
        },
        wgpu::Extent3d {
          width: self.resolution,
          height: self.resolution,
          depth_or_array_layers: 1,
        },
      );
    }

    Ok(())
  }

  /// Copies every layer back to the CPU. Blocks until the copy is done.
  pub fn read_back(&self, gpu: &GpuContext) -> Result<CascadeArray> {
    let unpadded_bytes_per_row = TEXEL_SIZE * self.resolution;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = (unpadded_bytes_per_row + align - 1) / align * align;

    let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
      label: Some("Cascade readback buffer"),
      size: (padded_bytes_per_row * self.resolution * self.layers) as u64,
      usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
      mapped_at_creation: false,
    });

    let mut encoder = gpu
      .device
      .create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Cascade readback encoder"),
      });
    encoder.copy_texture_to_buffer(
      wgpu::ImageCopyTexture {
        texture: &self.texture,
        mip_level: 0,
        origin: wgpu::Origin3d::ZERO,
        aspect: wgpu::TextureAspect::All,
      },
      wgpu::ImageCopyBuffer {
        buffer: &buffer,
        layout: wgpu::ImageDataLayout {
          offset: 0,
          bytes_per_row: std::num::NonZeroU32::new(padded_bytes_per_row),
          rows_per_image: std::num::NonZeroU32::new(self.resolution),
        },
      },
      wgpu::Extent3d {
        width: self.resolution,
        height: self.resolution,
        depth_or_array_layers: self.layers,
      },
    );
    gpu.queue.submit(Some(encoder.finish()));

    let slice = buffer.slice(..);
    let mapping = slice.map_async(wgpu::MapMode::Read);
    gpu.device.poll(wgpu::Maintain::Wait);
    pollster::block_on(mapping)?;

    let mut array = CascadeArray::new(self.layers as usize, self.resolution, 4);
    {
      let bytes = slice.get_mapped_range();
      let floats: &[f32] = bytemuck::cast_slice(&bytes);
      let row_floats = (padded_bytes_per_row / 4) as usize;
      let row_len = (self.resolution * 4) as usize;
      let res = self.resolution as usize;

      for layer in 0..self.layers as usize {
        let out = array.slice_mut(layer);
        for row in 0..res {
          let start = (layer * res + row) * row_floats;
          out[row * row_len..(row + 1) * row_len].copy_from_slice(&floats[start..start + row_len]);
        }
      }
    }
    buffer.unmap();

    Ok(array)
  }
}
