use crate::ocean::error::{OceanError, Result};

/// Headless device and queue for running the compute passes.
pub struct GpuContext {
  pub device: wgpu::Device,
  pub queue: wgpu::Queue,
  pub adapter_name: String,
}

impl GpuContext {
  pub async fn new() -> Result<GpuContext> {
    let instance = wgpu::Instance::new(wgpu::Backends::all());
    let adapter = instance
      .request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: None,
        force_fallback_adapter: false,
      })
      .await
      .ok_or(OceanError::NoAdapter)?;

    let (device, queue) = adapter
      .request_device(
        &wgpu::DeviceDescriptor {
          features: wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES
            | wgpu::Features::PUSH_CONSTANTS,
          limits: wgpu::Limits {
            max_push_constant_size: 256,
            ..wgpu::Limits::default()
          },
          label: Some("Ocean device"),
        },
        None, // Trace path
      )
      .await?;

    let adapter_name = adapter.get_info().name;
    log::info!("using adapter {}", adapter_name);

    Ok(GpuContext {
      device,
      queue,
      adapter_name,
    })
  }
}
