use crate::ocean::utils::compute_work_group_count;

pub const WORKGROUP_SIZE: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRef {
  pub resource: &'static str,
  pub slice: Option<usize>,
}

impl ResourceRef {
  pub fn slice(resource: &'static str, slice: usize) -> Self {
    Self {
      resource,
      slice: Some(slice),
    }
  }

  pub fn whole(resource: &'static str) -> Self {
    Self {
      resource,
      slice: None,
    }
  }
}

/// One kernel invocation as a backend would receive it.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRecord {
  pub kernel: &'static str,
  pub inputs: Vec<ResourceRef>,
  pub outputs: Vec<ResourceRef>,
  pub groups: [u32; 3],
}

/// Collects the passes of one frame in issue order.
#[derive(Debug, Default)]
pub struct FrameRecorder {
  frame: u64,
  records: Vec<DispatchRecord>,
}

impl FrameRecorder {
  pub fn begin_frame(&mut self, frame: u64) {
    self.frame = frame;
    self.records.clear();
  }

  pub fn frame(&self) -> u64 {
    self.frame
  }

  /// Records a full-slice dispatch over a `resolution` square.
  pub fn dispatch(
    &mut self,
    kernel: &'static str,
    inputs: Vec<ResourceRef>,
    outputs: Vec<ResourceRef>,
    resolution: u32,
  ) {
    let (x, y) = compute_work_group_count((resolution, resolution), (WORKGROUP_SIZE, WORKGROUP_SIZE));
    self.records.push(DispatchRecord {
      kernel,
      inputs,
      outputs,
      groups: [x, y, 1],
    });
  }

  /// Records a pass that moves no data through a kernel, such as a buffer flip.
  pub fn marker(&mut self, kernel: &'static str, outputs: Vec<ResourceRef>) {
    self.records.push(DispatchRecord {
      kernel,
      inputs: Vec::new(),
      outputs,
      groups: [0, 0, 0],
    });
  }

  pub fn records(&self) -> &[DispatchRecord] {
    &self.records
  }

  pub fn kernels(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.records.iter().map(|r| r.kernel)
  }

  pub fn position(&self, kernel: &str) -> Option<usize> {
    self.records.iter().position(|r| r.kernel == kernel)
  }
}
