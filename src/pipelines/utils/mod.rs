use crate::core::ModelOptions;
use candle_core::Device;

/// CUDA device `index` when given, otherwise CUDA 0 if available and CPU
/// when it is not.
pub fn load_device_with(index: Option<usize>) -> anyhow::Result<Device> {
    match index {
        Some(i) => Ok(Device::new_cuda(i)?),
        None => Ok(Device::cuda_if_available(0)?),
    }
}

/// Request for a specific device, used by pipeline builders.
#[derive(Clone, Default)]
pub enum DeviceRequest {
    /// Use CUDA if available, otherwise CPU.
    #[default]
    Default,
    Cpu,
    Cuda(usize),
    Explicit(Device),
}

impl DeviceRequest {
    pub fn resolve(self) -> anyhow::Result<Device> {
        let device = match self {
            DeviceRequest::Default => load_device_with(None)?,
            DeviceRequest::Cpu => Device::Cpu,
            DeviceRequest::Cuda(i) => load_device_with(Some(i))?,
            DeviceRequest::Explicit(d) => d,
        };
        tracing::debug!(location = ?device.location(), "resolved device");
        Ok(device)
    }
}

/// Device selection shared by the pipeline builders.
pub trait DeviceSelectable: Sized {
    fn device_request_mut(&mut self) -> &mut DeviceRequest;

    /// Force the pipeline to run on CPU.
    fn cpu(mut self) -> Self {
        *self.device_request_mut() = DeviceRequest::Cpu;
        self
    }

    fn cuda_device(mut self, index: usize) -> Self {
        *self.device_request_mut() = DeviceRequest::Cuda(index);
        self
    }

    fn device(mut self, device: Device) -> Self {
        *self.device_request_mut() = DeviceRequest::Explicit(device);
        self
    }
}

/// Cache key combining model options and device location.
pub fn build_cache_key<O: ModelOptions>(options: &O, device: &Device) -> String {
    format!("{}-{:?}", options.cache_key(), device.location())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl ModelOptions for Named {
        fn cache_key(&self) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn cpu_request_resolves_to_cpu() {
        let device = DeviceRequest::Cpu.resolve().unwrap();
        assert!(device.is_cpu());
        assert_eq!(build_cache_key(&Named("bert"), &device), "bert-Cpu");
    }
}
