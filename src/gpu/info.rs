use std::fmt;

/// Adapter description reported by [`KuwaharaFilter::adapter_summary`](crate::KuwaharaFilter::adapter_summary).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSummary {
    pub adapter_name: String,
    pub backend: String,
    pub device_type: String,
    software: bool,
}

impl AdapterSummary {
    /// True for CPU rasterizers such as llvmpipe or WARP; the filter works but
    /// large kernels are slow.
    pub fn is_software(&self) -> bool {
        self.software
    }
}

impl From<&wgpu::AdapterInfo> for AdapterSummary {
    fn from(info: &wgpu::AdapterInfo) -> Self {
        let device_type = match info.device_type {
            wgpu::DeviceType::DiscreteGpu => "Discrete GPU",
            wgpu::DeviceType::IntegratedGpu => "Integrated GPU",
            wgpu::DeviceType::VirtualGpu => "Virtual GPU",
            wgpu::DeviceType::Cpu => "CPU",
            _ => "Unknown",
        };
        Self {
            adapter_name: info.name.clone(),
            backend: info.backend.to_str().to_string(),
            device_type: device_type.to_string(),
            software: info.device_type == wgpu::DeviceType::Cpu,
        }
    }
}

impl fmt::Display for AdapterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.adapter_name, self.device_type, self.backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(device_type: wgpu::DeviceType) -> wgpu::AdapterInfo {
        wgpu::AdapterInfo {
            name: "llvmpipe".to_string(),
            vendor: 0,
            device: 0,
            device_type,
            driver: String::new(),
            driver_info: String::new(),
            backend: wgpu::Backend::Vulkan,
        }
    }

    #[test]
    fn cpu_adapters_are_flagged_as_software() {
        let summary = AdapterSummary::from(&info(wgpu::DeviceType::Cpu));
        assert!(summary.is_software());
        assert_eq!(summary.device_type, "CPU");
        assert_eq!(summary.to_string(), "llvmpipe (CPU, vulkan)");

        assert!(!AdapterSummary::from(&info(wgpu::DeviceType::DiscreteGpu)).is_software());
    }
}
