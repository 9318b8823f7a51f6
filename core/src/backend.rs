//! Backend selection for candidate hashing.

use serde::{Deserialize, Serialize};

/// The execution target chosen for a batch of candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComputeBackend {
    Cpu,
    Gpu,
}

impl std::fmt::Display for ComputeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComputeBackend::Cpu => f.write_str("CPU"),
            ComputeBackend::Gpu => f.write_str("GPU"),
        }
    }
}

/// The result of the one-time device capability probe.
#[derive(Debug, Clone, Default)]
pub struct Capability {
    /// Whether a usable GPU adapter was found.
    pub supported: bool,
    /// A human-readable description of the probed adapter.
    pub device_info: Option<String>,
}

/// Hash types with a GPU kernel implemented. Everything else runs on the
/// CPU no matter what the capability probe reported.
const GPU_HASH_TYPES: &[&str] = &["md5"];

/// Decides, per batch, whether candidates are hashed on the GPU or the
/// CPU. The device is probed once at construction, never per batch.
pub struct DispatchStrategy {
    capability: Capability,
}

impl DispatchStrategy {
    /// Probes the device with the built-in probe and caches the result.
    pub fn detect() -> Self {
        Self::with_probe(default_probe)
    }

    /// Caches the result of a caller-supplied capability probe.
    pub fn with_probe<F>(probe: F) -> Self
    where
        F: FnOnce() -> Capability,
    {
        Self {
            capability: probe(),
        }
    }

    /// The cached capability of the probed device.
    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    /// Chooses the backend for a batch of `hash_type` candidates.
    pub fn choose(&self, hash_type: &str) -> ComputeBackend {
        let has_kernel = GPU_HASH_TYPES.contains(&hash_type.to_lowercase().as_str());

        if self.capability.supported && has_kernel {
            ComputeBackend::Gpu
        } else {
            ComputeBackend::Cpu
        }
    }
}

impl Default for DispatchStrategy {
    fn default() -> Self {
        Self::detect()
    }
}

#[cfg(feature = "wgpu")]
fn default_probe() -> Capability {
    crate::gpu::probe()
}

#[cfg(not(feature = "wgpu"))]
fn default_probe() -> Capability {
    Capability::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpu_capable() -> Capability {
        Capability {
            supported: true,
            device_info: Some("test adapter".to_owned()),
        }
    }

    #[test]
    fn test_allow_list_gates_gpu() {
        let dispatch = DispatchStrategy::with_probe(gpu_capable);

        assert_eq!(ComputeBackend::Gpu, dispatch.choose("md5"));
        assert_eq!(ComputeBackend::Gpu, dispatch.choose("MD5"));
        assert_eq!(ComputeBackend::Cpu, dispatch.choose("sha256"));
        assert_eq!(ComputeBackend::Cpu, dispatch.choose("ntlm"));
    }

    #[test]
    fn test_no_capability_means_cpu() {
        let dispatch = DispatchStrategy::with_probe(Capability::default);

        assert_eq!(ComputeBackend::Cpu, dispatch.choose("md5"));
    }
}
