//! Host capability check performed before anything else starts

/// Decides whether this machine can run the renderer at all
pub trait CpuCapability {
    fn name(&self) -> &'static str;
    fn supported(&self) -> bool;
}

/// The vector instruction set the fill loop is tuned for on the running CPU
#[derive(Debug, Clone, Copy, Default)]
pub struct HostCpu;

impl CpuCapability for HostCpu {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    fn name(&self) -> &'static str {
        "AVX"
    }

    #[cfg(target_arch = "aarch64")]
    fn name(&self) -> &'static str {
        "NEON"
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
    fn name(&self) -> &'static str {
        "SIMD"
    }

    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    fn supported(&self) -> bool {
        std::is_x86_feature_detected!("avx")
    }

    #[cfg(target_arch = "aarch64")]
    fn supported(&self) -> bool {
        std::arch::is_aarch64_feature_detected!("neon")
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
    fn supported(&self) -> bool {
        false
    }
}
