//! Sandbox policy definition and builder helpers.

/// Default memory ceiling, in mebibytes.
pub const DEFAULT_MEMORY_MIB: u64 = 128;

/// Default CPU allowance, in thousandths of a logical core.
pub const DEFAULT_CPU_MILLIS: u32 = 1_000;

/// Largest CPU allowance a sandbox may receive: one logical core.
pub const MAX_CPU_MILLIS: u32 = 1_000;

/// Hard memory ceiling for a sandboxed process.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemoryLimit {
    mib: u64,
}

impl MemoryLimit {
    /// Creates a ceiling of `mib` mebibytes.
    #[must_use]
    pub const fn from_mib(mib: u64) -> Self {
        Self { mib }
    }

    /// Ceiling in mebibytes.
    #[must_use]
    pub const fn mib(self) -> u64 {
        self.mib
    }

    /// Engine flag value, e.g. `128m`.
    #[must_use]
    pub fn as_flag_value(self) -> String {
        format!("{}m", self.mib)
    }
}

impl Default for MemoryLimit {
    fn default() -> Self {
        Self::from_mib(DEFAULT_MEMORY_MIB)
    }
}

/// CPU allowance for a sandboxed process, in thousandths of a core.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CpuLimit {
    millis: u32,
}

impl CpuLimit {
    /// Creates an allowance of `millis` thousandths of a core.
    ///
    /// Values above [`MAX_CPU_MILLIS`] are clamped to one core.
    #[must_use]
    pub const fn from_millis(millis: u32) -> Self {
        if millis > MAX_CPU_MILLIS {
            Self {
                millis: MAX_CPU_MILLIS,
            }
        } else {
            Self { millis }
        }
    }

    /// Allowance in thousandths of a core.
    #[must_use]
    pub const fn millis(self) -> u32 {
        self.millis
    }

    /// Engine flag value as a decimal core count, e.g. `1.000` or `0.500`.
    #[must_use]
    pub fn as_flag_value(self) -> String {
        let whole = self.millis.div_euclid(1_000);
        let fraction = self.millis.rem_euclid(1_000);
        format!("{whole}.{fraction:03}")
    }
}

impl Default for CpuLimit {
    fn default() -> Self {
        Self::from_millis(DEFAULT_CPU_MILLIS)
    }
}

/// Declarative description of the isolation applied to one execution.
///
/// Only the resource limits are tunable. Every sandbox runs without a
/// network, with an empty environment, with all capabilities dropped and
/// with swap pinned to the memory ceiling. The CPU allowance never exceeds
/// one logical core.
///
/// ```
/// use genbox_sandbox::{MemoryLimit, SandboxProfile};
///
/// let profile = SandboxProfile::new().with_memory_limit(MemoryLimit::from_mib(512));
/// assert_eq!(profile.memory_limit().mib(), 512);
/// assert_eq!(profile.cpu_limit().millis(), 1_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SandboxProfile {
    memory: MemoryLimit,
    cpu: CpuLimit,
}

impl SandboxProfile {
    /// Creates the default profile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the memory ceiling.
    #[must_use]
    pub const fn with_memory_limit(mut self, memory: MemoryLimit) -> Self {
        self.memory = memory;
        self
    }

    /// Replaces the CPU allowance.
    #[must_use]
    pub const fn with_cpu_limit(mut self, cpu: CpuLimit) -> Self {
        self.cpu = cpu;
        self
    }

    /// Returns the memory ceiling.
    #[must_use]
    pub const fn memory_limit(&self) -> MemoryLimit {
        self.memory
    }

    /// Returns the CPU allowance.
    #[must_use]
    pub const fn cpu_limit(&self) -> CpuLimit {
        self.cpu
    }
}
