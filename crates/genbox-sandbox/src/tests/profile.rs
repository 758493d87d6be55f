//! Unit tests for sandbox profile defaults and builders.

use rstest::rstest;

use crate::profile::{CpuLimit, MAX_CPU_MILLIS, MemoryLimit, SandboxProfile};

#[test]
fn defaults_cap_memory_and_cpu() {
    let profile = SandboxProfile::new();
    assert_eq!(profile.memory_limit().mib(), 128);
    assert_eq!(profile.cpu_limit().millis(), 1_000);
}

#[rstest]
#[case::one_core(1_000, 1_000)]
#[case::fraction(250, 250)]
#[case::several_cores(4_000, MAX_CPU_MILLIS)]
#[case::just_over(1_001, MAX_CPU_MILLIS)]
fn cpu_limit_never_exceeds_one_core(#[case] requested: u32, #[case] expected: u32) {
    assert_eq!(CpuLimit::from_millis(requested).millis(), expected);
}

#[rstest]
#[case(1_000, "1.000")]
#[case(500, "0.500")]
#[case(2_250, "1.000")]
#[case(5, "0.005")]
fn cpu_limit_renders_decimal_cores(#[case] millis: u32, #[case] expected: &str) {
    assert_eq!(CpuLimit::from_millis(millis).as_flag_value(), expected);
}

#[test]
fn memory_limit_renders_mebibytes() {
    assert_eq!(MemoryLimit::from_mib(512).as_flag_value(), "512m");
}
