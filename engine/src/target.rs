// target.rs — Target device capability table
//
// Static metadata about the hardware targets the generation backend can
// be pointed at. The engine only needs one capability bit: whether the
// device supports native 64-bit ("wide") arithmetic.

/// Static metadata about a supported target device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDevice {
    pub name: &'static str,
    pub description: &'static str,
    /// False on devices where enabling native 64-bit arithmetic is
    /// rejected by the backend; the configuration builder degrades the
    /// option instead of aborting.
    pub supports_wide_arithmetic: bool,
}

pub const DEFAULT_TARGET: &str = "host";

/// All supported targets in display order.
pub const TARGETS: [TargetDevice; 4] = [
    TargetDevice {
        name: "host",
        description: "native host build (simulation, tests)",
        supports_wide_arithmetic: true,
    },
    TargetDevice {
        name: "cortex-m4",
        description: "ARM Cortex-M4 class MCU (32-bit only)",
        supports_wide_arithmetic: false,
    },
    TargetDevice {
        name: "cortex-m7",
        description: "ARM Cortex-M7 class MCU",
        supports_wide_arithmetic: true,
    },
    TargetDevice {
        name: "cortex-a53",
        description: "ARM Cortex-A53 class application core",
        supports_wide_arithmetic: true,
    },
];

/// Look up a target by name.
pub fn lookup(name: &str) -> Option<&'static TargetDevice> {
    TARGETS.iter().find(|t| t.name == name)
}

/// Names of every supported target (CLI help/validation).
pub fn target_names() -> Vec<&'static str> {
    TARGETS.iter().map(|t| t.name).collect()
}

// ── Tests ──
