//! Embedded reference tables: GPU power characteristics and regional grid
//! data.
//!
//! Figures are vendor board-power ratings and published annual grid
//! averages, rounded. They are coarse by nature; the agent reports its
//! confidence accordingly.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GpuSpec {
    pub model: &'static str,
    pub tdp_watts: f64,
    pub idle_watts: f64,
    pub memory_gb: f64,
    pub architecture: &'static str,
}

impl GpuSpec {
    /// Board power at `utilization_pct` (clamped to 0..=100), linear between
    /// idle and TDP.
    pub fn watts_at(&self, utilization_pct: f64) -> f64 {
        let u = if utilization_pct.is_finite() {
            utilization_pct.clamp(0.0, 100.0)
        } else {
            0.0
        };
        self.idle_watts + (self.tdp_watts - self.idle_watts) * u / 100.0
    }
}

pub const GPUS: &[GpuSpec] = &[
    GpuSpec {
        model: "H200",
        tdp_watts: 700.0,
        idle_watts: 75.0,
        memory_gb: 141.0,
        architecture: "Hopper",
    },
    GpuSpec {
        model: "H100",
        tdp_watts: 700.0,
        idle_watts: 70.0,
        memory_gb: 80.0,
        architecture: "Hopper",
    },
    GpuSpec {
        model: "A100",
        tdp_watts: 400.0,
        idle_watts: 50.0,
        memory_gb: 80.0,
        architecture: "Ampere",
    },
    GpuSpec {
        model: "A10G",
        tdp_watts: 300.0,
        idle_watts: 30.0,
        memory_gb: 24.0,
        architecture: "Ampere",
    },
    GpuSpec {
        model: "L40S",
        tdp_watts: 350.0,
        idle_watts: 35.0,
        memory_gb: 48.0,
        architecture: "Ada Lovelace",
    },
    GpuSpec {
        model: "L4",
        tdp_watts: 72.0,
        idle_watts: 16.0,
        memory_gb: 24.0,
        architecture: "Ada Lovelace",
    },
    GpuSpec {
        model: "V100",
        tdp_watts: 300.0,
        idle_watts: 40.0,
        memory_gb: 32.0,
        architecture: "Volta",
    },
    GpuSpec {
        model: "T4",
        tdp_watts: 70.0,
        idle_watts: 10.0,
        memory_gb: 16.0,
        architecture: "Turing",
    },
    GpuSpec {
        model: "RTX 4090",
        tdp_watts: 450.0,
        idle_watts: 25.0,
        memory_gb: 24.0,
        architecture: "Ada Lovelace",
    },
    GpuSpec {
        model: "MI300X",
        tdp_watts: 750.0,
        idle_watts: 90.0,
        memory_gb: 192.0,
        architecture: "CDNA 3",
    },
];

/// Vendor and product-line words that carry no model information.
const GPU_NOISE: &[&str] = &["NVIDIA", "AMD", "GEFORCE", "INSTINCT", "TESLA"];

fn compact(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Look up a GPU by loose name: `"nvidia h100 sxm5"` and `"H100-80GB"` both
/// resolve to H100. The longest model name contained in the input wins, so
/// `"L40S"` is not mistaken for `"L4"`.
pub fn lookup_gpu(name: &str) -> Option<&'static GpuSpec> {
    let mut needle = compact(name);
    for noise in GPU_NOISE {
        needle = needle.replace(noise, "");
    }
    if needle.is_empty() {
        return None;
    }

    GPUS.iter()
        .filter(|g| {
            let key = compact(g.model);
            needle.contains(&key) || (key.starts_with("RTX") && needle.contains(&key[3..]))
        })
        .max_by_key(|g| compact(g.model).len())
}

pub fn known_gpus() -> Vec<&'static str> {
    GPUS.iter().map(|g| g.model).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegionProfile {
    pub region: &'static str,
    pub usd_per_kwh: f64,
    pub kg_co2e_per_kwh: f64,
}

pub const REGIONS: &[RegionProfile] = &[
    RegionProfile {
        region: "us-average",
        usd_per_kwh: 0.12,
        kg_co2e_per_kwh: 0.37,
    },
    RegionProfile {
        region: "us-east",
        usd_per_kwh: 0.11,
        kg_co2e_per_kwh: 0.35,
    },
    RegionProfile {
        region: "us-west",
        usd_per_kwh: 0.18,
        kg_co2e_per_kwh: 0.22,
    },
    RegionProfile {
        region: "us-central",
        usd_per_kwh: 0.10,
        kg_co2e_per_kwh: 0.45,
    },
    RegionProfile {
        region: "canada",
        usd_per_kwh: 0.09,
        kg_co2e_per_kwh: 0.12,
    },
    RegionProfile {
        region: "eu-west",
        usd_per_kwh: 0.20,
        kg_co2e_per_kwh: 0.25,
    },
    RegionProfile {
        region: "eu-central",
        usd_per_kwh: 0.25,
        kg_co2e_per_kwh: 0.35,
    },
    RegionProfile {
        region: "eu-north",
        usd_per_kwh: 0.08,
        kg_co2e_per_kwh: 0.03,
    },
    RegionProfile {
        region: "uk",
        usd_per_kwh: 0.28,
        kg_co2e_per_kwh: 0.20,
    },
    RegionProfile {
        region: "asia-east",
        usd_per_kwh: 0.14,
        kg_co2e_per_kwh: 0.50,
    },
    RegionProfile {
        region: "asia-south",
        usd_per_kwh: 0.09,
        kg_co2e_per_kwh: 0.70,
    },
    RegionProfile {
        region: "australia",
        usd_per_kwh: 0.22,
        kg_co2e_per_kwh: 0.65,
    },
];

/// Look up a region: case-insensitive, `_` and spaces read as `-`.
pub fn lookup_region(name: &str) -> Option<&'static RegionProfile> {
    let normalized: String = name
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == '_' || c == ' ' { '-' } else { c })
        .collect();
    REGIONS.iter().find(|r| r.region == normalized)
}

pub fn known_regions() -> Vec<&'static str> {
    REGIONS.iter().map(|r| r.region).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_lookup_is_loose() {
        assert_eq!(lookup_gpu("H100").map(|g| g.model), Some("H100"));
        assert_eq!(lookup_gpu("nvidia h100 sxm").map(|g| g.model), Some("H100"));
        assert_eq!(lookup_gpu("A100-80GB").map(|g| g.model), Some("A100"));
        assert_eq!(lookup_gpu("GeForce RTX 4090").map(|g| g.model), Some("RTX 4090"));
        assert_eq!(lookup_gpu("4090").map(|g| g.model), Some("RTX 4090"));
        assert_eq!(lookup_gpu("AMD Instinct MI300X").map(|g| g.model), Some("MI300X"));
    }

    #[test]
    fn test_gpu_lookup_prefers_longest_match() {
        assert_eq!(lookup_gpu("L40S").map(|g| g.model), Some("L40S"));
        assert_eq!(lookup_gpu("L4").map(|g| g.model), Some("L4"));
        assert_eq!(lookup_gpu("A10G").map(|g| g.model), Some("A10G"));
        assert_eq!(lookup_gpu("H200").map(|g| g.model), Some("H200"));
    }

    #[test]
    fn test_gpu_lookup_unknown() {
        assert!(lookup_gpu("TPU v5").is_none());
        assert!(lookup_gpu("nvidia").is_none());
        assert!(lookup_gpu("").is_none());
    }

    #[test]
    fn test_power_curve_is_linear() {
        let h100 = lookup_gpu("H100").unwrap();
        assert_eq!(h100.watts_at(0.0), 70.0);
        assert_eq!(h100.watts_at(100.0), 700.0);
        assert_eq!(h100.watts_at(50.0), 385.0);
        assert_eq!(h100.watts_at(250.0), 700.0);
        assert_eq!(h100.watts_at(f64::NAN), 70.0);
    }

    #[test]
    fn test_region_lookup_normalizes() {
        assert_eq!(lookup_region("EU_West").map(|r| r.region), Some("eu-west"));
        assert_eq!(lookup_region(" us average ").map(|r| r.region), Some("us-average"));
        assert!(lookup_region("mars").is_none());
    }

    #[test]
    fn test_tables_are_sane() {
        for gpu in GPUS {
            assert!(gpu.idle_watts < gpu.tdp_watts, "{}", gpu.model);
        }
        for region in REGIONS {
            assert!(region.usd_per_kwh > 0.0 && region.kg_co2e_per_kwh > 0.0);
        }
    }
}
