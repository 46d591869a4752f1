//! Static instance catalog.
//!
//! Maps an abstract machine-size tag to a concrete instance type per
//! provider. Sizes are `s`, `m` and `l`; a `+<gpu>` suffix asks for an
//! accelerator. GCP attaches accelerators to a host machine type, written
//! `<machine-type>:<accelerator>`.

use kubeplane_core::Provider;

struct CatalogEntry {
    size: &'static str,
    aws: Option<&'static str>,
    azure: Option<&'static str>,
    gcp: Option<&'static str>,
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        size: "s",
        aws: Some("t3.medium"),
        azure: Some("Standard_B2s"),
        gcp: Some("e2-medium"),
    },
    CatalogEntry {
        size: "m",
        aws: Some("m5.xlarge"),
        azure: Some("Standard_D4s_v3"),
        gcp: Some("e2-standard-4"),
    },
    CatalogEntry {
        size: "l",
        aws: Some("m5.4xlarge"),
        azure: Some("Standard_D16s_v3"),
        gcp: Some("e2-standard-16"),
    },
    CatalogEntry {
        size: "m+v100",
        aws: Some("p3.2xlarge"),
        azure: Some("Standard_NC6s_v3"),
        gcp: Some("n1-standard-8:nvidia-tesla-v100"),
    },
    CatalogEntry {
        size: "m+t4",
        aws: Some("g4dn.xlarge"),
        azure: Some("Standard_NC4as_T4_v3"),
        gcp: Some("n1-standard-4:nvidia-tesla-t4"),
    },
    CatalogEntry {
        size: "l+a100",
        aws: Some("p4d.24xlarge"),
        azure: Some("Standard_ND96asr_v4"),
        gcp: Some("a2-highgpu-8g"),
    },
    CatalogEntry {
        size: "m+k80",
        aws: Some("p2.xlarge"),
        azure: Some("Standard_NC6"),
        gcp: None,
    },
];

/// Look up the instance type for a machine-size tag.
///
/// Returns `None` for unknown tags and for sizes the provider doesn't offer.
#[must_use]
pub fn lookup(provider: Provider, size: &str) -> Option<&'static str> {
    let entry = CATALOG.iter().find(|e| e.size == size)?;
    match provider {
        Provider::Aws => entry.aws,
        Provider::Azure => entry.azure,
        Provider::Gcp => entry.gcp,
    }
}

/// Whether a machine-size tag asks for an accelerator.
#[must_use]
pub fn is_gpu_size(size: &str) -> bool {
    size.contains('+')
}

/// All machine-size tags, in catalog order.
pub fn sizes() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|e| e.size)
}
