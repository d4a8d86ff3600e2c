use vigil_core::{DataProfile, DetectorKind, Payload, Priority};

/// Methods kept for low-priority requests.
const LOW_PRIORITY_METHODS: usize = 2;
const F64: usize = std::mem::size_of::<f64>();
/// Feature count of the delay embedding used for non-record payloads.
const EMBEDDED_FEATURES: usize = 3;

/// Decide which methods run for one request.
///
/// Explicit methods are used as given. Otherwise the profile's
/// recommendations come first, followed by the preset defaults; critical
/// requests always include the ensemble methods and low-priority requests
/// keep only the first two. Duplicates are dropped, first occurrence wins.
pub fn select_methods(
    explicit: Option<&[DetectorKind]>,
    profile: &DataProfile,
    defaults: &[DetectorKind],
    priority: Priority,
) -> Vec<DetectorKind> {
    if let Some(methods) = explicit {
        return dedup(methods.iter().copied());
    }

    let mut methods = dedup(
        profile
            .recommended_methods
            .iter()
            .chain(defaults)
            .copied(),
    );
    match priority {
        Priority::Critical => {
            methods = dedup(methods.into_iter().chain([
                DetectorKind::MultivariateEnsemble,
                DetectorKind::StatisticalEnsemble,
            ]));
        }
        Priority::Low => methods.truncate(LOW_PRIORITY_METHODS),
        Priority::Medium | Priority::High => {}
    }
    methods
}

fn dedup(methods: impl IntoIterator<Item = DetectorKind>) -> Vec<DetectorKind> {
    let mut out: Vec<DetectorKind> = Vec::new();
    for m in methods {
        if !out.contains(&m) {
            out.push(m);
        }
    }
    out
}

/// Rough peak memory for running `methods` over `payload`, in bytes.
pub fn estimate_memory(payload: &Payload, methods: &[DetectorKind]) -> usize {
    let base = payload.estimated_bytes();
    let n = payload.len();
    methods
        .iter()
        .map(|kind| match kind {
            // Series copy plus sorted copies for quantiles.
            DetectorKind::StatisticalEnsemble => base.saturating_add(3 * n * F64),
            // Windows and motif tables.
            DetectorKind::TemporalPattern => base.saturating_add(n.saturating_mul(16 * F64)),
            // Per-source betweenness vectors dominate.
            DetectorKind::GraphStructural => {
                base.saturating_add(n.saturating_mul(n).saturating_mul(F64))
            }
            DetectorKind::MultivariateEnsemble => {
                let d = match payload {
                    Payload::Multivariate(points) => {
                        points.first().map_or(0, |p| p.features.len())
                    }
                    _ => EMBEDDED_FEATURES,
                };
                let rows = n.saturating_mul(d).saturating_mul(6 * F64);
                let matrices = d.saturating_mul(d).saturating_mul(8 * F64);
                base.saturating_add(rows).saturating_add(matrices)
            }
        })
        .fold(0usize, usize::saturating_add)
}
