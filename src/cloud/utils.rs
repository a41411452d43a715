//! Naming helpers for provider resources.

/// Cluster names may not contain dots; `k8s.example.com` becomes `k8s-example-com`.
pub fn safe_cluster_name(cluster_name: &str) -> String {
    cluster_name.replace('.', "-")
}

/// Lowercase, dot-free name usable for any provider object.
pub fn safe_object_name(name: &str) -> String {
    safe_cluster_name(name).to_lowercase()
}

/// Final `/`-separated component of a URL or path.
pub fn last_component(value: &str) -> &str {
    match value.rfind('/') {
        Some(idx) => &value[idx + 1..],
        None => value,
    }
}

/// `us-central1-a` is in region `us-central1`. Returns `None` for a value
/// with no zone suffix.
pub fn zone_to_region(zone: &str) -> Option<&str> {
    let idx = zone.rfind('-')?;
    if idx == 0 || idx + 1 == zone.len() {
        return None;
    }
    Some(&zone[..idx])
}
