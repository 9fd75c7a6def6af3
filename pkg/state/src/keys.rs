//! Registry key construction.
//!
//! One function per kind so a key's shape is defined in exactly one place.
//! Namespaced kinds nest `<namespace>/<name>`; the Content kinds are
//! cluster-scoped and keyed by bare name.

use pkg_constants::state::*;

pub fn pod_key(namespace: &str, name: &str) -> String {
    format!("{}{}/{}", PODS_PREFIX, namespace, name)
}

pub fn pods_prefix(namespace: &str) -> String {
    format!("{}{}/", PODS_PREFIX, namespace)
}

pub fn node_key(name: &str) -> String {
    format!("{}{}", NODES_PREFIX, name)
}

pub fn migration_key(namespace: &str, name: &str) -> String {
    format!("{}{}/{}", MIGRATIONS_PREFIX, namespace, name)
}

pub fn pod_checkpoint_key(namespace: &str, name: &str) -> String {
    format!("{}{}/{}", POD_CHECKPOINTS_PREFIX, namespace, name)
}

pub fn container_checkpoint_key(namespace: &str, name: &str) -> String {
    format!("{}{}/{}", CONTAINER_CHECKPOINTS_PREFIX, namespace, name)
}

pub fn container_checkpoints_prefix(namespace: &str) -> String {
    format!("{}{}/", CONTAINER_CHECKPOINTS_PREFIX, namespace)
}

pub fn container_content_key(name: &str) -> String {
    format!("{}{}", CONTAINER_CHECKPOINT_CONTENTS_PREFIX, name)
}

pub fn pod_content_key(name: &str) -> String {
    format!("{}{}", POD_CHECKPOINT_CONTENTS_PREFIX, name)
}

/// Split a namespaced registry key into `(namespace, name)`.
/// Returns `None` if the key is not under `prefix` or is malformed.
pub fn split_namespaced<'a>(key: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    let rest = key.strip_prefix(prefix)?;
    let (namespace, name) = rest.split_once('/')?;
    if namespace.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((namespace, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaced_keys_nest_namespace_then_name() {
        assert_eq!(pod_key("default", "p1"), "/registry/pods/default/p1");
        assert_eq!(
            container_checkpoint_key("prod", "m1-c"),
            "/registry/containercheckpoints/prod/m1-c"
        );
        assert!(pod_key("default", "p1").starts_with(&pods_prefix("default")));
    }

    #[test]
    fn split_roundtrips() {
        let key = migration_key("default", "m1");
        assert_eq!(
            split_namespaced(&key, MIGRATIONS_PREFIX),
            Some(("default", "m1"))
        );
        assert_eq!(split_namespaced(&key, PODS_PREFIX), None);
        assert_eq!(split_namespaced("/registry/migrations/default", MIGRATIONS_PREFIX), None);
    }

    #[test]
    fn content_keys_are_cluster_scoped() {
        assert_eq!(
            container_content_key("m1-c"),
            "/registry/containercheckpointcontents/m1-c"
        );
        assert_eq!(pod_content_key("m1"), "/registry/podcheckpointcontents/m1");
    }
}
