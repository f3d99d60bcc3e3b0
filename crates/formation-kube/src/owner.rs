//! Owner references between descriptors and their state objects

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;

/// Controller owner reference pointing at `owner`
///
/// Both `controller` and `blockOwnerDeletion` are set, so the child is
/// garbage collected with its owner and cannot be orphaned by a foreground
/// delete.
pub fn controller_owner_reference<K>(owner: &K) -> OwnerReference
where
    K: Resource<DynamicType = ()>,
{
    let meta = owner.meta();
    OwnerReference {
        api_version: K::api_version(&()).to_string(),
        kind: K::kind(&()).to_string(),
        name: meta.name.clone().unwrap_or_default(),
        uid: meta.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// The owner reference marked as controller, if any
pub fn controller_of(meta: &ObjectMeta) -> Option<&OwnerReference> {
    meta.owner_references
        .as_ref()?
        .iter()
        .find(|r| r.controller == Some(true))
}

/// Whether `child` is controlled by `parent`
///
/// Only the uid of the controller reference is compared; a parent without a
/// uid controls nothing.
pub fn is_controlled_by(child: &ObjectMeta, parent: &ObjectMeta) -> bool {
    match (controller_of(child), parent.uid.as_deref()) {
        (Some(owner), Some(uid)) => owner.uid == uid,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{LocationDescriptor, LocationDescriptorSpec};

    fn descriptor(uid: &str) -> LocationDescriptor {
        let mut ld = LocationDescriptor::new("svc", LocationDescriptorSpec::default());
        ld.metadata.namespace = Some("team".to_string());
        ld.metadata.uid = Some(uid.to_string());
        ld
    }

    fn child_of(owner: OwnerReference) -> ObjectMeta {
        ObjectMeta {
            name: Some("svc".to_string()),
            owner_references: Some(vec![owner]),
            ..Default::default()
        }
    }

    #[test]
    fn test_owner_reference_fields() {
        let ld = descriptor("uid-1");
        let owner = controller_owner_reference(&ld);

        assert_eq!(owner.api_version, "formation.io/v1");
        assert_eq!(owner.kind, "LocationDescriptor");
        assert_eq!(owner.name, "svc");
        assert_eq!(owner.uid, "uid-1");
        assert_eq!(owner.controller, Some(true));
        assert_eq!(owner.block_owner_deletion, Some(true));
    }

    #[test]
    fn test_is_controlled_by() {
        let ld = descriptor("uid-1");
        let child = child_of(controller_owner_reference(&ld));
        assert!(is_controlled_by(&child, &ld.metadata));

        let other = descriptor("uid-2");
        assert!(!is_controlled_by(&child, &other.metadata));
    }

    #[test]
    fn test_non_controller_reference_does_not_count() {
        let ld = descriptor("uid-1");
        let mut owner = controller_owner_reference(&ld);
        owner.controller = Some(false);

        let child = child_of(owner);
        assert!(!is_controlled_by(&child, &ld.metadata));
        assert!(controller_of(&child).is_none());
    }

    #[test]
    fn test_no_owner_references() {
        let ld = descriptor("uid-1");
        assert!(!is_controlled_by(&ObjectMeta::default(), &ld.metadata));
    }
}
