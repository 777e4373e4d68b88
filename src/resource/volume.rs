//! Block-storage volume reconciliation, including the attach relation.

use super::{deleted, now};
use crate::client::{InstanceApi, VolumeApi};
use crate::error::{Error, Result};
use crate::model::{DRY_RUN_ID, Instance, Volume, snapshot_of};
use crate::schema::{VolumeSpec, VolumeState};
use log::info;
use reconcile::{FieldDiff, Outcome};
use serde_json::{Map, Value, json};

/// Converge one volume toward its spec. `state` carries both existence and
/// the attach relation: `attached`/`detached` both mean "present".
pub fn ensure<C: VolumeApi + InstanceApi>(
    client: &C,
    spec: &VolumeSpec,
    dry_run: bool,
) -> Result<Outcome> {
    let existing = client.volume_find(&spec.label)?;
    match (existing, spec.state) {
        (None, VolumeState::Absent) => Ok(Outcome::unchanged(Value::Null)),
        (Some(live), VolumeState::Absent) => remove(client, &live, spec, dry_run),
        (None, _) => create(client, spec, dry_run),
        (Some(live), _) => update(client, &live, spec, dry_run),
    }
}

/// The instance a volume in `attached` state must end up on.
fn attach_target<C: InstanceApi>(client: &C, spec: &VolumeSpec) -> Result<Instance> {
    let label = spec.instance.as_ref().ok_or_else(|| {
        Error::config(format!(
            "{} volume set to be attached, but instance not specified",
            spec.label
        ))
    })?;
    client.instance_find(label)?.ok_or_else(|| {
        Error::config(format!(
            "no instance {label} to attach {} volume",
            spec.label
        ))
    })
}

fn create<C: VolumeApi + InstanceApi>(
    client: &C,
    spec: &VolumeSpec,
    dry_run: bool,
) -> Result<Outcome> {
    let instance = match spec.state {
        VolumeState::Attached => Some(attach_target(client, spec)?),
        _ => None,
    };

    if dry_run {
        return Ok(Outcome::changed(synthesize(spec)));
    }

    // The region may be inherited from the instance the volume lands on.
    let region = match (&spec.region, &instance) {
        (Some(region), _) => json!(region),
        (None, Some(instance)) => instance
            .rest
            .get("region")
            .cloned()
            .unwrap_or(Value::Null),
        (None, None) => {
            return Err(Error::config(format!("{} volume missing region", spec.label)));
        }
    };

    info!("creating volume {}", spec.label);
    let mut fields = Map::new();
    fields.insert("label".into(), json!(spec.label));
    fields.insert("region".into(), region);
    fields.insert("size".into(), json!(spec.size.unwrap_or(20)));
    if let Some(tags) = &spec.tags {
        fields.insert("tags".into(), json!(tags));
    }

    let volume = client.volume_create(&fields)?;
    let mut snapshot = snapshot_of(&volume);
    if let Some(instance) = instance {
        client.volume_attach(volume.id, instance.id)?;
        snapshot.insert("instance_id".into(), json!(instance.id));
        snapshot.insert("instance_label".into(), json!(instance.label));
    }
    Ok(Outcome::changed(Value::Object(snapshot)))
}

fn update<C: VolumeApi + InstanceApi>(
    client: &C,
    live: &Volume,
    spec: &VolumeSpec,
    dry_run: bool,
) -> Result<Outcome> {
    if live.status != "active" {
        return Err(Error::config(format!(
            "{} volume has status of {}",
            live.label, live.status
        )));
    }

    let mut diff = FieldDiff::new(snapshot_of(live));
    diff.stage_unordered("tags", spec.tags.as_deref());
    if diff.changed() && !dry_run {
        client.volume_update(live.id, diff.patch())?;
    }

    match spec.state {
        VolumeState::Detached if live.instance_id.is_some() => {
            diff.record("instance_id", Value::Null);
            diff.record("instance_label", Value::Null);
            if !dry_run {
                client.volume_detach(live.id)?;
            }
        }
        VolumeState::Attached => {
            let instance = attach_target(client, spec)?;
            match live.instance_id {
                Some(current) if current == instance.id => {}
                current => {
                    diff.record("instance_id", instance.id);
                    diff.record("instance_label", instance.label.as_str());
                    if !dry_run {
                        // Moving between instances means detach first.
                        if current.is_some() {
                            client.volume_detach(live.id)?;
                        }
                        client.volume_attach(live.id, instance.id)?;
                    }
                }
            }
        }
        _ => {}
    }

    // Volumes only grow; a smaller desired size is left alone.
    if let Some(size) = spec.size
        && live.size < size
    {
        diff.record("size", size);
        if !dry_run {
            client.volume_resize(live.id, size)?;
        }
    }

    let changed = diff.changed();
    Ok(Outcome {
        changed,
        value: Value::Object(diff.into_result()),
    })
}

fn remove<C: VolumeApi>(
    client: &C,
    live: &Volume,
    spec: &VolumeSpec,
    dry_run: bool,
) -> Result<Outcome> {
    let force = spec.force.unwrap_or(false);
    if live.instance_id.is_some() && !force {
        return Err(Error::config(format!("{} volume attached", live.label)));
    }

    info!("deleting volume {}", live.label);
    if !dry_run {
        if live.instance_id.is_some() {
            client.volume_detach(live.id)?;
        }
        client.volume_delete(live.id)?;
    }
    Ok(Outcome::changed(deleted()))
}

/// Structurally complete stand-in for a volume that was not created.
fn synthesize(spec: &VolumeSpec) -> Value {
    json!({
        "created": now(),
        "filesystem_path": format!("/dev/disk/by-id/{}", spec.label),
        "id": DRY_RUN_ID,
        "instance_id": null,
        "instance_label": spec.instance.clone(),
        "label": spec.label,
        "size": spec.size.unwrap_or(20),
        "region": spec.region.clone(),
        "status": "creating",
        "tags": spec.tags.clone().unwrap_or_default(),
        "updated": now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::TestCloud;

    fn spec() -> VolumeSpec {
        VolumeSpec {
            label: "data1".into(),
            region: Some("eu-central".into()),
            size: Some(40),
            ..VolumeSpec::default()
        }
    }

    #[test]
    fn create_detached_then_rerun_is_idempotent() {
        let cloud = TestCloud::new();
        let first = ensure(&cloud, &spec(), false).unwrap();
        assert!(first.changed);
        assert_eq!(first.value["size"], 40);

        let second = ensure(&cloud, &spec(), false).unwrap();
        assert!(!second.changed);
    }

    #[test]
    fn create_attached_inherits_instance_region() {
        let cloud = TestCloud::new();
        cloud.seed_instance("web1", json!({ "region": "us-east" }));

        let mut spec = spec();
        spec.region = None;
        spec.state = VolumeState::Attached;
        spec.instance = Some("web1".into());

        let outcome = ensure(&cloud, &spec, false).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.value["instance_id"], 1);
        assert_eq!(outcome.value["instance_label"], "web1");

        let live = cloud.volume("data1").unwrap();
        assert_eq!(live.instance_id, Some(1));
        assert_eq!(live.rest["region"], json!("us-east"));
    }

    #[test]
    fn attached_without_instance_is_a_config_error() {
        let cloud = TestCloud::new();
        let mut spec = spec();
        spec.state = VolumeState::Attached;
        let err = ensure(&cloud, &spec, false).unwrap_err();
        assert!(err.to_string().contains("instance not specified"));
    }

    #[test]
    fn attached_to_missing_instance_is_a_config_error() {
        let cloud = TestCloud::new();
        let mut spec = spec();
        spec.state = VolumeState::Attached;
        spec.instance = Some("ghost".into());
        let err = ensure(&cloud, &spec, false).unwrap_err();
        assert!(err.to_string().contains("no instance ghost"));
        assert_eq!(cloud.mutation_count(), 0);
    }

    #[test]
    fn detach_when_requested_detached() {
        let cloud = TestCloud::new();
        cloud.seed_instance("web1", json!({}));
        cloud.seed_volume("data1", json!({ "instance_id": 1, "size": 40 }));

        let outcome = ensure(&cloud, &spec(), false).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.value["instance_id"], Value::Null);
        assert_eq!(cloud.mutations.borrow().as_slice(), ["volume_detach 2"]);
    }

    #[test]
    fn reattach_moves_between_instances() {
        let cloud = TestCloud::new();
        cloud.seed_instance("web1", json!({}));
        cloud.seed_instance("web2", json!({}));
        cloud.seed_volume("data1", json!({ "instance_id": 1, "size": 40 }));

        let mut spec = spec();
        spec.state = VolumeState::Attached;
        spec.instance = Some("web2".into());
        let outcome = ensure(&cloud, &spec, false).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.value["instance_id"], 2);
        assert_eq!(
            cloud.mutations.borrow().as_slice(),
            ["volume_detach 3", "volume_attach 3 -> 2"]
        );
    }

    #[test]
    fn already_attached_is_a_noop() {
        let cloud = TestCloud::new();
        cloud.seed_instance("web1", json!({}));
        cloud.seed_volume("data1", json!({ "instance_id": 1, "size": 40 }));

        let mut spec = spec();
        spec.state = VolumeState::Attached;
        spec.instance = Some("web1".into());
        let outcome = ensure(&cloud, &spec, false).unwrap();
        assert!(!outcome.changed);
        assert_eq!(cloud.mutation_count(), 0);
    }

    #[test]
    fn resize_only_grows() {
        let cloud = TestCloud::new();
        cloud.seed_volume("data1", json!({ "size": 80 }));

        // Desired 40 < live 80: left alone.
        let outcome = ensure(&cloud, &spec(), false).unwrap();
        assert!(!outcome.changed);

        let mut spec = spec();
        spec.size = Some(160);
        let outcome = ensure(&cloud, &spec, false).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.value["size"], 160);
        assert_eq!(cloud.mutations.borrow().as_slice(), ["volume_resize 1 -> 160"]);
    }

    #[test]
    fn update_rejects_non_active_volume() {
        let cloud = TestCloud::new();
        cloud.seed_volume("data1", json!({ "status": "creating" }));
        let err = ensure(&cloud, &spec(), false).unwrap_err();
        assert!(err.to_string().contains("has status of creating"));
    }

    #[test]
    fn delete_attached_requires_force() {
        let cloud = TestCloud::new();
        cloud.seed_instance("web1", json!({}));
        cloud.seed_volume("data1", json!({ "instance_id": 1 }));

        let mut spec = spec();
        spec.state = VolumeState::Absent;
        let err = ensure(&cloud, &spec, false).unwrap_err();
        assert!(err.to_string().contains("volume attached"));

        spec.force = Some(true);
        let outcome = ensure(&cloud, &spec, false).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.value, deleted());
        assert_eq!(
            cloud.mutations.borrow().as_slice(),
            ["volume_detach 2", "volume_delete 2"]
        );
    }

    #[test]
    fn dry_run_create_synthesizes_without_calls() {
        let cloud = TestCloud::new();
        let outcome = ensure(&cloud, &spec(), true).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.value["id"], DRY_RUN_ID);
        assert_eq!(outcome.value["status"], "creating");
        assert_eq!(cloud.mutation_count(), 0);
        assert!(cloud.volume("data1").is_none());
    }

    #[test]
    fn dry_run_detach_predicts_without_calls() {
        let cloud = TestCloud::new();
        cloud.seed_instance("web1", json!({}));
        cloud.seed_volume("data1", json!({ "instance_id": 1, "size": 40 }));

        let outcome = ensure(&cloud, &spec(), true).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.value["instance_id"], Value::Null);
        assert_eq!(cloud.mutation_count(), 0);
        assert_eq!(cloud.volume("data1").unwrap().instance_id, Some(1));
    }
}
