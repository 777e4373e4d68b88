//! The instance-volume attach relation, reconciled on its own.
//!
//! Unlike the volume orchestrator this never creates or deletes anything:
//! both ends must already exist, and the only question is whether the
//! volume's owning-instance reference matches the requested instance.

use crate::client::{InstanceApi, VolumeApi};
use crate::error::{Error, Result};
use crate::schema::{AttachmentSpec, State};
use log::info;
use reconcile::Outcome;
use serde_json::Value;

/// Converge the attach relation between one instance and one volume.
pub fn ensure<C: InstanceApi + VolumeApi>(
    client: &C,
    spec: &AttachmentSpec,
    dry_run: bool,
) -> Result<Outcome> {
    let instance = client
        .instance_find(&spec.instance)?
        .ok_or_else(|| Error::config(format!("instance {} not found", spec.instance)))?;
    let volume = client
        .volume_find(&spec.volume)?
        .ok_or_else(|| Error::config(format!("volume {} not found", spec.volume)))?;

    let attached = volume.instance_id == Some(instance.id);
    let changed = match spec.state {
        State::Present if !attached => {
            info!("attaching volume {} to {}", spec.volume, spec.instance);
            if !dry_run {
                client.volume_attach(volume.id, instance.id)?;
            }
            true
        }
        State::Absent if attached => {
            info!("detaching volume {} from {}", spec.volume, spec.instance);
            if !dry_run {
                client.volume_detach(volume.id)?;
            }
            true
        }
        _ => false,
    };

    Ok(Outcome {
        changed,
        value: Value::Null,
    })
}
