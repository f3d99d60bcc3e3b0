//! Render command - expand a descriptor offline and print the state object

use kube::ResourceExt;
use std::path::Path;

use formation_core::ReleaseData;
use formation_kube::{ControllerStores, FormationController, LocationDescriptor, StateObject};

use super::{LocationArgs, load_settings};
use crate::error::{CliError, Result};

/// Run the render command
pub fn run(
    descriptor_path: &Path,
    release_path: Option<&Path>,
    config: Option<&Path>,
    location: &LocationArgs,
) -> Result<()> {
    let mut settings = load_settings(config)?;
    location.apply(&mut settings)?;

    let ld = load_descriptor(descriptor_path)?;
    let release = match release_path {
        Some(path) => ReleaseData::from_file(path)?,
        None => None,
    };

    let state = render(&ld, release.as_ref(), settings.location)?;
    let yaml = serde_yaml::to_string(&state).map_err(CliError::internal)?;
    print!("{}", yaml);
    Ok(())
}

fn load_descriptor(path: &Path) -> Result<LocationDescriptor> {
    let content = std::fs::read_to_string(path).map_err(|e| CliError::Io {
        message: format!("{}: {}", path.display(), e),
    })?;
    serde_yaml::from_str(&content).map_err(|e| CliError::Render {
        message: format!("{} is not a LocationDescriptor: {}", path.display(), e),
    })
}

/// State object the controller would create for `ld`
fn render(
    ld: &LocationDescriptor,
    release: Option<&ReleaseData>,
    location: formation_core::DeploymentLocation,
) -> Result<StateObject> {
    let controller = FormationController::new(ControllerStores::in_memory(), location);
    let spec = controller.desired_spec(ld, release)?;

    let mut state = StateObject::new(&ld.name_any(), spec);
    state.metadata.namespace = ld.namespace();
    Ok(state)
}
