//! Intermediate tables written when a debug directory is given.

use std::path::Path;

use zcta_spatial::TractToZctaMap;

use crate::PipelineError;

/// Writes the tract to ZCTA assignments as `tract_geoid,zcta` CSV.
///
/// Unmapped tracts are listed last with an empty ZCTA.
///
/// # Errors
///
/// Returns [`PipelineError::Debug`] if the file cannot be written.
pub fn write_tract_map(metro: &str, map: &TractToZctaMap, path: &Path) -> Result<(), PipelineError> {
    let debug_err = |message: String| PipelineError::Debug {
        metro: metro.to_string(),
        path: path.to_path_buf(),
        message,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| debug_err(e.to_string()))?;
    }

    let mut writer = csv::Writer::from_path(path).map_err(|e| debug_err(e.to_string()))?;
    writer
        .write_record(["tract_geoid", "zcta"])
        .map_err(|e| debug_err(e.to_string()))?;
    for (tract, zcta) in &map.assignments {
        writer
            .write_record([tract.as_str(), zcta.as_str()])
            .map_err(|e| debug_err(e.to_string()))?;
    }
    for tract in &map.unmapped {
        writer
            .write_record([tract.as_str(), ""])
            .map_err(|e| debug_err(e.to_string()))?;
    }
    writer.flush().map_err(|e| debug_err(e.to_string()))?;

    log::info!(
        "[{metro}] Wrote {} tract assignments to {}",
        map.len() + map.unmapped.len(),
        path.display()
    );
    Ok(())
}
