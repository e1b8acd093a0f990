use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Flattens a SUMO emission file into a CSV next to it, with one row per vehicle per timestep.
/// The first column is the time; the rest are every vehicle attribute seen, in the order they
/// first appear. Returns the path of the CSV.
///
/// See https://sumo.dlr.de/docs/Simulation/Output/EmissionOutput.html
pub fn emission_to_csv<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    let raw = fs_err::read_to_string(path)?;
    let doc = roxmltree::Document::parse(&raw)
        .with_context(|| format!("parsing emissions {}", path.display()))?;

    let mut header: Vec<String> = vec!["time".to_string()];
    let mut seen: BTreeSet<String> = BTreeSet::new();
    seen.insert("time".to_string());
    let mut rows: Vec<Vec<(String, String)>> = Vec::new();

    for timestep in doc
        .root_element()
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "timestep")
    {
        let time = timestep.attribute("time").unwrap_or_default();
        for vehicle in timestep.children().filter(|n| n.is_element()) {
            let mut row = vec![("time".to_string(), time.to_string())];
            for attr in vehicle.attributes() {
                if seen.insert(attr.name().to_string()) {
                    header.push(attr.name().to_string());
                }
                row.push((attr.name().to_string(), attr.value().to_string()));
            }
            rows.push(row);
        }
    }

    let csv_path = path.with_extension("csv");
    let mut writer = csv::Writer::from_path(&csv_path)
        .with_context(|| format!("creating {}", csv_path.display()))?;
    writer.write_record(&header)?;
    for row in rows {
        let record: Vec<&str> = header
            .iter()
            .map(|column| {
                row.iter()
                    .find(|(k, _)| k == column)
                    .map(|(_, v)| v.as_str())
                    .unwrap_or("")
            })
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    info!("Converted {} to {}", path.display(), csv_path.display());
    Ok(csv_path)
}
