use log::info;
use std::path::Path;

use crate::common::Tally;

fn percent(v: f64, total: f64) -> String {
    format!("{:.2}", 100.0 * v / total.max(1.0))
}

///////////////////////////////
/// Log every counter with its share of the total
pub fn report_stats(tally: &Tally, prefix: &str) {
    let total = tally.get("total");
    for (k, v) in tally.iter() {
        info!("{}{}\t{}\t{}", prefix, k, v, percent(v, total));
    }
}

///////////////////////////////
/// Write the stats file: `freq` rows for the run counters, then `BC1`/`BC2` rows
/// with the usage of each barcode name
pub fn save_stats(
    path: &Path,
    tally: &Tally,
    name_counts: Option<(&Tally, &Tally)>,
) -> anyhow::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)
        .map_err(|e| anyhow::anyhow!("Could not create stats file {}: {}", path.display(), e))?;

    let mut sections = vec![("freq", tally)];
    if let Some((bc1, bc2)) = name_counts {
        sections.push(("BC1", bc1));
        sections.push(("BC2", bc2));
    }

    for (label, counts) in sections {
        let total = counts.get("total");
        for (k, v) in counts.iter() {
            let value = v.to_string();
            let pct = percent(v, total);
            writer.write_record([label, k, value.as_str(), pct.as_str()])?;
        }
    }
    writer.flush()?;
    info!("saved run statistics to {}", path.display());
    Ok(())
}
