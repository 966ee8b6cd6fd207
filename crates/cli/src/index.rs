use crate::{load_settings, local_navigator};
use pkgnav_core::join_all;
use std::path::PathBuf;
use tabled::{Table, Tabled, settings::Style};
use tracing::info;

#[derive(Tabled)]
struct PackageRow {
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Files")]
    files: usize,
    #[tabled(rename = "Failed")]
    failed: usize,
    #[tabled(rename = "Declarations")]
    declarations: usize,
    #[tabled(rename = "Time")]
    time: String,
}

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Stem")]
    stem: String,
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Locations")]
    locations: usize,
}

pub async fn run(config: PathBuf, entries: bool) -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_settings(&config)?;
    info!(
        "Indexing {} packages from {}",
        settings.packages.len(),
        config.display()
    );
    let navigator = local_navigator(settings);

    let reports = join_all(navigator.rebuild_all().await).await;
    let rows: Vec<PackageRow> = reports
        .into_iter()
        .flatten()
        .map(|report| PackageRow {
            package: report.package,
            files: report.files_indexed,
            failed: report.files_failed,
            declarations: report.declarations,
            time: format!("{:.2?}", report.duration),
        })
        .collect();

    if rows.is_empty() {
        println!("No package roots found.");
        return Ok(());
    }
    println!("{}", Table::new(rows).with(Style::rounded()));

    if entries {
        let index = navigator.index();
        let rows: Vec<EntryRow> = index
            .package_names()
            .into_iter()
            .flat_map(|package| {
                index
                    .entries(&package)
                    .into_iter()
                    .map(move |row| EntryRow {
                        package: package.clone(),
                        stem: row.stem,
                        symbol: row.symbol_path,
                        locations: row.entry.len(),
                    })
            })
            .collect();
        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    let stats = navigator.index().stats();
    info!(
        "Index holds {} symbols ({} locations) across {} packages",
        stats.symbols, stats.locations, stats.packages
    );
    Ok(())
}
