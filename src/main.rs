// Entry point and console flow.
//
// - Option [1] fetches every workbook, maps the incident sheet and publishes
//   the result as the current snapshot.
// - Option [2] asks for filter criteria, writes the report files and prints
//   previews.
// - Option [3] shows everything known about one driver.
// When the share carries an authorised-user sheet, options [2] and [3]
// require a login first.
mod config;
mod dates;
mod error;
mod filter;
mod headers;
mod loader;
mod output;
mod reports;
mod source;
mod state;
mod types;
mod util;
mod xref;

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::filter::FilterCriteria;
use crate::loader::Snapshot;
use crate::source::{DataSource, LocalDirSource};
use crate::state::SnapshotStore;

static STORE: Lazy<SnapshotStore> = Lazy::new(SnapshotStore::new);

/// Print `label` and read one trimmed line. `None` once stdin is closed.
fn prompt(label: &str) -> Option<String> {
    print!("{}", label);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

fn prompt_text(label: &str) -> Option<String> {
    prompt(label).filter(|s| !s.is_empty())
}

fn prompt_date(label: &str) -> Option<chrono::NaiveDate> {
    let raw = prompt_text(label)?;
    let date = dates::parse_date_str(&raw);
    if date.is_none() {
        println!("Ongeldige datum \"{}\", filter genegeerd.", raw);
    }
    date
}

fn prompt_criteria(types: &[String]) -> FilterCriteria {
    let id_substring = prompt_text("Personeelsnr bevat (leeg = alle): ");
    let vehicle_substring = prompt_text("Bus/tram bevat (leeg = alle): ");

    println!("Types: {}", if types.is_empty() { "-".to_string() } else { types.join(", ") });
    let exact_type = prompt_text("Type (leeg = alle): ");
    if let Some(t) = &exact_type {
        if !types.contains(t) {
            println!("Type \"{}\" komt niet voor in de data.", t);
        }
    }

    FilterCriteria {
        id_substring,
        vehicle_substring,
        exact_type,
        start_date: prompt_date("Vanaf datum (DD-MM-YYYY, leeg = geen): "),
        end_date: prompt_date("Tot en met datum (DD-MM-YYYY, leeg = geen): "),
    }
}

/// Option [1]. A failed refresh keeps whatever snapshot was published before.
fn handle_load(source: &dyn DataSource, settings: &Settings) {
    let token = STORE.begin_refresh();
    match loader::refresh(source, settings) {
        Ok(snapshot) => {
            println!(
                "Data verwerkt: {} rijen gelezen, {} schades behouden, {} rijen overgeslagen.",
                util::format_int(snapshot.report.total_rows),
                util::format_int(snapshot.report.kept_rows),
                util::format_int(snapshot.report.dropped_rows)
            );
            println!("{}\n", output::status_table(&snapshot.statuses));
            info!(
                personnel = snapshot.index.personnel.len(),
                seniority = snapshot.seniority.len(),
                users = snapshot.index.users.len(),
                "snapshot ready"
            );
            if !STORE.publish(token, snapshot) {
                println!("Een nieuwere laadactie is al actief; resultaat genegeerd.\n");
            }
        }
        Err(e) => {
            error!(error = %e, "refresh failed");
            eprintln!("Laden mislukt: {}\n", e);
        }
    }
}

fn require_snapshot() -> Option<Arc<Snapshot>> {
    let snapshot = STORE.current();
    if snapshot.is_none() {
        println!("Nog geen data geladen. Kies eerst optie 1.\n");
    }
    snapshot
}

/// Login gate. Without an authorised-user sheet everyone is let through.
fn ensure_logged_in(snapshot: &Snapshot, logged_in: &mut bool) -> bool {
    if *logged_in || snapshot.index.users.is_empty() {
        return true;
    }
    let user = prompt("Naam: ").unwrap_or_default();
    let password = prompt("Paswoord: ").unwrap_or_default();
    *logged_in = snapshot.index.authenticate(&user, &password);
    if *logged_in {
        info!(user = %user, "login");
    } else {
        println!("Onbekende gebruiker of verkeerd paswoord.\n");
    }
    *logged_in
}

/// Option [2]: every report for the prompted filter, written to the output
/// directory with a console preview.
fn handle_reports(snapshot: &Snapshot, settings: &Settings) -> Result<()> {
    let criteria = prompt_criteria(&reports::unique_types(&snapshot.records));
    let filtered = filter::filter_records(&snapshot.records, &criteria);
    // Coaching candidates ignore the driver search box.
    let context = filter::filter_records(&snapshot.records, &criteria.without_search());

    let stats = reports::dashboard_stats(&filtered);
    let monthly = reports::monthly_matrix(&filtered);
    let seniority = reports::seniority_bins(&snapshot.seniority);
    let eligible = reports::coaching_eligibility(&context, &snapshot.index.coaching);
    let drivers = reports::top_drivers(&filtered);
    let locations = reports::location_overview(&filtered);
    let vehicles = reports::vehicle_overview(&filtered);
    let summary = reports::generate_summary(&filtered, &eligible);

    let dir = Path::new(&settings.output.dir);
    fs::create_dir_all(dir).with_context(|| format!("cannot create output directory {}", dir.display()))?;

    println!("\n{} schades binnen de filter.\n", util::format_int(stats.total_incidents));

    println!("Schades per type (top 10)");
    output::write_csv(&dir.join("schades_per_type.csv"), &stats.by_type)?;
    output::preview_table_rows(&stats.by_type, 10);

    println!("Schades per voertuigtype");
    output::write_csv(&dir.join("schades_per_voertuigtype.csv"), &stats.by_vehicle)?;
    output::preview_table_rows(&stats.by_vehicle, 10);

    println!("Schades per locatie (top 10, volledige lijst in schades_per_locatie.csv)");
    output::write_csv(&dir.join("schades_per_locatie.csv"), &locations)?;
    output::preview_table_rows(&stats.by_location, 10);

    println!("Schades per bus/tram");
    output::write_csv(&dir.join("schades_per_voertuig.csv"), &vehicles)?;
    output::preview_table_rows(&vehicles, 5);

    println!("Schades per maand");
    output::write_monthly_csv(&dir.join("schades_per_maand.csv"), &monthly)?;
    println!("{}\n", output::monthly_table(&monthly));

    println!("Gemiddeld aantal schades per dienstjaren");
    output::write_csv(&dir.join("schades_per_dienstjaar.csv"), &seniority)?;
    output::preview_table_rows(&seniority, seniority.len());

    println!("Chauffeurs met meer dan {} schades zonder voltooide coaching", reports::COACHING_THRESHOLD);
    output::write_csv(&dir.join("coaching_kandidaten.csv"), &eligible)?;
    output::preview_table_rows(&eligible, 10);

    println!("Chauffeurs met de meeste schades");
    output::write_csv(&dir.join("top_chauffeurs.csv"), &drivers)?;
    output::preview_table_rows(&drivers, 5);

    output::write_json(
        &dir.join("summary.json"),
        &serde_json::json!({ "summary": &summary, "dashboard": &stats }),
    )?;
    println!("Samenvatting (summary.json):");
    println!(
        "{} schades, {} chauffeurs, {} coachingkandidaten waarvan {} gepland.\n",
        util::format_int(summary.total_incidents),
        util::format_int(summary.unique_drivers),
        util::format_int(summary.eligible_for_coaching),
        util::format_int(summary.planned_coachings)
    );
    Ok(())
}

/// Option [3]: personnel card, coaching history, conversations and incidents
/// for one personnel number.
fn handle_lookup(snapshot: &Snapshot) {
    let Some(query) = prompt_text("Personeelsnr: ") else {
        return;
    };
    let index = &snapshot.index;

    match index.find_personnel(&query) {
        Some(entry) => println!("{}\n", output::personnel_card(entry)),
        None if index.personnel.is_empty() => println!("Geen personeelsbestand geladen.\n"),
        None => println!("Geen personeelsfiche voor {}.\n", query),
    }

    let coaching = index.filter_coaching(&query);
    if coaching.is_empty() {
        println!("Geen coachings.\n");
    } else {
        if !coaching.requested.is_empty() {
            println!("Aangevraagde coachings");
            println!("{}\n", output::rows_table(&coaching.requested));
        }
        if !coaching.completed.is_empty() {
            println!("Voltooide coachings");
            println!("{}\n", output::rows_table(&coaching.completed));
        }
    }

    let conversations = index.filter_conversations(&query);
    if conversations.is_empty() {
        println!("Geen gesprekken.\n");
    } else {
        let when: Vec<String> = conversations.iter().map(|r| xref::conversation_date(r)).collect();
        println!("Gesprekken ({})", when.join(", "));
        println!("{}\n", output::rows_table(&conversations));
    }

    let incidents: Vec<_> = snapshot
        .records
        .iter()
        .filter(|r| util::ids_match(&r.personnel_id, &query))
        .cloned()
        .collect();
    println!("{} schades", util::format_int(incidents.len()));
    if !incidents.is_empty() {
        println!("{}\n", output::incident_table(&incidents, &snapshot.extra_headers));
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let settings = config::load_settings().context("failed to load settings")?;
    let source = LocalDirSource::new(&settings.data.dir);
    info!(dir = %settings.data.dir, policy = ?settings.mapper.policy, "starting");

    let mut logged_in = false;
    loop {
        println!("Schade-overzicht");
        println!("[1] Data laden");
        println!("[2] Rapporten genereren");
        println!("[3] Chauffeur opzoeken");
        println!("[4] Afsluiten\n");
        let Some(choice) = prompt("Keuze: ") else {
            break;
        };
        match choice.as_str() {
            "1" => handle_load(&source, &settings),
            "2" => {
                if let Some(snapshot) = require_snapshot() {
                    if ensure_logged_in(&snapshot, &mut logged_in) {
                        if let Err(e) = handle_reports(&snapshot, &settings) {
                            error!(error = %e, "report generation failed");
                            eprintln!("Rapporten mislukt: {:#}\n", e);
                        }
                    }
                }
            }
            "3" => {
                if let Some(snapshot) = require_snapshot() {
                    if ensure_logged_in(&snapshot, &mut logged_in) {
                        handle_lookup(&snapshot);
                    }
                }
            }
            "4" => break,
            _ => println!("Ongeldige keuze. Kies 1, 2, 3 of 4.\n"),
        }
    }
    println!("Programma afgesloten.");
    Ok(())
}
