use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::models::{ModelRecord, TrafficLight};

/// A model that could not be processed, with the reason.
#[derive(Debug, Clone)]
pub struct Failure {
    pub model_name: String,
    pub error: String,
}

/// Render a colored terminal report.
pub fn render(
    records: &[ModelRecord],
    failures: &[Failure],
    input: &Path,
    verbose: bool,
    quiet: bool,
) -> Result<()> {
    let total = records.len() + failures.len();
    let green = count_light(records, TrafficLight::Green);
    let orange = count_light(records, TrafficLight::Orange);
    let red = count_light(records, TrafficLight::Red);

    if quiet {
        println!(
            "Models: {}  Green: {}  Orange: {}  Red: {}  Failed: {}",
            total,
            green.to_string().green(),
            orange.to_string().yellow(),
            red.to_string().red(),
            failures.len().to_string().red(),
        );
        return Ok(());
    }

    println!(
        "\n {} v{}",
        "transparency-checkr".bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(" Input: {}\n", input.display());

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(" │  {:<48} │", format!("Models             : {}", total));
    println!(
        " │  {:<48} │",
        format!("{}  Green           : {:>4}", "●".green(), green)
    );
    println!(
        " │  {:<48} │",
        format!("{}  Orange          : {:>4}", "●".yellow(), orange)
    );
    println!(
        " │  {:<48} │",
        format!("{}  Red             : {:>4}", "●".red(), red)
    );
    println!(
        " │  {:<48} │",
        format!("{}  Failed          : {:>4}", "✗".red(), failures.len())
    );
    println!(" │  {:<48} │", format!("Regions {}", summarize_regions(records)));
    println!(" └────────────────────────────────────────────────────┘\n");

    if !failures.is_empty() {
        println!(" {} Models that could not be processed:\n", "[ERROR]".red().bold());
        for failure in failures {
            println!("   {} {}: {}", "✗".red(), failure.model_name, failure.error);
        }
        println!();
    }

    if !records.is_empty() {
        println!(" {} Transparency ranking:\n", "[RANK]".cyan().bold());
        render_ranking(records);
        println!();
    }

    if verbose {
        for record in rank(records) {
            render_details(record);
        }
    }

    Ok(())
}

/// Records by overall score, then bonus stars, then model key.
pub fn rank(records: &[ModelRecord]) -> Vec<&ModelRecord> {
    let mut ranked: Vec<&ModelRecord> = records.iter().collect();
    ranked.sort_by(|a, b| {
        let (sa, sb) = (&a.transparency_score, &b.transparency_score);
        sb.overall
            .total_cmp(&sa.overall)
            .then_with(|| sb.bonus_stars.cmp(&sa.bonus_stars))
            .then_with(|| a.key().cmp(&b.key()))
    });
    ranked
}

fn render_ranking(records: &[ModelRecord]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#").add_attribute(Attribute::Bold),
            Cell::new("Model").add_attribute(Attribute::Bold),
            Cell::new("Provider").add_attribute(Attribute::Bold),
            Cell::new("Region").add_attribute(Attribute::Bold),
            Cell::new("Method").add_attribute(Attribute::Bold),
            Cell::new("Score").add_attribute(Attribute::Bold),
            Cell::new("Stars").add_attribute(Attribute::Bold),
            Cell::new("Label").add_attribute(Attribute::Bold),
        ]);

    for (i, record) in rank(records).into_iter().enumerate() {
        let score = &record.transparency_score;
        let region = if record.resolved_region.multi_region {
            format!("{}*", record.resolved_region.region)
        } else {
            record.resolved_region.region.to_string()
        };

        table.add_row(vec![
            Cell::new(i + 1).set_alignment(CellAlignment::Right),
            Cell::new(&record.model_name),
            Cell::new(&record.provider),
            Cell::new(region),
            Cell::new(record.resolved_region.method.to_string()).fg(Color::DarkGrey),
            Cell::new(format!("{:.0}", score.overall))
                .fg(light_color(score.traffic_light))
                .set_alignment(CellAlignment::Right),
            Cell::new("★".repeat(score.bonus_stars as usize)).fg(Color::Yellow),
            Cell::new(&record.label),
        ]);
    }

    println!("{}", table);
}

fn render_details(record: &ModelRecord) {
    println!(
        " {} {} ({})  completeness {}%{}",
        "▸".cyan(),
        record.model_name.bold(),
        record.provider,
        record.transparency_score.completeness_percent,
        if record.provenance.code_of_practice_signatory {
            "  code-of-practice signatory"
        } else {
            ""
        }
    );

    let mut sections = Table::new();
    sections
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Section").add_attribute(Attribute::Bold),
            Cell::new("Score").add_attribute(Attribute::Bold),
            Cell::new("Fields").add_attribute(Attribute::Bold),
        ]);
    for (key, score) in &record.transparency_score.sections {
        let fields = record
            .sections
            .get(key)
            .map(|s| {
                s.fields
                    .iter()
                    .filter(|(_, f)| f.is_present())
                    .map(|(name, _)| name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        let star = record.sections.get(key).is_some_and(|s| s.bonus_star);
        sections.add_row(vec![
            Cell::new(if star { format!("{} ★", key) } else { key.clone() }),
            Cell::new(format!("{:.2}", score)).set_alignment(CellAlignment::Right),
            Cell::new(fields),
        ]);
    }
    println!("{}", sections);

    let resolved = &record.resolved_region;
    let candidates: Vec<String> = resolved
        .candidate_scores
        .iter()
        .map(|(region, score)| format!("{}={}", region, score))
        .collect();
    println!(
        "   region {} via {}  candidates [{}]",
        resolved.region.to_string().bold(),
        resolved.method,
        candidates.join(", ")
    );
    if !resolved.secondary_regions.is_empty() {
        let secondary: Vec<&str> = resolved.secondary_regions.iter().map(|r| r.as_str()).collect();
        println!("   secondary regions: {}", secondary.join(", "));
    }
    println!();
}

fn count_light(records: &[ModelRecord], light: TrafficLight) -> usize {
    records
        .iter()
        .filter(|r| r.transparency_score.traffic_light == light)
        .count()
}

fn light_color(light: TrafficLight) -> Color {
    match light {
        TrafficLight::Green => Color::Green,
        TrafficLight::Orange => Color::Yellow,
        TrafficLight::Red => Color::Red,
    }
}

/// Three most frequent regions, e.g. `[US (4), EU (2), CN (1)]`.
fn summarize_regions(records: &[ModelRecord]) -> String {
    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.resolved_region.region.as_str()).or_insert(0) += 1;
    }

    let mut pairs: Vec<(&str, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let summary: Vec<String> = pairs
        .iter()
        .take(3)
        .map(|(region, count)| format!("{} ({})", region, count))
        .collect();

    if summary.is_empty() {
        String::new()
    } else {
        format!("[{}]", summary.join(", "))
    }
}
