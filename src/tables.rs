use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::core::{
    account::AccountSnapshot,
    comparison::ComparisonResult,
    rate::RateSchedule,
};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table
}

pub fn build_comparison_table(comparison: &ComparisonResult) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Tariff", "Switchable", "Consumption", "Standing", "Total", ""]);
    for tariff_comparison in comparison.all() {
        let tariff = tariff_comparison.tariff;
        let marker = if tariff == comparison.current.tariff {
            Cell::new("current").add_attribute(Attribute::Dim)
        } else if Some(tariff) == comparison.cheapest {
            Cell::new("cheapest").fg(Color::Green)
        } else {
            Cell::new("")
        };
        let mut row = vec![
            Cell::new(tariff),
            Cell::new(if tariff.switchable { "yes" } else { "no" }).add_attribute(Attribute::Dim),
        ];
        match tariff_comparison.breakdown() {
            Some(breakdown) => {
                let total = Cell::new(breakdown.total_cost).set_alignment(CellAlignment::Right);
                row.extend([
                    Cell::new(breakdown.consumption_cost).set_alignment(CellAlignment::Right),
                    Cell::new(breakdown.standing_charge)
                        .set_alignment(CellAlignment::Right)
                        .add_attribute(Attribute::Dim),
                    if Some(tariff) == comparison.cheapest { total.fg(Color::Green) } else { total },
                ]);
            }
            None => {
                row.push(Cell::new(tariff_comparison.error().unwrap_or_default()).fg(Color::Red));
                row.extend([Cell::new(""), Cell::new("")]);
            }
        }
        row.push(marker);
        table.add_row(row);
    }
    table
}

pub fn build_rates_table(schedule: &RateSchedule) -> Table {
    let mut table = new_table();
    table.set_header(vec!["From", "Until", "Rate", "Payment"]);
    for period in &schedule.periods {
        table.add_row(vec![
            Cell::new(period.validity.from.format("%b %d %H:%M")),
            Cell::new(
                period
                    .validity
                    .until
                    .map_or_else(|| "…".to_string(), |until| until.format("%b %d %H:%M").to_string()),
            )
            .add_attribute(Attribute::Dim),
            Cell::new(period.value).set_alignment(CellAlignment::Right),
            Cell::new(period.payment_method.map_or_else(String::new, |method| format!("{method:?}")))
                .add_attribute(Attribute::Dim),
        ]);
    }
    table
}

pub fn build_consumption_table(account: &AccountSnapshot) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Read at", "Energy", "Billed"]);
    for period in &account.consumption {
        table.add_row(vec![
            Cell::new(period.read_at.format("%H:%M")),
            Cell::new(period.energy).set_alignment(CellAlignment::Right),
            Cell::new(period.billed_cost.map_or_else(String::new, |cost| format!("{cost:?}")))
                .set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
