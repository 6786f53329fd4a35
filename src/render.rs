/// Text rendering of dashboard frames
use std::fmt::Write;

use crate::dashboard::{LiveView, RenderState};
use crate::history::FieldStats;
use crate::models::{Reading, RelayStatus};
use crate::utils::format_datetime;

const SPARK_BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// One trend view: which field, its unit label and display precision
struct Series {
    title: &'static str,
    unit: &'static str,
    decimals: usize,
    value: fn(&Reading) -> f64,
}

const SERIES: [Series; 3] = [
    Series {
        title: "Voltage",
        unit: "V",
        decimals: 1,
        value: voltage,
    },
    Series {
        title: "Current",
        unit: "A",
        decimals: 3,
        value: current,
    },
    Series {
        title: "Power",
        unit: "W",
        decimals: 1,
        value: power,
    },
];

fn voltage(r: &Reading) -> f64 {
    r.voltage
}

fn current(r: &Reading) -> f64 {
    r.current
}

fn power(r: &Reading) -> f64 {
    r.power
}

pub fn render(state: &RenderState, capacity: usize) -> String {
    match state {
        RenderState::Live(view) => render_live(view, capacity),
        RenderState::NoData { unit, reason } => format!(
            "No data available from server for {}\nReason: {}\nWaiting for sensor data...\n",
            unit.id, reason
        ),
    }
}

fn render_live(view: &LiveView, capacity: usize) -> String {
    let mut out = String::new();
    let reading = &view.reading;

    let _ = writeln!(out, "=== IoT Power Monitoring: {} ===", view.unit.id);
    if !view.unit.description.is_empty() {
        let _ = writeln!(out, "{}", view.unit.description);
    }

    let relay = match reading.relay_status {
        RelayStatus::On => "ON (Active)",
        _ => "OFF (Inactive)",
    };
    let _ = writeln!(out, "\nReal-time Readings");
    let _ = writeln!(
        out,
        "  Voltage {:.1} V | Current {:.3} A | Power {:.1} W | Relay {}",
        reading.voltage, reading.current, reading.power, relay
    );

    let _ = writeln!(out, "\nReal-time Trends (Last {} readings)", capacity);
    match &view.summary {
        Some(summary) => {
            let stats = [summary.voltage, summary.current, summary.power];
            for (series, stats) in SERIES.iter().zip(stats) {
                let values: Vec<f64> = view.history.iter().map(series.value).collect();
                let _ = writeln!(out, "  {:<8} {}", series.title, sparkline(&values));
                let _ = writeln!(out, "           {}", stats_line(series, &stats));
            }
        }
        None => {
            let _ = writeln!(
                out,
                "  No data history for {} yet. Waiting for data...",
                view.unit.id
            );
        }
    }

    let _ = writeln!(out, "\nLast updated: {}", format_datetime(&view.updated_at));
    let _ = writeln!(
        out,
        "Total readings: {} | Panel: {}",
        view.history.len(),
        view.unit.id
    );
    out
}

fn stats_line(series: &Series, stats: &FieldStats) -> String {
    let d = series.decimals;
    format!(
        "Avg {:.d$} {u} | Max {:.d$} {u} | Min {:.d$} {u}",
        stats.mean,
        stats.max,
        stats.min,
        d = d,
        u = series.unit
    )
}

/// Scale values onto block characters between the window's min and max
pub fn sparkline(values: &[f64]) -> String {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    let range = max - min;
    let top = (SPARK_BARS.len() - 1) as f64;

    values
        .iter()
        .map(|v| {
            if range <= f64::EPSILON {
                SPARK_BARS[SPARK_BARS.len() / 2]
            } else {
                SPARK_BARS[(((v - min) / range) * top).round() as usize]
            }
        })
        .collect()
}

/// Overview of every panel the API knows about
pub fn render_panels(panels: &[Reading]) -> String {
    if panels.is_empty() {
        return "No panels reported by the server\n".to_string();
    }

    let mut out = format!("Panels ({})\n", panels.len());
    for panel in panels {
        let _ = writeln!(
            out,
            "  {:<10} {:>7.1} V {:>7.3} A {:>8.1} W  relay {:<7} {}",
            panel.unit_id,
            panel.voltage,
            panel.current,
            panel.power,
            panel.relay_status,
            panel.timestamp
        );
    }
    out
}
