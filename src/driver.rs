/// Poll loop behind the dashboard binary
///
/// Ticks happen on a fixed period. Operator commands are served as they
/// arrive, also while a fetch is in flight, and relay or panel requests run
/// next to the loop so a slow server never pushes a tick back.
use std::time::Duration;

use futures_util::future::LocalBoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use log::info;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use crate::client::TelemetryApi;
use crate::dashboard::{submit_relay, Dashboard};
use crate::models::{UnitInfo, UnitKind};
use crate::operator::{OperatorCommand, HELP};
use crate::render::{render, render_panels};

/// Something for the terminal
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// A full dashboard frame, replaces the previous one
    Frame(String),
    Message(String),
    Warning(String),
}

type Pending = FuturesUnordered<LocalBoxFuture<'static, Output>>;

enum Control {
    Continue,
    Select(String),
    Quit,
}

/// Drive `dashboard` until the operator quits
///
/// `actions` is a second handle on the API used for relay and panel
/// requests, since the dashboard itself is busy polling.
pub async fn run<A>(
    mut dashboard: Dashboard<A>,
    actions: A,
    interval: Duration,
    mut commands: mpsc::Receiver<OperatorCommand>,
    mut emit: impl FnMut(Output),
) where
    A: TelemetryApi + Clone + 'static,
{
    let mut pending = Pending::new();
    let mut input_open = true;

    loop {
        // Commands typed mid-fetch act on the unit being fetched. Unit
        // switches wait until the fetch is done.
        let selected = dashboard.selected().clone();
        let units = dashboard.units().to_vec();
        let mut switches = Vec::new();

        let state = {
            let tick = dashboard.on_tick(OffsetDateTime::now_utc());
            tokio::pin!(tick);
            loop {
                tokio::select! {
                    state = &mut tick => break state,
                    command = commands.recv(), if input_open => match command {
                        Some(command) => {
                            match dispatch(command, &selected, &units, &actions, &mut pending, &mut emit) {
                                Control::Continue => {}
                                Control::Select(unit_id) => switches.push(unit_id),
                                Control::Quit => return,
                            }
                        }
                        None => input_open = false,
                    },
                    Some(output) = pending.next() => emit(output),
                }
            }
        };

        emit(Output::Frame(render(&state, dashboard.history().capacity())));
        for unit_id in switches {
            select_unit(&mut dashboard, &unit_id, &mut emit);
        }

        // The deadline is fixed before waiting, whatever arrives meanwhile
        let next_tick = Instant::now() + interval;
        loop {
            tokio::select! {
                _ = sleep_until(next_tick) => break,
                command = commands.recv(), if input_open => match command {
                    Some(command) => {
                        let selected = dashboard.selected().clone();
                        match dispatch(command, &selected, dashboard.units(), &actions, &mut pending, &mut emit) {
                            Control::Continue => {}
                            Control::Select(unit_id) => select_unit(&mut dashboard, &unit_id, &mut emit),
                            Control::Quit => return,
                        }
                    }
                    None => input_open = false,
                },
                Some(output) = pending.next() => emit(output),
            }
        }
    }
}

fn dispatch<A>(
    command: OperatorCommand,
    selected: &UnitInfo,
    units: &[UnitInfo],
    actions: &A,
    pending: &mut Pending,
    emit: &mut impl FnMut(Output),
) -> Control
where
    A: TelemetryApi + Clone + 'static,
{
    match command {
        OperatorCommand::Relay(action) => {
            let api = actions.clone();
            let unit = selected.clone();
            pending.push(Box::pin(async move {
                let outcome = submit_relay(&api, unit, action).await;
                if outcome.accepted {
                    Output::Message(outcome.message())
                } else {
                    Output::Warning(outcome.message())
                }
            }));
        }
        OperatorCommand::Panels => {
            let api = actions.clone();
            pending.push(Box::pin(async move {
                match api.fetch_panels().await {
                    Some(panels) => Output::Message(render_panels(&panels)),
                    None => Output::Warning("Panel overview unavailable".to_string()),
                }
            }));
        }
        OperatorCommand::ListUnits => emit(Output::Message(unit_list(units, &selected.id))),
        OperatorCommand::Help => emit(Output::Message(HELP.to_string())),
        OperatorCommand::Select(unit_id) => return Control::Select(unit_id),
        OperatorCommand::Quit => {
            info!("Dashboard stopped by operator");
            return Control::Quit;
        }
    }
    Control::Continue
}

fn select_unit<A: TelemetryApi>(
    dashboard: &mut Dashboard<A>,
    unit_id: &str,
    emit: &mut impl FnMut(Output),
) {
    match dashboard.select_unit(unit_id) {
        Ok(unit) => {
            let mut message = format!("Currently monitoring: {}", unit.id);
            if !unit.description.is_empty() {
                message.push('\n');
                message.push_str(&unit.description);
            }
            emit(Output::Message(message));
        }
        Err(e) => emit(Output::Warning(e.to_string())),
    }
}

fn unit_list(units: &[UnitInfo], selected: &str) -> String {
    units
        .iter()
        .map(|unit| {
            let marker = if unit.id == selected { "*" } else { " " };
            let kind = match unit.kind {
                UnitKind::Real => "real",
                UnitKind::Simulated => "simulated",
            };
            format!("{} {:<10} {:<9} {}", marker, unit.id, kind, unit.description)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
