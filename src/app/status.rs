use fleetsync::fleet::schedule::{CANONICAL_SCHEDULES, LEGACY_SCHEDULES, normalize};
use fleetsync::fleet::{FleetSnapshot, ManagedNamespace};
use fleetsync::platform::LiveWorker;
use fleetsync::ui::style as ui;

/// How a stored schedule token relates to what the engine accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ScheduleHealth {
    Canonical,
    Legacy(&'static str),
    Unrecognized,
}

fn schedule_health(raw: &str) -> ScheduleHealth {
    match normalize(raw) {
        Ok(normalized) if !normalized.changed => ScheduleHealth::Canonical,
        Ok(normalized) => ScheduleHealth::Legacy(normalized.canonical),
        Err(_) => ScheduleHealth::Unrecognized,
    }
}

pub fn render_status(
    owner: &str,
    platform: &str,
    snapshot: &FleetSnapshot,
    namespace: &ManagedNamespace,
    all: bool,
) -> String {
    let mut lines = vec![
        format!(
            "{} {}",
            ui::accent("◆"),
            ui::header(format!("Fleet status for {owner} ({platform})"))
        ),
        format!(
            "  {} managed, {} foreign (prefix {:?})",
            snapshot.managed.len(),
            snapshot.foreign.len(),
            namespace.prefix()
        ),
        String::new(),
    ];

    if snapshot.managed.is_empty() {
        lines.push(format!("  {}", ui::yellow("No managed workers found")));
    }
    for worker in &snapshot.managed {
        render_worker(&mut lines, worker, false);
    }
    if all {
        for worker in &snapshot.foreign {
            render_worker(&mut lines, worker, true);
        }
    }

    lines.join("\n")
}

fn render_worker(lines: &mut Vec<String>, worker: &LiveWorker, foreign: bool) {
    let health = schedule_health(&worker.schedule);
    let marker = match (&health, worker.disabled) {
        (ScheduleHealth::Canonical, false) => ui::success("✓"),
        (ScheduleHealth::Unrecognized, _) => ui::failure("✗"),
        _ => ui::yellow("!"),
    };
    let suffix = if foreign {
        format!(" {}", ui::dim("(foreign)"))
    } else {
        String::new()
    };
    lines.push(format!(
        "  {marker} {}{suffix}  {}",
        ui::value(&worker.name),
        ui::dim(format!("id {}", worker.id))
    ));

    let schedule = match health {
        ScheduleHealth::Canonical => worker.schedule.clone(),
        ScheduleHealth::Legacy(canonical) => {
            format!("{} (legacy, becomes {canonical})", worker.schedule)
        }
        ScheduleHealth::Unrecognized => format!("{} (unrecognized)", worker.schedule),
    };
    lines.push(format!("      {}  {schedule}", ui::cyan("schedule")));
    lines.push(format!(
        "      {}     {}",
        ui::cyan("state"),
        if worker.disabled { "disabled" } else { "active" }
    ));
    let last = worker.last_output_at.map_or_else(
        || "never".to_string(),
        |at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );
    lines.push(format!(
        "      {}    {}, last {last}",
        ui::cyan("events"),
        worker.output_count
    ));
}

pub fn render_schedules() -> String {
    let mut lines = vec![ui::header("Canonical schedules")];
    for token in CANONICAL_SCHEDULES {
        lines.push(format!("  {}", ui::value(token)));
    }
    lines.push(String::new());
    lines.push(ui::header("Legacy aliases"));
    for (legacy, canonical) in LEGACY_SCHEDULES {
        lines.push(format!("  {legacy:<16} -> {}", ui::value(canonical)));
    }
    lines.join("\n")
}
