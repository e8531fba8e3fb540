use std::collections::HashSet;

use super::schedule_manager::ScheduleManager;
use crate::output::ProtocolKind;
use crate::playlist::PlayListItem;

/// Advisory findings about a show. Nothing here stops the show running.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub errors: usize,
    pub warnings: usize,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Error,
    Warning,
}

impl IntegrityReport {
    fn section(&mut self, title: &str, problems: Vec<(Severity, String)>) {
        self.lines.push(format!("{}:", title));
        if problems.is_empty() {
            self.lines.push("    No problems found".to_string());
        }
        for (severity, problem) in problems {
            let label = match severity {
                Severity::Error => {
                    self.errors += 1;
                    "ERR"
                }
                Severity::Warning => {
                    self.warnings += 1;
                    "WARN"
                }
            };
            self.lines.push(format!("    {}: {}", label, problem));
        }
        self.lines.push(String::new());
    }

    pub fn is_clean(&self) -> bool {
        self.errors == 0 && self.warnings == 0
    }
}

/// Names that appear more than once, compared without case
fn duplicates<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    names
        .into_iter()
        .filter(|name| {
            let key = name.to_lowercase();
            !seen.insert(key.clone()) && reported.insert(key)
        })
        .collect()
}

impl ScheduleManager {
    pub fn check_schedule_integrity(&self) -> IntegrityReport {
        let mut report = IntegrityReport::default();
        let outputs = self.output_manager().describe();
        let total_channels = self.output_manager().total_channels();
        let options = self.options();
        let playlists = self.playlists();

        report.section(
            "Inactive outputs",
            outputs
                .iter()
                .filter(|o| !o.enabled)
                .map(|o| (Severity::Warning, format!("Output {} is not enabled.", o.description)))
                .collect(),
        );

        let mut shared = Vec::new();
        for (i, a) in outputs.iter().enumerate() {
            for b in &outputs[i + 1..] {
                if a.kind != ProtocolKind::Null && a.kind == b.kind && a.destination == b.destination {
                    shared.push((
                        Severity::Error,
                        format!(
                            "Outputs {} and {} both send to {}.",
                            a.number, b.number, a.destination
                        ),
                    ));
                }
            }
        }
        report.section("Outputs sending to the same destination", shared);

        report.section(
            "Duplicate playlist names",
            duplicates(playlists.iter().map(|p| p.name_no_time()))
                .into_iter()
                .map(|name| (Severity::Error, format!("Playlist '{}' appears more than once.", name)))
                .collect(),
        );

        let mut steps = Vec::new();
        let mut schedules = Vec::new();
        let mut empty = Vec::new();
        for playlist in playlists {
            let name = playlist.name_no_time();
            for step in duplicates(playlist.steps().iter().map(|s| s.name.as_str())) {
                steps.push((
                    Severity::Warning,
                    format!("Playlist '{}' has more than one step named '{}'.", name, step),
                ));
            }
            for schedule in duplicates(playlist.schedules().iter().map(|s| s.name.as_str())) {
                schedules.push((
                    Severity::Warning,
                    format!("Playlist '{}' has more than one schedule named '{}'.", name, schedule),
                ));
            }
            if playlist.steps().is_empty() {
                empty.push((Severity::Warning, format!("Playlist '{}' has no steps.", name)));
            }
            for step in playlist.steps().iter().filter(|s| s.items.is_empty()) {
                empty.push((
                    Severity::Warning,
                    format!("Step '{}' in playlist '{}' has no items.", step.name, name),
                ));
            }
        }
        report.section("Duplicate step names", steps);
        report.section("Duplicate schedule names", schedules);
        report.section("Empty playlists and steps", empty);

        let scheduled: Vec<_> = playlists
            .iter()
            .flat_map(|p| p.schedules().iter().map(move |s| (p.name_no_time(), s)))
            .collect();
        let mut collisions = Vec::new();
        for (i, (a_playlist, a)) in scheduled.iter().enumerate() {
            for (b_playlist, b) in &scheduled[i + 1..] {
                if a.priority == b.priority && a.overlaps(b) {
                    collisions.push((
                        Severity::Warning,
                        format!(
                            "Schedules '{}' ({}) and '{}' ({}) overlap with the same priority {}.",
                            a.name, a_playlist, b.name, b_playlist, a.priority
                        ),
                    ));
                }
            }
        }
        report.section("Overlapping schedules with the same priority", collisions);

        let matrix_names = options
            .matrices
            .iter()
            .map(|m| m.name.as_str())
            .chain(options.virtual_matrices.iter().map(|m| m.name.as_str()));
        let mut matrices: Vec<_> = duplicates(matrix_names)
            .into_iter()
            .map(|name| (Severity::Error, format!("Matrix name '{}' is used more than once.", name)))
            .collect();
        for matrix in &options.matrices {
            if matrix.end_channel() > total_channels {
                matrices.push((
                    Severity::Error,
                    format!(
                        "Matrix '{}' ends at channel {} but only {} channels are available.",
                        matrix.name,
                        matrix.end_channel(),
                        total_channels
                    ),
                ));
            }
        }
        for matrix in &options.virtual_matrices {
            if matrix.end_channel() > total_channels {
                matrices.push((
                    Severity::Error,
                    format!(
                        "Virtual matrix '{}' ends at channel {} but only {} channels are available.",
                        matrix.name,
                        matrix.end_channel(),
                        total_channels
                    ),
                ));
            }
        }
        report.section("Matrices", matrices);

        let mut text = Vec::new();
        for playlist in playlists {
            for step in playlist.steps() {
                for item in &step.items {
                    if let PlayListItem::Text(item) = item {
                        if options.matrix(&item.matrix).is_none() {
                            text.push((
                                Severity::Error,
                                format!(
                                    "Text '{}' in step '{}' of playlist '{}' uses missing matrix '{}'.",
                                    item.name,
                                    step.name,
                                    playlist.name_no_time(),
                                    item.matrix
                                ),
                            ));
                        }
                    }
                }
            }
        }
        report.section("Text items", text);

        let mut web = Vec::new();
        if options.web.password.is_empty() {
            web.push((Severity::Warning, "No password is set on the web interface.".to_string()));
        }
        if !options.web.api_only {
            if let Some(root) = options.web.web_root.as_ref() {
                if !root.is_dir() {
                    web.push((
                        Severity::Error,
                        format!("Web root {} does not exist.", root.display()),
                    ));
                } else if !root.join("index.html").is_file() {
                    web.push((
                        Severity::Error,
                        format!("Web root {} has no index.html.", root.display()),
                    ));
                }
            }
        }
        report.section("Web interface", web);

        log::info!(
            "Schedule integrity check found {} errors and {} warnings",
            report.errors,
            report.warnings
        );
        report
    }
}
