use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use serde_json::{json, Value};

use super::command::CommandError;
use super::schedule_manager::{Foreground, ScheduleManager};
use super::Schedule;
use crate::playlist::{format_duration, PlayListStep};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reply to a query. `data` carries the JSON document; every scalar in it
/// is a string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub success: bool,
    pub data: Value,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
}

fn flag(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn step_json(step: &PlayListStep) -> Value {
    json!({
        "name": step.name,
        "id": step.id().to_string(),
        "length": format_duration(step.length_ms()),
    })
}

fn schedule_json(schedule: &Schedule, now: NaiveDateTime) -> Value {
    let active = schedule.check_active(now);
    let next = if active {
        "NOW!".to_string()
    } else {
        schedule
            .next_start_time(now)
            .map_or_else(|| "Never".to_string(), |t| t.format(TIME_FORMAT).to_string())
    };

    json!({
        "name": schedule.name,
        "id": schedule.id().to_string(),
        "enabled": flag(schedule.enabled),
        "active": flag(active),
        "looping": flag(schedule.looping),
        "random": flag(schedule.random),
        "priority": schedule.priority.to_string(),
        "start": schedule.start_time.format("%H:%M").to_string(),
        "end": schedule.end_time.format("%H:%M").to_string(),
        "nextactive": next,
    })
}

impl ScheduleManager {
    pub fn query(&self, name: &str, parameters: &str, ip: &str) -> QueryResult {
        self.query_at(name, parameters, ip, Local::now().naive_local())
    }

    /// Answer a query as of `now`
    pub fn query_at(&self, name: &str, parameters: &str, ip: &str, now: NaiveDateTime) -> QueryResult {
        match self.answer(name.trim(), parameters.trim(), ip, now) {
            Ok(data) => QueryResult {
                success: true,
                data,
                message: String::new(),
            },
            Err((data, e)) => {
                log::debug!("Query '{}' failed: {}", name, e);
                QueryResult {
                    success: false,
                    data,
                    message: e.to_string(),
                }
            }
        }
    }

    fn answer(
        &self,
        name: &str,
        parameters: &str,
        ip: &str,
        now: NaiveDateTime,
    ) -> Result<Value, (Value, CommandError)> {
        let not_found = |empty: Value| (empty, CommandError::PlayListNotFound(parameters.to_string()));

        match name {
            "GetPlayLists" => {
                let playlists: Vec<Value> = self
                    .playlists()
                    .iter()
                    .map(|p| {
                        json!({
                            "name": p.name_no_time(),
                            "id": p.id().to_string(),
                            "length": format_duration(p.length_ms()),
                        })
                    })
                    .collect();
                Ok(json!({ "playlists": playlists }))
            }
            "GetPlayListSteps" => {
                let playlist = self
                    .playlist(parameters)
                    .ok_or_else(|| not_found(json!({ "steps": [] })))?;
                let steps: Vec<Value> = playlist.steps().iter().map(step_json).collect();
                Ok(json!({ "steps": steps }))
            }
            "GetQueuedSteps" => {
                let steps: Vec<Value> = self.queue().steps().iter().map(step_json).collect();
                Ok(json!({ "steps": steps }))
            }
            "GetPlayListSchedules" => {
                let playlist = self
                    .playlist(parameters)
                    .ok_or_else(|| not_found(json!({ "schedules": [] })))?;
                let schedules: Vec<Value> = playlist
                    .schedules()
                    .iter()
                    .map(|s| schedule_json(s, now))
                    .collect();
                Ok(json!({ "schedules": schedules }))
            }
            "GetPlayListSchedule" => {
                let Some((playlist, schedule)) = parameters.split_once(',') else {
                    return Err((
                        Value::Null,
                        CommandError::WrongParameterCount {
                            command: name.to_string(),
                            expected: 2,
                        },
                    ));
                };
                let playlist = self.playlist(playlist.trim()).ok_or_else(|| {
                    (Value::Null, CommandError::PlayListNotFound(playlist.to_string()))
                })?;
                let schedule = playlist.get_schedule(schedule.trim()).ok_or_else(|| {
                    (Value::Null, CommandError::ScheduleNotFound(schedule.to_string()))
                })?;
                Ok(schedule_json(schedule, now))
            }
            "GetPlayingStatus" => Ok(self.playing_status(ip, now)),
            "GetMatrices" => {
                let matrices: Vec<&str> = self
                    .options()
                    .matrices
                    .iter()
                    .map(|m| m.name.as_str())
                    .collect();
                Ok(json!({ "matrices": matrices }))
            }
            "GetButtons" => {
                let buttons: Vec<Value> = self
                    .options()
                    .buttons
                    .iter()
                    .map(|b| {
                        json!({
                            "label": b.label,
                            "command": b.command,
                            "parameters": b.parameters,
                        })
                    })
                    .collect();
                Ok(json!({ "buttons": buttons }))
            }
            "GetOutputs" => {
                let outputs: Vec<Value> = self
                    .output_manager()
                    .describe()
                    .iter()
                    .map(|o| {
                        json!({
                            "number": o.number.to_string(),
                            "type": o.kind.to_string(),
                            "description": o.description,
                            "destination": o.destination,
                            "startchannel": o.start_channel.to_string(),
                            "channels": o.channels.to_string(),
                            "enabled": flag(o.enabled),
                            "ok": flag(o.ok),
                        })
                    })
                    .collect();
                Ok(json!({ "outputs": outputs }))
            }
            _ => Err((Value::Null, CommandError::UnknownQuery)),
        }
    }

    fn playing_status(&self, ip: &str, now: NaiveDateTime) -> Value {
        let outputting = flag(self.output_manager().is_outputting());
        let time = now.format(TIME_FORMAT).to_string();

        let playing = self
            .running_playlist()
            .and_then(|p| p.running_step().map(|step| (p, step)));
        let Some((playlist, step)) = playing else {
            return json!({
                "status": "idle",
                "outputtolights": outputting,
                "volume": self.volume().to_string(),
                "ip": ip,
                "time": time,
            });
        };

        let (next, next_id) = match playlist.next_step() {
            _ if playlist.is_random() => ("God knows".to_string(), String::new()),
            Some(next) => (next.name.clone(), next.id().to_string()),
            None => (String::new(), String::new()),
        };

        let scheduled = match self.foreground() {
            Some(Foreground::Scheduled(i)) => self.running_schedules().get(i),
            _ => None,
        };
        let trigger = match self.foreground() {
            Some(Foreground::Scheduled(_)) => "scheduled",
            Some(Foreground::Immediate) => "manual",
            _ => "queued",
        };
        let (schedule_name, schedule_end, schedule_id) = match scheduled {
            Some(rs) => (
                rs.schedule().name.clone(),
                rs.schedule()
                    .next_end_time(now)
                    .map_or_else(|| "N/A".to_string(), |t| t.format(TIME_FORMAT).to_string()),
                rs.schedule().id().to_string(),
            ),
            None => ("N/A".to_string(), "N/A".to_string(), "N/A".to_string()),
        };
        let loops_left = playlist.loops_left().unwrap_or(0);

        json!({
            "status": if playlist.is_paused() { "paused" } else { "playing" },
            "playlist": playlist.name_no_time(),
            "playlistid": playlist.id().to_string(),
            "playlistlooping": flag(playlist.is_looping() || loops_left > 0),
            "playlistloopsleft": loops_left.to_string(),
            "random": flag(playlist.is_random()),
            "step": step.name,
            "stepid": step.id().to_string(),
            "steplooping": flag(playlist.is_step_looping() || step.loops_left() > 0),
            "steploopsleft": step.loops_left().to_string(),
            "length": format_duration(step.length_ms()),
            "position": format_duration(step.position_ms()),
            "left": format_duration(step.length_ms().saturating_sub(step.position_ms())),
            "trigger": trigger,
            "schedulename": schedule_name,
            "scheduleend": schedule_end,
            "scheduleid": schedule_id,
            "nextstep": next,
            "nextstepid": next_id,
            "version": env!("CARGO_PKG_VERSION"),
            "queuelength": self.queue().steps().len().to_string(),
            "volume": self.volume().to_string(),
            "time": time,
            "ip": ip,
            "outputtolights": outputting,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::output::OutputManager;
    use crate::playlist::{PlayList, PlayListItem};
    use crate::schedule::PlayRequest;
    use crate::show::{Show, ShowManager};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 12, 1)
            .unwrap()
            .and_hms_opt(18, 30, 0)
            .unwrap()
    }

    fn manager() -> ScheduleManager {
        let hm = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
        let show = Show::default().with_playlist(
            PlayList::new("Carols")
                .with_step(PlayListStep::new("Silent Night").with_item(PlayListItem::delay(90_500)))
                .with_step(PlayListStep::new("Jingle Bells").with_item(PlayListItem::delay(30_000)))
                .with_schedule(Schedule::new("Evenings", hm(17), hm(23))),
        );
        ScheduleManager::new(
            Arc::new(OutputManager::new()),
            show,
            ShowManager::new(&std::env::temp_dir()),
        )
    }

    #[test]
    fn test_playlists_and_steps() {
        let manager = manager();
        let result = manager.query_at("GetPlayLists", "", "", now());
        assert!(result.success);
        assert_eq!(result.data["playlists"][0]["name"], "Carols");
        assert_eq!(result.data["playlists"][0]["length"], "2:00.500");

        let steps = manager.query_at("GetPlayListSteps", "carols", "", now());
        assert_eq!(steps.data["steps"][1]["name"], "Jingle Bells");
        assert_eq!(steps.data["steps"][0]["length"], "1:30.500");
    }

    #[test]
    fn test_missing_playlist() {
        let result = manager().query_at("GetPlayListSteps", "Nope", "", now());
        assert!(!result.success);
        assert_eq!(result.message, "Playlist 'Nope' not found.");
        assert_eq!(result.data, json!({ "steps": [] }));
    }

    #[test]
    fn test_unknown_query() {
        let result = manager().query_at("GetWeather", "", "", now());
        assert!(!result.success);
        assert_eq!(result.message, "Unknown query.");
    }

    #[test]
    fn test_schedule_reports_active() {
        let manager = manager();
        let result = manager.query_at("GetPlayListSchedule", "Carols,evenings", "", now());
        assert!(result.success, "{}", result.message);
        assert_eq!(result.data["active"], "true");
        assert_eq!(result.data["nextactive"], "NOW!");
        assert_eq!(result.data["start"], "17:00");
    }

    #[test]
    fn test_idle_status() {
        let result = manager().query_at("GetPlayingStatus", "", "10.0.0.5", now());
        assert_eq!(result.data["status"], "idle");
        assert_eq!(result.data["ip"], "10.0.0.5");
        assert_eq!(result.data["time"], "2024-12-01 18:30:00");
    }

    #[test]
    fn test_playing_status() {
        let mut manager = manager();
        manager.play_playlist("Carols", PlayRequest::default()).unwrap();

        let status = manager.query_at("GetPlayingStatus", "", "", now()).data;
        assert_eq!(status["status"], "playing");
        assert_eq!(status["step"], "Silent Night");
        assert_eq!(status["nextstep"], "Jingle Bells");
        assert_eq!(status["trigger"], "manual");
        assert_eq!(status["schedulename"], "N/A");
        assert_eq!(status["queuelength"], "0");
    }

    #[test]
    fn test_random_next_step_is_unknown() {
        let mut manager = manager();
        manager
            .play_playlist(
                "Carols",
                PlayRequest {
                    random: true,
                    ..PlayRequest::default()
                },
            )
            .unwrap();
        let status = manager.query_at("GetPlayingStatus", "", "", now()).data;
        assert_eq!(status["nextstep"], "God knows");
        assert_eq!(status["random"], "true");
    }

    #[test]
    fn test_scheduled_status() {
        let mut manager = manager();
        manager.check_schedule_at(now());
        let status = manager.query_at("GetPlayingStatus", "", "", now()).data;
        assert_eq!(status["trigger"], "scheduled");
        assert_eq!(status["schedulename"], "Evenings");
        assert_eq!(status["scheduleend"], "2024-12-01 23:00:00");
    }
}
