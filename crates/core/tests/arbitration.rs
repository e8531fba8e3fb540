mod common;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use marquee_core::playlist::{PlayList, PlayListItem, PlayListStep};
use marquee_core::schedule::{Foreground, PlayRequest, Schedule};
use marquee_core::show::Show;

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 12, 14)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn hm(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, 0, 0).unwrap()
}

fn playlist(name: &str, value: u8, duration_ms: u64) -> PlayList {
    PlayList::new(name).with_step(
        PlayListStep::new(name).with_item(PlayListItem::fill(1, 2, vec![value], duration_ms)),
    )
}

fn running_name(manager: &marquee_core::ScheduleManager) -> Option<String> {
    manager
        .running_playlist()
        .map(|p| p.name_no_time().to_string())
}

#[test]
fn immediate_play_suspends_schedule_then_hands_back() {
    let show = Show::default()
        .with_playlist(
            playlist("Evening", 3, 3_600_000)
                .with_schedule(Schedule::new("Evening", hm(17), hm(23)).with_priority(2)),
        )
        .with_playlist(playlist("Fanfare", 7, 100));
    let (outputs, _logs) = common::recorded_outputs(&[2]);
    let mut manager = common::schedule_manager(outputs, show);

    manager.check_schedule_at(at(18, 0));
    assert_eq!(running_name(&manager).as_deref(), Some("Evening"));

    manager.play_playlist("Fanfare", PlayRequest::default()).unwrap();
    manager.check_schedule_at(at(18, 0));
    assert_eq!(manager.foreground(), Some(Foreground::Immediate));
    assert!(manager.running_schedules()[0].playlist().is_suspended());

    manager.frame(true);
    assert_eq!(manager.buffer(), &[7, 7]);
    // 100ms of content at 50ms frames
    manager.frame(true);
    assert!(manager.immediate().is_none());

    manager.check_schedule_at(at(18, 1));
    assert_eq!(manager.foreground(), Some(Foreground::Scheduled(0)));
    assert!(!manager.running_schedules()[0].playlist().is_suspended());
    manager.frame(true);
    assert_eq!(manager.buffer(), &[3, 3]);
}

#[test]
fn queue_takes_over_until_drained() {
    let show = Show::default()
        .with_playlist(
            playlist("Evening", 3, 3_600_000).with_schedule(Schedule::new("Evening", hm(17), hm(23))),
        )
        .with_playlist(playlist("Request", 9, 50));
    let (outputs, _logs) = common::recorded_outputs(&[2]);
    let mut manager = common::schedule_manager(outputs, show);

    manager.check_schedule_at(at(19, 0));
    manager.enqueue_step("Request", "Request").unwrap();
    manager.check_schedule_at(at(19, 0));
    assert_eq!(manager.foreground(), Some(Foreground::Queue));

    manager.frame(true);
    assert_eq!(manager.buffer(), &[9, 9]);
    manager.check_schedule_at(at(19, 0));
    assert_eq!(manager.foreground(), Some(Foreground::Scheduled(0)));
}

#[test]
fn equal_priorities_keep_discovery_order() {
    let show = Show::default()
        .with_playlist(playlist("First", 1, 3_600_000).with_schedule(Schedule::new("A", hm(17), hm(23))))
        .with_playlist(playlist("Second", 2, 3_600_000).with_schedule(Schedule::new("B", hm(17), hm(23))))
        .with_playlist(playlist("Third", 3, 3_600_000).with_schedule(Schedule::new("C", hm(17), hm(23))));
    let (outputs, _logs) = common::recorded_outputs(&[2]);
    let mut manager = common::schedule_manager(outputs, show);

    for minute in 0..5 {
        manager.check_schedule_at(at(18, minute));
        let order: Vec<&str> = manager
            .running_schedules()
            .iter()
            .map(|rs| rs.schedule().name.as_str())
            .collect();
        assert_eq!(order, vec!["A", "B", "C"]);
        assert_eq!(running_name(&manager).as_deref(), Some("First"));
    }
}

#[test]
fn later_higher_priority_schedule_preempts() {
    let show = Show::default()
        .with_playlist(playlist("Background music", 1, 3_600_000).with_schedule(Schedule::new("All evening", hm(17), hm(23))))
        .with_playlist(
            playlist("Show", 2, 3_600_000)
                .with_schedule(Schedule::new("Main show", hm(19), hm(20)).with_priority(5)),
        );
    let (outputs, _logs) = common::recorded_outputs(&[2]);
    let mut manager = common::schedule_manager(outputs, show);

    manager.check_schedule_at(at(18, 30));
    assert_eq!(running_name(&manager).as_deref(), Some("Background music"));

    manager.check_schedule_at(at(19, 0));
    assert_eq!(running_name(&manager).as_deref(), Some("Show"));
    assert!(manager.running_schedules()[1].playlist().is_suspended());

    // The show's window closes: it finishes its step, then music resumes
    manager.check_schedule_at(at(20, 0));
    assert!(manager.running_schedules()[0].playlist().is_finishing_up());
    manager.stop_playlist(manager.running_schedules()[0].playlist().id(), false);
    manager.check_schedule_at(at(20, 1));
    assert_eq!(running_name(&manager).as_deref(), Some("Background music"));
}

#[test]
fn expired_schedule_plays_end_step_after_preemption() {
    let mut evening = PlayList::new("Evening")
        .with_step(PlayListStep::new("Carols").with_item(PlayListItem::fill(1, 2, vec![3], 100)))
        .with_step(PlayListStep::new("Goodnight").with_item(PlayListItem::fill(1, 2, vec![4], 100)))
        .with_schedule(Schedule::new("Evening", hm(17), hm(22)));
    evening.last_once = true;
    let show = Show::default()
        .with_playlist(evening)
        .with_playlist(playlist("Fanfare", 7, 100));
    let (outputs, _logs) = common::recorded_outputs(&[2]);
    let mut manager = common::schedule_manager(outputs, show);

    manager.check_schedule_at(at(21, 0));
    manager.frame(true);
    assert_eq!(manager.buffer(), &[3, 3]);

    manager.check_schedule_at(at(22, 0));
    assert!(manager.running_schedules()[0].playlist().is_finishing_up());

    manager.play_playlist("Fanfare", PlayRequest::default()).unwrap();
    manager.check_schedule_at(at(22, 0));
    let evening = manager.running_schedules()[0].playlist();
    assert!(evening.is_suspended());
    assert!(evening.is_finishing_up());

    manager.frame(true);
    manager.frame(true);
    assert!(manager.immediate().is_none());

    // Picks up where it was suspended, then plays the held back end step
    manager.check_schedule_at(at(22, 1));
    assert_eq!(manager.foreground(), Some(Foreground::Scheduled(0)));
    manager.frame(true);
    assert_eq!(manager.buffer(), &[3, 3]);
    manager.frame(true);
    assert_eq!(manager.buffer(), &[4, 4]);
    manager.frame(true);
    assert_eq!(manager.buffer(), &[4, 4]);

    manager.check_schedule_at(at(22, 2));
    assert!(manager.running_schedules().is_empty());
}
