//! Timeline behavior across the public API: reconciliation feeding the
//! subtitle clock.

use storyreel::models::{Scene, Storyboard};
use storyreel::reconcile::reconcile_storyboard;
use storyreel::render::{generate_ass, generate_srt, SubtitleStyle};
use uuid::Uuid;

fn scene(order: usize, narration: &str, duration: f64) -> Scene {
    let mut s = Scene::new(order, narration);
    s.duration = duration;
    s
}

#[test]
fn three_scene_timeline_produces_three_cues() {
    let board = Storyboard::new(
        Uuid::new_v4(),
        vec![
            scene(0, "The opening thought.", 3.0),
            scene(1, "A second idea follows.", 4.0),
            scene(2, "And a short close.", 2.5),
        ],
    );
    assert!((board.total_duration - 9.5).abs() < 1e-9);

    let srt = generate_srt(&board.scenes);
    let cue_lines: Vec<&str> = srt
        .lines()
        .filter(|l| l.contains(" --> "))
        .collect();
    assert_eq!(cue_lines.len(), 3);
    assert_eq!(cue_lines[0], "00:00:00,000 --> 00:00:03,000");
    assert_eq!(cue_lines[1], "00:00:03,000 --> 00:00:07,000");
    assert_eq!(cue_lines[2], "00:00:07,000 --> 00:00:09,500");
}

#[test]
fn reconciled_durations_shift_later_cues() {
    let mut board = Storyboard::new(
        Uuid::new_v4(),
        vec![
            scene(0, "First line.", 3.0),
            scene(1, "Second line.", 4.0),
            scene(2, "Third line.", 2.5),
        ],
    );

    // Narration for the first scene ran long; the later cues move with it.
    let adjusted = reconcile_storyboard(&mut board, &[Some(5.0), None, None]);
    assert_eq!(adjusted, 1);
    assert!((board.total_duration - 11.5).abs() < 1e-9);

    let srt = generate_srt(&board.scenes);
    assert!(srt.contains("00:00:05,000 --> 00:00:09,000"));
    assert!(srt.contains("00:00:09,000 --> 00:00:11,500"));
}

#[test]
fn ass_track_shares_the_same_clock() {
    let board = Storyboard::new(
        Uuid::new_v4(),
        vec![
            scene(0, "First line.", 3.0),
            scene(1, "", 4.0),
            scene(2, "Third line.", 2.5),
        ],
    );

    let ass = generate_ass(&board.scenes, &SubtitleStyle::default());
    let dialogue: Vec<&str> = ass.lines().filter(|l| l.starts_with("Dialogue:")).collect();

    // The silent scene emits no cue but still advances the clock.
    assert_eq!(dialogue.len(), 2);
    assert!(dialogue[0].contains("0:00:00.00,0:00:03.00"));
    assert!(dialogue[1].contains("0:00:07.00,0:00:09.50"));
}
