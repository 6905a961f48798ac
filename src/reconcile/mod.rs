//! Planned-vs-actual duration reconciliation.
//!
//! Video and subtitle timing must track the narration audio exactly, but
//! re-rendering a clip for negligible drift is wasted work; a 10% tolerance
//! band absorbs synthesis jitter without cascading re-renders.

use crate::models::{Scene, Storyboard};
use tracing::info;

/// Fraction of the planned duration the measured audio may drift before the
/// plan is replaced.
pub const DURATION_TOLERANCE: f64 = 0.1;

/// Adopt the measured duration iff it drifts outside the tolerance band.
/// Returns true when the scene duration changed.
pub fn reconcile_scene(scene: &mut Scene, measured: f64) -> bool {
    if measured <= 0.0 {
        return false;
    }

    if (measured - scene.duration).abs() > scene.duration * DURATION_TOLERANCE {
        info!(
            "Scene {}: adjusting duration {:.2}s -> {:.2}s to match audio",
            scene.order, scene.duration, measured
        );
        scene.duration = measured;
        return true;
    }

    false
}

/// Reconcile every scene that has a measured duration, then recompute the
/// storyboard total.
///
/// `measured` is indexed by scene order; `None` marks scenes whose synthesis
/// failed or produced no measurement.
pub fn reconcile_storyboard(storyboard: &mut Storyboard, measured: &[Option<f64>]) -> usize {
    let mut adjusted = 0;

    for scene in storyboard.scenes.iter_mut() {
        if let Some(Some(actual)) = measured.get(scene.order) {
            if reconcile_scene(scene, *actual) {
                adjusted += 1;
            }
        }
    }

    storyboard.calculate_duration();
    storyboard.touch();
    adjusted
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scene(order: usize, duration: f64) -> Scene {
        let mut s = Scene::new(order, format!("scene {order}"));
        s.duration = duration;
        s
    }

    #[test]
    fn adoption_band_around_five_seconds() {
        // planned 5.0 → band is ±0.5: adopt 4.0 and 6.0, keep 4.6 and 5.4.
        for (actual, expect_adopted) in [(4.0, true), (4.6, false), (5.4, false), (6.0, true)] {
            let mut s = scene(0, 5.0);
            let changed = reconcile_scene(&mut s, actual);
            assert_eq!(changed, expect_adopted, "actual={actual}");
            let expected = if expect_adopted { actual } else { 5.0 };
            assert!((s.duration - expected).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn zero_measurement_is_ignored() {
        let mut s = scene(0, 5.0);
        assert!(!reconcile_scene(&mut s, 0.0));
        assert!((s.duration - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn storyboard_total_recomputed_after_reconcile() {
        let mut board = Storyboard::new(
            Uuid::new_v4(),
            vec![scene(0, 3.0), scene(1, 4.0), scene(2, 2.5)],
        );
        assert!((board.total_duration - 9.5).abs() < 1e-9);

        // Scene 1 drifts well outside the band; scene 2 stays inside it.
        let adjusted = reconcile_storyboard(&mut board, &[None, Some(6.0), Some(2.4)]);
        assert_eq!(adjusted, 1);
        assert!((board.scenes[1].duration - 6.0).abs() < f64::EPSILON);
        assert!((board.scenes[2].duration - 2.5).abs() < f64::EPSILON);
        assert!((board.total_duration - 11.5).abs() < 1e-9);
    }
}
