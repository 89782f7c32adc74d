//! Proximity-triggered step announcements

use super::RouteStep;
use crate::config::DEFAULT_ARRIVAL_RADIUS_M;
use crate::geo::LatLng;
use crate::speech::{Utterance, tags};

/// Spoken once the last step has been announced
pub const ARRIVAL_MESSAGE: &str = "You have reached your destination.";

/// Walks a route's steps as the user approaches each step's end point
///
/// The step index only moves forward, by at most one per location update,
/// and stays within `0..=steps.len()`.
#[derive(Debug, Clone)]
pub struct ProximityEngine {
    steps: Vec<RouteStep>,
    index: usize,
    radius_m: f64,
}

impl Default for ProximityEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ARRIVAL_RADIUS_M)
    }
}

impl ProximityEngine {
    /// Engine without a route; `radius_m` is the strict trigger distance
    #[must_use]
    pub const fn new(radius_m: f64) -> Self {
        Self {
            steps: Vec::new(),
            index: 0,
            radius_m,
        }
    }

    /// Install a new route, discarding progress on any previous one
    pub fn set_route(&mut self, steps: Vec<RouteStep>) {
        tracing::debug!(steps = steps.len(), "route installed");
        self.steps = steps;
        self.index = 0;
    }

    /// Drop the route
    pub fn clear(&mut self) {
        self.steps.clear();
        self.index = 0;
    }

    /// Process one location update
    ///
    /// Returns the step instruction when the current step's end point is
    /// strictly closer than the trigger radius, followed by the arrival
    /// message if that was the last step.
    pub fn on_location(&mut self, location: LatLng) -> Vec<Utterance> {
        let Some(step) = self.steps.get(self.index) else {
            return Vec::new();
        };
        let Some(target) = step.end_point() else {
            return Vec::new();
        };

        let distance = location.distance_to(&target);
        if distance >= self.radius_m {
            tracing::trace!(step = self.index, distance, "approaching step");
            return Vec::new();
        }

        tracing::info!(
            step = self.index,
            distance,
            instruction = %step.instruction,
            "step reached"
        );
        let mut out =
            vec![Utterance::flush(step.instruction.clone()).with_tag(tags::DIRECTION_STEP)];
        self.index += 1;

        if self.index == self.steps.len() {
            tracing::info!("destination reached");
            out.push(Utterance::add(ARRIVAL_MESSAGE).with_tag(tags::ARRIVAL));
        }
        out
    }

    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn has_route(&self) -> bool {
        !self.steps.is_empty()
    }

    #[must_use]
    pub fn is_arrived(&self) -> bool {
        self.has_route() && self.index == self.steps.len()
    }

    /// Step the user is currently heading for
    #[must_use]
    pub fn current_step(&self) -> Option<&RouteStep> {
        self.steps.get(self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::QueueMode;

    fn step(text: &str, end: LatLng) -> RouteStep {
        RouteStep {
            instruction: text.to_string(),
            polyline_points: vec![end.offset_north(-500.0), end],
        }
    }

    #[test]
    fn strict_threshold_boundary() {
        let end = LatLng::new(38.5, -120.2);
        let mut engine = ProximityEngine::new(20.0);
        engine.set_route(vec![step("Turn left", end), step("Continue", end.offset_north(300.0))]);

        assert!(engine.on_location(end.offset_north(-20.1)).is_empty());
        assert_eq!(engine.current_index(), 0);

        let spoken = engine.on_location(end.offset_north(-19.9));
        assert_eq!(spoken.len(), 1);
        assert_eq!(spoken[0].text, "Turn left");
        assert_eq!(spoken[0].mode, QueueMode::Flush);
        assert_eq!(engine.current_index(), 1);
    }

    #[test]
    fn exactly_at_radius_does_not_trigger() {
        let end = LatLng::new(0.0, 0.0);
        let at = end.offset_north(20.0);
        let mut engine = ProximityEngine::new(at.distance_to(&end));
        engine.set_route(vec![step("Go", end)]);
        assert!(engine.on_location(at).is_empty());
    }

    #[test]
    fn one_step_per_update_then_arrival() {
        let end = LatLng::new(10.0, 10.0);
        let mut engine = ProximityEngine::new(20.0);
        // Both steps end at the same point
        engine.set_route(vec![step("First", end), step("Second", end)]);

        let first = engine.on_location(end);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].text, "First");

        let second = engine.on_location(end);
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].text, "Second");
        assert_eq!(second[1].text, ARRIVAL_MESSAGE);
        assert_eq!(second[1].tag, Some(tags::ARRIVAL));
        assert!(engine.is_arrived());

        assert!(engine.on_location(end).is_empty());
        assert_eq!(engine.current_index(), 2);
    }

    #[test]
    fn new_route_resets_progress() {
        let end = LatLng::new(1.0, 1.0);
        let mut engine = ProximityEngine::default();
        engine.set_route(vec![step("A", end)]);
        engine.on_location(end);
        assert!(engine.is_arrived());

        engine.set_route(vec![step("B", end), step("C", end)]);
        assert_eq!(engine.current_index(), 0);
        assert!(!engine.is_arrived());
        assert_eq!(engine.current_step().unwrap().instruction, "B");
    }

    #[test]
    fn no_route_is_inert() {
        let mut engine = ProximityEngine::default();
        assert!(engine.on_location(LatLng::new(0.0, 0.0)).is_empty());
        assert!(!engine.is_arrived());
    }
}
