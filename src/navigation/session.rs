//! Navigation screen state
//!
//! [`NavigationSession`] is the single writer for the current location,
//! destination, route and step index. Inputs arrive as messages; readers
//! observe [`NavigationSnapshot`]s.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::{Directions, DirectionsProvider, Geocoder, ProximityEngine};
use crate::geo::LatLng;
use crate::speech::{SpeechQueue, tags};

/// Spoken navigation messages
pub mod messages {
    pub const PROMPT_DESTINATION: &str = "Where would you like to go?";
    pub const LOCATION_NOT_FOUND: &str = "Location not found. Please try again.";
    pub const WAITING_FOR_LOCATION: &str = "Waiting for your location. Please try again.";
    pub const NO_ROUTE: &str = "Unable to fetch directions. Please try again.";
    pub const DIRECTIONS_ERROR: &str =
        "An error occurred while fetching directions. Please try again.";

    #[must_use]
    pub fn searching(destination: &str) -> String {
        format!("Searching for {destination}")
    }

    #[must_use]
    pub fn found(destination: &str) -> String {
        format!("Found {destination}. Calculating route.")
    }

    #[must_use]
    pub fn route_ready(eta: &str) -> String {
        format!("Your route is ready. The estimated time of arrival is {eta}.")
    }
}

/// Message applied by the session owner
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    Location(LatLng),
    /// Spoken destination name
    Destination(String),
}

/// Read-only copy of the session state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigationSnapshot {
    pub current_location: Option<LatLng>,
    pub destination_name: Option<String>,
    pub destination: Option<LatLng>,
    pub route: Option<Directions>,
    pub current_step_index: usize,
    pub arrived: bool,
}

/// Owns navigation state for one navigation screen
pub struct NavigationSession {
    geocoder: Arc<dyn Geocoder>,
    directions: Arc<dyn DirectionsProvider>,
    speech: SpeechQueue,
    engine: ProximityEngine,
    state: NavigationSnapshot,
    snapshot: watch::Sender<NavigationSnapshot>,
}

impl NavigationSession {
    #[must_use]
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        directions: Arc<dyn DirectionsProvider>,
        speech: SpeechQueue,
        arrival_radius_m: f64,
    ) -> Self {
        let (snapshot, _rx) = watch::channel(NavigationSnapshot::default());
        Self {
            geocoder,
            directions,
            speech,
            engine: ProximityEngine::new(arrival_radius_m),
            state: NavigationSnapshot::default(),
            snapshot,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<NavigationSnapshot> {
        self.snapshot.subscribe()
    }

    #[must_use]
    pub const fn state(&self) -> &NavigationSnapshot {
        &self.state
    }

    /// Apply inputs until every sender is dropped
    pub async fn run(mut self, mut inputs: mpsc::Receiver<SessionInput>) -> NavigationSnapshot {
        while let Some(input) = inputs.recv().await {
            self.handle(input).await;
        }
        self.state
    }

    pub async fn handle(&mut self, input: SessionInput) {
        match input {
            SessionInput::Location(location) => self.on_location(location),
            SessionInput::Destination(name) => self.on_destination(&name).await,
        }
    }

    /// Record a fix and advance the route if a step was reached
    pub fn on_location(&mut self, location: LatLng) {
        self.state.current_location = Some(location);

        for utterance in self.engine.on_location(location) {
            self.speech.speak(utterance);
        }
        self.state.current_step_index = self.engine.current_index();
        self.state.arrived = self.engine.is_arrived();
        self.publish();
    }

    /// Resolve a spoken destination and install a route to it
    pub async fn on_destination(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }

        self.speech.flush(messages::searching(name), tags::SEARCHING_LOCATION);

        let Some(origin) = self.state.current_location else {
            tracing::info!(destination = name, "no location fix yet");
            self.speech.flush(messages::WAITING_FOR_LOCATION, tags::UNAVAILABLE);
            return;
        };

        let destination = match self.geocoder.geocode(name).await {
            Ok(Some(destination)) => destination,
            Ok(None) => {
                tracing::info!(destination = name, "destination not found");
                self.speech.flush(messages::LOCATION_NOT_FOUND, tags::LOCATION_NOT_FOUND);
                self.clear_destination();
                return;
            }
            Err(e) => {
                tracing::warn!(destination = name, error = %e, "geocoding failed");
                self.speech.flush(messages::LOCATION_NOT_FOUND, tags::LOCATION_NOT_FOUND);
                self.clear_destination();
                return;
            }
        };

        self.speech.flush(messages::found(name), tags::LOCATION_FOUND);
        self.state.destination_name = Some(name.to_string());
        self.state.destination = Some(destination);
        self.publish();

        match self.directions.fetch(origin, destination).await {
            Ok(Some(directions)) => {
                self.speech.flush(messages::route_ready(&directions.eta), tags::ROUTE_READY);
                self.engine.set_route(directions.steps.clone());
                self.state.route = Some(directions);
                self.state.current_step_index = self.engine.current_index();
                self.state.arrived = false;
                self.publish();
            }
            Ok(None) => {
                tracing::info!(%origin, %destination, "no route");
                self.speech.flush(messages::NO_ROUTE, tags::DIRECTIONS_ERROR);
                self.clear_destination();
            }
            Err(e) => {
                tracing::warn!(error = %e, "directions fetch failed");
                self.speech.flush(messages::DIRECTIONS_ERROR, tags::DIRECTIONS_ERROR);
                self.clear_destination();
            }
        }
    }

    /// Drop the destination and any route to it, keeping the last fix
    fn clear_destination(&mut self) {
        self.engine.clear();
        self.state.destination_name = None;
        self.state.destination = None;
        self.state.route = None;
        self.state.current_step_index = 0;
        self.state.arrived = false;
        self.publish();
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_formats() {
        assert_eq!(messages::searching("the park"), "Searching for the park");
        assert_eq!(
            messages::found("the park"),
            "Found the park. Calculating route."
        );
        assert_eq!(
            messages::route_ready("5 mins"),
            "Your route is ready. The estimated time of arrival is 5 mins."
        );
    }
}
