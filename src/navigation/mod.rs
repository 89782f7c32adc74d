//! Turn-by-turn navigation
//!
//! A spoken destination is geocoded, a route is fetched and decoded, and the
//! [`ProximityEngine`] speaks each step as the location stream reaches it.

mod directions;
mod engine;
mod geocode;
mod location;
mod session;

pub use directions::{
    Directions, DirectionsClient, DirectionsProvider, RouteStep, parse_directions,
    strip_html_tags,
};
pub use engine::{ARRIVAL_MESSAGE, ProximityEngine};
pub use geocode::{Geocoder, GoogleGeocoder, parse_geocode};
pub use location::{LocationSource, ReplayLocationSource, parse_fixes};
pub use session::{NavigationSession, NavigationSnapshot, SessionInput, messages};
