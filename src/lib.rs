//! Sense8 - voice-guided object detection and navigation
//!
//! This library provides the core of the Sense8 assistant:
//! - Object detection with spoken announcements of what changed
//! - Turn-by-turn navigation with proximity-triggered instructions
//! - A persistent voice command router for switching between them
//!
//! # Architecture
//!
//! Platform capabilities (camera, detector, microphone and speech-to-text,
//! text-to-speech, GPS, maps) sit behind traits and are handed to the
//! [`Daemon`] as [`Backends`]. The daemon owns the voice command router, the
//! [`ScreenRouter`] and the speech queue. Each command that switches screens
//! tears down the running pipeline and starts the next one: the detection
//! pipeline runs the analyzer into the announcer, and the navigation session
//! geocodes the destination, fetches a route and feeds GPS fixes to the
//! proximity engine.

pub mod app;
pub mod audio;
pub mod config;
pub mod daemon;
pub mod db;
pub mod detection;
pub mod error;
pub mod geo;
pub mod navigation;
pub mod permissions;
pub mod polyline;
pub mod preferences;
pub mod speech;
pub mod voice;

pub use app::{Screen, ScreenRouter};
pub use config::Config;
pub use daemon::{Backends, Daemon};
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use geo::LatLng;
