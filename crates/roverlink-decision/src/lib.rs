//! `roverlink-decision` – The Reflex Layer.
//!
//! Turns one sensor snapshot into one motion command.  There is no memory
//! between calls: the same snapshot always yields the same command.
//!
//! # Modules
//!
//! - [`engine`] – [`DecisionEngine`][engine::DecisionEngine]: evaluates an
//!   ordered list of [`Rule`][engine::Rule]s, each producing a
//!   [`CommandPatch`][engine::CommandPatch] that is applied on top of the
//!   previous rules' output.  Later rules win on conflict.
//!
//! # Standard rule order
//!
//! | # | Rule | Effect |
//! |---|---|---|
//! | 1 | [`ObstacleRule`] | `< 15 cm` → stop, `< 30 cm` → slow down |
//! | 2 | [`LineFollowRule`] | steer back onto the line for the two known drift patterns |
//! | 3 | [`ColorRule`] | red → grab object, green → continue |
//! | 4 | [`BatteryRule`] | `< 20 %` → return to base |

pub mod engine;

pub use engine::{
    BatteryRule, ColorRule, CommandPatch, DecisionEngine, LineFollowRule, ObstacleRule, Rule,
    decide,
};
