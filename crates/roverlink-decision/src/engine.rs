//! [`DecisionEngine`] – ordered, stateless rule pipeline.
//!
//! Every registered [`Rule`] is evaluated against the snapshot, in insertion
//! order, on every call.  Each rule returns a [`CommandPatch`]; the patch is
//! applied to a draft [`Command`] that starts at [`Command::default`]
//! (continue, speed 100, forward).  A field written by a later rule replaces
//! the value written by an earlier one, so with the standard pipeline a red
//! object overrides an obstacle stop and a low battery overrides everything.

use roverlink_types::{Action, Command, Heading, SensorSnapshot};

// ────────────────────────────────────────────────────────────────────────────
// Rule trait
// ────────────────────────────────────────────────────────────────────────────

/// A single reactive rule.
///
/// Implementations must be pure: the patch may depend on nothing but the
/// snapshot.
pub trait Rule: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Compute the fields this rule wants to set for `snapshot`.
    fn evaluate(&self, snapshot: &SensorSnapshot) -> CommandPatch;
}

/// Partial command: every `Some` field overwrites the draft's value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandPatch {
    pub action: Option<Action>,
    pub speed: Option<u8>,
    pub heading: Option<Heading>,
    pub turn: Option<u8>,
    pub alert: Option<String>,
    pub message: Option<String>,
}

impl CommandPatch {
    /// Patch that changes nothing.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Write every `Some` field into `draft`.
    pub fn apply(self, draft: &mut Command) {
        if let Some(action) = self.action {
            draft.action = action;
        }
        if let Some(speed) = self.speed {
            draft.speed = speed;
        }
        if let Some(heading) = self.heading {
            draft.heading = heading;
        }
        if self.turn.is_some() {
            draft.turn = self.turn;
        }
        if self.alert.is_some() {
            draft.alert = self.alert;
        }
        if self.message.is_some() {
            draft.message = self.message;
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// DecisionEngine
// ────────────────────────────────────────────────────────────────────────────

/// Evaluates registered [`Rule`]s in order and folds their patches into a
/// [`Command`].
///
/// # Example
///
/// ```
/// use roverlink_decision::DecisionEngine;
/// use roverlink_types::{Action, SensorSnapshot};
///
/// let engine = DecisionEngine::standard();
/// let snapshot = SensorSnapshot { distance: 10.0, ..SensorSnapshot::default() };
///
/// let cmd = engine.decide(&snapshot);
/// assert_eq!(cmd.action, Action::Stop);
/// assert_eq!(cmd.speed, 0);
/// ```
pub struct DecisionEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl DecisionEngine {
    /// Create an engine with no rules; it always returns [`Command::default`].
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Obstacle → line following → colour → battery, with the default
    /// thresholds.
    pub fn standard() -> Self {
        let mut engine = Self::new();
        engine.add_rule(Box::new(ObstacleRule::default()));
        engine.add_rule(Box::new(LineFollowRule::default()));
        engine.add_rule(Box::new(ColorRule));
        engine.add_rule(Box::new(BatteryRule::default()));
        engine
    }

    /// Register a new [`Rule`].  Rules are evaluated in insertion order.
    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// Names of the registered rules, in evaluation order.
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Compute the command for `snapshot`.
    pub fn decide(&self, snapshot: &SensorSnapshot) -> Command {
        let mut draft = Command::default();
        for rule in &self.rules {
            rule.evaluate(snapshot).apply(&mut draft);
        }
        draft
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::standard()
    }
}

/// Run the [standard](DecisionEngine::standard) pipeline once.
pub fn decide(snapshot: &SensorSnapshot) -> Command {
    DecisionEngine::standard().decide(snapshot)
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in rules
// ────────────────────────────────────────────────────────────────────────────

/// Stops in front of close obstacles and slows down near them.
pub struct ObstacleRule {
    /// Below this distance (cm) the robot stops.
    pub stop_below_cm: f64,
    /// Below this distance (cm) the robot slows down.
    pub slow_below_cm: f64,
    /// Speed used while slowing down.
    pub slow_speed: u8,
}

impl Default for ObstacleRule {
    fn default() -> Self {
        Self {
            stop_below_cm: 15.0,
            slow_below_cm: 30.0,
            slow_speed: 50,
        }
    }
}

impl Rule for ObstacleRule {
    fn name(&self) -> &str {
        "obstacle"
    }

    fn evaluate(&self, snapshot: &SensorSnapshot) -> CommandPatch {
        if snapshot.distance < self.stop_below_cm {
            CommandPatch {
                action: Some(Action::Stop),
                speed: Some(0),
                alert: Some("Obstacle detected".to_string()),
                ..CommandPatch::none()
            }
        } else if snapshot.distance < self.slow_below_cm {
            CommandPatch {
                action: Some(Action::SlowDown),
                speed: Some(self.slow_speed),
                ..CommandPatch::none()
            }
        } else {
            CommandPatch::none()
        }
    }
}

/// Steers back onto the line for the three patterns a 4-cell sensor reports
/// while following a line.  Any other reading leaves the heading alone.
pub struct LineFollowRule {
    /// Correction applied when the robot has drifted, in degrees.
    pub turn_deg: u8,
}

impl Default for LineFollowRule {
    fn default() -> Self {
        Self { turn_deg: 15 }
    }
}

const LINE_CENTERED: [f64; 4] = [0.0, 1.0, 1.0, 0.0];
const LINE_DRIFTED_LEFT: [f64; 4] = [1.0, 1.0, 0.0, 0.0];
const LINE_DRIFTED_RIGHT: [f64; 4] = [0.0, 0.0, 1.0, 1.0];

impl Rule for LineFollowRule {
    fn name(&self) -> &str {
        "line_follow"
    }

    fn evaluate(&self, snapshot: &SensorSnapshot) -> CommandPatch {
        let reading = snapshot.line_sensor.as_slice();
        if reading == LINE_CENTERED {
            CommandPatch {
                heading: Some(Heading::Forward),
                ..CommandPatch::none()
            }
        } else if reading == LINE_DRIFTED_LEFT {
            CommandPatch {
                heading: Some(Heading::Right),
                turn: Some(self.turn_deg),
                ..CommandPatch::none()
            }
        } else if reading == LINE_DRIFTED_RIGHT {
            CommandPatch {
                heading: Some(Heading::Left),
                turn: Some(self.turn_deg),
                ..CommandPatch::none()
            }
        } else {
            CommandPatch::none()
        }
    }
}

/// Reacts to coloured markers: red objects are grabbed, green marks a safe
/// zone.  Either overrides the obstacle rule's action.
pub struct ColorRule;

impl Rule for ColorRule {
    fn name(&self) -> &str {
        "color"
    }

    fn evaluate(&self, snapshot: &SensorSnapshot) -> CommandPatch {
        match snapshot.color_detected.as_deref() {
            Some("red" | "rojo") => CommandPatch {
                action: Some(Action::GrabObject),
                message: Some("Red object detected - activating gripper".to_string()),
                ..CommandPatch::none()
            },
            Some("green" | "verde") => CommandPatch {
                action: Some(Action::Continue),
                message: Some("Safe zone".to_string()),
                ..CommandPatch::none()
            },
            _ => CommandPatch::none(),
        }
    }
}

/// Sends the robot home when its battery runs low.  Evaluated last so it
/// overrides every other action.
pub struct BatteryRule {
    /// Below this level (percent) the robot returns to base.
    pub return_below: f64,
}

impl Default for BatteryRule {
    fn default() -> Self {
        Self { return_below: 20.0 }
    }
}

impl Rule for BatteryRule {
    fn name(&self) -> &str {
        "battery"
    }

    fn evaluate(&self, snapshot: &SensorSnapshot) -> CommandPatch {
        if snapshot.battery < self.return_below {
            CommandPatch {
                action: Some(Action::ReturnToBase),
                alert: Some("Low battery - returning to base".to_string()),
                ..CommandPatch::none()
            }
        } else {
            CommandPatch::none()
        }
    }
}
