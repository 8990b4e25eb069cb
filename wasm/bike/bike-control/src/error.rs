use std::fmt;

use thiserror::Error;

/// A handle the control loop reads from or writes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RigPart {
    Crank,
    RearWheel,
    FrontWheel,
    HandlebarProxy,
    Handlebars,
    RightFootTarget,
    LeftFootTarget,
    RightFootPop,
    LeftFootPop,
}

impl fmt::Display for RigPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RigPart::Crank => "crank",
            RigPart::RearWheel => "rear wheel",
            RigPart::FrontWheel => "front wheel",
            RigPart::HandlebarProxy => "handlebar proxy",
            RigPart::Handlebars => "handlebars",
            RigPart::RightFootTarget => "right foot target",
            RigPart::LeftFootTarget => "left foot target",
            RigPart::RightFootPop => "right foot pop",
            RigPart::LeftFootPop => "left foot pop",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RigFault {
    #[error("{0} is not attached to the rig")]
    Missing(RigPart),
    #[error("{0} no longer resolves in the physics world")]
    Stale(RigPart),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid bike config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{field} must be finite and in range, got {value}")]
    OutOfRange { field: &'static str, value: f32 },
}

/// Why a tick was skipped.
#[derive(Debug, Error, PartialEq)]
pub enum TickError {
    #[error("rig not ready: {0}")]
    NotReady(RigFault),
    #[error("rig rejected write: {0}")]
    Apply(RigFault),
}
