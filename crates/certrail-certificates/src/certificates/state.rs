//! Certificate lifecycle transitions.
//!
//! ```text
//! reset:       verified | issued | broken -> unverified
//! verify:      unverified                 -> verified
//! issue:       verified                   -> issued
//! mark_broken: any                        -> broken
//! ```
//!
//! `reset` on an already unverified record is accepted and changes nothing.

use serde::Serialize;
use std::fmt;

use super::errors::CertificateError;
use super::models::CertificateStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateEvent {
    Reset,
    Verify,
    Issue,
    MarkBroken,
}

impl fmt::Display for StateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StateEvent::Reset => "reset",
            StateEvent::Verify => "verify",
            StateEvent::Issue => "issue",
            StateEvent::MarkBroken => "mark_broken",
        };
        f.write_str(name)
    }
}

impl CertificateStatus {
    pub fn transition(self, event: StateEvent) -> Result<CertificateStatus, CertificateError> {
        use CertificateStatus::*;

        match (self, event) {
            (_, StateEvent::Reset) => Ok(Unverified),
            (Unverified, StateEvent::Verify) => Ok(Verified),
            (Verified, StateEvent::Issue) => Ok(Issued),
            (_, StateEvent::MarkBroken) => Ok(Broken),
            (from, event) => Err(CertificateError::InvalidStateTransition { from, event }),
        }
    }

    pub fn can(self, event: StateEvent) -> bool {
        self.transition(event).is_ok()
    }
}
