/*
 * report.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Postino, an embeddable mail submission and retrieval engine.
 *
 * Postino is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Postino is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Postino.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Synchronous status reporting invoked by both engines at defined checkpoints.

/// Where in the session an event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connect,
    Identify,
    Authenticate,
    Login,
    List,
    Select,
    Search,
    Header,
    Body,
    Attachment,
    Download,
    Finalize,
    Logout,
}

/// One status checkpoint: free text, phase tag, and whether the step
/// succeeded so far.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub info: String,
    pub phase: Phase,
    pub success: bool,
}

impl StatusEvent {
    pub fn ok(phase: Phase, info: impl Into<String>) -> Self {
        Self {
            info: info.into(),
            phase,
            success: true,
        }
    }

    pub fn failed(phase: Phase, info: impl Into<String>) -> Self {
        Self {
            info: info.into(),
            phase,
            success: false,
        }
    }
}

/// Injected status sink. Called synchronously; implementations must not block.
pub trait Reporter {
    fn status(&mut self, _event: StatusEvent) {}
}

/// Reporter that discards everything.
pub struct NullReporter;

impl Reporter for NullReporter {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_constructors_set_success() {
        let e = StatusEvent::ok(Phase::Connect, "connected");
        assert!(e.success);
        assert_eq!(e.phase, Phase::Connect);
        let e = StatusEvent::failed(Phase::Search, "no results");
        assert!(!e.success);
    }
}
