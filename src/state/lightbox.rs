//! Full-screen viewer state machine
//!
//! `Closed` or `Open(Session)`. A session points at one record of the
//! active filtered view and carries the zoom/pan transform plus whatever
//! gesture is in flight. Gesture handling is a pure function of the
//! session and one [`GestureSample`]; host event delivery lives in the UI
//! adapter.

use cgmath::{MetricSpace, Point2, Vector2, Zero};

use super::data::MediaRecord;

pub const MIN_SCALE: f32 = 0.5;
pub const MAX_SCALE: f32 = 3.0;

/// Horizontal travel (pixels) a single-finger drag needs to change item
pub const SWIPE_THRESHOLD: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

/// Touch points of one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Contacts {
    One(Point2<f32>),
    Two(Point2<f32>, Point2<f32>),
}

/// One discrete input sample while the lightbox is open
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureSample {
    /// Fingers went down, or the set of fingers changed
    Start(Contacts),
    Move(Contacts),
    /// Last finger lifted
    End,
    /// Touch stream interrupted; drop the gesture without acting on it
    Cancel,
    /// Mouse wheel, positive zooms in
    Wheel(f32),
    /// Mouse drag delta in pixels
    Drag(Vector2<f32>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightboxKey {
    Escape,
    ArrowRight,
    ArrowLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum Tracking {
    #[default]
    Idle,
    Swipe {
        start_x: f32,
        last_x: f32,
    },
    Pinch {
        start_distance: f32,
        start_scale: f32,
    },
    /// A pinch lost a finger; ignore the rest until all fingers lift
    Settling,
}

/// An open lightbox
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Position in the filtered view
    pub index: usize,
    /// Record shown at `index`
    pub record_id: String,
    pub scale: f32,
    pub pan: Vector2<f32>,
    tracking: Tracking,
}

impl Session {
    fn new(record_id: String, index: usize) -> Self {
        Self {
            index,
            record_id,
            scale: 1.0,
            pan: Vector2::zero(),
            tracking: Tracking::Idle,
        }
    }

    /// Apply one gesture sample.
    ///
    /// Returns the next session and, when a swipe completed, the direction
    /// to navigate. Never performs navigation itself.
    pub fn on_gesture(&self, sample: GestureSample) -> (Session, Option<Direction>) {
        let mut next = self.clone();
        let mut swipe = None;

        match (sample, self.tracking) {
            (GestureSample::Start(Contacts::One(_)), Tracking::Pinch { .. } | Tracking::Settling) => {
                next.tracking = Tracking::Settling;
            }
            (GestureSample::Start(Contacts::One(p)), _) => {
                next.tracking = Tracking::Swipe {
                    start_x: p.x,
                    last_x: p.x,
                };
            }
            (GestureSample::Start(Contacts::Two(a, b)), _)
            | (GestureSample::Move(Contacts::Two(a, b)), Tracking::Idle | Tracking::Swipe { .. }) => {
                next.tracking = pinch_start(a, b, self.scale);
            }
            (GestureSample::Move(Contacts::One(p)), Tracking::Swipe { start_x, .. }) => {
                next.tracking = Tracking::Swipe {
                    start_x,
                    last_x: p.x,
                };
            }
            (
                GestureSample::Move(Contacts::Two(a, b)),
                Tracking::Pinch {
                    start_distance,
                    start_scale,
                },
            ) => {
                let ratio = a.distance(b) / start_distance;
                if ratio.is_finite() {
                    next.scale = clamp_scale(start_scale * ratio);
                }
            }
            (GestureSample::Move(_), _) => {}
            (GestureSample::End, Tracking::Swipe { start_x, last_x }) => {
                let dx = last_x - start_x;
                if dx < -SWIPE_THRESHOLD {
                    swipe = Some(Direction::Next);
                } else if dx > SWIPE_THRESHOLD {
                    swipe = Some(Direction::Prev);
                }
                next.tracking = Tracking::Idle;
            }
            (GestureSample::End | GestureSample::Cancel, _) => {
                next.tracking = Tracking::Idle;
            }
            (GestureSample::Wheel(delta), _) => {
                if delta.is_finite() {
                    next.scale = clamp_scale(self.scale + delta);
                }
            }
            (GestureSample::Drag(delta), _) => {
                next.pan += delta;
            }
        }

        (next, swipe)
    }
}

fn pinch_start(a: Point2<f32>, b: Point2<f32>, scale: f32) -> Tracking {
    let start_distance = a.distance(b);
    if start_distance > f32::EPSILON {
        Tracking::Pinch {
            start_distance,
            start_scale: scale,
        }
    } else {
        // Coincident fingers give no usable ratio
        Tracking::Idle
    }
}

pub fn clamp_scale(scale: f32) -> f32 {
    scale.clamp(MIN_SCALE, MAX_SCALE)
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum LightboxState {
    #[default]
    Closed,
    Open(Session),
}

/// Owns the lightbox state and applies transitions against the active
/// filtered view
#[derive(Debug, Default)]
pub struct LightboxController {
    state: LightboxState,
}

impl LightboxController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &LightboxState {
        &self.state
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            LightboxState::Open(session) => Some(session),
            LightboxState::Closed => None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.session().is_some()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.session().map(|s| s.index)
    }

    pub fn current_id(&self) -> Option<&str> {
        self.session().map(|s| s.record_id.as_str())
    }

    /// Open `record`, shown at `index` of the active view, at 1x with no pan
    pub fn open(&mut self, record: &MediaRecord, index: usize) {
        self.state = LightboxState::Open(Session::new(record.id.clone(), index));
    }

    pub fn close(&mut self) {
        self.state = LightboxState::Closed;
    }

    /// Move one step with wrap-around. Zoom and pan reset on every move.
    ///
    /// Closes instead when the view has become empty. Returns whether the
    /// lightbox is still open.
    pub fn navigate(&mut self, direction: Direction, view: &[&MediaRecord]) -> bool {
        let Some(session) = self.session() else {
            return false;
        };
        let len = view.len();
        if len == 0 {
            self.close();
            return false;
        }

        let current = session.index.min(len - 1);
        let index = match direction {
            Direction::Next => (current + 1) % len,
            Direction::Prev => (current + len - 1) % len,
        };
        self.state = LightboxState::Open(Session::new(view[index].id.clone(), index));
        true
    }

    /// Feed one gesture sample; a completed swipe navigates
    pub fn on_gesture(&mut self, sample: GestureSample, view: &[&MediaRecord]) {
        let LightboxState::Open(session) = &self.state else {
            return;
        };
        let (next, swipe) = session.on_gesture(sample);
        self.state = LightboxState::Open(next);
        if let Some(direction) = swipe {
            self.navigate(direction, view);
        }
    }

    /// Keyboard control; no-op while closed
    pub fn on_key(&mut self, key: LightboxKey, view: &[&MediaRecord]) {
        if !self.is_open() {
            return;
        }
        match key {
            LightboxKey::Escape => self.close(),
            LightboxKey::ArrowRight => {
                self.navigate(Direction::Next, view);
            }
            LightboxKey::ArrowLeft => {
                self.navigate(Direction::Prev, view);
            }
        }
    }

    /// Re-anchor after the view changed underneath an open session.
    ///
    /// Follows the shown record if it is still in the view, otherwise
    /// clamps the index to the new last element. Closes on an empty view.
    pub fn reconcile(&mut self, view: &[&MediaRecord]) {
        let LightboxState::Open(session) = &mut self.state else {
            return;
        };
        if view.is_empty() {
            self.state = LightboxState::Closed;
            return;
        }
        if let Some(pos) = view.iter().position(|r| r.id == session.record_id) {
            session.index = pos;
            return;
        }
        let index = session.index.min(view.len() - 1);
        *session = Session::new(view[index].id.clone(), index);
    }
}
