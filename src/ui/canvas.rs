use cgmath::{Point2, Vector2};
use iced::mouse::{self, Cursor};
use iced::touch;
use iced::widget::canvas::{self, Program};
use iced::{Point, Rectangle, Renderer, Theme};

use matchday_gallery::state::lightbox::{Contacts, GestureSample};

use crate::Message;

/// Transparent layer over the lightbox media that turns touch and mouse
/// input into gesture samples
pub struct GestureLayer {
    /// Zoomed in: mouse drags pan instead of swiping
    pub zoomed: bool,
}

/// Contacts currently down on this layer
#[derive(Debug, Clone, Default)]
pub struct GestureState {
    fingers: Vec<(touch::Finger, Point)>,
    mouse: Option<Point>,
}

impl GestureState {
    fn contacts(&self) -> Option<Contacts> {
        match self.fingers.as_slice() {
            [] => None,
            [(_, a)] => Some(Contacts::One(to_point(*a))),
            [(_, a), (_, b), ..] => Some(Contacts::Two(to_point(*a), to_point(*b))),
        }
    }

    fn tracks(&self, id: touch::Finger) -> Option<usize> {
        self.fingers.iter().position(|(f, _)| *f == id)
    }
}

fn to_point(p: Point) -> Point2<f32> {
    Point2::new(p.x, p.y)
}

fn captured(sample: Option<GestureSample>) -> (canvas::event::Status, Option<Message>) {
    (canvas::event::Status::Captured, sample.map(Message::Gesture))
}

impl Program<Message> for GestureLayer {
    type State = GestureState;

    fn draw(
        &self,
        _state: &Self::State,
        _renderer: &Renderer,
        _theme: &Theme,
        _bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        vec![]
    }

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        match event {
            canvas::Event::Touch(touch::Event::FingerPressed { id, position }) => {
                state.fingers.push((id, position));
                // A third finger does not change the gesture
                if state.fingers.len() <= 2 {
                    return captured(state.contacts().map(GestureSample::Start));
                }
                return captured(None);
            }

            canvas::Event::Touch(touch::Event::FingerMoved { id, position }) => {
                if let Some(i) = state.tracks(id) {
                    state.fingers[i].1 = position;
                    if i < 2 {
                        return captured(state.contacts().map(GestureSample::Move));
                    }
                }
                return captured(None);
            }

            canvas::Event::Touch(touch::Event::FingerLifted { id, .. }) => {
                let Some(i) = state.tracks(id) else {
                    return (canvas::event::Status::Ignored, None);
                };
                state.fingers.remove(i);
                let sample = match state.contacts() {
                    None => GestureSample::End,
                    Some(remaining) => GestureSample::Start(remaining),
                };
                return captured(Some(sample));
            }

            canvas::Event::Touch(touch::Event::FingerLost { .. }) => {
                state.fingers.clear();
                return captured(Some(GestureSample::Cancel));
            }

            // Mouse wheel for zooming
            canvas::Event::Mouse(mouse::Event::WheelScrolled { delta }) => {
                if !cursor.is_over(bounds) {
                    return (canvas::event::Status::Ignored, None);
                }
                let zoom_delta = match delta {
                    mouse::ScrollDelta::Lines { y, .. } => y * 0.1,
                    mouse::ScrollDelta::Pixels { y, .. } => y * 0.01,
                };
                return captured(Some(GestureSample::Wheel(zoom_delta)));
            }

            // Press starts a pan when zoomed, a swipe otherwise
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                if let Some(pos) = cursor.position_in(bounds).and(cursor.position()) {
                    state.mouse = Some(pos);
                    let sample = (!self.zoomed).then(|| GestureSample::Start(Contacts::One(to_point(pos))));
                    return captured(sample);
                }
            }

            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                if state.mouse.take().is_some() {
                    return captured((!self.zoomed).then_some(GestureSample::End));
                }
            }

            canvas::Event::Mouse(mouse::Event::CursorMoved { position }) => {
                if let Some(last) = state.mouse {
                    let sample = if self.zoomed {
                        state.mouse = Some(position);
                        GestureSample::Drag(Vector2::new(position.x - last.x, position.y - last.y))
                    } else {
                        GestureSample::Move(Contacts::One(to_point(position)))
                    };
                    return captured(Some(sample));
                }
            }

            _ => {}
        }

        (canvas::event::Status::Ignored, None)
    }

    fn mouse_interaction(
        &self,
        state: &Self::State,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> mouse::Interaction {
        if !self.zoomed || !cursor.is_over(bounds) {
            return mouse::Interaction::default();
        }
        if state.mouse.is_some() {
            mouse::Interaction::Grabbing
        } else {
            mouse::Interaction::Grab
        }
    }
}
