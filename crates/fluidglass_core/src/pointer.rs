//! Pointer and touch tracking
//!
//! The mouse owns one persistent slot. Touches are allocated when they start
//! and matched by identifier afterwards; a touch is dropped once it has lifted
//! and its last movement has been drained. Events for identifiers that were
//! never started are ignored.

use smallvec::SmallVec;

use crate::color::Rgb;
use crate::splat::Splat;
use crate::viewport::Viewport;

/// Identity of an input pointer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerId {
    Mouse,
    Touch(u64),
}

/// State of one pointer between frames
#[derive(Clone, Debug, PartialEq)]
pub struct Pointer {
    pub id: PointerId,
    /// Current position, normalised, `y` up
    pub texcoord: [f32; 2],
    pub prev_texcoord: [f32; 2],
    /// Aspect-corrected movement since the previous event
    pub delta: [f32; 2],
    pub down: bool,
    /// Set on movement, cleared when drained into a splat
    pub moved: bool,
    pub color: Rgb,
}

impl Pointer {
    fn new(id: PointerId) -> Self {
        Self {
            id,
            texcoord: [0.0; 2],
            prev_texcoord: [0.0; 2],
            delta: [0.0; 2],
            down: false,
            moved: false,
            color: Rgb::new(0.3, 0.0, 0.6),
        }
    }

    fn press(&mut self, position: [f32; 2], color: Rgb) {
        self.down = true;
        self.moved = false;
        self.texcoord = position;
        self.prev_texcoord = position;
        self.delta = [0.0; 2];
        self.color = color;
    }

    fn move_to(&mut self, position: [f32; 2], viewport: &Viewport) {
        self.prev_texcoord = self.texcoord;
        self.texcoord = position;
        self.delta = viewport.correct_delta(
            self.texcoord[0] - self.prev_texcoord[0],
            self.texcoord[1] - self.prev_texcoord[1],
        );
        self.moved = self.delta[0].abs() > 0.0 || self.delta[1].abs() > 0.0;
    }

    fn release(&mut self) {
        self.down = false;
    }

    /// Splat for this pointer's last movement, scaled by `force`
    pub fn splat(&self, force: f32) -> Splat {
        Splat::new(
            self.texcoord[0],
            self.texcoord[1],
            self.delta[0] * force,
            self.delta[1] * force,
            self.color,
        )
    }
}

/// Mouse slot plus active touches
#[derive(Clone, Debug)]
pub struct PointerSet {
    mouse: Pointer,
    touches: SmallVec<[Pointer; 4]>,
}

impl Default for PointerSet {
    fn default() -> Self {
        Self {
            mouse: Pointer::new(PointerId::Mouse),
            touches: SmallVec::new(),
        }
    }
}

impl PointerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a press at surface pixel `(x, y)`
    pub fn press(&mut self, id: PointerId, x: f32, y: f32, viewport: &Viewport, color: Rgb) {
        let position = viewport.normalize(x, y);
        match id {
            PointerId::Mouse => self.mouse.press(position, color),
            PointerId::Touch(_) => {
                if let Some(pointer) = self.find_mut(id) {
                    pointer.press(position, color);
                } else {
                    let mut pointer = Pointer::new(id);
                    pointer.press(position, color);
                    self.touches.push(pointer);
                }
            }
        }
    }

    /// Move a held pointer; returns false when the pointer isn't held
    pub fn move_to(&mut self, id: PointerId, x: f32, y: f32, viewport: &Viewport) -> bool {
        let position = viewport.normalize(x, y);
        match self.find_mut(id) {
            Some(pointer) if pointer.down => {
                pointer.move_to(position, viewport);
                true
            }
            _ => false,
        }
    }

    /// Lift a pointer; unknown touches are ignored
    pub fn release(&mut self, id: PointerId) {
        if let Some(pointer) = self.find_mut(id) {
            pointer.release();
        }
    }

    /// Collect splats for held pointers that moved, then reset their flags
    ///
    /// Lifted touches are removed and the lifted mouse slot is reset.
    pub fn drain_splats(&mut self, force: f32) -> SmallVec<[Splat; 4]> {
        let mut splats = SmallVec::new();

        for pointer in std::iter::once(&mut self.mouse).chain(self.touches.iter_mut()) {
            if pointer.moved && pointer.down {
                splats.push(pointer.splat(force));
            }
            pointer.moved = false;
        }

        if !self.mouse.down {
            self.mouse.delta = [0.0; 2];
        }
        self.touches.retain(|pointer| pointer.down);

        splats
    }

    /// Assign new colours to every tracked pointer
    pub fn recolor(&mut self, mut next_color: impl FnMut() -> Rgb) {
        self.mouse.color = next_color();
        for pointer in &mut self.touches {
            pointer.color = next_color();
        }
    }

    pub fn get(&self, id: PointerId) -> Option<&Pointer> {
        match id {
            PointerId::Mouse => Some(&self.mouse),
            PointerId::Touch(_) => self.touches.iter().find(|pointer| pointer.id == id),
        }
    }

    /// Number of touches currently tracked
    pub fn touch_count(&self) -> usize {
        self.touches.len()
    }

    fn find_mut(&mut self, id: PointerId) -> Option<&mut Pointer> {
        match id {
            PointerId::Mouse => Some(&mut self.mouse),
            PointerId::Touch(_) => self.touches.iter_mut().find(|pointer| pointer.id == id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb = Rgb::new(1.0, 0.0, 0.0);

    fn viewport() -> Viewport {
        Viewport::new(100, 100)
    }

    #[test]
    fn test_mouse_move_without_press_is_ignored() {
        let mut pointers = PointerSet::new();
        assert!(!pointers.move_to(PointerId::Mouse, 10.0, 10.0, &viewport()));
        assert!(pointers.drain_splats(1.0).is_empty());
    }

    #[test]
    fn test_press_move_produces_one_splat() {
        let mut pointers = PointerSet::new();
        pointers.press(PointerId::Mouse, 50.0, 50.0, &viewport(), RED);
        assert!(pointers.move_to(PointerId::Mouse, 60.0, 50.0, &viewport()));

        let splats = pointers.drain_splats(100.0);
        assert_eq!(splats.len(), 1);
        let splat = splats[0];
        assert!((splat.x - 0.6).abs() < 1e-6);
        assert!((splat.y - 0.5).abs() < 1e-6);
        assert!((splat.dx - 10.0).abs() < 1e-4);
        assert_eq!(splat.dy, 0.0);
        assert_eq!(splat.color, RED);

        // Flag is consumed
        assert!(pointers.drain_splats(100.0).is_empty());
    }

    #[test]
    fn test_press_alone_does_not_splat() {
        let mut pointers = PointerSet::new();
        pointers.press(PointerId::Mouse, 20.0, 20.0, &viewport(), RED);
        assert!(pointers.drain_splats(1.0).is_empty());
    }

    #[test]
    fn test_move_to_same_position_is_not_movement() {
        let mut pointers = PointerSet::new();
        pointers.press(PointerId::Mouse, 20.0, 20.0, &viewport(), RED);
        pointers.move_to(PointerId::Mouse, 20.0, 20.0, &viewport());
        assert!(!pointers.get(PointerId::Mouse).unwrap().moved);
    }

    #[test]
    fn test_release_drops_pending_movement() {
        let mut pointers = PointerSet::new();
        pointers.press(PointerId::Mouse, 20.0, 20.0, &viewport(), RED);
        pointers.move_to(PointerId::Mouse, 30.0, 20.0, &viewport());
        pointers.release(PointerId::Mouse);

        assert!(pointers.drain_splats(1.0).is_empty());
        let mouse = pointers.get(PointerId::Mouse).unwrap();
        assert!(!mouse.down);
        assert!(!mouse.moved);
    }

    #[test]
    fn test_touches_tracked_by_identifier() {
        let mut pointers = PointerSet::new();
        pointers.press(PointerId::Touch(7), 10.0, 10.0, &viewport(), RED);
        pointers.press(PointerId::Touch(9), 90.0, 90.0, &viewport(), RED);
        assert_eq!(pointers.touch_count(), 2);

        pointers.move_to(PointerId::Touch(9), 80.0, 90.0, &viewport());
        let splats = pointers.drain_splats(1.0);
        assert_eq!(splats.len(), 1);
        assert!((splats[0].x - 0.8).abs() < 1e-6);

        pointers.release(PointerId::Touch(7));
        pointers.drain_splats(1.0);
        assert_eq!(pointers.touch_count(), 1);
        assert!(pointers.get(PointerId::Touch(7)).is_none());
        assert!(pointers.get(PointerId::Touch(9)).unwrap().down);
    }

    #[test]
    fn test_unknown_touch_events_are_ignored() {
        let mut pointers = PointerSet::new();
        pointers.release(PointerId::Touch(3));
        assert!(!pointers.move_to(PointerId::Touch(3), 1.0, 1.0, &viewport()));
        assert_eq!(pointers.touch_count(), 0);
    }

    #[test]
    fn test_new_press_changes_color() {
        let mut pointers = PointerSet::new();
        let blue = Rgb::new(0.0, 0.0, 1.0);
        pointers.press(PointerId::Mouse, 0.0, 0.0, &viewport(), RED);
        pointers.release(PointerId::Mouse);
        pointers.press(PointerId::Mouse, 0.0, 0.0, &viewport(), blue);
        assert_eq!(pointers.get(PointerId::Mouse).unwrap().color, blue);
    }

    #[test]
    fn test_recolor_all() {
        let mut pointers = PointerSet::new();
        pointers.press(PointerId::Touch(1), 0.0, 0.0, &viewport(), RED);
        let green = Rgb::new(0.0, 1.0, 0.0);
        pointers.recolor(|| green);
        assert_eq!(pointers.get(PointerId::Mouse).unwrap().color, green);
        assert_eq!(pointers.get(PointerId::Touch(1)).unwrap().color, green);
    }
}
