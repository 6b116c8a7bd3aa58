//! HUD placement
//!
//! Geometry is in global display coordinates with the origin at the top
//! left of the primary display, y growing downwards (the CoreGraphics
//! convention). The AppKit side flips it when building the window.

/// HUD window size in points
pub const HUD_SIZE: Size = Size {
    width: 200.0,
    height: 200.0,
};

/// Gap between the bottom of the visible area and the bottom of the HUD
pub const HUD_BOTTOM_OFFSET: f64 = 140.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point { x, y },
            size: Size { width, height },
        }
    }

    pub fn max_x(&self) -> f64 {
        self.origin.x + self.size.width
    }

    pub fn max_y(&self) -> f64 {
        self.origin.y + self.size.height
    }

    pub fn mid_x(&self) -> f64 {
        self.origin.x + self.size.width / 2.0
    }

    /// Half-open containment, so a point on a shared edge belongs to one screen
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.origin.x && p.x < self.max_x() && p.y >= self.origin.y && p.y < self.max_y()
    }
}

/// One attached display. The first screen in a list is the primary one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Screen {
    /// Whole display
    pub bounds: Rect,
    /// Display minus the menu bar and Dock
    pub visible: Rect,
}

impl Screen {
    /// Screen with nothing reserved by the menu bar or Dock
    pub fn uncovered(bounds: Rect) -> Self {
        Self {
            bounds,
            visible: bounds,
        }
    }
}

/// Screen under the pointer, falling back to the primary screen
pub fn screen_for_pointer(screens: &[Screen], pointer: Option<Point>) -> Option<&Screen> {
    pointer
        .and_then(|p| screens.iter().find(|s| s.bounds.contains(p)))
        .or_else(|| screens.first())
}

/// Frame of the HUD on `screen`: centered horizontally in the visible area,
/// just above its bottom edge
pub fn hud_frame(screen: &Screen) -> Rect {
    let visible = screen.visible;
    Rect::new(
        visible.mid_x() - HUD_SIZE.width / 2.0,
        visible.max_y() - HUD_BOTTOM_OFFSET - HUD_SIZE.height,
        HUD_SIZE.width,
        HUD_SIZE.height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_screens() -> Vec<Screen> {
        vec![
            Screen::uncovered(Rect::new(0.0, 0.0, 1440.0, 900.0)),
            Screen::uncovered(Rect::new(1440.0, -180.0, 1920.0, 1080.0)),
        ]
    }

    #[test]
    fn test_pointer_picks_its_screen() {
        let screens = two_screens();
        let chosen = screen_for_pointer(&screens, Some(Point { x: 2000.0, y: 10.0 }));
        assert_eq!(chosen, Some(&screens[1]));

        // Shared edge belongs to the right-hand screen
        let chosen = screen_for_pointer(&screens, Some(Point { x: 1440.0, y: 10.0 }));
        assert_eq!(chosen, Some(&screens[1]));
    }

    #[test]
    fn test_falls_back_to_primary() {
        let screens = two_screens();
        let outside = screen_for_pointer(&screens, Some(Point { x: -50.0, y: -50.0 }));
        assert_eq!(outside, Some(&screens[0]));

        assert_eq!(screen_for_pointer(&screens, None), Some(&screens[0]));
        assert_eq!(screen_for_pointer(&[], None), None);
    }

    #[test]
    fn test_hud_frame_position() {
        let screens = two_screens();

        let frame = hud_frame(&screens[0]);
        assert_eq!(frame, Rect::new(620.0, 560.0, 200.0, 200.0));

        let frame = hud_frame(&screens[1]);
        assert_eq!(frame.mid_x(), screens[1].bounds.mid_x());
        assert_eq!(frame.max_y(), screens[1].bounds.max_y() - HUD_BOTTOM_OFFSET);
    }

    #[test]
    fn test_hud_frame_clears_menu_bar_and_dock() {
        // 25pt menu bar on top, 70pt Dock at the bottom
        let screen = Screen {
            bounds: Rect::new(0.0, 0.0, 1440.0, 900.0),
            visible: Rect::new(0.0, 25.0, 1440.0, 805.0),
        };
        let frame = hud_frame(&screen);
        assert_eq!(frame, Rect::new(620.0, 490.0, 200.0, 200.0));
        assert_eq!(screen.visible.max_y() - frame.max_y(), HUD_BOTTOM_OFFSET);

        // Dock on the left shifts the center
        let screen = Screen {
            bounds: Rect::new(0.0, 0.0, 1440.0, 900.0),
            visible: Rect::new(80.0, 25.0, 1360.0, 875.0),
        };
        assert_eq!(hud_frame(&screen).mid_x(), 760.0);
    }
}
