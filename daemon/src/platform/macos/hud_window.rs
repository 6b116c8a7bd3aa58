//! AppKit overlay surface
//!
//! Screen frames are read from NSScreen on the main thread, with the
//! CoreGraphics display list as a fallback. The pointer comes from
//! CoreGraphics. Windows are built, animated and destroyed on the main
//! thread; they are tracked there by generation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::mpsc::sync_channel;
use std::time::Duration;

use cocoa::appkit::{
    NSBackingStoreType, NSColor, NSScreen, NSWindow, NSWindowCollectionBehavior,
    NSWindowStyleMask,
};
use cocoa::base::{id, nil, NO, YES};
use cocoa::foundation::{NSArray, NSPoint, NSRect, NSSize, NSString};
use core_graphics::display::CGDisplay;
use core_graphics::event::CGEvent;
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use objc::{class, msg_send, sel, sel_impl};
use tracing::{debug, warn};

use crate::overlay::{
    AccentColor, Generation, OverlayPayload, OverlaySurface, Point, Rect, Screen, SurfaceError,
};

use super::main_thread::run_on_main;

/// NSFloatingWindowLevel
const FLOATING_WINDOW_LEVEL: i64 = 3;
/// NSVisualEffectMaterialHUDWindow
const HUD_MATERIAL: isize = 13;
/// NSVisualEffectBlendingModeBehindWindow
const BLEND_BEHIND_WINDOW: isize = 0;
/// NSVisualEffectStateActive
const STATE_ACTIVE: isize = 1;
const CORNER_RADIUS: f64 = 16.0;
const SYMBOL_POINT_SIZE: f64 = 48.0;
const LABEL_POINT_SIZE: f64 = 13.0;
/// NSFontWeightMedium
const WEIGHT_MEDIUM: f64 = 0.23;
const SYMBOL_WEIGHT: f64 = WEIGHT_MEDIUM;
const LABEL_WEIGHT: f64 = WEIGHT_MEDIUM;

/// How long `screens` waits for the main thread before using CG bounds
const SCREEN_QUERY_TIMEOUT: Duration = Duration::from_millis(250);

/// NSTextAlignmentCenter differs between the x86_64 and arm64 ABIs
#[cfg(target_arch = "x86_64")]
const ALIGN_CENTER: isize = 2;
#[cfg(not(target_arch = "x86_64"))]
const ALIGN_CENTER: isize = 1;

thread_local! {
    /// Open windows, main thread only
    static WINDOWS: RefCell<HashMap<Generation, id>> = RefCell::new(HashMap::new());
}

/// Overlay surface drawing borderless HUD windows
#[derive(Debug, Default)]
pub struct AppKitSurface;

impl OverlaySurface for AppKitSurface {
    fn screens(&self) -> Vec<Screen> {
        let (tx, rx) = sync_channel(1);
        run_on_main(move || {
            let _ = tx.try_send(unsafe { appkit_screens() });
        });

        match rx.recv_timeout(SCREEN_QUERY_TIMEOUT) {
            Ok(screens) if !screens.is_empty() => screens,
            Ok(_) => display_screens(),
            Err(_) => {
                warn!("main thread did not answer screen query, using display bounds");
                display_screens()
            }
        }
    }

    fn pointer_location(&self) -> Option<Point> {
        let source = CGEventSource::new(CGEventSourceStateID::CombinedSessionState).ok()?;
        let event = CGEvent::new(source).ok()?;
        let location = event.location();
        Some(Point {
            x: location.x,
            y: location.y,
        })
    }

    fn open(
        &mut self,
        generation: Generation,
        frame: Rect,
        payload: &OverlayPayload,
    ) -> Result<(), SurfaceError> {
        let primary_height = CGDisplay::main().bounds().size.height;
        if primary_height <= 0.0 {
            return Err(SurfaceError::NoDisplay);
        }

        // AppKit puts the origin at the bottom left of the primary display
        let rect = NSRect::new(
            NSPoint::new(frame.origin.x, primary_height - frame.max_y()),
            NSSize::new(frame.size.width, frame.size.height),
        );
        let payload = payload.clone();

        run_on_main(move || {
            let window = unsafe { build_window(rect, &payload) };
            if window == nil {
                warn!(%generation, "window could not be created");
                return;
            }
            WINDOWS.with(|windows| windows.borrow_mut().insert(generation, window));
            debug!(%generation, "hud window ordered front");
        });
        Ok(())
    }

    fn fade_out(&mut self, generation: Generation, duration: Duration) {
        run_on_main(move || {
            let Some(window) = WINDOWS.with(|windows| windows.borrow().get(&generation).copied())
            else {
                return;
            };
            unsafe {
                let _: () = msg_send![class!(NSAnimationContext), beginGrouping];
                let context: id = msg_send![class!(NSAnimationContext), currentContext];
                let _: () = msg_send![context, setDuration: duration.as_secs_f64()];
                let animator: id = msg_send![window, animator];
                let _: () = msg_send![animator, setAlphaValue: 0.0f64];
                let _: () = msg_send![class!(NSAnimationContext), endGrouping];
            }
        });
    }

    fn close(&mut self, generation: Generation) {
        run_on_main(move || {
            let Some(window) = WINDOWS.with(|windows| windows.borrow_mut().remove(&generation))
            else {
                return;
            };
            unsafe {
                let _: () = msg_send![window, orderOut: nil];
                let _: () = msg_send![window, release];
            }
            debug!(%generation, "hud window closed");
        });
    }
}

/// NSScreen frames flipped into the top-left origin space. Main thread only.
unsafe fn appkit_screens() -> Vec<Screen> {
    let screens = NSScreen::screens(nil);
    if screens == nil {
        return Vec::new();
    }
    let count = screens.count();
    if count == 0 {
        return Vec::new();
    }
    // The first NSScreen holds the menu bar and anchors both spaces
    let primary_height = NSScreen::frame(screens.objectAtIndex(0)).size.height;

    (0..count)
        .map(|i| {
            let screen = screens.objectAtIndex(i);
            Screen {
                bounds: flip(NSScreen::frame(screen), primary_height),
                visible: flip(NSScreen::visibleFrame(screen), primary_height),
            }
        })
        .filter(|screen| screen.bounds.size.width > 0.0 && screen.bounds.size.height > 0.0)
        .collect()
}

/// Whole-display bounds from CoreGraphics, main display first
fn display_screens() -> Vec<Screen> {
    let mut ids = match CGDisplay::active_displays() {
        Ok(ids) => ids,
        Err(e) => {
            warn!(error = e, "could not list displays");
            return Vec::new();
        }
    };
    let main = CGDisplay::main().id;
    ids.sort_by_key(|id| *id != main);

    ids.into_iter()
        .map(|id| {
            let bounds = CGDisplay::new(id).bounds();
            Screen::uncovered(Rect::new(
                bounds.origin.x,
                bounds.origin.y,
                bounds.size.width,
                bounds.size.height,
            ))
        })
        .filter(|screen| screen.bounds.size.width > 0.0 && screen.bounds.size.height > 0.0)
        .collect()
}

fn flip(rect: NSRect, primary_height: f64) -> Rect {
    Rect::new(
        rect.origin.x,
        primary_height - rect.origin.y - rect.size.height,
        rect.size.width,
        rect.size.height,
    )
}

unsafe fn build_window(frame: NSRect, payload: &OverlayPayload) -> id {
    let window = NSWindow::alloc(nil).initWithContentRect_styleMask_backing_defer_(
        frame,
        NSWindowStyleMask::NSBorderlessWindowMask,
        NSBackingStoreType::NSBackingStoreBuffered,
        NO,
    );
    if window == nil {
        return nil;
    }
    let _: () = msg_send![window, setReleasedWhenClosed: NO];
    window.setOpaque_(NO);
    window.setBackgroundColor_(NSColor::clearColor(nil));
    let _: () = msg_send![window, setHasShadow: NO];
    window.setIgnoresMouseEvents_(YES);
    window.setLevel_(FLOATING_WINDOW_LEVEL);
    window.setCollectionBehavior_(
        NSWindowCollectionBehavior::NSWindowCollectionBehaviorCanJoinAllSpaces
            | NSWindowCollectionBehavior::NSWindowCollectionBehaviorStationary,
    );

    let width = frame.size.width;
    let bounds = NSRect::new(NSPoint::new(0.0, 0.0), frame.size);

    let background: id = msg_send![class!(NSVisualEffectView), alloc];
    let background: id = msg_send![background, initWithFrame: bounds];
    let _: () = msg_send![background, setMaterial: HUD_MATERIAL];
    let _: () = msg_send![background, setBlendingMode: BLEND_BEHIND_WINDOW];
    let _: () = msg_send![background, setState: STATE_ACTIVE];
    let _: () = msg_send![background, setWantsLayer: YES];
    let layer: id = msg_send![background, layer];
    let _: () = msg_send![layer, setCornerRadius: CORNER_RADIUS];
    let _: () = msg_send![layer, setMasksToBounds: YES];

    let symbol_name = nsstring(payload.icon.symbol_name());
    let image: id = msg_send![class!(NSImage), imageWithSystemSymbolName: symbol_name accessibilityDescription: nil];
    if image != nil {
        let config: id = msg_send![
            class!(NSImageSymbolConfiguration),
            configurationWithPointSize: SYMBOL_POINT_SIZE
            weight: SYMBOL_WEIGHT
        ];
        let image: id = msg_send![image, imageWithSymbolConfiguration: config];
        let icon: id = msg_send![class!(NSImageView), imageViewWithImage: image];
        let icon_frame = NSRect::new(NSPoint::new(0.0, 84.0), NSSize::new(width, 72.0));
        let _: () = msg_send![icon, setFrame: icon_frame];
        let _: () = msg_send![icon, setContentTintColor: accent(payload.accent)];
        let _: () = msg_send![background, addSubview: icon];
    }

    let label: id = msg_send![class!(NSTextField), labelWithString: nsstring(&payload.text)];
    let font: id = msg_send![class!(NSFont), systemFontOfSize: LABEL_POINT_SIZE weight: LABEL_WEIGHT];
    let text_color: id = msg_send![class!(NSColor), labelColor];
    let label_frame = NSRect::new(NSPoint::new(8.0, 44.0), NSSize::new(width - 16.0, 20.0));
    let _: () = msg_send![label, setFont: font];
    let _: () = msg_send![label, setTextColor: text_color];
    let _: () = msg_send![label, setAlignment: ALIGN_CENTER];
    let _: () = msg_send![label, setFrame: label_frame];
    let _: () = msg_send![background, addSubview: label];

    window.setContentView_(background);
    let _: () = msg_send![background, release];

    let _: () = msg_send![window, setAlphaValue: 1.0f64];
    let _: () = msg_send![window, orderFrontRegardless];
    window
}

unsafe fn accent(color: AccentColor) -> id {
    match color {
        AccentColor::Highlight => msg_send![class!(NSColor), systemBlueColor],
        AccentColor::Secondary => msg_send![class!(NSColor), secondaryLabelColor],
    }
}

/// Autoreleased NSString
unsafe fn nsstring(s: &str) -> id {
    let string = NSString::alloc(nil).init_str(s);
    msg_send![string, autorelease]
}
