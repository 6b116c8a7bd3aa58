//! Caps Lock interception using a CGEventTap
//!
//! Each tap lives on its own thread with its own CFRunLoop. The callback
//! only derives the Caps Lock bit and hands it to the sink; the event
//! itself is never modified or held.

use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::thread;
use std::time::Duration;

use core_foundation::base::TCFType;
use core_foundation::mach_port::{CFMachPort, CFMachPortRef};
use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
use core_graphics::event::{
    CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType,
};
use tracing::{error, info};

use crate::keystate::{
    caps_lock_from_bits, FlagSink, InterceptError, InterceptionHandle, Interceptor,
};

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapIsEnabled(tap: CFMachPortRef) -> bool;
    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);
    fn CGEventSourceFlagsState(state_id: i32) -> u64;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFMachPortInvalidate(port: CFMachPortRef);
}

/// kCGEventSourceStateCombinedSessionState
const COMBINED_SESSION_STATE: i32 = 0;

/// How long `install` waits for the tap thread to come up
const READY_TIMEOUT: Duration = Duration::from_secs(2);

type Ready = Result<EventTapHandle, InterceptError>;

/// Installs listen-only session taps for flag changes
#[derive(Debug, Default)]
pub struct CgEventTapInterceptor;

impl Interceptor for CgEventTapInterceptor {
    type Handle = EventTapHandle;

    fn install(&mut self, sink: FlagSink) -> Result<EventTapHandle, InterceptError> {
        let (ready_tx, ready_rx) = sync_channel::<Ready>(1);

        thread::Builder::new()
            .name("keyhud-event-tap".to_string())
            .spawn(move || run_tap(sink, ready_tx))
            .map_err(|e| InterceptError::ThreadSpawn(e.to_string()))?;

        ready_rx
            .recv_timeout(READY_TIMEOUT)
            .map_err(|_| InterceptError::Disconnected)?
    }

    fn current_caps_lock(&self) -> Option<bool> {
        let flags = unsafe { CGEventSourceFlagsState(COMBINED_SESSION_STATE) };
        Some(caps_lock_from_bits(flags))
    }
}

/// A live tap and the run loop servicing it
pub struct EventTapHandle {
    port: CFMachPort,
    run_loop: CFRunLoop,
}

// SAFETY: CGEventTapEnable, CFMachPortInvalidate and CFRunLoopStop are
// documented as callable from any thread.
unsafe impl Send for EventTapHandle {}

impl InterceptionHandle for EventTapHandle {
    fn is_enabled(&self) -> bool {
        unsafe { CGEventTapIsEnabled(self.port.as_concrete_TypeRef()) }
    }

    fn set_enabled(&mut self, enabled: bool) {
        unsafe { CGEventTapEnable(self.port.as_concrete_TypeRef(), enabled) }
    }

    fn release(mut self) {
        self.set_enabled(false);
        unsafe { CFMachPortInvalidate(self.port.as_concrete_TypeRef()) };
        // The tap thread drops the tap once its run loop returns
        self.run_loop.stop();
    }
}

/// Tap thread body
fn run_tap(sink: FlagSink, ready: SyncSender<Ready>) {
    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::FlagsChanged],
        move |_proxy, event_type, event| {
            if matches!(event_type, CGEventType::FlagsChanged) {
                sink.deliver(caps_lock_from_bits(event.get_flags().bits()));
            }
            // Listen-only taps never alter the event stream
            None
        },
    );
    let tap = match tap {
        Ok(tap) => tap,
        Err(()) => {
            error!("failed to create event tap - is Accessibility permission granted?");
            let _ = ready.try_send(Err(InterceptError::PermissionDenied));
            return;
        }
    };

    let source = match tap.mach_port.create_runloop_source(0) {
        Ok(source) => source,
        Err(()) => {
            let _ = ready.try_send(Err(InterceptError::RunLoopSource));
            return;
        }
    };

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }
    tap.enable();

    let handle = EventTapHandle {
        port: tap.mach_port.clone(),
        run_loop: run_loop.clone(),
    };
    match ready.try_send(Ok(handle)) {
        Ok(()) => {}
        Err(TrySendError::Full(Ok(handle)) | TrySendError::Disconnected(Ok(handle))) => {
            // Installer gave up waiting; nobody owns this tap
            handle.release();
            return;
        }
        Err(_) => return,
    }

    info!("event tap created and enabled");
    CFRunLoop::run_current();
    info!("event tap thread stopped");
}
