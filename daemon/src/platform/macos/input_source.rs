//! Input source feed backed by the Text Input Sources API
//!
//! TIS must be queried on the main thread, so subscribing, reading the
//! current source and unsubscribing are all queued there. Snapshots travel
//! back through the [`SourceSink`].

use std::ffi::c_void;
use std::ptr;

use core_foundation::base::{CFIndex, CFRelease, TCFType};
use core_foundation::dictionary::CFDictionaryRef;
use core_foundation::string::{CFString, CFStringRef};
use tracing::{debug, trace};

use crate::locale::{InputSourceFeed, InputSourceInfo, SourceSink, SubscribeError};

use super::main_thread::run_on_main;

type TISInputSourceRef = *const c_void;
type CFNotificationCenterRef = *const c_void;
type CFNotificationCallback = extern "C" fn(
    center: CFNotificationCenterRef,
    observer: *mut c_void,
    name: CFStringRef,
    object: *const c_void,
    user_info: CFDictionaryRef,
);

#[link(name = "Carbon", kind = "framework")]
extern "C" {
    fn TISCopyCurrentKeyboardInputSource() -> TISInputSourceRef;
    fn TISGetInputSourceProperty(source: TISInputSourceRef, key: CFStringRef) -> *const c_void;

    static kTISPropertyLocalizedName: CFStringRef;
    static kTISPropertyInputSourceID: CFStringRef;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFNotificationCenterGetDistributedCenter() -> CFNotificationCenterRef;
    fn CFNotificationCenterAddObserver(
        center: CFNotificationCenterRef,
        observer: *const c_void,
        callback: CFNotificationCallback,
        name: CFStringRef,
        object: *const c_void,
        suspension_behavior: CFIndex,
    );
    fn CFNotificationCenterRemoveObserver(
        center: CFNotificationCenterRef,
        observer: *const c_void,
        name: CFStringRef,
        object: *const c_void,
    );
}

const SELECTED_SOURCE_CHANGED: &str =
    "com.apple.Carbon.TISNotifySelectedKeyboardInputSourceChanged";

/// CFNotificationSuspensionBehaviorDeliverImmediately
const DELIVER_IMMEDIATELY: CFIndex = 4;

/// Feed for the selected keyboard input source
#[derive(Debug, Default)]
pub struct TisInputSourceFeed;

/// Registered observer; unregisters on drop
pub struct TisSubscription {
    /// Leaked `Box<SourceSink>` doubling as the observer token
    observer: usize,
}

impl InputSourceFeed for TisInputSourceFeed {
    type Subscription = TisSubscription;

    fn subscribe(&mut self, sink: SourceSink) -> Result<TisSubscription, SubscribeError> {
        if unsafe { CFNotificationCenterGetDistributedCenter() }.is_null() {
            return Err(SubscribeError::Unavailable(
                "distributed notification center missing".to_string(),
            ));
        }

        let observer = Box::into_raw(Box::new(sink)) as usize;
        run_on_main(move || unsafe {
            let name = CFString::from_static_string(SELECTED_SOURCE_CHANGED);
            CFNotificationCenterAddObserver(
                CFNotificationCenterGetDistributedCenter(),
                observer as *const c_void,
                on_selected_source_changed,
                name.as_concrete_TypeRef(),
                ptr::null(),
                DELIVER_IMMEDIATELY,
            );

            let sink = &*(observer as *const SourceSink);
            sink.baseline(current_source());
            debug!("input source notifications registered");
        });

        Ok(TisSubscription { observer })
    }
}

impl Drop for TisSubscription {
    fn drop(&mut self) {
        let observer = self.observer;
        // Queued behind the registration, so removal always follows it
        run_on_main(move || unsafe {
            let name = CFString::from_static_string(SELECTED_SOURCE_CHANGED);
            CFNotificationCenterRemoveObserver(
                CFNotificationCenterGetDistributedCenter(),
                observer as *const c_void,
                name.as_concrete_TypeRef(),
                ptr::null(),
            );
            drop(Box::from_raw(observer as *mut SourceSink));
            debug!("input source notifications removed");
        });
    }
}

extern "C" fn on_selected_source_changed(
    _center: CFNotificationCenterRef,
    observer: *mut c_void,
    _name: CFStringRef,
    _object: *const c_void,
    _user_info: CFDictionaryRef,
) {
    if observer.is_null() {
        return;
    }
    // SAFETY: the observer stays registered only while its sink is alive
    let sink = unsafe { &*(observer as *const SourceSink) };
    trace!("selected input source changed");
    sink.changed(current_source());
}

/// Snapshot of the selected keyboard input source. Main thread only.
fn current_source() -> Option<InputSourceInfo> {
    unsafe {
        let source = TISCopyCurrentKeyboardInputSource();
        if source.is_null() {
            return None;
        }
        let info = InputSourceInfo {
            localized_name: string_property(source, kTISPropertyLocalizedName),
            source_id: string_property(source, kTISPropertyInputSourceID),
        };
        CFRelease(source);
        Some(info)
    }
}

unsafe fn string_property(source: TISInputSourceRef, key: CFStringRef) -> Option<String> {
    let value = TISGetInputSourceProperty(source, key);
    if value.is_null() {
        return None;
    }
    Some(CFString::wrap_under_get_rule(value as CFStringRef).to_string())
}
