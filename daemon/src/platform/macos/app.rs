//! Application bootstrap
//!
//! The main thread belongs to AppKit. The cooperative runtime runs on a
//! dedicated thread and reaches AppKit only through the main dispatch
//! queue.

use std::thread;

use anyhow::{Context, Result};
use cocoa::appkit::{NSApp, NSApplication, NSApplicationActivationPolicy};
use cocoa::base::{id, nil, YES};
use cocoa::foundation::NSAutoreleasePool;
use objc::{class, msg_send, sel, sel_impl};
use tracing::{error, info};

use crate::config::Config;

use super::event_tap::CgEventTapInterceptor;
use super::hud_window::AppKitSurface;
use super::input_source::TisInputSourceFeed;
use super::main_thread::run_on_main;

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXIsProcessTrustedWithOptions(options: *const std::ffi::c_void) -> bool;
}

/// Start the core thread and hand the main thread to AppKit
pub fn run(config: Config) -> Result<()> {
    unsafe {
        let _pool = NSAutoreleasePool::new(nil);

        let trusted = request_accessibility();
        info!(trusted, "accessibility permission checked");

        let app = NSApp();
        app.setActivationPolicy_(
            NSApplicationActivationPolicy::NSApplicationActivationPolicyAccessory,
        );
    }

    thread::Builder::new()
        .name("keyhud-core".to_string())
        .spawn(move || run_core_thread(config))
        .context("failed to spawn core thread")?;

    unsafe {
        NSApp().run();
    }
    Ok(())
}

fn run_core_thread(config: Config) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(?e, "failed to build runtime");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(crate::run_core(
        CgEventTapInterceptor,
        TisInputSourceFeed,
        AppKitSurface,
        config,
    ));
    // Let pending timer tasks go before AppKit takes the process down
    drop(runtime);

    if let Err(e) = result {
        error!(?e, "keyhud core failed");
        std::process::exit(1);
    }

    run_on_main(|| unsafe {
        let _: () = msg_send![NSApp(), terminate: nil];
    });
}

/// Show the system Accessibility prompt if the process is not yet trusted
unsafe fn request_accessibility() -> bool {
    let key: id = msg_send![
        class!(NSString),
        stringWithUTF8String: b"AXTrustedCheckOptionPrompt\0".as_ptr() as *const std::os::raw::c_char
    ];
    let prompt: id = msg_send![class!(NSNumber), numberWithBool: YES];
    let options: id = msg_send![class!(NSDictionary), dictionaryWithObject: prompt forKey: key];
    AXIsProcessTrustedWithOptions(options as *const _)
}
