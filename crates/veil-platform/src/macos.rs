//! macOS capture exclusion via `NSWindow.sharingType`.
//!
//! Windows are looked up among this process's own NSWindows; the handle is
//! the AppKit window number.

use objc2::rc::Retained;
use objc2_app_kit::{NSApplication, NSWindow, NSWindowSharingType};
use objc2_foundation::MainThreadMarker;
use veil_core::{CaptureExclusion, WindowHandle};

pub struct MacosExclusion {
    mtm: MainThreadMarker,
}

impl MacosExclusion {
    /// AppKit window state may only be touched on the main thread.
    pub fn new() -> Option<Self> {
        match MainThreadMarker::new() {
            Some(mtm) => Some(Self { mtm }),
            None => {
                log::warn!("Capture exclusion needs the main thread on macOS");
                None
            }
        }
    }

    fn window(&self, handle: WindowHandle) -> Option<Retained<NSWindow>> {
        let app = NSApplication::sharedApplication(self.mtm);
        unsafe { app.windowWithWindowNumber(handle.0) }
    }

    fn set_sharing(&self, handle: WindowHandle, sharing: NSWindowSharingType) -> bool {
        match self.window(handle) {
            Some(window) => {
                unsafe { window.setSharingType(sharing) };
                unsafe { window.sharingType() } == sharing
            }
            None => false,
        }
    }
}

impl CaptureExclusion for MacosExclusion {
    fn find_window_by_title(&self, title: &str) -> Option<WindowHandle> {
        let app = NSApplication::sharedApplication(self.mtm);
        unsafe {
            let windows = app.windows();
            for i in 0..windows.count() {
                let window = windows.objectAtIndex(i);
                if window.title().to_string() == title {
                    return Some(WindowHandle(window.windowNumber()));
                }
            }
        }
        None
    }

    fn set_excluded(&mut self, window: WindowHandle) -> bool {
        self.set_sharing(window, NSWindowSharingType::NSWindowSharingNone)
    }

    fn clear_excluded(&mut self, window: WindowHandle) -> bool {
        self.set_sharing(window, NSWindowSharingType::NSWindowSharingReadOnly)
    }
}
