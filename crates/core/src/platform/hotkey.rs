use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Pending operator requests raised from the hotkey listener thread.
/// The foreground loop drains these; "start" goes through the same
/// already-running guard as a button press, "stop" only sets the flag.
#[derive(Debug, Default)]
pub struct HotkeySignals {
    start: AtomicBool,
    stop: AtomicBool,
}

impl HotkeySignals {
    pub fn take_start(&self) -> bool {
        self.start.swap(false, Ordering::AcqRel)
    }

    pub fn take_stop(&self) -> bool {
        self.stop.swap(false, Ordering::AcqRel)
    }
}

/// Start a background thread listening for the global hotkeys
/// Alt+Shift+S (start) and Alt+Shift+X (stop).
#[cfg(target_os = "macos")]
pub fn start_hotkey_listener(signals: Arc<HotkeySignals>) {
    use std::ffi::c_void;

    // CGEventTap FFI types and functions
    type CGEventTapProxy = *mut c_void;
    type CGEventRef = *mut c_void;
    type CFMachPortRef = *mut c_void;
    type CFRunLoopSourceRef = *mut c_void;
    type CFRunLoopRef = *mut c_void;
    type CFStringRef = *const c_void;
    type CGEventMask = u64;
    type CGEventType = u32;
    type CGEventFlags = u64;

    type CGEventTapCallBack = unsafe extern "C" fn(
        CGEventTapProxy,
        CGEventType,
        CGEventRef,
        *mut c_void,
    ) -> CGEventRef;

    const K_CG_HID_EVENT_TAP: u32 = 0; // kCGHIDEventTap
    const K_CG_HEAD_INSERT_EVENT_TAP: u32 = 0;
    const K_CG_EVENT_TAP_OPTION_LISTEN_ONLY: u32 = 1;
    const CG_EVENT_KEY_DOWN: u32 = 10;
    const CG_EVENT_TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFFFFFE;

    const K_CG_EVENT_FLAG_MASK_ALTERNATE: u64 = 0x00080000;
    const K_CG_EVENT_FLAG_MASK_SHIFT: u64 = 0x00020000;
    const K_CG_EVENT_FLAG_MASK_COMMAND: u64 = 0x00100000;
    const K_CG_EVENT_FLAG_MASK_CONTROL: u64 = 0x00040000;

    const KEYCODE_S: i64 = 1;
    const KEYCODE_X: i64 = 7;

    extern "C" {
        fn CGEventTapCreate(
            tap: u32,
            place: u32,
            options: u32,
            events_of_interest: CGEventMask,
            callback: CGEventTapCallBack,
            user_info: *mut c_void,
        ) -> CFMachPortRef;

        fn CFMachPortCreateRunLoopSource(
            allocator: *const c_void,
            port: CFMachPortRef,
            order: i64,
        ) -> CFRunLoopSourceRef;

        fn CFRunLoopGetCurrent() -> CFRunLoopRef;

        fn CFRunLoopAddSource(rl: CFRunLoopRef, source: CFRunLoopSourceRef, mode: CFStringRef);

        fn CFRunLoopRun();

        fn CGEventGetFlags(event: CGEventRef) -> CGEventFlags;
        fn CGEventGetIntegerValueField(event: CGEventRef, field: u32) -> i64;
        fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);

        static kCFRunLoopCommonModes: CFStringRef;
    }

    // Keyboard event keycode field
    const K_CG_KEYBOARD_EVENT_KEYCODE: u32 = 9;

    unsafe extern "C" fn hotkey_callback(
        _proxy: CGEventTapProxy,
        event_type: CGEventType,
        event: CGEventRef,
        user_info: *mut c_void,
    ) -> CGEventRef {
        unsafe {
            if event_type == CG_EVENT_TAP_DISABLED_BY_TIMEOUT {
                return event;
            }
            if event_type != CG_EVENT_KEY_DOWN {
                return event;
            }

            let flags = CGEventGetFlags(event);
            let keycode = CGEventGetIntegerValueField(event, K_CG_KEYBOARD_EVENT_KEYCODE);

            let has_alt = (flags & K_CG_EVENT_FLAG_MASK_ALTERNATE) != 0;
            let has_shift = (flags & K_CG_EVENT_FLAG_MASK_SHIFT) != 0;
            let no_cmd = (flags & K_CG_EVENT_FLAG_MASK_COMMAND) == 0;
            let no_ctrl = (flags & K_CG_EVENT_FLAG_MASK_CONTROL) == 0;

            if has_alt && has_shift && no_cmd && no_ctrl {
                let signals = &*(user_info as *const HotkeySignals);
                match keycode {
                    KEYCODE_S => signals.start.store(true, Ordering::Release),
                    KEYCODE_X => signals.stop.store(true, Ordering::Release),
                    _ => {}
                }
            }

            event
        }
    }

    std::thread::spawn(move || {
        unsafe {
            let mask: CGEventMask = 1 << CG_EVENT_KEY_DOWN;
            let signals_ptr = Arc::into_raw(signals) as *mut c_void;

            let tap = CGEventTapCreate(
                K_CG_HID_EVENT_TAP,
                K_CG_HEAD_INSERT_EVENT_TAP,
                K_CG_EVENT_TAP_OPTION_LISTEN_ONLY,
                mask,
                hotkey_callback,
                signals_ptr,
            );

            if tap.is_null() {
                crate::logger::error(
                    "failed to create event tap for global hotkeys — \
                     grant Accessibility permission to your terminal",
                );
                // Reclaim the Arc so we don't leak
                let _ = Arc::from_raw(signals_ptr as *const HotkeySignals);
                return;
            }

            let source = CFMachPortCreateRunLoopSource(std::ptr::null(), tap, 0);
            let run_loop = CFRunLoopGetCurrent();
            CFRunLoopAddSource(run_loop, source, kCFRunLoopCommonModes);
            CGEventTapEnable(tap, true);

            crate::logger::info("global hotkeys Alt+Shift+S / Alt+Shift+X active");
            CFRunLoopRun(); // blocks forever
        }
    });
}

/// Start a background thread listening for Alt+Shift+S / Alt+Shift+X
/// (Windows).
#[cfg(target_os = "windows")]
pub fn start_hotkey_listener(signals: Arc<HotkeySignals>) {
    use std::ffi::c_void;

    type HWND = *mut c_void;
    type BOOL = i32;
    type UINT = u32;
    type WPARAM = usize;
    type LPARAM = isize;
    type DWORD = u32;
    type LONG = i32;

    #[repr(C)]
    struct POINT {
        x: LONG,
        y: LONG,
    }

    #[repr(C)]
    struct MSG {
        hwnd: HWND,
        message: UINT,
        w_param: WPARAM,
        l_param: LPARAM,
        time: DWORD,
        pt: POINT,
    }

    const MOD_ALT: u32 = 0x0001;
    const MOD_SHIFT: u32 = 0x0004;
    const MOD_NOREPEAT: u32 = 0x4000;
    const VK_S: u32 = 0x53;
    const VK_X: u32 = 0x58;
    const WM_HOTKEY: u32 = 0x0312;
    const START_ID: i32 = 1;
    const STOP_ID: i32 = 2;

    extern "system" {
        fn RegisterHotKey(hwnd: HWND, id: i32, fs_modifiers: UINT, vk: UINT) -> BOOL;
        fn GetMessageW(
            msg: *mut MSG,
            hwnd: HWND,
            msg_filter_min: UINT,
            msg_filter_max: UINT,
        ) -> BOOL;
    }

    std::thread::spawn(move || {
        unsafe {
            let mods = MOD_ALT | MOD_SHIFT | MOD_NOREPEAT;
            let ok_start = RegisterHotKey(std::ptr::null_mut(), START_ID, mods, VK_S);
            let ok_stop = RegisterHotKey(std::ptr::null_mut(), STOP_ID, mods, VK_X);
            if ok_start == 0 || ok_stop == 0 {
                crate::logger::error(
                    "failed to register global hotkeys Alt+Shift+S/X — \
                     another application may have claimed them",
                );
                return;
            }

            crate::logger::info("global hotkeys Alt+Shift+S / Alt+Shift+X registered");

            let mut msg: MSG = std::mem::zeroed();
            // GetMessageW blocks until a message arrives; returns 0 on WM_QUIT
            while GetMessageW(&mut msg, std::ptr::null_mut(), 0, 0) > 0 {
                if msg.message == WM_HOTKEY {
                    match msg.w_param as i32 {
                        START_ID => signals.start.store(true, Ordering::Release),
                        STOP_ID => signals.stop.store(true, Ordering::Release),
                        _ => {}
                    }
                }
            }
        }
    });
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub fn start_hotkey_listener(_signals: Arc<HotkeySignals>) {
    // Global hotkeys not supported on this platform
}
