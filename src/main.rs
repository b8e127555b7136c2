// Prevents additional console window on Windows (silent launch).
#![cfg_attr(all(target_os = "windows", not(debug_assertions)), windows_subsystem = "windows")]

fn main() {
    gidit_lib::run();
}
