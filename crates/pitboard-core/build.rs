#[cfg(feature = "tauri")]
const COMMANDS: &[&str] = &["ipc_invoke", "telemetry_status"];

fn main() {
    #[cfg(feature = "tauri")]
    tauri_plugin::Builder::new(COMMANDS).build();
}
