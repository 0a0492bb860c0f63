/// softrast terminal viewer
///
/// Loads a textured OBJ scene and renders it on the terminal.
/// Controls:
///   - WASD: Move
///   - Space: Descend
///   - Mouse / Arrow Keys: Look around
///   - Q/ESC: Quit

use std::process::ExitCode;

use env_logger::Env;
use softrast_core::{HostCpu, ObjSceneLoader, ViewerConfig};
use softrast_terminal::{startup, AppError, TerminalApp};

fn run() -> Result<(), AppError> {
    let scene = startup(&HostCpu, std::env::args(), &ObjSceneLoader)?;
    log::info!(
        "Scene ready: {} geometries, {} triangles",
        scene.geometries.len(),
        scene.triangle_count()
    );

    let mut app = TerminalApp::new(scene, ViewerConfig::default())?;
    app.run()
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::debug!("{:?}", err);
            eprintln!("{}", err);
            ExitCode::from(1)
        }
    }
}
