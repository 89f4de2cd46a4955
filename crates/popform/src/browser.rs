use std::io;
use std::path::Path;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

/// App-mode window dimensions; the form is meant to read as a dialog, not a
/// full browser window.
pub const APP_WINDOW_WIDTH: u32 = 500;
pub const APP_WINDOW_HEIGHT: u32 = 600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowGeometry {
    pub width: u32,
    pub height: u32,
    pub position: Option<(u32, u32)>,
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("every browser launch strategy failed: {0}")]
    AllStrategiesFailed(#[source] io::Error),
}

/// Process-spawn primitive behind the launcher, substitutable in tests so
/// the fallback chain is table-testable without starting real browsers.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Starts a command without waiting for it to exit. Ok means the process
    /// came up, which is all "this strategy worked" requires.
    async fn spawn(&self, command: &LaunchCommand) -> io::Result<()>;

    /// Runs a command to completion and captures stdout; used for the
    /// best-effort screen probes.
    async fn output(&self, program: &str, args: &[&str]) -> io::Result<String>;

    /// The platform's generic "open this URL in the default application"
    /// behavior, the last rung of the fallback chain.
    fn open_default(&self, url: &str) -> io::Result<()> {
        webbrowser::open(url)
    }
}

pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn spawn(&self, command: &LaunchCommand) -> io::Result<()> {
        tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map(|_| ())
    }

    async fn output(&self, program: &str, args: &[&str]) -> io::Result<String> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .output()
            .await?;
        if !output.status.success() {
            return Err(io::Error::other(format!(
                "{program} exited with {}",
                output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Opens `url` in an app-mode browser window, trying each OS-specific
/// strategy in order and degrading to the default browser. Every invocation
/// is independent; there is no shared state and no retry beyond the fixed
/// strategy list.
pub async fn open_browser(url: &str, runner: &dyn CommandRunner) -> Result<(), LaunchError> {
    let screen = probe_screen_size(runner).await;
    let geometry = centered_geometry(screen);
    // A fresh profile forces a new browser instance; window-placement flags
    // are ignored when the command just hands the URL to a running one.
    let profile_dir =
        std::env::temp_dir().join(format!("popform-profile-{}", Uuid::new_v4().simple()));

    for command in launch_plan(url, &geometry, &profile_dir) {
        match runner.spawn(&command).await {
            Ok(()) => {
                debug!(program = %command.program, "launched app-mode browser");
                return Ok(());
            }
            Err(error) => {
                debug!(program = %command.program, %error, "app-mode launch attempt failed");
            }
        }
    }

    runner
        .open_default(url)
        .map_err(LaunchError::AllStrategiesFailed)
}

pub fn centered_geometry(screen: Option<ScreenSize>) -> WindowGeometry {
    WindowGeometry {
        width: APP_WINDOW_WIDTH,
        height: APP_WINDOW_HEIGHT,
        position: screen.map(|screen| {
            (
                screen.width.saturating_sub(APP_WINDOW_WIDTH) / 2,
                screen.height.saturating_sub(APP_WINDOW_HEIGHT) / 2,
            )
        }),
    }
}

/// Ordered app-mode strategies for the current platform. Evaluated in order;
/// the first command that starts wins.
pub fn launch_plan(url: &str, geometry: &WindowGeometry, profile_dir: &Path) -> Vec<LaunchCommand> {
    let mut window_flags = vec![
        format!("--app={url}"),
        format!("--window-size={},{}", geometry.width, geometry.height),
    ];
    if let Some((x, y)) = geometry.position {
        window_flags.push(format!("--window-position={x},{y}"));
    }
    window_flags.push(format!("--user-data-dir={}", profile_dir.display()));
    window_flags.push("--new-window".to_string());

    platform_plan(&window_flags)
}

#[cfg(target_os = "windows")]
fn platform_plan(window_flags: &[String]) -> Vec<LaunchCommand> {
    // Edge ships with Windows, so it goes first.
    ["msedge", "chrome"]
        .into_iter()
        .map(|browser| {
            let mut args: Vec<String> = ["/C", "start", ""].map(String::from).to_vec();
            args.push(browser.to_string());
            args.extend(window_flags.iter().cloned());
            LaunchCommand {
                program: "cmd".to_string(),
                args,
            }
        })
        .collect()
}

#[cfg(target_os = "macos")]
fn platform_plan(window_flags: &[String]) -> Vec<LaunchCommand> {
    ["Google Chrome", "Microsoft Edge"]
        .into_iter()
        .map(|app| {
            let mut args: Vec<String> = ["-n", "-a", app, "--args"].map(String::from).to_vec();
            args.extend(window_flags.iter().cloned());
            LaunchCommand {
                program: "open".to_string(),
                args,
            }
        })
        .collect()
}

#[cfg(all(unix, not(target_os = "macos")))]
fn platform_plan(window_flags: &[String]) -> Vec<LaunchCommand> {
    ["google-chrome", "chromium-browser", "chromium", "microsoft-edge"]
        .into_iter()
        .map(|browser| LaunchCommand {
            program: browser.to_string(),
            args: window_flags.to_vec(),
        })
        .collect()
}

#[cfg(not(any(unix, target_os = "windows")))]
fn platform_plan(_window_flags: &[String]) -> Vec<LaunchCommand> {
    Vec::new()
}

/// Best-effort primary screen probe for centering; silently None when the
/// platform tooling is missing or its output is unrecognized.
pub async fn probe_screen_size(runner: &dyn CommandRunner) -> Option<ScreenSize> {
    platform_screen_size(runner).await
}

#[cfg(target_os = "windows")]
async fn platform_screen_size(runner: &dyn CommandRunner) -> Option<ScreenSize> {
    const PROBE: &str = "Add-Type -AssemblyName System.Windows.Forms; \
        [System.Windows.Forms.Screen]::PrimaryScreen.Bounds | \
        Select-Object Width,Height | ConvertTo-Json";
    let output = runner.output("powershell", &["-Command", PROBE]).await.ok()?;
    parse_windows_bounds(&output)
}

#[cfg(target_os = "macos")]
async fn platform_screen_size(runner: &dyn CommandRunner) -> Option<ScreenSize> {
    let output = runner
        .output("system_profiler", &["SPDisplaysDataType"])
        .await
        .ok()?;
    parse_macos_resolution(&output)
}

#[cfg(all(unix, not(target_os = "macos")))]
async fn platform_screen_size(runner: &dyn CommandRunner) -> Option<ScreenSize> {
    let output = runner.output("xdpyinfo", &[]).await.ok()?;
    parse_xdpyinfo_dimensions(&output)
}

#[cfg(not(any(unix, target_os = "windows")))]
async fn platform_screen_size(_runner: &dyn CommandRunner) -> Option<ScreenSize> {
    None
}

fn parse_windows_bounds(output: &str) -> Option<ScreenSize> {
    let value: serde_json::Value = serde_json::from_str(output.trim()).ok()?;
    Some(ScreenSize {
        width: u32::try_from(value.get("Width")?.as_u64()?).ok()?,
        height: u32::try_from(value.get("Height")?.as_u64()?).ok()?,
    })
}

fn parse_macos_resolution(output: &str) -> Option<ScreenSize> {
    for line in output.lines() {
        let Some(rest) = line.trim().strip_prefix("Resolution:") else {
            continue;
        };
        let mut tokens = rest.split_whitespace();
        let width = tokens.next()?.parse().ok()?;
        if tokens.next()? != "x" {
            return None;
        }
        let height = tokens.next()?.parse().ok()?;
        return Some(ScreenSize { width, height });
    }
    None
}

fn parse_xdpyinfo_dimensions(output: &str) -> Option<ScreenSize> {
    for line in output.lines() {
        let Some(rest) = line.trim().strip_prefix("dimensions:") else {
            continue;
        };
        let (width, height) = rest.split_whitespace().next()?.split_once('x')?;
        return Some(ScreenSize {
            width: width.parse().ok()?,
            height: height.parse().ok()?,
        });
    }
    None
}
