//! evdev-based raw-device listener
//!
//! Reads key events from the Linux input subsystem directly, which works on
//! all Wayland compositors because it bypasses the display server. The
//! user must be in the 'input' group to access /dev/input/*.
//!
//! The listener thread waits in poll(2) over the device fds plus a control
//! pipe; stop() writes a byte to the pipe to wake the wait immediately
//! instead of relying on a timeout.

use super::{InputListener, KeyInput};
use crate::error::HotkeyError;
use crate::keys::KeyId;
use evdev::{Device, InputEventKind, Key};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::PathBuf;
use tokio::sync::mpsc;

/// evdev-based raw-device listener
pub struct EvdevListener {
    /// Paths to keyboard devices discovered at construction
    device_paths: Vec<PathBuf>,
    /// Write end of the stop pipe while running
    stop_fd: Option<RawFd>,
    /// Handle to the blocking listener task
    task: Option<tokio::task::JoinHandle<()>>,
}

impl EvdevListener {
    /// Discover keyboard devices. Fails when no device can be opened at
    /// all; individual unopenable devices are tolerated and logged.
    pub fn new() -> Result<Self, HotkeyError> {
        let device_paths = find_keyboard_devices()?;

        tracing::debug!(
            "Found {} keyboard device(s): {:?}",
            device_paths.len(),
            device_paths
        );

        Ok(Self {
            device_paths,
            stop_fd: None,
            task: None,
        })
    }
}

#[async_trait::async_trait]
impl InputListener for EvdevListener {
    async fn start(&mut self) -> Result<mpsc::Receiver<KeyInput>, HotkeyError> {
        if self.task.is_some() {
            self.stop().await?;
        }

        let (tx, rx) = mpsc::channel(64);
        let (pipe_read, pipe_write) = make_pipe()?;
        self.stop_fd = Some(pipe_write);

        let device_paths = self.device_paths.clone();
        self.task = Some(tokio::task::spawn_blocking(move || {
            listener_loop(device_paths, pipe_read, tx);
        }));

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), HotkeyError> {
        if let Some(fd) = self.stop_fd.take() {
            // Wake the poll loop; the loop closes the read end on exit.
            unsafe {
                let byte = 0u8;
                libc::write(fd, &byte as *const u8 as *const libc::c_void, 1);
                libc::close(fd);
            }
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "evdev"
    }
}

impl Drop for EvdevListener {
    fn drop(&mut self) {
        if let Some(fd) = self.stop_fd.take() {
            unsafe {
                let byte = 0u8;
                libc::write(fd, &byte as *const u8 as *const libc::c_void, 1);
                libc::close(fd);
            }
        }
    }
}

/// Create a pipe used to cancel the blocking poll wait.
fn make_pipe() -> Result<(RawFd, RawFd), HotkeyError> {
    let mut fds = [0 as RawFd; 2];
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if rc != 0 {
        return Err(HotkeyError::Evdev(format!(
            "pipe creation failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok((fds[0], fds[1]))
}

/// Main listener loop running in a blocking task
fn listener_loop(device_paths: Vec<PathBuf>, stop_fd: RawFd, tx: mpsc::Sender<KeyInput>) {
    // Open all keyboard devices in non-blocking mode
    let mut devices: Vec<Device> = device_paths
        .iter()
        .filter_map(|path| match Device::open(path) {
            Ok(device) => {
                let fd = device.as_raw_fd();
                unsafe {
                    let flags = libc::fcntl(fd, libc::F_GETFL);
                    if flags != -1 {
                        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
                    }
                }
                tracing::debug!("Opened device (non-blocking): {:?}", path);
                Some(device)
            }
            Err(e) => {
                tracing::warn!("Failed to open {:?}: {}", path, e);
                None
            }
        })
        .collect();

    if devices.is_empty() {
        tracing::error!("No keyboard devices could be opened");
        close_fd(stop_fd);
        return;
    }

    'outer: loop {
        // Wait for input on any device or the stop pipe. The timeout is a
        // backstop only; stop() wakes the wait through the pipe.
        let mut pollfds: Vec<libc::pollfd> = devices
            .iter()
            .map(|d| libc::pollfd {
                fd: d.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();
        pollfds.push(libc::pollfd {
            fd: stop_fd,
            events: libc::POLLIN,
            revents: 0,
        });

        let rc = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, 1000) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            tracing::error!("poll failed: {}", err);
            break;
        }

        // Stop pipe is the last entry
        if pollfds[pollfds.len() - 1].revents != 0 {
            tracing::debug!("Hotkey listener stopping");
            break;
        }

        let mut disconnected: Vec<usize> = Vec::new();
        for (idx, device) in devices.iter_mut().enumerate() {
            if pollfds[idx].revents == 0 {
                continue;
            }
            match device.fetch_events() {
                Ok(events) => {
                    for event in events {
                        if let InputEventKind::Key(key) = event.kind() {
                            let Some(key) = KeyId::from_evdev(key) else {
                                continue;
                            };
                            let input = match event.value() {
                                1 => KeyInput { key, pressed: true },
                                0 => KeyInput {
                                    key,
                                    pressed: false,
                                },
                                // value 2 is auto-repeat
                                _ => continue,
                            };
                            if tx.blocking_send(input).is_err() {
                                // Receiver gone; shut down.
                                break 'outer;
                            }
                        }
                    }
                }
                Err(e) if e.raw_os_error() == Some(libc::EAGAIN) => {}
                Err(e) => {
                    tracing::debug!("Device disconnected: {}", e);
                    disconnected.push(idx);
                }
            }
        }
        for idx in disconnected.into_iter().rev() {
            devices.remove(idx);
        }
        if devices.is_empty() {
            tracing::error!("All keyboard devices disconnected");
            break;
        }
    }

    drop(devices);
    close_fd(stop_fd);
}

fn close_fd(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

/// Find all keyboard input devices
fn find_keyboard_devices() -> Result<Vec<PathBuf>, HotkeyError> {
    let mut keyboards = Vec::new();
    let mut denied: Option<PathBuf> = None;

    let input_dir = std::fs::read_dir("/dev/input")
        .map_err(|e| HotkeyError::DeviceAccess(format!("/dev/input: {}", e)))?;

    for entry in input_dir {
        let entry = entry.map_err(|e| HotkeyError::DeviceAccess(e.to_string()))?;
        let path = entry.path();

        let is_event_device = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("event"))
            .unwrap_or(false);

        if !is_event_device {
            continue;
        }

        match Device::open(&path) {
            Ok(device) => {
                // A keyboard should have at least the letter keys
                let has_keys = device
                    .supported_keys()
                    .map(|keys| {
                        keys.contains(Key::KEY_A)
                            && keys.contains(Key::KEY_Z)
                            && keys.contains(Key::KEY_ENTER)
                    })
                    .unwrap_or(false);

                if has_keys {
                    tracing::debug!(
                        "Found keyboard: {:?} ({:?})",
                        path,
                        device.name().unwrap_or("unknown")
                    );
                    keyboards.push(path);
                }
            }
            Err(e) => {
                // Permission denied is common for non-input-group users;
                // fatal only when nothing else can be opened.
                if e.kind() == std::io::ErrorKind::PermissionDenied {
                    denied = Some(path);
                } else {
                    tracing::trace!("Skipping {:?}: {}", path, e);
                }
            }
        }
    }

    if keyboards.is_empty() {
        if let Some(path) = denied {
            return Err(HotkeyError::DeviceAccess(path.display().to_string()));
        }
        return Err(HotkeyError::NoInputSource);
    }

    Ok(keyboards)
}
