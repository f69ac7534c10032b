//! XMP file session
//!
//! [`XmpFiles`] is the stateful handle over one file on disk. It classifies
//! the container, picks a handler once at open time, and stages every
//! injection in memory. The file on disk is only written when the session is
//! closed.

use crate::core::error::{XmpError, XmpResult};
use crate::core::metadata::XmpMeta;
use crate::core::packet::XmpPacket;
use crate::files::capability::{capability, select_handler, HandlerChoice};
use crate::files::format::FileFormat;
use crate::files::handler::{FileHandler, XmpOptions};
use crate::files::registry::{default_registry, Handler};
use crate::files::scanner::{PacketLocation, PacketScanner};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

/// Lifecycle state of an [`XmpFiles`] session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No file handle is held
    Closed,
    /// A file is open; injection is refused
    OpenReadOnly,
    /// A file is open; injections are flushed on close
    OpenForUpdate,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Closed => "closed",
            SessionState::OpenReadOnly => "read-only",
            SessionState::OpenForUpdate => "for-update",
        })
    }
}

/// A session over one file's embedded XMP packet
///
/// # File Update Behavior
///
/// When a file is opened with [`XmpOptions::for_update`], packets passed to
/// [`XmpFiles::inject`] are not written to disk immediately. The rewritten
/// container is kept in memory and written back through the held handle when
/// [`XmpFiles::close`] or [`XmpFiles::try_close`] is called, or when the
/// session is dropped.
///
/// # Example
///
/// ```rust,no_run
/// use xmpfiles::{ns, XmpFiles, XmpOptions};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut file = XmpFiles::open_file("image.png", XmpOptions::default().for_update())?;
///
/// let mut meta = file.get_metadata()?;
/// meta.set_property(ns::XMP, "CreatorTool", "MyApp")?;
/// if file.can_inject(&meta) {
///     file.inject(&meta)?;
/// }
///
/// // Changes are written to disk when try_close() is called
/// file.try_close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct XmpFiles {
    /// Path of the most recent open, kept after close for diagnostics
    path: Option<PathBuf>,
    state: Option<OpenFile>,
}

/// Everything a live session owns
#[derive(Debug)]
struct OpenFile {
    file: File,
    format: FileFormat,
    options: XmpOptions,
    choice: HandlerChoice,
    handler: Option<Handler>,
    scanner: PacketScanner,
    packet: Option<Vec<u8>>,
    /// The container has somewhere to write a packet, even if it holds none
    slot: bool,
    /// Whole file content, staged for update sessions only
    data: Option<Vec<u8>>,
    /// Packet position for the generic scanner
    location: Option<PacketLocation>,
    dirty: bool,
}

impl XmpFiles {
    /// Create a closed session
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session and open `path` in one step
    pub fn open_file<P: AsRef<Path>>(path: P, options: XmpOptions) -> XmpResult<Self> {
        let mut files = Self::new();
        files.open(path, options)?;
        Ok(files)
    }

    /// Open `path`, classify it and read its packet
    ///
    /// The option/format combination is validated before anything is read.
    ///
    /// # Errors
    ///
    /// * [`XmpError::AlreadyOpen`] if this session holds a file
    /// * [`XmpError::NotFound`] / [`XmpError::PermissionDenied`] for path problems
    /// * [`XmpError::IllegalOptionCombination`] for forbidden flag/format pairs
    /// * [`XmpError::HandlerFault`] if the container cannot be parsed
    pub fn open<P: AsRef<Path>>(&mut self, path: P, options: XmpOptions) -> XmpResult<()> {
        let path = path.as_ref();
        if self.state.is_some() {
            return Err(XmpError::AlreadyOpen(self.path_string()));
        }
        if path.as_os_str().is_empty() {
            return Err(XmpError::NotFound("empty path".to_string()));
        }

        let metadata = fs::metadata(path).map_err(|e| open_error(e, path))?;
        if !metadata.is_file() {
            return Err(XmpError::NotFound(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let format = FileFormat::classify(path);
        let choice = select_handler(format, &options)?;
        let handler = smart_handler(choice, &options)?;

        let file = OpenOptions::new()
            .read(true)
            .write(options.for_update)
            .open(path)
            .map_err(|e| open_error(e, path))?;

        let state = OpenFile::load(file, format, options, choice, handler)
            .map_err(|e| e.in_handler(format))?;
        log::debug!(
            "Opened {} as {} using {} (packet: {})",
            path.display(),
            format,
            choice,
            state.packet.is_some()
        );

        self.path = Some(path.to_path_buf());
        self.state = Some(state);
        Ok(())
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        match &self.state {
            None => SessionState::Closed,
            Some(s) if s.options.for_update => SessionState::OpenForUpdate,
            Some(_) => SessionState::OpenReadOnly,
        }
    }

    /// Whether a file is currently held
    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Path of the open (or most recently opened) file
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Container format of the open file
    pub fn format(&self) -> XmpResult<FileFormat> {
        Ok(self.open_state()?.format)
    }

    /// Options the file was opened with
    pub fn options(&self) -> XmpResult<XmpOptions> {
        Ok(self.open_state()?.options)
    }

    /// Handler selected at open time
    pub fn handler_choice(&self) -> XmpResult<HandlerChoice> {
        Ok(self.open_state()?.choice)
    }

    /// Whether the file carries a packet
    pub fn has_packet(&self) -> XmpResult<bool> {
        Ok(self.open_state()?.packet.is_some())
    }

    /// Raw packet buffer as located in the file
    ///
    /// # Errors
    ///
    /// [`XmpError::NoPacketFound`] if the file carries no packet.
    pub fn get_packet(&self) -> XmpResult<&[u8]> {
        self.open_state()?
            .packet
            .as_deref()
            .ok_or(XmpError::NoPacketFound)
    }

    /// Metadata parsed from the packet, or an empty [`XmpMeta`] when there is none
    pub fn get_metadata(&self) -> XmpResult<XmpMeta> {
        self.get_metadata_as()
    }

    /// Like [`XmpFiles::get_metadata`], for any [`XmpPacket`] type
    pub fn get_metadata_as<M: XmpPacket>(&self) -> XmpResult<M> {
        match &self.open_state()?.packet {
            Some(packet) => M::from_packet(packet),
            None => Ok(M::default()),
        }
    }

    /// Whether `meta` could be injected now
    ///
    /// Always false for closed and read-only sessions.
    pub fn can_inject<M: XmpPacket>(&self, meta: &M) -> bool {
        if self.state() != SessionState::OpenForUpdate {
            return false;
        }
        meta.to_packet()
            .is_ok_and(|packet| self.can_inject_packet(&packet))
    }

    /// Whether a raw packet of this content could be injected now
    pub fn can_inject_packet(&self, packet: &[u8]) -> bool {
        self.state
            .as_ref()
            .is_some_and(|s| s.check_inject(packet.len()).is_ok())
    }

    /// Serialize `meta` and inject it
    ///
    /// # Errors
    ///
    /// * [`XmpError::UseAfterClose`] if no file is open
    /// * [`XmpError::ReadOnlyViolation`] if the file was not opened for update
    /// * [`XmpError::InjectionUnsupported`] if the format or file state forbids it
    /// * [`XmpError::HandlerFault`] if rewriting the container fails
    pub fn inject<M: XmpPacket>(&mut self, meta: &M) -> XmpResult<()> {
        let state = self.open_state()?;
        if !state.options.for_update {
            return Err(XmpError::ReadOnlyViolation);
        }
        let packet = meta.to_packet()?;
        self.inject_packet(&packet)
    }

    /// Inject a raw packet buffer
    pub fn inject_packet(&mut self, packet: &[u8]) -> XmpResult<()> {
        let state = self.state.as_mut().ok_or(XmpError::UseAfterClose)?;
        let format = state.format;
        state.inject(packet).map_err(|e| e.in_handler(format))?;
        log::debug!("Staged {} byte packet for {}", packet.len(), format);
        Ok(())
    }

    /// Explicitly closes an opened file with error handling.
    ///
    /// Writes staged changes through the held handle and releases it. The
    /// session is closed afterwards even when the write fails. Closing a
    /// closed session does nothing.
    pub fn try_close(&mut self) -> XmpResult<()> {
        let Some(mut state) = self.state.take() else {
            return Ok(());
        };
        state.flush()?;
        log::debug!("Closed {}", self.path_string());
        Ok(())
    }

    /// Explicitly closes an opened file.
    ///
    /// Like [`XmpFiles::try_close`], but a failed write is only logged.
    pub fn close(&mut self) {
        if let Err(e) = self.try_close() {
            log::warn!("Failed to write {}: {}", self.path_string(), e);
        }
    }

    fn open_state(&self) -> XmpResult<&OpenFile> {
        self.state.as_ref().ok_or(XmpError::UseAfterClose)
    }

    fn path_string(&self) -> String {
        self.path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }
}

impl Drop for XmpFiles {
    fn drop(&mut self) {
        self.close();
    }
}

/// Renders `XMPFiles(file_path='<path>')`, or `XMPFiles()` before the first
/// open. The alternate form `{:#}` also names the session state.
impl fmt::Display for XmpFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            None => f.write_str("XMPFiles()"),
            Some(path) if f.alternate() => write!(
                f,
                "XMPFiles(file_path='{}', state={})",
                path.display(),
                self.state()
            ),
            Some(path) => write!(f, "XMPFiles(file_path='{}')", path.display()),
        }
    }
}

impl OpenFile {
    fn load(
        mut file: File,
        format: FileFormat,
        options: XmpOptions,
        choice: HandlerChoice,
        handler: Option<Handler>,
    ) -> XmpResult<Self> {
        let scanner = PacketScanner::for_format(format, &options);
        if let Some(handler) = &handler {
            if !handler.can_handle(&mut file)? {
                return Err(XmpError::fault(
                    format,
                    format!("File content is not a valid {} container", format),
                ));
            }
        }

        let mut data = None;
        let mut slot = None;
        let (packet, location) = match &handler {
            Some(handler) if options.for_update => {
                let content = read_all(&mut file)?;
                let packet = handler.read_packet(&mut Cursor::new(content.as_slice()))?;
                if packet.is_none() {
                    slot = Some(handler.has_packet_slot(&mut Cursor::new(content.as_slice()))?);
                }
                data = Some(content);
                (packet, None)
            }
            Some(handler) => {
                // Read-only sessions stream from the handle
                file.rewind()?;
                (handler.read_packet(&mut BufReader::new(&mut file))?, None)
            }
            None => {
                let content = read_all(&mut file)?;
                let found = scanner
                    .read(&content)
                    .map(|(loc, bytes)| (bytes.to_vec(), loc));
                if options.for_update {
                    data = Some(content);
                }
                match found {
                    Some((packet, loc)) => (Some(packet), Some(loc)),
                    None => (None, None),
                }
            }
        };

        Ok(Self {
            file,
            format,
            options,
            choice,
            handler,
            scanner,
            slot: slot.unwrap_or(packet.is_some()),
            packet,
            data,
            location,
            dirty: false,
        })
    }

    /// Every reason a packet of `len` bytes would be refused
    fn check_inject(&self, len: usize) -> XmpResult<()> {
        if !self.options.for_update {
            return Err(XmpError::ReadOnlyViolation);
        }
        let caps = capability(self.format);
        if let Some(max) = caps.max_packet_len {
            if len as u64 > max {
                return Err(XmpError::InjectionUnsupported(format!(
                    "{} packet of {} bytes exceeds the {} byte limit",
                    self.format, len, max
                )));
            }
        }
        match self.handler {
            Some(_) if !self.slot && !caps.can_inject_without_existing_packet => {
                Err(XmpError::InjectionUnsupported(format!(
                    "{} file has no metadata slot to write a packet into",
                    self.format
                )))
            }
            Some(_) => Ok(()),
            None if self.scanner.can_write(self.location.as_ref(), len) => Ok(()),
            None => Err(XmpError::InjectionUnsupported(format!(
                "Packet scanner cannot place a {} byte packet in this {} file",
                len, self.format
            ))),
        }
    }

    fn inject(&mut self, packet: &[u8]) -> XmpResult<()> {
        self.check_inject(packet.len())?;
        let data = self.data.as_deref().ok_or(XmpError::ReadOnlyViolation)?;

        match self.handler {
            Some(handler) => {
                let mut out = Cursor::new(Vec::with_capacity(data.len() + packet.len()));
                handler.write_packet(&mut Cursor::new(data), &mut out, packet)?;
                self.data = Some(out.into_inner());
                self.packet = Some(packet.to_vec());
                self.slot = true;
            }
            None => {
                let content = self.scanner.write(data, self.location.as_ref(), packet)?;
                self.location = self.scanner.find_packet(&content);
                self.packet = self.location.map(|loc| content[loc.range()].to_vec());
                self.data = Some(content);
            }
        }
        self.dirty = true;
        Ok(())
    }

    /// Write staged content back through the handle
    fn flush(&mut self) -> XmpResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let Some(data) = &self.data else {
            return Ok(());
        };
        self.file.rewind()?;
        self.file.write_all(data)?;
        self.file.set_len(data.len() as u64)?;
        self.file.sync_all()?;
        self.dirty = false;
        log::debug!("Flushed {} bytes of {}", data.len(), self.format);
        Ok(())
    }
}

/// Look up the smart handler for `choice` and confirm it accepts `options`
fn smart_handler(choice: HandlerChoice, options: &XmpOptions) -> XmpResult<Option<Handler>> {
    let HandlerChoice::Smart(format) = choice else {
        return Ok(None);
    };
    let handler = default_registry()
        .find_by_format(format)
        .copied()
        .ok_or_else(|| XmpError::fault(format, "No smart handler registered"))?;
    if !handler.supports(options) {
        return Err(XmpError::IllegalOptionCombination(format!(
            "The {} smart handler does not support {:?}",
            format, options
        )));
    }
    Ok(Some(handler))
}

fn read_all(file: &mut File) -> io::Result<Vec<u8>> {
    file.rewind()?;
    let mut content = Vec::new();
    file.read_to_end(&mut content)?;
    Ok(content)
}

/// Map a filesystem error to the session taxonomy
fn open_error(err: io::Error, path: &Path) -> XmpError {
    match err.kind() {
        io::ErrorKind::NotFound => XmpError::NotFound(path.display().to_string()),
        io::ErrorKind::PermissionDenied => XmpError::PermissionDenied(path.display().to_string()),
        _ => XmpError::IoError(err),
    }
}
