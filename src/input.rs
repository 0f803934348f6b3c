//! Selected input files and the drop-zone adapter that produces them.
//!
//! A host can hand files to a job two ways: a file picker or drag and drop.
//! [`DropZone`] folds both into one "files selected" callback, tracks the
//! drag-over highlight, and decides which clicks open the picker.

use crate::error::ConvertError;
use bytes::Bytes;
use std::path::Path;
use tracing::debug;

const VIDEO_EXTENSIONS: [&str; 5] = [".mp4", ".webm", ".avi", ".mkv", ".mov"];

/// A file chosen by the user, held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl SelectedFile {
    /// Wrap in-memory bytes. A missing or blank MIME type is guessed from
    /// the file name.
    pub fn new(name: impl Into<String>, mime_type: Option<&str>, bytes: impl Into<Bytes>) -> Self {
        let name = name.into();
        let mime_type = match mime_type.map(str::trim).filter(|m| !m.is_empty()) {
            Some(m) => m.to_string(),
            None => mime_guess::from_path(&name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        };
        Self {
            name,
            mime_type,
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ConvertError::InputReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        debug!("Loaded {} ({} bytes)", name, bytes.len());
        Ok(Self::new(name, None, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Extension including the dot, lower-cased; empty when there is none.
    pub fn extension(&self) -> String {
        match self.name.rfind('.') {
            Some(i) if i > 0 => self.name[i..].to_lowercase(),
            _ => String::new(),
        }
    }

    /// Name without its last extension.
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(i) if i > 0 => &self.name[..i],
            _ => &self.name,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == "application/pdf" || self.extension() == ".pdf"
    }

    pub fn is_video(&self) -> bool {
        is_video_file(&self.name, &self.mime_type)
    }
}

/// Video by MIME type, or by extension when the type says nothing.
pub fn is_video_file(name: &str, mime_type: &str) -> bool {
    if mime_type.starts_with("video/") {
        return true;
    }
    let lower = name.to_lowercase();
    VIDEO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

// ── Drop zone ────────────────────────────────────────────────────────────

/// What a click landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    /// The zone itself or anything without its own behaviour.
    Zone,
    /// An embedded audio/video preview control.
    PlaybackControl,
    /// The "remove file" button.
    RemoveButton,
}

/// Host events delivered to a [`DropZone`].
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneEvent {
    Click(ClickTarget),
    DragOver,
    DragLeave,
    Drop(Vec<SelectedFile>),
    /// The picker closed with this selection.
    PickerChange(Vec<SelectedFile>),
}

/// What the host should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneAction {
    /// Open the file picker.
    OpenPicker,
    /// Files were handed to the callback.
    FilesSelected,
    /// Stop propagation; nothing else happens.
    Consumed,
    None,
}

/// Unifies picker and drag-and-drop selection.
pub struct DropZone<F>
where
    F: FnMut(Vec<SelectedFile>),
{
    on_files: F,
    drag_over: bool,
}

impl<F> DropZone<F>
where
    F: FnMut(Vec<SelectedFile>),
{
    pub fn new(on_files: F) -> Self {
        Self {
            on_files,
            drag_over: false,
        }
    }

    /// Whether the drag-over highlight is showing.
    pub fn is_drag_over(&self) -> bool {
        self.drag_over
    }

    pub fn handle(&mut self, event: ZoneEvent) -> ZoneAction {
        match event {
            ZoneEvent::Click(ClickTarget::Zone) => ZoneAction::OpenPicker,
            ZoneEvent::Click(ClickTarget::PlaybackControl | ClickTarget::RemoveButton) => {
                ZoneAction::Consumed
            }
            ZoneEvent::DragOver => {
                self.drag_over = true;
                ZoneAction::None
            }
            ZoneEvent::DragLeave => {
                self.drag_over = false;
                ZoneAction::None
            }
            ZoneEvent::Drop(files) => {
                self.drag_over = false;
                self.deliver(files)
            }
            ZoneEvent::PickerChange(files) => self.deliver(files),
        }
    }

    fn deliver(&mut self, files: Vec<SelectedFile>) -> ZoneAction {
        if files.is_empty() {
            return ZoneAction::None;
        }
        (self.on_files)(files);
        ZoneAction::FilesSelected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> SelectedFile {
        SelectedFile::new(name, None, Bytes::from_static(b"x"))
    }

    #[test]
    fn mime_guessed_from_name() {
        assert_eq!(file("photo.PNG").mime_type, "image/png");
        assert_eq!(file("doc.pdf").mime_type, "application/pdf");
        assert_eq!(file("blob").mime_type, "application/octet-stream");
        let explicit = SelectedFile::new("a.bin", Some("audio/mpeg"), Vec::new());
        assert_eq!(explicit.mime_type, "audio/mpeg");
    }

    #[test]
    fn stem_and_extension() {
        let f = file("report.final.PDF");
        assert_eq!(f.stem(), "report.final");
        assert_eq!(f.extension(), ".pdf");
        let bare = file("README");
        assert_eq!(bare.stem(), "README");
        assert_eq!(bare.extension(), "");
        assert_eq!(file(".hidden").stem(), ".hidden");
    }

    #[test]
    fn video_detection() {
        assert!(is_video_file("clip.bin", "video/mp4"));
        assert!(is_video_file("CLIP.MKV", ""));
        assert!(!is_video_file("song.mp3", "audio/mpeg"));
    }

    #[test]
    fn drop_and_picker_share_callback() {
        let mut received = Vec::new();
        let mut zone = DropZone::new(|files: Vec<SelectedFile>| {
            received.extend(files.into_iter().map(|f| f.name))
        });

        assert_eq!(zone.handle(ZoneEvent::DragOver), ZoneAction::None);
        assert!(zone.is_drag_over());
        assert_eq!(
            zone.handle(ZoneEvent::Drop(vec![file("a.png")])),
            ZoneAction::FilesSelected
        );
        assert!(!zone.is_drag_over());
        assert_eq!(
            zone.handle(ZoneEvent::PickerChange(vec![file("b.png")])),
            ZoneAction::FilesSelected
        );
        drop(zone);
        assert_eq!(received, vec!["a.png", "b.png"]);
    }

    #[test]
    fn clicks_on_controls_do_not_open_picker() {
        let mut zone = DropZone::new(|_: Vec<SelectedFile>| {});
        assert_eq!(zone.handle(ZoneEvent::Click(ClickTarget::Zone)), ZoneAction::OpenPicker);
        assert_eq!(
            zone.handle(ZoneEvent::Click(ClickTarget::PlaybackControl)),
            ZoneAction::Consumed
        );
        assert_eq!(
            zone.handle(ZoneEvent::Click(ClickTarget::RemoveButton)),
            ZoneAction::Consumed
        );
    }

    #[test]
    fn drag_leave_clears_highlight() {
        let mut zone = DropZone::new(|_: Vec<SelectedFile>| {});
        zone.handle(ZoneEvent::DragOver);
        zone.handle(ZoneEvent::DragLeave);
        assert!(!zone.is_drag_over());
    }

    #[tokio::test]
    async fn from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        std::fs::write(&path, b"ID3").unwrap();
        let f = SelectedFile::from_path(&path).await.unwrap();
        assert_eq!(f.name, "song.mp3");
        assert_eq!(f.mime_type, "audio/mpeg");
        assert_eq!(f.size(), 3);
    }

    #[tokio::test]
    async fn from_path_missing_file() {
        let err = SelectedFile::from_path("/definitely/not/here.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::InputReadFailed { .. }));
    }
}
