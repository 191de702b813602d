use cgmath::Vector2;
use iced::event::{self, Event};
use iced::futures::channel::mpsc;
use iced::futures::{SinkExt, StreamExt};
use iced::keyboard::{self, key::Named, Key};
use iced::widget::{
    button, column, container, horizontal_space, image, pick_list, progress_bar, responsive, row,
    scrollable, stack, text, text_input, Canvas,
};
use iced::{Alignment, Color, ContentFit, Element, Length, Padding, Subscription, Task, Theme};
use rfd::{FileDialog, MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use matchday_gallery::config::GalleryConfig;
use matchday_gallery::delete::{self, BulkDeleteReport, DeletionCoordinator, DeletionOutcome};
use matchday_gallery::download::{DirectoryDownloader, DownloadSink};
use matchday_gallery::error::DeleteError;
use matchday_gallery::ingest::{self, BatchReport, CandidateFile, FfprobeDurationProbe, IngestionPipeline};
use matchday_gallery::repo::{LocalRepository, MediaRepository, Viewer};
use matchday_gallery::state::batch::{BatchProgress, UploadTemplate};
use matchday_gallery::state::data::{MediaKind, MediaRecord};
use matchday_gallery::state::lightbox::{Direction, GestureSample, LightboxController, LightboxKey, Session};
use matchday_gallery::state::liveness::{LiveToken, Liveness};
use matchday_gallery::state::selection::{self, DownloadReport, SelectionManager};
use matchday_gallery::state::store::{position_in, MediaStore, TypeFilter, ViewFilter};

mod ui;

/// Extensions offered by the upload file picker
const MEDIA_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff", "heic", "mp4", "mov", "m4v", "webm",
];

/// Main application state
struct Gallery {
    repo: Arc<dyn MediaRepository>,
    viewer: Arc<Viewer>,
    pipeline: Arc<IngestionPipeline>,
    deleter: Arc<DeletionCoordinator>,
    download_dir: PathBuf,
    download_delay: Duration,

    store: MediaStore,
    filter: ViewFilter,
    lightbox: LightboxController,
    selection: SelectionManager,

    /// Metadata applied to the next upload batch
    template: UploadTemplate,
    /// Raw text of the players field
    tags_input: String,
    /// Progress of the running batch, if the panel is showing one
    upload: Option<BatchProgress>,
    /// Summary of the last batch, kept until dismissed
    report: Option<Arc<BatchReport>>,

    loads: Liveness,
    uploads: Liveness,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    Refresh,
    Loaded(LiveToken, Result<Vec<MediaRecord>, String>),

    TypeFilterChanged(TypeFilter),
    TagFilterChanged(String),

    Open(String),
    CloseLightbox,
    Navigate(Direction),
    Gesture(GestureSample),
    Key(LightboxKey),

    ToggleSelect(String),
    ClearSelection,
    DownloadSelected,
    DownloadOne(String),
    DownloadFinished(DownloadReport),

    DeleteRequested(String),
    Deleted(String, Result<DeletionOutcome, String>),
    DeleteSelected,
    BulkDeleted(Arc<BulkDeleteReport>),

    CaptionChanged(String),
    TagsChanged(String),
    AlbumChanged(String),
    PickFiles,
    PickFolder,
    UploadProgress(BatchProgress),
    UploadFinished(LiveToken, Arc<BatchReport>),
    HideUpload,
    DismissReport,
}

impl Gallery {
    fn new(config: GalleryConfig, repo: LocalRepository) -> (Self, Task<Message>) {
        let repo: Arc<dyn MediaRepository> = Arc::new(repo);
        let viewer = Arc::new(config.viewer());

        let pipeline = IngestionPipeline::new(
            repo.clone(),
            viewer.clone(),
            Arc::new(FfprobeDurationProbe::default()),
            config.limits.clone(),
        );
        let deleter = DeletionCoordinator::new(repo.clone(), viewer.clone());

        tracing::info!(
            viewer = ?viewer.id,
            admin = viewer.admin,
            "gallery initialized"
        );

        let mut gallery = Gallery {
            repo,
            viewer,
            pipeline: Arc::new(pipeline),
            deleter: Arc::new(deleter),
            download_dir: config.download_dir(),
            download_delay: config.download_delay(),
            store: MediaStore::new(),
            filter: ViewFilter::default(),
            lightbox: LightboxController::new(),
            selection: SelectionManager::new(),
            template: UploadTemplate::new(),
            tags_input: String::new(),
            upload: None,
            report: None,
            loads: Liveness::new(),
            uploads: Liveness::new(),
            status: String::new(),
        };
        let task = gallery.refresh();
        (gallery, task)
    }

    /// Reload the store; a newer refresh supersedes an older one
    fn refresh(&mut self) -> Task<Message> {
        self.loads.invalidate();
        let token = self.loads.token();
        let repo = self.repo.clone();
        self.status = "Loading…".to_string();

        Task::perform(
            async move {
                MediaStore::fetch_all(repo.as_ref())
                    .await
                    .map_err(|e| e.to_string())
            },
            move |result| Message::Loaded(token.clone(), result),
        )
    }

    /// Keep selection and lightbox consistent with the current view
    fn sync_view(&mut self) {
        let view = self.store.view(&self.filter);
        self.selection.retain_visible(&view);
        self.lightbox.reconcile(&view);
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Refresh => return self.refresh(),
            Message::Loaded(token, result) => {
                if !token.is_live() {
                    tracing::debug!("dropping superseded load");
                    return Task::none();
                }
                match result {
                    Ok(records) => {
                        self.store.replace(records);
                        self.sync_view();
                        let counts = self.store.counts();
                        self.status = format!("{} photos, {} videos.", counts.photos, counts.videos);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "loading gallery failed");
                        self.status = format!("Could not load the gallery: {e}");
                    }
                }
            }

            Message::TypeFilterChanged(kind) => {
                self.filter.kind = kind;
                self.sync_view();
            }
            Message::TagFilterChanged(tag) => {
                self.filter.tag = tag;
                self.sync_view();
            }

            Message::Open(id) => {
                let view = self.store.view(&self.filter);
                if let Some(index) = position_in(&view, &id) {
                    self.lightbox.open(view[index], index);
                }
            }
            Message::CloseLightbox => self.lightbox.close(),
            Message::Navigate(direction) => {
                let view = self.store.view(&self.filter);
                self.lightbox.navigate(direction, &view);
            }
            Message::Gesture(sample) => {
                let view = self.store.view(&self.filter);
                self.lightbox.on_gesture(sample, &view);
            }
            Message::Key(key) => {
                let view = self.store.view(&self.filter);
                self.lightbox.on_key(key, &view);
            }

            Message::ToggleSelect(id) => {
                self.selection.toggle(&id);
            }
            Message::ClearSelection => self.selection.clear(),
            Message::DownloadSelected => {
                let view = self.store.view(&self.filter);
                let records: Vec<MediaRecord> =
                    self.selection.selected_in(&view).into_iter().cloned().collect();
                return self.download(records);
            }
            Message::DownloadOne(id) => {
                let records = self.store.get(&id).cloned().into_iter().collect();
                return self.download(records);
            }
            Message::DownloadFinished(report) => {
                self.status = report.summary();
            }

            Message::DeleteRequested(id) => {
                let Some(record) = self.store.get(&id).cloned() else {
                    return Task::none();
                };
                if !self.deleter.may_delete(&record) {
                    self.status = DeleteError::PermissionDenied.to_string();
                    return Task::none();
                }
                let prompt = format!("Delete \"{}\"? This cannot be undone.", record.display_name());
                if !confirm(&prompt) {
                    return Task::none();
                }

                let deleter = self.deleter.clone();
                return Task::perform(
                    async move { deleter.execute(&record).await.map_err(|e| e.to_string()) },
                    move |result| Message::Deleted(id.clone(), result),
                );
            }
            Message::Deleted(id, result) => match result {
                Ok(outcome) => {
                    delete::reconcile(
                        &id,
                        &mut self.store,
                        &mut self.lightbox,
                        &mut self.selection,
                        &self.filter,
                    );
                    self.status = match outcome {
                        DeletionOutcome::Deleted => "Deleted.".to_string(),
                        DeletionOutcome::CleanupPending { .. } => {
                            "Deleted, but the stored file could not be removed yet.".to_string()
                        }
                    };
                }
                Err(e) => self.status = format!("Delete failed: {e}"),
            },
            Message::DeleteSelected => {
                let view = self.store.view(&self.filter);
                let records: Vec<MediaRecord> =
                    self.selection.selected_in(&view).into_iter().cloned().collect();
                if records.is_empty() || !confirm(&format!("Delete {} item(s)?", records.len())) {
                    return Task::none();
                }

                let deleter = self.deleter.clone();
                self.status = format!("Deleting {} item(s)…", records.len());
                return Task::perform(
                    async move { Arc::new(deleter.execute_many(records).await) },
                    Message::BulkDeleted,
                );
            }
            Message::BulkDeleted(report) => {
                for id in report.removed() {
                    delete::reconcile(
                        id,
                        &mut self.store,
                        &mut self.lightbox,
                        &mut self.selection,
                        &self.filter,
                    );
                }
                for (id, reason) in &report.failed {
                    tracing::warn!(id = %id, reason = %reason, "bulk delete skipped item");
                }
                self.status = report.summary();
            }

            Message::CaptionChanged(caption) => self.template.caption = caption,
            Message::TagsChanged(input) => {
                self.template.set_tags_from_input(&input);
                self.tags_input = input;
            }
            Message::AlbumChanged(album) => self.template.album = album,
            Message::PickFiles => {
                let Some(paths) = FileDialog::new()
                    .set_title("Select Photos and Videos")
                    .add_filter("Media", MEDIA_EXTENSIONS)
                    .pick_files()
                else {
                    return Task::none();
                };

                let files = paths
                    .iter()
                    .filter_map(|path| match CandidateFile::from_path(path) {
                        Ok(file) => Some(file),
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "cannot read picked file");
                            None
                        }
                    })
                    .collect();
                return self.start_upload(files);
            }
            Message::PickFolder => {
                let Some(folder) = FileDialog::new()
                    .set_title("Select Folder with Match Photos")
                    .pick_folder()
                else {
                    return Task::none();
                };
                self.status = format!("Scanning {}…", folder.display());
                return self.start_upload(ingest::collect_folder(&folder));
            }
            Message::UploadProgress(progress) => {
                if self.upload.is_some() {
                    self.upload = Some(progress);
                }
            }
            Message::UploadFinished(token, report) => {
                // The store outlives the panel, so persisted records always land
                for record in &report.persisted {
                    self.store.append(record.clone());
                }
                self.sync_view();

                if token.is_live() {
                    if report.settle_template(&mut self.template) {
                        self.tags_input.clear();
                    }
                    self.status = report.summary();
                    self.upload = None;
                    self.report = Some(report);
                }
            }
            Message::HideUpload => {
                self.uploads.invalidate();
                self.upload = None;
                self.status = "Upload continues in the background.".to_string();
            }
            Message::DismissReport => self.report = None,
        }

        Task::none()
    }

    fn download(&mut self, records: Vec<MediaRecord>) -> Task<Message> {
        if records.is_empty() {
            return Task::none();
        }
        let sink: Arc<dyn DownloadSink> =
            Arc::new(DirectoryDownloader::new(self.repo.clone(), self.download_dir.clone()));
        self.status = format!("Downloading {} item(s)…", records.len());

        Task::perform(
            selection::download_records(records, sink, self.download_delay),
            Message::DownloadFinished,
        )
    }

    /// Run one batch in the background, streaming progress back
    fn start_upload(&mut self, files: Vec<CandidateFile>) -> Task<Message> {
        if files.is_empty() {
            self.status = "No photos or videos to upload.".to_string();
            return Task::none();
        }

        self.uploads.invalidate();
        let token = self.uploads.token();
        self.upload = Some(BatchProgress {
            completed: 0,
            total: files.len(),
        });
        self.report = None;
        self.status = format!("Uploading {} file(s)…", files.len());

        let pipeline = self.pipeline.clone();
        let template = self.template.clone();
        let stream = iced::stream::channel(1, move |mut output: mpsc::Sender<Message>| async move {
            // Unbounded, so no step of the 1/K..K/K sequence is dropped
            let (progress, mut steps) = mpsc::unbounded();
            let finished = token.clone();
            let run = async move {
                pipeline
                    .run(files, &template, &token, |p| {
                        let _ = progress.unbounded_send(Message::UploadProgress(p));
                    })
                    .await
            };
            let forward = async {
                while let Some(step) = steps.next().await {
                    let _ = output.send(step).await;
                }
            };
            let (report, ()) = iced::futures::join!(run, forward);
            let _ = output
                .send(Message::UploadFinished(finished, Arc::new(report)))
                .await;
        });

        Task::run(stream, |message| message)
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let records = self.store.view(&self.filter);

        let main = column![
            self.header(),
            self.upload_panel(),
            self.selection_bar(),
            text(&self.status).size(14),
            scrollable(ui::grid::view(&records, &self.selection)).height(Length::Fill),
        ]
        .spacing(14)
        .padding(20);

        match self.lightbox.session() {
            Some(session) => stack![main, self.lightbox_view(&records, session)].into(),
            None => main.into(),
        }
    }

    fn header(&self) -> Element<'_, Message> {
        let counts = self.store.counts();
        let filter_button = |label: String, kind: TypeFilter| {
            let style = if self.filter.kind == kind {
                button::primary
            } else {
                button::secondary
            };
            button(text(label))
                .style(style)
                .on_press(Message::TypeFilterChanged(kind))
        };

        let tags = self.store.tags();
        let picked = tags.iter().find(|t| **t == self.filter.tag).cloned();

        row![
            text("Match Day Gallery").size(28),
            horizontal_space(),
            filter_button(format!("All ({})", counts.photos + counts.videos), TypeFilter::All),
            filter_button(format!("Photos ({})", counts.photos), TypeFilter::PhotoOnly),
            filter_button(format!("Videos ({})", counts.videos), TypeFilter::VideoOnly),
            text_input("Filter by player…", &self.filter.tag)
                .on_input(Message::TagFilterChanged)
                .width(Length::Fixed(200.0)),
            pick_list(tags, picked, Message::TagFilterChanged).placeholder("Players"),
            button("Refresh").on_press(Message::Refresh),
        ]
        .spacing(10)
        .align_y(Alignment::Center)
        .into()
    }

    fn upload_panel(&self) -> Element<'_, Message> {
        if self.viewer.id.is_none() {
            return text("Browsing as a guest. Set viewer_id in the config file to upload.")
                .size(14)
                .into();
        }

        let idle = self.upload.is_none();
        let mut panel = column![
            row![
                // Read-only while a batch runs, so the form matches what it uploads
                text_input("Caption", &self.template.caption)
                    .on_input_maybe(idle.then_some(Message::CaptionChanged)),
                text_input("Players, comma separated", &self.tags_input)
                    .on_input_maybe(idle.then_some(Message::TagsChanged)),
                text_input("Album", &self.template.album)
                    .on_input_maybe(idle.then_some(Message::AlbumChanged)),
            ]
            .spacing(8),
            row![
                button("Upload Files…").on_press_maybe(idle.then_some(Message::PickFiles)),
                button("Upload Folder…").on_press_maybe(idle.then_some(Message::PickFolder)),
            ]
            .spacing(8),
        ]
        .spacing(8);

        if let Some(progress) = self.upload {
            panel = panel.push(
                row![
                    progress_bar(0.0..=100.0, progress.percent() as f32).height(Length::Fixed(10.0)),
                    text(format!("{}/{}", progress.completed, progress.total)).size(14),
                    button("Hide").on_press(Message::HideUpload),
                ]
                .spacing(10)
                .align_y(Alignment::Center),
            );
        }

        if let Some(report) = &self.report {
            panel = panel.push(
                row![
                    text(report.summary()).size(14).width(Length::Fill),
                    button("Dismiss").on_press(Message::DismissReport),
                ]
                .spacing(10)
                .align_y(Alignment::Center),
            );
        }

        container(panel)
            .padding(12)
            .style(container::rounded_box)
            .into()
    }

    fn selection_bar(&self) -> Element<'_, Message> {
        if self.selection.is_empty() {
            return row![].into();
        }
        row![
            text(format!("{} selected", self.selection.len())),
            button("Download").on_press(Message::DownloadSelected),
            button("Delete")
                .style(button::danger)
                .on_press(Message::DeleteSelected),
            button("Clear").on_press(Message::ClearSelection),
        ]
        .spacing(8)
        .align_y(Alignment::Center)
        .into()
    }

    fn lightbox_view<'a>(&'a self, records: &[&'a MediaRecord], session: &'a Session) -> Element<'a, Message> {
        let Some(record) = records.get(session.index).copied() else {
            return row![].into();
        };

        let mut controls = row![
            button("‹").on_press(Message::Navigate(Direction::Prev)),
            text(record.display_name()).size(20),
            text(format!("{} / {}", session.index + 1, records.len())).size(14),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        if !record.tags.is_empty() {
            controls = controls.push(text(record.tags.join(", ")).size(14));
        }
        controls = controls
            .push(horizontal_space())
            .push(text(format!("{:.0}%", session.scale * 100.0)).size(14))
            .push(button("Download").on_press(Message::DownloadOne(record.id.clone())));
        if self.deleter.may_delete(record) {
            controls = controls.push(
                button("Delete")
                    .style(button::danger)
                    .on_press(Message::DeleteRequested(record.id.clone())),
            );
        }
        controls = controls
            .push(button("›").on_press(Message::Navigate(Direction::Next)))
            .push(button("✕").on_press(Message::CloseLightbox));

        let media: Element<'a, Message> = match record.kind {
            MediaKind::Photo => zoomed_photo(record.url.clone(), session.scale, session.pan),
            MediaKind::Video => container(
                column![
                    text("▶").size(64),
                    text("Video playback is not available here. Download it to watch."),
                ]
                .spacing(10)
                .align_x(Alignment::Center),
            )
            .center(Length::Fill)
            .into(),
        };

        let gestures = Canvas::new(ui::canvas::GestureLayer {
            zoomed: session.scale > 1.0,
        })
        .width(Length::Fill)
        .height(Length::Fill);

        container(column![controls, stack![media, gestures]].spacing(10).padding(20))
            .width(Length::Fill)
            .height(Length::Fill)
            .style(|_theme| container::Style {
                background: Some(Color::from_rgba(0.0, 0.0, 0.0, 0.92).into()),
                text_color: Some(Color::WHITE),
                ..container::Style::default()
            })
            .into()
    }

    /// Keyboard control while the lightbox is open
    fn subscription(&self) -> Subscription<Message> {
        if !self.lightbox.is_open() {
            return Subscription::none();
        }
        event::listen_with(|event, status, _id| {
            if status == event::Status::Captured {
                return None;
            }
            let Event::Keyboard(keyboard::Event::KeyPressed { key, .. }) = event else {
                return None;
            };
            let key = match key.as_ref() {
                Key::Named(Named::Escape) => LightboxKey::Escape,
                Key::Named(Named::ArrowRight) => LightboxKey::ArrowRight,
                Key::Named(Named::ArrowLeft) => LightboxKey::ArrowLeft,
                _ => return None,
            };
            Some(Message::Key(key))
        })
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Photo scaled around the viewport centre and shifted by `pan`
fn zoomed_photo<'a>(url: String, scale: f32, pan: Vector2<f32>) -> Element<'a, Message> {
    responsive(move |size| {
        let photo = image(image::Handle::from_path(&url))
            .content_fit(ContentFit::Contain)
            .width(Length::Fixed(size.width * scale))
            .height(Length::Fixed(size.height * scale));

        // Centred content moves by half the padding difference
        let padding = Padding {
            top: (pan.y * 2.0).max(0.0),
            right: (-pan.x * 2.0).max(0.0),
            bottom: (-pan.y * 2.0).max(0.0),
            left: (pan.x * 2.0).max(0.0),
        };

        container(photo)
            .padding(padding)
            .center(Length::Fill)
            .clip(true)
            .into()
    })
    .into()
}

/// Native yes/no confirmation
fn confirm(description: &str) -> bool {
    MessageDialog::new()
        .set_level(MessageLevel::Warning)
        .set_title("Delete")
        .set_description(description)
        .set_buttons(MessageButtons::YesNo)
        .show()
        == MessageDialogResult::Yes
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = GalleryConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let repo = LocalRepository::open(&config.data_dir())?;

    iced::application("Match Day Gallery", Gallery::update, Gallery::view)
        .theme(Gallery::theme)
        .subscription(Gallery::subscription)
        .centered()
        .run_with(move || Gallery::new(config, repo))?;

    Ok(())
}
