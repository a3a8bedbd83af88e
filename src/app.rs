/// Dashboard application: state, messages and the update loop
///
/// All state is owned here and handed to the view functions in `ui`. Async
/// work (fetches, the transfer stream, thumbnails) runs as iced tasks whose
/// results come back as messages tagged with the project or ticket they
/// belong to, so late answers for a view the user has left are dropped.
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use iced::widget::{image, scrollable};
use iced::{event, keyboard, time, window, Element, Subscription, Task, Theme};
use rfd::FileDialog;

use crate::api::models::ProjectSummary;
use crate::api::ApiClient;
use crate::config::Config;
use crate::error::{FetchError, ThumbnailError};
use crate::imagery::preview::{self, ImageLayer, Zoom};
use crate::imagery::thumbnail::ThumbnailCache;
use crate::state::data::{NdviRecord, ProjectId};
use crate::state::insights::{self, InsightPanel};
use crate::state::intake::{AcceptPolicy, Candidate};
use crate::state::projects::{self, CreateError, NewProjectForm};
use crate::state::results::{LoadOutcome, LoadTicket, ResultIndex};
use crate::state::session::{Applied, TransferTicket, UploadSession};
use crate::state::timeline::{self, ThumbnailStrip};
use crate::state::transfer::{TransferEvent, TransferManager, TransferPhase};
use crate::ui;
use crate::ui::chart::ChartCache;

/// Top-level screens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Projects,
    NewProject,
    Project,
}

/// Tabs of the project screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Visualization,
    Insights,
    AddImages,
}

/// Load state of one timeline thumbnail
#[derive(Debug, Clone)]
pub enum Thumb {
    Loading,
    Ready(image::Handle),
    Missing,
}

/// Load state of one full-size preview, keyed by record and layer
#[derive(Debug, Clone)]
pub enum Preview {
    Loading,
    Ready(image::Handle),
    Failed,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    ToggleSidebar,
    ShowProjects,
    RefreshProjects,
    ProjectsLoaded(Result<Vec<ProjectSummary>, FetchError>),
    SearchChanged(String),

    ShowNewProject,
    FormName(String),
    FormLocation(String),
    FormDescription(String),
    SubmitProject,
    ProjectCreated(Result<ProjectSummary, CreateError>),

    OpenProject(ProjectSummary),
    SelectTab(Tab),

    RefreshResults,
    ResultsLoaded(LoadTicket, Result<Vec<NdviRecord>, FetchError>),
    Next,
    Previous,
    SelectImage(usize),
    StripScrolled(scrollable::Viewport),
    ScrollStripLeft,
    ScrollStripRight,
    ThumbnailReady(ProjectId, i64, Result<PathBuf, String>),
    PreviewLoaded(ProjectId, i64, ImageLayer, Result<Vec<u8>, String>),
    ToggleLayer,
    ZoomIn,
    ZoomOut,
    ZoomReset,

    BrowseFiles,
    FileDropped(PathBuf),
    RemoveFile(usize),
    ClearFiles,
    SubmitUpload,
    RetryUpload,
    Transfer(TransferTicket, TransferEvent),
    ProcessingTick,

    RefreshInsights,
    InsightsLoaded(ProjectId, Result<String, FetchError>),
}

/// State of the open project screen
pub struct ProjectView {
    pub project: ProjectSummary,
    pub tab: Tab,
    pub upload: UploadSession,
    pub strip: ThumbnailStrip,
    pub thumbnails: HashMap<i64, Thumb>,
    pub previews: HashMap<(i64, ImageLayer), Preview>,
    pub layer: ImageLayer,
    pub zoom: Zoom,
    pub status: Option<String>,
    pub processing_ticks: usize,
    /// Aborts the transfer stream when the view is dropped
    transfer: Option<iced::task::Handle>,
}

impl ProjectView {
    fn new(project: ProjectSummary, policy: AcceptPolicy, tab: Tab) -> Self {
        Self {
            upload: UploadSession::new(project.id, policy),
            project,
            tab,
            strip: ThumbnailStrip::default(),
            thumbnails: HashMap::new(),
            previews: HashMap::new(),
            layer: ImageLayer::default(),
            zoom: Zoom::default(),
            status: None,
            processing_ticks: 0,
            transfer: None,
        }
    }
}

/// Main application state
pub struct FieldMonitor {
    config: Config,
    api: ApiClient,
    transfers: TransferManager,
    thumbnails: Option<ThumbnailCache>,

    pub screen: Screen,
    /// Explicit UI state, passed down to the layout
    pub sidebar_open: bool,

    pub projects: Vec<ProjectSummary>,
    pub projects_loading: bool,
    pub projects_error: Option<String>,
    pub search: String,
    pub form: NewProjectForm,

    pub view: Option<ProjectView>,
    pub results: ResultIndex,
    pub chart: ChartCache,
    pub insights: InsightPanel,
}

pub(crate) fn strip_id() -> scrollable::Id {
    scrollable::Id::new("thumbnail-strip")
}

impl FieldMonitor {
    /// Create the application and start loading the project list
    pub fn new(config: Config, api: ApiClient) -> (Self, Task<Message>) {
        let transfers = TransferManager::new(
            api.clone(),
            config.processing_timeout(),
            config.progress_mode,
        );
        let thumbnails = match ThumbnailCache::in_user_cache(api.clone(), config.thumbnail_size) {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!("Thumbnails disabled: {}", e);
                None
            }
        };
        tracing::info!("🌱 Field Monitor initialized against {}", api.base_url());

        let mut app = Self {
            config,
            api,
            transfers,
            thumbnails,
            screen: Screen::Projects,
            sidebar_open: true,
            projects: Vec::new(),
            projects_loading: false,
            projects_error: None,
            search: String::new(),
            form: NewProjectForm::default(),
            view: None,
            results: ResultIndex::new(),
            chart: ChartCache::default(),
            insights: InsightPanel::default(),
        };
        let task = app.load_projects();
        (app, task)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn load_projects(&mut self) -> Task<Message> {
        self.projects_loading = true;
        let api = self.api.clone();
        Task::perform(async move { api.list_projects().await }, Message::ProjectsLoaded)
    }

    fn load_results(&mut self, project: ProjectId, preserve_selection: bool) -> Task<Message> {
        let ticket = self.results.begin_load(project, preserve_selection);
        self.refresh_chart();
        let api = self.api.clone();
        Task::perform(async move { api.fetch_ndvi(project).await }, move |result| {
            Message::ResultsLoaded(ticket, result)
        })
    }

    fn load_insights(&mut self, project: ProjectId) -> Task<Message> {
        self.insights.begin(project);
        Task::perform(insights::load_recommendation(self.api.clone(), project), move |r| {
            Message::InsightsLoaded(project, r)
        })
    }

    fn refresh_chart(&mut self) {
        let records = self.results.records();
        self.chart
            .refresh(&records, self.config.chart_width, self.config.chart_height);
    }

    fn open_project(&mut self, project: ProjectSummary, tab: Tab) -> Task<Message> {
        let id = project.id;
        tracing::info!("Opening project {} ({})", id, project.name);
        let policy = AcceptPolicy::from_config(self.config.accept_jpeg);
        self.view = Some(ProjectView::new(project, policy, tab));
        self.screen = Screen::Project;
        self.insights.reset();
        self.load_results(id, false)
    }

    fn leave_project(&mut self) {
        if let Some(view) = self.view.take() {
            if view.upload.phase().is_busy() {
                tracing::info!("Leaving project {} with a transfer in flight; aborting it", view.project.id);
            }
        }
        self.results.detach();
        self.refresh_chart();
        self.insights.reset();
    }

    /// Fetch whatever the selected record still needs and keep it in view
    fn follow_selection(&mut self) -> Task<Message> {
        let Some(view) = self.view.as_mut() else {
            return Task::none();
        };
        let mut tasks = Vec::new();

        if let Some(position) = self.results.selected_position() {
            if let Some(offset) = view.strip.ensure_visible(position) {
                tasks.push(scrollable::scroll_to(
                    strip_id(),
                    scrollable::AbsoluteOffset { x: offset, y: 0.0 },
                ));
            }
        }

        if let Some(record) = self.results.current() {
            let key = (record.id, view.layer);
            if !view.previews.contains_key(&key) {
                view.previews.insert(key, Preview::Loading);
                let project = view.project.id;
                let (record_id, layer) = key;
                tasks.push(Task::perform(
                    preview::fetch_preview(self.api.clone(), record.clone(), layer),
                    move |r| {
                        Message::PreviewLoaded(project, record_id, layer, r.map_err(|e| e.to_string()))
                    },
                ));
            }
        }

        Task::batch(tasks)
    }

    fn request_thumbnails(&mut self) -> Task<Message> {
        let (Some(view), Some(cache)) = (self.view.as_mut(), self.thumbnails.as_ref()) else {
            return Task::none();
        };
        let project = view.project.id;
        let missing: Vec<NdviRecord> = self
            .results
            .as_slice()
            .iter()
            .filter(|r| !view.thumbnails.contains_key(&r.id))
            .cloned()
            .collect();

        let mut tasks = Vec::with_capacity(missing.len());
        for record in missing {
            view.thumbnails.insert(record.id, Thumb::Loading);
            let cache = cache.clone();
            let id = record.id;
            tasks.push(Task::perform(
                async move { cache.get(project, &record).await },
                move |r: Result<PathBuf, ThumbnailError>| {
                    Message::ThumbnailReady(project, id, r.map_err(|e| e.to_string()))
                },
            ));
        }
        Task::batch(tasks)
    }

    fn stage(&mut self, candidates: Vec<Candidate>) {
        let Some(view) = self.view.as_mut() else {
            return;
        };
        match view.upload.stage(candidates) {
            Ok(staged) => tracing::debug!("Staged {} file(s)", staged),
            Err(e) => view.status = Some(e.to_string()),
        }
    }

    /// Handle application messages and update state
    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::ToggleSidebar => {
                self.sidebar_open = !self.sidebar_open;
                Task::none()
            }
            Message::ShowProjects => {
                self.leave_project();
                self.screen = Screen::Projects;
                self.load_projects()
            }
            Message::RefreshProjects => self.load_projects(),
            Message::ProjectsLoaded(result) => {
                self.projects_loading = false;
                match result {
                    Ok(projects) => {
                        tracing::info!("📁 {} projects", projects.len());
                        self.projects = projects;
                        self.projects_error = None;
                    }
                    Err(e) => {
                        tracing::warn!("Project list failed: {}", e);
                        self.projects_error = Some(format!("Failed to load projects. {e}"));
                    }
                }
                Task::none()
            }
            Message::SearchChanged(query) => {
                self.search = query;
                Task::none()
            }

            Message::ShowNewProject => {
                self.leave_project();
                self.form = NewProjectForm::default();
                self.screen = Screen::NewProject;
                Task::none()
            }
            Message::FormName(value) => {
                self.form.name = value;
                Task::none()
            }
            Message::FormLocation(value) => {
                self.form.location = value;
                Task::none()
            }
            Message::FormDescription(value) => {
                self.form.description = value;
                Task::none()
            }
            Message::SubmitProject => {
                if self.form.submitting {
                    return Task::none();
                }
                if let Err(reason) = self.form.validate() {
                    self.form.error = Some(reason);
                    return Task::none();
                }
                self.form.submitting = true;
                self.form.error = None;
                Task::perform(
                    projects::create_project(
                        self.api.clone(),
                        self.form.name.clone(),
                        self.form.location.clone(),
                        self.form.description.clone(),
                    ),
                    Message::ProjectCreated,
                )
            }
            Message::ProjectCreated(result) => {
                self.form.submitting = false;
                match result {
                    Ok(project) => {
                        self.projects.push(project.clone());
                        self.form = NewProjectForm::default();
                        self.open_project(project, Tab::AddImages)
                    }
                    Err(e) => {
                        self.form.error = Some(e.user_message());
                        Task::none()
                    }
                }
            }

            Message::OpenProject(project) => {
                self.leave_project();
                self.open_project(project, Tab::Visualization)
            }
            Message::SelectTab(tab) => {
                let Some(view) = self.view.as_mut() else {
                    return Task::none();
                };
                view.tab = tab;
                let project = view.project.id;
                if tab == Tab::Insights && !self.insights.is_loading() && self.insights.text().is_none() {
                    return self.load_insights(project);
                }
                Task::none()
            }

            Message::RefreshResults => match self.view.as_ref() {
                Some(view) => {
                    let project = view.project.id;
                    self.load_results(project, true)
                }
                None => Task::none(),
            },
            Message::ResultsLoaded(ticket, result) => {
                match self.results.finish_load(ticket, result) {
                    LoadOutcome::Applied(_) => {
                        self.refresh_chart();
                        if let Some(view) = self.view.as_mut() {
                            view.status = None;
                            // A refresh gets another go at failed downloads
                            view.previews.retain(|_, p| !matches!(p, Preview::Failed));
                        }
                        Task::batch([self.request_thumbnails(), self.follow_selection()])
                    }
                    LoadOutcome::Failed(e) => {
                        if let Some(view) = self.view.as_mut() {
                            view.status = Some(e.user_message());
                        }
                        Task::none()
                    }
                    LoadOutcome::Stale => Task::none(),
                }
            }
            Message::Next => {
                timeline::next(&mut self.results);
                self.follow_selection()
            }
            Message::Previous => {
                timeline::previous(&mut self.results);
                self.follow_selection()
            }
            Message::SelectImage(position) => {
                if timeline::select(&mut self.results, position) {
                    self.follow_selection()
                } else {
                    Task::none()
                }
            }
            Message::StripScrolled(viewport) => {
                if let Some(view) = self.view.as_mut() {
                    view.strip.on_scrolled(
                        viewport.absolute_offset().x,
                        viewport.bounds().width,
                        viewport.content_bounds().width,
                    );
                }
                Task::none()
            }
            Message::ScrollStripLeft | Message::ScrollStripRight => {
                let Some(view) = self.view.as_mut() else {
                    return Task::none();
                };
                let x = if matches!(message, Message::ScrollStripLeft) {
                    view.strip.scroll_left()
                } else {
                    view.strip.scroll_right()
                };
                scrollable::scroll_to(strip_id(), scrollable::AbsoluteOffset { x, y: 0.0 })
            }
            Message::ThumbnailReady(project, id, result) => {
                if let Some(view) = self.view.as_mut().filter(|v| v.project.id == project) {
                    let thumb = match result {
                        Ok(path) => Thumb::Ready(image::Handle::from_path(path)),
                        Err(e) => {
                            tracing::debug!("No thumbnail for record {}: {}", id, e);
                            Thumb::Missing
                        }
                    };
                    view.thumbnails.insert(id, thumb);
                }
                Task::none()
            }
            Message::PreviewLoaded(project, id, layer, result) => {
                if let Some(view) = self.view.as_mut().filter(|v| v.project.id == project) {
                    let preview = match result {
                        Ok(bytes) => Preview::Ready(image::Handle::from_bytes(bytes)),
                        Err(e) => {
                            tracing::warn!("Preview of record {} failed: {}", id, e);
                            Preview::Failed
                        }
                    };
                    view.previews.insert((id, layer), preview);
                }
                Task::none()
            }
            Message::ToggleLayer => {
                if let Some(view) = self.view.as_mut() {
                    view.layer = view.layer.toggled();
                }
                self.follow_selection()
            }
            Message::ZoomIn | Message::ZoomOut | Message::ZoomReset => {
                if let Some(view) = self.view.as_mut() {
                    match message {
                        Message::ZoomIn => view.zoom.zoom_in(),
                        Message::ZoomOut => view.zoom.zoom_out(),
                        _ => view.zoom.reset(),
                    }
                }
                Task::none()
            }

            Message::BrowseFiles => {
                let Some(view) = self.view.as_ref() else {
                    return Task::none();
                };
                if !view.upload.controls().can_browse {
                    return Task::none();
                }
                let policy = view.upload.intake().policy();
                let files = FileDialog::new()
                    .set_title("Select NDVI imagery")
                    .add_filter("Imagery", policy.dialog_extensions())
                    .pick_files();

                if let Some(paths) = files {
                    let candidates = paths.iter().flat_map(|p| Candidate::collect(p)).collect();
                    self.stage(candidates);
                }
                Task::none()
            }
            Message::FileDropped(path) => {
                if self.screen != Screen::Project {
                    return Task::none();
                }
                if let Some(view) = self.view.as_mut() {
                    view.tab = Tab::AddImages;
                }
                self.stage(Candidate::collect(&path));
                Task::none()
            }
            Message::RemoveFile(index) => {
                if let Some(view) = self.view.as_mut() {
                    if let Err(e) = view.upload.remove(index) {
                        view.status = Some(e.to_string());
                    }
                }
                Task::none()
            }
            Message::ClearFiles => {
                if let Some(view) = self.view.as_mut() {
                    match view.upload.clear() {
                        Ok(()) => view.status = None,
                        Err(e) => view.status = Some(e.to_string()),
                    }
                }
                Task::none()
            }
            Message::RetryUpload => {
                if let Some(view) = self.view.as_mut() {
                    if let Err(e) = view.upload.retry() {
                        tracing::debug!("Retry refused: {}", e);
                    }
                }
                Task::none()
            }
            Message::SubmitUpload => {
                let Some(view) = self.view.as_mut() else {
                    return Task::none();
                };
                match view.upload.begin_submit() {
                    Ok((ticket, files)) => {
                        view.status = None;
                        view.processing_ticks = 0;
                        let (task, handle) = Task::run(
                            self.transfers.start(ticket.project, files),
                            move |event| Message::Transfer(ticket, event),
                        )
                        .abortable();
                        view.transfer = Some(handle.abort_on_drop());
                        task
                    }
                    Err(e) => {
                        tracing::debug!("Submit refused: {}", e);
                        Task::none()
                    }
                }
            }
            Message::Transfer(ticket, event) => {
                let Some(view) = self.view.as_mut().filter(|v| v.project.id == ticket.project) else {
                    return Task::none();
                };
                match view.upload.apply(ticket, event) {
                    Applied::Completed(outcomes) => {
                        view.transfer = None;
                        view.status = Some(format!("✅ Processed {} image(s)", outcomes.len()));
                        tracing::info!(
                            "✅ Transfer for project {} complete: {} result(s)",
                            ticket.project,
                            outcomes.len()
                        );
                        // Runs strictly after the completion event
                        self.load_results(ticket.project, false)
                    }
                    Applied::Failed(reason) => {
                        view.transfer = None;
                        tracing::warn!("Transfer for project {} failed: {}", ticket.project, reason);
                        Task::none()
                    }
                    Applied::Updated | Applied::Ignored => Task::none(),
                }
            }
            Message::ProcessingTick => {
                if let Some(view) = self.view.as_mut() {
                    view.processing_ticks = view.processing_ticks.wrapping_add(1);
                }
                Task::none()
            }

            Message::RefreshInsights => match self.view.as_ref() {
                Some(view) => {
                    let project = view.project.id;
                    self.load_insights(project)
                }
                None => Task::none(),
            },
            Message::InsightsLoaded(project, result) => {
                self.insights.finish(project, result);
                Task::none()
            }
        }
    }

    /// Build the user interface
    pub fn view(&self) -> Element<Message> {
        ui::layout(self)
    }

    pub fn subscription(&self) -> Subscription<Message> {
        let drops = event::listen_with(|event, _status, _window| match event {
            iced::Event::Window(window::Event::FileDropped(path)) => Some(Message::FileDropped(path)),
            _ => None,
        });

        let keys = keyboard::on_key_press(|key, _modifiers| match key.as_ref() {
            keyboard::Key::Named(keyboard::key::Named::ArrowRight) => Some(Message::Next),
            keyboard::Key::Named(keyboard::key::Named::ArrowLeft) => Some(Message::Previous),
            _ => None,
        });

        let processing = self
            .view
            .as_ref()
            .is_some_and(|v| v.upload.phase() == TransferPhase::Processing);
        let ticks = if processing {
            time::every(Duration::from_millis(400)).map(|_| Message::ProcessingTick)
        } else {
            Subscription::none()
        };

        Subscription::batch([drops, keys, ticks])
    }

    /// Set the application theme
    pub fn theme(&self) -> Theme {
        Theme::Dark
    }
}
