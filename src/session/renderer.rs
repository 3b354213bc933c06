use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::assets::media::{ProbeCache, Prober};
use crate::assets::paths::{DirGuard, cache_key};
use crate::assets::{DefaultMaterials, Material, MaterialCtx, MaterialFactory, Prepared};
use crate::audio::collect_audio_tracks;
use crate::clip::{ClipConf, ClipId, ClipKind, ClipNode, ClipTree, TimeExpr};
use crate::encode::{
    CancelToken, FrameSource, FrameStream, FrameStreamOpts, Synthesis, SynthesisOutput,
};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{MontageError, MontageResult};
use crate::render::{
    ClearRenderer, FramePayload, FrameRenderer, Presenter, SceneSnapshot, encode_payload,
};
use crate::scene::SceneDef;
use crate::session::playback::{
    Clock, DriftController, PlaybackHandle, PlaybackOutcome, SystemClock, TICK_MS,
};
use crate::session::{EventEmitter, Phase, RenderConfig, RenderEvent, RenderMode, Usage};
use crate::timeline::{AnnotateReport, Timeline};

/// One render session over a clip tree.
///
/// [`RenderTask::prepare`] loads every node's material, annotates the timeline and prepares the
/// materials against their final timing. Afterwards the task either plays interactively
/// ([`RenderTask::play`], [`RenderTask::jump_to`]) or burns through a [`Synthesis`]
/// ([`RenderTask::burn`]). Progress is reported through [`RenderEvent`]s.
pub struct RenderTask {
    config: RenderConfig,
    tree: ClipTree,
    timeline: Timeline,
    phase: Phase,
    mode: RenderMode,
    events: EventEmitter,
    factory: Arc<dyn MaterialFactory>,
    materials: HashMap<ClipId, Box<dyn Material>>,
    probes: ProbeCache,
    renderer: Arc<dyn FrameRenderer>,
    presenter: Option<Box<dyn Presenter>>,
    clock: Box<dyn Clock>,
    playback: PlaybackHandle,
    cancel: CancelToken,
    assets_root: PathBuf,
    task_key: String,
    cache_dir: PathBuf,
    snapshot: Option<Arc<SceneSnapshot>>,
    ready: bool,
    played: bool,
    started_at: Option<Instant>,
}

impl RenderTask {
    pub fn from_scene(scene: &SceneDef) -> MontageResult<Self> {
        Self::new(scene.config.clone(), scene.build_tree()?)
    }

    pub fn new(config: RenderConfig, mut tree: ClipTree) -> MontageResult<Self> {
        config.validate()?;
        tree.set_canvas(config.canvas());
        let task_key = task_key(&config, &tree);
        let cache_dir = config.task_cache_dir(&task_key);
        let timeline = Timeline::new(config.fps()?).with_mode(config.annotate);
        let renderer = Arc::new(ClearRenderer {
            background: config.background,
        });
        Ok(Self {
            config,
            tree,
            timeline,
            phase: Phase::Start,
            mode: RenderMode::default(),
            events: EventEmitter::new(),
            factory: Arc::new(DefaultMaterials),
            materials: HashMap::new(),
            probes: ProbeCache::ffprobe(),
            renderer,
            presenter: None,
            clock: Box::new(SystemClock::default()),
            playback: PlaybackHandle::new(),
            cancel: CancelToken::new(),
            assets_root: PathBuf::from("."),
            task_key,
            cache_dir,
            snapshot: None,
            ready: false,
            played: false,
            started_at: None,
        })
    }

    pub fn with_materials(mut self, factory: impl MaterialFactory + 'static) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    pub fn with_renderer(mut self, renderer: impl FrameRenderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.probes = ProbeCache::new(prober);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_presenter(mut self, presenter: impl Presenter + 'static) -> Self {
        self.presenter = Some(Box::new(presenter));
        self
    }

    /// Directory relative `src` paths resolve against.
    pub fn with_assets_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.assets_root = root.into();
        self
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    pub fn on(&self, listener: impl Fn(&RenderEvent) + Send + Sync + 'static) {
        self.events.on(listener);
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn tree(&self) -> &ClipTree {
        &self.tree
    }

    /// Mutable access for edits; call [`RenderTask::reannotate`] afterwards.
    pub fn tree_mut(&mut self) -> &mut ClipTree {
        self.snapshot = None;
        &mut self.tree
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn probes(&self) -> &ProbeCache {
        &self.probes
    }

    /// Remote control for a running [`RenderTask::play`] loop.
    pub fn playback_handle(&self) -> PlaybackHandle {
        self.playback.clone()
    }

    /// Cancels a running [`RenderTask::burn`].
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn task_key(&self) -> &str {
        &self.task_key
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn output_path(&self) -> PathBuf {
        self.config.output_path(&self.task_key)
    }

    fn set_phase(&mut self, phase: Phase) {
        tracing::info!(from = %self.phase, to = %phase, "phase");
        self.phase = phase;
    }

    /// Annotate `err` with the current phase, surface it once and terminate the task.
    fn fail(&mut self, err: MontageError) -> MontageError {
        let err = err.in_phase(self.phase);
        if self.phase != Phase::Error {
            let pos = err.phase().unwrap_or(self.phase);
            tracing::error!(phase = %pos, error = %err, "render task failed");
            self.events.emit(RenderEvent::Error {
                error: err.to_string(),
                pos: pos.as_str().to_string(),
            });
            self.phase = Phase::Error;
            self.events.remove_all_listeners();
        }
        err
    }

    /// Load, annotate and prepare everything for `mode`.
    #[tracing::instrument(skip(self), fields(task = %self.task_key))]
    pub fn prepare(&mut self, mode: RenderMode) -> MontageResult<()> {
        if self.phase != Phase::Start {
            return Err(MontageError::state(format!(
                "prepare() called in phase '{}'",
                self.phase
            )));
        }
        self.mode = mode;
        self.started_at = Some(Instant::now());
        self.events.emit(RenderEvent::Start);

        match self.run_prepare() {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn run_prepare(&mut self) -> MontageResult<()> {
        self.set_phase(Phase::PreProcessing);
        self.preprocess_all()?;

        self.set_phase(Phase::TimelineBuilt);
        let report = self.timeline.annotate(&mut self.tree);
        tracing::debug!(duration = report.duration, passes = report.passes, "timeline built");

        self.set_phase(Phase::MaterialPrepared);
        self.prepare_all()?;

        self.events.emit(RenderEvent::LoadedMetadata {
            duration: self.timeline.duration(),
            width: self.config.width,
            height: self.config.height,
        });
        self.ready = true;
        self.events.emit(RenderEvent::CanPlay);
        if self.mode == RenderMode::Interactive {
            self.set_phase(Phase::Interactive);
        }
        Ok(())
    }

    fn preprocess_all(&mut self) -> MontageResult<()> {
        let root = self.tree.root();
        let ids = self.tree.all_nodes(root);
        let total = ids.len();
        self.events.emit(RenderEvent::Preloading {
            loaded: 0.0,
            total,
            id: self.tree.node(root).id().to_string(),
        });

        let ctx = MaterialCtx {
            assets_root: &self.assets_root,
            cache_dir: &self.cache_dir,
            probes: &self.probes,
            mode: self.mode,
        };
        for (i, id) in ids.into_iter().enumerate() {
            let node = self.tree.node(id);
            let mut material = self.factory.create(node);
            let events = &self.events;
            load_with_retry(material.as_mut(), node, &ctx, |fraction| {
                events.emit(RenderEvent::Preloading {
                    loaded: i as f64 + fraction.clamp(0.0, 1.0),
                    total,
                    id: node.id().to_string(),
                });
            })?;
            self.events.emit(RenderEvent::Preloading {
                loaded: (i + 1) as f64,
                total,
                id: node.id().to_string(),
            });
            self.tree.set_media_length(id, material.length());
            self.materials.insert(id, material);
        }
        Ok(())
    }

    fn prepare_all(&mut self) -> MontageResult<()> {
        let root = self.tree.root();
        let burning = self.mode == RenderMode::Burn;
        let ids = self.tree.all_nodes(root);
        let total = ids.len();
        self.events.emit(RenderEvent::PrepareMaterial {
            prepared: 0,
            total,
            id: self.tree.node(root).id().to_string(),
        });

        let ctx = MaterialCtx {
            assets_root: &self.assets_root,
            cache_dir: &self.cache_dir,
            probes: &self.probes,
            mode: self.mode,
        };
        for (i, id) in ids.into_iter().enumerate() {
            if burning && !self.tree.is_live(id) {
                continue;
            }
            let node = self.tree.node(id);
            let timing = node.timing().copied().ok_or_else(|| {
                MontageError::state(format!("{}[id={}] was not annotated", node.kind(), node.id()))
            })?;
            let prepared = match self.materials.get_mut(&id) {
                Some(material) => material.prepare(node, &timing, &ctx)?,
                None => Prepared::default(),
            };

            if let Some(path) = prepared.extracted_audio {
                let video = self.tree.node(id);
                let conf = ClipConf {
                    end: Some(TimeExpr::from("100%")),
                    looping: Some(video.looping()),
                    volume: video.conf().volume,
                    speed: video.conf().speed,
                    fade_in: video.conf().fade_in,
                    fade_out: video.conf().fade_out,
                    src: Some(path.to_string_lossy().into_owned()),
                    ..ClipConf::default()
                };
                let audio = ClipNode::new(ClipKind::Audio, format!("{}_audio", video.id()))
                    .with_conf(conf);
                let child = self.tree.add_child(id, audio)?;

                let mut material = self.factory.create(self.tree.node(child));
                load_with_retry(material.as_mut(), self.tree.node(child), &ctx, |_| {})?;
                self.tree.set_media_length(child, material.length());
                self.materials.insert(child, material);
                self.tree.annotate(child);
                tracing::info!(
                    video = %self.tree.node(id).id(),
                    track = %path.display(),
                    "audio track added from video"
                );
            }

            self.events.emit(RenderEvent::PrepareMaterial {
                prepared: i + 1,
                total,
                id: self.tree.node(id).id().to_string(),
            });
        }
        Ok(())
    }

    /// Rerun the timeline after tree edits.
    ///
    /// Emits `loadedmetadata` when the duration changed and `canplay` was already reported.
    pub fn reannotate(&mut self) -> MontageResult<AnnotateReport> {
        if matches!(self.phase, Phase::Start | Phase::PreProcessing) || self.phase.is_terminal() {
            return Err(MontageError::state(format!(
                "reannotate() called in phase '{}'",
                self.phase
            )));
        }
        self.snapshot = None;
        let report = self.timeline.annotate(&mut self.tree);
        if report.changed && self.ready {
            self.events.emit(RenderEvent::LoadedMetadata {
                duration: report.duration,
                width: self.config.width,
                height: self.config.height,
            });
        }
        if self.timeline.current_ms() > self.timeline.total_ms() {
            self.timeline.jump_to(self.timeline.current_ms());
        }
        Ok(report)
    }

    fn ensure_interactive(&self, op: &str) -> MontageResult<()> {
        if !self.ready {
            return Err(MontageError::state(format!("{op}() called before canplay")));
        }
        if self.phase != Phase::Interactive {
            return Err(MontageError::state(format!(
                "{op}() requires interactive mode, task is in phase '{}'",
                self.phase
            )));
        }
        Ok(())
    }

    fn scene_snapshot(&mut self) -> MontageResult<Arc<SceneSnapshot>> {
        if let Some(s) = &self.snapshot {
            return Ok(s.clone());
        }
        let s = Arc::new(SceneSnapshot::from_tree(&self.tree)?);
        self.snapshot = Some(s.clone());
        Ok(s)
    }

    fn render_current(&mut self, snapshot: &SceneSnapshot) -> MontageResult<()> {
        let current = self.timeline.current_ms();
        let index = FrameIndex((current / self.timeline.fps().frame_duration_ms()).floor() as u64);
        let state = snapshot.frame_state(index, current / 1000.0);
        let frame = self.renderer.render_frame(&state)?;
        if let Some(presenter) = self.presenter.as_mut() {
            presenter.present(&frame, &state)?;
        }
        Ok(())
    }

    fn emit_time_update(&self) {
        self.events.emit(RenderEvent::TimeUpdate {
            current_time: self.timeline.current_ms(),
            total: self.timeline.total_ms(),
        });
    }

    /// Play from the current position at `rate` until the end or until the handle pauses.
    ///
    /// Each tick renders the current frame before the virtual clock advances. The step is
    /// corrected by a [`DriftController`] so virtual time follows the wall clock.
    #[tracing::instrument(skip(self), fields(task = %self.task_key))]
    pub fn play(&mut self, rate: f64) -> MontageResult<PlaybackOutcome> {
        self.ensure_interactive("play")?;
        match self.run_play(rate) {
            Ok(outcome) => Ok(outcome),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn run_play(&mut self, rate: f64) -> MontageResult<PlaybackOutcome> {
        let snapshot = self.scene_snapshot()?;
        self.playback.set_rate(rate);
        if self.timeline.is_over() {
            self.timeline.rewind();
        }
        if !self.played {
            self.played = true;
            self.events.emit(RenderEvent::Play);
        }
        self.events.emit(RenderEvent::Playing {
            current_time: self.timeline.current_ms(),
        });

        let mut drift = DriftController::new(TICK_MS);
        let mut wall_origin = self.clock.now_ms();
        let mut virtual_elapsed = 0.0;
        loop {
            if let Some(ms) = self.playback.take_seek() {
                self.seek_to(ms, &snapshot)?;
                drift.reset();
                wall_origin = self.clock.now_ms();
                virtual_elapsed = 0.0;
            }

            let rate = self.playback.rate();
            if rate <= 0.0 {
                let current_ms = self.timeline.current_ms();
                self.events.emit(RenderEvent::Pause {
                    current_time: current_ms,
                });
                return Ok(PlaybackOutcome::Paused { current_ms });
            }

            let wall_elapsed = self.clock.now_ms() - wall_origin;
            let adjust = drift.update(virtual_elapsed / rate - wall_elapsed);

            self.render_current(&snapshot)?;
            self.emit_time_update();
            if self.timeline.is_over() {
                self.playback.pause();
                self.events.emit(RenderEvent::Ended);
                return Ok(PlaybackOutcome::Ended);
            }

            let step = (TICK_MS - adjust).max(1.0) * rate;
            self.timeline.advance(step);
            virtual_elapsed += step;
            self.clock.sleep_ms(TICK_MS);
        }
    }

    fn seek_to(&mut self, ms: f64, snapshot: &SceneSnapshot) -> MontageResult<()> {
        self.events.emit(RenderEvent::Seeking { time: ms });
        self.timeline.jump_to(ms);
        self.render_current(snapshot)?;
        self.events.emit(RenderEvent::Seeked {
            current_time: self.timeline.current_ms(),
        });
        self.emit_time_update();
        Ok(())
    }

    /// Move the playhead to `ms` and render it.
    ///
    /// A loop running on another thread should be steered through
    /// [`PlaybackHandle::seek`] instead.
    pub fn jump_to(&mut self, ms: f64) -> MontageResult<()> {
        self.ensure_interactive("jumpTo")?;
        let snapshot = self.scene_snapshot()?;
        match self.seek_to(ms, &snapshot) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Render every frame through `synthesis`.
    ///
    /// A task still in [`Phase::Start`] is prepared for [`RenderMode::Burn`] first. The
    /// per-task cache directory is removed afterwards unless `debug` is set.
    #[tracing::instrument(skip_all, fields(task = %self.task_key))]
    pub fn burn(&mut self, synthesis: &mut dyn Synthesis) -> MontageResult<SynthesisOutput> {
        let guard = DirGuard::new(self.cache_dir.clone());
        let result = self.burn_inner(synthesis);
        if self.config.debug
            && let Some(dir) = guard.keep()
        {
            tracing::debug!(dir = %dir.display(), "keeping cache directory");
        }
        result
    }

    fn burn_inner(&mut self, synthesis: &mut dyn Synthesis) -> MontageResult<SynthesisOutput> {
        if self.phase == Phase::Start {
            self.prepare(RenderMode::Burn)?;
        }
        if self.mode != RenderMode::Burn || self.phase != Phase::MaterialPrepared {
            return Err(MontageError::state(format!(
                "burn() requires a task prepared for burning, task is in phase '{}'",
                self.phase
            )));
        }

        self.set_phase(Phase::Burning);
        match self.run_burn(synthesis) {
            Ok(out) => {
                let usage = self.usage(out.frames);
                tracing::info!(
                    frames = usage.frames,
                    elapsed_ms = usage.elapsed_ms,
                    fps = usage.fps,
                    "burn complete"
                );
                self.events.emit(RenderEvent::Complete {
                    result: out.path.clone(),
                    usage,
                });
                self.phase = Phase::Complete;
                self.events.remove_all_listeners();
                Ok(out)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn run_burn(&mut self, synthesis: &mut dyn Synthesis) -> MontageResult<SynthesisOutput> {
        let snapshot = self.scene_snapshot()?;
        let frames_num = self.timeline.frames_num();
        synthesis.set_frames_num(frames_num);
        synthesis.set_duration(self.timeline.duration());
        let tracks = collect_audio_tracks(&self.tree, &self.assets_root)?;
        tracing::debug!(tracks = tracks.len(), "audio tracks collected");
        synthesis.add_audios(tracks);

        let mut stream = FrameStream::new(FrameStreamOpts {
            size: self.config.high_water_mark,
            parallel: self.config.parallel,
        })?;
        let renderer = self.renderer.clone();
        let fps = self.timeline.fps();
        let format = self.config.cache_format;
        let quality = self.config.cache_quality;
        let background = self.config.background;
        stream.add_pull_func(move |index| {
            let state = snapshot.frame_state(index, fps.frames_to_secs(index.0));
            let frame = renderer.render_frame(&state)?;
            encode_payload(index, &frame, format, quality, background)
        });
        stream.start(frames_num)?;

        self.timeline.rewind();
        let mut source = ClockedFrames {
            stream: &stream,
            timeline: &mut self.timeline,
            events: &self.events,
            cancel: &self.cancel,
            total: frames_num,
            delivered: 0,
        };
        let result = synthesis.start(&mut source);
        stream.close();
        result
    }

    fn usage(&self, frames: u64) -> Usage {
        let elapsed = self.started_at.map(|t| t.elapsed()).unwrap_or_default();
        let secs = elapsed.as_secs_f64();
        Usage {
            elapsed_ms: elapsed.as_millis() as u64,
            frames,
            fps: if secs > 0.0 { frames as f64 / secs } else { 0.0 },
        }
    }

    /// Stop playback, cancel a burn and drop every listener and material.
    pub fn destroy(&mut self) {
        self.playback.pause();
        self.cancel.cancel();
        self.events.remove_all_listeners();
        self.materials.clear();
        self.probes.clear();
        self.snapshot = None;
        if !self.phase.is_terminal() {
            self.phase = Phase::Complete;
        }
    }
}

impl std::fmt::Debug for RenderTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTask")
            .field("task_key", &self.task_key)
            .field("phase", &self.phase)
            .field("mode", &self.mode)
            .field("nodes", &self.tree.len())
            .finish_non_exhaustive()
    }
}

/// Run `material.preprocess` up to `retry + 1` times.
fn load_with_retry(
    material: &mut dyn Material,
    node: &ClipNode,
    ctx: &MaterialCtx<'_>,
    mut progress: impl FnMut(f64),
) -> MontageResult<()> {
    let attempts = node.retry().saturating_add(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match material.preprocess(node, ctx, &mut progress) {
            Ok(()) => return Ok(()),
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    id = node.id(),
                    attempt,
                    attempts,
                    error = %e,
                    "resource load failed, retrying"
                );
            }
            Err(e) => {
                return Err(MontageError::ResourceLoad {
                    id: node.id().to_string(),
                    kind: node.kind().to_string(),
                    attempts,
                    conf: node.conf().snapshot(),
                    cause: e.to_string(),
                });
            }
        }
    }
}

/// Stable key for a task's cache directory and default output name.
fn task_key(config: &RenderConfig, tree: &ClipTree) -> String {
    let config = serde_json::to_string(config).unwrap_or_default();
    let nodes: Vec<String> = tree
        .all_nodes(tree.root())
        .into_iter()
        .map(|id| {
            let node = tree.node(id);
            format!("{}:{}:{}", node.kind(), node.id(), node.conf().snapshot())
        })
        .collect();
    let nodes = nodes.join("\n");
    cache_key(&[&config, &nodes])
}

/// Delivers stream frames to the synthesis and ticks the timeline once per frame.
struct ClockedFrames<'a> {
    stream: &'a FrameStream,
    timeline: &'a mut Timeline,
    events: &'a EventEmitter,
    cancel: &'a CancelToken,
    total: u64,
    delivered: u64,
}

impl FrameSource for ClockedFrames<'_> {
    fn next_frame(&mut self) -> MontageResult<Option<FramePayload>> {
        if self.cancel.is_cancelled() {
            return Err(MontageError::synthesis("burn cancelled"));
        }
        let Some(frame) = self.stream.next_frame()? else {
            return Ok(None);
        };
        self.timeline.next_frame();
        self.delivered += 1;
        self.events.emit(RenderEvent::Progress {
            percent: self.delivered as f64 * 100.0 / self.total.max(1) as f64,
        });
        Ok(Some(frame))
    }
}
