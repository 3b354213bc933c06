use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;

use crate::assets::paths::ensure_parent_dir;
use crate::audio::AudioTrack;
use crate::encode::synthesis::{FrameSource, Synthesis, SynthesisOutput};
use crate::foundation::core::Fps;
use crate::foundation::error::{MontageError, MontageResult};
use crate::render::FrameBuffer;
use crate::session::{CacheFormat, RenderConfig};

/// Options for [`FfmpegSynthesis`].
#[derive(Clone, Debug)]
pub struct FfmpegOpts {
    pub out_path: PathBuf,
    /// Overwrite the output file if it already exists.
    pub overwrite: bool,
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    /// Encoding of the frames arriving on stdin.
    pub format: CacheFormat,
}

impl FfmpegOpts {
    pub fn from_config(config: &RenderConfig, out_path: impl Into<PathBuf>) -> MontageResult<Self> {
        Ok(Self {
            out_path: out_path.into(),
            overwrite: true,
            width: config.width,
            height: config.height,
            fps: config.fps()?,
            format: config.cache_format,
        })
    }

    pub fn validate(&self) -> MontageResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MontageError::validation(
                "ffmpeg synthesis width/height must be non-zero",
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            // yuv420p output needs even dimensions.
            return Err(MontageError::validation(
                "ffmpeg synthesis width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        Ok(())
    }
}

/// Synthesis that spawns the system `ffmpeg`, streams frames to stdin and mixes the audio
/// tracks in.
pub struct FfmpegSynthesis {
    opts: FfmpegOpts,
    frames_num: u64,
    duration: f64,
    audios: Vec<AudioTrack>,
}

impl FfmpegSynthesis {
    pub fn new(opts: FfmpegOpts) -> Self {
        Self {
            opts,
            frames_num: 0,
            duration: 0.0,
            audios: Vec::new(),
        }
    }

    /// Full `ffmpeg` argument list for the current configuration.
    pub fn command_args(&self) -> Vec<String> {
        let o = &self.opts;
        let mut args: Vec<String> = Vec::new();
        let mut push = |items: &[&str]| args.extend(items.iter().map(|s| s.to_string()));

        push(&[if o.overwrite { "-y" } else { "-n" }, "-loglevel", "error"]);
        let rate = format!("{}/{}", o.fps.num, o.fps.den);
        match o.format {
            CacheFormat::Raw => push(&[
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-s",
                &format!("{}x{}", o.width, o.height),
                "-r",
                &rate,
            ]),
            CacheFormat::Png => push(&["-f", "image2pipe", "-c:v", "png", "-r", &rate]),
            CacheFormat::Jpg => push(&["-f", "image2pipe", "-c:v", "mjpeg", "-r", &rate]),
        }
        push(&["-i", "pipe:0"]);

        for track in &self.audios {
            if track.looping {
                push(&["-stream_loop", "-1"]);
            }
            if track.ss > 0.0 {
                push(&["-ss", &format!("{:.3}", track.ss)]);
            }
            if let Some(to) = track.to {
                push(&["-to", &format!("{to:.3}")]);
            }
            push(&["-i", &track.path.to_string_lossy()]);
        }

        if self.audios.is_empty() {
            push(&["-an"]);
        } else {
            push(&[
                "-filter_complex",
                &audio_filter_graph(&self.audios),
                "-map",
                "0:v",
                "-map",
                "[aout]",
                "-c:a",
                "aac",
            ]);
        }
        push(&[
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ]);
        if self.duration > 0.0 {
            push(&["-t", &format!("{:.3}", self.duration)]);
        }
        args.push(o.out_path.to_string_lossy().into_owned());
        args
    }

    fn check_frame(&self, bytes: &[u8], width: u32, height: u32) -> MontageResult<()> {
        if width != self.opts.width || height != self.opts.height {
            return Err(MontageError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                width, height, self.opts.width, self.opts.height
            )));
        }
        if self.opts.format == CacheFormat::Raw && bytes.len() != FrameBuffer::byte_len(width, height)
        {
            return Err(MontageError::validation(
                "raw frame size mismatch with width*height*4",
            ));
        }
        Ok(())
    }
}

impl Synthesis for FfmpegSynthesis {
    fn set_frames_num(&mut self, frames: u64) {
        self.frames_num = frames;
    }

    fn set_duration(&mut self, secs: f64) {
        self.duration = secs;
    }

    fn add_audios(&mut self, tracks: Vec<AudioTrack>) {
        self.audios.extend(tracks);
    }

    #[tracing::instrument(skip_all, fields(out = %self.opts.out_path.display()))]
    fn start(&mut self, frames: &mut dyn FrameSource) -> MontageResult<SynthesisOutput> {
        self.opts.validate()?;
        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(MontageError::validation(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(MontageError::synthesis(
                "ffmpeg is required for burning, but was not found on PATH",
            ));
        }

        let mut child = Command::new("ffmpeg")
            .args(self.command_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                MontageError::synthesis(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| MontageError::synthesis("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MontageError::synthesis("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        let mut written = 0u64;
        loop {
            let frame = match frames.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    drop(stdin);
                    abort(child, stderr_drain);
                    return Err(e);
                }
            };
            if let Err(e) = self.check_frame(&frame.bytes, frame.width, frame.height) {
                drop(stdin);
                abort(child, stderr_drain);
                return Err(e);
            }

            use std::io::Write as _;
            if let Err(e) = stdin.write_all(&frame.bytes) {
                drop(stdin);
                let stderr = abort(child, stderr_drain);
                return Err(MontageError::synthesis(format!(
                    "failed to write frame {} to ffmpeg stdin: {e}: {}",
                    frame.index.0,
                    stderr.trim()
                )));
            }
            written += 1;
        }

        drop(stdin);
        let status = child.wait().map_err(|e| {
            MontageError::synthesis(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr_bytes = join_drain(stderr_drain)?;
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(MontageError::synthesis(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        if written != self.frames_num {
            tracing::warn!(written, expected = self.frames_num, "frame count mismatch");
        }

        tracing::info!(frames = written, audios = self.audios.len(), "synthesis complete");
        Ok(SynthesisOutput {
            path: Some(self.opts.out_path.clone()),
            frames: written,
        })
    }
}

type StderrDrain = JoinHandle<std::io::Result<Vec<u8>>>;

/// Kill the encoder and wait for it to exit. Returns whatever it printed.
fn abort(mut child: Child, drain: StderrDrain) -> String {
    if let Err(e) = child.kill() {
        tracing::debug!(error = %e, "ffmpeg already exited");
    }
    if let Err(e) = child.wait() {
        tracing::warn!(error = %e, "failed to reap ffmpeg");
    }
    join_drain(drain)
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default()
}

fn join_drain(drain: StderrDrain) -> MontageResult<Vec<u8>> {
    drain
        .join()
        .map_err(|_| MontageError::synthesis("ffmpeg stderr drain thread panicked"))?
        .map_err(|e| MontageError::synthesis(format!("ffmpeg stderr read failed: {e}")))
}

/// `filter_complex` graph placing each track (input `i + 1`) on the timeline and mixing them.
pub(crate) fn audio_filter_graph(tracks: &[AudioTrack]) -> String {
    let mut chains = Vec::with_capacity(tracks.len() + 1);
    let mut labels = String::new();
    for (i, t) in tracks.iter().enumerate() {
        let len = t.duration();
        let mut filters = vec![
            format!("atrim=duration={:.3}", len * t.speed),
            "asetpts=PTS-STARTPTS".to_string(),
        ];
        if (t.speed - 1.0).abs() > f64::EPSILON {
            filters.extend(atempo_chain(t.speed).into_iter().map(|f| format!("atempo={f}")));
        }
        if (t.volume - 1.0).abs() > f64::EPSILON {
            filters.push(format!("volume={}", t.volume));
        }
        if t.fade_in > 0.0 {
            filters.push(format!("afade=t=in:st=0:d={:.3}", t.fade_in));
        }
        if t.fade_out > 0.0 {
            filters.push(format!(
                "afade=t=out:st={:.3}:d={:.3}",
                (len - t.fade_out).max(0.0),
                t.fade_out
            ));
        }
        let delay = (t.start * 1000.0).round() as u64;
        filters.push(format!("adelay={delay}|{delay}"));
        chains.push(format!("[{}:a]{}[a{i}]", i + 1, filters.join(",")));
        labels.push_str(&format!("[a{i}]"));
    }
    chains.push(format!(
        "{labels}amix=inputs={}:duration=longest:dropout_transition=0:normalize=0[aout]",
        tracks.len()
    ));
    chains.join(";")
}

/// Split a tempo factor into `atempo` steps within `0.5..=2.0`.
pub(crate) fn atempo_chain(speed: f64) -> Vec<f64> {
    let mut out = Vec::new();
    let mut s = speed;
    while s < 0.5 {
        out.push(0.5);
        s /= 0.5;
    }
    while s > 2.0 {
        out.push(2.0);
        s /= 2.0;
    }
    out.push(s);
    out
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
