use std::path::Path;
use std::sync::{
    atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, error, info, warn};
use rubato::{FftFixedIn, Resampler};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::sync::broadcast::{error::TryRecvError, Receiver, Sender};

use crate::protocol::{Message, PlaybackMessage};

const TICK_INTERVAL_MS: u64 = 1;
const PROGRESS_INTERVAL_TICKS: u64 = 250;
const DEVICE_REFRESH_INTERVAL_TICKS: u64 = 1000;

/// State shared with the realtime output callback.
struct SharedAudio {
    samples: Mutex<Vec<f32>>,
    position: AtomicUsize,
    playing: AtomicBool,
    volume_bits: AtomicU32,
}

#[derive(Debug, Clone)]
struct LoadedTrack {
    duration_secs: f64,
}

fn effective_volume(user_volume: f32, muted: bool) -> f32 {
    if muted {
        0.0
    } else {
        user_volume.clamp(0.0, 1.0)
    }
}

/// Interleaved sample index for a seek position, aligned to a whole frame
/// and clamped to the end of the track.
fn seek_index(seconds: f64, sample_rate: u32, channels: u16, total_samples: usize) -> usize {
    let frame = (seconds.max(0.0) * sample_rate as f64) as usize;
    let index = frame * channels as usize;
    let aligned = index - index % channels.max(1) as usize;
    aligned.min(total_samples)
}

/// Repeats or drops trailing channels so a track plays on however many
/// channels the device has.
fn remap_channels(samples: &[f32], source_channels: usize, target_channels: usize) -> Vec<f32> {
    if source_channels == target_channels || source_channels == 0 {
        return samples.to_vec();
    }
    let frames = samples.len() / source_channels;
    let mut remapped = Vec::with_capacity(frames * target_channels);
    for frame in 0..frames {
        let base = frame * source_channels;
        for channel in 0..target_channels {
            remapped.push(samples[base + channel % source_channels]);
        }
    }
    remapped
}

fn resample_interleaved(
    samples: Vec<f32>,
    channels: usize,
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, String> {
    if source_rate == target_rate || samples.is_empty() || channels == 0 {
        return Ok(samples);
    }
    let mut resampler = FftFixedIn::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        1024,
        2,
        channels,
    )
    .map_err(|err| format!("failed to create resampler: {}", err))?;

    let frames = samples.len() / channels;
    let planar: Vec<Vec<f32>> = (0..channels)
        .map(|channel| {
            samples
                .iter()
                .skip(channel)
                .step_by(channels)
                .copied()
                .collect()
        })
        .collect();

    let chunk = resampler.input_frames_next();
    let mut output: Vec<Vec<f32>> = vec![Vec::new(); channels];
    let mut position = 0;
    while position + chunk <= frames {
        let input: Vec<&[f32]> = planar
            .iter()
            .map(|channel| &channel[position..position + chunk])
            .collect();
        let processed = resampler
            .process(&input, None)
            .map_err(|err| format!("resampling failed: {}", err))?;
        for (channel, data) in processed.into_iter().enumerate() {
            output[channel].extend(data);
        }
        position += chunk;
    }
    if position < frames {
        let input: Vec<&[f32]> = planar.iter().map(|channel| &channel[position..]).collect();
        let processed = resampler
            .process_partial(Some(&input), None)
            .map_err(|err| format!("resampling failed: {}", err))?;
        for (channel, data) in processed.into_iter().enumerate() {
            output[channel].extend(data);
        }
    }

    let output_frames = output[0].len();
    let mut interleaved = Vec::with_capacity(output_frames * channels);
    for frame in 0..output_frames {
        for channel_data in &output {
            interleaved.push(channel_data[frame]);
        }
    }
    Ok(interleaved)
}

/// Decodes a whole file to interleaved f32 samples.
fn decode_samples(path: &Path) -> Result<(Vec<f32>, u32, usize), String> {
    let file = std::fs::File::open(path)
        .map_err(|err| format!("failed to open {}: {}", path.display(), err))?;
    let media_source = MediaSourceStream::new(Box::new(file), Default::default());
    let hint = Hint::new();

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            media_source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| format!("failed to probe {}: {}", path.display(), err))?;

    let mut format_reader = probed.format;
    let track = format_reader
        .default_track()
        .ok_or_else(|| format!("no default track in {}", path.display()))?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let channels = track
        .codec_params
        .channels
        .map(|channels| channels.count())
        .unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|err| format!("failed to create decoder: {}", err))?;

    let mut decoded_samples = Vec::new();
    while let Ok(packet) = format_reader.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = decoded.spec();
                let capacity = decoded.capacity() as u64;
                let mut sample_buffer = SampleBuffer::<f32>::new(capacity, *spec);
                sample_buffer.copy_interleaved_ref(decoded);
                decoded_samples.extend_from_slice(sample_buffer.samples());
            }
            Err(err) => {
                error!("Decode error in {}: {}", path.display(), err);
                break;
            }
        }
    }

    Ok((decoded_samples, sample_rate, channels))
}

// The playback engine. Decoding happens up front; the output callback just
// copies samples and applies volume. The run loop doubles as the
// application's periodic tick: it detects end-of-media for auto-advance,
// publishes progress, and re-checks the output device at a low cadence.
pub struct AudioPlayer {
    bus_receiver: Receiver<Message>,
    bus_sender: Sender<Message>,
    shared: Arc<SharedAudio>,
    device: Option<cpal::Device>,
    device_name: Option<String>,
    config: Option<cpal::StreamConfig>,
    stream: Option<cpal::Stream>,
    target_sample_rate: u32,
    target_channels: u16,
    track: Option<LoadedTrack>,
    user_volume: f32,
    muted: bool,
    paused: bool,
    finished_notified: bool,
    ticks: u64,
}

impl AudioPlayer {
    pub fn new(bus_receiver: Receiver<Message>, bus_sender: Sender<Message>) -> Self {
        let mut player = Self {
            bus_receiver,
            bus_sender,
            shared: Arc::new(SharedAudio {
                samples: Mutex::new(Vec::new()),
                position: AtomicUsize::new(0),
                playing: AtomicBool::new(false),
                volume_bits: AtomicU32::new(effective_volume(0.66, false).to_bits()),
            }),
            device: None,
            device_name: None,
            config: None,
            stream: None,
            target_sample_rate: 0,
            target_channels: 0,
            track: None,
            user_volume: 0.66,
            muted: false,
            paused: false,
            finished_notified: false,
            ticks: 0,
        };
        player.setup_audio_device();
        player
    }

    fn setup_audio_device(&mut self) {
        let host = cpal::default_host();
        let device = match host.default_output_device() {
            Some(device) => device,
            None => {
                error!("No output device available");
                return;
            }
        };

        let sample_rate = 48000u32;
        let channels = 2u16;
        let config = match device.supported_output_configs() {
            Ok(mut configs) => {
                match configs.find(|config| {
                    config.channels() == channels
                        && config.min_sample_rate().0 <= sample_rate
                        && config.max_sample_rate().0 >= sample_rate
                }) {
                    Some(config) => config.with_sample_rate(cpal::SampleRate(sample_rate)),
                    None => {
                        error!("No matching device config found");
                        return;
                    }
                }
            }
            Err(err) => {
                error!("Error getting device configs: {}", err);
                return;
            }
        };

        self.target_channels = config.channels();
        self.target_sample_rate = config.sample_rate().0;
        self.device_name = device.name().ok();
        self.config = Some(config.into());
        self.device = Some(device);
        debug!(
            "AudioPlayer: Audio device initialized with target sample rate: {} and channels: {}",
            self.target_sample_rate, self.target_channels
        );
    }

    fn create_stream(&mut self) {
        let device = match &self.device {
            Some(device) => device,
            None => {
                error!("Cannot create stream: no audio device initialized");
                return;
            }
        };
        let config = match &self.config {
            Some(config) => config,
            None => {
                error!("Cannot create stream: no stream config set");
                return;
            }
        };

        let shared = self.shared.clone();
        match device.build_output_stream(
            config,
            move |output_buffer: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if !shared.playing.load(Ordering::Relaxed) {
                    output_buffer.fill(0.0);
                    return;
                }
                let samples = shared.samples.lock().unwrap();
                let volume = f32::from_bits(shared.volume_bits.load(Ordering::Relaxed));
                let mut position = shared.position.load(Ordering::Relaxed);
                for sample in output_buffer.iter_mut() {
                    *sample = if position < samples.len() {
                        let value = samples[position] * volume;
                        position += 1;
                        value
                    } else {
                        0.0
                    };
                }
                shared.position.store(position, Ordering::Relaxed);
            },
            |err| error!("Audio stream error: {}", err),
            None,
        ) {
            Ok(stream) => {
                if self.shared.playing.load(Ordering::Relaxed) {
                    if let Err(err) = stream.play() {
                        error!("AudioPlayer: Failed to start rebuilt stream: {}", err);
                    }
                }
                self.stream = Some(stream);
                debug!("Audio stream created");
            }
            Err(err) => error!("Failed to build audio stream: {}", err),
        }
    }

    /// Decodes a file into the shared buffer at the device format. The
    /// engine is left stopped at position zero.
    pub fn load(&mut self, path: &Path) {
        let (raw, source_rate, source_channels) = match decode_samples(path) {
            Ok(decoded) => decoded,
            Err(err) => {
                error!("AudioPlayer: {}", err);
                return;
            }
        };
        if self.stream.is_none() {
            self.create_stream();
        }
        let target_channels = self.target_channels.max(1) as usize;
        let remapped = remap_channels(&raw, source_channels, target_channels);
        let samples = match resample_interleaved(
            remapped,
            target_channels,
            source_rate,
            self.target_sample_rate.max(1),
        ) {
            Ok(samples) => samples,
            Err(err) => {
                error!("AudioPlayer: {}", err);
                return;
            }
        };

        let duration_secs = samples.len() as f64
            / (self.target_sample_rate.max(1) as f64 * target_channels as f64);
        debug!(
            "AudioPlayer: loaded {} ({} samples, {:.1}s)",
            path.display(),
            samples.len(),
            duration_secs
        );
        *self.shared.samples.lock().unwrap() = samples;
        self.shared.position.store(0, Ordering::Relaxed);
        self.shared.playing.store(false, Ordering::Relaxed);
        self.paused = false;
        self.finished_notified = false;
        self.track = Some(LoadedTrack { duration_secs });
    }

    pub fn play(&mut self) {
        if !self.is_valid() {
            debug!("AudioPlayer: nothing loaded to play");
            return;
        }
        if self.stream.is_none() {
            self.create_stream();
        }
        if let Some(stream) = &self.stream {
            if let Err(err) = stream.play() {
                error!("AudioPlayer: Failed to start playback: {}", err);
                return;
            }
            self.shared.playing.store(true, Ordering::Relaxed);
            self.paused = false;
            debug!("AudioPlayer: Playback started");
        } else {
            debug!("No audio stream available to play");
        }
    }

    pub fn pause(&mut self) {
        if self.is_playing() {
            self.shared.playing.store(false, Ordering::Relaxed);
            self.paused = true;
        }
    }

    pub fn resume(&mut self) {
        if self.is_paused() {
            self.shared.playing.store(true, Ordering::Relaxed);
            self.paused = false;
        }
    }

    pub fn toggle_pause(&mut self) {
        if !self.is_valid() {
            return;
        }
        if self.is_paused() {
            self.resume();
        } else if self.is_playing() {
            self.pause();
        }
    }

    /// Unloads the current track; the engine reports invalid afterwards.
    pub fn stop(&mut self) {
        self.shared.playing.store(false, Ordering::Relaxed);
        self.shared.position.store(0, Ordering::Relaxed);
        self.shared.samples.lock().unwrap().clear();
        self.paused = false;
        self.finished_notified = false;
        self.track = None;
    }

    pub fn seek(&mut self, seconds: f64) {
        if !self.is_valid() {
            return;
        }
        let total = self.shared.samples.lock().unwrap().len();
        let index = seek_index(seconds, self.target_sample_rate, self.target_channels, total);
        self.shared.position.store(index, Ordering::Relaxed);
        if index < total {
            self.finished_notified = false;
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.user_volume = volume.clamp(0.0, 1.0);
        self.apply_volume();
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
        self.apply_volume();
    }

    fn apply_volume(&self) {
        self.shared
            .volume_bits
            .store(effective_volume(self.user_volume, self.muted).to_bits(), Ordering::Relaxed);
    }

    pub fn duration(&self) -> f64 {
        self.track.as_ref().map(|track| track.duration_secs).unwrap_or(0.0)
    }

    pub fn position(&self) -> f64 {
        let divisor = self.target_sample_rate.max(1) as f64 * self.target_channels.max(1) as f64;
        self.shared.position.load(Ordering::Relaxed) as f64 / divisor
    }

    pub fn is_valid(&self) -> bool {
        self.track.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.is_valid() && self.shared.playing.load(Ordering::Relaxed)
    }

    pub fn is_paused(&self) -> bool {
        self.is_valid() && self.paused
    }

    pub fn is_stopped(&self) -> bool {
        !self.is_playing() && !self.is_paused()
    }

    pub fn has_ended(&self) -> bool {
        if !self.is_valid() {
            return false;
        }
        let samples = self.shared.samples.lock().unwrap();
        !samples.is_empty() && self.shared.position.load(Ordering::Relaxed) >= samples.len()
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Playback(PlaybackMessage::EngineLoad(path)) => self.load(&path),
            Message::Playback(PlaybackMessage::EnginePlay) => self.play(),
            Message::Playback(PlaybackMessage::EngineStop) => self.stop(),
            Message::Playback(PlaybackMessage::TogglePause) => self.toggle_pause(),
            Message::Playback(PlaybackMessage::Seek(seconds)) => self.seek(seconds),
            Message::Playback(PlaybackMessage::SetVolume(volume)) => self.set_volume(volume),
            Message::Playback(PlaybackMessage::ToggleMute) => self.toggle_mute(),
            _ => {} // Ignore other messages
        }
    }

    fn tick(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);

        if self.has_ended() && !self.finished_notified {
            self.finished_notified = true;
            self.shared.playing.store(false, Ordering::Relaxed);
            self.paused = false;
            debug!("AudioPlayer: end of media");
            let _ = self
                .bus_sender
                .send(Message::Playback(PlaybackMessage::TrackFinished));
        }

        if self.ticks % PROGRESS_INTERVAL_TICKS == 0 && self.is_valid() {
            let _ = self.bus_sender.send(Message::Playback(PlaybackMessage::Progress {
                elapsed_secs: self.position(),
                duration_secs: self.duration(),
            }));
        }

        if self.ticks % DEVICE_REFRESH_INTERVAL_TICKS == 0 {
            self.refresh_audio_device();
        }
    }

    /// Recovers from default-device changes by rebuilding the stream on the
    /// new device. Loaded samples and the playback position survive.
    fn refresh_audio_device(&mut self) {
        let host = cpal::default_host();
        let current_default = host
            .default_output_device()
            .and_then(|device| device.name().ok());
        if current_default == self.device_name {
            return;
        }
        info!("AudioPlayer: default output device changed, rebuilding stream");
        self.stream = None;
        self.setup_audio_device();
        self.create_stream();
    }

    pub fn run(&mut self) {
        loop {
            loop {
                match self.bus_receiver.try_recv() {
                    Ok(message) => self.handle_message(message),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Lagged(skipped)) => {
                        warn!("AudioPlayer: bus lagged, skipped {} messages", skipped);
                        continue;
                    }
                    Err(TryRecvError::Closed) => {
                        debug!("AudioPlayer: bus closed, shutting down");
                        return;
                    }
                }
            }
            self.tick();
            thread::sleep(Duration::from_millis(TICK_INTERVAL_MS));
        }
    }
}
