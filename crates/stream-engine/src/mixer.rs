//! Audio mixing graph.
//!
//! Routes one or two audio origins through independent gain branches into
//! a single output track. Every build creates a fresh processing context;
//! the graph it replaces is retired and only released once the caller
//! commits, so a failed bind can roll back to it.

use std::sync::Arc;

use castline_common::error::{CastlineError, CastlineResult};
use castline_media_model::TrackSource;
use castline_platform_core::{
    same_track, AudioContext, AudioGraphFactory, GainNode, MediaStream, TrackHandle,
};

/// Which gain branch a handle addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchRole {
    /// The first origin; the display audio when mixing.
    Primary,
    /// The separately acquired origin when mixing.
    Secondary,
}

/// Handle to one branch of one graph build.
///
/// Handles from a discarded build are rejected with
/// [`CastlineError::StaleGainHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GainHandle {
    generation: u64,
    role: BranchRole,
}

impl GainHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn role(&self) -> BranchRole {
        self.role
    }
}

struct ActiveGraph {
    context: Box<dyn AudioContext>,
    primary: Arc<dyn GainNode>,
    secondary: Option<Arc<dyn GainNode>>,
    origins: Vec<TrackHandle>,
    output: TrackHandle,
    generation: u64,
}

impl ActiveGraph {
    fn branch(&self, role: BranchRole) -> Option<&Arc<dyn GainNode>> {
        match role {
            BranchRole::Primary => Some(&self.primary),
            BranchRole::Secondary => self.secondary.as_ref(),
        }
    }

    /// Close the context and stop every track this graph owns except
    /// origins listed in `keep`.
    ///
    /// System audio belongs to the display capture and is never stopped
    /// here.
    fn release(self, keep: &[TrackHandle]) {
        self.context.close();
        self.output.stop();
        for origin in &self.origins {
            if origin.source() == TrackSource::Display {
                continue;
            }
            if !keep.iter().any(|k| same_track(k, origin)) {
                origin.stop();
            }
        }
        tracing::debug!(generation = self.generation, "Audio graph released");
    }
}

pub struct AudioMixer {
    factory: Arc<dyn AudioGraphFactory>,
    graph: Option<ActiveGraph>,
    retired: Option<ActiveGraph>,
    next_generation: u64,
    /// A rebuild or retirement awaits commit or rollback.
    pending: bool,
    /// Last volume asked for; seeds every branch of every build.
    volume: Option<f32>,
    secondary_enabled: bool,
}

impl AudioMixer {
    pub fn new(factory: Arc<dyn AudioGraphFactory>) -> Self {
        Self {
            factory,
            graph: None,
            retired: None,
            next_generation: 1,
            pending: false,
            volume: None,
            secondary_enabled: true,
        }
    }

    /// Wrap the stream's audio in one gain branch.
    ///
    /// Returns the processed audio plus the stream's video untouched. A
    /// stream without audio is passed through and no graph is built.
    pub fn apply_gain(&mut self, stream: &MediaStream) -> CastlineResult<MediaStream> {
        let Some(origin) = stream.first_audio() else {
            return Ok(stream.clone());
        };
        let output = self.build(origin, None)?;
        Ok(with_video(output, stream))
    }

    /// Mix the primary stream's audio with the secondary stream's audio.
    ///
    /// Video from `primary` passes through. If only one side carries audio
    /// this degrades to [`apply_gain`](Self::apply_gain) on that side.
    pub fn mix_two_origins(
        &mut self,
        primary: &MediaStream,
        secondary: &MediaStream,
    ) -> CastlineResult<MediaStream> {
        let output = match (primary.first_audio(), secondary.first_audio()) {
            (Some(p), Some(s)) => self.build(p, Some(s))?,
            (Some(only), None) | (None, Some(only)) => self.build(only, None)?,
            (None, None) => return Ok(primary.without_audio()),
        };
        Ok(with_video(output, primary))
    }

    fn build(
        &mut self,
        primary: TrackHandle,
        secondary: Option<TrackHandle>,
    ) -> CastlineResult<TrackHandle> {
        let context = self.factory.create_context()?;
        let primary_gain = self.volume.unwrap_or(1.0);
        let secondary_gain = self.secondary_gain();

        let (primary_node, secondary_node, output) = match wire(
            context.as_ref(),
            (&primary, primary_gain),
            secondary.as_ref().map(|track| (track, secondary_gain)),
        ) {
            Ok(parts) => parts,
            Err(e) => {
                context.close();
                return Err(e);
            }
        };

        let generation = self.next_generation;
        self.next_generation += 1;

        let branches = 1 + usize::from(secondary_node.is_some());
        let mut origins = vec![primary];
        origins.extend(secondary);

        self.retire_graph();
        self.graph = Some(ActiveGraph {
            context,
            primary: primary_node,
            secondary: secondary_node,
            origins,
            output: output.clone(),
            generation,
        });

        tracing::info!(generation, branches, primary_gain, "Audio graph built");
        Ok(output)
    }

    /// Move the current graph aside until [`commit`](Self::commit) or
    /// [`rollback`](Self::rollback).
    ///
    /// Used directly when the next audio binding needs no graph at all.
    pub fn retire_graph(&mut self) {
        self.pending = true;
        let Some(current) = self.graph.take() else {
            return;
        };
        if let Some(older) = self.retired.take() {
            older.release(&current.origins);
        }
        self.retired = Some(current);
    }

    /// Release the retired graph. Origins the current graph still reads
    /// from are kept running.
    pub fn commit(&mut self) {
        if !std::mem::take(&mut self.pending) {
            return;
        }
        if let Some(retired) = self.retired.take() {
            let keep = self
                .graph
                .as_ref()
                .map(|g| g.origins.clone())
                .unwrap_or_default();
            retired.release(&keep);
        }
    }

    /// Discard the current build and reinstate the retired graph.
    ///
    /// Does nothing unless a rebuild is pending.
    pub fn rollback(&mut self) {
        if !std::mem::take(&mut self.pending) {
            return;
        }
        let restored = self.retired.take();
        if let Some(current) = self.graph.take() {
            let keep = restored
                .as_ref()
                .map(|g| g.origins.clone())
                .unwrap_or_default();
            current.release(&keep);
        }
        if let Some(graph) = &restored {
            tracing::debug!(generation = graph.generation, "Audio graph restored");
        }
        self.graph = restored;
    }

    /// Release every graph and stop all their tracks.
    pub fn teardown(&mut self) {
        self.pending = false;
        if let Some(graph) = self.graph.take() {
            graph.release(&[]);
        }
        if let Some(graph) = self.retired.take() {
            graph.release(&[]);
        }
    }

    pub fn is_active(&self) -> bool {
        self.graph.is_some()
    }

    pub fn output_track(&self) -> Option<TrackHandle> {
        self.graph.as_ref().map(|g| g.output.clone())
    }

    /// Origins feeding the current graph.
    pub fn origins(&self) -> Vec<TrackHandle> {
        self.graph
            .as_ref()
            .map(|g| g.origins.clone())
            .unwrap_or_default()
    }

    /// The capture-device origin, if one feeds the current graph.
    pub fn microphone_origin(&self) -> Option<TrackHandle> {
        self.graph.as_ref().and_then(|g| {
            g.origins
                .iter()
                .find(|t| t.source() == TrackSource::Device)
                .cloned()
        })
    }

    /// Handle to a branch of the current graph.
    pub fn handle(&self, role: BranchRole) -> Option<GainHandle> {
        let graph = self.graph.as_ref()?;
        graph.branch(role).map(|_| GainHandle {
            generation: graph.generation,
            role,
        })
    }

    fn node(&self, handle: GainHandle) -> CastlineResult<&Arc<dyn GainNode>> {
        self.graph
            .as_ref()
            .filter(|g| g.generation == handle.generation)
            .and_then(|g| g.branch(handle.role))
            .ok_or(CastlineError::StaleGainHandle {
                generation: handle.generation,
            })
    }

    pub fn gain(&self, handle: GainHandle) -> CastlineResult<f32> {
        Ok(self.node(handle)?.gain())
    }

    pub fn set_gain(&mut self, handle: GainHandle, value: f32) -> CastlineResult<()> {
        self.node(handle)?.set_gain(value);
        if handle.role == BranchRole::Primary {
            self.volume = Some(value);
        }
        Ok(())
    }

    /// Remember `value` and apply it to every branch of the current graph.
    ///
    /// A disabled secondary branch stays at 0 until re-enabled.
    pub fn set_volume(&mut self, value: f32) {
        let value = value.max(0.0);
        self.volume = Some(value);
        let secondary_gain = self.secondary_gain();
        match &self.graph {
            Some(graph) => {
                graph.primary.set_gain(value);
                if let Some(node) = &graph.secondary {
                    node.set_gain(secondary_gain);
                }
                tracing::debug!(volume = value, generation = graph.generation, "Volume applied");
            }
            None => tracing::debug!(volume = value, "Volume remembered for next audio graph"),
        }
    }

    pub fn volume(&self) -> Option<f32> {
        self.volume
    }

    /// Gate the secondary branch: 0 when disabled, the current volume when
    /// enabled.
    pub fn set_secondary_enabled(&mut self, enabled: bool) {
        self.secondary_enabled = enabled;
        let gain = self.secondary_gain();
        if let Some(node) = self.graph.as_ref().and_then(|g| g.secondary.as_ref()) {
            node.set_gain(gain);
        }
    }

    fn secondary_gain(&self) -> f32 {
        if self.secondary_enabled {
            self.volume.unwrap_or(1.0)
        } else {
            0.0
        }
    }

    pub fn secondary_enabled(&self) -> bool {
        self.secondary_enabled
    }
}

type Wired = (Arc<dyn GainNode>, Option<Arc<dyn GainNode>>, TrackHandle);

fn wire(
    context: &dyn AudioContext,
    primary: (&TrackHandle, f32),
    secondary: Option<(&TrackHandle, f32)>,
) -> CastlineResult<Wired> {
    let primary_node = context.create_branch(primary.0, primary.1)?;
    let secondary_node = secondary
        .map(|(track, gain)| context.create_branch(track, gain))
        .transpose()?;
    let mut branches = vec![primary_node.clone()];
    branches.extend(secondary_node.iter().cloned());
    let output = context.create_output(&branches)?;
    Ok((primary_node, secondary_node, output))
}

fn with_video(audio: TrackHandle, source: &MediaStream) -> MediaStream {
    let mut tracks = vec![audio];
    tracks.extend(source.video_tracks().cloned());
    MediaStream::new(tracks)
}

#[cfg(test)]
mod tests {
    use castline_platform_synthetic::{SyntheticAudio, SyntheticTrack};

    use super::*;

    fn mixer() -> (AudioMixer, Arc<SyntheticAudio>) {
        let audio = Arc::new(SyntheticAudio::new());
        (AudioMixer::new(audio.clone()), audio)
    }

    fn mic() -> TrackHandle {
        SyntheticTrack::audio(TrackSource::Device, Some("mic-0".into())).handle()
    }

    fn display() -> MediaStream {
        MediaStream::new(vec![
            SyntheticTrack::video(TrackSource::Display, None, 1280, 720, None).handle(),
            SyntheticTrack::audio(TrackSource::Display, None).handle(),
        ])
    }

    #[test]
    fn apply_gain_passes_video_through() {
        let (mut mixer, _) = mixer();
        let camera = SyntheticTrack::video(TrackSource::Device, None, 640, 480, None).handle();
        let input = MediaStream::new(vec![mic(), camera.clone()]);

        let out = mixer.apply_gain(&input).unwrap();
        assert_eq!(out.tracks().len(), 2);
        assert_eq!(out.first_video().unwrap().id(), camera.id());
        assert_eq!(out.first_audio().unwrap().source(), TrackSource::Synthetic);

        let handle = mixer.handle(BranchRole::Primary).unwrap();
        assert_eq!(mixer.gain(handle).unwrap(), 1.0);
        assert!(mixer.handle(BranchRole::Secondary).is_none());
    }

    #[test]
    fn volume_set_before_graph_seeds_new_branch() {
        let (mut mixer, _) = mixer();
        mixer.set_volume(0.4);
        assert!(!mixer.is_active());

        mixer.apply_gain(&MediaStream::new(vec![mic()])).unwrap();
        let handle = mixer.handle(BranchRole::Primary).unwrap();
        assert_eq!(mixer.gain(handle).unwrap(), 0.4);
    }

    #[test]
    fn volume_reaches_every_branch_and_survives_rebuild() {
        let (mut mixer, _) = mixer();
        let screen = display();
        mixer.mix_two_origins(&screen, &MediaStream::new(vec![mic()])).unwrap();
        mixer.set_volume(0.4);

        let primary = mixer.handle(BranchRole::Primary).unwrap();
        let secondary = mixer.handle(BranchRole::Secondary).unwrap();
        assert_eq!(mixer.gain(primary).unwrap(), 0.4);
        assert_eq!(mixer.gain(secondary).unwrap(), 0.4);

        mixer.mix_two_origins(&screen, &MediaStream::new(vec![mic()])).unwrap();
        mixer.commit();
        let primary = mixer.handle(BranchRole::Primary).unwrap();
        let secondary = mixer.handle(BranchRole::Secondary).unwrap();
        assert_eq!(mixer.gain(primary).unwrap(), 0.4);
        assert_eq!(mixer.gain(secondary).unwrap(), 0.4);
    }

    #[test]
    fn disabled_secondary_ignores_volume_until_enabled() {
        let (mut mixer, _) = mixer();
        mixer.mix_two_origins(&display(), &MediaStream::new(vec![mic()])).unwrap();
        let secondary = mixer.handle(BranchRole::Secondary).unwrap();

        mixer.set_secondary_enabled(false);
        mixer.set_volume(0.6);
        assert_eq!(mixer.gain(secondary).unwrap(), 0.0);

        mixer.set_secondary_enabled(true);
        assert_eq!(mixer.gain(secondary).unwrap(), 0.6);
    }

    #[test]
    fn secondary_toggle_sets_gain_without_rebuild() {
        let (mut mixer, audio) = mixer();
        mixer.mix_two_origins(&display(), &MediaStream::new(vec![mic()])).unwrap();
        let secondary = mixer.handle(BranchRole::Secondary).unwrap();

        mixer.set_secondary_enabled(false);
        assert_eq!(mixer.gain(secondary).unwrap(), 0.0);
        mixer.set_secondary_enabled(true);
        assert_eq!(mixer.gain(secondary).unwrap(), 1.0);
        assert_eq!(audio.contexts_created(), 1);
    }

    #[test]
    fn rebuild_invalidates_old_handles() {
        let (mut mixer, _) = mixer();
        mixer.apply_gain(&MediaStream::new(vec![mic()])).unwrap();
        let old = mixer.handle(BranchRole::Primary).unwrap();

        mixer.apply_gain(&MediaStream::new(vec![mic()])).unwrap();
        mixer.commit();

        let err = mixer.set_gain(old, 0.5).unwrap_err();
        assert!(matches!(err, CastlineError::StaleGainHandle { generation } if generation == old.generation()));

        let current = mixer.handle(BranchRole::Primary).unwrap();
        mixer.set_gain(current, 0.5).unwrap();
        assert_eq!(mixer.volume(), Some(0.5));
    }

    #[test]
    fn commit_releases_retired_graph_and_unused_origins() {
        let (mut mixer, audio) = mixer();
        let first = mic();
        mixer.apply_gain(&MediaStream::new(vec![first.clone()])).unwrap();
        let first_output = mixer.output_track().unwrap();

        let second = mic();
        mixer.apply_gain(&MediaStream::new(vec![second.clone()])).unwrap();
        assert_eq!(audio.open_contexts(), 2);

        mixer.commit();
        assert_eq!(audio.open_contexts(), 1);
        assert!(!first.is_live());
        assert!(!first_output.is_live());
        assert!(second.is_live());
    }

    #[test]
    fn commit_keeps_origins_shared_with_new_graph() {
        let (mut mixer, _) = mixer();
        let screen = display();
        mixer.mix_two_origins(&screen, &MediaStream::new(vec![mic()])).unwrap();
        mixer.mix_two_origins(&screen, &MediaStream::new(vec![mic()])).unwrap();
        mixer.commit();

        assert!(screen.first_audio().unwrap().is_live());
    }

    #[test]
    fn retiring_without_rebuild_leaves_system_audio_running() {
        let (mut mixer, audio) = mixer();
        let screen = display();
        let microphone = mic();
        mixer
            .mix_two_origins(&screen, &MediaStream::new(vec![microphone.clone()]))
            .unwrap();

        mixer.retire_graph();
        mixer.commit();

        assert!(!mixer.is_active());
        assert!(screen.first_audio().unwrap().is_live());
        assert!(!microphone.is_live());
        assert_eq!(audio.open_contexts(), 0);
    }

    #[test]
    fn rollback_restores_previous_graph() {
        let (mut mixer, audio) = mixer();
        let original = mic();
        mixer.apply_gain(&MediaStream::new(vec![original.clone()])).unwrap();
        let before = mixer.handle(BranchRole::Primary).unwrap();
        let output = mixer.output_track().unwrap();

        let replacement = mic();
        mixer.apply_gain(&MediaStream::new(vec![replacement.clone()])).unwrap();
        mixer.rollback();

        assert_eq!(mixer.handle(BranchRole::Primary), Some(before));
        assert_eq!(mixer.output_track().unwrap().id(), output.id());
        assert!(original.is_live());
        assert!(!replacement.is_live());
        assert_eq!(audio.open_contexts(), 1);
    }

    #[test]
    fn teardown_closes_everything() {
        let (mut mixer, audio) = mixer();
        let origin = mic();
        mixer.apply_gain(&MediaStream::new(vec![origin.clone()])).unwrap();
        mixer.teardown();

        assert!(!mixer.is_active());
        assert!(!origin.is_live());
        assert_eq!(audio.open_contexts(), 0);
    }
}
